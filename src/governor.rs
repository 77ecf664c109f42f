//! Control rod governor
//!
//! Reads the latest reactor state and moves the regulating rods at a fixed
//! rate according to a bang-bang policy. In manual mode the governor only
//! re-clamps whatever the operator last commanded.

use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_positive, SimError, SimResult};
use crate::reactor::ReactorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Manual,
    Automatic,
}

/// Regulating rod bank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RodActuator {
    pub percent_inserted: f64,        // 0.0 = fully withdrawn, 100.0 = fully inserted
    pub max_speed_percent_per_s: f64,
    pub mode: ControlMode,
}

impl RodActuator {
    pub fn new(
        percent_inserted: f64,
        max_speed_percent_per_s: f64,
        mode: ControlMode,
    ) -> SimResult<Self> {
        crate::reactor::validate_rod_insertion(percent_inserted)?;
        require_positive("max_speed_percent_per_s", max_speed_percent_per_s)?;
        Ok(Self {
            percent_inserted,
            max_speed_percent_per_s,
            mode,
        })
    }

    /// Move the bank, clamping to the physical travel.
    pub fn set_insertion(&mut self, percent: f64) {
        self.percent_inserted = clamp_insertion(percent);
    }
}

/// Clamp to [0, 100]; a NaN command collapses to fully inserted.
pub fn clamp_insertion(percent: f64) -> f64 {
    if percent.is_nan() {
        100.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Three-threshold bang-bang policy.
///
/// Insertion wins whenever reactivity is above `insert_reactivity_threshold`,
/// even with power below target. Withdrawal needs power below target, core
/// temperature below `max_core_temperature` and reactivity below
/// `withdraw_reactivity_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub max_core_temperature: f64,      // [°C]
    pub withdraw_reactivity_limit: f64, // small positive
    pub insert_reactivity_threshold: f64, // small negative
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            max_core_temperature: 1000.0,
            withdraw_reactivity_limit: 0.001,
            insert_reactivity_threshold: -0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlPolicy {
    Threshold(ThresholdPolicy),
    /// Withdraw below target, insert otherwise.
    FixedTarget,
}

impl Default for ControlPolicy {
    fn default() -> Self {
        ControlPolicy::Threshold(ThresholdPolicy::default())
    }
}

impl ControlPolicy {
    pub fn validate(&self) -> SimResult<()> {
        let ControlPolicy::Threshold(p) = self else {
            return Ok(());
        };
        for (name, value) in [
            ("max_core_temperature", p.max_core_temperature),
            ("withdraw_reactivity_limit", p.withdraw_reactivity_limit),
            ("insert_reactivity_threshold", p.insert_reactivity_threshold),
        ] {
            if !value.is_finite() {
                return Err(SimError::Config(format!("{name} must be finite (got {value})")));
            }
        }
        if p.insert_reactivity_threshold > 0.0 {
            return Err(SimError::Config(format!(
                "insert_reactivity_threshold must be <= 0 (got {}); rods would hold at positive reactivity",
                p.insert_reactivity_threshold
            )));
        }
        if p.insert_reactivity_threshold >= p.withdraw_reactivity_limit {
            return Err(SimError::Config(format!(
                "insert_reactivity_threshold ({}) must be below withdraw_reactivity_limit ({})",
                p.insert_reactivity_threshold, p.withdraw_reactivity_limit
            )));
        }
        Ok(())
    }
}

/// Direction chosen by the automatic policy for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RodMotion {
    Insert,
    Withdraw,
    Hold,
}

/// Automatic power regulator
#[derive(Debug, Clone, PartialEq)]
pub struct RodGovernor {
    policy: ControlPolicy,
    target_power: f64,
}

impl RodGovernor {
    pub fn new(policy: ControlPolicy, target_power: f64) -> SimResult<Self> {
        policy.validate()?;
        require_non_negative("target_power", target_power)?;
        Ok(Self {
            policy,
            target_power,
        })
    }

    pub fn policy(&self) -> &ControlPolicy {
        &self.policy
    }

    pub fn target_power(&self) -> f64 {
        self.target_power
    }

    pub fn set_target_power(&mut self, megawatts: f64) -> SimResult<()> {
        require_non_negative("target_power", megawatts)?;
        self.target_power = megawatts;
        Ok(())
    }

    /// Direction the automatic policy asks for given the current state.
    pub fn decide(&self, state: &ReactorState) -> RodMotion {
        let below_target = state.thermal_power < self.target_power;
        match &self.policy {
            ControlPolicy::Threshold(p) => {
                if state.reactivity > p.insert_reactivity_threshold {
                    RodMotion::Insert
                } else if below_target
                    && state.core_temperature < p.max_core_temperature
                    && state.reactivity < p.withdraw_reactivity_limit
                {
                    RodMotion::Withdraw
                } else {
                    RodMotion::Hold
                }
            }
            ControlPolicy::FixedTarget => {
                if below_target {
                    RodMotion::Withdraw
                } else {
                    RodMotion::Insert
                }
            }
        }
    }

    /// New rod insertion for the next model step.
    pub fn compute_insertion(&self, state: &ReactorState, actuator: &RodActuator, dt: f64) -> f64 {
        let current = actuator.percent_inserted;
        let commanded = match actuator.mode {
            ControlMode::Manual => current,
            ControlMode::Automatic => {
                let travel = actuator.max_speed_percent_per_s * dt;
                match self.decide(state) {
                    RodMotion::Insert => current + travel,
                    RodMotion::Withdraw => current - travel,
                    RodMotion::Hold => current,
                }
            }
        };
        clamp_insertion(commanded)
    }
}
