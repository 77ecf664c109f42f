//! Simulation session
//!
//! Owns one reactor state and one rod actuator for the lifetime of a run.
//! Hosts feed real elapsed time into [`ReactorSession::tick`]; the session
//! accumulates it and runs whole physics steps of constant size, each one a
//! governor decision followed by a model step.

use std::fmt;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_positive, SimError, SimResult};
use crate::governor::{ControlMode, ControlPolicy, RodActuator, RodGovernor};
use crate::reactor::{validate_rod_insertion, PhysicalConstants, ReactorModel, ReactorState};

/// Alert thresholds
const OVERPOWER_FRACTION: f64 = 1.10;
const REACTIVITY_WARNING_DOLLARS: f64 = 0.5;
const PROMPT_CRITICAL_DOLLARS: f64 = 1.0;
const CORE_TEMPERATURE_ALERT_C: f64 = 1000.0;
const SHORT_PERIOD_S: f64 = 20.0;

/// Tolerance for float residue when counting whole steps, in units of dt.
const STEP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub physics_dt: f64,                 // [s]
    pub max_rod_speed_percent_per_s: f64,
    pub initial_mode: ControlMode,
    pub policy: ControlPolicy,
    pub time_speed: f64,                 // simulated seconds per real second
    pub max_steps_per_tick: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            physics_dt: 0.01,
            max_rod_speed_percent_per_s: 5.0,
            initial_mode: ControlMode::Automatic,
            policy: ControlPolicy::default(),
            time_speed: 1.0,
            max_steps_per_tick: 100_000,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> SimResult<()> {
        require_positive("physics_dt", self.physics_dt)?;
        require_positive("max_rod_speed_percent_per_s", self.max_rod_speed_percent_per_s)?;
        require_positive("time_speed", self.time_speed)?;
        if self.max_steps_per_tick == 0 {
            return Err(SimError::Validation(
                "max_steps_per_tick must be at least 1".to_string(),
            ));
        }
        self.policy.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    PowerHigh { power_mw: f64, target_mw: f64 },
    ReactivityHigh { dollars: f64 },
    PromptCritical { dollars: f64 },
    CoreTemperatureHigh { temperature_c: f64 },
    ShortPeriod { period_s: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::PowerHigh { power_mw, target_mw } => write!(
                f,
                "WARNING: Power {power_mw:.0} MW exceeds 110% of target {target_mw:.0} MW!"
            ),
            Alert::ReactivityHigh { dollars } => {
                write!(f, "WARNING: Reactivity {dollars:.2}$ exceeds 0.5$!")
            }
            Alert::PromptCritical { dollars } => {
                write!(f, "CRITICAL: Prompt critical condition ({dollars:.2}$)!")
            }
            Alert::CoreTemperatureHigh { temperature_c } => {
                write!(f, "WARNING: Core temperature {temperature_c:.0}°C exceeds limit!")
            }
            Alert::ShortPeriod { period_s } => {
                write!(f, "WARNING: Short reactor period: {period_s:.1}s")
            }
        }
    }
}

/// Read-only view handed to presentation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: ReactorState,
    pub rod_percent_inserted: f64,
    pub mode: ControlMode,
    pub target_power: f64,
    pub reactivity_dollars: f64,
    /// Reactor period [s]; `None` while the population is stationary.
    pub period: Option<f64>,
    pub alerts: Vec<Alert>,
    pub scram_active: bool,
    pub halted: bool,
}

/// One simulation run: model, governor and their mutable state
#[derive(Debug, Clone)]
pub struct ReactorSession {
    model: ReactorModel,
    governor: RodGovernor,
    initial_governor: RodGovernor,
    config: SessionConfig,
    initial_state: ReactorState,
    initial_rod_percent: f64,
    state: ReactorState,
    actuator: RodActuator,
    accumulated_time: f64,
    time_speed: f64,
    scram_active: bool,
    divergence: Option<SimError>,
}

impl ReactorSession {
    pub fn new(
        constants: PhysicalConstants,
        initial_state: ReactorState,
        initial_rod_percent: f64,
    ) -> SimResult<Self> {
        Self::with_config(
            constants,
            initial_state,
            initial_rod_percent,
            SessionConfig::default(),
        )
    }

    pub fn with_config(
        constants: PhysicalConstants,
        initial_state: ReactorState,
        initial_rod_percent: f64,
        config: SessionConfig,
    ) -> SimResult<Self> {
        config.validate()?;
        validate_rod_insertion(initial_rod_percent)?;
        initial_state.validate()?;
        let ceiling = constants.max_core_temperature;
        for (name, value) in [
            ("core_temperature", initial_state.core_temperature),
            ("coolant_temperature", initial_state.coolant_temperature),
        ] {
            if value >= ceiling {
                return Err(SimError::Validation(format!(
                    "initial {name} {value}°C must be below max_core_temperature {ceiling}°C"
                )));
            }
        }

        let governor = RodGovernor::new(config.policy, constants.target_power)?;
        let model = ReactorModel::new(constants)?;
        let actuator = RodActuator::new(
            initial_rod_percent,
            config.max_rod_speed_percent_per_s,
            config.initial_mode,
        )?;
        let state = model.settle(&initial_state, initial_rod_percent);

        info!(
            "Session created: dt={}s, mode={:?}, rods={:.1}%, target={:.1} MW",
            config.physics_dt,
            config.initial_mode,
            initial_rod_percent,
            governor.target_power()
        );

        Ok(Self {
            model,
            initial_governor: governor.clone(),
            governor,
            time_speed: config.time_speed,
            config,
            initial_state: state,
            initial_rod_percent,
            state,
            actuator,
            accumulated_time: 0.0,
            scram_active: false,
            divergence: None,
        })
    }

    /// Advance by `elapsed_real_time` seconds of host time.
    ///
    /// Returns the number of physics steps run. Time that does not fill a
    /// whole step carries over to the next call.
    pub fn tick(&mut self, elapsed_real_time: f64) -> SimResult<usize> {
        require_non_negative("elapsed_real_time", elapsed_real_time)?;
        if let Some(err) = &self.divergence {
            return Err(err.clone());
        }

        let dt = self.config.physics_dt;
        let accumulated = self.accumulated_time + elapsed_real_time * self.time_speed;
        let whole_steps = ((accumulated + dt * STEP_EPSILON) / dt).floor();
        if whole_steps > self.config.max_steps_per_tick as f64 {
            return Err(SimError::Validation(format!(
                "tick of {elapsed_real_time}s needs {whole_steps} steps, limit is {}",
                self.config.max_steps_per_tick
            )));
        }
        let steps = whole_steps as usize;
        self.accumulated_time = (accumulated - steps as f64 * dt).max(0.0);

        for _ in 0..steps {
            if let Err(err) = self.advance(dt) {
                error!("Simulation halted: {err}");
                self.accumulated_time = 0.0;
                self.divergence = Some(err.clone());
                return Err(err);
            }
        }

        debug!(
            "tick: {} steps, t={:.3}s, P={:.1} MW, rods={:.2}%",
            steps, self.state.elapsed_time, self.state.thermal_power, self.actuator.percent_inserted
        );
        Ok(steps)
    }

    /// One governor decision followed by one model step.
    fn advance(&mut self, dt: f64) -> SimResult<()> {
        let insertion = self.governor.compute_insertion(&self.state, &self.actuator, dt);
        self.actuator.set_insertion(insertion);
        self.state = self.model.step(&self.state, self.actuator.percent_inserted, dt)?;
        Ok(())
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) -> SimResult<()> {
        self.reject_during_scram("mode change")?;
        if self.actuator.mode != mode {
            info!("Control mode: {:?} -> {:?}", self.actuator.mode, mode);
        }
        self.actuator.mode = mode;
        Ok(())
    }

    /// Operator rod command. Returns whether it was applied; commands are
    /// ignored while the governor is in automatic mode.
    pub fn set_manual_rod_insertion(&mut self, percent: f64) -> SimResult<bool> {
        self.reject_during_scram("manual rod command")?;
        if self.actuator.mode != ControlMode::Manual {
            warn!("Manual rod command {percent}% ignored in automatic mode");
            return Ok(false);
        }
        self.actuator.set_insertion(percent);
        self.state = self.model.settle(&self.state, self.actuator.percent_inserted);
        Ok(true)
    }

    pub fn set_target_power(&mut self, megawatts: f64) -> SimResult<()> {
        self.governor.set_target_power(megawatts)?;
        info!("Target power set to {megawatts:.1} MW");
        Ok(())
    }

    pub fn set_time_speed(&mut self, multiplier: f64) -> SimResult<()> {
        require_positive("time_speed", multiplier)?;
        self.time_speed = multiplier;
        Ok(())
    }

    /// Emergency shutdown: drive all rods in and lock out operator commands.
    pub fn scram(&mut self) {
        if self.scram_active {
            return;
        }
        warn!("SCRAM initiated at t={:.2}s", self.state.elapsed_time);
        self.scram_active = true;
        self.actuator.mode = ControlMode::Manual;
        self.actuator.set_insertion(100.0);
        self.state = self.model.settle(&self.state, self.actuator.percent_inserted);
    }

    /// Release the SCRAM latch. Rods stay inserted in manual mode.
    pub fn reset_scram(&mut self) {
        if self.scram_active {
            info!("SCRAM reset");
        }
        self.scram_active = false;
    }

    /// Restore initial conditions and clear every latch.
    pub fn reset(&mut self) {
        self.state = self.initial_state;
        self.actuator.percent_inserted = self.initial_rod_percent;
        self.actuator.mode = self.config.initial_mode;
        self.governor = self.initial_governor.clone();
        self.time_speed = self.config.time_speed;
        self.accumulated_time = 0.0;
        self.scram_active = false;
        self.divergence = None;
        info!("Session reset to initial conditions");
    }

    fn reject_during_scram(&self, what: &str) -> SimResult<()> {
        if self.scram_active {
            return Err(SimError::Validation(format!(
                "{what} rejected while SCRAM is active"
            )));
        }
        Ok(())
    }

    /// Current state snapshot
    pub fn state(&self) -> ReactorState {
        self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            rod_percent_inserted: self.actuator.percent_inserted,
            mode: self.actuator.mode,
            target_power: self.governor.target_power(),
            reactivity_dollars: self.model.reactivity_dollars(&self.state),
            period: self.model.period(&self.state),
            alerts: self.alerts(),
            scram_active: self.scram_active,
            halted: self.divergence.is_some(),
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let state = &self.state;
        let target = self.governor.target_power();

        if target > 0.0 && state.thermal_power > OVERPOWER_FRACTION * target {
            alerts.push(Alert::PowerHigh {
                power_mw: state.thermal_power,
                target_mw: target,
            });
        }
        let dollars = self.model.reactivity_dollars(state);
        if dollars >= PROMPT_CRITICAL_DOLLARS {
            alerts.push(Alert::PromptCritical { dollars });
        } else if dollars > REACTIVITY_WARNING_DOLLARS {
            alerts.push(Alert::ReactivityHigh { dollars });
        }
        if state.core_temperature > CORE_TEMPERATURE_ALERT_C {
            alerts.push(Alert::CoreTemperatureHigh {
                temperature_c: state.core_temperature,
            });
        }
        if let Some(period) = self.model.period(state) {
            if period > 0.0 && period < SHORT_PERIOD_S {
                alerts.push(Alert::ShortPeriod { period_s: period });
            }
        }
        alerts
    }

    pub fn actuator(&self) -> RodActuator {
        self.actuator
    }

    pub fn constants(&self) -> &PhysicalConstants {
        self.model.constants()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn target_power(&self) -> f64 {
        self.governor.target_power()
    }

    pub fn time_speed(&self) -> f64 {
        self.time_speed
    }

    pub fn is_halted(&self) -> bool {
        self.divergence.is_some()
    }

    pub fn is_scram_active(&self) -> bool {
        self.scram_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::constants;

    fn session() -> ReactorSession {
        ReactorSession::new(PhysicalConstants::default(), ReactorState::default(), 50.0).unwrap()
    }

    #[test]
    fn test_tick_subdivides_into_fixed_steps() {
        let mut s = session();
        assert_eq!(s.tick(0.05).unwrap(), 5);
        assert!((s.state().elapsed_time - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_tick_carries_remainder() {
        let mut s = session();
        assert_eq!(s.tick(0.025).unwrap(), 2);
        assert_eq!(s.tick(0.004).unwrap(), 0);
        assert_eq!(s.tick(0.001).unwrap(), 1);
        assert!((s.state().elapsed_time - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_zero_and_negative_elapsed() {
        let mut s = session();
        assert_eq!(s.tick(0.0).unwrap(), 0);
        assert_eq!(s.state().elapsed_time, 0.0);
        assert!(matches!(s.tick(-0.1), Err(SimError::Validation(_))));
        assert!(s.tick(f64::NAN).is_err());
    }

    #[test]
    fn test_time_speed_scales_steps() {
        let mut s = session();
        s.set_time_speed(10.0).unwrap();
        assert_eq!(s.tick(0.01).unwrap(), 10);
        assert!(s.set_time_speed(0.0).is_err());
        assert_eq!(s.time_speed(), 10.0);
    }

    #[test]
    fn test_oversized_tick_rejected_without_advancing() {
        let mut s = session();
        let err = s.tick(1.0e6).unwrap_err();
        assert!(matches!(err, SimError::Validation(_)));
        assert_eq!(s.state().elapsed_time, 0.0);
        assert_eq!(s.tick(0.01).unwrap(), 1);
    }

    #[test]
    fn test_manual_command_ignored_in_automatic() {
        let mut s = session();
        assert!(!s.set_manual_rod_insertion(10.0).unwrap());
        assert_eq!(s.actuator().percent_inserted, 50.0);

        s.set_control_mode(ControlMode::Manual).unwrap();
        assert!(s.set_manual_rod_insertion(250.0).unwrap());
        assert_eq!(s.actuator().percent_inserted, 100.0);
    }

    #[test]
    fn test_manual_command_updates_reported_reactivity() {
        let mut s = session();
        s.set_control_mode(ControlMode::Manual).unwrap();
        assert!(s.set_manual_rod_insertion(0.0).unwrap());

        let state = s.state();
        let model = ReactorModel::new(PhysicalConstants::default()).unwrap();
        let expected = model.reactivity(state.core_temperature, 0.0);
        assert!((state.reactivity - expected).abs() < 1e-15);
        assert!((state.reactivity - 0.05).abs() < 1e-12);

        let snapshot = s.snapshot();
        assert!(snapshot.reactivity_dollars > 7.0);
        assert!(snapshot
            .alerts
            .iter()
            .any(|a| matches!(a, Alert::PromptCritical { .. })));
    }

    #[test]
    fn test_scram_latches_rods_in() {
        let mut s = session();
        s.tick(1.0).unwrap();
        s.scram();

        assert!(s.is_scram_active());
        assert_eq!(s.actuator().percent_inserted, 100.0);
        assert_eq!(s.actuator().mode, ControlMode::Manual);
        assert!(s.set_control_mode(ControlMode::Automatic).is_err());
        assert!(s.set_manual_rod_insertion(0.0).is_err());

        s.tick(1.0).unwrap();
        assert_eq!(s.actuator().percent_inserted, 100.0);

        s.reset_scram();
        assert!(s.set_control_mode(ControlMode::Automatic).is_ok());
    }

    #[test]
    fn test_divergence_latches_until_reset() {
        let constants = PhysicalConstants {
            max_core_temperature: 260.0,
            ..PhysicalConstants::default()
        };
        let mut s = ReactorSession::new(constants, ReactorState::default(), 50.0).unwrap();

        let err = s.tick(10.0).unwrap_err();
        assert!(matches!(err, SimError::Divergence { .. }));
        assert!(s.is_halted());
        assert!(s.snapshot().halted);
        assert!(s.state().core_temperature <= 260.0);
        assert_eq!(s.tick(0.01).unwrap_err(), err);

        s.reset();
        assert!(!s.is_halted());
        assert_eq!(s.state().elapsed_time, 0.0);
    }

    #[test]
    fn test_reset_restores_initial_conditions() {
        let mut s = session();
        let initial = s.state();
        s.set_target_power(500.0).unwrap();
        s.set_control_mode(ControlMode::Manual).unwrap();
        s.set_manual_rod_insertion(20.0).unwrap();
        s.tick(2.0).unwrap();
        s.scram();
        assert!(s.is_scram_active());

        s.reset();
        assert!(!s.is_scram_active());
        assert!(!s.snapshot().scram_active);
        assert!(s.set_control_mode(ControlMode::Manual).is_ok());
        s.set_control_mode(ControlMode::Automatic).unwrap();
        assert_eq!(s.state(), initial);
        assert_eq!(s.actuator().percent_inserted, 50.0);
        assert_eq!(s.actuator().mode, ControlMode::Automatic);
        assert_eq!(s.target_power(), 2000.0);
    }

    #[test]
    fn test_creation_validates_inputs() {
        let state = ReactorState::default();
        assert!(matches!(
            ReactorSession::new(PhysicalConstants::default(), state, 120.0),
            Err(SimError::Validation(_))
        ));

        let no_heat = PhysicalConstants {
            core_heat_capacity: 0.0,
            ..PhysicalConstants::default()
        };
        assert!(ReactorSession::new(no_heat, state, 50.0).is_err());

        let negative = ReactorState {
            neutron_population: -1.0,
            ..state
        };
        assert!(ReactorSession::new(PhysicalConstants::default(), negative, 50.0).is_err());

        let bad_dt = SessionConfig {
            physics_dt: 0.0,
            ..SessionConfig::default()
        };
        assert!(
            ReactorSession::with_config(PhysicalConstants::default(), state, 50.0, bad_dt).is_err()
        );

        let hot_core = ReactorState {
            core_temperature: constants::MAX_CORE_TEMPERATURE_C,
            ..state
        };
        assert!(matches!(
            ReactorSession::new(PhysicalConstants::default(), hot_core, 50.0),
            Err(SimError::Validation(_))
        ));
        let hot_coolant = ReactorState {
            coolant_temperature: 500.0,
            ..state
        };
        let low_ceiling = PhysicalConstants {
            max_core_temperature: 400.0,
            ..PhysicalConstants::default()
        };
        assert!(matches!(
            ReactorSession::new(low_ceiling, hot_coolant, 50.0),
            Err(SimError::Validation(_))
        ));

        let overlapping = SessionConfig {
            policy: ControlPolicy::Threshold(crate::governor::ThresholdPolicy {
                insert_reactivity_threshold: 0.002,
                withdraw_reactivity_limit: 0.001,
                ..Default::default()
            }),
            ..SessionConfig::default()
        };
        assert!(matches!(
            ReactorSession::with_config(PhysicalConstants::default(), state, 50.0, overlapping),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_snapshot_reports_prompt_critical() {
        let s = ReactorSession::new(PhysicalConstants::default(), ReactorState::default(), 0.0)
            .unwrap();
        let snapshot = s.snapshot();
        assert!((snapshot.state.reactivity - 0.05).abs() < 1e-12);
        assert!(snapshot.reactivity_dollars > 7.0);
        assert!(snapshot
            .alerts
            .iter()
            .any(|a| matches!(a, Alert::PromptCritical { .. })));
        assert!(snapshot
            .alerts
            .iter()
            .any(|a| matches!(a, Alert::ShortPeriod { .. })));
    }

    #[test]
    fn test_alert_messages() {
        let alert = Alert::ShortPeriod { period_s: 4.26 };
        assert_eq!(alert.to_string(), "WARNING: Short reactor period: 4.3s");
        let alert = Alert::PromptCritical { dollars: 1.5 };
        assert_eq!(alert.to_string(), "CRITICAL: Prompt critical condition (1.50$)!");
    }
}
