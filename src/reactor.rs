//! Reactor core model
//!
//! Lumped point-kinetics neutronics (one delayed precursor group) coupled to
//! a two-node thermal model: fuel/core and coolant. The model is a pure
//! transition function; all mutation happens in the caller.
//!
//! Integration is explicit Euler over a fixed increment. Euler is only
//! conditionally stable here: the fastest time constant is the neutron
//! generation time (about a millisecond), so callers must subdivide frame
//! intervals into small constant steps (see [`crate::session`]).

use serde::{Deserialize, Serialize};

use crate::error::{require_finite, require_non_negative, require_positive, SimError, SimResult};

/// Reference values for the full model
pub mod constants {
    pub const BETA_EFF: f64 = 0.0065;
    pub const PRECURSOR_DECAY_CONSTANT: f64 = 0.08; // 1/s
    pub const NEUTRON_GENERATION_TIME: f64 = 1.0e-3; // seconds
    pub const BASE_REACTIVITY: f64 = 0.05; // critical at 50% insertion and T0
    pub const TEMPERATURE_COEFFICIENT: f64 = -5.0e-5; // 1/°C
    pub const REFERENCE_TEMPERATURE_C: f64 = 250.0;
    pub const ROD_WORTH: f64 = 0.1;
    pub const ENERGY_PER_REACTION_MW: f64 = 2.0e-8;
    pub const DECAY_HEAT_INITIAL_MW: f64 = 60.0;
    pub const DECAY_HEAT_TIME_CONSTANT_S: f64 = 100.0;
    pub const CORE_HEAT_CAPACITY: f64 = 500.0; // MJ/°C
    pub const THERMAL_RESISTANCE: f64 = 10.0; // s
    pub const COOLANT_SPECIFIC_HEAT: f64 = 4.2e-3; // MJ/(kg·°C)
    pub const COOLANT_MASS_KG: f64 = 1.0e6;
    pub const AMBIENT_TEMPERATURE_C: f64 = 25.0;
    pub const TARGET_POWER_MW: f64 = 2000.0;
    pub const MAX_CORE_TEMPERATURE_C: f64 = 3000.0;
}

/// Physical constants for one simulation session.
///
/// Immutable once a session is created; a new session replaces the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub delayed_neutron_fraction: f64, // β
    pub precursor_decay_constant: f64, // λ [1/s]
    pub neutron_generation_time: f64,  // Λ [s]
    pub base_reactivity: f64,          // p0
    pub temperature_coefficient: f64,  // α [1/°C]
    pub reference_temperature: f64,    // T0 [°C]
    pub rod_worth: f64,                // reactivity removed at 100% insertion
    pub energy_per_reaction: f64,      // [MW per unit population]
    pub decay_heat_initial: f64,       // Q0 [MW]
    pub decay_heat_time_constant: f64, // τ [s]
    pub core_heat_capacity: f64,       // [MJ/°C]
    pub thermal_resistance: f64,       // core → coolant [s]
    pub coolant_specific_heat: f64,    // [MJ/(kg·°C)]
    pub coolant_mass: f64,             // [kg]
    pub ambient_temperature: f64,      // [°C]
    /// Relaxation rate of the coolant toward ambient [1/s]. Zero keeps the
    /// heat-up-only coolant model.
    #[serde(default)]
    pub coolant_heat_rejection: f64,
    pub target_power: f64,             // initial setpoint [MW]
    pub max_core_temperature: f64,     // divergence ceiling [°C]
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            delayed_neutron_fraction: constants::BETA_EFF,
            precursor_decay_constant: constants::PRECURSOR_DECAY_CONSTANT,
            neutron_generation_time: constants::NEUTRON_GENERATION_TIME,
            base_reactivity: constants::BASE_REACTIVITY,
            temperature_coefficient: constants::TEMPERATURE_COEFFICIENT,
            reference_temperature: constants::REFERENCE_TEMPERATURE_C,
            rod_worth: constants::ROD_WORTH,
            energy_per_reaction: constants::ENERGY_PER_REACTION_MW,
            decay_heat_initial: constants::DECAY_HEAT_INITIAL_MW,
            decay_heat_time_constant: constants::DECAY_HEAT_TIME_CONSTANT_S,
            core_heat_capacity: constants::CORE_HEAT_CAPACITY,
            thermal_resistance: constants::THERMAL_RESISTANCE,
            coolant_specific_heat: constants::COOLANT_SPECIFIC_HEAT,
            coolant_mass: constants::COOLANT_MASS_KG,
            ambient_temperature: constants::AMBIENT_TEMPERATURE_C,
            coolant_heat_rejection: 0.0,
            target_power: constants::TARGET_POWER_MW,
            max_core_temperature: constants::MAX_CORE_TEMPERATURE_C,
        }
    }
}

impl PhysicalConstants {
    /// Reduced-order model: prompt neutrons only, no decay heat.
    ///
    /// With β = λ = 0 the kinetics collapse to `dN/dt = (p/Λ)·N`.
    pub fn reduced() -> Self {
        Self {
            delayed_neutron_fraction: 0.0,
            precursor_decay_constant: 0.0,
            decay_heat_initial: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        require_non_negative("delayed_neutron_fraction", self.delayed_neutron_fraction)?;
        if self.delayed_neutron_fraction >= 1.0 {
            return Err(SimError::Validation(format!(
                "delayed_neutron_fraction must be < 1 (got {})",
                self.delayed_neutron_fraction
            )));
        }
        require_non_negative("precursor_decay_constant", self.precursor_decay_constant)?;
        require_positive("neutron_generation_time", self.neutron_generation_time)?;
        require_finite("base_reactivity", self.base_reactivity)?;
        require_finite("temperature_coefficient", self.temperature_coefficient)?;
        require_finite("reference_temperature", self.reference_temperature)?;
        require_non_negative("rod_worth", self.rod_worth)?;
        require_non_negative("energy_per_reaction", self.energy_per_reaction)?;
        require_non_negative("decay_heat_initial", self.decay_heat_initial)?;
        require_positive("decay_heat_time_constant", self.decay_heat_time_constant)?;
        require_positive("core_heat_capacity", self.core_heat_capacity)?;
        require_positive("thermal_resistance", self.thermal_resistance)?;
        require_positive("coolant_specific_heat", self.coolant_specific_heat)?;
        require_positive("coolant_mass", self.coolant_mass)?;
        require_finite("ambient_temperature", self.ambient_temperature)?;
        require_non_negative("coolant_heat_rejection", self.coolant_heat_rejection)?;
        require_non_negative("target_power", self.target_power)?;
        require_finite("max_core_temperature", self.max_core_temperature)?;
        Ok(())
    }
}

/// Complete reactor state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactorState {
    pub neutron_population: f64,
    pub precursor_concentration: f64,
    pub reactivity: f64,           // [Δk/k], recomputed every step
    pub core_temperature: f64,     // [°C]
    pub coolant_temperature: f64,  // [°C]
    pub thermal_power: f64,        // [MW]
    pub decay_heat_power: f64,     // [MW]
    pub elapsed_time: f64,         // [s]
}

impl Default for ReactorState {
    fn default() -> Self {
        Self {
            neutron_population: 1.0e6,
            precursor_concentration: 1.0e15,
            reactivity: 0.0,
            core_temperature: 250.0,
            coolant_temperature: 200.0,
            thermal_power: 0.0,
            decay_heat_power: 0.0,
            elapsed_time: 0.0,
        }
    }
}

impl ReactorState {
    /// Check that a caller-supplied state is physically meaningful.
    pub fn validate(&self) -> SimResult<()> {
        require_non_negative("neutron_population", self.neutron_population)?;
        require_non_negative("precursor_concentration", self.precursor_concentration)?;
        require_finite("reactivity", self.reactivity)?;
        require_finite("core_temperature", self.core_temperature)?;
        require_finite("coolant_temperature", self.coolant_temperature)?;
        require_finite("thermal_power", self.thermal_power)?;
        require_finite("decay_heat_power", self.decay_heat_power)?;
        require_non_negative("elapsed_time", self.elapsed_time)?;
        Ok(())
    }

    fn fields(&self) -> [(&'static str, f64); 8] {
        [
            ("neutron_population", self.neutron_population),
            ("precursor_concentration", self.precursor_concentration),
            ("reactivity", self.reactivity),
            ("core_temperature", self.core_temperature),
            ("coolant_temperature", self.coolant_temperature),
            ("thermal_power", self.thermal_power),
            ("decay_heat_power", self.decay_heat_power),
            ("elapsed_time", self.elapsed_time),
        ]
    }
}

/// Rod insertion commands on the direct API must already be in range.
pub fn validate_rod_insertion(percent: f64) -> SimResult<()> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(SimError::Validation(format!(
            "rod insertion must be within [0, 100] percent (got {percent})"
        )));
    }
    Ok(())
}

/// Point-kinetics / thermal model bound to one constant set
#[derive(Debug, Clone)]
pub struct ReactorModel {
    constants: PhysicalConstants,
}

impl ReactorModel {
    pub fn new(constants: PhysicalConstants) -> SimResult<Self> {
        constants.validate()?;
        Ok(Self { constants })
    }

    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    /// Total reactivity from temperature and rod feedback.
    pub fn reactivity(&self, core_temperature: f64, rod_insertion_percent: f64) -> f64 {
        let c = &self.constants;
        c.base_reactivity + c.temperature_coefficient * (core_temperature - c.reference_temperature)
            - c.rod_worth * (rod_insertion_percent / 100.0)
    }

    /// Residual heat evaluated in closed form, never integrated.
    pub fn decay_heat(&self, elapsed_time: f64) -> f64 {
        let c = &self.constants;
        c.decay_heat_initial * (-elapsed_time / c.decay_heat_time_constant).exp()
    }

    fn neutron_rate(&self, neutron_population: f64, precursors: f64, reactivity: f64) -> f64 {
        let c = &self.constants;
        ((reactivity - c.delayed_neutron_fraction) / c.neutron_generation_time) * neutron_population
            + c.precursor_decay_constant * precursors
    }

    fn precursor_rate(&self, neutron_population: f64, precursors: f64) -> f64 {
        let c = &self.constants;
        (c.delayed_neutron_fraction / c.neutron_generation_time) * neutron_population
            - c.precursor_decay_constant * precursors
    }

    /// Advance the state by one explicit Euler step of `dt` seconds.
    pub fn step(
        &self,
        state: &ReactorState,
        rod_insertion_percent: f64,
        dt: f64,
    ) -> SimResult<ReactorState> {
        require_positive("dt", dt)?;
        validate_rod_insertion(rod_insertion_percent)?;
        let c = &self.constants;

        let reactivity = self.reactivity(state.core_temperature, rod_insertion_percent);

        let dn_dt = self.neutron_rate(
            state.neutron_population,
            state.precursor_concentration,
            reactivity,
        );
        let dc_dt = self.precursor_rate(state.neutron_population, state.precursor_concentration);
        let neutron_population = state.neutron_population + dn_dt * dt;
        let precursor_concentration = state.precursor_concentration + dc_dt * dt;

        // Derived quantities reflect the advanced state.
        let thermal_power = neutron_population * c.energy_per_reaction;
        let elapsed_time = state.elapsed_time + dt;
        let decay_heat_power = self.decay_heat(elapsed_time);
        let heating = thermal_power + decay_heat_power;

        let dtemp_core = heating / c.core_heat_capacity
            - (state.core_temperature - state.coolant_temperature) / c.thermal_resistance;
        let dtemp_coolant = heating / (c.coolant_specific_heat * c.coolant_mass)
            - c.coolant_heat_rejection * (state.coolant_temperature - c.ambient_temperature);

        let next = ReactorState {
            neutron_population,
            precursor_concentration,
            reactivity,
            core_temperature: state.core_temperature + dtemp_core * dt,
            coolant_temperature: state.coolant_temperature + dtemp_coolant * dt,
            thermal_power,
            decay_heat_power,
            elapsed_time,
        };

        self.check_divergence(&next)?;
        Ok(next)
    }

    /// Recompute the derived fields of `state` for the given rod insertion.
    pub fn settle(&self, state: &ReactorState, rod_insertion_percent: f64) -> ReactorState {
        ReactorState {
            reactivity: self.reactivity(state.core_temperature, rod_insertion_percent),
            thermal_power: state.neutron_population * self.constants.energy_per_reaction,
            decay_heat_power: self.decay_heat(state.elapsed_time),
            ..*state
        }
    }

    /// Reactor period N / (dN/dt) [s]; `None` for a stationary population.
    pub fn period(&self, state: &ReactorState) -> Option<f64> {
        let dn_dt = self.neutron_rate(
            state.neutron_population,
            state.precursor_concentration,
            state.reactivity,
        );
        if state.neutron_population <= 0.0 || dn_dt.abs() <= 1e-10 * state.neutron_population {
            None
        } else {
            Some(state.neutron_population / dn_dt)
        }
    }

    pub fn reactivity_dollars(&self, state: &ReactorState) -> f64 {
        let beta = self.constants.delayed_neutron_fraction;
        if beta > 0.0 {
            state.reactivity / beta
        } else {
            0.0
        }
    }

    fn check_divergence(&self, state: &ReactorState) -> SimResult<()> {
        let diverged = |message: String| SimError::Divergence {
            time: state.elapsed_time,
            message,
        };

        for (name, value) in state.fields() {
            if !value.is_finite() {
                return Err(diverged(format!("{name} is not finite ({value})")));
            }
        }
        if state.neutron_population < 0.0 {
            return Err(diverged(format!(
                "negative neutron population ({:.3e})",
                state.neutron_population
            )));
        }
        if state.precursor_concentration < 0.0 {
            return Err(diverged(format!(
                "negative precursor concentration ({:.3e})",
                state.precursor_concentration
            )));
        }
        let ceiling = self.constants.max_core_temperature;
        if state.core_temperature > ceiling {
            return Err(diverged(format!(
                "core temperature {:.1}°C exceeds {:.1}°C",
                state.core_temperature, ceiling
            )));
        }
        if state.coolant_temperature > ceiling {
            return Err(diverged(format!(
                "coolant temperature {:.1}°C exceeds {:.1}°C",
                state.coolant_temperature, ceiling
            )));
        }
        Ok(())
    }
}
