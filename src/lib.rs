//! Reactor Core Simulator Library
//!
//! Lumped-parameter reactor core simulation: point-kinetics neutronics with
//! one delayed precursor group, a two-node thermal model, and an automatic
//! rod governor tracking a power setpoint. Hosts drive a [`ReactorSession`]
//! with elapsed real time and read back value snapshots.

pub mod error;
pub mod governor;
pub mod reactor;
pub mod session;

pub use error::{SimError, SimResult};
pub use governor::{ControlMode, ControlPolicy, RodActuator, RodGovernor, ThresholdPolicy};
pub use reactor::{PhysicalConstants, ReactorModel, ReactorState};
pub use session::{Alert, ReactorSession, SessionConfig, SessionSnapshot};
