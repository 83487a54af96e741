//! roodmus-bridge library
//!
//! Runs the roodmus micrograph simulation toolkit as a three-step protocol and
//! imports its outputs as micrographs, CTF models and particle coordinates.

pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod plugin;
pub mod process_guard;
pub mod program_runner;
pub mod program_traits;
pub mod programs;
pub mod protocol;
pub mod records;
pub mod sidecar;
pub mod types;

// Re-export main types for convenience
pub use config::{EnvironmentConfig, SimulationConfig};
pub use error::{Result, RoodmusError};
pub use plugin::Plugin;
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use program_runner::{ProgramOutput, run_program_safe, run_shell};
pub use program_traits::ProgramArgs;
pub use programs::conformations::SampleConformationsArgs;
pub use programs::parakeet::{DeviceSelection, RunParakeetArgs};
pub use protocol::{ProtocolContext, ProtocolStage, SimulateMicrographs, StageTransitionError, Step};
pub use records::{
    Acquisition, Coordinate, CtfModel, Micrograph, SetOfCoordinates, SetOfCtfs, SetOfMicrographs,
    SimulationOutputs,
};
pub use sidecar::Sidecar;
pub use types::{Device, SamplingMethod};
