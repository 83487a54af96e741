//! Type-safe option types for the simulation parameters
//!
//! Enumerated choices are proper Rust enums so that invalid values are rejected
//! when a parameter file is parsed, not when roodmus is already running.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Compute device for the parakeet simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Device {
    Cpu,
    #[default]
    Gpu,
}

/// How `conformations_sampling` picks frames out of the trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMethod {
    /// Frames evenly spaced over the whole trajectory
    #[default]
    #[strum(serialize = "even_sampling")]
    EvenSampling,
    /// Several consecutive frames around each sampled point
    #[strum(serialize = "multiple_sampling")]
    MultipleSampling,
}
