//! Simulation parameter file handling.
//!
//! `SimulationConfig` is the parameter form of the simulate-micrographs
//! protocol. It is saved and loaded as JSON; missing keys fall back to the
//! form defaults so a minimal file only needs `top_file`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, RoodmusError};
use crate::types::{Device, SamplingMethod};

/// How the roodmus environment is entered before each command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Command that makes `conda activate` available in a non-interactive shell.
    /// Falls back to `ROODMUS_CONDA_ACTIVATION_CMD`, then to the conda shell hook.
    pub conda_activation_cmd: Option<String>,
    /// Prefix every command with the conda activation. Disable when `program`
    /// is already on PATH.
    pub activate: bool,
    /// Name or path of the roodmus executable
    pub program: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            conda_activation_cmd: None,
            activate: true,
            program: "roodmus".to_string(),
        }
    }
}

/// Parameters of one simulate-micrographs run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Input
    /// Atomic model used as MD topology (no solvent)
    pub top_file: PathBuf,
    /// Directory of trajectory files; without it only the topology conformation is simulated
    pub traj_files: Option<PathBuf>,
    pub traj_extension: String,
    pub sampling_method: SamplingMethod,

    // Counts
    pub num_mic: u32,
    pub num_part: u32,
    /// Only used when `traj_files` is set
    pub num_conf: u32,

    // Imaging
    pub pixel_size: f64,
    pub nx: u32,
    pub ny: u32,
    /// Electrons per square angstrom
    pub dose: f64,
    /// Beam energy in kV
    pub voltage: f64,
    /// Mean defocus in angstrom, positive for underfocus
    pub defocus_mean: f64,
    pub defocus_stddev: f64,
    /// Aberration coefficient `c_c` in mm
    pub c_c: f64,

    // Execution
    pub device: Device,
    /// GPU ids, separated by spaces or commas; only the first one is used
    pub gpu_list: String,
    pub threads: u32,

    pub environment: EnvironmentConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            top_file: PathBuf::new(),
            traj_files: None,
            traj_extension: ".dcd".to_string(),
            sampling_method: SamplingMethod::default(),
            num_mic: 10,
            num_part: 10,
            num_conf: 10,
            pixel_size: 1.0,
            nx: 4000,
            ny: 4000,
            dose: 45.0,
            voltage: 300.0,
            defocus_mean: 20000.0,
            defocus_stddev: 5000.0,
            c_c: 2.7,
            device: Device::default(),
            gpu_list: "0".to_string(),
            threads: 4,
            environment: EnvironmentConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a configuration with form defaults for the given topology file
    pub fn new(top_file: impl Into<PathBuf>) -> Self {
        Self {
            top_file: top_file.into(),
            ..Self::default()
        }
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            RoodmusError::config(format!(
                "Failed to read configuration from {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            RoodmusError::config(format!(
                "Failed to parse configuration {:?}: {}",
                path.as_ref(),
                e
            ))
        })
    }

    /// Validate the parameters
    pub fn validate(&self) -> Result<()> {
        if self.top_file.as_os_str().is_empty() {
            return Err(RoodmusError::validation("Topology file must be specified"));
        }

        for (name, value) in [
            ("Number of micrographs", self.num_mic),
            ("Number of particles per micrograph", self.num_part),
            ("Number of threads", self.threads),
            ("Micrograph X dimension", self.nx),
            ("Micrograph Y dimension", self.ny),
        ] {
            if value == 0 {
                return Err(RoodmusError::validation(format!("{} must be positive", name)));
            }
        }

        if self.has_trajectory() && self.num_conf == 0 {
            return Err(RoodmusError::validation(
                "Number of conformations must be positive",
            ));
        }

        if !(self.pixel_size > 0.0) {
            return Err(RoodmusError::validation("Pixel size must be positive"));
        }
        if !(self.dose > 0.0) {
            return Err(RoodmusError::validation("Dose must be positive"));
        }
        if !(self.voltage > 0.0) {
            return Err(RoodmusError::validation("Voltage must be positive"));
        }
        if self.defocus_stddev < 0.0 {
            return Err(RoodmusError::validation(
                "Defocus standard deviation cannot be negative",
            ));
        }

        if self.device == Device::Gpu && self.first_gpu_id().is_none() {
            return Err(RoodmusError::validation(
                "GPU execution requires at least one GPU id",
            ));
        }

        if self.environment.program.trim().is_empty() {
            return Err(RoodmusError::validation("roodmus program must be specified"));
        }

        Ok(())
    }

    /// True when a trajectory directory was supplied
    pub fn has_trajectory(&self) -> bool {
        self.traj_files
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty())
    }

    /// First id of the GPU list, if any
    pub fn first_gpu_id(&self) -> Option<String> {
        self.gpu_list
            .split(|c: char| c == ',' || c.is_whitespace())
            .find(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Particle box size in pixels, a tenth of the micrograph width
    pub fn box_size(&self) -> u32 {
        self.nx / 10
    }
}
