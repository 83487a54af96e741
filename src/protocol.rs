//! Simulate-micrographs protocol
//!
//! Three steps run strictly in order inside one working directory:
//!
//! ```text
//! NotStarted
//!     ↓
//! SamplingConformations    roodmus conformations_sampling (or copy the topology)
//!     ↓
//! SimulatingMicrographs    roodmus run_parakeet
//!     ↓
//! CreatingOutput           sidecars -> micrographs, CTFs, coordinates
//!     ↓
//! Finished
//!
//! (Any non-terminal stage can transition to Failed)
//! ```
//!
//! A failing step stops the run; nothing is retried and partial results are
//! left on disk as they are.
//!
//! Working directory layout:
//!
//! ```text
//! <workdir>/extra/simulated_conformations/   one structure per conformation
//! <workdir>/extra/simulated_mics/            <n>.mrc + <n>.yaml per micrograph
//! <workdir>/logs/                            captured stdout/stderr per command
//! <workdir>/outputs/                         persisted output collections
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::config::SimulationConfig;
use crate::error::{Result, RoodmusError};
use crate::import::import_outputs;
use crate::plugin::{Plugin, ROODMUS_CITATION};
use crate::program_runner::run_program_safe;
use crate::program_traits::ProgramArgs;
use crate::programs::conformations::SampleConformationsArgs;
use crate::programs::parakeet::{DeviceSelection, RunParakeetArgs};
use crate::records::SimulationOutputs;
use crate::types::Device;

pub const CONFORMATIONS_DIR: &str = "simulated_conformations";
pub const MICROGRAPHS_DIR: &str = "simulated_mics";

/// Protocol stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolStage {
    NotStarted = 0,
    SamplingConformations = 1,
    SimulatingMicrographs = 2,
    CreatingOutput = 3,
    /// Terminal
    Finished = 4,
    /// Terminal; the failing stage is kept in `ProtocolContext::failed_at`
    Failed = 255,
}

impl ProtocolStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::SamplingConformations),
            Self::SamplingConformations => Some(Self::SimulatingMicrographs),
            Self::SimulatingMicrographs => Some(Self::CreatingOutput),
            Self::CreatingOutput => Some(Self::Finished),
            Self::Finished | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::SamplingConformations => "Sampling conformations",
            Self::SimulatingMicrographs => "Simulating micrographs",
            Self::CreatingOutput => "Creating output",
            Self::Finished => "Finished",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for ProtocolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during stage transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage {
        from: ProtocolStage,
        to: ProtocolStage,
    },

    #[error("Cannot go backwards from {from} to {to}")]
    BackwardTransition {
        from: ProtocolStage,
        to: ProtocolStage,
    },

    #[error("Cannot transition from terminal stage {from}")]
    FromTerminalStage { from: ProtocolStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: ProtocolStage },
}

/// Owns the current stage and only allows forward, one-step transitions.
#[derive(Debug, Clone)]
pub struct ProtocolContext {
    current: ProtocolStage,
    failed_at: Option<ProtocolStage>,
}

impl Default for ProtocolContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolContext {
    pub fn new() -> Self {
        Self {
            current: ProtocolStage::NotStarted,
            failed_at: None,
        }
    }

    #[inline]
    pub fn current_stage(&self) -> ProtocolStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<ProtocolStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.current == ProtocolStage::Finished
    }

    /// Move to `target`, which must be the immediate next stage.
    pub fn transition_to(
        &mut self,
        target: ProtocolStage,
    ) -> std::result::Result<ProtocolStage, StageTransitionError> {
        if self.current.is_terminal() {
            return Err(StageTransitionError::FromTerminalStage { from: self.current });
        }
        if target == self.current {
            return Err(StageTransitionError::AlreadyAtStage { stage: target });
        }
        if target != ProtocolStage::Failed && target.order() < self.current.order() {
            return Err(StageTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(StageTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        self.current = target;
        Ok(target)
    }

    /// Mark the run as failed at the current stage.
    pub fn fail(&mut self) -> std::result::Result<(), StageTransitionError> {
        if self.current.is_terminal() {
            return Err(StageTransitionError::FromTerminalStage { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.current = ProtocolStage::Failed;
        Ok(())
    }
}

/// One function step of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SampleConformations,
    SimulateMicrographs,
    CreateOutput,
}

impl Step {
    /// Stage entered while this step runs
    pub const fn stage(self) -> ProtocolStage {
        match self {
            Self::SampleConformations => ProtocolStage::SamplingConformations,
            Self::SimulateMicrographs => ProtocolStage::SimulatingMicrographs,
            Self::CreateOutput => ProtocolStage::CreatingOutput,
        }
    }
}

/// Simulation of micrographs with varying conformational variability using roodmus.
pub struct SimulateMicrographs {
    config: SimulationConfig,
    plugin: Plugin,
    workdir: PathBuf,
    context: ProtocolContext,
    outputs: Option<SimulationOutputs>,
}

impl SimulateMicrographs {
    pub const LABEL: &'static str = "simulate micrographs";

    pub fn new(config: SimulationConfig, workdir: impl Into<PathBuf>) -> Self {
        let plugin = Plugin::from_config(&config.environment);
        Self {
            config,
            plugin,
            workdir: workdir.into(),
            context: ProtocolContext::new(),
            outputs: None,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn context(&self) -> &ProtocolContext {
        &self.context
    }

    pub fn outputs(&self) -> Option<&SimulationOutputs> {
        self.outputs.as_ref()
    }

    pub fn extra_path(&self, name: &str) -> PathBuf {
        self.workdir.join("extra").join(name)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.workdir.join("logs")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.workdir.join("outputs")
    }

    pub fn insert_all_steps(&self) -> Vec<Step> {
        vec![
            Step::SampleConformations,
            Step::SimulateMicrographs,
            Step::CreateOutput,
        ]
    }

    /// Problems that prevent the protocol from starting; empty when valid
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(e) = self.config.validate() {
            errors.push(e.to_string());
        }
        if !self.config.top_file.as_os_str().is_empty() && !self.config.top_file.is_file() {
            errors.push(format!(
                "Topology file {:?} does not exist",
                self.config.top_file
            ));
        }
        if let Some(traj) = self.config.traj_files.as_ref().filter(|_| self.config.has_trajectory()) {
            if !traj.is_dir() {
                errors.push(format!("Trajectory directory {:?} does not exist", traj));
            }
        }
        errors
    }

    /// Conformations fed to the simulation: `num_conf`, or 1 without trajectories
    pub fn sampled_conformations(&self) -> u32 {
        if self.config.has_trajectory() {
            self.config.num_conf
        } else {
            1
        }
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(&mut self) -> Result<&SimulationOutputs> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(RoodmusError::validation(errors.join("; ")));
        }

        self.resolve_paths()?;
        fs::create_dir_all(&self.workdir)?;
        self.reset_simulation_dirs()?;
        info!("Running {} in {:?}", Self::LABEL, self.workdir);

        for step in self.insert_all_steps() {
            self.context.transition_to(step.stage())?;
            info!("Step: {}", step.stage());

            if let Err(e) = self.run_step(step) {
                error!("{} failed: {}", step.stage(), e);
                self.context.fail()?;
                return Err(e);
            }
        }

        self.context.transition_to(ProtocolStage::Finished)?;
        self.outputs
            .as_ref()
            .ok_or_else(|| RoodmusError::output("protocol finished without outputs"))
    }

    /// Make the working directory, topology and trajectory paths absolute.
    ///
    /// roodmus runs from inside the working directory, so every path handed
    /// to it must be absolute. Nothing has to exist yet.
    pub fn resolve_paths(&mut self) -> Result<()> {
        self.workdir = std::path::absolute(&self.workdir)?;
        if !self.config.top_file.as_os_str().is_empty() {
            self.config.top_file = std::path::absolute(&self.config.top_file)?;
        }
        if let Some(traj) = self.config.traj_files.as_mut().filter(|p| !p.as_os_str().is_empty()) {
            *traj = std::path::absolute(&*traj)?;
        }
        Ok(())
    }

    /// Drop everything an earlier run left behind, so the import only sees
    /// files written by this run and stale outputs cannot outlive a failure
    fn reset_simulation_dirs(&self) -> Result<()> {
        for dir in [
            self.extra_path(CONFORMATIONS_DIR),
            self.extra_path(MICROGRAPHS_DIR),
            self.outputs_dir(),
        ] {
            if dir.exists() {
                info!("Removing files of an earlier run in {:?}", dir);
                fs::remove_dir_all(&dir)?;
            }
        }
        fs::create_dir_all(self.extra_path(CONFORMATIONS_DIR))?;
        fs::create_dir_all(self.extra_path(MICROGRAPHS_DIR))?;
        Ok(())
    }

    pub fn run_step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::SampleConformations => self.sample_conformations_step(),
            Step::SimulateMicrographs => self.simulate_micrographs_step(),
            Step::CreateOutput => self.create_output_step().map(|_| ()),
        }
    }

    /// Arguments for `conformations_sampling`, None without trajectories
    pub fn sampling_args(&self) -> Option<SampleConformationsArgs> {
        let traj = self.config.traj_files.as_ref().filter(|_| self.config.has_trajectory())?;
        Some(SampleConformationsArgs {
            top_file: self.config.top_file.clone(),
            trajfiles_dir: traj.clone(),
            n_conformations: self.config.num_conf,
            traj_extension: self.config.traj_extension.clone(),
            sampling_method: self.config.sampling_method,
            output_dir: self.extra_path(CONFORMATIONS_DIR),
        })
    }

    pub fn parakeet_args(&self) -> Result<RunParakeetArgs> {
        let device = match self.config.device {
            Device::Cpu => DeviceSelection::Cpu,
            Device::Gpu => DeviceSelection::Gpu {
                id: self
                    .config
                    .first_gpu_id()
                    .ok_or_else(|| RoodmusError::validation("No GPU id given"))?,
            },
        };

        Ok(RunParakeetArgs {
            pdb_dir: self.extra_path(CONFORMATIONS_DIR),
            mrc_dir: self.extra_path(MICROGRAPHS_DIR),
            n_images: self.config.num_mic,
            n_molecules: self.config.num_part,
            pixel_size: self.config.pixel_size,
            nx: self.config.nx,
            ny: self.config.ny,
            electrons_per_angstrom: self.config.dose,
            energy: self.config.voltage,
            c_10: -self.config.defocus_mean,
            c_10_stddev: self.config.defocus_stddev,
            c_c: self.config.c_c,
            nproc: self.config.threads,
            device,
        })
    }

    pub fn sample_conformations_step(&mut self) -> Result<()> {
        let output_dir = self.extra_path(CONFORMATIONS_DIR);

        match self.sampling_args() {
            Some(args) => self.run_roodmus(&args),
            None => {
                fs::create_dir_all(&output_dir)?;
                let target = output_dir.join(single_conformation_name(&self.config.top_file));
                info!(
                    "No trajectory files given, using {:?} as the only conformation",
                    self.config.top_file
                );
                fs::copy(&self.config.top_file, &target)?;
                Ok(())
            }
        }
    }

    pub fn simulate_micrographs_step(&mut self) -> Result<()> {
        let args = self.parakeet_args()?;
        fs::create_dir_all(&args.mrc_dir)?;
        self.run_roodmus(&args)
    }

    pub fn create_output_step(&mut self) -> Result<&SimulationOutputs> {
        let outputs = import_outputs(
            &self.extra_path(MICROGRAPHS_DIR),
            self.config.pixel_size,
            self.config.box_size(),
        )?;
        outputs.save(&self.outputs_dir())?;
        Ok(self.outputs.insert(outputs))
    }

    fn run_roodmus<T: ProgramArgs>(&self, args: &T) -> Result<()> {
        let output = run_program_safe(&self.plugin, args, &self.workdir)?;
        output.write_logs(&self.logs_dir(), args.subcommand())?;
        output.ensure_success()
    }

    /// Command line a step would run, with the paths `run` would pass
    pub fn step_command(&mut self, step: Step) -> Result<Option<String>> {
        self.resolve_paths()?;
        Ok(match step {
            Step::SampleConformations => self
                .sampling_args()
                .map(|args| self.plugin.command(args.subcommand(), &args.to_cli_args())),
            Step::SimulateMicrographs => {
                let args = self.parakeet_args()?;
                Some(self.plugin.command(args.subcommand(), &args.to_cli_args()))
            }
            Step::CreateOutput => None,
        })
    }

    /// Summary lines for a finished or running protocol
    pub fn summary(&self) -> Vec<String> {
        match &self.outputs {
            Some(outputs) if self.context.is_finished() => {
                summary_lines(&self.config, self.sampled_conformations(), outputs)
            }
            _ => vec!["Simulating micrographs...".to_string()],
        }
    }

    /// Summary from collections persisted by an earlier run
    pub fn summary_from_disk(&mut self) -> Result<Vec<String>> {
        let outputs = SimulationOutputs::load(&self.outputs_dir())?;
        let lines = summary_lines(&self.config, self.sampled_conformations(), &outputs);
        self.outputs = Some(outputs);
        Ok(lines)
    }

    pub fn methods(&self) -> Vec<String> {
        let mut methods = vec![format!(
            "{} micrographs of {} x {} pixels ({} Å/px) were simulated with roodmus/parakeet, \
             {} particles per micrograph drawn from {} conformation(s), \
             at {} kV with a dose of {} e/Å² and defocus {} ± {} Å.",
            self.config.num_mic,
            self.config.nx,
            self.config.ny,
            self.config.pixel_size,
            self.config.num_part,
            self.sampled_conformations(),
            self.config.voltage,
            self.config.dose,
            self.config.defocus_mean,
            self.config.defocus_stddev,
        )];
        methods.extend(self.citations());
        methods
    }

    pub fn citations(&self) -> Vec<String> {
        vec![ROODMUS_CITATION.to_string()]
    }
}

fn summary_lines(
    config: &SimulationConfig,
    conformations: u32,
    outputs: &SimulationOutputs,
) -> Vec<String> {
    vec![
        format!(
            "A total of {} micrographs have been generated with the following metadata: ",
            outputs.sim_mics.len()
        ),
        format!("    - Number of particles per micrograph:  {}", config.num_part),
        format!("    - Number of sampled conformations:  {}", conformations),
        format!("    - Micrograph pixel size: {}", config.pixel_size),
        format!("    - CTF models: {}", outputs.true_ctfs.len()),
        format!(
            "    - Particle coordinates: {} (box size {})",
            outputs.true_coords.len(),
            outputs.true_coords.box_size
        ),
    ]
}

/// `conformation_000000.<ext>`, keeping the topology's extension
pub fn single_conformation_name(top_file: &Path) -> String {
    match top_file.extension() {
        Some(ext) => format!("conformation_000000.{}", ext.to_string_lossy()),
        None => "conformation_000000.pdb".to_string(),
    }
}
