use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// roodmus-bridge - simulate cryo-EM micrographs with roodmus and import the results
#[derive(Parser, Debug)]
#[command(name = "roodmus-bridge")]
#[command(about = "Run roodmus micrograph simulations as a managed step")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample conformations, simulate micrographs and import the outputs
    Run {
        /// Parameter file (JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// Working directory for intermediate files and outputs
        #[arg(short, long)]
        workdir: PathBuf,
    },
    /// Validate a parameter file
    Validate {
        /// Parameter file to validate
        config: PathBuf,
    },
    /// Write a parameter file with default values
    InitConfig {
        /// Where to write the parameter file
        path: PathBuf,
        /// Topology (atomic model) file
        #[arg(short, long)]
        top_file: PathBuf,
        /// Directory of trajectory files
        #[arg(long)]
        traj_files: Option<PathBuf>,
    },
    /// Create the roodmus conda environment
    Install {
        /// Directory the installation runs in
        #[arg(short, long)]
        prefix: PathBuf,
        /// Parameter file providing environment settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the command line a step would run
    Command {
        #[arg(value_enum)]
        step: StepName,
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        workdir: PathBuf,
    },
    /// Print the summary of a finished run
    Summary {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        workdir: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepName {
    /// conformations_sampling
    Sampling,
    /// run_parakeet
    Simulate,
}
