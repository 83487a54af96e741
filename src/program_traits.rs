//! Type-safe roodmus argument contracts.
//!
//! This module provides the `ProgramArgs` trait for ensuring compile-time
//! correctness of roodmus subcommand arguments. Instead of hand-formatted
//! command strings, Rust structs implement this trait to produce the exact
//! flags each subcommand parses.

/// Trait for typed roodmus subcommand arguments.
///
/// # Contract
///
/// - `to_cli_args()`: Returns CLI arguments exactly as the subcommand's argument
///   parser expects them, unquoted. Quoting happens when the command line is
///   assembled.
/// - `get_env_vars()`: Returns environment variables the subcommand requires.
/// - `subcommand()`: Returns the roodmus subcommand (e.g., "run_parakeet").
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use roodmus_bridge::program_traits::ProgramArgs;
/// use roodmus_bridge::programs::conformations::SampleConformationsArgs;
/// use roodmus_bridge::types::SamplingMethod;
///
/// let args = SampleConformationsArgs {
///     top_file: PathBuf::from("/data/4ake.pdb"),
///     trajfiles_dir: PathBuf::from("/data/traj"),
///     n_conformations: 5,
///     traj_extension: ".dcd".to_string(),
///     sampling_method: SamplingMethod::EvenSampling,
///     output_dir: PathBuf::from("extra/simulated_conformations"),
/// };
///
/// assert_eq!(args.subcommand(), "conformations_sampling");
/// assert_eq!(&args.to_cli_args()[..2], ["--topfile", "/data/4ake.pdb"]);
/// ```
pub trait ProgramArgs {
    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Get required environment variables.
    fn get_env_vars(&self) -> Vec<(String, String)>;

    /// Get the roodmus subcommand name.
    fn subcommand(&self) -> &'static str;
}
