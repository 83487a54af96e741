//! Type-safe arguments for `roodmus conformations_sampling`.

use std::path::PathBuf;

use crate::program_traits::ProgramArgs;
use crate::types::SamplingMethod;

/// Type-safe arguments for `roodmus conformations_sampling`.
///
/// # Field to Flag Mapping
///
/// | Rust Field        | CLI Flag            | Notes |
/// |-------------------|---------------------|-------|
/// | `top_file`        | `--topfile`         | MD topology, no solvent |
/// | `trajfiles_dir`   | `--trajfiles_dir`   | Directory scanned for trajectories |
/// | `n_conformations` | `--n_conformations` | |
/// | `traj_extension`  | `--traj_extension`  | e.g. `.dcd` |
/// | `sampling_method` | `--sampling_method` | `even_sampling` or `multiple_sampling` |
/// | `output_dir`      | `--output_dir`      | One structure file per conformation |
///
/// `--tqdm` is always passed so progress ends up in the captured output.
#[derive(Debug, Clone)]
pub struct SampleConformationsArgs {
    pub top_file: PathBuf,
    pub trajfiles_dir: PathBuf,
    pub n_conformations: u32,
    pub traj_extension: String,
    pub sampling_method: SamplingMethod,
    pub output_dir: PathBuf,
}

impl ProgramArgs for SampleConformationsArgs {
    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--topfile".to_string(),
            self.top_file.display().to_string(),
            "--trajfiles_dir".to_string(),
            self.trajfiles_dir.display().to_string(),
            "--n_conformations".to_string(),
            self.n_conformations.to_string(),
            "--traj_extension".to_string(),
            self.traj_extension.clone(),
            "--sampling_method".to_string(),
            self.sampling_method.to_string(),
            "--tqdm".to_string(),
            "--output_dir".to_string(),
            self.output_dir.display().to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }

    fn subcommand(&self) -> &'static str {
        "conformations_sampling"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_args() -> SampleConformationsArgs {
        SampleConformationsArgs {
            top_file: PathBuf::from("/data/4ake.pdb"),
            trajfiles_dir: PathBuf::from("/data/traj"),
            n_conformations: 10,
            traj_extension: ".dcd".to_string(),
            sampling_method: SamplingMethod::EvenSampling,
            output_dir: PathBuf::from("/work/extra/simulated_conformations"),
        }
    }

    #[test]
    fn test_cli_args_order() {
        assert_eq!(
            sample_args().to_cli_args(),
            vec![
                "--topfile",
                "/data/4ake.pdb",
                "--trajfiles_dir",
                "/data/traj",
                "--n_conformations",
                "10",
                "--traj_extension",
                ".dcd",
                "--sampling_method",
                "even_sampling",
                "--tqdm",
                "--output_dir",
                "/work/extra/simulated_conformations",
            ]
        );
    }

    #[test]
    fn test_no_env_vars() {
        assert!(sample_args().get_env_vars().is_empty());
    }

    #[test]
    fn test_subcommand() {
        assert_eq!(sample_args().subcommand(), "conformations_sampling");
    }
}
