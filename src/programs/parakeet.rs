//! Type-safe arguments for `roodmus run_parakeet`.

use std::path::PathBuf;

use crate::program_traits::ProgramArgs;

/// Where parakeet runs the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    Cpu,
    /// A single GPU, by the id parakeet expects
    Gpu { id: String },
}

/// Type-safe arguments for `roodmus run_parakeet`.
///
/// # Field to Flag Mapping
///
/// | Rust Field               | CLI Flag                   | Notes |
/// |--------------------------|----------------------------|-------|
/// | `pdb_dir`                | `--pdb_dir`                | Conformations to place |
/// | `mrc_dir`                | `--mrc_dir`                | Receives `.mrc` + `.yaml` pairs |
/// | `n_images`               | `-n`                       | |
/// | `n_molecules`            | `-m`                       | Particles per micrograph |
/// | `pixel_size`             | `--pixel_size`             | Å/px |
/// | `nx`, `ny`               | `--nx`, `--ny`             | Micrograph size in pixels |
/// | `electrons_per_angstrom` | `--electrons_per_angstrom` | Dose |
/// | `energy`                 | `--energy`                 | kV |
/// | `c_10`                   | `--c_10=<v>`               | Negative for underfocus, joined with `=` |
/// | `c_10_stddev`            | `--c_10_stddev`            | |
/// | `c_c`                    | `--c_c`                    | mm |
/// | `nproc`                  | `--nproc`                  | |
/// | `device`                 | `--device`, `--gpu_id`     | |
#[derive(Debug, Clone)]
pub struct RunParakeetArgs {
    pub pdb_dir: PathBuf,
    pub mrc_dir: PathBuf,
    pub n_images: u32,
    pub n_molecules: u32,
    pub pixel_size: f64,
    pub nx: u32,
    pub ny: u32,
    pub electrons_per_angstrom: f64,
    pub energy: f64,
    pub c_10: f64,
    pub c_10_stddev: f64,
    pub c_c: f64,
    pub nproc: u32,
    pub device: DeviceSelection,
}

impl ProgramArgs for RunParakeetArgs {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--pdb_dir".to_string(),
            self.pdb_dir.display().to_string(),
            "--mrc_dir".to_string(),
            self.mrc_dir.display().to_string(),
            "-n".to_string(),
            self.n_images.to_string(),
            "-m".to_string(),
            self.n_molecules.to_string(),
            "--pixel_size".to_string(),
            self.pixel_size.to_string(),
            "--nx".to_string(),
            self.nx.to_string(),
            "--ny".to_string(),
            self.ny.to_string(),
            "--electrons_per_angstrom".to_string(),
            self.electrons_per_angstrom.to_string(),
            "--energy".to_string(),
            self.energy.to_string(),
            // argparse would read a bare negative value as an option
            format!("--c_10={}", self.c_10),
            "--c_10_stddev".to_string(),
            self.c_10_stddev.to_string(),
            "--c_c".to_string(),
            self.c_c.to_string(),
            "--tqdm".to_string(),
            "--nproc".to_string(),
            self.nproc.to_string(),
        ];

        match &self.device {
            DeviceSelection::Gpu { id } => {
                args.push("--device".to_string());
                args.push("gpu".to_string());
                args.push("--gpu_id".to_string());
                args.push(id.clone());
            }
            DeviceSelection::Cpu => {
                args.push("--device".to_string());
                args.push("cpu".to_string());
            }
        }
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }

    fn subcommand(&self) -> &'static str {
        "run_parakeet"
    }
}
