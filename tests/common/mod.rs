//! Shared fixtures: a fake `roodmus` executable that honours the on-disk
//! output contract of the real one.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use roodmus_bridge::config::{EnvironmentConfig, SimulationConfig};
use roodmus_bridge::types::Device;

const FAKE_ROODMUS: &str = r#"#!/usr/bin/env bash
set -euo pipefail
sub="$1"; shift
case "$sub" in
  conformations_sampling)
    while [ $# -gt 0 ]; do
      case "$1" in
        --tqdm) shift ;;
        --topfile) top="$2"; shift 2 ;;
        --output_dir) out="$2"; shift 2 ;;
        --n_conformations) n="$2"; shift 2 ;;
        *) shift 2 ;;
      esac
    done
    mkdir -p "$out"
    for i in $(seq 0 $((n - 1))); do
      cp "$top" "$out/conformation_$(printf '%06d' "$i").pdb"
    done
    ;;
  run_parakeet)
    while [ $# -gt 0 ]; do
      case "$1" in
        --tqdm) shift ;;
        --c_10=*) c10="${1#--c_10=}"; shift ;;
        --pdb_dir) pdb="$2"; shift 2 ;;
        --mrc_dir) mrc="$2"; shift 2 ;;
        -n) n="$2"; shift 2 ;;
        -m) m="$2"; shift 2 ;;
        --energy) energy="$2"; shift 2 ;;
        --electrons_per_angstrom) dose="$2"; shift 2 ;;
        --c_c) cc="$2"; shift 2 ;;
        *) shift 2 ;;
      esac
    done
    ls "$pdb" | grep -q . || { echo "no conformations in $pdb" >&2; exit 3; }
    mkdir -p "$mrc"
    for i in $(seq 0 $((n - 1))); do
      stem="$mrc/$(printf '%06d' "$i")"
      printf 'MRC' > "$stem.mrc"
      {
        echo "microscope:"
        echo "  beam:"
        echo "    energy: $energy"
        echo "    electrons_per_angstrom: $dose"
        echo "  lens:"
        echo "    c_10: $c10"
        echo "    c_c: $cc"
        echo "    phi_12: 7.5"
        echo "sample:"
        echo "  molecules:"
        echo "    local:"
        echo "      - filename: conformation_000000.pdb"
        echo "        instances:"
        for j in $(seq 1 "$m"); do
          echo "          - position: [$((j * 100)), $((j * 50)), 250]"
          echo "            orientation: [0.0, 0.0, 0.0]"
        done
      } > "$stem.yaml"
    done
    ;;
  *)
    echo "unknown subcommand $sub" >&2
    exit 2
    ;;
esac
"#;

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub program: PathBuf,
    pub top_file: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_script(FAKE_ROODMUS)
    }

    /// A roodmus that fails every subcommand
    pub fn failing() -> Self {
        Self::with_script("#!/usr/bin/env bash\necho \"simulation exploded\" >&2\nexit 7\n")
    }

    fn with_script(script: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let program = dir.path().join("roodmus");
        fs::write(&program, script).expect("write fake roodmus");
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).expect("chmod");

        let top_file = dir.path().join("4ake.pdb");
        fs::write(&top_file, "ATOM      1  N   MET A   1      26.981  53.977  40.085\nEND\n")
            .expect("write topology");

        Self {
            dir,
            program,
            top_file,
        }
    }

    pub fn workdir(&self) -> PathBuf {
        self.dir.path().join("run")
    }

    /// CPU config calling the fake program directly, no conda activation
    pub fn config(&self) -> SimulationConfig {
        let mut config = SimulationConfig::new(&self.top_file);
        config.device = Device::Cpu;
        config.num_mic = 3;
        config.num_part = 4;
        config.nx = 1000;
        config.ny = 1000;
        config.pixel_size = 2.0;
        config.environment = EnvironmentConfig {
            conda_activation_cmd: None,
            activate: false,
            program: self.program.display().to_string(),
        };
        config
    }

    pub fn trajectory_dir(&self) -> PathBuf {
        let traj = self.dir.path().join("traj");
        fs::create_dir_all(&traj).expect("traj dir");
        fs::write(traj.join("run1.dcd"), b"DCD").expect("write trajectory");
        traj
    }
}

pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
