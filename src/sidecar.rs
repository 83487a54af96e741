//! YAML sidecar written by parakeet next to each simulated micrograph.
//!
//! Only the keys the importer maps onto records are modelled; everything else
//! in the file is ignored.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, RoodmusError};

/// Root of a `<micrograph>.yaml` sidecar
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sidecar {
    pub microscope: Microscope,
    pub sample: Sample,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Microscope {
    pub beam: Beam,
    pub lens: Lens,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Beam {
    /// kV
    pub energy: f64,
    pub electrons_per_angstrom: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Lens {
    pub c_c: f64,
    /// Defocus in angstrom, negative for underfocus
    pub c_10: f64,
    /// Astigmatism angle
    pub phi_12: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sample {
    pub molecules: Molecules,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Molecules {
    #[serde(default)]
    pub local: Vec<LocalMolecule>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalMolecule {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// One placed particle, position in angstrom within the sample box
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Instance {
    pub position: [f64; 3],
    #[serde(default)]
    pub orientation: [f64; 3],
}

impl Sidecar {
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Read and parse a sidecar file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|source| RoodmusError::Sidecar {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Particle instances of the first local molecule, None when the sample
    /// lists no local molecule at all
    pub fn instances(&self) -> Option<&[Instance]> {
        self.sample
            .molecules
            .local
            .first()
            .map(|m| m.instances.as_slice())
    }
}

/// `<dir>/<stem>.yaml` for `<dir>/<stem>.mrc`
pub fn sidecar_path(micrograph: &Path) -> PathBuf {
    micrograph.with_extension("yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDECAR: &str = r#"
microscope:
  beam:
    energy: 300
    electrons_per_angstrom: 45.0
    energy_spread: 0.8
  lens:
    c_10: -18500.5
    c_12: 0.0
    c_c: 2.7
    phi_12: 12.5
  detector:
    nx: 4000
sample:
  box: [4000, 4000, 500]
  molecules:
    local:
      - filename: conformation_000000.pdb
        instances:
          - position: [1200.0, 800.0, 250.0]
            orientation: [0.1, 0.2, 0.3]
          - position: [2500.5, 3100.0, 250.0]
            orientation: [0.0, 0.0, 1.0]
"#;

    #[test]
    fn test_parse_sidecar() {
        let sidecar = Sidecar::from_yaml(SIDECAR).unwrap();
        assert_eq!(sidecar.microscope.beam.energy, 300.0);
        assert_eq!(sidecar.microscope.beam.electrons_per_angstrom, 45.0);
        assert_eq!(sidecar.microscope.lens.c_10, -18500.5);
        assert_eq!(sidecar.microscope.lens.c_c, 2.7);
        assert_eq!(sidecar.microscope.lens.phi_12, 12.5);
        let instances = sidecar.instances().unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1].position, [2500.5, 3100.0, 250.0]);
    }

    #[test]
    fn test_no_local_molecules_has_no_instance_list() {
        let yaml = r#"
microscope:
  beam: {energy: 300, electrons_per_angstrom: 30}
  lens: {c_10: -20000, c_c: 2.7, phi_12: 0}
sample:
  molecules: {}
"#;
        let sidecar = Sidecar::from_yaml(yaml).unwrap();
        assert!(sidecar.instances().is_none());
    }

    #[test]
    fn test_missing_lens_key_fails() {
        let yaml = r#"
microscope:
  beam: {energy: 300, electrons_per_angstrom: 30}
  lens: {c_c: 2.7, phi_12: 0}
sample:
  molecules: {local: []}
"#;
        assert!(Sidecar::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000000.yaml");
        fs::write(&path, "microscope: [").unwrap();

        let err = Sidecar::load(&path).unwrap_err();
        assert!(matches!(err, RoodmusError::Sidecar { .. }));
        assert!(err.to_string().contains("000000.yaml"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Sidecar::load(Path::new("/nonexistent/000000.yaml")).unwrap_err();
        assert!(matches!(err, RoodmusError::Io(_)));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/work/extra/simulated_mics/000003.mrc")),
            PathBuf::from("/work/extra/simulated_mics/000003.yaml")
        );
    }
}
