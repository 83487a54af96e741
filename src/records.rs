//! Output records of a simulation run
//!
//! Micrographs, their ground-truth CTF models and particle coordinates, grouped
//! into the three collections a run produces. Object ids are assigned by the
//! owning set on `append`, starting at 1.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, RoodmusError};

/// Amplitude contrast recorded for every simulated micrograph
pub const AMPLITUDE_CONTRAST: f64 = 0.1;

pub const MICROGRAPHS_FILE: &str = "sim_mics.json";
pub const CTFS_FILE: &str = "true_ctfs.json";
pub const COORDINATES_FILE: &str = "true_coords.json";

/// Acquisition block of a micrograph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    /// kV
    pub voltage: f64,
    /// mm
    pub spherical_aberration: f64,
    pub amplitude_contrast: f64,
    /// e/Å²
    pub dose_per_frame: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Micrograph {
    pub object_id: u64,
    pub mic_name: String,
    pub file_name: PathBuf,
    /// Å/px
    pub sampling_rate: f64,
    pub acquisition: Acquisition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtfModel {
    pub object_id: u64,
    pub micrograph_id: u64,
    pub defocus_u: f64,
    pub defocus_v: f64,
    pub defocus_angle: f64,
}

/// Particle centre in pixels on its micrograph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub object_id: u64,
    pub micrograph_id: u64,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOfMicrographs {
    pub sampling_rate: f64,
    /// Taken from the first appended micrograph
    pub acquisition: Option<Acquisition>,
    pub items: Vec<Micrograph>,
}

impl SetOfMicrographs {
    pub fn new(sampling_rate: f64) -> Self {
        Self {
            sampling_rate,
            acquisition: None,
            items: Vec::new(),
        }
    }

    /// Append and return the assigned object id
    pub fn append(&mut self, mut micrograph: Micrograph) -> u64 {
        let id = self.items.len() as u64 + 1;
        micrograph.object_id = id;
        if self.acquisition.is_none() {
            self.acquisition = Some(micrograph.acquisition.clone());
        }
        self.items.push(micrograph);
        id
    }

    pub fn get(&self, object_id: u64) -> Option<&Micrograph> {
        // ids are dense and 1-based
        object_id
            .checked_sub(1)
            .and_then(|i| self.items.get(i as usize))
            .filter(|m| m.object_id == object_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetOfCtfs {
    pub items: Vec<CtfModel>,
}

impl SetOfCtfs {
    pub fn append(&mut self, mut ctf: CtfModel) -> u64 {
        let id = self.items.len() as u64 + 1;
        ctf.object_id = id;
        self.items.push(ctf);
        id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOfCoordinates {
    /// Box size in pixels
    pub box_size: u32,
    pub items: Vec<Coordinate>,
}

impl SetOfCoordinates {
    pub fn new(box_size: u32) -> Self {
        Self {
            box_size,
            items: Vec::new(),
        }
    }

    /// Append a coordinate whose micrograph must already be in `micrographs`
    pub fn append(&mut self, mut coord: Coordinate, micrographs: &SetOfMicrographs) -> Result<u64> {
        if micrographs.get(coord.micrograph_id).is_none() {
            return Err(RoodmusError::output(format!(
                "coordinate refers to unknown micrograph {}",
                coord.micrograph_id
            )));
        }
        let id = self.items.len() as u64 + 1;
        coord.object_id = id;
        self.items.push(coord);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The three collections produced by one run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutputs {
    pub sim_mics: SetOfMicrographs,
    pub true_ctfs: SetOfCtfs,
    pub true_coords: SetOfCoordinates,
}

impl SimulationOutputs {
    /// Check the cross-collection invariants
    pub fn validate(&self) -> Result<()> {
        if self.true_ctfs.len() != self.sim_mics.len() {
            return Err(RoodmusError::output(format!(
                "{} CTF models for {} micrographs",
                self.true_ctfs.len(),
                self.sim_mics.len()
            )));
        }
        if let Some(ctf) = self
            .true_ctfs
            .items
            .iter()
            .find(|c| self.sim_mics.get(c.micrograph_id).is_none())
        {
            return Err(RoodmusError::output(format!(
                "CTF {} refers to unknown micrograph {}",
                ctf.object_id, ctf.micrograph_id
            )));
        }
        if let Some(coord) = self
            .true_coords
            .items
            .iter()
            .find(|c| self.sim_mics.get(c.micrograph_id).is_none())
        {
            return Err(RoodmusError::output(format!(
                "coordinate {} refers to unknown micrograph {}",
                coord.object_id, coord.micrograph_id
            )));
        }
        Ok(())
    }

    /// Persist the collections as JSON files in `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join(MICROGRAPHS_FILE),
            serde_json::to_string_pretty(&self.sim_mics)?,
        )?;
        fs::write(
            dir.join(CTFS_FILE),
            serde_json::to_string_pretty(&self.true_ctfs)?,
        )?;
        fs::write(
            dir.join(COORDINATES_FILE),
            serde_json::to_string_pretty(&self.true_coords)?,
        )?;
        Ok(())
    }

    /// Load collections written by `save` and re-check their invariants
    pub fn load(dir: &Path) -> Result<Self> {
        let outputs = Self {
            sim_mics: serde_json::from_str(&fs::read_to_string(dir.join(MICROGRAPHS_FILE))?)?,
            true_ctfs: serde_json::from_str(&fs::read_to_string(dir.join(CTFS_FILE))?)?,
            true_coords: serde_json::from_str(&fs::read_to_string(dir.join(COORDINATES_FILE))?)?,
        };
        outputs.validate()?;
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acquisition() -> Acquisition {
        Acquisition {
            voltage: 300.0,
            spherical_aberration: 2.7,
            amplitude_contrast: AMPLITUDE_CONTRAST,
            dose_per_frame: 45.0,
        }
    }

    fn micrograph(name: &str) -> Micrograph {
        Micrograph {
            object_id: 0,
            mic_name: name.to_string(),
            file_name: PathBuf::from(format!("/work/extra/simulated_mics/{}.mrc", name)),
            sampling_rate: 1.0,
            acquisition: acquisition(),
        }
    }

    fn ctf(micrograph_id: u64) -> CtfModel {
        CtfModel {
            object_id: 0,
            micrograph_id,
            defocus_u: 20000.0,
            defocus_v: 20000.0,
            defocus_angle: 0.0,
        }
    }

    fn coord(micrograph_id: u64) -> Coordinate {
        Coordinate {
            object_id: 0,
            micrograph_id,
            x: 10,
            y: 20,
        }
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let mut mics = SetOfMicrographs::new(1.0);
        assert_eq!(mics.append(micrograph("000000")), 1);
        assert_eq!(mics.append(micrograph("000001")), 2);
        assert_eq!(mics.get(2).unwrap().mic_name, "000001");
        assert!(mics.get(0).is_none());
        assert!(mics.get(3).is_none());
        assert_eq!(mics.acquisition, Some(acquisition()));
    }

    #[test]
    fn test_coordinate_requires_known_micrograph() {
        let mut mics = SetOfMicrographs::new(1.0);
        mics.append(micrograph("000000"));

        let mut coords = SetOfCoordinates::new(400);
        assert_eq!(coords.append(coord(1), &mics).unwrap(), 1);
        assert!(coords.append(coord(2), &mics).is_err());
        assert_eq!(coords.len(), 1);
    }

    #[test]
    fn test_validate_ctf_count_mismatch() {
        let mut sim_mics = SetOfMicrographs::new(1.0);
        sim_mics.append(micrograph("000000"));
        sim_mics.append(micrograph("000001"));
        let mut true_ctfs = SetOfCtfs::default();
        true_ctfs.append(ctf(1));

        let outputs = SimulationOutputs {
            sim_mics,
            true_ctfs,
            true_coords: SetOfCoordinates::new(400),
        };
        let err = outputs.validate().unwrap_err();
        assert!(err.to_string().contains("1 CTF models for 2 micrographs"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim_mics = SetOfMicrographs::new(1.0);
        sim_mics.append(micrograph("000000"));
        let mut true_ctfs = SetOfCtfs::default();
        true_ctfs.append(ctf(1));
        let mut true_coords = SetOfCoordinates::new(400);
        true_coords.append(coord(1), &sim_mics).unwrap();

        let outputs = SimulationOutputs {
            sim_mics,
            true_ctfs,
            true_coords,
        };
        outputs.save(dir.path()).unwrap();
        assert!(dir.path().join(MICROGRAPHS_FILE).exists());

        let loaded = SimulationOutputs::load(dir.path()).unwrap();
        assert_eq!(loaded, outputs);
    }

    #[test]
    fn test_load_rejects_dangling_coordinate() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim_mics = SetOfMicrographs::new(1.0);
        sim_mics.append(micrograph("000000"));
        let mut true_ctfs = SetOfCtfs::default();
        true_ctfs.append(ctf(1));
        let mut true_coords = SetOfCoordinates::new(400);
        true_coords.items.push(coord(7));

        SimulationOutputs {
            sim_mics,
            true_ctfs,
            true_coords,
        }
        .save(dir.path())
        .unwrap();

        assert!(SimulationOutputs::load(dir.path()).is_err());
    }
}
