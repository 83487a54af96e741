//! Import of simulated micrographs into output records.
//!
//! Walks the `.mrc` files of the simulation directory in name order, reads
//! each one's YAML sidecar and maps it onto a micrograph, a CTF model and one
//! coordinate per particle instance. Any unreadable sidecar aborts the import.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, RoodmusError};
use crate::records::{
    AMPLITUDE_CONTRAST, Acquisition, Coordinate, CtfModel, Micrograph, SetOfCoordinates,
    SetOfCtfs, SetOfMicrographs, SimulationOutputs,
};
use crate::sidecar::{Instance, Sidecar, sidecar_path};

/// `.mrc` files directly inside `dir`, sorted by file name
pub fn collect_micrograph_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "mrc") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn acquisition_from_sidecar(sidecar: &Sidecar) -> Acquisition {
    Acquisition {
        voltage: sidecar.microscope.beam.energy,
        spherical_aberration: sidecar.microscope.lens.c_c,
        amplitude_contrast: AMPLITUDE_CONTRAST,
        dose_per_frame: sidecar.microscope.beam.electrons_per_angstrom,
    }
}

/// Defocus is positive for underfocus, parakeet's `c_10` is negative
pub fn ctf_from_sidecar(sidecar: &Sidecar, micrograph_id: u64) -> CtfModel {
    let defocus = -sidecar.microscope.lens.c_10;
    CtfModel {
        object_id: 0,
        micrograph_id,
        defocus_u: defocus,
        defocus_v: defocus,
        defocus_angle: sidecar.microscope.lens.phi_12,
    }
}

/// Angstrom to the nearest pixel
pub fn to_pixels(angstrom: f64, pixel_size: f64) -> i64 {
    (angstrom / pixel_size).round() as i64
}

pub fn coordinate_from_instance(
    instance: &Instance,
    micrograph_id: u64,
    pixel_size: f64,
) -> Coordinate {
    Coordinate {
        object_id: 0,
        micrograph_id,
        x: to_pixels(instance.position[0], pixel_size),
        y: to_pixels(instance.position[1], pixel_size),
    }
}

/// Build the three output collections from `mrc_dir`
pub fn import_outputs(mrc_dir: &Path, pixel_size: f64, box_size: u32) -> Result<SimulationOutputs> {
    let mut sim_mics = SetOfMicrographs::new(pixel_size);
    let mut true_ctfs = SetOfCtfs::default();
    let mut true_coords = SetOfCoordinates::new(box_size);

    for mic_file in collect_micrograph_files(mrc_dir)? {
        let yaml_path = sidecar_path(&mic_file);
        let sidecar = Sidecar::load(&yaml_path)?;
        let instances = sidecar.instances().ok_or_else(|| {
            RoodmusError::output(format!("sidecar {:?} lists no local molecules", yaml_path))
        })?;

        let mic_name = mic_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mic_id = sim_mics.append(Micrograph {
            object_id: 0,
            mic_name,
            file_name: mic_file.clone(),
            sampling_rate: pixel_size,
            acquisition: acquisition_from_sidecar(&sidecar),
        });

        true_ctfs.append(ctf_from_sidecar(&sidecar, mic_id));

        for instance in instances {
            true_coords.append(
                coordinate_from_instance(instance, mic_id, pixel_size),
                &sim_mics,
            )?;
        }

        debug!(
            "imported {:?}: {} particles",
            mic_file,
            instances.len()
        );
    }

    let outputs = SimulationOutputs {
        sim_mics,
        true_ctfs,
        true_coords,
    };
    outputs.validate()?;

    info!(
        "Imported {} micrographs, {} CTF models, {} coordinates",
        outputs.sim_mics.len(),
        outputs.true_ctfs.len(),
        outputs.true_coords.len()
    );
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidecar_yaml(c_10: f64, phi_12: f64, positions: &[[f64; 3]]) -> String {
        let mut yaml = format!(
            "microscope:\n  beam: {{energy: 300, electrons_per_angstrom: 45}}\n  lens: {{c_10: {}, c_c: 2.7, phi_12: {}}}\nsample:\n  molecules:\n    local:\n      - instances:\n",
            c_10, phi_12
        );
        for p in positions {
            yaml.push_str(&format!(
                "          - position: [{}, {}, {}]\n            orientation: [0, 0, 0]\n",
                p[0], p[1], p[2]
            ));
        }
        yaml
    }

    fn write_pair(dir: &Path, stem: &str, yaml: &str) {
        fs::write(dir.join(format!("{}.mrc", stem)), b"MRC").unwrap();
        fs::write(dir.join(format!("{}.yaml", stem)), yaml).unwrap();
    }

    #[test]
    fn test_collect_only_mrc_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["000002.mrc", "000000.mrc", "000001.yaml", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let files = collect_micrograph_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["000000.mrc", "000002.mrc"]);
    }

    #[test]
    fn test_import_maps_sidecar_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(
            dir.path(),
            "000000",
            &sidecar_yaml(-21000.0, 15.0, &[[1000.0, 500.0, 0.0], [2001.0, 30.0, 0.0]]),
        );
        write_pair(dir.path(), "000001", &sidecar_yaml(-15000.0, 0.0, &[[10.0, 10.0, 0.0]]));

        let outputs = import_outputs(dir.path(), 2.0, 400).unwrap();

        assert_eq!(outputs.sim_mics.len(), 2);
        assert_eq!(outputs.true_ctfs.len(), 2);
        assert_eq!(outputs.true_coords.len(), 3);
        assert_eq!(outputs.true_coords.box_size, 400);

        let mic = &outputs.sim_mics.items[0];
        assert_eq!(mic.object_id, 1);
        assert_eq!(mic.mic_name, "000000");
        assert_eq!(mic.sampling_rate, 2.0);
        assert_eq!(mic.acquisition.voltage, 300.0);
        assert_eq!(mic.acquisition.spherical_aberration, 2.7);
        assert_eq!(mic.acquisition.dose_per_frame, 45.0);

        let ctf = &outputs.true_ctfs.items[0];
        assert_eq!(ctf.micrograph_id, 1);
        assert_eq!(ctf.defocus_u, 21000.0);
        assert_eq!(ctf.defocus_v, 21000.0);
        assert_eq!(ctf.defocus_angle, 15.0);

        let coord = &outputs.true_coords.items[1];
        assert_eq!(coord.micrograph_id, 1);
        assert_eq!((coord.x, coord.y), (1001, 15));
        assert_eq!(outputs.true_coords.items[2].micrograph_id, 2);
    }

    #[test]
    fn test_import_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = import_outputs(dir.path(), 1.0, 400).unwrap();
        assert!(outputs.sim_mics.is_empty());
        assert!(outputs.true_ctfs.is_empty());
        assert!(outputs.true_coords.is_empty());
    }

    #[test]
    fn test_one_malformed_sidecar_aborts_import() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "000000", &sidecar_yaml(-20000.0, 0.0, &[]));
        write_pair(dir.path(), "000001", "microscope: {beam: oops");

        let err = import_outputs(dir.path(), 1.0, 400).unwrap_err();
        assert!(matches!(err, RoodmusError::Sidecar { .. }));
    }

    #[test]
    fn test_sidecar_without_local_molecules_aborts_import() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "000000", &sidecar_yaml(-20000.0, 0.0, &[[10.0, 10.0, 0.0]]));
        write_pair(
            dir.path(),
            "000001",
            "microscope:\n  beam: {energy: 300, electrons_per_angstrom: 45}\n  lens: {c_10: -20000, c_c: 2.7, phi_12: 0}\nsample:\n  molecules: {local: []}\n",
        );

        let err = import_outputs(dir.path(), 1.0, 400).unwrap_err();
        assert!(matches!(err, RoodmusError::Output(_)));
        assert!(err.to_string().contains("000001.yaml"));
    }

    #[test]
    fn test_missing_sidecar_aborts_import() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("000000.mrc"), b"MRC").unwrap();
        assert!(import_outputs(dir.path(), 1.0, 400).is_err());
    }

    #[test]
    fn test_to_pixels_rounds() {
        assert_eq!(to_pixels(10.4, 1.0), 10);
        assert_eq!(to_pixels(10.6, 1.0), 11);
        assert_eq!(to_pixels(135.0, 1.35), 100);
    }
}
