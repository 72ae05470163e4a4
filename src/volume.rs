//! Volumetric data arrays and the storage seam.
//!
//! On-disk medical-image I/O is a collaborator, not part of this crate: the
//! post-processor only ever needs "read metadata plus data array" and
//! "write a data array back with the same metadata". [`VolumeStore`] is
//! that seam; production code plugs in a NIfTI-backed implementation while
//! tests use the in-memory store below.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::ArrayD;

use crate::error::{Error, Result};

/// Spatial metadata carried alongside a data array.
///
/// The header bytes are opaque to this crate; they are preserved verbatim so
/// a derived volume can be written with exactly the metadata of its source.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeMeta {
    pub affine: [[f64; 4]; 4],
    pub header: Vec<u8>,
}

/// A loaded volumetric image: data array plus spatial metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub data: ArrayD<f64>,
    pub meta: VolumeMeta,
}

impl Volume {
    pub fn new(data: ArrayD<f64>, meta: VolumeMeta) -> Self {
        Self { data, meta }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// Load/save seam for volumetric images.
pub trait VolumeStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<Volume>;
    fn save(&self, path: &Path, volume: &Volume) -> Result<()>;
}

/// An in-memory [`VolumeStore`] keyed by path.
///
/// Used by the test suite in place of real image I/O; also handy for
/// driving the post-processor on synthetic maps.
#[derive(Clone, Default)]
pub struct MemoryVolumeStore {
    volumes: Arc<Mutex<HashMap<PathBuf, Volume>>>,
}

impl MemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, volume: Volume) {
        self.volumes.lock().unwrap().insert(path.into(), volume);
    }

    pub fn get(&self, path: &Path) -> Option<Volume> {
        self.volumes.lock().unwrap().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.volumes.lock().unwrap().contains_key(path)
    }

    pub fn remove(&self, path: &Path) -> Option<Volume> {
        self.volumes.lock().unwrap().remove(path)
    }
}

impl VolumeStore for MemoryVolumeStore {
    fn load(&self, path: &Path) -> Result<Volume> {
        self.get(path).ok_or_else(|| {
            Error::storage("volume not found", Some(path.to_path_buf()))
        })
    }

    fn save(&self, path: &Path, volume: &Volume) -> Result<()> {
        self.insert(path, volume.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_volume(values: &[f64]) -> Volume {
    let data = ArrayD::from_shape_vec(vec![values.len()], values.to_vec()).unwrap();
    Volume::new(
        data,
        VolumeMeta {
            affine: [
                [2.0, 0.0, 0.0, -90.0],
                [0.0, 2.0, 0.0, -126.0],
                [0.0, 0.0, 2.0, -72.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            header: vec![0x5c, 0x01, 0x00, 0x00],
        },
    )
}
