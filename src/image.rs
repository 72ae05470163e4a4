use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A reference to one volumetric image on disk.
///
/// The engine addresses single volumes as `<path>,1` inside cell blocks (the
/// first frame of the file). `ImageRef` is immutable; pipeline stages derive
/// new paths from it through the naming conventions instead of mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// The cell-block literal with the frame suffix: `<path>,1`.
    pub fn frame_entry(&self) -> String {
        format!("{},1", self.0.display())
    }

    /// The cell-block literal without a frame suffix.
    pub fn plain_entry(&self) -> String {
        self.0.display().to_string()
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for ImageRef {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}
