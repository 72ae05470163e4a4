use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Engine installation paths: the SPM/CAT12 toolbox root and the MATLAB
/// runtime root.
///
/// Both paths are checked once, at construction; no further existence
/// checks happen per job. Hold one `EngineConfig` per installation;
/// nothing here is global, so several installations can coexist in one
/// process and tests can point at throwaway directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    spm_root: PathBuf,
    runtime_root: PathBuf,
}

impl EngineConfig {
    pub fn new(spm_root: impl Into<PathBuf>, runtime_root: impl Into<PathBuf>) -> Result<Self> {
        let config = Self {
            spm_root: spm_root.into(),
            runtime_root: runtime_root.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a TOML file and validates it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::storage_io("failed to read engine config", path, e))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::config(format!("invalid engine config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.spm_root.exists() {
            return Err(Error::config(format!(
                "{} is not found",
                self.spm_root.display()
            )));
        }
        if !self.runtime_root.exists() {
            return Err(Error::config(format!(
                "{} is not found",
                self.runtime_root.display()
            )));
        }
        Ok(())
    }

    pub fn spm_root(&self) -> &Path {
        &self.spm_root
    }

    pub fn runtime_root(&self) -> &Path {
        &self.runtime_root
    }

    /// The headless batch launcher inside the toolbox root.
    pub fn launcher(&self) -> PathBuf {
        self.spm_root.join("run_spm12.sh")
    }
}
