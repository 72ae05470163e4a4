use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::builder::ProcessCommandBuilder;
use super::error::ProcessError;
use super::runner::{ProcessOutput, ProcessRunner};

/// Runs matlabbatch job documents against an engine installation.
///
/// The engine is launched headless: `run_spm12.sh <runtime> batch <job>`.
/// The call blocks until the engine process exits; no timeout is applied,
/// so a hung engine hangs the caller. The exit status is returned as-is:
/// the engine may fail or silently no-op without signalling, and callers
/// resolve expected outputs by naming convention either way.
#[async_trait]
pub trait EngineRunner: Send + Sync {
    async fn run_batch(&self, job: &Path) -> Result<ProcessOutput, ProcessError>;
}

pub struct SpmEngineRunner {
    runner: Arc<dyn ProcessRunner>,
    launcher: PathBuf,
    runtime: PathBuf,
}

impl SpmEngineRunner {
    pub fn new(runner: Arc<dyn ProcessRunner>, launcher: PathBuf, runtime: PathBuf) -> Self {
        Self {
            runner,
            launcher,
            runtime,
        }
    }
}

#[async_trait]
impl EngineRunner for SpmEngineRunner {
    async fn run_batch(&self, job: &Path) -> Result<ProcessOutput, ProcessError> {
        let command = ProcessCommandBuilder::new(self.launcher.display().to_string())
            .arg(self.runtime.display().to_string())
            .arg("batch")
            .arg(job.display().to_string())
            .build();

        let output = self.runner.run(command).await?;
        if !output.status.success() {
            tracing::warn!(
                "Engine returned status {:?} for job {}; proceeding by naming convention",
                output.status,
                job.display()
            );
        }
        Ok(output)
    }
}
