//! # spmbatch
//!
//! Batch job generation and pipeline orchestration for SPM12/CAT12 running
//! under a MATLAB runtime. The crate renders typed pipeline operations into
//! the engine's matlabbatch document dialect, executes the documents through
//! a subprocess abstraction, chains stage outputs by naming convention, and
//! post-processes the engine's statistical maps (Cohen's d conversion and
//! significance thresholding).
//!
//! ## Modules
//!
//! - `batch` - matlabbatch document builder (field paths, cell blocks, vectors)
//! - `config` - engine installation configuration
//! - `image` - image references as consumed by batch documents
//! - `naming` - stage output naming conventions
//! - `ops` - typed operation specifications and their renderers
//! - `pipeline` - the orchestrator: one method per pipeline stage
//! - `stats` - statistical post-processing of engine output maps
//! - `subprocess` - trait-based subprocess layer with a mock for testing
//! - `volume` - volumetric data arrays and the storage seam
pub mod batch;
pub mod config;
pub mod error;
pub mod image;
pub mod naming;
pub mod ops;
pub mod pipeline;
pub mod stats;
pub mod subprocess;
pub mod telemetry;
pub mod volume;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use image::ImageRef;
pub use pipeline::SpmPipeline;
