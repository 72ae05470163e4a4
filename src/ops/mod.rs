//! Typed operation specifications and their batch renderers.
//!
//! Each specification struct owns the parameters of one engine operation
//! and knows how to render itself into a [`BatchScript`] slot. The field
//! paths, literal forms and emission order in these renderers are a fixed
//! protocol contract with the engine; the engine has no reliable implicit
//! defaults, so renderers emit every field they own even when the value is
//! zero.

pub mod coregister;
pub mod deformation;
pub mod model;
pub mod normalize;
pub mod segment;
pub mod smooth;

pub use coregister::CoregisterSpec;
pub use deformation::{AtlasDeformationSpec, PullDeformationSpec, PushDeformationSpec};
pub use model::{
    Cohort, ContrastSpec, DefineContrastSpec, EstimateSpec, GroupDesign, ModelFlags,
    TwoSampleModelSpec, VbmModelSpec,
};
pub use normalize::{
    BoundingBox, EstimationOptions, NormalizeMriSpec, NormalizeMultiplePetSpec, NormalizePetSpec,
    WriteOptions,
};
pub use segment::{SegmentOptions, SegmentSpec};
pub use smooth::SmoothSpec;

use crate::batch::BatchScript;

/// A tagged pipeline operation, ready to render into one job document.
#[derive(Debug, Clone)]
pub enum OperationSpec {
    Coregister(CoregisterSpec),
    NormalizeMri(NormalizeMriSpec),
    NormalizePet(NormalizePetSpec),
    NormalizeMultiplePet(NormalizeMultiplePetSpec),
    PushDeformation(PushDeformationSpec),
    PullDeformation(PullDeformationSpec),
    ApplyDeformationToAtlas(AtlasDeformationSpec),
    Smooth(SmoothSpec),
    Segment(SegmentSpec),
    BuildTwoSampleModel(TwoSampleModelSpec),
    EstimateModel(EstimateSpec),
    DefineContrast(DefineContrastSpec),
    VbmModel(VbmModelSpec),
}

impl OperationSpec {
    pub fn render(&self, script: &mut BatchScript) {
        match self {
            OperationSpec::Coregister(spec) => spec.render(script),
            OperationSpec::NormalizeMri(spec) => spec.render(script),
            OperationSpec::NormalizePet(spec) => spec.render(script),
            OperationSpec::NormalizeMultiplePet(spec) => spec.render(script),
            OperationSpec::PushDeformation(spec) => spec.render(script),
            OperationSpec::PullDeformation(spec) => spec.render(script),
            OperationSpec::ApplyDeformationToAtlas(spec) => spec.render(script),
            OperationSpec::Smooth(spec) => spec.render(script),
            OperationSpec::Segment(spec) => spec.render(script),
            OperationSpec::BuildTwoSampleModel(spec) => spec.render(script),
            OperationSpec::EstimateModel(spec) => spec.render(script),
            OperationSpec::DefineContrast(spec) => spec.render(script),
            OperationSpec::VbmModel(spec) => spec.render(script),
        }
    }

    /// The job-document file stem for this operation. Each pipeline
    /// directory holds at most one document per stage.
    pub fn job_stem(&self) -> &'static str {
        match self {
            OperationSpec::Coregister(_) => "coregister",
            OperationSpec::NormalizeMri(_)
            | OperationSpec::NormalizePet(_)
            | OperationSpec::NormalizeMultiplePet(_) => "normalize",
            OperationSpec::PushDeformation(_)
            | OperationSpec::PullDeformation(_)
            | OperationSpec::ApplyDeformationToAtlas(_) => "deformations",
            OperationSpec::Smooth(_) => "smooth",
            OperationSpec::Segment(_) => "cat12seg",
            OperationSpec::BuildTwoSampleModel(_) => "model",
            OperationSpec::EstimateModel(_) => "estimate",
            OperationSpec::DefineContrast(_) => "results",
            OperationSpec::VbmModel(_) => "cat_12_vbm",
        }
    }

    /// Renders this operation as a complete document.
    pub fn to_document(&self) -> String {
        let mut script = BatchScript::new();
        self.render(&mut script);
        script.into_text()
    }
}
