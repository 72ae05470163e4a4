use crate::batch::{BatchScript, SlotWriter};
use crate::image::ImageRef;

/// Bounding box of the written volume in template space, millimetres.
///
/// Rendered as a 2x3 matrix literal: minima row, then maxima row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [-84.0, -102.0, -84.0],
            max: [84.0, 102.0, 84.0],
        }
    }
}

/// Reslicing options shared by the normalization variants.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    pub bounding_box: BoundingBox,
    pub voxel_size: [f64; 3],
    pub interpolation: i64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            bounding_box: BoundingBox::default(),
            voxel_size: [1.0, 1.0, 1.0],
            interpolation: 4,
        }
    }
}

/// Estimation options for the template-matching normalization
/// (`spm.tools.oldnorm`).
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOptions {
    pub source_smoothing: f64,
    pub template_smoothing: f64,
    pub regularization_type: String,
    pub cutoff: f64,
    pub iterations: i64,
    pub regularization: f64,
    pub preserve: i64,
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self {
            source_smoothing: 8.0,
            template_smoothing: 3.0,
            regularization_type: "mni".to_string(),
            cutoff: 15.0,
            iterations: 16,
            regularization: 1.0,
            preserve: 0,
        }
    }
}

/// Unified segmentation-based normalization of an anatomical image
/// (`spm.spatial.normalise.estwrite`).
///
/// The tissue probability template is addressed without a frame suffix (it
/// is a multi-volume file). Besides the `w`-prefixed resampled images, the
/// engine writes a reusable deformation field `y_<stem>.nii` beside the
/// source.
#[derive(Debug, Clone)]
pub struct NormalizeMriSpec {
    pub source: ImageRef,
    pub template: ImageRef,
    pub resample: Vec<ImageRef>,
    pub write: WriteOptions,
}

impl NormalizeMriSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.spatial.normalise.estwrite");
        slot.cell("subj.vol", &self.source.frame_entry());
        slot.cell_block(
            "subj.resample",
            self.resample.iter().map(ImageRef::frame_entry),
        );
        slot.num("eoptions.biasreg", 0.01);
        slot.int("eoptions.biasfwhm", 60);
        slot.cell_path("eoptions.tpm", self.template.path());
        slot.text("eoptions.affreg", "mni");
        slot.vector("eoptions.reg", &[0.0, 0.001, 0.5, 0.05, 0.2]);
        slot.int("eoptions.fwhm", 0);
        slot.int("eoptions.samp", 3);
        write_bounding_block(&mut slot, "woptions", &self.write);
    }
}

/// Template-matching normalization of a functional image
/// (`spm.tools.oldnorm.estwrite`) with the engine's standard estimation
/// settings. Writes `w`-prefixed images and saves the transform as
/// `<stem>_sn.mat`.
#[derive(Debug, Clone)]
pub struct NormalizePetSpec {
    pub source: ImageRef,
    pub template: ImageRef,
    pub resample: Vec<ImageRef>,
    pub write: WriteOptions,
    pub wrapping: bool,
}

impl NormalizePetSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.tools.oldnorm.estwrite");
        slot.cell("subj.source", &self.source.frame_entry());
        slot.empty_text("subj.wtsrc");
        slot.cell_block(
            "subj.resample",
            self.resample.iter().map(ImageRef::frame_entry),
        );
        write_oldnorm_options(
            &mut slot,
            &self.template,
            &EstimationOptions::default(),
            &self.write,
            self.wrapping,
            'w',
        );
    }
}

/// Batch template-matching normalization: one slot, one fully-populated
/// `subj(i)` sub-entry per source image (1-based), followed by the shared
/// estimation and reslicing options.
#[derive(Debug, Clone)]
pub struct NormalizeMultiplePetSpec {
    pub sources: Vec<ImageRef>,
    pub template: ImageRef,
    pub estimation: EstimationOptions,
    pub write: WriteOptions,
    pub wrapping: bool,
    pub prefix: char,
}

impl NormalizeMultiplePetSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.tools.oldnorm.estwrite");
        for (i, source) in self.sources.iter().enumerate() {
            let subj = i + 1;
            slot.cell(&format!("subj({subj}).source"), &source.frame_entry());
            slot.empty_text(&format!("subj({subj}).wtsrc"));
            slot.cell(&format!("subj({subj}).resample"), &source.frame_entry());
        }
        write_oldnorm_options(
            &mut slot,
            &self.template,
            &self.estimation,
            &self.write,
            self.wrapping,
            self.prefix,
        );
    }
}

fn write_bounding_block(slot: &mut SlotWriter<'_>, group: &str, write: &WriteOptions) {
    let bb = write.bounding_box;
    slot.matrix(&format!("{group}.bb"), &[&bb.min, &bb.max]);
    slot.vector(&format!("{group}.vox"), &write.voxel_size);
    slot.int(&format!("{group}.interp"), write.interpolation);
}

fn write_oldnorm_options(
    slot: &mut SlotWriter<'_>,
    template: &ImageRef,
    estimation: &EstimationOptions,
    write: &WriteOptions,
    wrapping: bool,
    prefix: char,
) {
    slot.cell("eoptions.template", &template.frame_entry());
    slot.empty_text("eoptions.weight");
    slot.num("eoptions.smosrc", estimation.source_smoothing);
    slot.num("eoptions.smoref", estimation.template_smoothing);
    slot.text("eoptions.regtype", &estimation.regularization_type);
    slot.num("eoptions.cutoff", estimation.cutoff);
    slot.int("eoptions.nits", estimation.iterations);
    slot.num("eoptions.reg", estimation.regularization);
    slot.int("roptions.preserve", estimation.preserve);
    write_bounding_block(slot, "roptions", write);
    let wrap = if wrapping { 1.0 } else { 0.0 };
    slot.vector("roptions.wrap", &[wrap, wrap, wrap]);
    slot.text("roptions.prefix", &prefix.to_string());
}
