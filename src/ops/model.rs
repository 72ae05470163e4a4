use std::path::PathBuf;

use crate::batch::BatchScript;
use crate::error::{Error, Result};
use crate::image::ImageRef;

/// One cohort of a two-sample design: scans plus per-subject covariates.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub images: Vec<ImageRef>,
    pub ages: Vec<f64>,
    pub tiv: Option<Vec<f64>>,
}

impl Cohort {
    pub fn new(images: Vec<ImageRef>, ages: Vec<f64>) -> Self {
        Self {
            images,
            ages,
            tiv: None,
        }
    }

    pub fn with_tiv(mut self, tiv: Vec<f64>) -> Self {
        self.tiv = Some(tiv);
        self
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn validate(&self, label: &str) -> Result<()> {
        if self.images.is_empty() {
            return Err(Error::validation(format!("{label} has no scans")));
        }
        if self.ages.len() != self.images.len() {
            return Err(Error::validation(format!(
                "{label}: {} scans but {} ages",
                self.images.len(),
                self.ages.len()
            )));
        }
        if let Some(tiv) = &self.tiv {
            if tiv.len() != self.images.len() {
                return Err(Error::validation(format!(
                    "{label}: {} scans but {} TIV values",
                    self.images.len(),
                    tiv.len()
                )));
            }
        }
        Ok(())
    }
}

/// A two-cohort group comparison design with an analysis mask.
///
/// Covariate order is significant in the rendered document: covariate 1 is
/// always Age; covariate 2, when TIV is supplied, is always TIV. Values
/// are concatenated GroupA-then-GroupB, matching the scan blocks.
#[derive(Debug, Clone)]
pub struct GroupDesign {
    pub group_a: Cohort,
    pub group_b: Cohort,
    pub mask: ImageRef,
}

impl GroupDesign {
    pub fn validate(&self) -> Result<()> {
        self.group_a.validate("group A")?;
        self.group_b.validate("group B")?;
        if self.group_a.tiv.is_some() != self.group_b.tiv.is_some() {
            return Err(Error::validation(
                "TIV covariates must be supplied for both groups or neither",
            ));
        }
        Ok(())
    }

    pub fn has_tiv(&self) -> bool {
        self.group_a.tiv.is_some() && self.group_b.tiv.is_some()
    }

    /// Number of design-matrix columns: two group indicators plus one
    /// column per covariate block.
    pub fn design_columns(&self) -> usize {
        2 + 1 + usize::from(self.has_tiv())
    }

    fn ages(&self) -> Vec<f64> {
        let mut values = self.group_a.ages.clone();
        values.extend_from_slice(&self.group_b.ages);
        values
    }

    fn tiv(&self) -> Option<Vec<f64>> {
        match (&self.group_a.tiv, &self.group_b.tiv) {
            (Some(a), Some(b)) => {
                let mut values = a.clone();
                values.extend_from_slice(b);
                Some(values)
            }
            _ => None,
        }
    }
}

/// Design-level flags of the two-sample t-test
/// (`des.t2` plus global options).
#[derive(Debug, Clone, Copy)]
pub struct ModelFlags {
    pub dependence: i64,
    pub variance: i64,
    pub grand_mean_scaling: i64,
    pub ancova: i64,
    pub global_normalization: i64,
}

impl Default for ModelFlags {
    fn default() -> Self {
        Self {
            dependence: 0,
            variance: 1,
            grand_mean_scaling: 0,
            ancova: 0,
            global_normalization: 1,
        }
    }
}

/// Unpaired two-sample model specification
/// (`spm.stats.factorial_design`).
#[derive(Debug, Clone)]
pub struct TwoSampleModelSpec {
    pub destination: PathBuf,
    pub design: GroupDesign,
    pub flags: ModelFlags,
}

impl TwoSampleModelSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let design = &self.design;
        let mut slot = script.slot("spm.stats.factorial_design");
        slot.cell("dir", &format!("{}/", self.destination.display()));
        slot.cell_block(
            "des.t2.scans1",
            design.group_a.images.iter().map(ImageRef::frame_entry),
        );
        slot.cell_block(
            "des.t2.scans2",
            design.group_b.images.iter().map(ImageRef::frame_entry),
        );
        slot.int("des.t2.dept", self.flags.dependence);
        slot.int("des.t2.variance", self.flags.variance);
        slot.int("des.t2.gmsca", self.flags.grand_mean_scaling);
        slot.int("des.t2.ancova", self.flags.ancova);

        slot.column("cov(1).c", &design.ages());
        slot.text("cov(1).cname", "Age");
        slot.int("cov(1).iCFI", 1);
        slot.int("cov(1).iCC", 5);

        if let Some(tiv) = design.tiv() {
            slot.column("cov(2).c", &tiv);
            slot.text("cov(2).cname", "TIV");
            slot.int("cov(2).iCFI", 1);
            slot.int("cov(2).iCC", 1);
        }

        slot.verbatim("multi_cov", "struct('files', {}, 'iCFI', {}, 'iCC', {})");
        slot.flag("masking.tm.tm_none", true);
        slot.flag("masking.im", false);
        slot.cell("masking.em", &design.mask.frame_entry());
        slot.flag("globalc.g_omit", true);
        slot.flag("globalm.gmsca.gmsca_no", true);
        slot.int("globalm.glonorm", self.flags.global_normalization);
    }
}

/// Classical model estimation (`spm.stats.fmri_est`) against a built
/// model matrix.
#[derive(Debug, Clone)]
pub struct EstimateSpec {
    pub model_matrix: PathBuf,
}

impl EstimateSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.stats.fmri_est");
        slot.cell_path("spmmat", &self.model_matrix);
        slot.flag("write_residuals", false);
        slot.flag("method.Classical", true);
    }
}

/// A named t-contrast over the design columns.
#[derive(Debug, Clone)]
pub struct ContrastSpec {
    pub name: String,
    pub weights: Vec<f64>,
}

impl ContrastSpec {
    pub fn new(name: impl Into<String>, weights: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            weights,
        }
    }

    /// Rejects weight vectors that do not span the design columns. The
    /// engine would otherwise fail silently at estimation time.
    pub fn validate_width(&self, design_columns: usize) -> Result<()> {
        if self.weights.len() != design_columns {
            return Err(Error::validation(format!(
                "contrast '{}' has {} weights but the design has {} columns",
                self.name,
                self.weights.len(),
                design_columns
            )));
        }
        Ok(())
    }
}

/// Contrast definition (`spm.stats.con`) against an estimated model.
#[derive(Debug, Clone)]
pub struct DefineContrastSpec {
    pub model_matrix: PathBuf,
    pub contrast: ContrastSpec,
}

impl DefineContrastSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.stats.con");
        slot.cell_path("spmmat", &self.model_matrix);
        slot.text("consess{1}.tcon.name", &self.contrast.name);
        slot.vector("consess{1}.tcon.weights", &self.contrast.weights);
        slot.text("consess{1}.tcon.sessrep", "none");
        slot.flag("delete", false);
    }
}

/// Combined VBM model (`spm.tools.cat.factorial_design`): design,
/// estimation and contrast batched as slots 1-3 of a single document.
///
/// TIV enters as the global ANCOVA covariate rather than a `cov(2)` block,
/// and the mask cell carries no frame suffix here. The document starts
/// with an `addpath` preamble so the engine finds its toolbox.
#[derive(Debug, Clone)]
pub struct VbmModelSpec {
    pub destination: PathBuf,
    pub design: GroupDesign,
    pub toolbox_path: PathBuf,
    pub contrast: ContrastSpec,
}

impl VbmModelSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let design = &self.design;
        script.preamble(&format!("addpath('{}');", self.toolbox_path.display()));

        let mut slot = script.slot("spm.tools.cat.factorial_design");
        slot.cell("dir", &format!("{}/", self.destination.display()));
        slot.cell_block(
            "des.t2.scans1",
            design.group_a.images.iter().map(ImageRef::frame_entry),
        );
        slot.cell_block(
            "des.t2.scans2",
            design.group_b.images.iter().map(ImageRef::frame_entry),
        );
        slot.int("des.t2.dept", 0);
        slot.int("des.t2.variance", 1);
        slot.int("des.t2.gmsca", 0);
        slot.int("des.t2.ancova", 0);

        slot.column("cov.c", &design.ages());
        slot.text("cov.cname", "Age");
        slot.int("cov.iCFI", 1);
        slot.int("cov.iCC", 5);

        slot.verbatim("multi_cov", "struct('files', {}, 'iCFI', {}, 'iCC', {})");
        slot.flag("masking.tm.tm_none", true);
        slot.flag("masking.im", true);
        slot.cell("masking.em", &design.mask.plain_entry());
        slot.column(
            "globals.g_ancova.global_uval",
            &design.tiv().unwrap_or_default(),
        );
        slot.flag(
            "check_SPM.check_SPM_zscore.do_check_zscore.use_unsmoothed_data",
            true,
        );
        slot.flag("check_SPM_zscore.do_check_zscore.adjust_data", true);
        slot.flag("check_SPM.check_SPM_ortho", true);

        let model_matrix = self.destination.join("SPM.mat");
        EstimateSpec {
            model_matrix: model_matrix.clone(),
        }
        .render(script);
        DefineContrastSpec {
            model_matrix,
            contrast: self.contrast.clone(),
        }
        .render(script);
    }
}
