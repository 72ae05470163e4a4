use std::path::{Path, PathBuf};

use crate::batch::BatchScript;
use crate::image::ImageRef;

/// Applies a deformation field directly to a set of images
/// (`spm.util.defs`, forward direction).
///
/// Resampled outputs land beside their sources (`savesrc`), unmasked.
#[derive(Debug, Clone)]
pub struct PushDeformationSpec {
    pub field: PathBuf,
    pub images: Vec<ImageRef>,
    pub interpolation: i64,
    pub prefix: char,
}

impl PushDeformationSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.util.defs");
        slot.cell_path("comp{1}.def", &self.field);
        slot.cell_block(
            "out{1}.pull.fnames",
            self.images.iter().map(ImageRef::plain_entry),
        );
        slot.int("out{1}.pull.savedir.savesrc", 1);
        slot.int("out{1}.pull.interp", self.interpolation);
        slot.flag("out{1}.pull.mask", false);
        slot.vector("out{1}.pull.fwhm", &[0.0, 0.0, 0.0]);
        slot.text("out{1}.pull.prefix", &self.prefix.to_string());
    }
}

/// Applies the inverse of a saved normalization transform
/// (`spm.util.defs`, composed through `sn2def` plus a space image).
///
/// The `NaN` voxel-size and bounding-box literals tell the engine to take
/// both from the space image. Outputs are masked and written into the
/// directory of the first target image.
#[derive(Debug, Clone)]
pub struct PullDeformationSpec {
    pub matrix: PathBuf,
    pub space: ImageRef,
    pub images: Vec<ImageRef>,
    pub interpolation: i64,
}

impl PullDeformationSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let nan_row = [f64::NAN, f64::NAN, f64::NAN];
        let save_dir = self
            .images
            .first()
            .map(|img| img.path().parent().unwrap_or_else(|| Path::new("")).to_path_buf())
            .unwrap_or_default();
        let mut slot = script.slot("spm.util.defs");
        slot.cell_path("comp{1}.inv.comp{1}.sn2def.matname", &self.matrix);
        slot.vector("comp{1}.inv.comp{1}.sn2def.vox", &nan_row);
        slot.matrix("comp{1}.inv.comp{1}.sn2def.bb", &[&nan_row, &nan_row]);
        slot.cell_path("comp{1}.inv.space", self.space.path());
        slot.cell_block(
            "out{1}.pull.fnames",
            self.images.iter().map(ImageRef::plain_entry),
        );
        slot.cell(
            "out{1}.pull.savedir.saveusr",
            &format!("{}/", save_dir.display()),
        );
        slot.int("out{1}.pull.interp", self.interpolation);
        slot.flag("out{1}.pull.mask", true);
        slot.vector("out{1}.pull.fwhm", &[0.0, 0.0, 0.0]);
    }
}

/// Back-projects an atlas from template space into a subject's native
/// space through an inverted deformation field.
///
/// `preserve = 2` keeps categorical labels intact instead of smoothing
/// them through the resampling.
#[derive(Debug, Clone)]
pub struct AtlasDeformationSpec {
    pub field: PathBuf,
    pub space: ImageRef,
    pub atlas: ImageRef,
}

impl AtlasDeformationSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.util.defs");
        slot.cell_path("comp{1}.inv.comp{1}.def", &self.field);
        slot.cell_path("comp{1}.inv.space", self.space.path());
        slot.cell("out{1}.push.fnames", &self.atlas.plain_entry());
        slot.empty_cell("out{1}.push.weight");
        slot.int("out{1}.push.savedir.savesrc", 1);
        slot.cell_path("out{1}.push.fov.file", self.space.path());
        slot.int("out{1}.push.preserve", 2);
        slot.vector("out{1}.push.fwhm", &[0.0, 0.0, 0.0]);
        slot.text("out{1}.push.prefix", "w");
    }
}
