use crate::batch::BatchScript;
use crate::image::ImageRef;

/// Gaussian smoothing of a set of images (`spm.spatial.smooth`).
///
/// Output datatype follows the input (`dtype = 0`), no implicit intensity
/// masking, `s` prefix.
#[derive(Debug, Clone)]
pub struct SmoothSpec {
    pub images: Vec<ImageRef>,
    pub fwhm: [f64; 3],
}

impl SmoothSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.spatial.smooth");
        slot.cell_block("data", self.images.iter().map(ImageRef::frame_entry));
        slot.vector("fwhm", &self.fwhm);
        slot.int("dtype", 0);
        slot.flag("im", false);
        slot.text("prefix", "s");
    }
}
