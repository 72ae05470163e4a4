use crate::batch::BatchScript;
use crate::image::ImageRef;

/// Rigid coregistration of a source image onto a reference image
/// (`spm.spatial.coreg.estwrite`).
///
/// Cost function, separation, tolerances and smoothing are the engine's
/// standard estimate-and-reslice settings; the resliced output carries the
/// `r` prefix.
#[derive(Debug, Clone)]
pub struct CoregisterSpec {
    pub reference: ImageRef,
    pub source: ImageRef,
}

impl CoregisterSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let mut slot = script.slot("spm.spatial.coreg.estwrite");
        slot.cell("ref", &self.reference.frame_entry());
        slot.cell("source", &self.source.frame_entry());
        slot.empty_cell("other");
        slot.text("eoptions.cost_fun", "nmi");
        slot.vector("eoptions.sep", &[4.0, 2.0]);
        slot.vector(
            "eoptions.tol",
            &[
                0.02, 0.02, 0.02, 0.001, 0.001, 0.001, 0.01, 0.01, 0.01, 0.001, 0.001, 0.001,
            ],
        );
        slot.vector("eoptions.fwhm", &[7.0, 7.0]);
        slot.int("roptions.interp", 4);
        slot.vector("roptions.wrap", &[0.0, 0.0, 0.0]);
        slot.flag("roptions.mask", false);
        slot.text("roptions.prefix", "r");
    }
}
