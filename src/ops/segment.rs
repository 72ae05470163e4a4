use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::batch::BatchScript;
use crate::image::ImageRef;

/// The full toggle record for tissue segmentation
/// (`spm.tools.cat.estwrite`).
///
/// The engine resolves omitted fields to unrelated defaults, so the
/// renderer emits every one of these, including the zeros. `processes`
/// controls the engine's own multi-process fan-out and is opaque to this
/// crate.
///
/// Output toggles come in families per tissue class: native-space, warped
/// (template-space), modulated and DARTEL-export variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    pub processes: i64,
    pub bias_accuracy: f64,
    /// Affine preprocessing code (APP).
    pub app: i64,
    pub kamap: i64,
    pub las_strength: f64,
    pub skull_strip_strength: f64,
    pub wmh_correction: i64,
    pub shooting_strength: f64,
    pub output_voxel_size: f64,
    /// Optimal-resolution pair: target voxel size and tolerance.
    pub resolution: [f64; 2],

    pub surface: bool,
    pub surface_measures: bool,

    pub atlas_neuromorphometrics: bool,
    pub atlas_lpba40: bool,
    pub atlas_cobra: bool,
    pub atlas_hammers: bool,
    pub custom_atlas: Option<PathBuf>,

    pub gray_native: bool,
    pub gray_modulated: bool,
    pub gray_dartel: bool,

    pub white_native: bool,
    pub white_modulated: bool,
    pub white_dartel: bool,

    pub csf_native: bool,
    pub csf_warped: bool,
    pub csf_modulated: bool,
    pub csf_dartel: bool,

    pub thickness_native: bool,
    pub thickness_warped: bool,
    pub thickness_dartel: bool,

    pub position_native: bool,
    pub position_warped: bool,
    pub position_dartel: bool,

    pub wmh_native: bool,
    pub wmh_warped: bool,
    pub wmh_modulated: bool,
    pub wmh_dartel: bool,

    pub lesion_native: bool,
    pub lesion_warped: bool,
    pub lesion_modulated: bool,
    pub lesion_dartel: bool,

    pub tpmc_native: bool,
    pub tpmc_warped: bool,
    pub tpmc_modulated: bool,
    pub tpmc_dartel: bool,

    pub atlas_native: bool,

    pub labels_native: bool,
    pub labels_warped: bool,
    pub labels_dartel: bool,

    pub bias_warped: bool,

    pub las_native: bool,
    pub las_warped: bool,
    pub las_dartel: bool,

    pub jacobian_warped: bool,
    /// Forward and inverse deformation-field outputs.
    pub warps: [bool; 2],
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            processes: 4,
            bias_accuracy: 0.5,
            app: 1070,
            kamap: 0,
            las_strength: 0.5,
            skull_strip_strength: 2.0,
            wmh_correction: 1,
            shooting_strength: 0.5,
            output_voxel_size: 1.5,
            resolution: [1.0, 0.1],
            surface: false,
            surface_measures: false,
            atlas_neuromorphometrics: false,
            atlas_lpba40: false,
            atlas_cobra: false,
            atlas_hammers: false,
            custom_atlas: None,
            gray_native: false,
            gray_modulated: true,
            gray_dartel: false,
            white_native: false,
            white_modulated: true,
            white_dartel: false,
            csf_native: false,
            csf_warped: false,
            csf_modulated: true,
            csf_dartel: false,
            thickness_native: false,
            thickness_warped: false,
            thickness_dartel: false,
            position_native: false,
            position_warped: false,
            position_dartel: false,
            wmh_native: false,
            wmh_warped: false,
            wmh_modulated: false,
            wmh_dartel: false,
            lesion_native: false,
            lesion_warped: false,
            lesion_modulated: false,
            lesion_dartel: false,
            tpmc_native: false,
            tpmc_warped: false,
            tpmc_modulated: false,
            tpmc_dartel: false,
            atlas_native: false,
            labels_native: true,
            labels_warped: false,
            labels_dartel: false,
            bias_warped: true,
            las_native: false,
            las_warped: false,
            las_dartel: false,
            jacobian_warped: false,
            warps: [true, false],
        }
    }
}

/// Tissue segmentation of a set of anatomical images.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub images: Vec<ImageRef>,
    /// Tissue probability template (`TPM.nii`).
    pub tissue_template: PathBuf,
    /// Shooting registration template volumes.
    pub shooting_template: PathBuf,
    pub options: SegmentOptions,
}

impl SegmentSpec {
    pub fn render(&self, script: &mut BatchScript) {
        let opts = &self.options;
        let mut slot = script.slot("spm.tools.cat.estwrite");
        slot.cell_block("data", self.images.iter().map(ImageRef::frame_entry));
        slot.empty_cell("data_wmh");
        slot.int("nproc", opts.processes);
        slot.empty_text("useprior");
        slot.cell_path("opts.tpm", &self.tissue_template);
        slot.text("opts.affreg", "mni");
        slot.num("opts.biasacc", opts.bias_accuracy);

        slot.int("extopts.APP", opts.app);
        slot.int("extopts.spm_kamap", opts.kamap);
        slot.num("extopts.LASstr", opts.las_strength);
        slot.num("extopts.gcutstr", opts.skull_strip_strength);
        slot.int("extopts.WMHC", opts.wmh_correction);
        slot.cell_path(
            "extopts.registration.shooting.shootingtpm",
            &self.shooting_template,
        );
        slot.num("extopts.registration.shooting.regstr", opts.shooting_strength);
        slot.num("extopts.vox", opts.output_voxel_size);
        slot.vector("extopts.restypes.optimal", &opts.resolution);
        slot.flag("extopts.ignoreErrors", true);

        slot.flag("output.surface", opts.surface);
        slot.flag("output.surf_measures", opts.surface_measures);
        slot.flag(
            "output.ROImenu.atlases.neuromorphometrics",
            opts.atlas_neuromorphometrics,
        );
        slot.flag("output.ROImenu.atlases.lpba40", opts.atlas_lpba40);
        slot.flag("output.ROImenu.atlases.cobra", opts.atlas_cobra);
        slot.flag("output.ROImenu.atlases.hammers", opts.atlas_hammers);
        match &opts.custom_atlas {
            Some(atlas) => slot.cell_path("output.ROImenu.atlases.ownatlas", atlas),
            None => slot.empty_cell("output.ROImenu.atlases.ownatlas"),
        }

        slot.flag("output.GM.native", opts.gray_native);
        slot.flag("output.GM.mod", opts.gray_modulated);
        slot.flag("output.GM.dartel", opts.gray_dartel);

        slot.flag("output.WM.native", opts.white_native);
        slot.flag("output.WM.mod", opts.white_modulated);
        slot.flag("output.WM.dartel", opts.white_dartel);

        slot.flag("output.CSF.native", opts.csf_native);
        slot.flag("output.CSF.warped", opts.csf_warped);
        slot.flag("output.CSF.mod", opts.csf_modulated);
        slot.flag("output.CSF.dartel", opts.csf_dartel);

        slot.flag("output.ct.native", opts.thickness_native);
        slot.flag("output.ct.warped", opts.thickness_warped);
        slot.flag("output.ct.dartel", opts.thickness_dartel);

        slot.flag("output.pp.native", opts.position_native);
        slot.flag("output.pp.warped", opts.position_warped);
        slot.flag("output.pp.dartel", opts.position_dartel);

        slot.flag("output.WMH.native", opts.wmh_native);
        slot.flag("output.WMH.warped", opts.wmh_warped);
        slot.flag("output.WMH.mod", opts.wmh_modulated);
        slot.flag("output.WMH.dartel", opts.wmh_dartel);

        slot.flag("output.SL.native", opts.lesion_native);
        slot.flag("output.SL.warped", opts.lesion_warped);
        slot.flag("output.SL.mod", opts.lesion_modulated);
        slot.flag("output.SL.dartel", opts.lesion_dartel);

        slot.flag("output.TPMC.native", opts.tpmc_native);
        slot.flag("output.TPMC.warped", opts.tpmc_warped);
        slot.flag("output.TPMC.mod", opts.tpmc_modulated);
        slot.flag("output.TPMC.dartel", opts.tpmc_dartel);

        slot.flag("output.atlas.native", opts.atlas_native);

        slot.flag("output.label.native", opts.labels_native);
        slot.flag("output.label.warped", opts.labels_warped);
        slot.flag("output.label.dartel", opts.labels_dartel);
        // The engine reads both the structured label toggle and this flat
        // alias; they must stay in sync.
        slot.flag("output.labelnative", opts.labels_native);

        slot.flag("output.bias.warped", opts.bias_warped);
        slot.flag("output.las.native", opts.las_native);
        slot.flag("output.las.warped", opts.las_warped);
        slot.flag("output.las.dartel", opts.las_dartel);
        slot.flag("output.jacobianwarped", opts.jacobian_warped);
        let warps = [
            if opts.warps[0] { 1.0 } else { 0.0 },
            if opts.warps[1] { 1.0 } else { 0.0 },
        ];
        slot.vector("output.warps", &warps);
    }
}
