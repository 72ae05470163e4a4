//! The pipeline orchestrator.
//!
//! Each stage method builds an operation specification, renders it into a
//! job document at a deterministic path inside the stage's pipeline
//! directory, submits the document for blocking execution against the
//! engine, and resolves the expected outputs by naming convention. The
//! engine gives no structured feedback; a stage that silently produced
//! nothing surfaces as a missing file in whatever consumes the resolved
//! path next.
//!
//! Nothing here is safe to run concurrently against the same pipeline
//! directory: job documents and model destinations are shared filesystem
//! state without locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::image::ImageRef;
use crate::naming::StageTag;
use crate::ops::{
    AtlasDeformationSpec, ContrastSpec, CoregisterSpec, DefineContrastSpec, EstimateSpec,
    GroupDesign, ModelFlags, NormalizeMriSpec, NormalizeMultiplePetSpec, NormalizePetSpec,
    OperationSpec, PullDeformationSpec, PushDeformationSpec, SegmentSpec, SmoothSpec,
    TwoSampleModelSpec, VbmModelSpec, WriteOptions,
};
use crate::stats;
use crate::subprocess::{EngineRunner, SubprocessManager};
use crate::volume::VolumeStore;

/// Outputs of an MRI normalization: the warped images plus the reusable
/// deformation field.
#[derive(Debug, Clone, PartialEq)]
pub struct MriNormalization {
    pub warped: Vec<PathBuf>,
    pub deformation_field: PathBuf,
}

/// Outputs of a PET normalization: the warped image plus the saved
/// transform matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct PetNormalization {
    pub warped: PathBuf,
    pub transform: PathBuf,
}

/// Artifacts of the composite two-sample statistical workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoSampleOutputs {
    pub model_matrix: PathBuf,
    pub t_map: PathBuf,
    pub effect_map: PathBuf,
    pub threshold_file: PathBuf,
    pub threshold: f64,
}

/// Orchestrates engine jobs for one installation.
pub struct SpmPipeline {
    config: EngineConfig,
    subprocess: SubprocessManager,
    volumes: Arc<dyn VolumeStore>,
}

impl SpmPipeline {
    pub fn new(
        config: EngineConfig,
        subprocess: SubprocessManager,
        volumes: Arc<dyn VolumeStore>,
    ) -> Self {
        Self {
            config,
            subprocess,
            volumes,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Renders `op` into `<job_dir>/<stage>.m` and runs it to completion.
    async fn submit(&self, op: &OperationSpec, job_dir: &Path) -> Result<PathBuf> {
        let job_path = job_dir.join(format!("{}.m", op.job_stem()));
        std::fs::write(&job_path, op.to_document())
            .map_err(|e| Error::storage_io("failed to write job document", &job_path, e))?;
        debug!("Submitting job document {}", job_path.display());
        self.subprocess
            .engine(&self.config)
            .run_batch(&job_path)
            .await?;
        Ok(job_path)
    }

    /// Rigidly aligns `source` onto `reference`; returns the resliced
    /// image path.
    pub async fn coregister(&self, reference: &ImageRef, source: &ImageRef) -> Result<PathBuf> {
        let job_dir = dir_of(source);
        let spec = OperationSpec::Coregister(CoregisterSpec {
            reference: reference.clone(),
            source: source.clone(),
        });
        self.submit(&spec, &job_dir).await?;
        Ok(StageTag::Resliced.derive(source.path()))
    }

    /// Warps an anatomical image to template space. `resample` lists the
    /// images written out in the normalized space; when empty, the source
    /// itself is resampled.
    pub async fn normalize_mri(
        &self,
        source: &ImageRef,
        template: &ImageRef,
        resample: Vec<ImageRef>,
        write: WriteOptions,
    ) -> Result<MriNormalization> {
        let resample = default_to_source(resample, source);
        let job_dir = dir_of(source);
        let spec = OperationSpec::NormalizeMri(NormalizeMriSpec {
            source: source.clone(),
            template: template.clone(),
            resample: resample.clone(),
            write,
        });
        self.submit(&spec, &job_dir).await?;
        Ok(MriNormalization {
            warped: resample
                .iter()
                .map(|img| StageTag::Warped.derive(img.path()))
                .collect(),
            deformation_field: StageTag::DeformationField.derive(source.path()),
        })
    }

    /// Warps a functional image to template space through the
    /// template-matching estimator; returns the warped image and the
    /// saved transform.
    pub async fn normalize_pet(
        &self,
        source: &ImageRef,
        template: &ImageRef,
        resample: Vec<ImageRef>,
        write: WriteOptions,
        wrapping: bool,
    ) -> Result<PetNormalization> {
        let resample = default_to_source(resample, source);
        let job_dir = dir_of(source);
        let spec = OperationSpec::NormalizePet(NormalizePetSpec {
            source: source.clone(),
            template: template.clone(),
            resample: resample.clone(),
            write,
            wrapping,
        });
        self.submit(&spec, &job_dir).await?;
        Ok(PetNormalization {
            warped: StageTag::Warped.derive(resample[0].path()),
            transform: StageTag::TransformMatrix.derive(source.path()),
        })
    }

    /// Normalizes a whole cohort in one job, one `subj(i)` entry per
    /// image. Returns the warped path of every source.
    pub async fn normalize_pet_batch(
        &self,
        work_dir: &Path,
        spec: NormalizeMultiplePetSpec,
    ) -> Result<Vec<PathBuf>> {
        require_images(&spec.sources, "batch normalization")?;
        let prefix = spec.prefix;
        let sources = spec.sources.clone();
        self.submit(&OperationSpec::NormalizeMultiplePet(spec), work_dir)
            .await?;
        Ok(sources
            .iter()
            .map(|img| crate::naming::prefixed(img.path(), prefix))
            .collect())
    }

    /// Applies a deformation field to `images` (forward direction).
    pub async fn apply_deformation(
        &self,
        field: &Path,
        images: Vec<ImageRef>,
        interpolation: i64,
    ) -> Result<Vec<PathBuf>> {
        require_images(&images, "deformation")?;
        let job_dir = dir_of(&images[0]);
        let spec = OperationSpec::PushDeformation(PushDeformationSpec {
            field: field.to_path_buf(),
            images: images.clone(),
            interpolation,
            prefix: 'w',
        });
        self.submit(&spec, &job_dir).await?;
        Ok(warped_paths(&images))
    }

    /// Applies the inverse of a saved transform to `images`, resampled in
    /// the space of `space`.
    pub async fn apply_inverse_transform(
        &self,
        matrix: &Path,
        space: &ImageRef,
        images: Vec<ImageRef>,
        interpolation: i64,
    ) -> Result<Vec<PathBuf>> {
        require_images(&images, "inverse deformation")?;
        let job_dir = dir_of(&images[0]);
        let spec = OperationSpec::PullDeformation(PullDeformationSpec {
            matrix: matrix.to_path_buf(),
            space: space.clone(),
            images: images.clone(),
            interpolation,
        });
        self.submit(&spec, &job_dir).await?;
        Ok(warped_paths(&images))
    }

    /// Back-projects a template-space atlas into native space, preserving
    /// its categorical labels.
    pub async fn backproject_atlas(
        &self,
        field: &Path,
        space: &ImageRef,
        atlas: &ImageRef,
    ) -> Result<PathBuf> {
        let job_dir = dir_of(atlas);
        let spec = OperationSpec::ApplyDeformationToAtlas(AtlasDeformationSpec {
            field: field.to_path_buf(),
            space: space.clone(),
            atlas: atlas.clone(),
        });
        self.submit(&spec, &job_dir).await?;
        Ok(StageTag::Warped.derive(atlas.path()))
    }

    /// Smooths `images` with a Gaussian kernel; returns the `s`-prefixed
    /// output paths.
    pub async fn smooth(
        &self,
        work_dir: &Path,
        images: Vec<ImageRef>,
        fwhm: [f64; 3],
    ) -> Result<Vec<PathBuf>> {
        require_images(&images, "smoothing")?;
        let spec = OperationSpec::Smooth(SmoothSpec {
            images: images.clone(),
            fwhm,
        });
        self.submit(&spec, work_dir).await?;
        Ok(images
            .iter()
            .map(|img| StageTag::Smoothed.derive(img.path()))
            .collect())
    }

    /// Renders the segmentation job document without running it, for
    /// callers that fan the work out to the engine themselves. Returns
    /// the document path.
    pub fn write_segmentation_job(&self, work_dir: &Path, spec: &SegmentSpec) -> Result<PathBuf> {
        require_images(&spec.images, "segmentation")?;
        let op = OperationSpec::Segment(spec.clone());
        let job_path = work_dir.join(format!("{}.m", op.job_stem()));
        std::fs::write(&job_path, op.to_document())
            .map_err(|e| Error::storage_io("failed to write job document", &job_path, e))?;
        Ok(job_path)
    }

    /// Segments the given images; the engine handles its own
    /// multi-process fan-out per `SegmentOptions::processes`.
    pub async fn segment(&self, work_dir: &Path, spec: SegmentSpec) -> Result<PathBuf> {
        require_images(&spec.images, "segmentation")?;
        self.submit(&OperationSpec::Segment(spec), work_dir).await
    }

    /// The composite statistical workflow: build the two-sample model,
    /// estimate it, compute the contrast, convert the t-map to Cohen's d
    /// and derive the significance threshold.
    ///
    /// Five fixed steps, no branching, no retries; the first failing step
    /// terminates the workflow and earlier artifacts stay in place. The
    /// destination directory is deleted and recreated up front, which is
    /// the only idempotence mechanism: rerunning against the same
    /// destination leaves only the new run's artifacts.
    pub async fn run_two_sample_ttest(
        &self,
        destination: &Path,
        design: GroupDesign,
        flags: ModelFlags,
        contrast: ContrastSpec,
    ) -> Result<TwoSampleOutputs> {
        design.validate()?;
        contrast.validate_width(design.design_columns())?;
        reset_dir(destination)?;

        let n1 = design.group_a.len();
        let n2 = design.group_b.len();
        let model_matrix = destination.join("SPM.mat");

        info!("Creating model in {}", destination.display());
        let spec = OperationSpec::BuildTwoSampleModel(TwoSampleModelSpec {
            destination: destination.to_path_buf(),
            design,
            flags,
        });
        self.submit(&spec, destination).await?;

        info!("Estimating model");
        let spec = OperationSpec::EstimateModel(EstimateSpec {
            model_matrix: model_matrix.clone(),
        });
        self.submit(&spec, destination).await?;

        info!("Computing contrast '{}'", contrast.name);
        let spec = OperationSpec::DefineContrast(DefineContrastSpec {
            model_matrix: model_matrix.clone(),
            contrast,
        });
        self.submit(&spec, destination).await?;

        info!("Converting t-map to Cohen's d");
        let t_map = destination.join("spmT_0001.nii");
        let stat_map = self.volumes.load(&t_map)?;
        let effect = stats::cohens_d_map(&stat_map, n1, n2);
        let effect_map = destination.join("cohens_d.nii");
        self.volumes.save(&effect_map, &effect)?;

        info!("Computing effect-size threshold");
        let threshold = stats::fdr_threshold(&stat_map, n1, n2)?;
        let threshold_file = destination.join("cohensd_thres.txt");
        std::fs::write(&threshold_file, format!("{threshold}"))
            .map_err(|e| Error::storage_io("failed to write threshold", &threshold_file, e))?;

        Ok(TwoSampleOutputs {
            model_matrix,
            t_map,
            effect_map,
            threshold_file,
            threshold,
        })
    }

    /// The combined VBM model: design, estimation and contrast batched as
    /// three slots of one document. TIV covariates are required and
    /// enter as the global ANCOVA values. Returns the model matrix path.
    pub async fn run_vbm_model(
        &self,
        destination: &Path,
        design: GroupDesign,
        contrast: ContrastSpec,
    ) -> Result<PathBuf> {
        design.validate()?;
        if !design.has_tiv() {
            return Err(Error::validation(
                "the VBM model requires TIV covariates for both groups",
            ));
        }
        contrast.validate_width(design.design_columns())?;
        reset_dir(destination)?;

        info!("Creating VBM model in {}", destination.display());
        let spec = OperationSpec::VbmModel(VbmModelSpec {
            destination: destination.to_path_buf(),
            design,
            toolbox_path: self.config.spm_root().to_path_buf(),
            contrast,
        });
        self.submit(&spec, destination).await?;
        Ok(destination.join("SPM.mat"))
    }
}

fn dir_of(image: &ImageRef) -> PathBuf {
    image
        .path()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

fn default_to_source(resample: Vec<ImageRef>, source: &ImageRef) -> Vec<ImageRef> {
    if resample.is_empty() {
        vec![source.clone()]
    } else {
        resample
    }
}

fn warped_paths(images: &[ImageRef]) -> Vec<PathBuf> {
    images
        .iter()
        .map(|img| StageTag::Warped.derive(img.path()))
        .collect()
}

fn require_images(images: &[ImageRef], what: &str) -> Result<()> {
    if images.is_empty() {
        return Err(Error::validation(format!("{what} requires at least one image")));
    }
    Ok(())
}

/// Destructive reset of a workflow destination: delete, then recreate.
/// Not atomic: a crash in between leaves no directory at all.
fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)
            .map_err(|e| Error::storage_io("failed to clear destination", dir, e))?;
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::storage_io("failed to create destination", dir, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::MemoryVolumeStore;

    fn fixture() -> (SpmPipeline, crate::subprocess::MockProcessRunner, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let spm = dir.path().join("cat12");
        let runtime = dir.path().join("mcr");
        std::fs::create_dir(&spm).unwrap();
        std::fs::create_dir(&runtime).unwrap();
        let config = EngineConfig::new(&spm, &runtime).unwrap();

        let (subprocess, mut mock) = SubprocessManager::mock();
        mock.expect_command(&config.launcher().display().to_string())
            .finish();

        let pipeline = SpmPipeline::new(config, subprocess, Arc::new(MemoryVolumeStore::new()));
        (pipeline, mock, dir)
    }

    #[tokio::test]
    async fn coregister_writes_document_and_resolves_output() {
        let (pipeline, mock, dir) = fixture();
        let subj = dir.path().join("s01");
        std::fs::create_dir(&subj).unwrap();
        let reference = ImageRef::new(subj.join("T1.nii"));
        let source = ImageRef::new(subj.join("PET.nii"));

        let output = pipeline.coregister(&reference, &source).await.unwrap();
        assert_eq!(output, subj.join("rPET.nii"));

        let document = std::fs::read_to_string(subj.join("coregister.m")).unwrap();
        assert!(document.contains("spm.spatial.coreg.estwrite.roptions.prefix = 'r';"));

        let calls = mock.call_history();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args[1], "batch");
        assert!(calls[0].args[2].ends_with("coregister.m"));
    }

    #[tokio::test]
    async fn normalize_mri_resolves_field_beside_source() {
        let (pipeline, _mock, dir) = fixture();
        let subj = dir.path().join("s01");
        std::fs::create_dir(&subj).unwrap();
        let source = ImageRef::new(subj.join("T1.nii"));
        let template = ImageRef::new(dir.path().join("TPM.nii"));

        let outputs = pipeline
            .normalize_mri(&source, &template, vec![], WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(outputs.warped, vec![subj.join("wT1.nii")]);
        assert_eq!(outputs.deformation_field, subj.join("y_T1.nii"));
        assert!(subj.join("normalize.m").exists());
    }

    #[tokio::test]
    async fn empty_image_list_fails_before_any_engine_call() {
        let (pipeline, mock, dir) = fixture();
        let err = pipeline
            .smooth(dir.path(), vec![], [8.0, 8.0, 8.0])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(mock.call_history().is_empty());
    }

    #[tokio::test]
    async fn segmentation_job_can_be_written_without_running() {
        let (pipeline, mock, dir) = fixture();
        let spec = SegmentSpec {
            images: vec![ImageRef::new(dir.path().join("T1.nii"))],
            tissue_template: dir.path().join("TPM.nii"),
            shooting_template: dir.path().join("Template_0.nii"),
            options: Default::default(),
        };
        let job = pipeline.write_segmentation_job(dir.path(), &spec).unwrap();
        assert_eq!(job, dir.path().join("cat12seg.m"));
        assert!(job.exists());
        assert!(mock.call_history().is_empty());
    }
}
