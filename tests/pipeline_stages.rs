//! Stage-level pipeline tests: document placement, engine invocation and
//! output resolution by naming convention.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use spmbatch::config::EngineConfig;
use spmbatch::image::ImageRef;
use spmbatch::ops::{
    EstimationOptions, NormalizeMultiplePetSpec, SegmentOptions, SegmentSpec, WriteOptions,
};
use spmbatch::pipeline::SpmPipeline;
use spmbatch::subprocess::{MockProcessRunner, ProcessRunner, SubprocessManager};
use spmbatch::volume::MemoryVolumeStore;

struct Fixture {
    pipeline: SpmPipeline,
    mock: MockProcessRunner,
    _dir: tempfile::TempDir,
    root: PathBuf,
}

fn fixture() -> Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let spm = dir.path().join("cat12");
    let runtime = dir.path().join("mcr");
    std::fs::create_dir(&spm)?;
    std::fs::create_dir(&runtime)?;
    let config = EngineConfig::new(&spm, &runtime)?;

    let mut mock = MockProcessRunner::new();
    mock.expect_command(&config.launcher().display().to_string())
        .finish();
    let subprocess = SubprocessManager::new(Arc::new(mock.clone()) as Arc<dyn ProcessRunner>);

    let root = dir.path().to_path_buf();
    let pipeline = SpmPipeline::new(config, subprocess, Arc::new(MemoryVolumeStore::new()));
    Ok(Fixture {
        pipeline,
        mock,
        _dir: dir,
        root,
    })
}

#[tokio::test]
async fn normalize_pet_resolves_warped_image_and_transform() -> Result<()> {
    let f = fixture()?;
    let subj = f.root.join("s01");
    std::fs::create_dir(&subj)?;
    let source = ImageRef::new(subj.join("PET.nii"));
    let template = ImageRef::new(f.root.join("PET_template.nii"));

    let outputs = f
        .pipeline
        .normalize_pet(&source, &template, vec![], WriteOptions::default(), true)
        .await?;
    assert_eq!(outputs.warped, subj.join("wPET.nii"));
    assert_eq!(outputs.transform, subj.join("PET_sn.mat"));

    let document = std::fs::read_to_string(subj.join("normalize.m"))?;
    assert!(document.contains("spm.tools.oldnorm.estwrite.roptions.wrap = [1 1 1];"));
    assert!(document.contains("roptions.prefix = 'w';"));
    Ok(())
}

#[tokio::test]
async fn batch_normalization_handles_every_subject() -> Result<()> {
    let f = fixture()?;
    let work = f.root.join("proc");
    std::fs::create_dir(&work)?;
    let sources: Vec<ImageRef> = (1..=3)
        .map(|i| ImageRef::new(f.root.join(format!("s{i:02}/PET.nii"))))
        .collect();

    let warped = f
        .pipeline
        .normalize_pet_batch(
            &work,
            NormalizeMultiplePetSpec {
                sources: sources.clone(),
                template: ImageRef::new(f.root.join("PET_template.nii")),
                estimation: EstimationOptions::default(),
                write: WriteOptions::default(),
                wrapping: true,
                prefix: 'w',
            },
        )
        .await?;

    assert_eq!(
        warped,
        vec![
            f.root.join("s01/wPET.nii"),
            f.root.join("s02/wPET.nii"),
            f.root.join("s03/wPET.nii"),
        ]
    );

    let document = std::fs::read_to_string(work.join("normalize.m"))?;
    for subj in 1..=3 {
        assert!(document.contains(&format!("subj({subj}).source")));
    }
    assert!(f.mock.verify_called(
        &f.pipeline.config().launcher().display().to_string(),
        1
    ));
    Ok(())
}

#[tokio::test]
async fn deformation_directions_set_their_mask_flags() -> Result<()> {
    let f = fixture()?;
    let subj = f.root.join("s01");
    std::fs::create_dir(&subj)?;
    let images = vec![ImageRef::new(subj.join("gm.nii"))];

    let forward = f
        .pipeline
        .apply_deformation(&subj.join("y_T1.nii"), images.clone(), 4)
        .await?;
    assert_eq!(forward, vec![subj.join("wgm.nii")]);
    let document = std::fs::read_to_string(subj.join("deformations.m"))?;
    assert!(document.contains("out{1}.pull.mask = 0;"));
    assert!(document.contains("comp{1}.def = "));

    let inverse = f
        .pipeline
        .apply_inverse_transform(
            &subj.join("PET_sn.mat"),
            &ImageRef::new(subj.join("PET.nii")),
            images,
            0,
        )
        .await?;
    assert_eq!(inverse, vec![subj.join("wgm.nii")]);
    let document = std::fs::read_to_string(subj.join("deformations.m"))?;
    assert!(document.contains("out{1}.pull.mask = 1;"));
    assert!(document.contains("comp{1}.inv.comp{1}.sn2def.matname = "));
    Ok(())
}

#[tokio::test]
async fn atlas_backprojection_outputs_beside_atlas() -> Result<()> {
    let f = fixture()?;
    let subj = f.root.join("s01");
    std::fs::create_dir(&subj)?;

    let output = f
        .pipeline
        .backproject_atlas(
            &subj.join("y_T1.nii"),
            &ImageRef::new(subj.join("wT1.nii")),
            &ImageRef::new(subj.join("aparc.nii")),
        )
        .await?;
    assert_eq!(output, subj.join("waparc.nii"));

    let document = std::fs::read_to_string(subj.join("deformations.m"))?;
    assert!(document.contains("out{1}.push.preserve = 2;"));
    Ok(())
}

#[tokio::test]
async fn smoothing_outputs_carry_the_s_prefix() -> Result<()> {
    let f = fixture()?;
    let work = f.root.join("proc");
    std::fs::create_dir(&work)?;
    let images = vec![
        ImageRef::new(f.root.join("s01/wPET.nii")),
        ImageRef::new(f.root.join("s02/wPET.nii")),
    ];

    let smoothed = f.pipeline.smooth(&work, images, [8.0, 8.0, 8.0]).await?;
    assert_eq!(
        smoothed,
        vec![f.root.join("s01/swPET.nii"), f.root.join("s02/swPET.nii")]
    );

    let document = std::fs::read_to_string(work.join("smooth.m"))?;
    assert!(document.contains("spm.spatial.smooth.fwhm = [8 8 8];"));
    Ok(())
}

#[tokio::test]
async fn segment_runs_the_engine_once() -> Result<()> {
    let f = fixture()?;
    let work = f.root.join("proc");
    std::fs::create_dir(&work)?;

    let job = f
        .pipeline
        .segment(
            &work,
            SegmentSpec {
                images: vec![ImageRef::new(f.root.join("s01/T1.nii"))],
                tissue_template: f.root.join("TPM.nii"),
                shooting_template: f.root.join("Template_0.nii"),
                options: SegmentOptions::default(),
            },
        )
        .await?;
    assert_eq!(job, work.join("cat12seg.m"));

    let document = std::fs::read_to_string(&job)?;
    assert!(document.contains("spm.tools.cat.estwrite.nproc = 4;"));
    assert!(document.contains("output.warps = [1 0];"));

    let calls = f.mock.call_history();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec![
        f.pipeline.config().runtime_root().display().to_string(),
        "batch".to_string(),
        job.display().to_string(),
    ]);
    Ok(())
}
