//! End-to-end tests of the composite statistical workflow against a mock
//! engine and an in-memory volume store.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use ndarray::ArrayD;

use spmbatch::config::EngineConfig;
use spmbatch::image::ImageRef;
use spmbatch::ops::{Cohort, ContrastSpec, GroupDesign, ModelFlags};
use spmbatch::pipeline::SpmPipeline;
use spmbatch::subprocess::{MockProcessRunner, ProcessRunner, SubprocessManager};
use spmbatch::volume::{MemoryVolumeStore, Volume, VolumeMeta};

struct Fixture {
    pipeline: SpmPipeline,
    mock: MockProcessRunner,
    volumes: MemoryVolumeStore,
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
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

    let volumes = MemoryVolumeStore::new();
    let root = dir.path().to_path_buf();
    let pipeline = SpmPipeline::new(config, subprocess, Arc::new(volumes.clone()));
    Ok(Fixture {
        pipeline,
        mock,
        volumes,
        _dir: dir,
        root,
    })
}

fn t_map(values: &[f64]) -> Volume {
    Volume::new(
        ArrayD::from_shape_vec(vec![values.len()], values.to_vec()).unwrap(),
        VolumeMeta {
            affine: [
                [2.0, 0.0, 0.0, -90.0],
                [0.0, 2.0, 0.0, -126.0],
                [0.0, 0.0, 2.0, -72.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            header: vec![1, 2, 3, 4],
        },
    )
}

fn design(root: &Path, n1: usize, n2: usize) -> GroupDesign {
    let cohort = |label: &str, n: usize, age0: f64| {
        Cohort::new(
            (0..n)
                .map(|i| ImageRef::new(root.join(format!("{label}/s{i:02}/swPET.nii"))))
                .collect(),
            (0..n).map(|i| age0 + i as f64).collect(),
        )
    };
    GroupDesign {
        group_a: cohort("a", n1, 61.0),
        group_b: cohort("b", n2, 63.0),
        mask: ImageRef::new(root.join("mask.nii")),
    }
}

#[tokio::test]
async fn workflow_produces_all_five_artifacts() -> Result<()> {
    let f = fixture()?;
    let dest = f.root.join("model");
    f.volumes.insert(
        dest.join("spmT_0001.nii"),
        t_map(&[-3.0, -2.0, 0.0, 0.0, 2.0, 3.0]),
    );

    let outputs = f
        .pipeline
        .run_two_sample_ttest(
            &dest,
            design(&f.root, 10, 10),
            ModelFlags::default(),
            ContrastSpec::new("hypometabolism", vec![1.0, -1.0, 0.0]),
        )
        .await?;

    // One document per model step, all inside the destination.
    for stem in ["model", "estimate", "results"] {
        assert!(dest.join(format!("{stem}.m")).exists(), "{stem}.m missing");
    }
    assert!(f.mock.verify_called(
        &f.pipeline.config().launcher().display().to_string(),
        3
    ));

    assert_eq!(outputs.model_matrix, dest.join("SPM.mat"));
    assert_eq!(outputs.t_map, dest.join("spmT_0001.nii"));
    assert_eq!(outputs.effect_map, dest.join("cohens_d.nii"));
    assert_eq!(outputs.threshold_file, dest.join("cohensd_thres.txt"));

    // Effect map: same shape and metadata, scaled by sqrt(1/10 + 1/10).
    let effect = f.volumes.get(&outputs.effect_map).expect("effect map saved");
    let factor = (0.2_f64).sqrt();
    assert!((effect.data[0] - (-3.0) * factor).abs() < 1e-12);
    assert_eq!(effect.meta, t_map(&[]).meta);

    // Threshold: 5th percentile of the surviving {2, 3} on the d scale.
    let expected = 2.05 * factor;
    assert!((outputs.threshold - expected).abs() < 1e-12);
    let written: f64 = std::fs::read_to_string(&outputs.threshold_file)?.parse()?;
    assert_eq!(written, outputs.threshold);
    Ok(())
}

#[tokio::test]
async fn model_document_matches_design() -> Result<()> {
    let f = fixture()?;
    let dest = f.root.join("model");
    f.volumes
        .insert(dest.join("spmT_0001.nii"), t_map(&[2.5, -2.5, 0.0]));

    f.pipeline
        .run_two_sample_ttest(
            &dest,
            design(&f.root, 3, 4),
            ModelFlags::default(),
            ContrastSpec::new("hypometabolism", vec![1.0, -1.0, 0.0]),
        )
        .await?;

    let model = std::fs::read_to_string(dest.join("model.m"))?;
    assert!(model.contains(&format!(
        "spm.stats.factorial_design.dir = {{'{}/'}};",
        dest.display()
    )));
    // 3 + 4 ages, group A first.
    let block_start = model.find("cov(1).c = [\n").unwrap();
    let block = &model[block_start..model[block_start..].find("];").unwrap() + block_start];
    assert_eq!(block.lines().skip(1).count(), 7);
    assert!(model.contains("cov(1).cname = 'Age';"));
    assert!(!model.contains("cov(2)"));

    let estimate = std::fs::read_to_string(dest.join("estimate.m"))?;
    assert!(estimate.contains(&format!(
        "spm.stats.fmri_est.spmmat = {{'{}'}};",
        dest.join("SPM.mat").display()
    )));

    let results = std::fs::read_to_string(dest.join("results.m"))?;
    assert!(results.contains("consess{1}.tcon.name = 'hypometabolism';"));
    assert!(results.contains("consess{1}.tcon.weights = [1 -1 0];"));
    Ok(())
}

#[tokio::test]
async fn rerun_leaves_only_second_runs_artifacts() -> Result<()> {
    let f = fixture()?;
    let dest = f.root.join("model");

    f.volumes
        .insert(dest.join("spmT_0001.nii"), t_map(&[3.0, -3.0, 0.0]));
    f.pipeline
        .run_two_sample_ttest(
            &dest,
            design(&f.root, 10, 10),
            ModelFlags::default(),
            ContrastSpec::new("first", vec![1.0, -1.0, 0.0]),
        )
        .await?;

    // A stale artifact from outside the second run's five steps.
    std::fs::write(dest.join("stale_scratch.txt"), "leftover")?;
    let first_results = std::fs::read_to_string(dest.join("results.m"))?;

    f.pipeline
        .run_two_sample_ttest(
            &dest,
            design(&f.root, 12, 10),
            ModelFlags::default(),
            ContrastSpec::new("second", vec![1.0, -1.0, 0.0]),
        )
        .await?;

    assert!(!dest.join("stale_scratch.txt").exists());
    let second_results = std::fs::read_to_string(dest.join("results.m"))?;
    assert_ne!(first_results, second_results);
    assert!(second_results.contains("'second'"));
    Ok(())
}

#[tokio::test]
async fn contrast_width_mismatch_fails_before_any_engine_call() -> Result<()> {
    let f = fixture()?;
    let dest = f.root.join("model");

    let err = f
        .pipeline
        .run_two_sample_ttest(
            &dest,
            design(&f.root, 2, 2),
            ModelFlags::default(),
            ContrastSpec::new("too-wide", vec![1.0, -1.0, 0.0, 0.0]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, spmbatch::Error::Validation { .. }));
    assert!(f.mock.call_history().is_empty());
    assert!(!dest.exists());
    Ok(())
}

#[tokio::test]
async fn insignificant_map_stops_at_threshold_step() -> Result<()> {
    let f = fixture()?;
    let dest = f.root.join("model");
    // |t| = 1 at df = 18 is nowhere near significant.
    f.volumes
        .insert(dest.join("spmT_0001.nii"), t_map(&[1.0, -1.0, 0.0]));

    let err = f
        .pipeline
        .run_two_sample_ttest(
            &dest,
            design(&f.root, 10, 10),
            ModelFlags::default(),
            ContrastSpec::new("flat", vec![1.0, -1.0, 0.0]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, spmbatch::Error::Numeric { .. }));
    // Earlier steps' artifacts stay in place; the threshold file does not
    // exist.
    assert!(f.volumes.contains(&dest.join("cohens_d.nii")));
    assert!(!dest.join("cohensd_thres.txt").exists());
    Ok(())
}

#[tokio::test]
async fn missing_t_map_surfaces_at_first_read() -> Result<()> {
    let f = fixture()?;
    let dest = f.root.join("model");
    // The engine "ran" (mock succeeds) but produced nothing.
    let err = f
        .pipeline
        .run_two_sample_ttest(
            &dest,
            design(&f.root, 10, 10),
            ModelFlags::default(),
            ContrastSpec::new("empty", vec![1.0, -1.0, 0.0]),
        )
        .await
        .unwrap_err();

    match err {
        spmbatch::Error::Storage { path, .. } => {
            assert_eq!(path, Some(dest.join("spmT_0001.nii")));
        }
        other => panic!("unexpected error: {other}"),
    }
    // The three model documents were still written and submitted.
    assert!(f.mock.call_history().len() == 3);
    Ok(())
}

#[tokio::test]
async fn vbm_model_batches_design_estimate_contrast() -> Result<()> {
    let f = fixture()?;
    let dest = f.root.join("vbm");
    let mut d = design(&f.root, 2, 2);
    d.group_a.tiv = Some(vec![1400.0, 1390.0]);
    d.group_b.tiv = Some(vec![1510.0, 1480.0]);

    let matrix = f
        .pipeline
        .run_vbm_model(&dest, d, ContrastSpec::new("Atrophy", vec![1.0, -1.0, 0.0, 0.0]))
        .await?;
    assert_eq!(matrix, dest.join("SPM.mat"));

    // One document, one engine call, three slots.
    assert_eq!(f.mock.call_history().len(), 1);
    let document = std::fs::read_to_string(dest.join("cat_12_vbm.m"))?;
    assert!(document.contains("matlabbatch{1}.spm.tools.cat.factorial_design."));
    assert!(document.contains("matlabbatch{2}.spm.stats.fmri_est."));
    assert!(document.contains("matlabbatch{3}.spm.stats.con."));
    assert!(document.starts_with(&format!(
        "addpath('{}');\n",
        f.pipeline.config().spm_root().display()
    )));
    Ok(())
}

#[tokio::test]
async fn vbm_model_without_tiv_is_rejected() -> Result<()> {
    let f = fixture()?;
    let err = f
        .pipeline
        .run_vbm_model(
            &f.root.join("vbm"),
            design(&f.root, 2, 2),
            ContrastSpec::new("Atrophy", vec![1.0, -1.0, 0.0, 0.0]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, spmbatch::Error::Validation { .. }));
    Ok(())
}
