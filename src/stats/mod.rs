//! Numeric post-processing of engine output maps.
//!
//! Two computations run downstream of a two-sample contrast: conversion of
//! the t-statistic map to a Cohen's d effect-size map, and estimation of a
//! significance-based intensity threshold on the d scale. The threshold is
//! the 5th percentile of the t-values surviving a p < 0.05 filter, a
//! project-specific heuristic kept exactly as-is rather than a
//! Benjamini-Hochberg procedure.

pub mod tdist;

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Significance level for the survival filter.
const P_CUTOFF: f64 = 0.05;
/// Percentile taken over the surviving t-values.
const THRESHOLD_PERCENTILE: f64 = 5.0;

/// Scale factor from a two-sample t-statistic to Cohen's d under the
/// equal-variance assumption: `sqrt(1/n1 + 1/n2)`.
pub fn cohens_d_factor(n1: usize, n2: usize) -> f64 {
    (1.0 / n1 as f64 + 1.0 / n2 as f64).sqrt()
}

/// Converts a t-statistic map into a Cohen's d map.
///
/// Pure: the source volume is untouched, the output shares its shape and
/// metadata. Non-finite voxels propagate unchanged through the scaling.
pub fn cohens_d_map(map: &Volume, n1: usize, n2: usize) -> Volume {
    let factor = cohens_d_factor(n1, n2);
    Volume::new(map.data.mapv(|v| v * factor), map.meta.clone())
}

/// Computes the significance threshold of a t-statistic map on the
/// Cohen's d scale.
///
/// The map is flattened; exact-zero voxels are discarded; the unique
/// absolute t-values are sorted ascending; values with an upper-tail
/// p-value below 0.05 under a Student-t with `n1 + n2 - 2` degrees of
/// freedom survive; the threshold is the 5th percentile of the survivors,
/// scaled by `sqrt(1/n1 + 1/n2)`.
///
/// An empty surviving set is a `Numeric` error: with nothing significant
/// in the map there is no defensible threshold to report.
pub fn fdr_threshold(map: &Volume, n1: usize, n2: usize) -> Result<f64> {
    let mut values: Vec<f64> = map
        .data
        .iter()
        .filter(|v| **v != 0.0)
        .map(|v| v.abs())
        .collect();
    values.sort_by(f64::total_cmp);
    values.dedup();

    let df = (n1 + n2 - 2) as f64;
    let surviving: Vec<f64> = values
        .into_iter()
        .filter(|t| tdist::survival(*t, df) < P_CUTOFF)
        .collect();

    if surviving.is_empty() {
        return Err(Error::numeric(
            "no t-values survive the p < 0.05 filter; threshold is undefined",
        ));
    }

    let threshold = percentile(&surviving, THRESHOLD_PERCENTILE);
    Ok(threshold * cohens_d_factor(n1, n2))
}

/// Linear-interpolation percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q / 100.0;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
