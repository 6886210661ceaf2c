//! Second-level (group) model: intercept-only fit over subject maps
//!
//! Each subject contributes one contrast volume; the group design matrix is
//! a single intercept column, so the fit reduces to a voxel-wise one-sample
//! t-test whose statistic is reported on the z scale together with a
//! two-sided p-value map.

use crate::io::error::{PipelineError, Result, invalid_parameter};
use crate::math::probability::{normal_two_sided_p, t_to_z};
use crate::volume::Volume;
use crate::volume::smooth::smooth_fwhm;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

const VARIANCE_FLOOR: f64 = 1e-12;

/// Options controlling the group fit
#[derive(Debug, Clone, Copy)]
pub struct SecondLevelOptions {
    /// Isotropic Gaussian smoothing applied to each input map, FWHM in mm
    pub smoothing_fwhm: f64,
}

/// Group-level output for one contrast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResult {
    /// Voxel-wise group z-scores
    pub z_map: Volume,
    /// Voxel-wise two-sided p-values
    pub p_map: Volume,
    /// Number of subjects that entered the fit
    pub n_subjects: usize,
}

/// Fit the intercept-only group model over per-subject contrast maps
///
/// # Errors
///
/// Returns an invalid parameter error with fewer than two maps, a grid
/// mismatch error if the maps do not share a voxel grid, and propagates
/// smoothing failures.
pub fn fit_one_sample(maps: &[Volume], options: SecondLevelOptions) -> Result<GroupResult> {
    let n = maps.len();
    if n < 2 {
        return Err(invalid_parameter(
            "maps",
            &n,
            &"group fit needs at least two subject maps",
        ));
    }

    let reference = &maps[0];
    for map in &maps[1..] {
        if !map.same_grid(reference) {
            return Err(PipelineError::GridMismatch {
                operation: "group fit",
                expected: reference.shape(),
                actual: map.shape(),
            });
        }
    }

    let smoothed: Vec<Volume> = maps
        .iter()
        .map(|m| smooth_fwhm(m, options.smoothing_fwhm))
        .collect::<Result<_>>()?;

    let shape = reference.shape();
    let df = (n - 1) as f64;
    let mut z_map = Array3::<f32>::zeros(shape);
    let mut p_map = Array3::<f32>::zeros(shape);

    for i in 0..shape.0 {
        for j in 0..shape.1 {
            for k in 0..shape.2 {
                let mut sum = 0.0_f64;
                for map in &smoothed {
                    sum += f64::from(map.data[[i, j, k]]);
                }
                let mean = sum / n as f64;

                let mut ss = 0.0_f64;
                for map in &smoothed {
                    let d = f64::from(map.data[[i, j, k]]) - mean;
                    ss += d * d;
                }
                let variance = ss / df;

                let t = if variance > VARIANCE_FLOOR {
                    mean / (variance / n as f64).sqrt()
                } else {
                    0.0
                };
                let z = t_to_z(t, df);
                z_map[[i, j, k]] = z as f32;
                p_map[[i, j, k]] = normal_two_sided_p(z) as f32;
            }
        }
    }

    Ok(GroupResult {
        z_map: Volume::new(z_map, reference.affine),
        p_map: Volume::new(p_map, reference.affine),
        n_subjects: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::affine::Affine;
    use ndarray::Array3;

    fn subject_map(value_at_center: f32) -> Volume {
        let mut data = Array3::<f32>::zeros((5, 5, 5));
        data[[2, 2, 2]] = value_at_center;
        Volume::new(data, Affine::identity())
    }

    #[test]
    fn test_consistent_effect_yields_positive_z_and_small_p() {
        let maps: Vec<Volume> = [3.0, 3.2, 2.8, 3.1, 2.9, 3.0]
            .iter()
            .map(|&v| subject_map(v))
            .collect();
        let result = fit_one_sample(&maps, SecondLevelOptions { smoothing_fwhm: 0.0 }).unwrap();
        let z = result.z_map.data[[2, 2, 2]];
        let p = result.p_map.data[[2, 2, 2]];
        assert!(z > 3.0, "z = {z}");
        assert!(p < 0.01, "p = {p}");
        assert_eq!(result.n_subjects, 6);
    }

    #[test]
    fn test_zero_maps_yield_zero_z_unit_p() {
        let maps: Vec<Volume> = (0..4).map(|_| subject_map(0.0)).collect();
        let result = fit_one_sample(&maps, SecondLevelOptions { smoothing_fwhm: 0.0 }).unwrap();
        assert_eq!(result.z_map.data[[2, 2, 2]], 0.0);
        assert_eq!(result.p_map.data[[2, 2, 2]], 1.0);
    }

    #[test]
    fn test_single_map_rejected() {
        let maps = vec![subject_map(1.0)];
        assert!(fit_one_sample(&maps, SecondLevelOptions { smoothing_fwhm: 0.0 }).is_err());
    }

    #[test]
    fn test_grid_mismatch_rejected() {
        let a = subject_map(1.0);
        let b = Volume::new(Array3::<f32>::zeros((4, 4, 4)), Affine::identity());
        let result = fit_one_sample(&[a, b], SecondLevelOptions { smoothing_fwhm: 0.0 });
        assert!(matches!(
            result,
            Err(PipelineError::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_smoothing_spreads_group_effect() {
        let maps: Vec<Volume> = [9.0, 10.0, 11.0, 10.0].iter().map(|&v| subject_map(v)).collect();
        let unsmoothed =
            fit_one_sample(&maps, SecondLevelOptions { smoothing_fwhm: 0.0 }).unwrap();
        let smoothed =
            fit_one_sample(&maps, SecondLevelOptions { smoothing_fwhm: 4.0 }).unwrap();
        // Without smoothing the effect is confined to the centre voxel
        assert_eq!(unsmoothed.z_map.data[[1, 2, 2]], 0.0);
        // Smoothing carries the (proportionally scaled) effect to neighbours
        assert!(smoothed.z_map.data[[1, 2, 2]] > 0.0);
    }
}
