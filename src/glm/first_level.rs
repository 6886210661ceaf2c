//! First-level (within-subject) general linear model
//!
//! Fits every voxel's time series against the task design with ordinary
//! least squares, optionally after AR(1) prewhitening, and evaluates linear
//! contrasts as z-statistic volumes.

use crate::glm::design::{Condition, DesignMatrix, build_design, contrast_weights};
use crate::glm::{DriftModel, HrfModel, NoiseModel};
use crate::io::error::{Result, computation_error, invalid_parameter};
use crate::math::linalg::{cholesky, cholesky_solve};
use crate::math::probability::t_to_z;
use crate::volume::affine::Affine;
use crate::volume::{Series, Volume};
use ndarray::{Array1, Array2, Array3};

// Voxels flatter than this after detrending carry no information
const VARIANCE_FLOOR: f64 = 1e-12;

/// Options controlling the first-level fit
#[derive(Debug, Clone, Copy)]
pub struct FirstLevelOptions {
    /// Scan repetition time in seconds
    pub t_r: f64,
    /// Temporal noise model
    pub noise_model: NoiseModel,
    /// Whether to z-score each voxel's time series before fitting
    pub standardize: bool,
    /// Hemodynamic response basis
    pub hrf_model: HrfModel,
    /// Drift regressor model
    pub drift_model: DriftModel,
}

/// A first-level model ready to fit functional series
#[derive(Debug, Clone, Copy)]
pub struct FirstLevelModel {
    options: FirstLevelOptions,
}

impl FirstLevelModel {
    /// Create a model with the given options
    pub const fn new(options: FirstLevelOptions) -> Self {
        Self { options }
    }

    /// Fit the model to a functional series and condition set
    ///
    /// # Errors
    ///
    /// Returns an error if the design cannot be built, if there are fewer
    /// scans than regressors, or if the design matrix is rank deficient.
    pub fn fit(&self, series: &Series, conditions: &[Condition]) -> Result<FittedFirstLevel> {
        let n_scans = series.n_frames();
        let design = build_design(
            conditions,
            n_scans,
            self.options.t_r,
            self.options.hrf_model,
            self.options.drift_model,
        )?;
        let p = design.n_regressors();
        if n_scans <= p {
            return Err(invalid_parameter(
                "n_scans",
                &n_scans,
                &format!("need more scans than the {p} design regressors"),
            ));
        }

        let fit = fit_voxelwise(&design.matrix, series, self.options.standardize)?;

        let (betas, sigma2, xtx_chol, design_matrix) = match self.options.noise_model {
            NoiseModel::Ols => (fit.betas, fit.sigma2, fit.xtx_chol, design.matrix),
            NoiseModel::Ar1 => {
                let rho = fit.pooled_rho();
                if rho.abs() < 1e-3 {
                    (fit.betas, fit.sigma2, fit.xtx_chol, design.matrix)
                } else {
                    let whitened = whiten(&design.matrix, rho);
                    let refit = fit_voxelwise_whitened(
                        &whitened,
                        series,
                        self.options.standardize,
                        rho,
                    )?;
                    (refit.betas, refit.sigma2, refit.xtx_chol, whitened)
                }
            }
        };

        Ok(FittedFirstLevel {
            design: DesignMatrix {
                matrix: design_matrix,
                columns: design.columns,
            },
            betas,
            sigma2,
            xtx_chol,
            df: (n_scans - p) as f64,
            shape: series.spatial_shape(),
            affine: series.affine,
        })
    }
}

/// Result of a first-level fit, ready for contrast evaluation
#[derive(Debug, Clone)]
pub struct FittedFirstLevel {
    design: DesignMatrix,
    betas: Array2<f64>,
    sigma2: Array1<f64>,
    xtx_chol: Array2<f64>,
    df: f64,
    shape: (usize, usize, usize),
    affine: Affine,
}

impl FittedFirstLevel {
    /// Regressor names of the fitted design
    pub fn columns(&self) -> &[String] {
        &self.design.columns
    }

    /// Residual degrees of freedom
    pub const fn degrees_of_freedom(&self) -> f64 {
        self.df
    }

    /// Evaluate a symbolic contrast as a z-statistic volume
    ///
    /// # Errors
    ///
    /// Returns an error if the expression names an unknown regressor.
    pub fn compute_contrast(&self, expression: &str) -> Result<Volume> {
        let weights = contrast_weights(expression, &self.design.columns)?;
        let direction = cholesky_solve(&self.xtx_chol, &weights.view());
        let variance_factor = weights.dot(&direction);
        if variance_factor <= 0.0 {
            return Err(computation_error(
                "compute_contrast",
                &"contrast variance factor is not positive",
            ));
        }

        let mut z = Array3::<f32>::zeros(self.shape);
        for (voxel, zv) in z.iter_mut().enumerate() {
            let effect = self.betas.row(voxel).dot(&weights);
            let variance = self.sigma2[voxel] * variance_factor;
            let t = if variance > VARIANCE_FLOOR {
                effect / variance.sqrt()
            } else {
                0.0
            };
            *zv = t_to_z(t, self.df) as f32;
        }
        Ok(Volume::new(z, self.affine))
    }

    /// Evaluate a symbolic contrast as a raw effect-size volume
    ///
    /// # Errors
    ///
    /// Returns an error if the expression names an unknown regressor.
    pub fn compute_contrast_effect(&self, expression: &str) -> Result<Volume> {
        let weights = contrast_weights(expression, &self.design.columns)?;
        let mut effect = Array3::<f32>::zeros(self.shape);
        for (voxel, value) in effect.iter_mut().enumerate() {
            *value = self.betas.row(voxel).dot(&weights) as f32;
        }
        Ok(Volume::new(effect, self.affine))
    }
}

struct VoxelwiseFit {
    betas: Array2<f64>,
    sigma2: Array1<f64>,
    xtx_chol: Array2<f64>,
    // Lag-1 residual autocovariance accumulators, pooled over voxels
    resid_cross: f64,
    resid_auto: f64,
}

impl VoxelwiseFit {
    fn pooled_rho(&self) -> f64 {
        if self.resid_auto > VARIANCE_FLOOR {
            (self.resid_cross / self.resid_auto).clamp(-0.99, 0.99)
        } else {
            0.0
        }
    }
}

fn extract_voxel_series(
    series: &Series,
    voxel: usize,
    shape: (usize, usize, usize),
    standardize: bool,
) -> Option<Vec<f64>> {
    let (_, ny, nz) = shape;
    let k = voxel % nz;
    let j = (voxel / nz) % ny;
    let i = voxel / (nz * ny);
    let n_t = series.n_frames();

    let mut y: Vec<f64> = (0..n_t)
        .map(|t| f64::from(series.data[[i, j, k, t]]))
        .collect();

    if standardize {
        let n = y.len() as f64;
        let mean = y.iter().sum::<f64>() / n;
        let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        if var <= VARIANCE_FLOOR {
            return None;
        }
        let std = var.sqrt();
        for v in &mut y {
            *v = (*v - mean) / std;
        }
    }
    Some(y)
}

fn fit_voxelwise(x: &Array2<f64>, series: &Series, standardize: bool) -> Result<VoxelwiseFit> {
    fit_core(x, series, standardize, None)
}

fn fit_voxelwise_whitened(
    x_whitened: &Array2<f64>,
    series: &Series,
    standardize: bool,
    rho: f64,
) -> Result<VoxelwiseFit> {
    fit_core(x_whitened, series, standardize, Some(rho))
}

fn fit_core(
    x: &Array2<f64>,
    series: &Series,
    standardize: bool,
    rho: Option<f64>,
) -> Result<VoxelwiseFit> {
    let n_scans = x.nrows();
    let p = x.ncols();
    let shape = series.spatial_shape();
    let n_voxels = shape.0 * shape.1 * shape.2;
    let df = (n_scans - p) as f64;

    let xtx = x.t().dot(x);
    let xtx_chol = cholesky(&xtx)?;

    let mut betas = Array2::<f64>::zeros((n_voxels, p));
    let mut sigma2 = Array1::<f64>::zeros(n_voxels);
    let mut resid_cross = 0.0;
    let mut resid_auto = 0.0;

    for voxel in 0..n_voxels {
        let Some(mut y) = extract_voxel_series(series, voxel, shape, standardize) else {
            // Flat voxel: leave zero betas and zero variance
            continue;
        };
        if let Some(rho) = rho {
            whiten_series(&mut y, rho);
        }

        let mut rhs = Array1::<f64>::zeros(p);
        for (t, &yv) in y.iter().enumerate() {
            for c in 0..p {
                rhs[c] += x[[t, c]] * yv;
            }
        }

        let b = cholesky_solve(&xtx_chol, &rhs.view());

        let mut rss = 0.0;
        let mut prev_resid = 0.0;
        for (t, &yv) in y.iter().enumerate() {
            let mut fitted = 0.0;
            for c in 0..p {
                fitted += x[[t, c]] * b[c];
            }
            let resid = yv - fitted;
            rss += resid * resid;
            if t > 0 {
                resid_cross += resid * prev_resid;
            }
            prev_resid = resid;
        }
        resid_auto += rss;

        betas.row_mut(voxel).assign(&b);
        sigma2[voxel] = rss / df;
    }

    Ok(VoxelwiseFit {
        betas,
        sigma2,
        xtx_chol,
        resid_cross,
        resid_auto,
    })
}

// Cochrane-Orcutt style AR(1) prewhitening transform
fn whiten(x: &Array2<f64>, rho: f64) -> Array2<f64> {
    let mut out = x.clone();
    let scale = (1.0 - rho * rho).sqrt();
    let n = x.nrows();
    for c in 0..x.ncols() {
        out[[0, c]] = x[[0, c]] * scale;
        for t in 1..n {
            out[[t, c]] = x[[t, c]] - rho * x[[t - 1, c]];
        }
    }
    out
}

fn whiten_series(y: &mut [f64], rho: f64) {
    let scale = (1.0 - rho * rho).sqrt();
    for t in (1..y.len()).rev() {
        y[t] -= rho * y[t - 1];
    }
    if let Some(first) = y.first_mut() {
        *first *= scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn test_options(noise_model: NoiseModel) -> FirstLevelOptions {
        FirstLevelOptions {
            t_r: 2.0,
            noise_model,
            standardize: false,
            hrf_model: HrfModel::Spm,
            drift_model: DriftModel::None,
        }
    }

    fn task_condition() -> Vec<Condition> {
        vec![Condition {
            name: "task".to_string(),
            onsets: vec![10.0, 60.0, 110.0],
            durations: vec![20.0, 20.0, 20.0],
        }]
    }

    // Synthetic series: one voxel carries the task regressor plus small
    // deterministic ripple, the rest carry ripple only
    fn synthetic_series(n_scans: usize) -> Series {
        let conditions = task_condition();
        let design =
            build_design(&conditions, n_scans, 2.0, HrfModel::Spm, DriftModel::None).unwrap();

        let mut data = Array4::<f32>::zeros((3, 3, 3, n_scans));
        for t in 0..n_scans {
            let ripple = (0.37 * t as f64).sin() * 0.05;
            for i in 0..3 {
                for j in 0..3 {
                    for k in 0..3 {
                        data[[i, j, k, t]] = (ripple * ((i + j + k) as f64 + 1.0)) as f32;
                    }
                }
            }
            data[[1, 1, 1, t]] += (3.0 * design.matrix[[t, 0]]) as f32;
        }
        Series::new(data, Affine::identity())
    }

    #[test]
    fn test_fit_recovers_task_effect() {
        let series = synthetic_series(80);
        let fitted = FirstLevelModel::new(test_options(NoiseModel::Ols))
            .fit(&series, &task_condition())
            .unwrap();

        let effect = fitted.compute_contrast_effect("task").unwrap();
        assert!((effect.data[[1, 1, 1]] - 3.0).abs() < 0.1);

        let z = fitted.compute_contrast("task").unwrap();
        assert!(z.data[[1, 1, 1]] > 3.0, "z = {}", z.data[[1, 1, 1]]);
        assert!(z.data[[0, 0, 0]].abs() < z.data[[1, 1, 1]]);
    }

    #[test]
    fn test_ar1_fit_produces_finite_maps() {
        let series = synthetic_series(80);
        let fitted = FirstLevelModel::new(test_options(NoiseModel::Ar1))
            .fit(&series, &task_condition())
            .unwrap();
        let z = fitted.compute_contrast("task").unwrap();
        assert!(z.data.iter().all(|v| v.is_finite()));
        assert!(z.data[[1, 1, 1]] > 0.0);
    }

    #[test]
    fn test_flat_voxels_yield_zero_z_when_standardized() {
        let n_scans = 40;
        let data = Array4::<f32>::from_elem((2, 2, 2, n_scans), 100.0);
        let series = Series::new(data, Affine::identity());
        let mut options = test_options(NoiseModel::Ols);
        options.standardize = true;
        let fitted = FirstLevelModel::new(options)
            .fit(&series, &task_condition())
            .unwrap();
        let z = fitted.compute_contrast("task").unwrap();
        assert!(z.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_too_few_scans_rejected() {
        let data = Array4::<f32>::zeros((2, 2, 2, 2));
        let series = Series::new(data, Affine::identity());
        let result =
            FirstLevelModel::new(test_options(NoiseModel::Ols)).fit(&series, &task_condition());
        assert!(result.is_err());
    }
}
