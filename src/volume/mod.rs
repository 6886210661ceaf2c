//! In-memory image model: 3-D statistical volumes and 4-D functional series

/// Voxel-to-world affine transforms
pub mod affine;
/// Trilinear resampling onto a target grid
pub mod resample;
/// Separable Gaussian smoothing
pub mod smooth;

use crate::io::error::{PipelineError, Result};
use affine::Affine;
use ndarray::{Array1, Array3, Array4, Axis};
use serde::{Deserialize, Serialize};

/// A single 3-D volume with its voxel-to-world affine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Voxel data, indexed (x, y, z)
    pub data: Array3<f32>,
    /// Voxel-to-world transform
    pub affine: Affine,
}

impl Volume {
    /// Construct a volume from data and affine
    pub const fn new(data: Array3<f32>, affine: Affine) -> Self {
        Self { data, affine }
    }

    /// Grid shape (nx, ny, nz)
    pub fn shape(&self) -> (usize, usize, usize) {
        let d = self.data.dim();
        (d.0, d.1, d.2)
    }

    /// Whether this volume shares shape and affine with another
    pub fn same_grid(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.affine.approx_eq(&other.affine, 1e-4)
    }

    /// Minimum and maximum voxel values, ignoring non-finite entries
    pub fn value_range(&self) -> (f32, f32) {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for &v in &self.data {
            if v.is_finite() {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if lo > hi { (0.0, 0.0) } else { (lo, hi) }
    }
}

/// A 4-D functional series with its voxel-to-world affine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    /// Voxel data, indexed (x, y, z, t)
    pub data: Array4<f32>,
    /// Voxel-to-world transform
    pub affine: Affine,
}

impl Series {
    /// Construct a series from data and affine
    pub const fn new(data: Array4<f32>, affine: Affine) -> Self {
        Self { data, affine }
    }

    /// Number of time points
    pub fn n_frames(&self) -> usize {
        self.data.dim().3
    }

    /// Spatial grid shape (nx, ny, nz)
    pub fn spatial_shape(&self) -> (usize, usize, usize) {
        let d = self.data.dim();
        (d.0, d.1, d.2)
    }

    /// Copy of a single time frame as a 3-D volume
    pub fn frame(&self, t: usize) -> Volume {
        Volume::new(self.data.index_axis(Axis(3), t).to_owned(), self.affine)
    }

    /// First frame; the convention for collapsing a 4-D statistical image
    pub fn first_frame(&self) -> Volume {
        self.frame(0)
    }

    /// Mean signal inside a boolean mask at each time point
    ///
    /// # Errors
    ///
    /// Returns a grid mismatch error if the mask doesn't match the spatial
    /// grid, and an invalid-volume error for an empty mask.
    pub fn roi_mean_series(&self, mask: &Array3<bool>) -> Result<Array1<f32>> {
        let spatial = self.spatial_shape();
        let d = mask.dim();
        if d != spatial {
            return Err(PipelineError::GridMismatch {
                operation: "ROI signal extraction",
                expected: spatial,
                actual: (d.0, d.1, d.2),
            });
        }

        let n_in_mask = mask.iter().filter(|&&m| m).count();
        if n_in_mask == 0 {
            return Err(PipelineError::InvalidVolume {
                reason: "ROI mask selects no voxels".to_string(),
            });
        }

        let n_t = self.n_frames();
        let mut out = Array1::<f32>::zeros(n_t);
        for t in 0..n_t {
            let frame = self.data.index_axis(Axis(3), t);
            let mut sum = 0.0_f64;
            for (&v, &m) in frame.iter().zip(mask.iter()) {
                if m {
                    sum += f64::from(v);
                }
            }
            out[t] = (sum / n_in_mask as f64) as f32;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    #[test]
    fn test_value_range_ignores_nan() {
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[[0, 0, 0]] = f32::NAN;
        data[[1, 1, 1]] = 3.5;
        data[[0, 1, 0]] = -2.0;
        let vol = Volume::new(data, Affine::identity());
        assert_eq!(vol.value_range(), (-2.0, 3.5));
    }

    #[test]
    fn test_roi_mean_series_rejects_empty_mask() {
        let series = Series::new(Array4::<f32>::zeros((2, 2, 2, 3)), Affine::identity());
        let mask = Array3::<bool>::from_elem((2, 2, 2), false);
        assert!(series.roi_mean_series(&mask).is_err());
    }

    #[test]
    fn test_series_frame_and_roi_signal() {
        let mut data = Array4::<f32>::zeros((2, 2, 2, 3));
        for t in 0..3 {
            data[[0, 0, 0, t]] = t as f32;
            data[[1, 1, 1, t]] = 2.0 * t as f32;
        }
        let series = Series::new(data, Affine::identity());
        assert_eq!(series.n_frames(), 3);
        assert!((series.first_frame().data[[0, 0, 0]]).abs() < 1e-6);

        let mut mask = Array3::<bool>::from_elem((2, 2, 2), false);
        mask[[0, 0, 0]] = true;
        mask[[1, 1, 1]] = true;
        let signal = series.roi_mean_series(&mask).unwrap();
        assert_eq!(signal.len(), 3);
        assert!((signal[2] - 3.0).abs() < 1e-6);
    }
}
