//! 4x4 affine transforms between voxel indices and world (mm) coordinates

use crate::io::error::Result;
use crate::math::linalg::invert_4x4;
use serde::{Deserialize, Serialize};

/// Homogeneous voxel-to-world transform in RAS millimetre space
///
/// Stored row-major, as written in NIfTI sform rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine(pub [[f64; 4]; 4]);

impl Affine {
    /// Identity transform (1 mm isotropic voxels at the origin)
    pub const fn identity() -> Self {
        Self([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Axis-aligned transform from voxel sizes and a world-space origin
    pub const fn from_scales_origin(scales: [f64; 3], origin: [f64; 3]) -> Self {
        Self([
            [scales[0], 0.0, 0.0, origin[0]],
            [0.0, scales[1], 0.0, origin[1]],
            [0.0, 0.0, scales[2], origin[2]],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Map a (possibly fractional) voxel index to world coordinates
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2] + m[0][3],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2] + m[1][3],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2] + m[2][3],
        ]
    }

    /// Inverse transform (world to voxel)
    ///
    /// # Errors
    ///
    /// Returns a computation error for singular affines.
    pub fn inverse(&self) -> Result<Self> {
        Ok(Self(invert_4x4(&self.0)?))
    }

    /// Composition `self * other` (apply `other` first)
    pub fn compose(&self, other: &Self) -> Self {
        let a = &self.0;
        let b = &other.0;
        let mut out = [[0.0; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += a[i][k] * b[k][j];
                }
                out[i][j] = acc;
            }
        }
        Self(out)
    }

    /// Physical voxel size along each axis (column norms, mm)
    pub fn voxel_sizes(&self) -> [f64; 3] {
        let m = &self.0;
        let mut sizes = [0.0; 3];
        for (axis, size) in sizes.iter_mut().enumerate() {
            *size = (m[0][axis] * m[0][axis]
                + m[1][axis] * m[1][axis]
                + m[2][axis] * m[2][axis])
                .sqrt();
        }
        sizes
    }

    /// Element-wise comparison within an absolute tolerance
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(ra, rb)| ra.iter().zip(rb.iter()).all(|(a, b)| (a - b).abs() <= tol))
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_scales_and_translates() {
        let aff = Affine::from_scales_origin([2.0, 2.0, 2.0], [-10.0, -10.0, -10.0]);
        let w = aff.apply([5.0, 0.0, 1.0]);
        assert_eq!(w, [0.0, -10.0, -8.0]);
    }

    #[test]
    fn test_inverse_round_trip() {
        let aff = Affine::from_scales_origin([2.0, 3.0, 2.5], [-90.0, -126.0, -72.0]);
        let inv = aff.inverse().unwrap();
        let v = [10.0, 20.0, 30.0];
        let back = inv.apply(aff.apply(v));
        for axis in 0..3 {
            assert!((back[axis] - v[axis]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_voxel_sizes() {
        let aff = Affine::from_scales_origin([2.0, 2.0, 2.0], [0.0; 3]);
        assert_eq!(aff.voxel_sizes(), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let a = Affine::from_scales_origin([2.0, 2.0, 2.0], [1.0, 2.0, 3.0]);
        let b = Affine::from_scales_origin([0.5, 0.5, 0.5], [-1.0, 0.0, 1.0]);
        let composed = a.compose(&b);
        let v = [3.0, 4.0, 5.0];
        let expected = a.apply(b.apply(v));
        let got = composed.apply(v);
        for axis in 0..3 {
            assert!((got[axis] - expected[axis]).abs() < 1e-12);
        }
    }
}
