//! Trilinear resampling of volumes onto a target voxel grid
//!
//! Each target voxel is mapped through the target affine into world space and
//! back through the inverse source affine, then sampled with trilinear
//! interpolation. Output values are clipped to the source value range so
//! interpolation can never manufacture out-of-range statistics.

use crate::io::error::Result;
use crate::volume::Volume;
use crate::volume::affine::Affine;
use ndarray::Array3;

/// Resample a volume onto a target grid defined by shape and affine
///
/// Voxels that map outside the source volume are filled with zero.
///
/// # Errors
///
/// Returns a computation error if the source affine is singular.
pub fn resample_to_grid(
    source: &Volume,
    target_shape: (usize, usize, usize),
    target_affine: &Affine,
) -> Result<Volume> {
    // target voxel -> world -> source voxel, as one composed transform
    let to_source = source.affine.inverse()?.compose(target_affine);
    let (lo, hi) = source.value_range();

    let mut data = Array3::<f32>::zeros(target_shape);
    for i in 0..target_shape.0 {
        for j in 0..target_shape.1 {
            for k in 0..target_shape.2 {
                let src = to_source.apply([i as f64, j as f64, k as f64]);
                let v = sample_trilinear(&source.data, src);
                data[[i, j, k]] = v.clamp(lo, hi);
            }
        }
    }

    Ok(Volume::new(data, *target_affine))
}

/// Resample a volume onto the grid of a reference volume
///
/// # Errors
///
/// Propagates resampling errors from [`resample_to_grid`].
pub fn resample_to_volume(source: &Volume, reference: &Volume) -> Result<Volume> {
    if source.same_grid(reference) {
        return Ok(source.clone());
    }
    resample_to_grid(source, reference.shape(), &reference.affine)
}

// Trilinear interpolation at a fractional voxel coordinate; zero outside
fn sample_trilinear(data: &Array3<f32>, pos: [f64; 3]) -> f32 {
    let (nx, ny, nz) = data.dim();

    let x0 = pos[0].floor();
    let y0 = pos[1].floor();
    let z0 = pos[2].floor();
    let fx = (pos[0] - x0) as f32;
    let fy = (pos[1] - y0) as f32;
    let fz = (pos[2] - z0) as f32;

    let mut acc = 0.0_f32;
    for dx in 0..2 {
        for dy in 0..2 {
            for dz in 0..2 {
                let xi = x0 as i64 + dx;
                let yi = y0 as i64 + dy;
                let zi = z0 as i64 + dz;
                if xi < 0
                    || yi < 0
                    || zi < 0
                    || xi >= nx as i64
                    || yi >= ny as i64
                    || zi >= nz as i64
                {
                    continue;
                }
                let wx = if dx == 0 { 1.0 - fx } else { fx };
                let wy = if dy == 0 { 1.0 - fy } else { fy };
                let wz = if dz == 0 { 1.0 - fz } else { fz };
                acc += wx * wy * wz * data[[xi as usize, yi as usize, zi as usize]];
            }
        }
    }
    acc
}
