//! Thresholded orthogonal-view rendering of statistical maps
//!
//! Renders sagittal, coronal, and axial mid-slices of a z-map side by side.
//! Voxels below the threshold show as a dim grayscale underlay; voxels at or
//! above it use a warm (positive) or cool (negative) ramp. The z threshold
//! and its one-sided tail probability are reported in the log line for each
//! rendered file, and the threshold is part of the fixed output filename
//! convention.

use crate::glm::second_level::GroupResult;
use crate::io::error::{PipelineError, Result, fs_error};
use crate::io::layout::plot_filename;
use crate::math::probability::normal_sf;
use crate::volume::Volume;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

const PANEL_GAP: u32 = 2;

/// Metadata for one rendered group map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotRecord {
    /// Contrast the map belongs to
    pub contrast_id: String,
    /// Where the image was written
    pub path: PathBuf,
    /// z threshold used for display
    pub z_threshold: f64,
    /// One-sided normal tail probability of the threshold
    pub tail_probability: f64,
}

/// Render every group result to the results directory
///
/// Files follow the `group_analysis_<contrast>(Z scores).png` convention and
/// overwrite any previous render.
///
/// # Errors
///
/// Returns an error if the results directory cannot be created or an image
/// cannot be encoded or written.
pub fn render_group_maps(
    group_results: &BTreeMap<String, GroupResult>,
    results_dir: &Path,
    z_threshold: f64,
) -> Result<Vec<PlotRecord>> {
    std::fs::create_dir_all(results_dir)
        .map_err(|e| fs_error(results_dir, "create results directory", e))?;

    let tail_probability = normal_sf(z_threshold);
    let mut records = Vec::with_capacity(group_results.len());

    for (contrast_id, result) in group_results {
        let path = results_dir.join(plot_filename(contrast_id));
        render_stat_map(&result.z_map, z_threshold, &path)?;
        info!(
            contrast = %contrast_id,
            z_threshold,
            one_sided_p = %format!("{tail_probability:.2e}"),
            path = %path.display(),
            "group map rendered"
        );
        records.push(PlotRecord {
            contrast_id: contrast_id.clone(),
            path,
            z_threshold,
            tail_probability,
        });
    }

    Ok(records)
}

/// Render a thresholded orthogonal view of a z-map to a PNG file
///
/// # Errors
///
/// Returns an error for empty volumes or if the image cannot be saved.
pub fn render_stat_map(z_map: &Volume, threshold: f64, output_path: &Path) -> Result<()> {
    let (nx, ny, nz) = z_map.shape();
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(PipelineError::InvalidVolume {
            reason: "cannot render an empty volume".to_string(),
        });
    }

    let (lo, hi) = z_map.value_range();
    let vmax = lo.abs().max(hi.abs()).max(threshold as f32).max(1e-6);

    // Sagittal (y,z), coronal (x,z), axial (x,y) mid-slices
    let width = ny as u32 + nx as u32 + nx as u32 + 2 * PANEL_GAP;
    let height = (nz.max(ny)) as u32;
    let mut img = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));

    let mid_x = nx / 2;
    let mid_y = ny / 2;
    let mid_z = nz / 2;

    for j in 0..ny {
        for k in 0..nz {
            let color = voxel_color(z_map.data[[mid_x, j, k]], threshold as f32, vmax);
            img.put_pixel(j as u32, (nz - 1 - k) as u32, color);
        }
    }

    let coronal_x0 = ny as u32 + PANEL_GAP;
    for i in 0..nx {
        for k in 0..nz {
            let color = voxel_color(z_map.data[[i, mid_y, k]], threshold as f32, vmax);
            img.put_pixel(coronal_x0 + i as u32, (nz - 1 - k) as u32, color);
        }
    }

    let axial_x0 = coronal_x0 + nx as u32 + PANEL_GAP;
    for i in 0..nx {
        for j in 0..ny {
            let color = voxel_color(z_map.data[[i, j, mid_z]], threshold as f32, vmax);
            img.put_pixel(axial_x0 + i as u32, (ny - 1 - j) as u32, color);
        }
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| fs_error(parent, "create output directory", e))?;
    }
    img.save(output_path).map_err(|e| PipelineError::ImageExport {
        path: output_path.to_path_buf(),
        source: e,
    })
}

/// Render a boolean region mask preview (white on black) to a PNG file
///
/// # Errors
///
/// Returns an error for empty masks or if the image cannot be saved.
pub fn render_mask_preview(mask: &crate::atlas::RegionMask, output_path: &Path) -> Result<()> {
    let data = mask.to_volume();
    // Reuse the stat-map renderer with a threshold below the mask value so
    // every member voxel lights up
    render_stat_map(&data, 0.5, output_path)
}

fn voxel_color(z: f32, threshold: f32, vmax: f32) -> Rgb<u8> {
    let magnitude = z.abs();
    if magnitude < threshold {
        // Dim grayscale underlay
        let level = ((magnitude / vmax) * 80.0) as u8;
        return Rgb([level, level, level]);
    }

    // Ramp from the threshold to the map maximum
    let span = (vmax - threshold).max(1e-6);
    let fraction = ((magnitude - threshold) / span).clamp(0.0, 1.0);
    if z >= 0.0 {
        // Red to yellow
        Rgb([255, (fraction * 255.0) as u8, 0])
    } else {
        // Blue to cyan
        Rgb([0, (fraction * 255.0) as u8, 255])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::affine::Affine;
    use ndarray::Array3;

    fn z_volume() -> Volume {
        let mut data = Array3::<f32>::zeros((6, 6, 6));
        data[[3, 3, 3]] = 5.0;
        data[[1, 1, 1]] = -4.5;
        Volume::new(data, Affine::identity())
    }

    #[test]
    fn test_render_writes_png() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("map.png");
        render_stat_map(&z_volume(), 3.1, &path).unwrap();
        assert!(path.exists());
        let img = image::open(&path).unwrap();
        assert!(img.width() > 0);
    }

    #[test]
    fn test_render_overwrites_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("map.png");
        std::fs::write(&path, b"stale").unwrap();
        render_stat_map(&z_volume(), 3.1, &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 5);
    }

    #[test]
    fn test_voxel_color_thresholding() {
        // Below threshold: grayscale; above: signed ramps
        let below = voxel_color(1.0, 3.1, 6.0);
        assert_eq!(below.0[0], below.0[1]);
        assert_eq!(below.0[1], below.0[2]);

        let positive = voxel_color(5.0, 3.1, 6.0);
        assert_eq!(positive.0[0], 255);
        let negative = voxel_color(-5.0, 3.1, 6.0);
        assert_eq!(negative.0[2], 255);
    }

    #[test]
    fn test_empty_volume_rejected() {
        let vol = Volume::new(Array3::<f32>::zeros((0, 0, 0)), Affine::identity());
        let tmp = tempfile::tempdir().unwrap();
        assert!(render_stat_map(&vol, 3.1, &tmp.path().join("x.png")).is_err());
    }
}
