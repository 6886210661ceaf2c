//! NIfTI-1 volume I/O
//!
//! Reads and writes `.nii` / `.nii.gz` files, converting between on-disk
//! headers and the in-memory [`Volume`]/[`Series`] model. The affine is
//! taken from the sform rows when present, falling back to a pixdim
//! diagonal.

use crate::io::error::{PipelineError, Result};
use crate::volume::affine::Affine;
use crate::volume::{Series, Volume};
use ndarray::{Ix3, Ix4};
use nifti::volume::ndarray::IntoNdArray;
use nifti::writer::WriterOptions;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};
use std::path::Path;
use tracing::debug;

fn affine_from_header(header: &NiftiHeader) -> Affine {
    if header.sform_code > 0 {
        let x = header.srow_x;
        let y = header.srow_y;
        let z = header.srow_z;
        Affine([
            [
                f64::from(x[0]),
                f64::from(x[1]),
                f64::from(x[2]),
                f64::from(x[3]),
            ],
            [
                f64::from(y[0]),
                f64::from(y[1]),
                f64::from(y[2]),
                f64::from(y[3]),
            ],
            [
                f64::from(z[0]),
                f64::from(z[1]),
                f64::from(z[2]),
                f64::from(z[3]),
            ],
            [0.0, 0.0, 0.0, 1.0],
        ])
    } else {
        Affine::from_scales_origin(
            [
                f64::from(header.pixdim[1]).max(f64::EPSILON),
                f64::from(header.pixdim[2]).max(f64::EPSILON),
                f64::from(header.pixdim[3]).max(f64::EPSILON),
            ],
            [0.0, 0.0, 0.0],
        )
    }
}

fn header_from_affine(affine: &Affine) -> NiftiHeader {
    let m = &affine.0;
    let sizes = affine.voxel_sizes();
    let mut header = NiftiHeader::default();
    header.sform_code = 1;
    header.srow_x = [m[0][0] as f32, m[0][1] as f32, m[0][2] as f32, m[0][3] as f32];
    header.srow_y = [m[1][0] as f32, m[1][1] as f32, m[1][2] as f32, m[1][3] as f32];
    header.srow_z = [m[2][0] as f32, m[2][1] as f32, m[2][2] as f32, m[2][3] as f32];
    header.pixdim = [
        1.0,
        sizes[0] as f32,
        sizes[1] as f32,
        sizes[2] as f32,
        1.0,
        1.0,
        1.0,
        1.0,
    ];
    header
}

fn read_object(path: &Path) -> Result<InMemNiftiObject> {
    InMemNiftiObject::from_file(path).map_err(|e| PipelineError::VolumeLoad {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load a 3-D volume from a NIfTI file
///
/// A 4-D image collapses to its first frame, the established convention for
/// statistical images saved with a singleton time axis.
///
/// # Errors
///
/// Returns a volume load error if the file cannot be read, or an invalid
/// volume error for dimensionalities other than 3 or 4.
pub fn load_volume(path: &Path) -> Result<Volume> {
    let object = read_object(path)?;
    let affine = affine_from_header(object.header());
    let array = object
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| PipelineError::VolumeLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

    match array.ndim() {
        3 => {
            let data = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| PipelineError::InvalidVolume {
                    reason: format!("shape conversion failed: {e}"),
                })?;
            Ok(Volume::new(data, affine))
        }
        4 => {
            debug!(path = %path.display(), "4-D image collapsed to first frame");
            let data = array
                .into_dimensionality::<Ix4>()
                .map_err(|e| PipelineError::InvalidVolume {
                    reason: format!("shape conversion failed: {e}"),
                })?;
            Ok(Series::new(data, affine).first_frame())
        }
        n => Err(PipelineError::InvalidVolume {
            reason: format!("expected a 3-D or 4-D image, got {n}-D"),
        }),
    }
}

/// Load a 4-D functional series from a NIfTI file
///
/// # Errors
///
/// Returns a volume load error if the file cannot be read, or an invalid
/// volume error if the image is not 4-D.
pub fn load_series(path: &Path) -> Result<Series> {
    let object = read_object(path)?;
    let affine = affine_from_header(object.header());
    let array = object
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| PipelineError::VolumeLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

    if array.ndim() != 4 {
        return Err(PipelineError::InvalidVolume {
            reason: format!(
                "expected a 4-D functional image at '{}', got {}-D",
                path.display(),
                array.ndim()
            ),
        });
    }
    let data = array
        .into_dimensionality::<Ix4>()
        .map_err(|e| PipelineError::InvalidVolume {
            reason: format!("shape conversion failed: {e}"),
        })?;
    Ok(Series::new(data, affine))
}

/// Write a 3-D volume as a NIfTI file (gzipped when the path ends in .gz)
///
/// # Errors
///
/// Returns a volume export error if the writer fails.
pub fn save_volume(path: &Path, volume: &Volume) -> Result<()> {
    let header = header_from_affine(&volume.affine);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&volume.data)
        .map_err(|e| PipelineError::VolumeExport {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Write a 4-D series as a NIfTI file (gzipped when the path ends in .gz)
///
/// # Errors
///
/// Returns a volume export error if the writer fails.
pub fn save_series(path: &Path, series: &Series) -> Result<()> {
    let header = header_from_affine(&series.affine);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&series.data)
        .map_err(|e| PipelineError::VolumeExport {
            path: path.to_path_buf(),
            source: e,
        })
}
