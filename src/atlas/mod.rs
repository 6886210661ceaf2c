//! Harvard-Oxford atlas access and region-of-interest masks
//!
//! The study analyses a fixed set of emotion-processing regions rather than
//! the whole brain, so masks are derived once from the max-probability
//! atlases (thr25, 2 mm) and reused for every subject. Atlas volumes are
//! fetched over HTTP into a cache directory on first use; fetch failures
//! propagate unretried.

/// Atlas label tables
pub mod labels;

use crate::io::configuration::ATLAS_BASE_URL;
use crate::io::error::{PipelineError, Result, fs_error};
use crate::volume::Volume;
use crate::volume::affine::Affine;
use crate::volume::resample::resample_to_grid;
use ndarray::Array3;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Which of the two Harvard-Oxford atlases to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasKind {
    /// Cortical parcellation (48 regions)
    Cortical,
    /// Subcortical parcellation (21 structures)
    Subcortical,
}

impl AtlasKind {
    /// Filename of the cached atlas volume
    pub const fn filename(self) -> &'static str {
        match self {
            Self::Cortical => "HarvardOxford-cort-maxprob-thr25-2mm.nii.gz",
            Self::Subcortical => "HarvardOxford-sub-maxprob-thr25-2mm.nii.gz",
        }
    }

    const fn remote_name(self) -> &'static str {
        match self {
            Self::Cortical => {
                "HarvardOxfordcort-maxprob-thr25_space-MNI152NLin6_res-2x2x2.nii.gz"
            }
            Self::Subcortical => {
                "HarvardOxfordsub-maxprob-thr25_space-MNI152NLin6_res-2x2x2.nii.gz"
            }
        }
    }

    /// Download URL for the atlas volume
    pub fn url(self) -> String {
        format!("{ATLAS_BASE_URL}/{}", self.remote_name())
    }

    /// Label table for this atlas
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Cortical => &labels::CORTICAL,
            Self::Subcortical => &labels::SUBCORTICAL,
        }
    }
}

/// A loaded max-probability atlas volume
#[derive(Debug, Clone)]
pub struct Atlas {
    /// Which parcellation this is
    pub kind: AtlasKind,
    /// Voxel values are region indices into the label table
    pub volume: Volume,
}

impl Atlas {
    /// Region label for an index, if within the table
    pub fn label(&self, index: usize) -> Option<&'static str> {
        self.kind.labels().get(index).copied()
    }

    /// Boolean mask of the voxels carrying a region index
    pub fn region_mask(&self, index: u32, name: &str) -> RegionMask {
        let data = self.volume.data.mapv(|v| (v - index as f32).abs() < 0.5);
        RegionMask {
            name: name.to_string(),
            data,
            affine: self.volume.affine,
        }
    }
}

/// Fetch an atlas, preferring the local cache over the network
///
/// # Errors
///
/// Propagates HTTP failures, file system errors while populating the cache,
/// and NIfTI errors from loading the volume.
pub fn fetch_atlas(kind: AtlasKind, cache_dir: &Path) -> Result<Atlas> {
    let path = cache_dir.join(kind.filename());
    if !path.exists() {
        fs::create_dir_all(cache_dir)
            .map_err(|e| fs_error(cache_dir, "create atlas cache directory", e))?;
        let url = kind.url();
        info!(%url, "downloading atlas");
        let bytes = reqwest::blocking::get(&url)
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|response| response.bytes())
            .map_err(|e| PipelineError::AtlasFetch {
                url: url.clone(),
                source: e,
            })?;
        fs::write(&path, &bytes).map_err(|e| fs_error(&path, "write atlas volume", e))?;
    }

    let volume = crate::io::nifti::load_volume(&path)?;
    Ok(Atlas { kind, volume })
}

/// A named boolean region-of-interest mask on the atlas grid
#[derive(Debug, Clone)]
pub struct RegionMask {
    /// Region name
    pub name: String,
    /// Boolean membership volume
    pub data: Array3<bool>,
    /// Voxel-to-world transform of the atlas grid
    pub affine: Affine,
}

impl RegionMask {
    /// Number of voxels inside the mask
    pub fn n_voxels(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }

    /// Voxel-wise union with another mask on the same grid
    ///
    /// # Errors
    ///
    /// Returns a grid mismatch error if shapes or affines differ.
    pub fn union(&self, other: &Self, name: &str) -> Result<Self> {
        if self.data.dim() != other.data.dim() || !self.affine.approx_eq(&other.affine, 1e-4) {
            let d = other.data.dim();
            let e = self.data.dim();
            return Err(PipelineError::GridMismatch {
                operation: "mask union",
                expected: (e.0, e.1, e.2),
                actual: (d.0, d.1, d.2),
            });
        }
        let mut data = self.data.clone();
        for (out, &b) in data.iter_mut().zip(other.data.iter()) {
            *out = *out || b;
        }
        Ok(Self {
            name: name.to_string(),
            data,
            affine: self.affine,
        })
    }

    /// The mask as a 0/1 float volume, for resampling and previews
    pub fn to_volume(&self) -> Volume {
        let data = self.data.mapv(|m| if m { 1.0_f32 } else { 0.0 });
        Volume::new(data, self.affine)
    }

    /// Resample the mask onto another grid, thresholding at half occupancy
    ///
    /// # Errors
    ///
    /// Propagates resampling failures.
    pub fn resample_onto(
        &self,
        shape: (usize, usize, usize),
        affine: &Affine,
    ) -> Result<Array3<bool>> {
        let resampled = resample_to_grid(&self.to_volume(), shape, affine)?;
        Ok(resampled.data.mapv(|v| v > 0.5))
    }
}

// The fixed region set of the study: (output name, atlas, region index)
const STUDY_REGIONS: [(&str, AtlasKind, u32); 10] = [
    ("amygdala_left", AtlasKind::Subcortical, 10),
    ("amygdala_right", AtlasKind::Subcortical, 20),
    ("hippocampus_left", AtlasKind::Subcortical, 9),
    ("hippocampus_right", AtlasKind::Subcortical, 19),
    ("acc", AtlasKind::Cortical, 29),
    ("sup_frontal_gyrus", AtlasKind::Cortical, 3),
    ("mid_frontal_gyrus", AtlasKind::Cortical, 4),
    ("frontal_medial", AtlasKind::Cortical, 25),
    ("frontal_orbital", AtlasKind::Cortical, 33),
    ("frontal_operculum", AtlasKind::Cortical, 41),
];

const BILATERAL_PAIRS: [(&str, &str, &str); 2] = [
    ("amygdala_bilateral", "amygdala_left", "amygdala_right"),
    ("hippocampus_bilateral", "hippocampus_left", "hippocampus_right"),
];

/// Build the full ROI mask set for the study, including bilateral unions
///
/// # Errors
///
/// Propagates atlas fetch/load failures and grid mismatches between the two
/// atlases.
pub fn build_roi_masks(cache_dir: &Path) -> Result<BTreeMap<String, RegionMask>> {
    let cortical = fetch_atlas(AtlasKind::Cortical, cache_dir)?;
    let subcortical = fetch_atlas(AtlasKind::Subcortical, cache_dir)?;

    let mut masks = BTreeMap::new();
    for (name, kind, index) in STUDY_REGIONS {
        let atlas = match kind {
            AtlasKind::Cortical => &cortical,
            AtlasKind::Subcortical => &subcortical,
        };
        masks.insert(name.to_string(), atlas.region_mask(index, name));
    }

    for (name, left, right) in BILATERAL_PAIRS {
        let combined = match (masks.get(left), masks.get(right)) {
            (Some(l), Some(r)) => l.union(r, name)?,
            _ => {
                return Err(PipelineError::InvalidVolume {
                    reason: format!("missing component masks for '{name}'"),
                });
            }
        };
        masks.insert(name.to_string(), combined);
    }

    info!(n_masks = masks.len(), "ROI masks built");
    Ok(masks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_atlas(kind: AtlasKind) -> Atlas {
        let mut data = Array3::<f32>::zeros((4, 4, 4));
        data[[0, 0, 0]] = 9.0;
        data[[1, 0, 0]] = 9.0;
        data[[3, 3, 3]] = 19.0;
        Atlas {
            kind,
            volume: Volume::new(data, Affine::identity()),
        }
    }

    #[test]
    fn test_region_mask_selects_exact_index() {
        let atlas = toy_atlas(AtlasKind::Subcortical);
        let mask = atlas.region_mask(9, "hippocampus_left");
        assert_eq!(mask.n_voxels(), 2);
        assert!(mask.data[[0, 0, 0]]);
        assert!(!mask.data[[3, 3, 3]]);
    }

    #[test]
    fn test_bilateral_union_is_voxelwise_or() {
        let atlas = toy_atlas(AtlasKind::Subcortical);
        let left = atlas.region_mask(9, "hippocampus_left");
        let right = atlas.region_mask(19, "hippocampus_right");
        let bilateral = left.union(&right, "hippocampus_bilateral").unwrap();

        assert_eq!(bilateral.n_voxels(), left.n_voxels() + right.n_voxels());
        for ((a, b), c) in left
            .data
            .iter()
            .zip(right.data.iter())
            .zip(bilateral.data.iter())
        {
            assert_eq!(*a || *b, *c);
        }
    }

    #[test]
    fn test_union_rejects_mismatched_grids() {
        let atlas = toy_atlas(AtlasKind::Subcortical);
        let left = atlas.region_mask(9, "left");
        let other = RegionMask {
            name: "other".to_string(),
            data: Array3::<bool>::from_elem((2, 2, 2), true),
            affine: Affine::identity(),
        };
        assert!(left.union(&other, "broken").is_err());
    }

    #[test]
    fn test_study_regions_cover_frontal_cortex() {
        assert_eq!(STUDY_REGIONS.len(), 10);
        for (name, kind, index) in [
            ("frontal_medial", AtlasKind::Cortical, 25),
            ("frontal_orbital", AtlasKind::Cortical, 33),
            ("frontal_operculum", AtlasKind::Cortical, 41),
        ] {
            assert!(
                STUDY_REGIONS.contains(&(name, kind, index)),
                "missing region {name}"
            );
        }
    }

    #[test]
    fn test_labels_accessible_through_atlas() {
        let atlas = toy_atlas(AtlasKind::Subcortical);
        assert_eq!(atlas.label(10), Some("Left Amygdala"));
        assert_eq!(atlas.label(999), None);
    }

    #[test]
    fn test_resample_onto_identity_grid_preserves_mask() {
        let atlas = toy_atlas(AtlasKind::Subcortical);
        let mask = atlas.region_mask(9, "hippocampus_left");
        let resampled = mask.resample_onto((4, 4, 4), &Affine::identity()).unwrap();
        assert_eq!(resampled, mask.data);
    }
}
