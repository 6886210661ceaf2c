//! Per-subject analysis stage
//!
//! Loads one subject's functional run, fits the first-level model against
//! the shared event schedule, evaluates every configured contrast, and
//! optionally extracts mean signals inside the study's region masks. Any
//! failure aborts the subject (and with it the run): a missing or malformed
//! functional image is a dataset problem, not something to paper over.

use crate::atlas::RegionMask;
use crate::glm::first_level::{FirstLevelModel, FirstLevelOptions};
use crate::io::configuration::AnalysisConfig;
use crate::io::layout::functional_path;
use crate::io::nifti::load_series;
use crate::pipeline::events::EventSchedule;
use crate::volume::Volume;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Everything the later stages need from one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectOutput {
    /// Contrast id to z-statistic volume
    pub contrast_maps: BTreeMap<String, Volume>,
    /// Region name to mean time series, when extraction is enabled
    pub roi_signals: BTreeMap<String, Vec<f32>>,
}

/// Run the first-level analysis for one subject
///
/// # Errors
///
/// Propagates functional image load failures, model fitting errors, unknown
/// regressors in a contrast expression, and mask resampling failures.
pub fn analyze_subject(
    config: &AnalysisConfig,
    subject_id: usize,
    schedule: &EventSchedule,
    roi_masks: Option<&BTreeMap<String, RegionMask>>,
) -> crate::io::error::Result<SubjectOutput> {
    let path = functional_path(&config.dataset_root, subject_id);
    debug!(subject_id, path = %path.display(), "loading functional series");
    let series = load_series(&path)?;

    let model = FirstLevelModel::new(FirstLevelOptions {
        t_r: config.repetition_time,
        noise_model: config.noise_model,
        standardize: config.standardize,
        hrf_model: config.hrf_model,
        drift_model: config.drift_model,
    });
    let fitted = model.fit(&series, &schedule.to_conditions())?;

    let mut contrast_maps = BTreeMap::new();
    for contrast in &config.contrast_definitions {
        let z_map = fitted.compute_contrast(&contrast.expression)?;
        contrast_maps.insert(contrast.id.clone(), z_map);
    }

    let mut roi_signals = BTreeMap::new();
    if let Some(masks) = roi_masks {
        for (name, mask) in masks {
            let resampled = mask.resample_onto(series.spatial_shape(), &series.affine)?;
            let signal = series.roi_mean_series(&resampled)?;
            roi_signals.insert(name.clone(), signal.to_vec());
        }
    }

    info!(
        subject_id,
        n_scans = series.n_frames(),
        df = fitted.degrees_of_freedom(),
        n_contrasts = contrast_maps.len(),
        n_rois = roi_signals.len(),
        "subject analysed"
    );

    Ok(SubjectOutput {
        contrast_maps,
        roi_signals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glm::DriftModel;
    use crate::io::nifti::save_series;
    use crate::volume::Series;
    use crate::volume::affine::Affine;
    use ndarray::{Array3, Array4};
    use std::path::Path;

    fn write_constant_subject(dataset_root: &Path, subject_id: usize, n_scans: usize) {
        let path = functional_path(dataset_root, subject_id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let data = Array4::<f32>::from_elem((4, 4, 4, n_scans), 100.0);
        save_series(&path, &Series::new(data, Affine::identity())).unwrap();
    }

    fn test_config(dataset_root: &Path) -> AnalysisConfig {
        AnalysisConfig {
            subject_count: 1,
            drift_model: DriftModel::None,
            dataset_root: dataset_root.to_path_buf(),
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_constant_subject_yields_zero_maps() {
        let tmp = tempfile::tempdir().unwrap();
        // Enough scans to cover the full 570-second schedule
        write_constant_subject(tmp.path(), 1, 300);
        let config = test_config(tmp.path());

        let output =
            analyze_subject(&config, 1, &EventSchedule::build(), None).unwrap();

        assert_eq!(output.contrast_maps.len(), 3);
        assert!(output.contrast_maps.contains_key("positive_vs_neutral"));
        // Standardization drops flat voxels, so every z is exactly zero
        for map in output.contrast_maps.values() {
            assert!(map.data.iter().all(|&v| v == 0.0));
        }
        assert!(output.roi_signals.is_empty());
    }

    #[test]
    fn test_roi_signals_extracted_when_masks_given() {
        let tmp = tempfile::tempdir().unwrap();
        write_constant_subject(tmp.path(), 2, 300);
        let config = test_config(tmp.path());

        let mut mask_data = Array3::<bool>::from_elem((4, 4, 4), false);
        mask_data[[1, 1, 1]] = true;
        let mut masks = BTreeMap::new();
        masks.insert(
            "amygdala_left".to_string(),
            RegionMask {
                name: "amygdala_left".to_string(),
                data: mask_data,
                affine: Affine::identity(),
            },
        );

        let output =
            analyze_subject(&config, 2, &EventSchedule::build(), Some(&masks)).unwrap();

        let signal = &output.roi_signals["amygdala_left"];
        assert_eq!(signal.len(), 300);
        assert!(signal.iter().all(|&v| (v - 100.0).abs() < 1e-4));
    }

    #[test]
    fn test_missing_functional_image_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let result = analyze_subject(&config, 7, &EventSchedule::build(), None);
        assert!(result.is_err());
    }
}
