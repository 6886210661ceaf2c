//! Pipeline constants and runtime configuration

use crate::glm::{DriftModel, HrfModel, NoiseModel};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of subjects in the dataset
pub const DEFAULT_SUBJECT_COUNT: usize = 40;

/// Scan repetition time in seconds, from the subjects' sidecar files
pub const REPETITION_TIME_SECS: f64 = 2.026_97;

/// Spatial smoothing kernel applied in the group model, FWHM in mm
pub const SMOOTHING_FWHM_MM: f64 = 8.0;

/// z threshold used when rendering group maps
pub const Z_THRESHOLD: f64 = 3.1;

/// Number of trials in the experimental run
pub const N_TRIALS: usize = 10;

/// Duration of each emotion block in seconds
pub const TRIAL_DURATION_SECS: f64 = 30.0;

/// Spacing between consecutive block onsets in seconds
pub const TRIAL_SPACING_SECS: f64 = 60.0;

/// Subdirectory holding checkpoint envelopes
pub const CHECKPOINTS_DIR: &str = "checkpoints";

/// Subdirectory holding rendered group maps
pub const RESULTS_DIR: &str = "results";

/// Subdirectory caching downloaded atlas volumes
pub const ATLAS_CACHE_DIR: &str = "atlas_cache";

/// Base URL for the Harvard-Oxford atlas volumes
pub const ATLAS_BASE_URL: &str =
    "https://raw.githubusercontent.com/neurodata/neuroparc/master/atlases/label/Human";

/// A named linear contrast over design regressors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrastDefinition {
    /// Identifier used for checkpoint keys and output filenames
    pub id: String,
    /// Symbolic expression over regressor names
    pub expression: String,
}

impl ContrastDefinition {
    /// Create a contrast definition
    pub fn new(id: &str, expression: &str) -> Self {
        Self {
            id: id.to_string(),
            expression: expression.to_string(),
        }
    }
}

/// The three fixed valence contrasts of the study
pub fn default_contrasts() -> Vec<ContrastDefinition> {
    vec![
        ContrastDefinition::new("positive_vs_neutral", "positive - neutral"),
        ContrastDefinition::new("negative_vs_neutral", "negative - neutral"),
        ContrastDefinition::new("positive_vs_negative", "positive - negative"),
    ]
}

/// Explicit configuration for a full pipeline run
///
/// Every tunable the stages consult lives here, so a run is reproducible
/// from this structure alone. The statistical fields feed the checkpoint
/// fingerprint; path and execution fields do not, so moving a project
/// directory never invalidates its checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of subjects to process (ids 1..=subject_count)
    pub subject_count: usize,
    /// Scan repetition time in seconds
    pub repetition_time: f64,
    /// First-level noise model
    pub noise_model: NoiseModel,
    /// Whether to standardize voxel time series before fitting
    pub standardize: bool,
    /// Hemodynamic response basis
    pub hrf_model: HrfModel,
    /// Drift regressor model
    pub drift_model: DriftModel,
    /// Contrasts evaluated at both analysis levels
    pub contrast_definitions: Vec<ContrastDefinition>,
    /// Group-level smoothing kernel, FWHM in mm
    pub smoothing_fwhm: f64,
    /// Rendering threshold on the z scale
    pub z_threshold: f64,
    /// Whether to extract ROI-masked mean signals per subject
    pub extract_roi_signals: bool,

    /// BIDS dataset root containing `sub-NN` directories
    pub dataset_root: PathBuf,
    /// Directory for checkpoint envelopes
    pub checkpoints_dir: PathBuf,
    /// Directory for rendered outputs
    pub results_dir: PathBuf,
    /// Cache directory for atlas downloads
    pub atlas_cache_dir: PathBuf,
    /// Worker threads for the per-subject stage (1 = sequential)
    pub jobs: usize,
    /// Ignore existing checkpoints and recompute everything
    pub force: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            subject_count: DEFAULT_SUBJECT_COUNT,
            repetition_time: REPETITION_TIME_SECS,
            noise_model: NoiseModel::Ar1,
            standardize: true,
            hrf_model: HrfModel::Spm,
            drift_model: DriftModel::cosine_default(),
            contrast_definitions: default_contrasts(),
            smoothing_fwhm: SMOOTHING_FWHM_MM,
            z_threshold: Z_THRESHOLD,
            extract_roi_signals: true,
            dataset_root: PathBuf::from("ds005700"),
            checkpoints_dir: PathBuf::from(CHECKPOINTS_DIR),
            results_dir: PathBuf::from(RESULTS_DIR),
            atlas_cache_dir: PathBuf::from(ATLAS_CACHE_DIR),
            jobs: 1,
            force: false,
        }
    }
}

// The statistical fields that determine checkpoint compatibility
#[derive(Serialize)]
struct Fingerprint<'a> {
    subject_count: usize,
    repetition_time: f64,
    noise_model: NoiseModel,
    standardize: bool,
    hrf_model: HrfModel,
    drift_model: DriftModel,
    contrast_definitions: &'a [ContrastDefinition],
    smoothing_fwhm: f64,
    extract_roi_signals: bool,
}

impl AnalysisConfig {
    /// Stable hash of the statistical configuration
    ///
    /// Checkpoints written under a different fingerprint are rejected as
    /// stale. FNV-1a over the canonical JSON encoding keeps the value stable
    /// across runs and compiler versions.
    pub fn fingerprint(&self) -> String {
        let fields = Fingerprint {
            subject_count: self.subject_count,
            repetition_time: self.repetition_time,
            noise_model: self.noise_model,
            standardize: self.standardize,
            hrf_model: self.hrf_model,
            drift_model: self.drift_model,
            contrast_definitions: &self.contrast_definitions,
            smoothing_fwhm: self.smoothing_fwhm,
            extract_roi_signals: self.extract_roi_signals,
        };
        // Serialization of plain fields cannot fail; fall back to a fixed
        // tag rather than propagating an impossible error
        let encoded = serde_json::to_string(&fields).unwrap_or_else(|_| "unencodable".to_string());
        format!("{:016x}", fnv1a(encoded.as_bytes()))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
