//! Group analysis stage
//!
//! Runs the one-sample group model once per contrast over the collected
//! subject maps. A contrast that cannot be fitted is recorded as a
//! structured failure and omitted from the success map; it never aborts the
//! run, so one degenerate contrast cannot discard the others.

use crate::glm::second_level::{GroupResult, SecondLevelOptions, fit_one_sample};
use crate::io::configuration::AnalysisConfig;
use crate::pipeline::subject::SubjectOutput;
use crate::volume::Volume;
use crate::volume::resample::resample_to_volume;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Why a contrast produced no group result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupFailure {
    /// Fewer than two subjects contributed a map for the contrast
    TooFewMaps {
        /// Number of maps found
        n_found: usize,
    },
    /// A subject map could not be aligned to the group grid
    GridAlignment {
        /// Description of the resampling failure
        reason: String,
    },
    /// The group model itself failed
    Fit {
        /// Description of the fitting failure
        reason: String,
    },
}

/// Outcome of the group stage: per-contrast results and structured failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupOutcome {
    /// Contrast id to group result, successes only
    pub results: BTreeMap<String, GroupResult>,
    /// Contrast id to failure reason for contrasts that produced no result
    pub failures: BTreeMap<String, GroupFailure>,
}

/// Fit the group model for every configured contrast
pub fn fit_group(subject_outputs: &[SubjectOutput], config: &AnalysisConfig) -> GroupOutcome {
    let options = SecondLevelOptions {
        smoothing_fwhm: config.smoothing_fwhm,
    };

    let mut results = BTreeMap::new();
    let mut failures = BTreeMap::new();

    for contrast in &config.contrast_definitions {
        match fit_contrast(subject_outputs, &contrast.id, options) {
            Ok(result) => {
                info!(
                    contrast = %contrast.id,
                    n_subjects = result.n_subjects,
                    "group model fitted"
                );
                results.insert(contrast.id.clone(), result);
            }
            Err(failure) => {
                warn!(contrast = %contrast.id, ?failure, "group model skipped");
                failures.insert(contrast.id.clone(), failure);
            }
        }
    }

    GroupOutcome { results, failures }
}

fn fit_contrast(
    subject_outputs: &[SubjectOutput],
    contrast_id: &str,
    options: SecondLevelOptions,
) -> std::result::Result<GroupResult, GroupFailure> {
    let maps: Vec<&Volume> = subject_outputs
        .iter()
        .filter_map(|output| output.contrast_maps.get(contrast_id))
        .collect();
    if maps.len() < 2 {
        return Err(GroupFailure::TooFewMaps {
            n_found: maps.len(),
        });
    }

    // Align every map to the first subject's grid
    let reference = maps[0];
    let aligned: Vec<Volume> = maps
        .iter()
        .map(|map| resample_to_volume(map, reference))
        .collect::<crate::io::error::Result<_>>()
        .map_err(|error| GroupFailure::GridAlignment {
            reason: error.to_string(),
        })?;

    fit_one_sample(&aligned, options).map_err(|error| GroupFailure::Fit {
        reason: error.to_string(),
    })
}
