//! Dataset and output path conventions
//!
//! Input follows the BIDS layout of the study dataset:
//! `<root>/sub-NN/func/sub-NN_task-fe_bold.nii.gz` with NN zero-padded to
//! two digits. Output names match the established project conventions so
//! existing tooling keeps working.

use std::path::{Path, PathBuf};

/// Task label in functional filenames
pub const TASK_LABEL: &str = "fe";

/// Zero-padded subject label, e.g. 7 -> "07"
pub fn subject_label(subject_id: usize) -> String {
    format!("{subject_id:02}")
}

/// Path to a subject's functional volume
pub fn functional_path(dataset_root: &Path, subject_id: usize) -> PathBuf {
    let label = subject_label(subject_id);
    dataset_root
        .join(format!("sub-{label}"))
        .join("func")
        .join(format!("sub-{label}_task-{TASK_LABEL}_bold.nii.gz"))
}

/// Path to a subject's anatomical volume
pub fn anatomical_path(dataset_root: &Path, subject_id: usize) -> PathBuf {
    let label = subject_label(subject_id);
    dataset_root
        .join(format!("sub-{label}"))
        .join("anat")
        .join(format!("sub-{label}_T1w.nii.gz"))
}

/// Checkpoint key for the shared event schedule
pub const EVENTS_KEY: &str = "events";

/// Checkpoint key for the collected per-subject contrast maps
pub const SUBJECT_CONTRASTS_KEY: &str = "subject_contrasts";

/// Checkpoint key for the group stage output
pub const GROUP_RESULTS_KEY: &str = "group_results";

/// Checkpoint key for the visualization stage output
pub const PLOTTING_RESULTS_KEY: &str = "plotting_results";

/// Checkpoint key for one subject's stage output
pub fn subject_key(subject_id: usize) -> String {
    format!("subject_{}_results", subject_label(subject_id))
}

/// Output filename for a rendered group map
pub fn plot_filename(contrast_id: &str) -> String {
    format!("group_analysis_{contrast_id}(Z scores).png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_functional_path_is_zero_padded() {
        let path = functional_path(Path::new("ds005700"), 7);
        assert_eq!(
            path,
            PathBuf::from("ds005700/sub-07/func/sub-07_task-fe_bold.nii.gz")
        );
    }

    #[test]
    fn test_two_digit_subject_unpadded() {
        let path = anatomical_path(Path::new("data"), 23);
        assert_eq!(path, PathBuf::from("data/sub-23/anat/sub-23_T1w.nii.gz"));
    }

    #[test]
    fn test_subject_key_matches_convention() {
        assert_eq!(subject_key(3), "subject_03_results");
    }

    #[test]
    fn test_plot_filename_convention() {
        assert_eq!(
            plot_filename("positive_vs_neutral"),
            "group_analysis_positive_vs_neutral(Z scores).png"
        );
    }
}
