//! Command-line interface for the analysis pipeline

use crate::io::configuration::{
    ATLAS_CACHE_DIR, AnalysisConfig, CHECKPOINTS_DIR, DEFAULT_SUBJECT_COUNT, RESULTS_DIR,
};
use clap::Parser;
use std::path::PathBuf;

/// Checkpointed first/second-level fMRI analysis for the emotion study
#[derive(Parser, Debug)]
#[command(name = "valence", version, about)]
pub struct Cli {
    /// BIDS dataset root containing sub-NN directories
    #[arg(long, default_value = "ds005700")]
    pub dataset_root: PathBuf,

    /// Directory receiving checkpoints, rendered maps, and the atlas cache
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of subjects to analyse (ids 1..=N)
    #[arg(long, default_value_t = DEFAULT_SUBJECT_COUNT)]
    pub subjects: usize,

    /// Worker threads for the per-subject stage
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Ignore existing checkpoints and recompute everything
    #[arg(long)]
    pub force: bool,

    /// Suppress the progress display
    #[arg(long)]
    pub quiet: bool,

    /// Skip ROI signal extraction
    #[arg(long)]
    pub no_roi: bool,
}

impl Cli {
    /// Turn parsed arguments into a full analysis configuration
    pub fn into_config(self) -> AnalysisConfig {
        AnalysisConfig {
            subject_count: self.subjects,
            extract_roi_signals: !self.no_roi,
            dataset_root: self.dataset_root,
            checkpoints_dir: self.output_dir.join(CHECKPOINTS_DIR),
            results_dir: self.output_dir.join(RESULTS_DIR),
            atlas_cache_dir: self.output_dir.join(ATLAS_CACHE_DIR),
            jobs: self.jobs.max(1),
            force: self.force,
            ..AnalysisConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_study_configuration() {
        let cli = Cli::parse_from(["valence"]);
        assert!(!cli.force);
        let config = cli.into_config();
        assert_eq!(config.subject_count, 40);
        assert!(config.extract_roi_signals);
        assert_eq!(config.checkpoints_dir, PathBuf::from("./checkpoints"));
    }

    #[test]
    fn test_flags_flow_into_config() {
        let cli = Cli::parse_from([
            "valence",
            "--dataset-root",
            "/data/ds005700",
            "--output-dir",
            "/tmp/run",
            "--subjects",
            "8",
            "--jobs",
            "4",
            "--force",
            "--no-roi",
        ]);
        let config = cli.into_config();
        assert_eq!(config.dataset_root, PathBuf::from("/data/ds005700"));
        assert_eq!(config.results_dir, PathBuf::from("/tmp/run/results"));
        assert_eq!(config.subject_count, 8);
        assert_eq!(config.jobs, 4);
        assert!(config.force);
        assert!(!config.extract_roi_signals);
    }

    #[test]
    fn test_zero_jobs_clamped_to_sequential() {
        let cli = Cli::parse_from(["valence", "--jobs", "0"]);
        assert_eq!(cli.into_config().jobs, 1);
    }
}
