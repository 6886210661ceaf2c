//! Subject-level progress reporting for the analysis loop

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::LazyLock;

static SUBJECT_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] Subjects: [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
});

/// Progress display for the per-subject analysis stage
///
/// Wraps a single batch bar; a quiet run substitutes a hidden bar so the
/// call sites stay unconditional.
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a progress bar over the given number of subjects
    pub fn new(subject_count: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(subject_count as u64);
            bar.set_style(SUBJECT_STYLE.clone());
            bar
        };
        Self { bar }
    }

    /// Note which subject is being processed
    pub fn start_subject(&self, label: &str) {
        self.bar.set_message(format!("sub-{label}"));
    }

    /// Mark one subject as completed
    pub fn complete_subject(&self) {
        self.bar.inc(1);
    }

    /// Finish and clear the display
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_manager_is_inert() {
        let pm = ProgressManager::new(3, true);
        pm.start_subject("01");
        pm.complete_subject();
        pm.finish();
    }
}
