//! Pipeline orchestration
//!
//! Drives the four stages in order: event schedule, per-subject first-level
//! analysis, group model, and map rendering. Every stage consults the
//! checkpoint store before computing and persists its output afterwards, so
//! an interrupted run resumes from the last completed stage. The subject
//! stage fans out over a worker pool when more than one job is configured;
//! output order always follows subject id, whichever path ran.

use crate::atlas::{RegionMask, build_roi_masks};
use crate::io::checkpoint::CheckpointStore;
use crate::io::configuration::AnalysisConfig;
use crate::io::error::{Result, computation_error};
use crate::io::layout::{
    EVENTS_KEY, GROUP_RESULTS_KEY, PLOTTING_RESULTS_KEY, SUBJECT_CONTRASTS_KEY, subject_key,
    subject_label,
};
use crate::io::plot::{PlotRecord, render_group_maps};
use crate::io::progress::ProgressManager;
use crate::pipeline::events::EventSchedule;
use crate::pipeline::group::{GroupOutcome, fit_group};
use crate::pipeline::subject::{SubjectOutput, analyze_subject};
use crate::volume::Volume;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What a completed run produced
#[derive(Debug)]
pub struct RunSummary {
    /// Number of subjects analysed
    pub n_subjects: usize,
    /// Group stage outcome, successes and failures
    pub group: GroupOutcome,
    /// Rendered map records
    pub plots: Vec<PlotRecord>,
}

/// Executes a full analysis run against one configuration
pub struct PipelineRunner {
    config: AnalysisConfig,
    quiet: bool,
}

impl PipelineRunner {
    /// Create a runner for the given configuration
    pub const fn new(config: AnalysisConfig, quiet: bool) -> Self {
        Self { config, quiet }
    }

    /// Run all stages, resuming from checkpoints where possible
    ///
    /// # Errors
    ///
    /// Propagates checkpoint I/O failures, atlas fetch failures, and any
    /// per-subject analysis error. Group-stage failures are captured in the
    /// returned summary instead.
    pub fn run(&self) -> Result<RunSummary> {
        let fingerprint = self.config.fingerprint();
        let store = CheckpointStore::open(&self.config.checkpoints_dir, &fingerprint)?;
        info!(
            %fingerprint,
            subjects = self.config.subject_count,
            jobs = self.config.jobs,
            force = self.config.force,
            "starting analysis run"
        );

        let schedule = self.load_or_build_events(&store)?;

        let roi_masks = if self.config.extract_roi_signals {
            Some(build_roi_masks(&self.config.atlas_cache_dir)?)
        } else {
            None
        };

        let outputs = self.run_subject_stage(&store, &schedule, roi_masks.as_ref())?;

        let contrast_sets: Vec<BTreeMap<String, Volume>> = outputs
            .iter()
            .map(|output| output.contrast_maps.clone())
            .collect();
        store.save(SUBJECT_CONTRASTS_KEY, &contrast_sets)?;

        let group = self.load_or_fit_group(&store, &outputs)?;
        let plots = self.load_or_render_plots(&store, &group)?;

        info!(
            n_subjects = outputs.len(),
            n_group_results = group.results.len(),
            n_group_failures = group.failures.len(),
            n_plots = plots.len(),
            "analysis run complete"
        );
        Ok(RunSummary {
            n_subjects: outputs.len(),
            group,
            plots,
        })
    }

    fn load_or_build_events(&self, store: &CheckpointStore) -> Result<EventSchedule> {
        if !self.config.force
            && let Some(schedule) = store.load::<EventSchedule>(EVENTS_KEY)?
        {
            debug!("event schedule checkpoint reused");
            return Ok(schedule);
        }
        let schedule = EventSchedule::build();
        store.save(EVENTS_KEY, &schedule)?;
        Ok(schedule)
    }

    fn run_subject_stage(
        &self,
        store: &CheckpointStore,
        schedule: &EventSchedule,
        roi_masks: Option<&BTreeMap<String, RegionMask>>,
    ) -> Result<Vec<SubjectOutput>> {
        let progress = ProgressManager::new(self.config.subject_count, self.quiet);
        let subject_ids: Vec<usize> = (1..=self.config.subject_count).collect();

        let process = |subject_id: usize| -> Result<SubjectOutput> {
            progress.start_subject(&subject_label(subject_id));
            let key = subject_key(subject_id);
            let cached = if self.config.force {
                None
            } else {
                store.load::<SubjectOutput>(&key)?
            };
            let output = if let Some(output) = cached {
                debug!(subject_id, "subject checkpoint reused");
                output
            } else {
                let output = analyze_subject(&self.config, subject_id, schedule, roi_masks)?;
                store.save(&key, &output)?;
                output
            };
            progress.complete_subject();
            Ok(output)
        };

        let outputs = if self.config.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .map_err(|e| computation_error("build worker pool", &e))?;
            pool.install(|| {
                subject_ids
                    .par_iter()
                    .map(|&id| process(id))
                    .collect::<Result<Vec<_>>>()
            })?
        } else {
            subject_ids
                .iter()
                .map(|&id| process(id))
                .collect::<Result<Vec<_>>>()?
        };

        progress.finish();
        Ok(outputs)
    }

    fn load_or_fit_group(
        &self,
        store: &CheckpointStore,
        outputs: &[SubjectOutput],
    ) -> Result<GroupOutcome> {
        if !self.config.force
            && let Some(group) = store.load::<GroupOutcome>(GROUP_RESULTS_KEY)?
        {
            debug!("group results checkpoint reused");
            return Ok(group);
        }
        let group = fit_group(outputs, &self.config);
        store.save(GROUP_RESULTS_KEY, &group)?;
        Ok(group)
    }

    fn load_or_render_plots(
        &self,
        store: &CheckpointStore,
        group: &GroupOutcome,
    ) -> Result<Vec<PlotRecord>> {
        if !self.config.force
            && let Some(records) = store.load::<Vec<PlotRecord>>(PLOTTING_RESULTS_KEY)?
            && records.iter().all(|record| record.path.exists())
        {
            debug!("plotting checkpoint reused");
            return Ok(records);
        }
        let records = render_group_maps(
            &group.results,
            &self.config.results_dir,
            self.config.z_threshold,
        )?;
        store.save(PLOTTING_RESULTS_KEY, &records)?;
        Ok(records)
    }
}
