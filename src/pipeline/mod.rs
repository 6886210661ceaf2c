//! Analysis stages and their orchestration

/// Experimental event schedule
pub mod events;
/// Group analysis stage
pub mod group;
/// Stage orchestration and checkpoint resume
pub mod runner;
/// Per-subject analysis stage
pub mod subject;

pub use runner::{PipelineRunner, RunSummary};
