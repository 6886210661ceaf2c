//! Checkpointed first- and second-level fMRI analysis for an emotion-processing study
//!
//! The pipeline fits a general linear model to each subject's functional
//! run against a fixed block schedule of emotional stimuli, carries the
//! resulting valence contrast maps into a one-sample group model, and
//! renders thresholded z-score maps. Every stage persists its output, so an
//! interrupted run resumes where it stopped.

#![forbid(unsafe_code)]

/// Harvard-Oxford atlas access and region-of-interest masks
pub mod atlas;
/// General linear modelling at the subject and group level
pub mod glm;
/// Input/output operations, configuration, and error handling
pub mod io;
/// Numerical utilities for linear algebra and probability
pub mod math;
/// Analysis stages and their orchestration
pub mod pipeline;
/// In-memory volume model, resampling, and smoothing
pub mod volume;

pub use io::error::{PipelineError, Result};
