//! Input/output: configuration, dataset layout, checkpoints, NIfTI files,
//! rendering, and progress display

/// Resumable checkpoint store
pub mod checkpoint;
/// Command-line interface
pub mod cli;
/// Pipeline constants and runtime configuration
pub mod configuration;
/// Error taxonomy for the pipeline
pub mod error;
/// Dataset and output path conventions
pub mod layout;
/// NIfTI volume I/O
pub mod nifti;
/// Statistical map rendering
pub mod plot;
/// Progress display
pub mod progress;
