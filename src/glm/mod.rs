//! General linear model fitting for first- and second-level analyses
//!
//! This module is the statistics collaborator behind the pipeline stages:
//! design matrix construction, ordinary least squares with optional AR(1)
//! prewhitening, symbolic contrast evaluation on a z scale, and the
//! intercept-only group fit.

/// Design matrix construction and contrast expressions
pub mod design;
/// First-level (within-subject) model fit
pub mod first_level;
/// Canonical hemodynamic response function
pub mod hrf;
/// Second-level (group) model fit
pub mod second_level;

use serde::{Deserialize, Serialize};

/// Temporal noise model applied before the least squares fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    /// Independent errors, plain OLS
    Ols,
    /// First-order autoregressive errors, removed by prewhitening
    Ar1,
}

/// Hemodynamic response basis used when convolving condition regressors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HrfModel {
    /// SPM canonical double-gamma response
    Spm,
}

/// Low-frequency drift regressors added to the design
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftModel {
    /// No drift regressors
    None,
    /// Discrete cosine basis up to the given cutoff period in seconds
    Cosine {
        /// High-pass cutoff period in seconds
        cutoff_secs: f64,
    },
}

impl DriftModel {
    /// Standard cosine drift model with the conventional 128 s cutoff
    pub const fn cosine_default() -> Self {
        Self::Cosine { cutoff_secs: 128.0 }
    }
}
