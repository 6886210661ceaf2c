//! Design matrix construction and symbolic contrast expressions

use crate::glm::hrf::spm_canonical;
use crate::glm::{DriftModel, HrfModel};
use crate::io::error::{Result, invalid_parameter};
use ndarray::{Array1, Array2};

/// One experimental condition: a name and its trial onsets/durations
#[derive(Debug, Clone)]
pub struct Condition {
    /// Regressor name (a trial-type label)
    pub name: String,
    /// Trial onset times in seconds
    pub onsets: Vec<f64>,
    /// Trial durations in seconds, parallel to `onsets`
    pub durations: Vec<f64>,
}

/// A design matrix with named columns
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// Scans-by-regressors matrix
    pub matrix: Array2<f64>,
    /// Column names, in matrix order
    pub columns: Vec<String>,
}

impl DesignMatrix {
    /// Number of regressors
    pub fn n_regressors(&self) -> usize {
        self.columns.len()
    }
}

/// Build a first-level design matrix
///
/// Condition columns come first in alphabetical order (each a boxcar
/// convolved with the HRF), then cosine drift columns, then a constant.
///
/// # Errors
///
/// Returns an invalid parameter error if `n_scans` is zero, `t_r` is not
/// positive, or a condition is empty or duplicated.
pub fn build_design(
    conditions: &[Condition],
    n_scans: usize,
    t_r: f64,
    hrf_model: HrfModel,
    drift_model: DriftModel,
) -> Result<DesignMatrix> {
    if n_scans == 0 {
        return Err(invalid_parameter("n_scans", &n_scans, &"must be positive"));
    }
    if t_r <= 0.0 {
        return Err(invalid_parameter("t_r", &t_r, &"must be positive"));
    }

    let mut sorted: Vec<&Condition> = conditions.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for pair in sorted.windows(2) {
        if pair[0].name == pair[1].name {
            return Err(invalid_parameter(
                "conditions",
                &pair[0].name,
                &"duplicate condition name",
            ));
        }
    }

    let hrf = match hrf_model {
        HrfModel::Spm => spm_canonical(t_r),
    };

    let drift = drift_columns(n_scans, t_r, drift_model);
    let n_cols = sorted.len() + drift.len() + 1;
    let mut matrix = Array2::<f64>::zeros((n_scans, n_cols));
    let mut columns = Vec::with_capacity(n_cols);

    for (c, condition) in sorted.iter().enumerate() {
        if condition.onsets.len() != condition.durations.len() {
            return Err(invalid_parameter(
                "conditions",
                &condition.name,
                &"onsets and durations must have equal length",
            ));
        }
        let boxcar = sample_boxcar(condition, n_scans, t_r);
        let regressor = convolve_truncated(&boxcar, &hrf);
        for (t, v) in regressor.iter().enumerate() {
            matrix[[t, c]] = *v;
        }
        columns.push(condition.name.clone());
    }

    for (d, column) in drift.iter().enumerate() {
        let col = sorted.len() + d;
        for (t, v) in column.iter().enumerate() {
            matrix[[t, col]] = *v;
        }
        columns.push(format!("drift_{}", d + 1));
    }

    let constant_col = n_cols - 1;
    for t in 0..n_scans {
        matrix[[t, constant_col]] = 1.0;
    }
    columns.push("constant".to_string());

    Ok(DesignMatrix { matrix, columns })
}

// Condition occupancy sampled at scan acquisition times
fn sample_boxcar(condition: &Condition, n_scans: usize, t_r: f64) -> Vec<f64> {
    let mut boxcar = vec![0.0; n_scans];
    for (scan, value) in boxcar.iter_mut().enumerate() {
        let t = scan as f64 * t_r;
        let active = condition
            .onsets
            .iter()
            .zip(condition.durations.iter())
            .any(|(&onset, &duration)| t >= onset && t < onset + duration);
        if active {
            *value = 1.0;
        }
    }
    boxcar
}

// Causal convolution truncated to the input length
fn convolve_truncated(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; signal.len()];
    for (t, value) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (lag, &k) in kernel.iter().enumerate().take(t + 1) {
            acc += k * signal[t - lag];
        }
        *value = acc;
    }
    out
}

// Discrete cosine transform drift basis below the cutoff frequency
fn drift_columns(n_scans: usize, t_r: f64, model: DriftModel) -> Vec<Vec<f64>> {
    let DriftModel::Cosine { cutoff_secs } = model else {
        return Vec::new();
    };
    let n = n_scans as f64;
    let n_basis = (2.0 * n * t_r / cutoff_secs).floor() as usize;

    let mut columns = Vec::with_capacity(n_basis);
    for k in 1..=n_basis {
        let column: Vec<f64> = (0..n_scans)
            .map(|t| {
                (2.0 / n).sqrt()
                    * (std::f64::consts::PI * (2.0 * t as f64 + 1.0) * k as f64 / (2.0 * n)).cos()
            })
            .collect();
        columns.push(column);
    }
    columns
}

/// Parse a symbolic contrast expression into a weight vector
///
/// Supports sums and differences of column names, e.g. `positive - neutral`.
///
/// # Errors
///
/// Returns an invalid parameter error if the expression is empty or names a
/// regressor absent from the design.
pub fn contrast_weights(expression: &str, columns: &[String]) -> Result<Array1<f64>> {
    let mut weights = Array1::<f64>::zeros(columns.len());
    let mut sign = 1.0;
    let mut any = false;

    for token in expression.split_whitespace() {
        match token {
            "+" => sign = 1.0,
            "-" => sign = -1.0,
            name => {
                let index = columns.iter().position(|c| c == name).ok_or_else(|| {
                    invalid_parameter("contrast", &expression, &format!("unknown regressor '{name}'"))
                })?;
                weights[index] += sign;
                sign = 1.0;
                any = true;
            }
        }
    }

    if !any {
        return Err(invalid_parameter(
            "contrast",
            &expression,
            &"expression names no regressors",
        ));
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_conditions() -> Vec<Condition> {
        ["neutral", "positive", "negative"]
            .iter()
            .enumerate()
            .map(|(i, name)| Condition {
                name: (*name).to_string(),
                onsets: vec![60.0 * i as f64],
                durations: vec![30.0],
            })
            .collect()
    }

    #[test]
    fn test_columns_sorted_with_drift_and_constant() {
        let design = build_design(
            &three_conditions(),
            100,
            2.0,
            HrfModel::Spm,
            DriftModel::cosine_default(),
        )
        .unwrap();
        assert_eq!(design.columns[0], "negative");
        assert_eq!(design.columns[1], "neutral");
        assert_eq!(design.columns[2], "positive");
        assert_eq!(design.columns.last().map(String::as_str), Some("constant"));
        assert!(design.columns.iter().any(|c| c.starts_with("drift_")));
        assert_eq!(design.matrix.nrows(), 100);
        assert_eq!(design.matrix.ncols(), design.columns.len());
    }

    #[test]
    fn test_condition_regressor_rises_after_onset() {
        let conditions = vec![Condition {
            name: "task".to_string(),
            onsets: vec![20.0],
            durations: vec![30.0],
        }];
        let design =
            build_design(&conditions, 60, 2.0, HrfModel::Spm, DriftModel::None).unwrap();
        // Before onset the regressor is zero; well inside the block it is not
        assert!(design.matrix[[5, 0]].abs() < 1e-12);
        assert!(design.matrix[[18, 0]] > 0.01);
    }

    #[test]
    fn test_drift_column_count_follows_cutoff() {
        let design = build_design(
            &three_conditions(),
            200,
            2.0,
            HrfModel::Spm,
            DriftModel::Cosine { cutoff_secs: 128.0 },
        )
        .unwrap();
        // floor(2 * 200 * 2 / 128) = 6 drift columns
        let n_drift = design
            .columns
            .iter()
            .filter(|c| c.starts_with("drift_"))
            .count();
        assert_eq!(n_drift, 6);
    }

    #[test]
    fn test_contrast_weights_difference() {
        let columns: Vec<String> = ["negative", "neutral", "positive", "constant"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let w = contrast_weights("positive - neutral", &columns).unwrap();
        assert_eq!(w.to_vec(), vec![0.0, -1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_contrast_weights_unknown_regressor() {
        let columns = vec!["neutral".to_string()];
        assert!(contrast_weights("positive - neutral", &columns).is_err());
    }

    #[test]
    fn test_duplicate_condition_rejected() {
        let mut conditions = three_conditions();
        conditions.push(Condition {
            name: "neutral".to_string(),
            onsets: vec![0.0],
            durations: vec![1.0],
        });
        assert!(
            build_design(&conditions, 50, 2.0, HrfModel::Spm, DriftModel::None).is_err()
        );
    }
}
