//! Small dense linear algebra: Cholesky solves for normal equations and a
//! 4x4 inverse for affine transforms

use crate::io::error::{Result, computation_error};
use ndarray::{Array1, Array2, ArrayView1};

/// Cholesky factorization of a symmetric positive-definite matrix
///
/// Returns the lower-triangular factor L with A = L * L^T.
///
/// # Errors
///
/// Returns a computation error if the matrix is not square or not positive
/// definite (a rank-deficient design matrix surfaces here).
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(computation_error(
            "cholesky",
            &format!("matrix must be square, got {}x{}", a.nrows(), a.ncols()),
        ));
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(computation_error(
                        "cholesky",
                        &format!("matrix not positive definite at pivot {i}"),
                    ));
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve L * L^T * x = b given the lower Cholesky factor L
pub fn cholesky_solve(l: &Array2<f64>, b: &ArrayView1<'_, f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);

    // Forward substitution: L y = b
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }

    // Back substitution: L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    x
}

/// Invert a 4x4 matrix via Gauss-Jordan elimination with partial pivoting
///
/// # Errors
///
/// Returns a computation error if the matrix is singular (a degenerate
/// affine).
pub fn invert_4x4(m: &[[f64; 4]; 4]) -> Result<[[f64; 4]; 4]> {
    let mut a = *m;
    let mut inv = [[0.0; 4]; 4];
    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for col in 0..4 {
        // Partial pivot
        let mut pivot_row = col;
        let mut pivot_val = a[col][col].abs();
        for row in (col + 1)..4 {
            if a[row][col].abs() > pivot_val {
                pivot_val = a[row][col].abs();
                pivot_row = row;
            }
        }
        if pivot_val < 1e-12 {
            return Err(computation_error("invert_4x4", &"matrix is singular"));
        }
        if pivot_row != col {
            a.swap(col, pivot_row);
            inv.swap(col, pivot_row);
        }

        let pivot = a[col][col];
        for k in 0..4 {
            a[col][k] /= pivot;
            inv[col][k] /= pivot;
        }

        for row in 0..4 {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..4 {
                a[row][k] -= factor * a[col][k];
                inv[row][k] -= factor * inv[col][k];
            }
        }
    }

    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_solve_known_system() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![10.0, 8.0];
        let l = cholesky(&a).unwrap();
        let x = cholesky_solve(&l, &b.view());
        // 4x + 2y = 10, 2x + 3y = 8 -> x = 1.75, y = 1.5
        assert!((x[0] - 1.75).abs() < 1e-12);
        assert!((x[1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(cholesky(&a).is_err());
    }

    #[test]
    fn test_invert_4x4_round_trip() {
        let m = [
            [2.0, 0.0, 0.0, 5.0],
            [0.0, 3.0, 0.0, -4.0],
            [0.0, 0.0, 2.5, 1.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let inv = invert_4x4(&m).unwrap();
        // m * inv should be identity
        for i in 0..4 {
            for j in 0..4 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += m[i][k] * inv[k][j];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((acc - expected).abs() < 1e-10, "entry ({i},{j}) = {acc}");
            }
        }
    }

    #[test]
    fn test_invert_4x4_singular() {
        let m = [[0.0; 4]; 4];
        assert!(invert_4x4(&m).is_err());
    }
}
