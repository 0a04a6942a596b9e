//! Linear least squares solver.
//!
//! Each Levenberg–Marquardt step solves a small damped linear problem. The
//! normal equations are tried first (Cholesky); when they are too
//! ill-conditioned we fall back to an SVD solve of the equivalent augmented
//! system:
//!
//! ```text
//! minimize ‖ [J; √λ I] δ - [-r; 0] ‖²
//! ```
//!
//! (Nalgebra's `QR::solve` is intended for square systems and will panic for
//! non-square matrices, so SVD is the tall-matrix path.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-12, 1e-10] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `(JᵀJ + λI) δ = -Jᵀr` for a column-scaled Jacobian.
pub fn solve_damped(j: &DMatrix<f64>, r: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let n = j.ncols();
    let jt = j.transpose();
    let a = &jt * j + DMatrix::<f64>::identity(n, n) * lambda;
    let rhs = -(&jt * r);

    if let Some(chol) = a.cholesky() {
        let delta = chol.solve(&rhs);
        if delta.iter().all(|v| v.is_finite()) {
            return Some(delta);
        }
    }

    let m = j.nrows();
    let mut aug = DMatrix::<f64>::zeros(m + n, n);
    aug.view_mut((0, 0), (m, n)).copy_from(j);
    let sl = lambda.sqrt();
    for i in 0..n {
        aug[(m + i, i)] = sl;
    }
    let mut target = DVector::<f64>::zeros(m + n);
    for i in 0..m {
        target[i] = -r[i];
    }
    solve_least_squares(&aug, &target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn undamped_step_is_the_gauss_newton_step() {
        // Residual r = Jx - y at x = 0 is -y, so the full step recovers x.
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = -DVector::from_row_slice(&[2.0, 5.0, 8.0]);
        let delta = solve_damped(&j, &r, 0.0).unwrap();
        assert!((delta[0] - 2.0).abs() < 1e-10);
        assert!((delta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn damping_shrinks_the_step() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = -DVector::from_row_slice(&[2.0, 5.0, 8.0]);
        let full = solve_damped(&j, &r, 0.0).unwrap();
        let damped = solve_damped(&j, &r, 100.0).unwrap();
        assert!(damped.norm() < full.norm());
    }
}
