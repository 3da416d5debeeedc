//! utils::dense — explicit matrices for small verification problems.
//!
//! Purpose
//! -------
//! Materialize an operator as a dense `nalgebra::DMatrix` by probing it
//! with unit vectors, and solve or inspect the result with standard dense
//! linear algebra. Only meant for small domains: tests, debugging and
//! cross-checks of the implicit machinery.
//!
//! Key behaviors
//! -------------
//! - [`to_dense`] applies the operator in a chosen mode to every unit
//!   vector of its input domain and stores the results as columns.
//! - [`solve_spd`] solves `M x = b` by Cholesky and reports non-positive
//!   definite matrices as [`IftError::NotPositiveDefinite`].
//! - [`symmetric_eigenvalues`] returns the spectrum of a symmetric matrix
//!   in ascending order.
use nalgebra::{DMatrix, DVector};

use crate::{
    domain::DomainRef,
    errors::{IftError, IftResult},
    field::Field,
    operators::{LinearOperator, Mode},
};

/// Dense matrix of `op` applied in `mode`.
pub fn to_dense(op: &dyn LinearOperator, mode: Mode) -> IftResult<DMatrix<f64>> {
    let (input, output) =
        if mode.input_is_domain() { (op.domain(), op.target()) } else { (op.target(), op.domain()) };
    let (rows, cols) = (output.size(), input.size());
    let mut matrix = DMatrix::<f64>::zeros(rows, cols);
    for j in 0..cols {
        let unit = Field::from_fn(input.clone(), |i| if i == j { 1.0 } else { 0.0 });
        let column = op.apply(&unit, mode)?;
        for (i, v) in column.val().iter().enumerate() {
            matrix[(i, j)] = *v;
        }
    }
    Ok(matrix)
}

/// Solve `matrix · x = rhs` for symmetric positive definite `matrix`.
///
/// # Errors
/// - [`IftError::ShapeMismatch`] if dimensions disagree.
/// - [`IftError::NotPositiveDefinite`] if the Cholesky factorization fails.
pub fn solve_spd(matrix: &DMatrix<f64>, rhs: &Field, domain: &DomainRef) -> IftResult<Field> {
    if matrix.nrows() != rhs.size() || matrix.ncols() != domain.size() {
        return Err(IftError::ShapeMismatch { expected: matrix.nrows(), found: rhs.size() });
    }
    let chol = matrix.clone().cholesky().ok_or_else(|| IftError::NotPositiveDefinite {
        context: "dense cholesky",
        value: symmetric_eigenvalues(matrix).first().copied().unwrap_or(f64::NAN),
    })?;
    let b = DVector::from_iterator(rhs.size(), rhs.val().iter().copied());
    let x = chol.solve(&b);
    Field::from_vec(domain.clone(), x.iter().copied().collect())
}

/// Eigenvalues of a symmetric matrix, ascending.
pub fn symmetric_eigenvalues(matrix: &DMatrix<f64>) -> Vec<f64> {
    let mut values: Vec<f64> = matrix.clone().symmetric_eigen().eigenvalues.iter().copied().collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Domain,
        operators::{MatrixOperator, OpRef, OperatorAlgebra, ScalingOperator},
    };
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::sync::Arc;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Dense reconstruction of implicit operators.
    // - Reference SPD solves and rejection of indefinite matrices.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Probing reproduces the matrix and its transpose for the adjoint.
    //
    // Given
    // -----
    // - A 2 × 3 matrix operator.
    //
    // Expect
    // ------
    // - `to_dense(Times)` equals the matrix; `to_dense(AdjointTimes)` its transpose.
    fn to_dense_reproduces_matrix() {
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let op = MatrixOperator::new(Domain::unstructured(3), Domain::unstructured(2), m).unwrap();

        let fwd = to_dense(&op, Mode::Times).unwrap();
        let adj = to_dense(&op, Mode::AdjointTimes).unwrap();

        assert_eq!(fwd, DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(adj, fwd.transpose());
    }

    #[test]
    // Purpose
    // -------
    // Dense SPD solves agree with the analytic inverse; indefinite matrices fail.
    //
    // Given
    // -----
    // - MᵀM + 1 for a small M, and -1.
    //
    // Expect
    // ------
    // - M x = b holds to 1e-12; the negative scaling is rejected.
    fn solve_spd_and_reject_indefinite() {
        let domain = Domain::unstructured(2);
        let m: OpRef = Arc::new(MatrixOperator::new(domain.clone(), domain.clone(), array![[2.0, 1.0], [0.0, 1.0]]).unwrap());
        let a = m.adjoint().chain(&m).unwrap().plus(&ScalingOperator::shared(domain.clone(), 1.0)).unwrap();
        let dense = to_dense(a.as_ref(), Mode::Times).unwrap();
        let b = Field::from_vec(domain.clone(), vec![1.0, -1.0]).unwrap();

        let x = solve_spd(&dense, &b, &domain).unwrap();

        let ax = a.times(&x).unwrap();
        for (u, v) in ax.val().iter().zip(b.val().iter()) {
            assert_relative_eq!(*u, *v, epsilon = 1e-12);
        }
        let neg = to_dense(&ScalingOperator::new(domain.clone(), -1.0), Mode::Times).unwrap();
        assert!(matches!(solve_spd(&neg, &b, &domain), Err(IftError::NotPositiveDefinite { .. })));
        assert_relative_eq!(symmetric_eigenvalues(&neg)[0], -1.0);
    }
}
