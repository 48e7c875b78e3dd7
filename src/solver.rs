//! Solving linear systems given by operators.

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    calculus::CalculusId,
    error::DecError,
    operator::{Operand, Operator},
};

/// A Cholesky factorization of a symmetric positive definite operator,
/// used to solve `op x = b` for many right-hand sides `b`.
///
/// Note that [`laplace`][crate::DiscreteExteriorCalculus::laplace]
/// is negative semidefinite,
/// so Poisson problems are solved with its negation plus something definite,
/// e.g. the identity or a Dirichlet condition imposed with
/// [`exclude_subset`][crate::LinearOperator::exclude_subset]
/// and an identity on the excluded rows.
///
/// ```
/// # use khalimsky_dec::{Border, CholeskySolver, DiscreteExteriorCalculus, Primal};
/// let calculus = DiscreteExteriorCalculus::<2, 2>::from_digital_set(
///     (0..4).flat_map(|x| (0..4).map(move |y| [x, y])),
///     Border::Unit,
/// );
/// let op = calculus.identity::<0, Primal>() - calculus.laplace::<Primal>()?;
/// let solver = CholeskySolver::new(op)?;
/// let b = calculus.kform_from_cells::<0, Primal>(|_| 2.0);
/// let x = solver.solve(&b)?;
/// assert!(x.values.iter().all(|v| (v - 2.0).abs() < 1e-9));
/// # Ok::<(), khalimsky_dec::DecError>(())
/// ```
pub struct CholeskySolver<In, Out> {
    factor: nas::factorization::CscCholesky<f64>,
    len: usize,
    calculus: CalculusId,
    _marker: std::marker::PhantomData<(In, Out)>,
}

impl<In, Out> CholeskySolver<In, Out>
where
    In: Operand,
    Out: Operand,
{
    /// Factorize an operator.
    ///
    /// Fails with [`DecError::IncompatibleOperator`] if the operator is not square
    /// and [`DecError::SolverFailure`] if it is not positive definite.
    pub fn new(op: impl Operator<Input = In, Output = Out>) -> Result<Self, DecError> {
        let calculus = op.calculus_id();
        let mat = op.into_csr();
        if mat.nrows() != mat.ncols() {
            return Err(DecError::IncompatibleOperator(format!(
                "only square operators can be factorized, got {}x{}",
                mat.nrows(),
                mat.ncols()
            )));
        }
        let len = mat.nrows();
        let factor = nas::factorization::CscCholesky::factor(&nas::CscMatrix::from(&mat))
            .map_err(|err| DecError::SolverFailure(format!("{err:?}")))?;
        log::debug!("factorized a {len}x{len} operator of {calculus:?}");
        Ok(Self {
            factor,
            len,
            calculus,
            _marker: std::marker::PhantomData,
        })
    }

    /// Solve `op x = b`.
    pub fn solve(&self, b: &Out) -> Result<In, DecError> {
        if b.calculus_id() != self.calculus || b.values().len() != self.len {
            return Err(DecError::IncompatibleOperator(format!(
                "right-hand side of {:?} with {} values does not match a {}x{} operator of {:?}",
                b.calculus_id(),
                b.values().len(),
                self.len,
                self.len,
                self.calculus
            )));
        }
        let rhs = na::DMatrix::from_column_slice(self.len, 1, b.values().as_slice());
        let solution = self.factor.solve(&rhs);
        let values = solution.column(0).into_owned();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DecError::SolverFailure(
                "solution contains non-finite values".to_string(),
            ));
        }
        Ok(In::from_values(values, self.calculus))
    }
}

impl<In, Out> std::fmt::Debug for CholeskySolver<In, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CholeskySolver")
            .field("len", &self.len)
            .field("calculus", &self.calculus)
            .finish_non_exhaustive()
    }
}
