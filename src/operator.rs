//! Composable linear operators acting on [`KForm`][crate::KForm]s.
//!
//! Operators are tagged with the types of the forms they consume and produce,
//! so composing a derivative with the wrong hodge is a compile error.
//! What the types cannot express, namely which calculus an operator was built from
//! and whether the registry changed in between, is checked when operators are
//! applied, composed or added.

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    calculus::{CalculusId, DiscreteExteriorCalculus, SubsetImpl},
    duality::DualityKind,
    error::DecError,
    kform::KFormImpl,
};
use itertools::izip;

//
// traits
//

/// Trait enabling operator composition checked for compatibility at compile time.
pub trait Operator {
    /// The type of form this operator takes as an input.
    type Input: Operand;
    /// The type of form this operator produces as an output.
    type Output: Operand;

    /// Apply this operator to an input form,
    /// failing if the form comes from another calculus or has the wrong length.
    fn try_apply(&self, input: &Self::Input) -> Result<Self::Output, DecError>;

    /// Apply this operator to an input form.
    ///
    /// Panics in the situations where [`try_apply`][Self::try_apply] fails.
    fn apply(&self, input: &Self::Input) -> Self::Output {
        match self.try_apply(input) {
            Ok(output) => output,
            Err(err) => panic!("{err}"),
        }
    }

    /// Id of the calculus this operator was built from.
    fn calculus_id(&self) -> CalculusId;

    /// Convert this operator into a CSR matrix.
    fn into_csr(self) -> nas::CsrMatrix<f64>;
}

/// Trait implemented by [`KForm`][crate::KForm]s to enable operators
/// to construct and deconstruct them in a generic way.
pub trait Operand {
    /// The order of this form as a type-level number.
    type Order: na::DimName;
    /// The duality marker of this form.
    type Duality: DualityKind;
    /// Get the underlying vector of values.
    fn values(&self) -> &na::DVector<f64>;
    /// Id of the calculus the form belongs to.
    fn calculus_id(&self) -> CalculusId;
    /// Construct a form from a vector of values.
    fn from_values(values: na::DVector<f64>, calculus: CalculusId) -> Self;
}

fn check_input<In: Operand>(
    calculus: CalculusId,
    expected_len: usize,
    input: &In,
) -> Result<(), DecError> {
    if input.calculus_id() != calculus {
        return Err(DecError::IncompatibleOperator(format!(
            "operator of {calculus:?} applied to a form of {:?}",
            input.calculus_id()
        )));
    }
    if input.values().len() != expected_len {
        return Err(DecError::IncompatibleOperator(format!(
            "operator expects a form of length {expected_len}, got {}",
            input.values().len()
        )));
    }
    Ok(())
}

//
// concrete operators
//

/// A diagonal matrix operator, used for hodge operators.
///
/// See [`LinearOperator`] for the general case.
#[derive(Clone, Debug)]
pub struct DiagonalOperator<Input, Output> {
    // a diagonal vector is a more efficient form of storage than a CSR matrix.
    // this is converted to a matrix upon composition with other operators
    diagonal: na::DVector<f64>,
    calculus: CalculusId,
    _marker: std::marker::PhantomData<(Input, Output)>,
}

impl<Input, Output> DiagonalOperator<Input, Output> {
    #[inline]
    pub(crate) fn new(diagonal: na::DVector<f64>, calculus: CalculusId) -> Self {
        Self {
            diagonal,
            calculus,
            _marker: std::marker::PhantomData,
        }
    }

    /// The diagonal entries.
    #[inline]
    pub fn diagonal(&self) -> &na::DVector<f64> {
        &self.diagonal
    }

    /// The operator as a dense matrix.
    pub fn to_dense(&self) -> na::DMatrix<f64> {
        na::DMatrix::from_diagonal(&self.diagonal)
    }
}

impl<Input, Output> Operator for DiagonalOperator<Input, Output>
where
    Input: Operand,
    Output: Operand,
{
    type Input = Input;
    type Output = Output;

    fn try_apply(&self, input: &Self::Input) -> Result<Self::Output, DecError> {
        check_input(self.calculus, self.diagonal.len(), input)?;
        let input = input.values();
        let ret = na::DVector::from_iterator(
            input.len(),
            izip!(self.diagonal.iter(), input.iter()).map(|(&diag_val, &in_val)| diag_val * in_val),
        );
        Ok(Self::Output::from_values(ret, self.calculus))
    }

    fn calculus_id(&self) -> CalculusId {
        self.calculus
    }

    fn into_csr(self) -> nas::CsrMatrix<f64> {
        diagonal_csr(&self.diagonal)
    }
}

impl<Input, Output> DiagonalOperator<Input, Output>
where
    Input: Operand,
    Output: Operand,
{
    /// Set a subset of elements in the output form to zero
    /// when this operator is applied
    /// (i.e. set a subset of rows in the operator matrix to zero).
    /// Useful for boundary conditions.
    pub fn exclude_subset(
        mut self,
        set: &SubsetImpl<<Output as Operand>::Order, <Output as Operand>::Duality>,
    ) -> Self {
        for row_idx in set.indices.ones() {
            if let Some(val) = self.diagonal.get_mut(row_idx) {
                *val = 0.0;
            }
        }
        self
    }
}

impl<Input, Output> PartialEq for DiagonalOperator<Input, Output> {
    fn eq(&self, other: &Self) -> bool {
        self.calculus == other.calculus && self.diagonal == other.diagonal
    }
}

/// A general sparse matrix operator,
/// parameterized with the form types it consumes and produces.
///
/// This can be a composition of one or more [`LinearOperator`]s and [`DiagonalOperator`]s.
/// Composition can be done using multiplication syntax:
/// ```
/// # use khalimsky_dec::{Border, DiscreteExteriorCalculus, Primal, LinearOperator};
/// # let calculus = DiscreteExteriorCalculus::<2, 2>::from_digital_set([[0, 0]], Border::Unit);
/// let op: LinearOperator<_, _> = calculus.hodge::<1, Primal>()? * calculus.derivative::<0, Primal>();
/// # Ok::<(), khalimsky_dec::DecError>(())
/// ```
/// A free function [`compose`] is also provided for the same purpose,
/// together with [`try_compose`] which reports mismatches instead of panicking.
///
/// Diagonal operators can be converted into a `LinearOperator`
/// using the std [`From`] trait,
/// which enables writing all operator types as `LinearOperator<Input, Output>`,
/// or more concisely with the type alias [`Op`].
#[derive(Clone, Debug)]
pub struct LinearOperator<Input, Output> {
    mat: nas::CsrMatrix<f64>,
    calculus: CalculusId,
    _marker: std::marker::PhantomData<(Input, Output)>,
}

/// A type alias for [`LinearOperator`]
/// to make common patterns more convenient to type.
pub type Op<Input, Output> = LinearOperator<Input, Output>;

impl<Input, Output> LinearOperator<Input, Output> {
    #[inline]
    pub(crate) fn new(mat: nas::CsrMatrix<f64>, calculus: CalculusId) -> Self {
        Self {
            mat,
            calculus,
            _marker: std::marker::PhantomData,
        }
    }

    /// The underlying sparse matrix.
    #[inline]
    pub fn matrix(&self) -> &nas::CsrMatrix<f64> {
        &self.mat
    }

    /// Number of rows, i.e. the length of output forms.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.mat.nrows()
    }

    /// Number of columns, i.e. the length of input forms.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.mat.ncols()
    }

    /// The operator as a dense matrix.
    pub fn to_dense(&self) -> na::DMatrix<f64> {
        na::DMatrix::from(&self.mat)
    }

    /// The transposed operator, mapping outputs back to inputs.
    pub fn transpose(&self) -> LinearOperator<Output, Input> {
        LinearOperator::new(self.mat.transpose(), self.calculus)
    }

    fn check_same_space(&self, other: &Self) -> Result<(), DecError> {
        if self.calculus != other.calculus {
            return Err(DecError::IncompatibleOperator(format!(
                "operators belong to different calculi ({:?} and {:?})",
                self.calculus, other.calculus
            )));
        }
        if self.mat.nrows() != other.mat.nrows() || self.mat.ncols() != other.mat.ncols() {
            return Err(DecError::IncompatibleOperator(format!(
                "operator shapes differ ({}x{} and {}x{})",
                self.mat.nrows(),
                self.mat.ncols(),
                other.mat.nrows(),
                other.mat.ncols()
            )));
        }
        Ok(())
    }

    /// Sum of two operators, failing if they are incompatible.
    pub fn try_add(&self, other: &Self) -> Result<Self, DecError> {
        self.check_same_space(other)?;
        Ok(Self::new(&self.mat + &other.mat, self.calculus))
    }

    /// Difference of two operators, failing if they are incompatible.
    pub fn try_sub(&self, other: &Self) -> Result<Self, DecError> {
        self.check_same_space(other)?;
        Ok(Self::new(&self.mat - &other.mat, self.calculus))
    }
}

impl<Input, Output> LinearOperator<Input, Output>
where
    Input: Operand,
    Output: Operand,
{
    /// Wrap a user-assembled matrix as an operator of the given calculus.
    ///
    /// The shape must match the lengths of the input and output forms.
    pub fn from_csr<const EMB: usize, const AMB: usize>(
        calculus: &DiscreteExteriorCalculus<EMB, AMB>,
        mat: nas::CsrMatrix<f64>,
    ) -> Result<Self, DecError> {
        let rows = calculus.kform_length(
            <Output::Order as na::DimName>::USIZE,
            <Output::Duality as DualityKind>::DUALITY,
        );
        let cols = calculus.kform_length(
            <Input::Order as na::DimName>::USIZE,
            <Input::Duality as DualityKind>::DUALITY,
        );
        if mat.nrows() != rows || mat.ncols() != cols {
            return Err(DecError::IncompatibleOperator(format!(
                "expected a {rows}x{cols} matrix, got {}x{}",
                mat.nrows(),
                mat.ncols()
            )));
        }
        Ok(Self::new(mat, calculus.id()))
    }

    /// Set a subset of elements in the output form to zero
    /// when this operator is applied
    /// (i.e. set a subset of rows in the operator matrix to zero).
    pub fn exclude_subset(
        mut self,
        set: &SubsetImpl<<Output as Operand>::Order, <Output as Operand>::Duality>,
    ) -> Self {
        self.mat = drop_csr_rows(&self.mat, &set.indices);
        self
    }
}

impl<Input, Output> Operator for LinearOperator<Input, Output>
where
    Input: Operand,
    Output: Operand,
{
    type Input = Input;
    type Output = Output;

    fn try_apply(&self, input: &Self::Input) -> Result<Self::Output, DecError> {
        check_input(self.calculus, self.mat.ncols(), input)?;
        Ok(Self::Output::from_values(
            &self.mat * input.values(),
            self.calculus,
        ))
    }

    fn calculus_id(&self) -> CalculusId {
        self.calculus
    }

    fn into_csr(self) -> nas::CsrMatrix<f64> {
        self.mat
    }
}

impl<L, R> PartialEq for LinearOperator<L, R> {
    fn eq(&self, other: &Self) -> bool {
        self.calculus == other.calculus && self.mat == other.mat
    }
}

impl<Input, Output> From<DiagonalOperator<Input, Output>> for LinearOperator<Input, Output>
where
    DiagonalOperator<Input, Output>: Operator,
{
    fn from(s: DiagonalOperator<Input, Output>) -> Self {
        let calculus = s.calculus;
        Self::new(s.into_csr(), calculus)
    }
}

//
// helper functions
//

/// Compose two operators such that `r` is applied before `l`,
/// failing if they come from different calculi or their shapes don't line up.
pub fn try_compose<Left, Right>(
    l: Left,
    r: Right,
) -> Result<LinearOperator<Right::Input, Left::Output>, DecError>
where
    Left: Operator<Input = Right::Output>,
    Right: Operator,
{
    let (l_calculus, r_calculus) = (l.calculus_id(), r.calculus_id());
    if l_calculus != r_calculus {
        return Err(DecError::IncompatibleOperator(format!(
            "cannot compose operators of {l_calculus:?} and {r_calculus:?}"
        )));
    }
    let (l_mat, r_mat) = (l.into_csr(), r.into_csr());
    if l_mat.ncols() != r_mat.nrows() {
        return Err(DecError::IncompatibleOperator(format!(
            "cannot compose a {}x{} operator with a {}x{} one",
            l_mat.nrows(),
            l_mat.ncols(),
            r_mat.nrows(),
            r_mat.ncols()
        )));
    }
    Ok(LinearOperator::new(l_mat * r_mat, l_calculus))
}

/// Compose two operators such that `r` is applied before `l`.
///
/// This can also be done with multiplication syntax:
/// ```
/// # use khalimsky_dec::{Border, DiscreteExteriorCalculus, Primal, operator::compose};
/// # let calculus = DiscreteExteriorCalculus::<2, 2>::from_digital_set([[0, 0]], Border::Unit);
/// assert_eq!(
///     compose(calculus.hodge::<1, Primal>()?, calculus.derivative::<0, Primal>()),
///     calculus.hodge::<1, Primal>()? * calculus.derivative::<0, Primal>(),
/// );
/// # Ok::<(), khalimsky_dec::DecError>(())
/// ```
///
/// Panics in the situations where [`try_compose`] fails.
pub fn compose<Left, Right>(l: Left, r: Right) -> LinearOperator<Right::Input, Left::Output>
where
    Left: Operator<Input = Right::Output>,
    Right: Operator,
{
    match try_compose(l, r) {
        Ok(op) => op,
        Err(err) => panic!("{err}"),
    }
}

/// Sparse matrix with the given values on its diagonal.
pub(crate) fn diagonal_csr(diagonal: &na::DVector<f64>) -> nas::CsrMatrix<f64> {
    // there is no method to construct CSR directly from a diagonal.
    // construct an identity matrix to get the right sparsity pattern
    // and then replace the entries
    let mut csr = nas::CsrMatrix::identity(diagonal.len());
    for (&diag, mat_diag) in diagonal.iter().zip(csr.values_mut()) {
        *mat_diag = diag;
    }
    csr
}

/// Copy of a CSR matrix with the given rows removed from the sparsity pattern.
fn drop_csr_rows(
    mat: &nas::CsrMatrix<f64>,
    set_to_drop: &fixedbitset::FixedBitSet,
) -> nas::CsrMatrix<f64> {
    let mut coo = nas::CooMatrix::new(mat.nrows(), mat.ncols());
    for (row, col, &val) in mat.triplet_iter() {
        if !set_to_drop.contains(row) {
            coo.push(row, col, val);
        }
    }
    nas::CsrMatrix::from(&coo)
}

//
// std trait implementations
//

// Mul implementations for composition, scalar multiplication and application to forms.
// These need to be implemented for each type separately due to the orphan rule

// compositions

impl<In, Out, Op> std::ops::Mul<Op> for DiagonalOperator<In, Out>
where
    In: Operand,
    Out: Operand,
    Op: Operator<Output = <Self as Operator>::Input>,
{
    type Output = LinearOperator<Op::Input, <Self as Operator>::Output>;

    fn mul(self, rhs: Op) -> Self::Output {
        compose(self, rhs)
    }
}

impl<In, Out, Op> std::ops::Mul<Op> for LinearOperator<In, Out>
where
    In: Operand,
    Out: Operand,
    Op: Operator<Output = <Self as Operator>::Input>,
{
    type Output = LinearOperator<Op::Input, <Self as Operator>::Output>;

    fn mul(self, rhs: Op) -> Self::Output {
        compose(self, rhs)
    }
}

// scalar multiplication

impl<Input, Output> std::ops::Mul<DiagonalOperator<Input, Output>> for f64 {
    type Output = DiagonalOperator<Input, Output>;

    fn mul(self, mut rhs: DiagonalOperator<Input, Output>) -> Self::Output {
        rhs.diagonal *= self;
        rhs
    }
}

impl<L, R> std::ops::Mul<LinearOperator<L, R>> for f64 {
    type Output = LinearOperator<L, R>;

    fn mul(self, mut rhs: LinearOperator<L, R>) -> Self::Output {
        rhs.mat *= self;
        rhs
    }
}

// addition, panicking on incompatible operands

impl<L, R> std::ops::Add for LinearOperator<L, R> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match self.try_add(&rhs) {
            Ok(op) => op,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<L, R> std::ops::Sub for LinearOperator<L, R> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        match self.try_sub(&rhs) {
            Ok(op) => op,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<L, R> std::ops::Neg for LinearOperator<L, R> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        -1.0 * self
    }
}

impl<L, R> std::ops::Add for DiagonalOperator<L, R> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        assert!(
            self.calculus == rhs.calculus && self.diagonal.len() == rhs.diagonal.len(),
            "cannot add diagonal operators of different calculi or sizes"
        );
        Self::new(self.diagonal + rhs.diagonal, self.calculus)
    }
}

// forms

// impl for reference too, because the impl for value consumes the operator
// and we don't usually want that
impl<Out, O, D> std::ops::Mul<&KFormImpl<O, D>> for DiagonalOperator<KFormImpl<O, D>, Out>
where
    Out: Operand,
    KFormImpl<O, D>: Operand,
{
    type Output = Out;

    fn mul(self, rhs: &KFormImpl<O, D>) -> Self::Output {
        self.apply(rhs)
    }
}

impl<Out, O, D> std::ops::Mul<&KFormImpl<O, D>> for &DiagonalOperator<KFormImpl<O, D>, Out>
where
    Out: Operand,
    KFormImpl<O, D>: Operand,
{
    type Output = Out;

    fn mul(self, rhs: &KFormImpl<O, D>) -> Self::Output {
        self.apply(rhs)
    }
}

impl<Out, O, D> std::ops::Mul<&KFormImpl<O, D>> for LinearOperator<KFormImpl<O, D>, Out>
where
    Out: Operand,
    KFormImpl<O, D>: Operand,
{
    type Output = Out;

    fn mul(self, rhs: &KFormImpl<O, D>) -> Self::Output {
        self.apply(rhs)
    }
}

impl<Out, O, D> std::ops::Mul<&KFormImpl<O, D>> for &LinearOperator<KFormImpl<O, D>, Out>
where
    Out: Operand,
    KFormImpl<O, D>: Operand,
{
    type Output = Out;

    fn mul(self, rhs: &KFormImpl<O, D>) -> Self::Output {
        self.apply(rhs)
    }
}

// impls for trait objects

impl<O, D, Out> std::ops::Mul<&KFormImpl<O, D>>
    for &dyn Operator<Input = KFormImpl<O, D>, Output = Out>
where
    Out: Operand,
    KFormImpl<O, D>: Operand,
{
    type Output = Out;

    fn mul(self, rhs: &KFormImpl<O, D>) -> Self::Output {
        self.apply(rhs)
    }
}

impl<O, D, Out> std::ops::Mul<&KFormImpl<O, D>>
    for &Box<dyn Operator<Input = KFormImpl<O, D>, Output = Out>>
where
    Out: Operand,
    KFormImpl<O, D>: Operand,
{
    type Output = Out;

    fn mul(self, rhs: &KFormImpl<O, D>) -> Self::Output {
        self.apply(rhs)
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Border, Dual, KForm, Primal, Subset};

    fn strip() -> DiscreteExteriorCalculus<2, 2> {
        DiscreteExteriorCalculus::from_digital_set([[0, 0], [1, 0], [2, 0]], Border::Unit)
    }

    #[test]
    fn application_and_composition() {
        let calculus = strip();
        // each vertex gets the sum of its Khalimsky coordinates
        let c0 = calculus.kform_from_cells::<0, Primal>(|cell| {
            cell.cell.kcoords.iter().map(|&k| k as f64).sum()
        });

        let d0 = calculus.derivative::<0, Primal>();
        let c1 = d0.apply(&c0);
        // this would fail to typecheck because orders don't match:
        // let c2 = d0.apply(&c1);

        // every edge has length 2 in Khalimsky coordinates,
        // so with positive orientations the difference is always 2
        assert!(
            c1.values.iter().all(|v| *v == 2.0),
            "d_0 gave unexpected results: {c1:?}"
        );

        // type inference
        let c2 = calculus.derivative() * &c1;
        assert!(
            c2.values.iter().all(|v| *v == 0.0),
            "d twice should always be zero"
        );

        let composed: Op<KForm<0, Primal>, KForm<2, Primal>> =
            calculus.derivative::<1, Primal>() * calculus.derivative::<0, Primal>();
        assert_eq!(composed.nrows(), 3);
        assert_eq!(composed.ncols(), 8);
        assert!(composed.matrix().values().iter().all(|v| *v == 0.0));

        let boxed: Box<dyn Operator<Input = KForm<0, Primal>, Output = KForm<1, Primal>>> =
            Box::new(calculus.derivative::<0, Primal>());
        assert_eq!(&boxed * &c0, c1);
    }

    #[test]
    fn linear_combinations() {
        let calculus = strip();
        let d0 = calculus.derivative::<0, Primal>();
        let zero = d0.clone() - d0.clone();
        assert!(zero.to_dense().iter().all(|v| *v == 0.0));

        let doubled = d0.clone() + d0.clone();
        assert_eq!(doubled, 2.0 * d0.clone());
        assert_eq!(-d0.clone(), -1.0 * d0.clone());
        assert_eq!(d0.transpose().transpose(), d0);
        assert_eq!(d0.transpose().to_dense(), d0.to_dense().transpose());

        let other = strip();
        assert!(matches!(
            d0.try_add(&other.derivative::<0, Primal>()),
            Err(DecError::IncompatibleOperator(_))
        ));
        assert!(try_compose(
            other.derivative::<1, Primal>(),
            calculus.derivative::<0, Primal>()
        )
        .is_err());

        let star = calculus.hodge::<0, Primal>().unwrap();
        let star_sum = star.clone() + star.clone();
        assert_eq!(star_sum, 2.0 * star.clone());
        assert_eq!(star.to_dense(), LinearOperator::from(star).to_dense());
    }

    #[test]
    fn apply_rejects_foreign_forms() {
        let calculus = strip();
        let other = strip();
        let d0 = calculus.derivative::<0, Primal>();
        let foreign = other.new_zero_kform::<0, Primal>();
        assert!(matches!(
            d0.try_apply(&foreign),
            Err(DecError::IncompatibleOperator(_))
        ));
        let star = calculus.hodge::<1, Dual>().unwrap();
        assert!(star.try_apply(&other.new_zero_kform::<1, Dual>()).is_err());
        assert!(star.try_apply(&calculus.new_zero_kform::<1, Dual>()).is_ok());
    }

    #[test]
    fn from_csr_checks_shape() {
        let calculus = strip();
        let ok = LinearOperator::<KForm<0, Primal>, KForm<1, Primal>>::from_csr(
            &calculus,
            nas::CsrMatrix::zeros(10, 8),
        );
        assert!(ok.is_ok());
        let wrong = LinearOperator::<KForm<0, Primal>, KForm<1, Primal>>::from_csr(
            &calculus,
            nas::CsrMatrix::zeros(8, 10),
        );
        assert!(wrong.is_err());
    }

    #[test]
    fn exclude_subsets() {
        let calculus = DiscreteExteriorCalculus::<2, 2>::from_digital_set(
            (0..3).flat_map(|x| (0..3).map(move |y| [x, y])),
            Border::Unit,
        );

        // derivative

        let d0_full = calculus.derivative::<0, Primal>();
        let border: Subset<1, Primal> = calculus.border();
        assert_eq!(border.count(), 12);
        let d0_excluded = d0_full.clone().exclude_subset(&border);
        for (row_idx, (full_row, excluded_row)) in
            izip!(d0_full.matrix().row_iter(), d0_excluded.matrix().row_iter()).enumerate()
        {
            if border.contains(row_idx) {
                assert!(excluded_row.nnz() == 0);
            } else {
                assert_eq!(full_row, excluded_row);
            }
        }

        // hodge

        let star_full = calculus.hodge::<2, Dual>().unwrap();
        let border = calculus.border::<0, Primal>();
        assert_eq!(border.count(), 12);
        let star_excluded = star_full.clone().exclude_subset(&border);
        for (row_idx, (full_diag, excluded_diag)) in
            izip!(star_full.diagonal().iter(), star_excluded.diagonal().iter()).enumerate()
        {
            if border.contains(row_idx) {
                assert!(*excluded_diag == 0.0);
            } else {
                assert_eq!(full_diag, excluded_diag);
            }
        }

        // composed

        let comp_full = calculus.laplace::<Primal>().unwrap();
        let comp_excluded = comp_full.clone().exclude_subset(&border);
        for (row_idx, (full_row, excluded_row)) in
            izip!(comp_full.matrix().row_iter(), comp_excluded.matrix().row_iter()).enumerate()
        {
            if border.contains(row_idx) {
                assert!(excluded_row.nnz() == 0);
            } else {
                assert_eq!(full_row, excluded_row);
            }
        }
    }
}
