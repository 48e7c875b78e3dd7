//! K-forms, i.e. values assigned to the cells of a calculus.

use nalgebra as na;

use crate::{calculus::CalculusId, duality::DualityKind, error::DecError};

/// A vector of values corresponding to the `ORDER`-cells
/// of a calculus, on either the primal or the dual complex.
///
/// K-forms are constructed with methods on
/// [`DiscreteExteriorCalculus`][crate::DiscreteExteriorCalculus]:
/// - [`new_zero_kform`][crate::DiscreteExteriorCalculus::new_zero_kform]
/// - [`kform_from_values`][crate::DiscreteExteriorCalculus::kform_from_values]
/// - [`kform_from_cells`][crate::DiscreteExteriorCalculus::kform_from_cells]
pub type KForm<const ORDER: usize, D> = KFormImpl<na::Const<ORDER>, D>;

/// The k-form type used internally.
///
/// This type cannot use const generics because they cannot currently
/// do the compile-time arithmetic needed for operators.
/// The alias [`KForm`] is preferred in public APIs.
#[derive(Clone)]
pub struct KFormImpl<Order, D> {
    /// The underlying vector of real values, exposed for convenience.
    ///
    /// Changing the length of this vector makes the form incompatible
    /// with every operator of its calculus.
    pub values: na::DVector<f64>,
    calculus: CalculusId,
    _marker: std::marker::PhantomData<(Order, D)>,
}

impl<Order, D> KFormImpl<Order, D> {
    #[inline]
    pub(crate) fn from_values(values: na::DVector<f64>, calculus: CalculusId) -> Self {
        Self {
            values,
            calculus,
            _marker: std::marker::PhantomData,
        }
    }

    #[inline]
    pub(crate) fn zeros(len: usize, calculus: CalculusId) -> Self {
        Self::from_values(na::DVector::zeros(len), calculus)
    }

    /// Id of the calculus this form was built from.
    #[inline]
    pub fn calculus_id(&self) -> CalculusId {
        self.calculus
    }

    /// Number of values in the form.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the form has no values at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Set every value to zero.
    pub fn clear(&mut self) {
        self.values.fill(0.0);
    }

    /// Check that `other` can be combined with `self` element-wise.
    pub fn check_compatible(&self, other: &Self) -> Result<(), DecError> {
        if self.calculus != other.calculus {
            return Err(DecError::IncompatibleOperator(format!(
                "forms belong to different calculi ({:?} and {:?})",
                self.calculus, other.calculus
            )));
        }
        if self.len() != other.len() {
            return Err(DecError::IncompatibleOperator(format!(
                "forms have different lengths ({} and {})",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }

    /// Element-wise sum, failing if the forms are incompatible.
    pub fn try_add(&self, other: &Self) -> Result<Self, DecError> {
        self.check_compatible(other)?;
        Ok(Self::from_values(&self.values + &other.values, self.calculus))
    }

    /// Element-wise difference, failing if the forms are incompatible.
    pub fn try_sub(&self, other: &Self) -> Result<Self, DecError> {
        self.check_compatible(other)?;
        Ok(Self::from_values(&self.values - &other.values, self.calculus))
    }

    /// Linearly interpolate along the line from `self` to `end`.
    pub fn lerp(&self, end: &Self, t: f64) -> Self {
        self + &(t * (end - self))
    }

    fn assert_compatible(&self, other: &Self) {
        if let Err(err) = self.check_compatible(other) {
            panic!("{err}");
        }
    }
}

impl<Order, D> crate::operator::Operand for KFormImpl<Order, D>
where
    Order: na::DimName,
    D: DualityKind,
{
    type Order = Order;
    type Duality = D;

    fn values(&self) -> &na::DVector<f64> {
        &self.values
    }

    fn calculus_id(&self) -> CalculusId {
        self.calculus
    }

    fn from_values(values: na::DVector<f64>, calculus: CalculusId) -> Self {
        Self::from_values(values, calculus)
    }
}

// std trait impls for math ops and such

impl<Order, D> std::fmt::Debug for KFormImpl<Order, D>
where
    Order: na::DimName,
    D: DualityKind,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}-form, values {:?}",
            D::DUALITY,
            Order::USIZE,
            self.values.as_slice()
        )
    }
}

impl<Order, D> PartialEq for KFormImpl<Order, D> {
    fn eq(&self, other: &Self) -> bool {
        self.calculus == other.calculus && self.values == other.values
    }
}

// binary ops for every owned/borrowed permutation.
// these panic on forms from different calculi;
// use the `try_*` methods to handle that case

macro_rules! impl_binary_op {
    ($Trait:ident, $method:ident, $op:tt) => {
        impl<O, D> std::ops::$Trait for KFormImpl<O, D> {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                self.assert_compatible(&rhs);
                Self::from_values(self.values $op rhs.values, self.calculus)
            }
        }

        impl<O, D> std::ops::$Trait<&KFormImpl<O, D>> for KFormImpl<O, D> {
            type Output = Self;

            fn $method(self, rhs: &KFormImpl<O, D>) -> Self::Output {
                self.assert_compatible(rhs);
                Self::from_values(self.values $op &rhs.values, self.calculus)
            }
        }

        impl<O, D> std::ops::$Trait<KFormImpl<O, D>> for &KFormImpl<O, D> {
            type Output = KFormImpl<O, D>;

            fn $method(self, rhs: KFormImpl<O, D>) -> Self::Output {
                self.assert_compatible(&rhs);
                KFormImpl::from_values(&self.values $op rhs.values, self.calculus)
            }
        }

        impl<O, D> std::ops::$Trait for &KFormImpl<O, D> {
            type Output = KFormImpl<O, D>;

            fn $method(self, rhs: Self) -> Self::Output {
                self.assert_compatible(rhs);
                KFormImpl::from_values(&self.values $op &rhs.values, self.calculus)
            }
        }
    };
}

impl_binary_op!(Add, add, +);
impl_binary_op!(Sub, sub, -);

// AddAssign / SubAssign

impl<O, D> std::ops::AddAssign<&KFormImpl<O, D>> for KFormImpl<O, D> {
    fn add_assign(&mut self, rhs: &KFormImpl<O, D>) {
        self.assert_compatible(rhs);
        self.values += &rhs.values;
    }
}

impl<O, D> std::ops::AddAssign for KFormImpl<O, D> {
    fn add_assign(&mut self, rhs: Self) {
        *self += &rhs;
    }
}

impl<O, D> std::ops::SubAssign<&KFormImpl<O, D>> for KFormImpl<O, D> {
    fn sub_assign(&mut self, rhs: &KFormImpl<O, D>) {
        self.assert_compatible(rhs);
        self.values -= &rhs.values;
    }
}

impl<O, D> std::ops::SubAssign for KFormImpl<O, D> {
    fn sub_assign(&mut self, rhs: Self) {
        *self -= &rhs;
    }
}

// Neg

impl<O, D> std::ops::Neg for KFormImpl<O, D> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::from_values(-self.values, self.calculus)
    }
}

impl<O, D> std::ops::Neg for &KFormImpl<O, D> {
    type Output = KFormImpl<O, D>;

    fn neg(self) -> Self::Output {
        KFormImpl::from_values(-&self.values, self.calculus)
    }
}

// Mul (scalar)

impl<O, D> std::ops::Mul<KFormImpl<O, D>> for f64 {
    type Output = KFormImpl<O, D>;

    fn mul(self, rhs: KFormImpl<O, D>) -> Self::Output {
        KFormImpl::from_values(self * rhs.values, rhs.calculus)
    }
}

impl<O, D> std::ops::Mul<&KFormImpl<O, D>> for f64 {
    type Output = KFormImpl<O, D>;

    fn mul(self, rhs: &KFormImpl<O, D>) -> Self::Output {
        KFormImpl::from_values(self * &rhs.values, rhs.calculus)
    }
}
