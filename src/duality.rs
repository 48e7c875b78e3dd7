//! Primal and dual views of a cell complex.
//!
//! A primal `k`-cell and the dual `(n - k)`-cell sitting at the same place
//! share one slot of storage, see [`actual_order`].

use std::fmt;

/// Runtime tag for the two views of a complex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Duality {
    /// Cells as they are inserted into the calculus.
    Primal,
    /// Cells of the dual complex, one per primal cell.
    Dual,
}

impl Duality {
    /// Maps `Primal` to `Dual` and `Dual` to `Primal`.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Duality::Primal => Duality::Dual,
            Duality::Dual => Duality::Primal,
        }
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        match self {
            Duality::Primal => 0,
            Duality::Dual => 1,
        }
    }
}

impl fmt::Display for Duality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Duality::Primal => write!(f, "primal"),
            Duality::Dual => write!(f, "dual"),
        }
    }
}

/// The order of the primal cells storing the values of an `order`-form
/// of the given duality on an `embedded`-dimensional manifold.
///
/// Returns `None` if no such forms exist, i.e. `order > embedded`.
///
/// ```
/// # use khalimsky_dec::{actual_order, Duality};
/// assert_eq!(actual_order(1, Duality::Primal, 3), Some(1));
/// assert_eq!(actual_order(1, Duality::Dual, 3), Some(2));
/// assert_eq!(actual_order(4, Duality::Dual, 3), None);
/// ```
#[inline]
pub const fn actual_order(order: usize, duality: Duality, embedded: usize) -> Option<usize> {
    if order > embedded {
        return None;
    }
    match duality {
        Duality::Primal => Some(order),
        Duality::Dual => Some(embedded - order),
    }
}

/// Marker type indicating a [`KForm`][crate::KForm]
/// or [`operator`][crate::operator] lives on the primal complex.
#[derive(Clone, Copy, Debug)]
pub struct Primal;

/// Marker type indicating a [`KForm`][crate::KForm]
/// or [`operator`][crate::operator] lives on the dual complex.
#[derive(Clone, Copy, Debug)]
pub struct Dual;

/// Trait allowing types and calculus methods to be generic
/// on whether they operate on the primal ([`Primal`]) or dual ([`Dual`]) complex.
///
/// Not intended to be implemented by users.
pub trait DualityKind {
    /// Constant for runtime branching.
    const DUALITY: Duality;
    /// Maps Primal to Dual and Dual to Primal.
    type Opposite: DualityKind;
}

impl DualityKind for Primal {
    const DUALITY: Duality = Duality::Primal;
    type Opposite = Dual;
}

impl DualityKind for Dual {
    const DUALITY: Duality = Duality::Dual;
    type Opposite = Primal;
}
