use fixedbitset as fb;
use nalgebra as na;

use super::DiscreteExteriorCalculus;
use crate::{duality::DualityKind, error::DecError, kspace::Cell};

/// A subset of the cells carrying `ORDER`-forms of a calculus.
///
/// Can be used to restrict operators to parts of the complex with
/// [`LinearOperator::exclude_subset`][crate::LinearOperator::exclude_subset],
/// which is how boundary conditions are usually imposed.
///
/// The cells on the border of a complex can be obtained with
/// [`DiscreteExteriorCalculus::border`].
pub type Subset<const ORDER: usize, D> = SubsetImpl<na::Const<ORDER>, D>;

/// The subset type used internally,
/// with type generics enabling compile-time arithmetic for the order.
/// Prefer the type alias [`Subset`] in public APIs.
#[derive(Clone, Debug)]
pub struct SubsetImpl<Order, D> {
    /// A bitset containing the indices of the cells in the subset.
    ///
    /// Iterate over the indices with `indices.ones()`.
    pub indices: fb::FixedBitSet,
    _marker: std::marker::PhantomData<(Order, D)>,
}

impl<Order, D> PartialEq for SubsetImpl<Order, D> {
    fn eq(&self, other: &Self) -> bool {
        self.indices.eq(&other.indices)
    }
}
impl<Order, D> Eq for SubsetImpl<Order, D> {}

impl<Order, D> SubsetImpl<Order, D>
where
    Order: na::DimName,
    D: DualityKind,
{
    #[inline]
    pub(crate) fn new(indices: fb::FixedBitSet) -> Self {
        Self {
            indices,
            _marker: std::marker::PhantomData,
        }
    }

    /// Create a subset from an iterator of cell indices.
    pub fn from_indices(indices: impl Iterator<Item = usize>) -> Self {
        Self::new(fb::FixedBitSet::from_iter(indices))
    }

    /// Create a subset from registered cells.
    ///
    /// Fails with [`DecError::CellNotFound`] if a cell is not registered
    /// or does not carry `Order`-forms of this duality.
    pub fn from_cells<'a, const EMB: usize, const AMB: usize>(
        calculus: &DiscreteExteriorCalculus<EMB, AMB>,
        cells: impl IntoIterator<Item = &'a Cell<AMB>>,
    ) -> Result<Self, DecError>
    where
        na::Const<EMB>: na::DimNameSub<Order>,
    {
        let order = calculus.actual_order(Order::USIZE, D::DUALITY);
        let mut indices = fb::FixedBitSet::with_capacity(calculus.kform_length(Order::USIZE, D::DUALITY));
        for cell in cells {
            match calculus.property(cell) {
                Some(prop) if Some(cell.dim()) == order => indices.insert(prop.index),
                _ => {
                    return Err(DecError::CellNotFound {
                        kcoords: cell.kcoords.to_vec(),
                    })
                }
            }
        }
        Ok(Self::new(indices))
    }

    /// Create an empty subset.
    ///
    /// Handy as the starting point of a union of many subsets.
    pub fn new_empty() -> Self {
        Self::new(fb::FixedBitSet::new())
    }

    /// Create a subset containing every slot of `Order`-forms in the calculus.
    pub fn new_full<const EMB: usize, const AMB: usize>(
        calculus: &DiscreteExteriorCalculus<EMB, AMB>,
    ) -> Self
    where
        na::Const<EMB>: na::DimNameSub<Order>,
    {
        let mut indices =
            fb::FixedBitSet::with_capacity(calculus.kform_length(Order::USIZE, D::DUALITY));
        indices.set_range(.., true);
        Self::new(indices)
    }

    /// Take the complement of a subset, i.e. the cells not in that subset.
    pub fn complement<const EMB: usize, const AMB: usize>(
        &self,
        calculus: &DiscreteExteriorCalculus<EMB, AMB>,
    ) -> Self
    where
        na::Const<EMB>: na::DimNameSub<Order>,
    {
        let mut indices = Self::new_full(calculus).indices;
        indices.difference_with(&self.indices);
        Self::new(indices)
    }

    /// Cells that are in both subsets.
    #[inline]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut indices = self.indices.clone();
        indices.intersect_with(&other.indices);
        Self::new(indices)
    }

    /// Cells that are in either subset.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        let mut indices = self.indices.clone();
        indices.union_with(&other.indices);
        Self::new(indices)
    }

    /// Cells that are in `self` but not in `other`.
    #[inline]
    pub fn difference(&self, other: &Self) -> Self {
        let mut indices = self.indices.clone();
        indices.difference_with(&other.indices);
        Self::new(indices)
    }

    /// Whether the cell with the given index is in the subset.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(index)
    }

    /// Get the number of cells in this subset.
    #[inline]
    pub fn count(&self) -> usize {
        self.indices.count_ones(..)
    }
}
