//! The central structure of the crate:
//! a registry of oriented cells and the DEC operators built on top of it.

/// Construction from digital sets and collections of top cells.
mod construction;
pub use construction::Border;

mod subset;
pub use subset::{Subset, SubsetImpl};

//

use nalgebra as na;
use nalgebra_sparse as nas;

use itertools::{izip, Itertools};
use std::{
    cell::OnceCell,
    collections::{hash_map::Entry, HashMap},
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    duality::{actual_order, Duality, DualityKind},
    error::DecError,
    kform::{KForm, KFormImpl},
    kspace::{Cell, KhalimskySpace, SCell, Sign},
    operator::{diagonal_csr, DiagonalOperator, LinearOperator},
    vector_field::VectorField,
};

/// Process-unique identity of a [`DiscreteExteriorCalculus`].
///
/// Forms, vector fields and operators remember the calculus they were built from
/// so that objects of different calculi are never mixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CalculusId(u64);

impl CalculusId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Metadata stored for every registered cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Property {
    /// Ratio of the dual cell measure to the primal cell measure.
    /// Scales the hodge operators.
    pub size_ratio: f64,
    /// Position of the cell in forms of its order.
    pub index: usize,
    /// Whether the cell was registered with negative orientation.
    pub flipped: bool,
}

impl Property {
    /// Orientation the cell was registered with.
    #[inline]
    pub fn sign(&self) -> Sign {
        if self.flipped {
            Sign::Neg
        } else {
            Sign::Pos
        }
    }
}

/// Per-axis flat and sharp matrices of one duality.
#[derive(Debug)]
struct FlatSharp {
    flat: Vec<nas::CsrMatrix<f64>>,
    sharp: Vec<nas::CsrMatrix<f64>>,
}

/// A discrete exterior calculus on an `EMB`-dimensional cubical complex
/// living in an `AMB`-dimensional Khalimsky space.
///
/// Cells are registered with [`insert_scell`][Self::insert_scell]
/// (or all at once with [`from_digital_set`][Self::from_digital_set]
/// and [`from_n_scells`][Self::from_n_scells]),
/// after which operators between [`KForm`]s can be requested.
/// A primal `k`-form and a dual `(EMB - k)`-form are indexed by the same cells.
///
/// The registry does not check that the boundary of every inserted cell
/// is registered too. Operators on a complex violating this are well defined
/// but do not satisfy the usual identities.
///
/// The flat and sharp matrices are cached on first use,
/// which makes this type `!Sync`.
/// Every mutation of the registry clears the cache.
/// `Clone` duplicates the registry under a fresh [`CalculusId`].
#[derive(Debug)]
pub struct DiscreteExteriorCalculus<const EMB: usize, const AMB: usize> {
    kspace: KhalimskySpace<AMB>,
    id: CalculusId,
    properties: HashMap<Cell<AMB>, Property>,
    /// Registered cells of each dimension in index order.
    /// Erased cells leave a `None` behind so that live indices stay put.
    indexed_cells: Vec<Vec<Option<Cell<AMB>>>>,
    /// Primal and dual flat/sharp matrices, built lazily.
    flat_sharp: [OnceCell<FlatSharp>; 2],
}

impl<const EMB: usize, const AMB: usize> Clone for DiscreteExteriorCalculus<EMB, AMB> {
    fn clone(&self) -> Self {
        Self {
            kspace: self.kspace,
            id: CalculusId::next(),
            properties: self.properties.clone(),
            indexed_cells: self.indexed_cells.clone(),
            flat_sharp: [OnceCell::new(), OnceCell::new()],
        }
    }
}

impl<const EMB: usize, const AMB: usize> DiscreteExteriorCalculus<EMB, AMB> {
    /// Create an empty calculus.
    ///
    /// Fails if the manifold dimension exceeds the ambient dimension.
    pub fn new() -> Result<Self, DecError> {
        if EMB > AMB {
            return Err(DecError::InvalidSpace {
                embedded: EMB,
                ambient: AMB,
            });
        }
        Ok(Self::empty())
    }

    /// Unchecked constructor for cases where `EMB <= AMB` is known.
    pub(crate) fn empty() -> Self {
        Self {
            kspace: KhalimskySpace::new(),
            id: CalculusId::next(),
            properties: HashMap::new(),
            indexed_cells: vec![Vec::new(); EMB + 1],
            flat_sharp: [OnceCell::new(), OnceCell::new()],
        }
    }

    /// Identity of this calculus.
    #[inline]
    pub fn id(&self) -> CalculusId {
        self.id
    }

    /// The ambient Khalimsky space.
    #[inline]
    pub fn kspace(&self) -> &KhalimskySpace<AMB> {
        &self.kspace
    }

    //
    // registry
    //

    /// Register a signed cell with a size ratio of 1.
    ///
    /// See [`insert_scell_with_ratio`][Self::insert_scell_with_ratio].
    #[inline]
    pub fn insert_scell(&mut self, cell: SCell<AMB>) -> Result<bool, DecError> {
        self.insert_scell_with_ratio(cell, 1.0)
    }

    /// Register a signed cell.
    ///
    /// Returns `true` if the cell was not registered before.
    /// Inserting an already registered cell, with either orientation,
    /// only updates its size ratio and orientation; its index is kept.
    ///
    /// Fails if the cell has a higher dimension than the manifold.
    pub fn insert_scell_with_ratio(
        &mut self,
        cell: SCell<AMB>,
        size_ratio: f64,
    ) -> Result<bool, DecError> {
        let dim = cell.dim();
        if dim > EMB {
            return Err(DecError::InvalidCellOrder {
                dim,
                embedded: EMB,
            });
        }
        Ok(self.insert_unchecked(cell, size_ratio))
    }

    /// Insertion for cells whose dimension is known to be at most `EMB`.
    pub(crate) fn insert_unchecked(&mut self, cell: SCell<AMB>, size_ratio: f64) -> bool {
        self.invalidate_cached_operators();
        let flipped = cell.sign == Sign::Neg;
        match self.properties.entry(cell.cell) {
            Entry::Occupied(mut entry) => {
                let prop = entry.get_mut();
                prop.size_ratio = size_ratio;
                prop.flipped = flipped;
                log::trace!("updated {cell:?} (size ratio {size_ratio})");
                false
            }
            Entry::Vacant(entry) => {
                let bucket = &mut self.indexed_cells[cell.dim()];
                entry.insert(Property {
                    size_ratio,
                    index: bucket.len(),
                    flipped,
                });
                bucket.push(Some(cell.cell));
                log::trace!("inserted {cell:?} (size ratio {size_ratio})");
                true
            }
        }
    }

    /// Remove a cell from the registry. Returns whether it was registered.
    ///
    /// The indices of the remaining cells don't change;
    /// the slot of the erased cell stays in forms and operators
    /// as an unused entry until [`compact`][Self::compact] is called.
    pub fn erase_cell(&mut self, cell: &Cell<AMB>) -> bool {
        let Some(prop) = self.properties.remove(cell) else {
            return false;
        };
        if let Some(slot) = self
            .indexed_cells
            .get_mut(cell.dim())
            .and_then(|bucket| bucket.get_mut(prop.index))
        {
            *slot = None;
        }
        self.invalidate_cached_operators();
        log::trace!("erased {cell:?}");
        true
    }

    /// Remove the slots left behind by erased cells, renumbering the live cells.
    ///
    /// Forms and operators built before compaction
    /// no longer match the calculus and will be rejected when combined with new ones.
    pub fn compact(&mut self) {
        for bucket in &mut self.indexed_cells {
            bucket.retain(Option::is_some);
            for (index, cell) in bucket.iter().enumerate() {
                if let Some(prop) = cell.as_ref().and_then(|c| self.properties.get_mut(c)) {
                    prop.index = index;
                }
            }
        }
        self.invalidate_cached_operators();
    }

    fn invalidate_cached_operators(&mut self) {
        for cache in &mut self.flat_sharp {
            cache.take();
        }
    }

    /// Metadata of a registered cell.
    #[inline]
    pub fn property(&self, cell: &Cell<AMB>) -> Option<&Property> {
        self.properties.get(cell)
    }

    /// Iterate over all registered cells and their metadata, in no particular order.
    pub fn properties(&self) -> impl '_ + Iterator<Item = (&Cell<AMB>, &Property)> {
        self.properties.iter()
    }

    /// Index of a registered cell in forms of its order.
    pub fn cell_index(&self, cell: &Cell<AMB>) -> Result<usize, DecError> {
        self.property(cell)
            .map(|prop| prop.index)
            .ok_or_else(|| not_found(cell))
    }

    /// Whether a registered cell has negative orientation.
    pub fn is_cell_flipped(&self, cell: &Cell<AMB>) -> Result<bool, DecError> {
        self.property(cell)
            .map(|prop| prop.flipped)
            .ok_or_else(|| not_found(cell))
    }

    /// The order of the primal cells storing `order`-forms of the given duality,
    /// or `None` if `order > EMB`.
    #[inline]
    pub fn actual_order(&self, order: usize, duality: Duality) -> Option<usize> {
        actual_order(order, duality, EMB)
    }

    /// Length of `order`-forms of the given duality,
    /// including slots of erased cells.
    pub fn kform_length(&self, order: usize, duality: Duality) -> usize {
        self.bucket(order, duality).len()
    }

    /// Number of live cells carrying `order`-forms of the given duality.
    pub fn cell_count(&self, order: usize, duality: Duality) -> usize {
        self.bucket(order, duality).iter().flatten().count()
    }

    /// The cell stored at `index` in `order`-forms of the given duality.
    ///
    /// Primal cells are returned with their registered orientation,
    /// dual ones with positive orientation;
    /// their sign is accounted for by [`hodge_sign`][Self::hodge_sign].
    pub fn scell(&self, order: usize, duality: Duality, index: usize) -> Result<SCell<AMB>, DecError> {
        self.bucket(order, duality)
            .get(index)
            .copied()
            .flatten()
            .map(|cell| self.oriented(&cell, duality))
            .ok_or(DecError::IndexNotFound {
                order,
                duality,
                index,
            })
    }

    /// Iterate over the live cells of `order`-forms of the given duality
    /// together with their indices, oriented as in [`scell`][Self::scell].
    pub fn cells(
        &self,
        order: usize,
        duality: Duality,
    ) -> impl '_ + Iterator<Item = (usize, SCell<AMB>)> {
        self.bucket(order, duality)
            .iter()
            .enumerate()
            .filter_map(move |(index, cell)| Some((index, self.oriented(cell.as_ref()?, duality))))
    }

    /// Check that the registry is a bijection between live cells and indices.
    pub fn is_valid(&self) -> bool {
        let live_count = self.indexed_cells.iter().flatten().flatten().count();
        live_count == self.properties.len()
            && self.indexed_cells.iter().enumerate().all(|(dim, bucket)| {
                bucket.iter().enumerate().all(|(index, cell)| match cell {
                    None => true,
                    Some(cell) => {
                        cell.dim() == dim
                            && self.properties.get(cell).is_some_and(|p| p.index == index)
                    }
                })
            })
    }

    /// Sign relating a signed cell to the hodge operators.
    ///
    /// Applying the hodge twice to a `k`-cell gives `(-1)^(k * (EMB - k))`,
    /// so when that is negative one of the two hodges has to carry the minus.
    /// Number the axes of the `EMB`-cell containing `cell` as manifold axes,
    /// ambient axis `i < EMB` being manifold axis `i`
    /// and the other ambient axes taking the remaining numbers in order.
    /// The primal side carries the minus when the directions of `cell`
    /// followed by the remaining directions form an odd permutation of these,
    /// the dual side otherwise.
    /// E.g. in the plane a vertical edge has a primal sign of `-1`
    /// and a horizontal one a dual sign of `-1`.
    ///
    /// The result is further negated if `cell` does not have its registered orientation
    /// (unregistered cells count as registered positively).
    pub fn hodge_sign(&self, cell: &SCell<AMB>, duality: Duality) -> f64 {
        let registered = self
            .property(&cell.cell)
            .map_or(Sign::Pos, Property::sign);
        let sign = (cell.sign * registered).as_f64() * self.direction_sign(&cell.cell);
        let k = cell.dim();
        match duality {
            Duality::Dual if k <= EMB && (k * (EMB - k)) % 2 == 1 => -sign,
            _ => sign,
        }
    }

    /// The ambient axis along which a primal or dual 1-cell runs.
    ///
    /// For the primal duality `cell` must be a 1-cell;
    /// for the dual duality it must be an `(EMB - 1)`-cell,
    /// whose dual runs across it towards its registered `EMB`-dimensional neighbours.
    /// Where the complex folds, the two halves of such a dual edge run along different axes;
    /// the axis towards the first registered neighbour is returned
    /// and [`flat`][Self::flat] and [`sharp`][Self::sharp] treat each half on its own axis.
    /// Returns `None` for cells of any other dimension.
    pub fn edge_direction(&self, cell: &Cell<AMB>, duality: Duality) -> Option<usize> {
        match duality {
            Duality::Primal => {
                if cell.dim() != 1 {
                    return None;
                }
                cell.dirs().next()
            }
            Duality::Dual => {
                if EMB == 0 || cell.dim() + 1 != EMB {
                    return None;
                }
                self.top_neighbours(cell)
                    .first()
                    .map(|&(_, axis, _)| axis)
                    .or_else(|| cell.orth_dirs().next())
            }
        }
    }

    /// Get the set of cells of `ORDER`-forms on the border of the complex.
    ///
    /// These are the `(EMB - 1)`-cells with fewer than two registered `EMB`-cells around them
    /// and the registered faces of those. `EMB`-cells are never on the border.
    pub fn border<const ORDER: usize, D>(&self) -> Subset<ORDER, D>
    where
        na::Const<EMB>: na::DimNameSub<na::Const<ORDER>>,
        D: DualityKind,
    {
        let Some(primal_order) = self.actual_order(ORDER, D::DUALITY) else {
            return Subset::<ORDER, D>::new_empty();
        };
        Subset::<ORDER, D>::from_indices(
            self.border_facets()
                .flat_map(|facet| self.kspace.closure(&facet))
                .filter(|cell| cell.dim() == primal_order)
                .filter_map(|cell| self.property(&cell).map(|prop| prop.index)),
        )
    }

    fn border_facets(&self) -> impl '_ + Iterator<Item = Cell<AMB>> {
        EMB.checked_sub(1)
            .and_then(|dim| self.indexed_cells.get(dim))
            .into_iter()
            .flatten()
            .flatten()
            .copied()
            .filter(|facet| self.top_cell_count(facet) < 2)
    }

    //
    // forms
    //

    /// Create a new form with a value of zero for each cell.
    pub fn new_zero_kform<const ORDER: usize, D>(&self) -> KForm<ORDER, D>
    where
        na::Const<EMB>: na::DimNameSub<na::Const<ORDER>>,
        D: DualityKind,
    {
        KForm::zeros(self.kform_length(ORDER, D::DUALITY), self.id)
    }

    /// Create a form from a vector of values, failing if the length is wrong.
    pub fn kform_from_values<const ORDER: usize, D>(
        &self,
        values: na::DVector<f64>,
    ) -> Result<KForm<ORDER, D>, DecError>
    where
        na::Const<EMB>: na::DimNameSub<na::Const<ORDER>>,
        D: DualityKind,
    {
        let expected = self.kform_length(ORDER, D::DUALITY);
        if values.len() != expected {
            return Err(DecError::IncompatibleOperator(format!(
                "{} {ORDER}-forms have length {expected}, got {} values",
                D::DUALITY,
                values.len()
            )));
        }
        Ok(KForm::from_values(values, self.id))
    }

    /// Create a form with values supplied by a function of each cell.
    ///
    /// Cells are passed oriented as in [`scell`][Self::scell].
    /// Slots of erased cells are left at zero.
    pub fn kform_from_cells<const ORDER: usize, D>(
        &self,
        mut value: impl FnMut(SCell<AMB>) -> f64,
    ) -> KForm<ORDER, D>
    where
        na::Const<EMB>: na::DimNameSub<na::Const<ORDER>>,
        D: DualityKind,
    {
        let mut form = self.new_zero_kform::<ORDER, D>();
        for (index, cell) in self.cells(ORDER, D::DUALITY) {
            form.values[index] = value(cell);
        }
        form
    }

    /// Create a vector field of zero vectors.
    pub fn new_zero_vector_field<D: DualityKind>(&self) -> VectorField<D> {
        VectorField::from_coordinates(
            na::DMatrix::zeros(self.kform_length(0, D::DUALITY), AMB),
            self.id,
        )
    }

    /// Create a vector field from a matrix with one row per 0-cell
    /// and one column per ambient axis.
    pub fn vector_field_from_coordinates<D: DualityKind>(
        &self,
        coordinates: na::DMatrix<f64>,
    ) -> Result<VectorField<D>, DecError> {
        let rows = self.kform_length(0, D::DUALITY);
        if coordinates.nrows() != rows || coordinates.ncols() != AMB {
            return Err(DecError::IncompatibleOperator(format!(
                "expected {rows}x{AMB} coordinates, got {}x{}",
                coordinates.nrows(),
                coordinates.ncols()
            )));
        }
        Ok(VectorField::from_coordinates(coordinates, self.id))
    }

    //
    // operators
    //

    /// Construct the identity operator on `ORDER`-forms.
    pub fn identity<const ORDER: usize, D>(&self) -> LinearOperator<KForm<ORDER, D>, KForm<ORDER, D>>
    where
        na::Const<EMB>: na::DimNameSub<na::Const<ORDER>>,
        D: DualityKind,
    {
        LinearOperator::new(
            nas::CsrMatrix::identity(self.kform_length(ORDER, D::DUALITY)),
            self.id,
        )
    }

    /// Construct an exterior derivative operator.
    pub fn derivative<const ORDER: usize, D>(
        &self,
    ) -> LinearOperator<KForm<ORDER, D>, KFormImpl<na::DimNameSum<na::Const<ORDER>, na::U1>, D>>
    where
        na::Const<ORDER>: na::DimNameAdd<na::U1>,
        na::Const<EMB>: na::DimNameSub<na::DimNameSum<na::Const<ORDER>, na::U1>>,
        D: DualityKind,
    {
        LinearOperator::new(self.derivative_matrix(ORDER, D::DUALITY), self.id)
    }

    /// Construct the operator mapping `ORDER`-forms to `(ORDER - 1)`-forms
    /// through the opposite complex:
    /// `(-1)^(EMB * (ORDER - 1)) * hodge * derivative * hodge`.
    ///
    /// Fails if a hodge operator on the way is singular.
    pub fn antiderivative<const ORDER: usize, D>(
        &self,
    ) -> Result<
        LinearOperator<KForm<ORDER, D>, KFormImpl<na::DimNameDiff<na::Const<ORDER>, na::U1>, D>>,
        DecError,
    >
    where
        na::Const<ORDER>: na::DimNameSub<na::U1>,
        na::Const<EMB>: na::DimNameSub<na::Const<ORDER>>,
        D: DualityKind,
    {
        Ok(LinearOperator::new(
            self.antiderivative_matrix(ORDER, D::DUALITY)?,
            self.id,
        ))
    }

    /// Construct a hodge operator,
    /// mapping `ORDER`-forms to `(EMB - ORDER)`-forms of the opposite duality.
    ///
    /// Primal to dual hodges scale by the size ratio of each cell
    /// and dual to primal ones divide by it,
    /// failing with [`DecError::SingularHodge`] if a ratio is zero.
    pub fn hodge<const ORDER: usize, D>(
        &self,
    ) -> Result<
        DiagonalOperator<
            KForm<ORDER, D>,
            KFormImpl<na::DimNameDiff<na::Const<EMB>, na::Const<ORDER>>, D::Opposite>,
        >,
        DecError,
    >
    where
        na::Const<EMB>: na::DimNameSub<na::Const<ORDER>>,
        D: DualityKind,
    {
        Ok(DiagonalOperator::new(
            self.hodge_diagonal(ORDER, D::DUALITY)?,
            self.id,
        ))
    }

    /// Construct the Laplace operator on 0-forms,
    /// `antiderivative<1> * derivative<0>`.
    ///
    /// The result is negative semidefinite and annihilates constant forms.
    pub fn laplace<D>(&self) -> Result<LinearOperator<KForm<0, D>, KForm<0, D>>, DecError>
    where
        na::Const<EMB>: na::DimNameSub<na::U1>,
        D: DualityKind,
    {
        let antiderivative = self.antiderivative_matrix(1, D::DUALITY)?;
        let derivative = self.derivative_matrix(0, D::DUALITY);
        Ok(LinearOperator::new(&antiderivative * &derivative, self.id))
    }

    /// Convert a vector field into a 1-form by projecting the vectors
    /// at the endpoints of each 1-cell onto its direction.
    pub fn flat<D>(&self, field: &VectorField<D>) -> Result<KForm<1, D>, DecError>
    where
        na::Const<EMB>: na::DimNameSub<na::U1>,
        D: DualityKind,
    {
        if field.calculus_id() != self.id || field.len() != self.kform_length(0, D::DUALITY) {
            return Err(DecError::IncompatibleOperator(format!(
                "vector field of {:?} with {} vectors does not match {:?}",
                field.calculus_id(),
                field.len(),
                self.id
            )));
        }
        let mut values = na::DVector::zeros(self.kform_length(1, D::DUALITY));
        for (dir, mat) in self.flat_sharp(D::DUALITY).flat.iter().enumerate() {
            let coordinate = field.coordinates.column(dir).into_owned();
            values += mat * &coordinate;
        }
        Ok(KForm::from_values(values, self.id))
    }

    /// The part of [`flat`][Self::flat] acting on the coordinate along `dir`.
    ///
    /// Panics if `dir` is not an axis of the ambient space.
    pub fn flat_directional<D>(&self, dir: usize) -> LinearOperator<KForm<0, D>, KForm<1, D>>
    where
        na::Const<EMB>: na::DimNameSub<na::U1>,
        D: DualityKind,
    {
        assert!(dir < AMB, "axis {dir} does not exist in a {AMB}-dimensional space");
        LinearOperator::new(self.flat_sharp(D::DUALITY).flat[dir].clone(), self.id)
    }

    /// Reconstruct a vector field from a 1-form by averaging
    /// the 1-cells incident to each 0-cell along each axis.
    pub fn sharp<D>(&self, form: &KForm<1, D>) -> Result<VectorField<D>, DecError>
    where
        na::Const<EMB>: na::DimNameSub<na::U1>,
        D: DualityKind,
    {
        if form.calculus_id() != self.id || form.len() != self.kform_length(1, D::DUALITY) {
            return Err(DecError::IncompatibleOperator(format!(
                "1-form of {:?} with {} values does not match {:?}",
                form.calculus_id(),
                form.len(),
                self.id
            )));
        }
        let mut coordinates = na::DMatrix::zeros(self.kform_length(0, D::DUALITY), AMB);
        for (dir, mat) in self.flat_sharp(D::DUALITY).sharp.iter().enumerate() {
            coordinates.set_column(dir, &(mat * &form.values));
        }
        Ok(VectorField::from_coordinates(coordinates, self.id))
    }

    /// The part of [`sharp`][Self::sharp] producing the coordinate along `dir`.
    ///
    /// Panics if `dir` is not an axis of the ambient space.
    pub fn sharp_directional<D>(&self, dir: usize) -> LinearOperator<KForm<1, D>, KForm<0, D>>
    where
        na::Const<EMB>: na::DimNameSub<na::U1>,
        D: DualityKind,
    {
        assert!(dir < AMB, "axis {dir} does not exist in a {AMB}-dimensional space");
        LinearOperator::new(self.flat_sharp(D::DUALITY).sharp[dir].clone(), self.id)
    }

    //
    // untyped internals
    //

    fn bucket(&self, order: usize, duality: Duality) -> &[Option<Cell<AMB>>] {
        self.actual_order(order, duality)
            .and_then(|primal_order| self.indexed_cells.get(primal_order))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn registered_scell(&self, cell: &Cell<AMB>) -> SCell<AMB> {
        cell.signed(self.property(cell).map_or(Sign::Pos, Property::sign))
    }

    fn oriented(&self, cell: &Cell<AMB>, duality: Duality) -> SCell<AMB> {
        match duality {
            Duality::Primal => self.registered_scell(cell),
            Duality::Dual => cell.signed(Sign::Pos),
        }
    }

    /// Number of registered `EMB`-cells having `cell` in their closure.
    pub(crate) fn top_cell_count(&self, cell: &Cell<AMB>) -> usize {
        self.kspace
            .cofaces(cell, EMB)
            .iter()
            .filter(|coface| self.properties.contains_key(coface))
            .count()
    }

    /// Registered cells one dimension up from `cell`,
    /// as (index, axis, side) with `side` telling whether the neighbour
    /// lies towards `+axis` or `-axis`.
    fn top_neighbours(&self, cell: &Cell<AMB>) -> Vec<(usize, usize, i32)> {
        self.kspace
            .upper_incident(&cell.signed(Sign::Pos))
            .into_iter()
            .filter_map(|coface| {
                let prop = self.properties.get(&coface.cell)?;
                let axis = (0..AMB).find(|&axis| coface.cell.kcoords[axis] != cell.kcoords[axis])?;
                Some((prop.index, axis, coface.cell.kcoords[axis] - cell.kcoords[axis]))
            })
            .collect()
    }

    /// Registered endpoints of a primal or dual edge stored at `cell`,
    /// as (index, axis, side) like [`top_neighbours`][Self::top_neighbours].
    fn edge_endpoints(&self, cell: &Cell<AMB>, duality: Duality) -> Vec<(usize, usize, i32)> {
        match duality {
            Duality::Primal => {
                let Some(axis) = cell.dirs().next() else {
                    return Vec::new();
                };
                [1, -1]
                    .into_iter()
                    .filter_map(|side| {
                        let prop = self.properties.get(&cell.shifted(axis, side))?;
                        Some((prop.index, axis, side))
                    })
                    .collect()
            }
            Duality::Dual => self.top_neighbours(cell),
        }
    }

    /// The part of the hodge sign coming from the directions of a cell,
    /// see [`hodge_sign`][Self::hodge_sign].
    fn direction_sign(&self, cell: &Cell<AMB>) -> f64 {
        let k = cell.dim();
        if k > EMB || (k * (EMB - k)) % 2 == 0 {
            return 1.0;
        }
        let frame: Vec<usize> = self
            .kspace
            .cofaces(cell, EMB)
            .into_iter()
            .find(|top| self.properties.contains_key(top))
            .map(|top| top.dirs().collect())
            .unwrap_or_else(|| {
                cell.dirs()
                    .chain(cell.orth_dirs().take(EMB - k))
                    .sorted()
                    .collect()
            });

        // ambient axes below EMB keep their number, the others fill the gaps
        let mut free = (0..EMB).filter(|slot| !frame.contains(slot));
        let slots: Vec<(usize, usize)> = frame
            .iter()
            .map(|&axis| {
                let slot = if axis < EMB { Some(axis) } else { free.next() };
                (axis, slot.unwrap_or(axis))
            })
            .collect();
        let ordered: Vec<usize> = slots
            .iter()
            .filter(|(axis, _)| cell.is_open(*axis))
            .chain(slots.iter().filter(|(axis, _)| !cell.is_open(*axis)))
            .map(|&(_, slot)| slot)
            .collect();
        let inversions = ordered
            .iter()
            .tuple_combinations()
            .filter(|(a, b)| a > b)
            .count();
        if inversions % 2 == 1 {
            -1.0
        } else {
            1.0
        }
    }

    /// Direction signs of the cells in a bucket, 1 for erased slots.
    fn direction_signs(&self, dim: usize) -> Vec<f64> {
        self.indexed_cells
            .get(dim)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|cell| cell.as_ref().map_or(1.0, |cell| self.direction_sign(cell)))
            .collect()
    }

    fn primal_derivative_matrix(&self, order: usize) -> nas::CsrMatrix<f64> {
        let sources = self.bucket(order, Duality::Primal);
        let targets = self.bucket(order + 1, Duality::Primal);
        let mut coo = nas::CooMatrix::new(targets.len(), sources.len());
        for (row, cell) in targets.iter().enumerate() {
            let Some(cell) = cell else { continue };
            for face in self.kspace.lower_incident(&self.registered_scell(cell)) {
                if let Some(prop) = self.properties.get(&face.cell) {
                    coo.push(row, prop.index, (face.sign * prop.sign()).as_f64());
                }
            }
        }
        nas::CsrMatrix::from(&coo)
    }

    pub(crate) fn derivative_matrix(&self, order: usize, duality: Duality) -> nas::CsrMatrix<f64> {
        match duality {
            Duality::Primal => self.primal_derivative_matrix(order),
            Duality::Dual => {
                let Some(primal_order) = EMB.checked_sub(order + 1) else {
                    return nas::CsrMatrix::zeros(
                        self.kform_length(order + 1, duality),
                        self.kform_length(order, duality),
                    );
                };
                // the dual derivative is the primal one transposed,
                // with signs making it consistent with the hodges
                let mut mat = self.primal_derivative_matrix(primal_order).transpose();
                let global = if (EMB - order) % 2 == 1 { -1.0 } else { 1.0 };
                let row_signs = self.direction_signs(primal_order);
                let col_signs = self.direction_signs(primal_order + 1);
                for (row, col, value) in mat.triplet_iter_mut() {
                    *value *= global * row_signs[row] * col_signs[col];
                }
                mat
            }
        }
    }

    pub(crate) fn hodge_diagonal(
        &self,
        order: usize,
        duality: Duality,
    ) -> Result<na::DVector<f64>, DecError> {
        let cells = self.bucket(order, duality);
        let mut diagonal = na::DVector::zeros(cells.len());
        for (entry, cell) in izip!(diagonal.iter_mut(), cells) {
            let Some((cell, prop)) = cell
                .as_ref()
                .and_then(|cell| Some((cell, self.properties.get(cell)?)))
            else {
                continue;
            };
            let sign = self.hodge_sign(&cell.signed(prop.sign()), duality);
            *entry = match duality {
                Duality::Primal => sign * prop.size_ratio,
                Duality::Dual if prop.size_ratio == 0.0 => {
                    return Err(DecError::SingularHodge {
                        kcoords: cell.kcoords.to_vec(),
                    })
                }
                Duality::Dual => sign / prop.size_ratio,
            };
        }
        Ok(diagonal)
    }

    /// Valid for `1 <= order <= EMB`.
    pub(crate) fn antiderivative_matrix(
        &self,
        order: usize,
        duality: Duality,
    ) -> Result<nas::CsrMatrix<f64>, DecError> {
        debug_assert!((1..=EMB).contains(&order));
        let opposite = duality.opposite();
        let first = diagonal_csr(&self.hodge_diagonal(order, duality)?);
        let derivative = self.derivative_matrix(EMB - order, opposite);
        let second = diagonal_csr(&self.hodge_diagonal(EMB + 1 - order, opposite)?);
        let mut mat = &second * &(&derivative * &first);
        if (EMB * (order - 1)) % 2 == 1 {
            mat *= -1.0;
        }
        Ok(mat)
    }

    fn flat_sharp(&self, duality: Duality) -> &FlatSharp {
        self.flat_sharp[duality.slot()].get_or_init(|| self.build_flat_sharp(duality))
    }

    fn build_flat_sharp(&self, duality: Duality) -> FlatSharp {
        log::debug!(
            "building {duality} flat and sharp operators of {:?}",
            self.id
        );
        let edges = self.bucket(1, duality);
        let vertex_count = self.kform_length(0, duality);
        let d0 = self.derivative_matrix(0, duality);

        let mut flat: Vec<nas::CooMatrix<f64>> = (0..AMB)
            .map(|_| nas::CooMatrix::new(edges.len(), vertex_count))
            .collect();
        // (vertex, edge, sign) per axis, averaged once every edge has been seen
        let mut sharp_entries: Vec<Vec<(usize, usize, f64)>> = vec![Vec::new(); AMB];

        for (edge_idx, edge) in edges.iter().enumerate() {
            let Some(edge) = edge else { continue };
            // each half of the edge runs along its own axis;
            // the sign tells whether it points towards +axis
            let endpoints: Vec<(usize, usize, f64)> = self
                .edge_endpoints(edge, duality)
                .into_iter()
                .filter_map(|(vertex_idx, axis, side)| {
                    let incidence = d0.get_entry(edge_idx, vertex_idx)?.into_value();
                    (incidence != 0.0).then(|| (vertex_idx, axis, incidence * f64::from(side)))
                })
                .collect();
            for &(vertex_idx, axis, sign) in &endpoints {
                flat[axis].push(edge_idx, vertex_idx, sign / endpoints.len() as f64);
                sharp_entries[axis].push((vertex_idx, edge_idx, sign));
            }
        }

        let sharp = sharp_entries
            .iter()
            .map(|entries| {
                let mut incident_counts = vec![0usize; vertex_count];
                for &(vertex_idx, _, _) in entries {
                    incident_counts[vertex_idx] += 1;
                }
                let mut coo = nas::CooMatrix::new(vertex_count, edges.len());
                for &(vertex_idx, edge_idx, sign) in entries {
                    coo.push(
                        vertex_idx,
                        edge_idx,
                        sign / incident_counts[vertex_idx] as f64,
                    );
                }
                nas::CsrMatrix::from(&coo)
            })
            .collect();

        FlatSharp {
            flat: flat.iter().map(nas::CsrMatrix::from).collect(),
            sharp,
        }
    }
}

fn not_found<const AMB: usize>(cell: &Cell<AMB>) -> DecError {
    DecError::CellNotFound {
        kcoords: cell.kcoords.to_vec(),
    }
}

impl<const EMB: usize, const AMB: usize> fmt::Display for DiscreteExteriorCalculus<EMB, AMB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[DiscreteExteriorCalculus dim_embedded={} dim_ambient={} cells_count={}",
            EMB,
            AMB,
            self.properties.len()
        )?;
        for order in 0..=EMB {
            write!(
                f,
                " {order}-cells={}",
                self.cell_count(order, Duality::Primal)
            )?;
        }
        write!(f, "]")
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{operator::Operator, Dual, Primal};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    /// Points of a `size^N` box, each kept with probability 1/4.
    fn random_set<const N: usize>(seed: u64, size: i32) -> Vec<[i32; N]> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::new();
        for code in 0..size.pow(N as u32) {
            let mut rest = code;
            let mut point = [0; N];
            for coord in point.iter_mut() {
                *coord = rest % size;
                rest /= size;
            }
            if rng.gen_ratio(1, 4) {
                points.push(point);
            }
        }
        points
    }

    fn unit_square() -> DiscreteExteriorCalculus<2, 2> {
        DiscreteExteriorCalculus::from_digital_set([[0, 0]], Border::Unit)
    }

    #[test]
    fn embedded_dimension_is_checked() {
        assert_eq!(
            DiscreteExteriorCalculus::<3, 2>::new().err(),
            Some(DecError::InvalidSpace {
                embedded: 3,
                ambient: 2
            })
        );
        assert!(DiscreteExteriorCalculus::<2, 3>::new().is_ok());

        let mut surface = DiscreteExteriorCalculus::<2, 3>::new().unwrap();
        let cube = surface.kspace().s_spel([0, 0, 0], Sign::Pos);
        assert_eq!(
            surface.insert_scell(cube),
            Err(DecError::InvalidCellOrder {
                dim: 3,
                embedded: 2
            })
        );
    }

    #[test]
    fn single_point() {
        let mut calculus = DiscreteExteriorCalculus::<2, 2>::new().unwrap();
        let point = calculus.kspace().s_cell([0, 0], Sign::Pos);
        assert_eq!(calculus.insert_scell(point), Ok(true));

        assert_eq!(calculus.kform_length(0, Duality::Primal), 1);
        assert_eq!(calculus.kform_length(2, Duality::Dual), 1);
        assert_eq!(calculus.kform_length(1, Duality::Primal), 0);
        assert_eq!(
            calculus.identity::<0, Primal>().to_dense(),
            na::DMatrix::from_element(1, 1, 1.0)
        );

        let ones = calculus.kform_from_cells::<0, Primal>(|_| 1.0);
        let star = calculus.hodge::<0, Primal>().unwrap();
        let dual = star.apply(&ones);
        assert_eq!(dual.values.as_slice(), &[1.0]);

        // operators on orders without cells are empty rather than errors
        let d0 = calculus.derivative::<0, Primal>();
        assert_eq!((d0.nrows(), d0.ncols()), (0, 1));
        assert_eq!(d0.apply(&ones).len(), 0);
    }

    #[test]
    fn reinsertion_keeps_index() {
        let mut calculus = DiscreteExteriorCalculus::<2, 2>::new().unwrap();
        let ks = *calculus.kspace();
        for x in 0..4 {
            calculus.insert_scell(ks.s_cell([x, 0], Sign::Pos)).unwrap();
        }
        let edge = ks.s_cell([1, 0], Sign::Pos);
        let index = calculus.cell_index(&edge.cell).unwrap();
        let length = calculus.kform_length(1, Duality::Primal);

        assert_eq!(
            calculus.insert_scell_with_ratio(edge.opposite(), 0.5),
            Ok(false)
        );
        assert_eq!(calculus.kform_length(1, Duality::Primal), length);
        assert_eq!(
            calculus.property(&edge.cell),
            Some(&Property {
                size_ratio: 0.5,
                index,
                flipped: true
            })
        );
        assert_eq!(calculus.is_cell_flipped(&edge.cell), Ok(true));
        assert_eq!(
            calculus.scell(1, Duality::Primal, index),
            Ok(edge.opposite())
        );
        // on the dual side the orientation is carried by the hodge sign instead
        assert_eq!(calculus.scell(1, Duality::Dual, index), Ok(edge));
        assert!(calculus.is_valid());

        let missing = ks.u_cell([9, 0]);
        assert_eq!(
            calculus.cell_index(&missing),
            Err(DecError::CellNotFound {
                kcoords: vec![9, 0]
            })
        );
        assert!(calculus.is_cell_flipped(&missing).is_err());
        assert!(matches!(
            calculus.scell(0, Duality::Primal, 2),
            Err(DecError::IndexNotFound { index: 2, .. })
        ));
        assert!(calculus.scell(3, Duality::Primal, 0).is_err());
    }

    #[test]
    fn erase_leaves_stable_indices() {
        let mut calculus = DiscreteExteriorCalculus::<1, 1>::new().unwrap();
        let ks = *calculus.kspace();
        for k in 0..5 {
            calculus.insert_scell(ks.s_cell([2 * k], Sign::Pos)).unwrap();
        }
        let third = ks.u_cell([4]);
        let fifth = ks.u_cell([8]);
        assert_eq!(calculus.cell_index(&fifth), Ok(4));

        assert!(calculus.erase_cell(&third));
        assert!(!calculus.erase_cell(&third));
        assert!(calculus.is_valid());
        assert_eq!(calculus.kform_length(0, Duality::Primal), 5);
        assert_eq!(calculus.cell_count(0, Duality::Primal), 4);
        assert_eq!(calculus.cell_index(&fifth), Ok(4));
        assert!(calculus.scell(0, Duality::Primal, 2).is_err());
        assert_eq!(calculus.cells(0, Duality::Primal).count(), 4);

        // erased slots are never reused
        calculus.insert_scell(ks.s_cell([4], Sign::Neg)).unwrap();
        assert_eq!(calculus.cell_index(&third), Ok(5));
        let star = calculus.hodge::<0, Primal>().unwrap();
        assert_eq!(star.diagonal().as_slice(), &[1., 1., 0., 1., 1., 1.]);

        calculus.compact();
        assert!(calculus.is_valid());
        assert_eq!(calculus.kform_length(0, Duality::Primal), 5);
        assert_eq!(calculus.cell_index(&fifth), Ok(3));
        assert_eq!(calculus.cell_index(&third), Ok(4));
        assert_eq!(calculus.is_cell_flipped(&third), Ok(true));
    }

    #[test]
    fn hodge_signs() {
        let calculus = unit_square();
        let ks = *calculus.kspace();
        for (cell, prop) in calculus.properties() {
            for duality in [Duality::Primal, Duality::Dual] {
                let registered = cell.signed(prop.sign());
                let sign = calculus.hodge_sign(&registered, duality);
                assert!(sign == 1.0 || sign == -1.0);
                assert_eq!(calculus.hodge_sign(&registered.opposite(), duality), -sign);
            }
        }

        // 1-cells in 2D pick up a sign on the dual side
        let edge = ks.s_cell([1, 0], Sign::Pos);
        assert_eq!(calculus.hodge_sign(&edge, Duality::Primal), 1.0);
        assert_eq!(calculus.hodge_sign(&edge, Duality::Dual), -1.0);
        let vertex = ks.s_cell([0, 0], Sign::Neg);
        assert_eq!(calculus.hodge_sign(&vertex, Duality::Primal), -1.0);
        assert_eq!(calculus.hodge_sign(&vertex, Duality::Dual), -1.0);
        let square = ks.s_cell([1, 1], Sign::Pos);
        assert_eq!(calculus.hodge_sign(&square, Duality::Dual), 1.0);
    }

    #[test]
    fn hodge_sign_table() {
        let plane = DiscreteExteriorCalculus::<2, 2>::new().unwrap();
        let ks = *plane.kspace();
        // (kcoords, primal, dual) for positive cells
        for (kcoords, primal, dual) in [
            ([0, 0], 1.0, 1.0),
            ([1, 0], 1.0, -1.0),
            ([0, 1], -1.0, 1.0),
            ([1, 1], 1.0, 1.0),
        ] {
            for (sign, factor) in [(Sign::Pos, 1.0), (Sign::Neg, -1.0)] {
                let cell = ks.s_cell(kcoords, sign);
                assert_eq!(plane.hodge_sign(&cell, Duality::Primal), factor * primal, "{kcoords:?}");
                assert_eq!(plane.hodge_sign(&cell, Duality::Dual), factor * dual, "{kcoords:?}");
            }
        }

        let space = DiscreteExteriorCalculus::<3, 3>::new().unwrap();
        let ks = *space.kspace();
        for x in 0..2 {
            for y in 0..2 {
                for z in 0..2 {
                    for (sign, expected) in [(Sign::Pos, 1.0), (Sign::Neg, -1.0)] {
                        let cell = ks.s_cell([x, y, z], sign);
                        assert_eq!(space.hodge_sign(&cell, Duality::Primal), expected);
                        assert_eq!(space.hodge_sign(&cell, Duality::Dual), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn unit_square_operators() {
        let calculus = unit_square();

        #[rustfmt::skip]
        let expected_d0 = na::DMatrix::from_row_slice(4, 4, &[
            -1.,  0.,  1.,  0.,
             0., -1.,  0.,  1.,
            -1.,  1.,  0.,  0.,
             0.,  0., -1.,  1.,
        ]);
        let expected_d1 = na::DMatrix::from_row_slice(1, 4, &[-1., 1., 1., -1.]);
        assert_eq!(calculus.derivative::<0, Primal>().to_dense(), expected_d0);
        assert_eq!(calculus.derivative::<1, Primal>().to_dense(), expected_d1);
        // vertical edges carry a direction sign on the dual side
        let edge_signs = na::DMatrix::from_diagonal(&na::DVector::from_column_slice(&[
            -1., -1., 1., 1.,
        ]));
        assert_eq!(
            calculus.derivative::<0, Dual>().to_dense(),
            &edge_signs * expected_d1.transpose()
        );
        assert_eq!(
            calculus.derivative::<1, Dual>().to_dense(),
            -expected_d0.transpose() * &edge_signs
        );

        #[rustfmt::skip]
        let expected_laplace = na::DMatrix::from_row_slice(4, 4, &[
            -2.,  1.,  1.,  0.,
             1., -2.,  0.,  1.,
             1.,  0., -2.,  1.,
             0.,  1.,  1., -2.,
        ]);
        assert_eq!(
            calculus.laplace::<Primal>().unwrap().to_dense(),
            expected_laplace
        );
        assert_eq!(
            calculus.laplace::<Dual>().unwrap().to_dense(),
            na::DMatrix::from_element(1, 1, -4.0)
        );
        assert_eq!(
            calculus.antiderivative::<1, Primal>().unwrap().to_dense(),
            -expected_d0.transpose()
        );
    }

    fn check_chain_complex<const N: usize>(calculus: &DiscreteExteriorCalculus<N, N>) {
        for duality in [Duality::Primal, Duality::Dual] {
            for order in 0..N.saturating_sub(1) {
                let first = calculus.derivative_matrix(order, duality);
                let second = calculus.derivative_matrix(order + 1, duality);
                let product = &second * &first;
                assert!(
                    product.values().iter().all(|v| *v == 0.0),
                    "{duality} d_{} * d_{order} should vanish in {N}D",
                    order + 1
                );
            }
        }
    }

    fn check_double_hodge<const N: usize>(calculus: &DiscreteExteriorCalculus<N, N>) {
        for duality in [Duality::Primal, Duality::Dual] {
            for order in 0..=N {
                let first = calculus.hodge_diagonal(order, duality).unwrap();
                let second = calculus
                    .hodge_diagonal(N - order, duality.opposite())
                    .unwrap();
                let expected = if (order * (N - order)) % 2 == 1 { -1.0 } else { 1.0 };
                for (a, b) in izip!(first.iter(), second.iter()) {
                    assert_relative_eq!(a * b, expected);
                }
            }
        }
    }

    #[test]
    fn chain_complex_and_double_hodge_on_random_sets() {
        for seed in 0..4 {
            for border in [Border::Unit, Border::Clipped] {
                let c2 = DiscreteExteriorCalculus::from_digital_set(random_set::<2>(seed, 6), border);
                check_chain_complex(&c2);
                check_double_hodge(&c2);
                let c3 = DiscreteExteriorCalculus::from_digital_set(random_set::<3>(seed, 4), border);
                check_chain_complex(&c3);
                check_double_hodge(&c3);
                let c4 = DiscreteExteriorCalculus::from_digital_set(random_set::<4>(seed, 3), border);
                check_chain_complex(&c4);
                check_double_hodge(&c4);
            }
        }
    }

    #[test]
    fn typed_double_hodge() {
        let calculus = DiscreteExteriorCalculus::from_digital_set(random_set::<2>(7, 5), Border::Clipped);
        let there = calculus.hodge::<1, Primal>().unwrap();
        let back = calculus.hodge::<1, Dual>().unwrap();
        let round_trip = back * there;
        let minus_identity = -1.0 * calculus.identity::<1, Primal>();
        assert_relative_eq!(round_trip.to_dense(), minus_identity.to_dense());
    }

    #[test]
    fn zero_size_ratio_makes_dual_hodge_singular() {
        let mut calculus = DiscreteExteriorCalculus::<1, 1>::new().unwrap();
        let ks = *calculus.kspace();
        calculus
            .insert_scell_with_ratio(ks.s_cell([0], Sign::Pos), 0.0)
            .unwrap();
        calculus.insert_scell(ks.s_cell([1], Sign::Pos)).unwrap();
        calculus.insert_scell(ks.s_cell([2], Sign::Pos)).unwrap();

        assert!(calculus.hodge::<0, Primal>().is_ok());
        assert_eq!(
            calculus.hodge::<1, Dual>().err(),
            Some(DecError::SingularHodge { kcoords: vec![0] })
        );
        assert!(calculus.hodge::<0, Dual>().is_ok());
        assert!(calculus.laplace::<Primal>().is_err());
    }

    #[test]
    fn laplace_of_random_digital_set() {
        let calculus = DiscreteExteriorCalculus::from_digital_set(random_set::<3>(42, 5), Border::Unit);
        let vertex_count = calculus.kform_length(0, Duality::Primal);
        assert!(vertex_count > 0);

        let laplace = calculus.laplace::<Primal>().unwrap().to_dense();
        assert_eq!(laplace.nrows(), vertex_count);
        assert_eq!(laplace.ncols(), vertex_count);
        assert_eq!(laplace, laplace.transpose(), "laplace should be symmetric");
        for row in laplace.row_iter() {
            assert_eq!(row.sum(), 0.0, "laplace rows should sum to zero");
        }
        assert!(laplace.diagonal().iter().all(|v| *v < 0.0));
    }

    #[test]
    fn flat_and_sharp_of_constant_field() {
        let calculus = DiscreteExteriorCalculus::<2, 2>::from_digital_set(
            (0..3).flat_map(|x| (0..3).map(move |y| [x, y])),
            Border::Unit,
        );

        let mut field = calculus.new_zero_vector_field::<Primal>();
        field.coordinates.column_mut(0).fill(1.0);
        field.coordinates.column_mut(1).fill(2.0);
        let flat = calculus.flat(&field).unwrap();
        for (index, edge) in calculus.cells(1, Duality::Primal) {
            let expected = if edge.cell.is_open(0) { 1.0 } else { 2.0 };
            assert_eq!(flat.values[index], expected);
        }
        let sharp = calculus.sharp(&flat).unwrap();
        assert_relative_eq!(sharp.coordinates, field.coordinates);

        let directional = calculus.flat_directional::<Primal>(0) * &field.extract_zero_form(0)
            + calculus.flat_directional::<Primal>(1) * &field.extract_zero_form(1);
        assert_relative_eq!(directional.values, flat.values);
        let y = calculus.sharp_directional::<Primal>(1) * &flat;
        assert_relative_eq!(y.values, field.extract_zero_form(1).values);

        let mut dual_field = calculus.new_zero_vector_field::<Dual>();
        dual_field.coordinates.column_mut(0).fill(-3.0);
        dual_field.coordinates.column_mut(1).fill(0.5);
        let dual_flat = calculus.flat(&dual_field).unwrap();
        let dual_sharp = calculus.sharp(&dual_flat).unwrap();
        assert_relative_eq!(dual_sharp.coordinates, dual_field.coordinates);
    }

    #[test]
    fn flat_rejects_foreign_fields() {
        let calculus = unit_square();
        let other = unit_square();
        let field = other.new_zero_vector_field::<Primal>();
        assert!(calculus.flat(&field).is_err());
        let form = other.new_zero_kform::<1, Primal>();
        assert!(calculus.sharp(&form).is_err());
    }

    #[test]
    fn mutation_invalidates_cached_operators() {
        let mut calculus = unit_square();
        let ks = *calculus.kspace();
        assert_eq!(calculus.flat_directional::<Primal>(0).nrows(), 4);

        calculus.insert_scell(ks.s_cell([4, 0], Sign::Pos)).unwrap();
        calculus.insert_scell(ks.s_cell([3, 0], Sign::Pos)).unwrap();
        let flat = calculus.flat_directional::<Primal>(0);
        assert_eq!((flat.nrows(), flat.ncols()), (5, 5));

        calculus.erase_cell(&ks.u_cell([3, 0]));
        let sharp = calculus.sharp_directional::<Primal>(0);
        assert!(sharp.matrix().triplet_iter().all(|(_, col, _)| col != 4));
    }

    #[test]
    fn edge_directions() {
        let surface = DiscreteExteriorCalculus::<2, 3>::from_n_scells(
            [SCell::new([1, 1, 0], Sign::Pos), SCell::new([1, 2, 1], Sign::Pos)],
            Border::Unit,
        )
        .unwrap();
        let ks = *surface.kspace();
        assert_eq!(surface.edge_direction(&ks.u_cell([1, 0, 0]), Duality::Primal), Some(0));
        assert_eq!(surface.edge_direction(&ks.u_cell([2, 1, 0]), Duality::Primal), Some(1));
        assert_eq!(surface.edge_direction(&ks.u_cell([1, 1, 0]), Duality::Primal), None);
        // the dual edge crossing the fold runs along the surface, not out of it
        assert_eq!(surface.edge_direction(&ks.u_cell([1, 2, 0]), Duality::Dual), Some(1));
        assert_eq!(surface.edge_direction(&ks.u_cell([2, 2, 1]), Duality::Dual), Some(0));
        assert_eq!(surface.edge_direction(&ks.u_cell([0, 0, 0]), Duality::Dual), None);
    }

    #[test]
    fn dual_flat_follows_both_halves_of_a_fold() {
        let surface = DiscreteExteriorCalculus::<2, 3>::from_n_scells(
            [SCell::new([1, 1, 0], Sign::Pos), SCell::new([1, 2, 1], Sign::Pos)],
            Border::Unit,
        )
        .unwrap();
        let ks = *surface.kspace();
        let fold = surface.cell_index(&ks.u_cell([1, 2, 0])).unwrap();
        let floor = surface.cell_index(&ks.u_cell([1, 1, 0])).unwrap();
        let wall = surface.cell_index(&ks.u_cell([1, 2, 1])).unwrap();

        let entries = |dir: usize| -> Vec<(usize, f64)> {
            surface
                .flat_directional::<Dual>(dir)
                .matrix()
                .triplet_iter()
                .filter(|(row, _, _)| *row == fold)
                .map(|(_, col, value)| (col, *value))
                .collect()
        };
        assert!(entries(0).is_empty());
        let along_floor = entries(1);
        assert_eq!(along_floor.len(), 1);
        assert_eq!(along_floor[0].0, floor);
        assert_eq!(along_floor[0].1.abs(), 0.5);
        let along_wall = entries(2);
        assert_eq!(along_wall.len(), 1);
        assert_eq!(along_wall[0].0, wall);
        assert_eq!(along_wall[0].1.abs(), 0.5);
    }

    #[test]
    fn clone_is_a_new_calculus() {
        let calculus = unit_square();
        let copy = calculus.clone();
        assert_ne!(calculus.id(), copy.id());
        assert!(copy.is_valid());
        assert_eq!(
            copy.laplace::<Primal>().unwrap().to_dense(),
            calculus.laplace::<Primal>().unwrap().to_dense()
        );
        assert_ne!(
            copy.laplace::<Primal>().unwrap(),
            calculus.laplace::<Primal>().unwrap()
        );
    }

    #[test]
    fn display() {
        let calculus = unit_square();
        assert_eq!(
            calculus.to_string(),
            "[DiscreteExteriorCalculus dim_embedded=2 dim_ambient=2 cells_count=9 \
             0-cells=4 1-cells=4 2-cells=1]"
        );
    }
}
