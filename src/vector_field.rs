//! Discrete vector fields attached to the 0-cells of a calculus.

use nalgebra as na;

use crate::{calculus::CalculusId, duality::DualityKind, error::DecError, kform::KForm};

/// A vector in the ambient space for every primal or dual 0-cell of a calculus.
///
/// Coordinates are stored in a matrix with one row per 0-cell
/// and one column per ambient axis,
/// so each column is a [`KForm<0, D>`] in disguise.
///
/// Vector fields are constructed with
/// [`new_zero_vector_field`][crate::DiscreteExteriorCalculus::new_zero_vector_field],
/// [`vector_field_from_coordinates`][crate::DiscreteExteriorCalculus::vector_field_from_coordinates]
/// or by [`sharp`][crate::DiscreteExteriorCalculus::sharp].
#[derive(Clone)]
pub struct VectorField<D> {
    /// The coordinates, one row per 0-cell.
    pub coordinates: na::DMatrix<f64>,
    calculus: CalculusId,
    _marker: std::marker::PhantomData<D>,
}

impl<D> VectorField<D> {
    #[inline]
    pub(crate) fn from_coordinates(coordinates: na::DMatrix<f64>, calculus: CalculusId) -> Self {
        Self {
            coordinates,
            calculus,
            _marker: std::marker::PhantomData,
        }
    }

    /// Id of the calculus this field was built from.
    #[inline]
    pub fn calculus_id(&self) -> CalculusId {
        self.calculus
    }

    /// Number of 0-cells the field is attached to.
    #[inline]
    pub fn len(&self) -> usize {
        self.coordinates.nrows()
    }

    /// Whether the field has no vectors at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coordinates.nrows() == 0
    }

    /// Dimension of the vectors.
    #[inline]
    pub fn ambient_dim(&self) -> usize {
        self.coordinates.ncols()
    }

    /// The vector at the given 0-cell index.
    pub fn vector(&self, index: usize) -> na::DVector<f64> {
        self.coordinates.row(index).transpose()
    }

    /// Set every coordinate to zero.
    pub fn clear(&mut self) {
        self.coordinates.fill(0.0);
    }

    /// The coordinate along `dir` as a 0-form.
    ///
    /// Panics if `dir` is not an axis of the ambient space.
    pub fn extract_zero_form(&self, dir: usize) -> KForm<0, D> {
        KForm::from_values(self.coordinates.column(dir).into_owned(), self.calculus)
    }

    /// Overwrite the coordinate along `dir` with the values of a 0-form.
    pub fn set_zero_form(&mut self, dir: usize, form: &KForm<0, D>) -> Result<(), DecError> {
        if form.calculus_id() != self.calculus || form.len() != self.len() {
            return Err(DecError::IncompatibleOperator(format!(
                "0-form of length {} cannot be a coordinate of a field of {} vectors",
                form.len(),
                self.len()
            )));
        }
        self.coordinates.set_column(dir, &form.values);
        Ok(())
    }

    /// Euclidean norm of every vector, as a 0-form.
    pub fn intensity(&self) -> KForm<0, D> {
        let norms = na::DVector::from_iterator(
            self.len(),
            self.coordinates.row_iter().map(|row| row.norm()),
        );
        KForm::from_values(norms, self.calculus)
    }

    /// The field with every nonzero vector scaled to unit length.
    /// Zero vectors stay zero.
    pub fn normalized(&self) -> Self {
        let mut coordinates = self.coordinates.clone();
        for mut row in coordinates.row_iter_mut() {
            let norm = row.norm();
            if norm > 0.0 {
                row /= norm;
            }
        }
        Self::from_coordinates(coordinates, self.calculus)
    }

    fn assert_compatible(&self, other: &Self) {
        assert!(
            self.calculus == other.calculus,
            "vector fields belong to different calculi"
        );
    }
}

impl<D: DualityKind> std::fmt::Debug for VectorField<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vector field with {} vectors, coordinates {:?}",
            D::DUALITY,
            self.len(),
            self.coordinates
        )
    }
}

impl<D> PartialEq for VectorField<D> {
    fn eq(&self, other: &Self) -> bool {
        self.calculus == other.calculus && self.coordinates == other.coordinates
    }
}

impl<D> std::ops::Add<&VectorField<D>> for &VectorField<D> {
    type Output = VectorField<D>;

    fn add(self, rhs: &VectorField<D>) -> Self::Output {
        self.assert_compatible(rhs);
        VectorField::from_coordinates(&self.coordinates + &rhs.coordinates, self.calculus)
    }
}

impl<D> std::ops::Sub<&VectorField<D>> for &VectorField<D> {
    type Output = VectorField<D>;

    fn sub(self, rhs: &VectorField<D>) -> Self::Output {
        self.assert_compatible(rhs);
        VectorField::from_coordinates(&self.coordinates - &rhs.coordinates, self.calculus)
    }
}

impl<D> std::ops::Mul<&VectorField<D>> for f64 {
    type Output = VectorField<D>;

    fn mul(self, rhs: &VectorField<D>) -> Self::Output {
        VectorField::from_coordinates(&rhs.coordinates * self, rhs.calculus)
    }
}
