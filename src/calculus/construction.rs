use std::collections::{HashMap, HashSet};

use super::DiscreteExteriorCalculus;
use crate::{
    error::DecError,
    kspace::{Cell, SCell, Sign},
};

/// How the faces of the top cells on the border of a complex are registered
/// when building a calculus from top cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Border {
    /// Leave out the border of the complex:
    /// `(EMB - 1)`-cells lying on fewer than two top cells, and all their faces.
    /// A closed surface folded around a box has no border and keeps every face.
    Omit,
    /// Register every face with a size ratio of 1.
    #[default]
    Unit,
    /// Register every face with a size ratio equal to the fraction
    /// of its star that is registered, e.g. 1/2 for an edge on the border
    /// of a 2-dimensional complex and 1/4 for a corner vertex.
    Clipped,
}

impl<const N: usize> DiscreteExteriorCalculus<N, N> {
    /// Build a full-dimensional calculus from a set of points,
    /// each point becoming a positively oriented spel (a top cell),
    /// with all their faces registered according to `border`.
    ///
    /// ```
    /// # use khalimsky_dec::{Border, DiscreteExteriorCalculus, Duality};
    /// let calculus = DiscreteExteriorCalculus::<2, 2>::from_digital_set(
    ///     [[0, 0], [1, 0]],
    ///     Border::Unit,
    /// );
    /// assert_eq!(calculus.kform_length(0, Duality::Primal), 6);
    /// assert_eq!(calculus.kform_length(1, Duality::Primal), 7);
    /// assert_eq!(calculus.kform_length(2, Duality::Primal), 2);
    /// ```
    pub fn from_digital_set(points: impl IntoIterator<Item = [i32; N]>, border: Border) -> Self {
        let mut calculus = Self::empty();
        let spels: Vec<SCell<N>> = points
            .into_iter()
            .map(|point| calculus.kspace.s_spel(point, Sign::Pos))
            .collect();
        calculus.fill_from_top_cells(spels, border);
        calculus
    }
}

impl<const EMB: usize, const AMB: usize> DiscreteExteriorCalculus<EMB, AMB> {
    /// Build a calculus from signed `EMB`-cells,
    /// with all their faces registered positively according to `border`.
    ///
    /// Fails if a cell is not `EMB`-dimensional
    /// or `EMB` exceeds the ambient dimension.
    pub fn from_n_scells(
        cells: impl IntoIterator<Item = SCell<AMB>>,
        border: Border,
    ) -> Result<Self, DecError> {
        let mut calculus = Self::new()?;
        let cells: Vec<SCell<AMB>> = cells.into_iter().collect();
        if let Some(cell) = cells.iter().find(|cell| cell.dim() != EMB) {
            return Err(DecError::InvalidCellOrder {
                dim: cell.dim(),
                embedded: EMB,
            });
        }
        calculus.fill_from_top_cells(cells, border);
        Ok(calculus)
    }

    /// Register top cells and their faces.
    /// The cells must all have dimension `EMB`.
    fn fill_from_top_cells(&mut self, cells: Vec<SCell<AMB>>, border: Border) {
        let top_cell_count = cells.len();
        // faces in order of discovery, so that indices are deterministic
        let mut faces: Vec<Cell<AMB>> = Vec::new();
        let mut star_sizes: HashMap<Cell<AMB>, usize> = HashMap::new();

        for cell in cells {
            if !self.insert_unchecked(cell, 1.0) {
                continue;
            }
            for face in self.kspace.closure(&cell.cell).into_iter().skip(1) {
                let star_size = star_sizes.entry(face).or_insert_with(|| {
                    faces.push(face);
                    0
                });
                *star_size += 1;
            }
        }

        let omitted: HashSet<Cell<AMB>> = match border {
            Border::Omit => faces
                .iter()
                .filter(|face| face.dim() + 1 == EMB && star_sizes.get(*face).copied().unwrap_or(0) < 2)
                .flat_map(|facet| self.kspace.closure(facet))
                .collect(),
            _ => HashSet::new(),
        };

        for face in faces {
            let full_star = 1usize << (EMB - face.dim());
            let star_size = star_sizes.get(&face).copied().unwrap_or(0);
            let size_ratio = match border {
                Border::Omit if omitted.contains(&face) => continue,
                Border::Omit | Border::Unit => 1.0,
                Border::Clipped => star_size as f64 / full_star as f64,
            };
            self.insert_unchecked(face.signed(Sign::Pos), size_ratio);
        }

        log::debug!("built from {top_cell_count} top cells with {border:?} border: {self}");
    }
}
