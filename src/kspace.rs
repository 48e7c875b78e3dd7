//! Cells of an unbounded Khalimsky space and their incidence relations.
//!
//! A cell is addressed by its Khalimsky coordinates:
//! a digital point `p` on axis `i` corresponds to the closed coordinate `2p`
//! and the open interval to its right to the odd coordinate `2p + 1`.
//! The dimension of a cell is the number of its open coordinates,
//! so in 2D `(0, 0)` is a vertex, `(1, 0)` a horizontal edge
//! and `(1, 1)` a unit square.

use itertools::Itertools;
use std::fmt;

/// Orientation of a signed cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sign {
    /// Positive orientation.
    Pos,
    /// Negative orientation.
    Neg,
}

impl Sign {
    /// `1.0` for positive and `-1.0` for negative orientation.
    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            Sign::Pos => 1.0,
            Sign::Neg => -1.0,
        }
    }

    #[inline]
    fn from_parity(odd: bool) -> Self {
        if odd {
            Sign::Neg
        } else {
            Sign::Pos
        }
    }
}

impl std::ops::Neg for Sign {
    type Output = Self;

    fn neg(self) -> Self::Output {
        match self {
            Sign::Pos => Sign::Neg,
            Sign::Neg => Sign::Pos,
        }
    }
}

impl std::ops::Mul for Sign {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Sign::from_parity(self != rhs)
    }
}

/// An unsigned cell of an `N`-dimensional Khalimsky space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell<const N: usize> {
    /// Khalimsky coordinates; odd values are open.
    pub kcoords: [i32; N],
}

impl<const N: usize> Cell<N> {
    /// Create a cell from Khalimsky coordinates.
    #[inline]
    pub fn new(kcoords: [i32; N]) -> Self {
        Self { kcoords }
    }

    /// Whether the coordinate along `axis` is open.
    #[inline]
    pub fn is_open(&self, axis: usize) -> bool {
        self.kcoords[axis].rem_euclid(2) == 1
    }

    /// Dimension of the cell, i.e. the number of open coordinates.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dirs().count()
    }

    /// Axes along which the cell is open, in increasing order.
    pub fn dirs(&self) -> impl '_ + Iterator<Item = usize> {
        (0..N).filter(|&axis| self.is_open(axis))
    }

    /// Axes along which the cell is closed, in increasing order.
    pub fn orth_dirs(&self) -> impl '_ + Iterator<Item = usize> {
        (0..N).filter(|&axis| !self.is_open(axis))
    }

    /// The cell moved by `delta` along `axis`.
    #[inline]
    pub fn shifted(&self, axis: usize, delta: i32) -> Self {
        let mut kcoords = self.kcoords;
        kcoords[axis] += delta;
        Self { kcoords }
    }

    /// Attach an orientation to the cell.
    #[inline]
    pub fn signed(self, sign: Sign) -> SCell<N> {
        SCell { cell: self, sign }
    }
}

impl<const N: usize> fmt::Debug for Cell<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell{:?}", self.kcoords)
    }
}

/// A cell together with an orientation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SCell<const N: usize> {
    /// The unsigned cell.
    pub cell: Cell<N>,
    /// Its orientation.
    pub sign: Sign,
}

impl<const N: usize> SCell<N> {
    /// Create a signed cell from Khalimsky coordinates.
    #[inline]
    pub fn new(kcoords: [i32; N], sign: Sign) -> Self {
        Cell::new(kcoords).signed(sign)
    }

    /// Dimension of the underlying cell.
    #[inline]
    pub fn dim(&self) -> usize {
        self.cell.dim()
    }

    /// The same cell with the opposite orientation.
    #[inline]
    pub fn opposite(self) -> Self {
        Self {
            cell: self.cell,
            sign: -self.sign,
        }
    }
}

impl<const N: usize> fmt::Debug for SCell<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.sign {
            Sign::Pos => '+',
            Sign::Neg => '-',
        };
        write!(f, "{sign}{:?}", self.cell.kcoords)
    }
}

/// An unbounded `N`-dimensional Khalimsky space.
///
/// The space itself holds no data; it is the entry point
/// for constructing cells and navigating their incidences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KhalimskySpace<const N: usize>;

impl<const N: usize> KhalimskySpace<N> {
    /// Create the space.
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Signed cell with the given Khalimsky coordinates.
    #[inline]
    pub fn s_cell(&self, kcoords: [i32; N], sign: Sign) -> SCell<N> {
        SCell::new(kcoords, sign)
    }

    /// Unsigned cell with the given Khalimsky coordinates.
    #[inline]
    pub fn u_cell(&self, kcoords: [i32; N]) -> Cell<N> {
        Cell::new(kcoords)
    }

    /// The `N`-cell (spel) of a digital point.
    #[inline]
    pub fn u_spel(&self, point: [i32; N]) -> Cell<N> {
        Cell::new(point.map(|p| 2 * p + 1))
    }

    /// The signed `N`-cell (spel) of a digital point.
    #[inline]
    pub fn s_spel(&self, point: [i32; N], sign: Sign) -> SCell<N> {
        self.u_spel(point).signed(sign)
    }

    /// The signed 0-cell (pointel) at the lower corner of a digital point.
    #[inline]
    pub fn s_pointel(&self, point: [i32; N], sign: Sign) -> SCell<N> {
        Cell::new(point.map(|p| 2 * p)).signed(sign)
    }

    /// Coefficient of `lower` in the boundary of the positively oriented `upper`,
    /// or `None` if `lower` is not a facet of `upper`.
    pub fn incidence(&self, upper: &Cell<N>, lower: &Cell<N>) -> Option<Sign> {
        let mut differing = (0..N).filter(|&axis| upper.kcoords[axis] != lower.kcoords[axis]);
        let axis = differing.next()?;
        if differing.next().is_some() || !upper.is_open(axis) {
            return None;
        }
        let delta = lower.kcoords[axis] - upper.kcoords[axis];
        if delta.abs() != 1 {
            return None;
        }
        let position = upper.dirs().position(|dir| dir == axis)?;
        let sign = Sign::from_parity(position % 2 == 1);
        Some(if delta > 0 { sign } else { -sign })
    }

    /// The signed boundary of a cell.
    pub fn lower_incident(&self, cell: &SCell<N>) -> Vec<SCell<N>> {
        let mut faces = Vec::with_capacity(2 * cell.dim());
        for (position, axis) in cell.cell.dirs().enumerate() {
            let sign = cell.sign * Sign::from_parity(position % 2 == 1);
            faces.push(cell.cell.shifted(axis, 1).signed(sign));
            faces.push(cell.cell.shifted(axis, -1).signed(-sign));
        }
        faces
    }

    /// Cells one dimension higher having `cell` on their boundary,
    /// oriented so that `cell` appears with a positive coefficient.
    pub fn upper_incident(&self, cell: &SCell<N>) -> Vec<SCell<N>> {
        let mut cofaces = Vec::with_capacity(2 * (N - cell.dim()));
        for axis in cell.cell.orth_dirs() {
            for delta in [1, -1] {
                let coface = cell.cell.shifted(axis, delta);
                if let Some(incidence) = self.incidence(&coface, &cell.cell) {
                    cofaces.push(coface.signed(cell.sign * incidence));
                }
            }
        }
        cofaces
    }

    /// The closure of a cell: the cell itself first,
    /// followed by all of its faces of every dimension.
    pub fn closure(&self, cell: &Cell<N>) -> Vec<Cell<N>> {
        let dirs: Vec<usize> = cell.dirs().collect();
        (0..3usize.pow(dirs.len() as u32))
            .map(|mut code| {
                let mut face = *cell;
                for &axis in &dirs {
                    match code % 3 {
                        0 => {}
                        1 => face.kcoords[axis] -= 1,
                        _ => face.kcoords[axis] += 1,
                    }
                    code /= 3;
                }
                face
            })
            .collect()
    }

    /// All cells of dimension `dim` having `cell` in their closure.
    pub fn cofaces(&self, cell: &Cell<N>, dim: usize) -> Vec<Cell<N>> {
        let Some(extra) = dim.checked_sub(cell.dim()) else {
            return Vec::new();
        };
        if extra == 0 {
            return vec![*cell];
        }
        cell.orth_dirs()
            .combinations(extra)
            .flat_map(|axes| {
                (0..1usize << extra).map(move |bits| {
                    let mut coface = *cell;
                    for (i, &axis) in axes.iter().enumerate() {
                        coface.kcoords[axis] += if (bits >> i) & 1 == 1 { 1 } else { -1 };
                    }
                    coface
                })
            })
            .collect()
    }
}
