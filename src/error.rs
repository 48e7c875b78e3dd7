//! The error type shared by fallible operations in this crate.

use crate::duality::Duality;

/// Errors produced when building or combining calculus objects.
///
/// Order and duality mismatches between forms and operators
/// are caught by the type system and never show up here.
/// What remains are conditions only known at runtime:
/// registry lookups, geometry supplied by the caller,
/// and objects built from different calculus instances.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecError {
    /// A calculus over a manifold of higher dimension than its ambient space.
    #[error("embedded dimension {embedded} exceeds ambient dimension {ambient}")]
    InvalidSpace {
        /// Dimension of the embedded manifold.
        embedded: usize,
        /// Dimension of the ambient Khalimsky space.
        ambient: usize,
    },
    /// The cell with the given Khalimsky coordinates is not registered.
    #[error("cell {kcoords:?} is not registered in the calculus")]
    CellNotFound {
        /// Khalimsky coordinates of the missing cell.
        kcoords: Vec<i32>,
    },
    /// No live cell is stored at the given position.
    #[error("no {duality} {order}-cell with index {index}")]
    IndexNotFound {
        /// Order of the requested cell.
        order: usize,
        /// Duality of the requested cell.
        duality: Duality,
        /// Index within the form bucket.
        index: usize,
    },
    /// A cell whose dimension is too high for the embedded manifold.
    #[error("{dim}-cell cannot be part of a calculus on a {embedded}-dimensional manifold")]
    InvalidCellOrder {
        /// Dimension of the rejected cell.
        dim: usize,
        /// Dimension of the embedded manifold.
        embedded: usize,
    },
    /// Operands belong to different calculi or have mismatched shapes.
    #[error("incompatible operands: {0}")]
    IncompatibleOperator(String),
    /// A dual to primal hodge was requested for a cell with a zero size ratio.
    #[error("hodge operator is singular at cell {kcoords:?} (size ratio is zero)")]
    SingularHodge {
        /// Khalimsky coordinates of the offending cell.
        kcoords: Vec<i32>,
    },
    /// The sparse factorization could not be computed.
    #[error("linear solver failed: {0}")]
    SolverFailure(String),
}
