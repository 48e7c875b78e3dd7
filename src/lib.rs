//! Discrete exterior calculus on cubical complexes in Khalimsky spaces.
//!
//! A [`DiscreteExteriorCalculus<EMB, AMB>`][DiscreteExteriorCalculus]
//! is a registry of oriented cells of an `AMB`-dimensional Khalimsky space
//! forming an `EMB`-dimensional complex.
//! Values attached to its cells are [`KForm`]s,
//! and the classic operators of exterior calculus between them
//! (derivative, hodge, antiderivative, laplace, flat and sharp)
//! are sparse matrices typed by the order and duality of their input and output,
//! so that composing or applying operators of mismatched types is a compile error.
//!
//! ```
//! use khalimsky_dec::{Border, DiscreteExteriorCalculus, Primal};
//!
//! // a 3x3 square of pixels
//! let calculus = DiscreteExteriorCalculus::<2, 2>::from_digital_set(
//!     (0..3).flat_map(|x| (0..3).map(move |y| [x, y])),
//!     Border::Unit,
//! );
//! let x = calculus.kform_from_cells::<0, Primal>(|cell| cell.cell.kcoords[0] as f64);
//!
//! let d = calculus.derivative::<0, Primal>();
//! let star = calculus.hodge::<1, Primal>()?;
//! let dx = &d * &x;
//! let flux = star * &dx;
//! assert_eq!(flux.len(), dx.len());
//!
//! // the second derivative of a linear function vanishes inside the domain
//! let laplace = calculus.laplace::<Primal>()?;
//! let border = calculus.border::<0, Primal>();
//! let interior_laplace = laplace.exclude_subset(&border);
//! assert!((interior_laplace * &x).values.iter().all(|v| *v == 0.0));
//! # Ok::<(), khalimsky_dec::DecError>(())
//! ```

#![warn(missing_docs)]

pub mod kspace;
#[doc(inline)]
pub use kspace::{Cell, KhalimskySpace, SCell, Sign};

pub mod duality;
#[doc(inline)]
pub use duality::{actual_order, Dual, Duality, DualityKind, Primal};

pub mod calculus;
#[doc(inline)]
pub use calculus::{Border, CalculusId, DiscreteExteriorCalculus, Property, Subset, SubsetImpl};

pub mod kform;
#[doc(inline)]
pub use kform::{KForm, KFormImpl};

pub mod vector_field;
#[doc(inline)]
pub use vector_field::VectorField;

pub mod operator;
#[doc(inline)]
pub use operator::{DiagonalOperator, LinearOperator, Op, Operand, Operator};

pub mod solver;
#[doc(inline)]
pub use solver::CholeskySolver;

pub mod error;
#[doc(inline)]
pub use error::DecError;

pub use nalgebra as na;
