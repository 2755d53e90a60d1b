//! Multi-frame super-resolution core.
//!
//! Reconstructs a high-resolution image estimate from one or more degraded
//! low-resolution observations by solving a MAP (maximum a posteriori)
//! inverse problem: a composable forward/adjoint degradation chain models
//! how the sensor produced each observation, and an iteratively reweighted
//! least squares (IRLS) solver with a conjugate-gradient inner loop drives
//! the robust objective to convergence.
//!
//! File I/O, codecs, and CLI configuration are deliberately left to
//! external collaborators; this crate operates purely on in-memory
//! [`image::ImageData`] values.

pub mod color;
pub mod error;
pub mod float_trait;
pub mod image;
pub mod model;
pub mod regularization;
pub mod resize;
pub mod solver;

// Re-export commonly used types at the crate root.
pub use color::ColorSpace;
pub use error::{Result, SuperResError};
pub use float_trait::SrFloat;
pub use image::{ImageData, ImageDataReport, Normalization};
pub use model::{DegradationOperator, DownsamplingOperator, ImageModel};
pub use regularization::{Regularizer, TotalVariationRegularizer};
pub use resize::{InterpolationMode, ResizeTarget};
pub use solver::{
    IrlsMapSolver, IrlsMapSolverOptions, MapSolver, MapSolverOptions, SolveResult, SolveStatus,
};
