//! Locating a sub-surface of a large triangle mesh whose Laplacian spectrum
//! matches a target spectrum, by gradient descent on a per-vertex diagonal
//! perturbation of the base operator.

extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod config;
pub mod error;
pub mod laplace;
pub mod mesh;
pub mod operator;
pub mod optimize;
pub mod pipeline;
pub mod region;
pub mod spectral;

pub use error::{Error, NumericalFailure, Result};
