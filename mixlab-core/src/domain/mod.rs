//! Domain types: the expert matrix and weight-vector helpers.

pub mod matrix;
pub mod weights;

pub use matrix::{validate_row, ExpertMatrix};
pub use weights::{dot, is_on_simplex, uniform, SIMPLEX_TOLERANCE};
