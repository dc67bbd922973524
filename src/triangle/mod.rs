//! Development triangles and the builder that aggregates payment records into them

mod builder;
mod grid;

pub use builder::TriangleBuilder;
pub use grid::Triangle;
