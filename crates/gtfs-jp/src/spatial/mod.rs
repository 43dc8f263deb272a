//! Spatial indexing and query utilities.

pub mod index;
pub mod queries;

pub use index::{StopIndex, StopNode};
pub use queries::{cumulative_distances, haversine_distance};
