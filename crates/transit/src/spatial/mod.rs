//! Spatial primitives: geodesic math and R-tree nodes for stop lookup.
//!
//! ## Two-Stage Filtering
//!
//! Radius queries run in two stages:
//! 1. **R-tree filter**: squared Euclidean distance in degrees for a fast
//!    approximate cut
//! 2. **Haversine filter**: accurate geodesic distance on the survivors
//!
//! Euclidean degrees are good enough to prune the tree but grow inaccurate
//! over larger spans, so the final answer always comes from Haversine.

pub mod geometry;
pub mod index;

pub use geometry::{
    bearing, cumulative_distances, haversine_distance, meters_to_degrees_approx, move_towards,
    nearest_vertex_index,
};
pub use index::StopNode;
