//! Spatial primitives: axis-aligned bounds and exact k-nearest-neighbor search.

mod bounds;
mod knn;

pub use bounds::{Aabb, Axis};
pub use knn::{
    query_chunked, split_ranges, KdTreeIndex, LinearScanIndex, NeighborHit, SpatialIndex,
};
