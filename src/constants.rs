//! Default tuning values for correspondence building and transfer.

/// Neighbors looked up per target node when nothing else is configured.
pub const DEFAULT_NEIGHBORS: usize = 10;

/// Number of batches the target point set is split into for k-NN queries.
/// Only bounds peak memory; results do not depend on it.
pub const DEFAULT_QUERY_CHUNKS: usize = 10;

/// Value written to target nodes that have no usable source neighbor.
pub const MISSING_VALUE: f64 = f64::NAN;
