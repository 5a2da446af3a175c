//! Exact k-nearest-neighbor search over a fixed 3D point set.
//!
//! Results are always sorted by `(distance, index)`, so equidistant points come
//! back in ascending index order no matter which backend is used. Any distance
//! cutoff is the caller's business; the search radius is never restricted here.

use std::num::NonZeroUsize;
use std::ops::Range;

use glam::DVec3;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use ordered_float::OrderedFloat;

/// One neighbor returned by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborHit {
    /// Position of the neighbor in the indexed point slice.
    pub index: usize,
    /// Euclidean distance to the query point.
    pub distance: f64,
}

/// Exact k-NN capability. Approximate structures must not implement this.
pub trait SpatialIndex {
    /// Build the index over `points`; indices in results refer to this slice.
    fn build(points: &[DVec3]) -> Self
    where
        Self: Sized;

    /// Number of indexed points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `min(k, len)` nearest points to `query`, sorted by `(distance, index)`.
    fn nearest(&self, query: DVec3, k: usize) -> Vec<NeighborHit>;

    /// Run `nearest` for every query point, preserving input order.
    fn query(&self, points: &[DVec3], k: usize) -> Vec<Vec<NeighborHit>> {
        points.iter().map(|&p| self.nearest(p, k)).collect()
    }
}

/// k-d tree backed index (kiddo `ImmutableKdTree`).
pub struct KdTreeIndex {
    tree: Option<ImmutableKdTree<f64, 3>>,
    len: usize,
}

impl SpatialIndex for KdTreeIndex {
    fn build(points: &[DVec3]) -> Self {
        if points.is_empty() {
            return Self { tree: None, len: 0 };
        }
        let entries: Vec<[f64; 3]> = points.iter().map(|p| p.to_array()).collect();
        Self {
            tree: Some(ImmutableKdTree::new_from_slice(&entries)),
            len: entries.len(),
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn nearest(&self, query: DVec3, k: usize) -> Vec<NeighborHit> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        let k = k.min(self.len);
        if k == 0 {
            return Vec::new();
        }

        let q = query.to_array();
        let mut fetch = (k + 1).min(self.len);
        loop {
            let Some(qty) = NonZeroUsize::new(fetch) else {
                return Vec::new();
            };
            let hits = tree.nearest_n::<SquaredEuclidean>(&q, qty);
            let mut hits: Vec<(f64, usize)> = hits
                .into_iter()
                .map(|n| (n.distance, n.item as usize))
                .collect();
            sort_hits(&mut hits);

            // The tree orders equidistant items arbitrarily. Keep widening until
            // every point tied with the k-th distance is in hand, then cut.
            let exhausted = hits.len() < fetch || fetch >= self.len;
            let boundary_settled = hits.len() > k && hits[hits.len() - 1].0 > hits[k - 1].0;
            if exhausted || boundary_settled {
                return finish(hits, k);
            }
            fetch = (fetch * 2).min(self.len);
        }
    }
}

/// Brute-force index. Exact by construction; used as the reference backend.
pub struct LinearScanIndex {
    points: Vec<DVec3>,
}

impl SpatialIndex for LinearScanIndex {
    fn build(points: &[DVec3]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn nearest(&self, query: DVec3, k: usize) -> Vec<NeighborHit> {
        let mut hits: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.distance_squared(query), i))
            .collect();
        sort_hits(&mut hits);
        let k = k.min(hits.len());
        finish(hits, k)
    }
}

#[inline]
fn sort_hits(hits: &mut [(f64, usize)]) {
    hits.sort_unstable_by_key(|&(d2, i)| (OrderedFloat(d2), i));
}

/// Truncate sorted `(squared distance, index)` pairs to `k` and take square roots.
fn finish(mut hits: Vec<(f64, usize)>, k: usize) -> Vec<NeighborHit> {
    hits.truncate(k);
    hits.into_iter()
        .map(|(d2, index)| NeighborHit {
            index,
            distance: d2.sqrt(),
        })
        .collect()
}

/// Split `len` items into `chunks` contiguous ranges of near-equal size.
///
/// The first `len % chunks` ranges are one element longer. A chunk count of
/// zero is treated as one.
pub fn split_ranges(len: usize, chunks: usize) -> Vec<Range<usize>> {
    let chunks = chunks.max(1);
    let base = len / chunks;
    let extra = len % chunks;

    let mut ranges = Vec::with_capacity(chunks);
    let mut start = 0;
    for i in 0..chunks {
        let end = start + base + usize::from(i < extra);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Query `points` in `chunks` bounded batches and concatenate in input order.
///
/// Output is identical to `index.query(points, k)` for any chunk count.
pub fn query_chunked<I>(index: &I, points: &[DVec3], k: usize, chunks: usize) -> Vec<Vec<NeighborHit>>
where
    I: SpatialIndex + ?Sized,
{
    let ranges = split_ranges(points.len(), chunks);
    let total = ranges.len();
    let mut results = Vec::with_capacity(points.len());
    for (i, range) in ranges.into_iter().enumerate() {
        log::debug!("k-NN query chunk [{}/{}]: {} points", i + 1, total, range.len());
        results.extend(index.query(&points[range], k));
    }
    results
}
