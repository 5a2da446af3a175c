//! Nearest-neighbor correspondence between a source and a target grid.
//!
//! For every target node the table records up to `k` source nodes, nearest
//! first, or `None` when the distance cutoff left nothing ("lonely" node).

use rustc_hash::FxHashMap;

use crate::constants::{DEFAULT_NEIGHBORS, DEFAULT_QUERY_CHUNKS};
use crate::error::{Result, TransferError};
use crate::geometry::{query_chunked, KdTreeIndex, SpatialIndex};
use crate::grid::{Grid, NodeId};
use crate::util::Timed;

/// One interpolation source for a target node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub source: NodeId,
    pub distance: f64,
}

/// Parameters of a neighbor search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrespondenceOptions {
    /// Neighbors requested per target node (k).
    pub neighbors: usize,
    /// Neighbors farther than this are dropped. `None` means no cutoff.
    pub max_distance: Option<f64>,
    /// Number of query batches.
    pub chunks: usize,
}

impl Default for CorrespondenceOptions {
    fn default() -> Self {
        Self {
            neighbors: DEFAULT_NEIGHBORS,
            max_distance: None,
            chunks: DEFAULT_QUERY_CHUNKS,
        }
    }
}

impl CorrespondenceOptions {
    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// An infinite distance is the same as no cutoff.
    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = (max_distance != f64::INFINITY).then_some(max_distance);
        self
    }

    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.neighbors == 0 {
            return Err(TransferError::InvalidInput(
                "neighbor count must be at least 1".into(),
            ));
        }
        if self.chunks == 0 {
            return Err(TransferError::InvalidInput(
                "query chunk count must be at least 1".into(),
            ));
        }
        if let Some(d) = self.max_distance {
            if d.is_nan() || d < 0.0 {
                return Err(TransferError::InvalidInput(format!(
                    "maximum distance must be a non-negative number, got {}",
                    d
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn admits(&self, distance: f64) -> bool {
        self.max_distance.map_or(true, |max| distance <= max)
    }
}

/// Cached result of a neighbor search from `source_grid` to `target_grid`.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceTable {
    source_grid: String,
    target_grid: String,
    options: CorrespondenceOptions,
    targets: Vec<NodeId>,
    lookup: FxHashMap<NodeId, usize>,
    entries: Vec<Option<Vec<Neighbor>>>,
    lonely: usize,
}

impl CorrespondenceTable {
    /// Assemble a table from explicit entries, in target grid order.
    ///
    /// Neighbor lists must be sorted by ascending distance and respect the
    /// cutoff in `options`. An empty list is stored as lonely.
    pub fn from_entries<I>(
        source_grid: &str,
        target_grid: &str,
        options: CorrespondenceOptions,
        entries: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, Option<Vec<Neighbor>>)>,
    {
        let mut table = Self::empty(source_grid, target_grid, options);
        for (target, neighbors) in entries {
            if let Some(list) = &neighbors {
                let sorted = list.windows(2).all(|w| w[0].distance <= w[1].distance);
                let admitted = list
                    .iter()
                    .all(|n| n.distance >= 0.0 && options.admits(n.distance));
                if !sorted || !admitted {
                    return Err(TransferError::InvalidInput(format!(
                        "neighbors of target node {} are unsorted or outside the cutoff",
                        target
                    )));
                }
            }
            if table.lookup.contains_key(&target) {
                return Err(TransferError::DuplicateNode(target));
            }
            table.push(target, neighbors.filter(|list| !list.is_empty()));
        }
        Ok(table)
    }

    fn empty(source_grid: &str, target_grid: &str, options: CorrespondenceOptions) -> Self {
        Self {
            source_grid: source_grid.to_string(),
            target_grid: target_grid.to_string(),
            options,
            targets: Vec::new(),
            lookup: FxHashMap::default(),
            entries: Vec::new(),
            lonely: 0,
        }
    }

    fn push(&mut self, target: NodeId, neighbors: Option<Vec<Neighbor>>) {
        if neighbors.is_none() {
            self.lonely += 1;
        }
        self.lookup.insert(target, self.targets.len());
        self.targets.push(target);
        self.entries.push(neighbors);
    }

    pub fn source_grid(&self) -> &str {
        &self.source_grid
    }

    pub fn target_grid(&self) -> &str {
        &self.target_grid
    }

    pub fn options(&self) -> &CorrespondenceOptions {
        &self.options
    }

    /// Number of target nodes covered.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target nodes without any neighbor inside the cutoff.
    pub fn lonely_count(&self) -> usize {
        self.lonely
    }

    /// Target node ids in the order the table was built.
    pub fn target_ids(&self) -> &[NodeId] {
        &self.targets
    }

    /// Entry for `target`: outer `None` if the node is not in the table,
    /// inner `None` if it is lonely.
    pub fn get(&self, target: NodeId) -> Option<Option<&[Neighbor]>> {
        self.lookup
            .get(&target)
            .map(|&i| self.entries[i].as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Option<&[Neighbor]>)> + '_ {
        self.targets
            .iter()
            .copied()
            .zip(self.entries.iter().map(|e| e.as_deref()))
    }
}

/// Builds [`CorrespondenceTable`]s with a fixed set of options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrespondenceBuilder {
    options: CorrespondenceOptions,
}

impl CorrespondenceBuilder {
    pub fn new(options: CorrespondenceOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CorrespondenceOptions {
        &self.options
    }

    /// Search `source` for the neighbors of every `target` node using a k-d tree.
    pub fn build(
        &self,
        source_name: &str,
        source: &Grid,
        target_name: &str,
        target: &Grid,
    ) -> Result<CorrespondenceTable> {
        self.build_with::<KdTreeIndex>(source_name, source, target_name, target)
    }

    /// Same as [`build`](Self::build) with an explicit index backend.
    pub fn build_with<I: SpatialIndex>(
        &self,
        source_name: &str,
        source: &Grid,
        target_name: &str,
        target: &Grid,
    ) -> Result<CorrespondenceTable> {
        let options = self.options;
        options.validate()?;
        check_overlap(source_name, source, target_name, target)?;

        log::debug!(
            "Identifying nearest neighbors in {} for {}: neighbors={}; max distance={:?}; chunks={}",
            source_name,
            target_name,
            options.neighbors,
            options.max_distance,
            options.chunks
        );
        let _t = Timed::info(format!("Correspondence {} -> {}", source_name, target_name));

        let index = {
            let _t = Timed::debug("Build spatial index");
            I::build(source.coordinates())
        };
        let hits = query_chunked(&index, target.coordinates(), options.neighbors, options.chunks);

        let source_ids = source.node_ids();
        let mut table = CorrespondenceTable::empty(source_name, target_name, options);
        for (&target_id, node_hits) in target.node_ids().iter().zip(hits) {
            let neighbors: Vec<Neighbor> = node_hits
                .into_iter()
                .filter(|hit| options.admits(hit.distance))
                .map(|hit| Neighbor {
                    source: source_ids[hit.index],
                    distance: hit.distance,
                })
                .collect();

            if neighbors.is_empty() {
                log::trace!("No neighbor found for node {} in {}", target_id, target_name);
                table.push(target_id, None);
            } else {
                table.push(target_id, Some(neighbors));
            }
        }

        if table.lonely_count() > 0 {
            log::warn!(
                "No neighbors found for {} nodes in {} for {} within {:?}",
                table.lonely_count(),
                source_name,
                target_name,
                options.max_distance
            );
        }
        log::info!("Nearest neighbors in {} found for {}", source_name, target_name);
        Ok(table)
    }
}

/// Per-axis bounding interval test; touching intervals pass.
fn check_overlap(source_name: &str, source: &Grid, target_name: &str, target: &Grid) -> Result<()> {
    let (Some(src), Some(tgt)) = (source.bounds(), target.bounds()) else {
        let empty = if source.is_empty() { source_name } else { target_name };
        return Err(TransferError::InvalidInput(format!(
            "grid '{}' has no nodes",
            empty
        )));
    };

    for (name, b) in [(source_name, &src), (target_name, &tgt)] {
        log::debug!("Dimensions of {}:", name);
        log::debug!("\t(x): {} to {}", b.min.x, b.max.x);
        log::debug!("\t(y): {} to {}", b.min.y, b.max.y);
        log::debug!("\t(z): {} to {}", b.min.z, b.max.z);
    }

    if let Some(axis) = src.first_disjoint_axis(&tgt) {
        let (source_min, source_max) = src.interval(axis);
        let (target_min, target_max) = tgt.interval(axis);
        log::error!(
            "Grids {} and {} do not overlap in {} direction",
            source_name,
            target_name,
            axis
        );
        return Err(TransferError::NonOverlappingGrids {
            source_grid: source_name.to_string(),
            target_grid: target_name.to_string(),
            axis,
            source_min,
            source_max,
            target_min,
            target_max,
        });
    }
    Ok(())
}
