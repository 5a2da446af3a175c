//! Named grids plus cached correspondences between them.
//!
//! Cached tables are keyed by `(source, target)`. Replacing or removing a grid
//! evicts every table that names it on either side, so a transfer can never
//! run on a table built for a previous version of a grid.

use std::collections::BTreeMap;
use std::fmt;

use crate::correspondence::{CorrespondenceBuilder, CorrespondenceOptions, CorrespondenceTable};
use crate::diagnostics::{self, NeighborStatistics, RoundTripReport};
use crate::error::{Result, TransferError};
use crate::grid::{Grid, NodeId};
use crate::transition::{self, TransferSummary};

type PairKey = (String, String);

/// Owner of named grids and their correspondence cache.
#[derive(Debug, Default)]
pub struct Registry {
    grids: BTreeMap<String, Grid>,
    correspondences: BTreeMap<PairKey, CorrespondenceTable>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `grid` under a new name.
    pub fn add_grid(&mut self, name: &str, grid: Grid) -> Result<()> {
        if name.is_empty() {
            return Err(TransferError::InvalidInput("grid name must not be empty".into()));
        }
        if self.grids.contains_key(name) {
            return Err(TransferError::DuplicateGrid(name.to_string()));
        }
        log::debug!("Grid added successfully ({}, {} nodes)", name, grid.len());
        self.grids.insert(name.to_string(), grid);
        Ok(())
    }

    /// Replace the grid registered as `name`, returning the old one.
    pub fn update_grid(&mut self, name: &str, grid: Grid) -> Result<Grid> {
        let old = self.remove_grid(name)?;
        log::debug!("Grid deleted for update ({})", name);
        self.add_grid(name, grid)?;
        Ok(old)
    }

    /// Unregister `name` and drop every correspondence involving it.
    pub fn remove_grid(&mut self, name: &str) -> Result<Grid> {
        let grid = self.grids.remove(name).ok_or_else(|| unknown_grid(name))?;
        let evicted = self.evict_grid_correspondences(name);
        if evicted > 0 {
            log::debug!("Evicted {} correspondence(s) involving {}", evicted, name);
        }
        Ok(grid)
    }

    pub fn grid(&self, name: &str) -> Result<&Grid> {
        self.grids.get(name).ok_or_else(|| unknown_grid(name))
    }

    /// Assign values of `field` on a registered grid.
    ///
    /// Only field values change, so cached correspondences stay valid.
    pub fn set_field<I>(&mut self, grid: &str, field: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (NodeId, f64)>,
    {
        self.grids
            .get_mut(grid)
            .ok_or_else(|| unknown_grid(grid))?
            .set_field(field, values)
    }

    /// Assign one value of `field` on a registered grid.
    pub fn set_value(&mut self, grid: &str, id: NodeId, field: &str, value: f64) -> Result<()> {
        self.grids
            .get_mut(grid)
            .ok_or_else(|| unknown_grid(grid))?
            .set_value(id, field, value)
    }

    pub fn contains_grid(&self, name: &str) -> bool {
        self.grids.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn grid_names(&self) -> impl Iterator<Item = &str> {
        self.grids.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Build (or rebuild) and cache the correspondence from `source` to `target`.
    ///
    /// On error nothing is cached and any previous table for the pair is kept.
    pub fn build_correspondence(
        &mut self,
        source: &str,
        target: &str,
        options: &CorrespondenceOptions,
    ) -> Result<&CorrespondenceTable> {
        let table = CorrespondenceBuilder::new(*options).build(
            source,
            self.grid(source)?,
            target,
            self.grid(target)?,
        )?;
        self.correspondences.insert(pair_key(source, target), table);
        self.correspondence(source, target)
    }

    /// Cached table for `(source, target)`.
    pub fn correspondence(&self, source: &str, target: &str) -> Result<&CorrespondenceTable> {
        self.correspondences
            .get(&pair_key(source, target))
            .ok_or_else(|| missing_correspondence(source, target))
    }

    pub fn has_correspondence(&self, source: &str, target: &str) -> bool {
        self.correspondences.contains_key(&pair_key(source, target))
    }

    /// Drop one cached table, returning it if it existed.
    pub fn evict_correspondence(&mut self, source: &str, target: &str) -> Option<CorrespondenceTable> {
        self.correspondences.remove(&pair_key(source, target))
    }

    pub fn clear_correspondences(&mut self) {
        self.correspondences.clear();
    }

    fn evict_grid_correspondences(&mut self, name: &str) -> usize {
        let before = self.correspondences.len();
        self.correspondences
            .retain(|(source, target), _| source != name && target != name);
        before - self.correspondences.len()
    }

    /// Interpolate `field` from `source` onto `target` using the cached table.
    pub fn transfer(&mut self, source: &str, field: &str, target: &str) -> Result<TransferSummary> {
        let source_grid = self.grids.get(source).ok_or_else(|| unknown_grid(source))?;
        if !self.grids.contains_key(target) {
            return Err(unknown_grid(target));
        }
        let table = self
            .correspondences
            .get(&pair_key(source, target))
            .ok_or_else(|| missing_correspondence(source, target))?;

        let interpolation = transition::interpolate(source_grid, field, table)?;
        let target_grid = self.grids.get_mut(target).ok_or_else(|| unknown_grid(target))?;
        transition::apply(target_grid, field, table, interpolation)
    }

    /// Neighbor statistics of the cached `(source, target)` table.
    pub fn statistics(&self, source: &str, target: &str) -> Result<NeighborStatistics> {
        let stats = diagnostics::statistics(self.correspondence(source, target)?);
        stats.log();
        Ok(stats)
    }

    /// Statistics of every cached table targeting `target`, by source name.
    pub fn grid_statistics(&self, target: &str) -> Result<Vec<NeighborStatistics>> {
        let grid = self.grid(target)?;
        log::info!("Statistics for {} ({} nodes)", target, grid.len());
        let stats: Vec<NeighborStatistics> = self
            .correspondences
            .iter()
            .filter(|((_, t), _)| t == target)
            .map(|(_, table)| diagnostics::statistics(table))
            .collect();
        for s in &stats {
            s.log();
        }
        log::info!("End of statistics");
        Ok(stats)
    }

    /// Strict round trip `source -> target -> source` for `field`.
    ///
    /// Both directions must already have cached tables. The source field is
    /// restored afterwards; the target keeps the forward-transferred values.
    pub fn try_round_trip(&mut self, source: &str, field: &str, target: &str) -> Result<RoundTripReport> {
        if source == target {
            return Err(TransferError::InvalidInput(format!(
                "round trip of '{}' needs two distinct grids",
                source
            )));
        }
        let forward = self
            .correspondences
            .get(&pair_key(source, target))
            .ok_or_else(|| missing_correspondence(source, target))?;
        let backward = self
            .correspondences
            .get(&pair_key(target, source))
            .ok_or_else(|| missing_correspondence(target, source))?;

        // Both grids are mutated, so take them out of the map for the duration.
        let mut source_grid = self.grids.remove(source).ok_or_else(|| unknown_grid(source))?;
        let Some(mut target_grid) = self.grids.remove(target) else {
            self.grids.insert(source.to_string(), source_grid);
            return Err(unknown_grid(target));
        };
        let result = diagnostics::round_trip(&mut source_grid, field, &mut target_grid, forward, backward);
        self.grids.insert(source.to_string(), source_grid);
        self.grids.insert(target.to_string(), target_grid);
        result
    }

    /// Best-effort round trip: failures are logged and reported as `None`.
    pub fn validate_round_trip(&mut self, source: &str, field: &str, target: &str) -> Option<RoundTripReport> {
        match self.try_round_trip(source, field, target) {
            Ok(report) => Some(report),
            Err(err) => {
                log::error!("Execution aborted! [{}]", err);
                None
            }
        }
    }
}

fn pair_key(source: &str, target: &str) -> PairKey {
    (source.to_string(), target.to_string())
}

fn unknown_grid(name: &str) -> TransferError {
    TransferError::UnknownGrid(name.to_string())
}

fn missing_correspondence(source: &str, target: &str) -> TransferError {
    TransferError::MissingCorrespondence {
        source_grid: source.to_string(),
        target_grid: target.to_string(),
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry contains {} grids", self.grids.len())?;
        if self.grids.is_empty() {
            return Ok(());
        }
        f.write_str(":")?;
        for name in self.grids.keys() {
            let mapped = self.correspondences.keys().any(|(_, t)| t == name);
            if mapped {
                write!(f, " {} (correspondence available);", name)?;
            } else {
                write!(f, " {};", name)?;
            }
        }
        Ok(())
    }
}
