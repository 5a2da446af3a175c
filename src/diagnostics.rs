//! Descriptive statistics over correspondences and round-trip transfers.
//!
//! Everything here returns plain values; rendering is left to callers.

use serde::Serialize;

use crate::correspondence::CorrespondenceTable;
use crate::error::Result;
use crate::grid::Grid;
use crate::transition::{self, TransferSummary};

/// Count, mean, population standard deviation and range of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStats {
    /// Statistics of the finite values in `values`; `None` if there are none.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        // Welford's running mean / variance.
        let mut count = 0usize;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            count += 1;
            let delta = v - mean;
            mean += delta / count as f64;
            m2 += delta * (v - mean);
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            count,
            mean,
            std_dev: (m2 / count as f64).sqrt(),
            min,
            max,
        })
    }
}

/// Neighbor-distance statistics of one correspondence table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborStatistics {
    pub source_grid: String,
    pub target_grid: String,
    pub target_nodes: usize,
    /// Distances of all recorded neighbors, zero-distance matches excluded.
    pub distances: Option<SummaryStats>,
    /// Neighbor records at distance exactly 0.
    pub exact_matches: usize,
    /// Target nodes without any neighbor.
    pub lonely: usize,
}

/// Summarize `table` without modifying it.
pub fn statistics(table: &CorrespondenceTable) -> NeighborStatistics {
    let mut exact_matches = 0;
    let distances = table
        .iter()
        .filter_map(|(_, entry)| entry)
        .flatten()
        .filter_map(|n| {
            if n.distance > 0.0 {
                Some(n.distance)
            } else {
                exact_matches += 1;
                None
            }
        })
        .collect::<Vec<f64>>();

    NeighborStatistics {
        source_grid: table.source_grid().to_string(),
        target_grid: table.target_grid().to_string(),
        target_nodes: table.len(),
        distances: SummaryStats::from_values(distances),
        exact_matches,
        lonely: table.lonely_count(),
    }
}

impl NeighborStatistics {
    pub(crate) fn log(&self) {
        log::info!("Neighborhood {} -> {}", self.source_grid, self.target_grid);
        log::info!("\tTarget nodes: {}", self.target_nodes);
        match &self.distances {
            Some(d) => {
                log::info!("\tNumber of neighbors in total: {}", d.count);
                log::info!("\tMean: {}", d.mean);
                log::info!("\tStd. deviation: {}", d.std_dev);
                log::info!("\tMin: {}", d.min);
                log::info!("\tMax: {}", d.max);
            }
            None => log::info!("\tNo non-zero neighbor distances"),
        }
        log::info!("\tExact matches: {}", self.exact_matches);
        log::info!("\tLonely: {}", self.lonely);
    }
}

/// Loss measured by transferring a field source -> target -> source.
///
/// A report, not a verdict: callers apply their own tolerances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTripReport {
    pub field: String,
    pub source_grid: String,
    pub target_grid: String,
    pub source_nodes: usize,
    /// Source nodes holding the missing sentinel after the round trip.
    pub missing: usize,
    /// `|after - before|` over nodes where both are finite.
    pub abs_difference: Option<SummaryStats>,
    /// `|after / before|` over nodes where both are finite and `before != 0`.
    pub ratio: Option<SummaryStats>,
    pub forward: TransferSummary,
    pub backward: TransferSummary,
}

/// Compare the values of a field before and after the round trip.
fn compare(before: &[f64], after: &[f64]) -> (usize, Option<SummaryStats>, Option<SummaryStats>) {
    let missing = after.iter().filter(|v| v.is_nan()).count();
    let pairs = || {
        before
            .iter()
            .zip(after)
            .filter(|(b, a)| b.is_finite() && a.is_finite())
    };
    let abs_difference = SummaryStats::from_values(pairs().map(|(b, a)| (a - b).abs()));
    let ratio = SummaryStats::from_values(
        pairs()
            .filter(|(b, _)| **b != 0.0)
            .map(|(b, a)| (a / b).abs()),
    );
    (missing, abs_difference, ratio)
}

impl RoundTripReport {
    pub(crate) fn log(&self) {
        log::info!(
            "Round trip of '{}' {} -> {} -> {}",
            self.field,
            self.source_grid,
            self.target_grid,
            self.source_grid
        );
        log::info!("\tNaN values: {}", self.missing);
        if let Some(d) = &self.abs_difference {
            log::info!("\tMean difference: {}", d.mean);
            log::info!("\tStd. deviation: {}", d.std_dev);
        }
        if let Some(r) = &self.ratio {
            log::info!("\tMean match: {}", r.mean);
            log::info!("\tStd. deviation: {}", r.std_dev);
            log::info!("\tWorst match: {} / {}", r.min, r.max);
        }
    }
}

/// Round trip on two standalone grids, restoring the source field afterwards.
///
/// `forward` must map `source` onto `target`, `backward` the reverse.
pub fn round_trip(
    source: &mut Grid,
    field: &str,
    target: &mut Grid,
    forward: &CorrespondenceTable,
    backward: &CorrespondenceTable,
) -> Result<RoundTripReport> {
    let snapshot = source.snapshot_field(field);
    let before = source.get_field(field)?.to_dense();

    let result: Result<(TransferSummary, TransferSummary)> = (|| {
        let forward_summary = transition::transfer(source, field, target, forward)?;
        let backward_summary = transition::transfer(target, field, source, backward)?;
        Ok((forward_summary, backward_summary))
    })();

    let after = source.get_field(field).map(|v| v.to_dense());
    source.restore_field(field, snapshot);
    let (forward_summary, backward_summary) = result?;
    let after = after?;

    let (missing, abs_difference, ratio) = compare(&before, &after);
    let report = RoundTripReport {
        field: field.to_string(),
        source_grid: forward.source_grid().to_string(),
        target_grid: forward.target_grid().to_string(),
        source_nodes: before.len(),
        missing,
        abs_difference,
        ratio,
        forward: forward_summary,
        backward: backward_summary,
    };
    report.log();
    Ok(report)
}
