//! Inverse-distance-weighted transfer of a field across a correspondence.
//!
//! Per target node:
//! - lonely entry: the missing-value sentinel (NaN)
//! - any neighbor at distance exactly 0: that neighbor's value, unweighted
//! - otherwise: `sum(v_i / d_i) / sum(1 / d_i)`
//!
//! The weighted case is a convex combination, so the result stays within the
//! range of the neighbor values. Unassigned source values read as NaN.

use serde::Serialize;

use crate::constants::MISSING_VALUE;
use crate::correspondence::{CorrespondenceTable, Neighbor};
use crate::error::{Result, TransferError};
use crate::grid::{FieldView, Grid};
use crate::util::Timed;

/// How the target nodes of one transfer were filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    /// Nodes that copied a coincident source value.
    pub exact_matches: usize,
    /// Nodes that received a weighted average.
    pub weighted: usize,
    /// Nodes set to the missing sentinel for lack of neighbors.
    pub lonely: usize,
}

impl TransferSummary {
    pub fn total(&self) -> usize {
        self.exact_matches + self.weighted + self.lonely
    }
}

/// Interpolated values for every target node of a table, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation {
    pub values: Vec<f64>,
    pub summary: TransferSummary,
}

/// Compute target values for `field` without touching any grid.
pub fn interpolate(source: &Grid, field: &str, table: &CorrespondenceTable) -> Result<Interpolation> {
    let values = source.get_field(field)?;
    let mut summary = TransferSummary::default();
    let mut out = Vec::with_capacity(table.len());

    for (target, entry) in table.iter() {
        let value = match entry.filter(|list| !list.is_empty()) {
            None => {
                summary.lonely += 1;
                MISSING_VALUE
            }
            Some(list) => {
                let (value, exact) = weighted_value(list, &values).ok_or_else(|| {
                    TransferError::StaleCorrespondence {
                        source_grid: table.source_grid().to_string(),
                        target_grid: table.target_grid().to_string(),
                        reason: format!(
                            "a neighbor of target node {} is not in the source grid",
                            target
                        ),
                    }
                })?;
                if exact {
                    summary.exact_matches += 1;
                } else {
                    summary.weighted += 1;
                }
                value
            }
        };
        out.push(value);
    }

    Ok(Interpolation {
        values: out,
        summary,
    })
}

/// Value for one non-empty neighbor list plus whether it was an exact match.
/// `None` if a neighbor id is unknown to the source field.
fn weighted_value(neighbors: &[Neighbor], values: &FieldView<'_>) -> Option<(f64, bool)> {
    let source_value = |n: &Neighbor| -> Option<f64> {
        let raw = values.values();
        let i = values.index_of(n.source)?;
        Some(raw[i].unwrap_or(MISSING_VALUE))
    };

    if let Some(hit) = neighbors.iter().find(|n| n.distance == 0.0) {
        return Some((source_value(hit)?, true));
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for n in neighbors {
        let weight = 1.0 / n.distance;
        weighted_sum += weight * source_value(n)?;
        weight_total += weight;
    }
    Some((weighted_sum / weight_total, false))
}

/// Transfer `field` from `source` onto `target` through `table`.
///
/// `table` must have been built for exactly this target node set. After
/// writing, every target node is checked for an assigned value.
pub fn transfer(
    source: &Grid,
    field: &str,
    target: &mut Grid,
    table: &CorrespondenceTable,
) -> Result<TransferSummary> {
    let _t = Timed::debug(format!(
        "Transfer '{}' {} -> {}",
        field,
        table.source_grid(),
        table.target_grid()
    ));
    ensure_covers(table, target)?;
    let interpolation = interpolate(source, field, table)?;
    apply(target, field, table, interpolation)
}

/// Check that `table` was built for the node set currently in `target`.
pub(crate) fn ensure_covers(table: &CorrespondenceTable, target: &Grid) -> Result<()> {
    if table.target_ids() == target.node_ids() {
        return Ok(());
    }
    Err(TransferError::StaleCorrespondence {
        source_grid: table.source_grid().to_string(),
        target_grid: table.target_grid().to_string(),
        reason: format!(
            "table covers {} target nodes, grid has {} (or their order differs)",
            table.len(),
            target.len()
        ),
    })
}

/// Write precomputed values into `target` and verify completeness.
pub(crate) fn apply(
    target: &mut Grid,
    field: &str,
    table: &CorrespondenceTable,
    interpolation: Interpolation,
) -> Result<TransferSummary> {
    ensure_covers(table, target)?;
    let column = target.column_mut(field);
    for (slot, value) in column.iter_mut().zip(interpolation.values) {
        *slot = Some(value);
    }

    if let Err(err) = target.check_completeness(field) {
        log::error!(
            "Transfer of '{}' from {} to {} left nodes unassigned: {}",
            field,
            table.source_grid(),
            table.target_grid(),
            err
        );
        return Err(err);
    }

    let summary = interpolation.summary;
    log::info!(
        "Transition for {} from {} to {} successful ({} exact, {} weighted, {} lonely)",
        field,
        table.source_grid(),
        table.target_grid(),
        summary.exact_matches,
        summary.weighted,
        summary.lonely
    );
    Ok(summary)
}
