//! Transfer of nodal scalar fields between independently generated 3D grids.
//!
//! Two simulation tools rarely discretize a domain the same way. This crate
//! maps every node of a target grid onto its nearest nodes in a source grid
//! (exact k-NN, optional distance cutoff), moves field values across that
//! correspondence by inverse-distance weighting, and measures the loss with a
//! source -> target -> source round trip.
//!
//! # Example
//!
//! ```
//! use grid_transfer::{CorrespondenceOptions, Grid, Registry};
//!
//! let mut a = Grid::from_nodes(vec![
//!     (0, [0.0, 0.0, 0.0]),
//!     (1, [1.0, 0.0, 0.0]),
//!     (2, [2.0, 0.0, 0.0]),
//! ])?;
//! a.set_field("v", vec![(0, 10.0), (1, 20.0), (2, 30.0)])?;
//! let b = Grid::from_nodes(vec![(0, [0.0, 0.0, 0.0]), (1, [1.5, 0.0, 0.0])])?;
//!
//! let mut registry = Registry::new();
//! registry.add_grid("a", a)?;
//! registry.add_grid("b", b)?;
//! registry.build_correspondence("a", "b", &CorrespondenceOptions::default().with_neighbors(2))?;
//! registry.transfer("a", "v", "b")?;
//!
//! let b = registry.grid("b")?;
//! assert_eq!(b.value(0, "v"), Some(10.0));
//! assert!((b.value(1, "v").unwrap() - 25.0).abs() < 1e-12);
//! # Ok::<(), grid_transfer::TransferError>(())
//! ```

pub mod constants;
pub mod correspondence;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod registry;
pub mod transition;
pub mod util;

pub use correspondence::{CorrespondenceBuilder, CorrespondenceOptions, CorrespondenceTable, Neighbor};
pub use diagnostics::{NeighborStatistics, RoundTripReport, SummaryStats};
pub use error::{Result, TransferError};
pub use grid::{FieldView, Grid, NodeId};
pub use registry::Registry;
pub use transition::TransferSummary;
