// Nuclide natural-abundance pipeline: CSV loader → reconciler → writer

pub mod loader;
pub mod reconcile;
pub mod sync;

pub use loader::{load_abundances, parse_uncertainty, read_abundances, AbundanceRecord};
pub use reconcile::{has_required_sources, AbundanceReconciler, ClaimMatch, EPSILON};
pub use sync::{nudat_sources, sync_abundances, AbundanceReport, AbundanceSync, RowOutcome, RowResult};
