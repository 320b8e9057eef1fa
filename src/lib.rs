// Claim Sync - Core Library
// Reconciles local datasets against a Wikibase knowledge base (CLI and tests)

pub mod abundance;     // Nuclide natural abundances (NuDat CSV)
pub mod config;
pub mod journal;       // SQLite audit trail of edits
pub mod kb;            // Knowledge-base client seam + implementations
pub mod organization;  // ROR organizations
pub mod properties;

// Re-export commonly used types
pub use abundance::{
    load_abundances, sync_abundances, AbundanceReconciler, AbundanceRecord, AbundanceReport,
    ClaimMatch,
};
pub use config::{AbundanceSettings, Credentials, KbSettings, OrganizationSettings, SyncConfig};
pub use journal::{EditAction, EditEvent, Journal, JournaledKnowledgeBase};
pub use kb::{DryRun, InMemoryKnowledgeBase, KbError, KnowledgeBase, WikibaseClient};
pub use organization::{
    sync_organizations, OrganizationBase, OrganizationError, OrganizationRegistry,
    OrganizationReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
