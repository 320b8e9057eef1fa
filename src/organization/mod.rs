// ROR organization pipeline: registry → transformer → item creation

pub mod registry;
pub mod sync;
pub mod transform;

pub use registry::{
    load_code_map, read_code_map, read_records, short_ror_id, LinkColumns, OrganizationLink,
    OrganizationLocation, OrganizationName, OrganizationRecord, OrganizationRegistry,
};
pub use sync::{
    build_item_draft, is_in_knowledge_base, ror_lookup_query, ror_sources, sync_organizations,
    OrganizationReport, OrganizationSync,
};
pub use transform::{describe, LocalizedLabel, OrganizationBase, OrganizationError};
