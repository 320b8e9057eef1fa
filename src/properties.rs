// 🏷️ Knowledge-base identifiers
// Property and item ids as they exist on live Wikidata

// ============================================================================
// PROPERTIES
// ============================================================================

/// natural abundance
pub const P_NATURAL_ABUNDANCE: &str = "P2374";

/// stated in
pub const P_STATED_IN: &str = "P248";

/// reference URL
pub const P_REFERENCE_URL: &str = "P854";

/// retrieved
pub const P_RETRIEVED: &str = "P813";

/// edition number
pub const P_EDITION: &str = "P393";

/// uncertainty corresponds to
pub const P_UNCERTAINTY_CORRESPONDS_TO: &str = "P2571";

pub const P_INSTANCE_OF: &str = "P31";
pub const P_COUNTRY: &str = "P17";
pub const P_INCEPTION: &str = "P571";
pub const P_OFFICIAL_WEBSITE: &str = "P856";

/// ROR ID (external identifier)
pub const P_ROR_ID: &str = "P6782";

// ============================================================================
// ITEMS
// ============================================================================

/// NuDat (NNDC nuclear data database)
pub const Q_NUDAT: &str = "Q21234191";

/// standard deviation
pub const Q_STANDARD_DEVIATION: &str = "Q159375";

/// Research Organization Registry
pub const Q_ROR: &str = "Q63565260";
