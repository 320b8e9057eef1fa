// 🌐 Knowledge-base client seam
//
// The pipelines only ever talk to a `KnowledgeBase`. The live Wikibase client,
// the in-memory store used in tests, and the dry-run / journal decorators all
// implement the same trait, so a run is wired up once in main and passed down
// by reference.

pub mod dry_run;
pub mod memory;
pub mod model;
pub mod wikibase;
pub mod wire;

pub use dry_run::DryRun;
pub use memory::InMemoryKnowledgeBase;
pub use model::{
    Binding, Claim, DataValue, Entity, ItemDraft, Quantity, QuantityError, Snak, SourceBlock,
    WbTime,
};
pub use wikibase::WikibaseClient;

#[derive(Debug, thiserror::Error)]
pub enum KbError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("entity not found: {0}")]
    MissingEntity(String),

    #[error("claim has not been saved (no statement id)")]
    UnsavedClaim,

    #[error("login failed: {0}")]
    Login(String),
}

/// Operations the sync pipelines need from a knowledge base.
///
/// Reads take `&self`; writes take `&mut self` since live clients hold
/// session state (edit tokens) that writes refresh.
pub trait KnowledgeBase {
    /// Fetch an entity with its labels and claims
    fn fetch(&self, id: &str) -> Result<Entity, KbError>;

    /// Add a claim to an entity and return it as saved (with statement id)
    fn add_claim(
        &mut self,
        entity_id: &str,
        property: &str,
        value: &DataValue,
    ) -> Result<Claim, KbError>;

    fn add_qualifier(
        &mut self,
        claim: &Claim,
        property: &str,
        value: &DataValue,
    ) -> Result<(), KbError>;

    /// Attach one new source block made of `snaks` to a claim
    fn add_sources(&mut self, claim: &Claim, snaks: &[Snak]) -> Result<(), KbError>;

    /// Run a SPARQL query and return its result bindings
    fn query(&self, sparql: &str) -> Result<Vec<Binding>, KbError>;

    /// Create a new item; returns its id
    fn create_item(&mut self, draft: &ItemDraft) -> Result<String, KbError>;
}

/// Statement id of a saved claim
pub(crate) fn statement_id(claim: &Claim) -> Result<&str, KbError> {
    claim.id.as_deref().ok_or(KbError::UnsavedClaim)
}
