// 🫥 Dry-run decorator
// Reads go to the wrapped client; writes are logged and answered locally.

use super::model::{Binding, Claim, DataValue, Entity, ItemDraft, Snak};
use super::{KbError, KnowledgeBase};
use tracing::info;

pub struct DryRun<K> {
    inner: K,
    writes: usize,
}

impl<K: KnowledgeBase> DryRun<K> {
    pub fn new(inner: K) -> Self {
        DryRun { inner, writes: 0 }
    }

    /// Number of writes that were suppressed
    pub fn suppressed_writes(&self) -> usize {
        self.writes
    }

    pub fn into_inner(self) -> K {
        self.inner
    }
}

impl<K: KnowledgeBase> KnowledgeBase for DryRun<K> {
    fn fetch(&self, id: &str) -> Result<Entity, KbError> {
        self.inner.fetch(id)
    }

    fn add_claim(
        &mut self,
        entity_id: &str,
        property: &str,
        value: &DataValue,
    ) -> Result<Claim, KbError> {
        self.writes += 1;
        info!(entity = entity_id, property, ?value, "dry run: would add claim");

        let mut claim = Claim::new(property, value.clone());
        claim.id = Some(format!("{}$dry-run-{}", entity_id, self.writes));
        Ok(claim)
    }

    fn add_qualifier(
        &mut self,
        claim: &Claim,
        property: &str,
        value: &DataValue,
    ) -> Result<(), KbError> {
        self.writes += 1;
        info!(claim = ?claim.id, property, ?value, "dry run: would add qualifier");
        Ok(())
    }

    fn add_sources(&mut self, claim: &Claim, snaks: &[Snak]) -> Result<(), KbError> {
        self.writes += 1;
        info!(claim = ?claim.id, snaks = snaks.len(), "dry run: would add sources");
        Ok(())
    }

    fn query(&self, sparql: &str) -> Result<Vec<Binding>, KbError> {
        self.inner.query(sparql)
    }

    fn create_item(&mut self, draft: &ItemDraft) -> Result<String, KbError> {
        self.writes += 1;
        info!(labels = ?draft.labels, claims = draft.claims.len(), "dry run: would create item");
        Ok(format!("dry-run-{}", self.writes))
    }
}
