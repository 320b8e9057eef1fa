// 🧪 In-memory knowledge base
// Holds entities in a map and applies writes to them directly.
// Used by tests and for replaying a run offline against a known fixture.

use super::model::{Binding, Claim, DataValue, Entity, ItemDraft, Snak, SourceBlock};
use super::{statement_id, KbError, KnowledgeBase};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct InMemoryKnowledgeBase {
    entities: BTreeMap<String, Entity>,

    /// Canned SPARQL answers keyed by exact query text
    query_results: HashMap<String, Vec<Binding>>,

    /// Next numeric id handed out by `create_item`
    next_item: u64,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        InMemoryKnowledgeBase {
            next_item: 1_000_000,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Builder: register an entity with no claims
    pub fn with_entity(mut self, id: &str) -> Self {
        self.insert(Entity::new(id));
        self
    }

    /// Builder: answer `sparql` with `rows`
    pub fn with_query_result(mut self, sparql: &str, rows: Vec<Binding>) -> Self {
        self.query_results.insert(sparql.to_string(), rows);
        self
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn saved_claim_mut(&mut self, claim: &Claim) -> Result<&mut Claim, KbError> {
        let guid = statement_id(claim)?;
        let entity_id = claim.entity_id().ok_or(KbError::UnsavedClaim)?;

        self.entities
            .get_mut(entity_id)
            .ok_or_else(|| KbError::MissingEntity(entity_id.to_string()))?
            .claims
            .values_mut()
            .flatten()
            .find(|c| c.id.as_deref() == Some(guid))
            .ok_or_else(|| KbError::Api {
                code: "no-such-claim".to_string(),
                info: format!("Could not find a claim with GUID {}", guid),
            })
    }

    fn allocate_item_id(&mut self) -> String {
        loop {
            let id = format!("Q{}", self.next_item);
            self.next_item += 1;
            if !self.entities.contains_key(&id) {
                return id;
            }
        }
    }
}

fn new_guid(entity_id: &str) -> String {
    format!("{}${}", entity_id, uuid::Uuid::new_v4().to_string().to_uppercase())
}

impl KnowledgeBase for InMemoryKnowledgeBase {
    fn fetch(&self, id: &str) -> Result<Entity, KbError> {
        self.entities
            .get(id)
            .cloned()
            .ok_or_else(|| KbError::MissingEntity(id.to_string()))
    }

    fn add_claim(
        &mut self,
        entity_id: &str,
        property: &str,
        value: &DataValue,
    ) -> Result<Claim, KbError> {
        let entity = self
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| KbError::MissingEntity(entity_id.to_string()))?;

        let mut claim = Claim::new(property, value.clone());
        claim.id = Some(new_guid(entity_id));

        entity
            .claims
            .entry(property.to_string())
            .or_default()
            .push(claim.clone());

        Ok(claim)
    }

    fn add_qualifier(
        &mut self,
        claim: &Claim,
        property: &str,
        value: &DataValue,
    ) -> Result<(), KbError> {
        self.saved_claim_mut(claim)?
            .qualifiers
            .push(Snak::new(property, value.clone()));
        Ok(())
    }

    fn add_sources(&mut self, claim: &Claim, snaks: &[Snak]) -> Result<(), KbError> {
        self.saved_claim_mut(claim)?
            .sources
            .push(SourceBlock::new(snaks.to_vec()));
        Ok(())
    }

    fn query(&self, sparql: &str) -> Result<Vec<Binding>, KbError> {
        Ok(self.query_results.get(sparql).cloned().unwrap_or_default())
    }

    fn create_item(&mut self, draft: &ItemDraft) -> Result<String, KbError> {
        let id = self.allocate_item_id();
        let mut entity = Entity::new(&id);
        entity.labels = draft.labels.clone();
        entity.descriptions = draft.descriptions.clone();
        entity.aliases = draft.aliases.clone();

        for claim in &draft.claims {
            let mut saved = claim.clone();
            saved.id = Some(new_guid(&id));
            entity
                .claims
                .entry(saved.property.clone())
                .or_default()
                .push(saved);
        }

        self.insert(entity);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_claim_qualifier_and_sources() {
        let mut kb = InMemoryKnowledgeBase::new().with_entity("Q1058");

        let claim = kb
            .add_claim("Q1058", "P2374", &DataValue::string("x"))
            .unwrap();
        assert_eq!(claim.entity_id(), Some("Q1058"));

        kb.add_qualifier(&claim, "P2571", &DataValue::item("Q159375")).unwrap();
        kb.add_sources(&claim, &[Snak::new("P248", DataValue::item("Q21234191"))])
            .unwrap();

        let stored = &kb.entity("Q1058").unwrap().claims_for("P2374")[0];
        assert_eq!(stored.qualifiers.len(), 1);
        assert_eq!(stored.sources.len(), 1);
        assert!(stored.sources[0].has_property("P248"));
    }

    #[test]
    fn test_missing_entity_and_unsaved_claim() {
        let mut kb = InMemoryKnowledgeBase::new();

        assert!(matches!(kb.fetch("Q1"), Err(KbError::MissingEntity(_))));
        assert!(matches!(
            kb.add_claim("Q1", "P31", &DataValue::item("Q5")),
            Err(KbError::MissingEntity(_))
        ));

        let unsaved = Claim::new("P31", DataValue::item("Q5"));
        assert!(matches!(
            kb.add_qualifier(&unsaved, "P580", &DataValue::string("x")),
            Err(KbError::UnsavedClaim)
        ));
    }

    #[test]
    fn test_create_item_and_canned_query() {
        let mut kb = InMemoryKnowledgeBase::new().with_query_result(
            "SELECT 1",
            vec![Binding::from([("item".to_string(), "Q5".to_string())])],
        );

        let mut draft = ItemDraft::default();
        draft.labels.insert("en".into(), "Example".into());
        draft.descriptions.insert("en".into(), "organization".into());
        draft.aliases.insert("en".into(), vec!["EX".into()]);
        draft.claims.push(Claim::new("P31", DataValue::item("Q43229")));

        let first = kb.create_item(&draft).unwrap();
        let second = kb.create_item(&draft).unwrap();
        assert_ne!(first, second);
        assert_eq!(kb.len(), 2);
        let created = kb.fetch(&first).unwrap();
        assert_eq!(created.labels["en"], "Example");
        assert_eq!(created.descriptions["en"], "organization");
        assert_eq!(created.aliases["en"], vec!["EX"]);
        assert!(kb.fetch(&first).unwrap().claims_for("P31")[0].id.is_some());

        assert_eq!(kb.query("SELECT 1").unwrap().len(), 1);
        assert!(kb.query("SELECT 2").unwrap().is_empty());
    }
}
