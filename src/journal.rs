// 📒 Edit Journal - audit trail of every write sent to the knowledge base
//
// "Every change is an event": each claim, qualifier, source block and new item
// is appended to a local SQLite table with a stable fingerprint, so a run can be
// audited (or compared to a previous run) without querying the remote service.

use crate::kb::{Binding, Claim, DataValue, Entity, ItemDraft, KbError, KnowledgeBase, Snak};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// EDIT EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditAction {
    CreateClaim,
    AddQualifier,
    AddSources,
    CreateItem,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditAction::CreateClaim => "create_claim",
            EditAction::AddQualifier => "add_qualifier",
            EditAction::AddSources => "add_sources",
            EditAction::CreateItem => "create_item",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "create_claim" => Some(EditAction::CreateClaim),
            "add_qualifier" => Some(EditAction::AddQualifier),
            "add_sources" => Some(EditAction::AddSources),
            "create_item" => Some(EditAction::CreateItem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEvent {
    pub event_id: String,
    pub recorded_at: DateTime<Utc>,
    pub pipeline: String,
    pub action: EditAction,
    pub entity_id: String,
    pub property: Option<String>,
    pub payload: serde_json::Value,
    pub fingerprint: String,
}

impl EditEvent {
    pub fn new(
        pipeline: &str,
        action: EditAction,
        entity_id: &str,
        property: Option<&str>,
        payload: serde_json::Value,
    ) -> Self {
        let fingerprint = fingerprint(entity_id, action, property, &payload);
        EditEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            pipeline: pipeline.to_string(),
            action,
            entity_id: entity_id.to_string(),
            property: property.map(String::from),
            payload,
            fingerprint,
        }
    }
}

/// SHA-256 over what was written, independent of when and by which run
pub fn fingerprint(
    entity_id: &str,
    action: EditAction,
    property: Option<&str>,
    payload: &serde_json::Value,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        entity_id,
        action.as_str(),
        property.unwrap_or_default(),
        payload
    ));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// JOURNAL STORE
// ============================================================================

pub struct Journal {
    conn: Connection,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open journal: {}", path.display()))?;
        // WAL keeps the journal readable while a run is appending to it
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::setup(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::setup(Connection::open_in_memory()?)
    }

    fn setup(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS edits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT UNIQUE NOT NULL,
                recorded_at TEXT NOT NULL,
                pipeline TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                property TEXT,
                payload TEXT NOT NULL,
                fingerprint TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edits_entity ON edits(entity_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edits_fingerprint ON edits(fingerprint)",
            [],
        )?;

        Ok(Journal { conn })
    }

    pub fn record(&self, event: &EditEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO edits (
                event_id, recorded_at, pipeline, action, entity_id, property, payload, fingerprint
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.event_id,
                event.recorded_at.to_rfc3339(),
                event.pipeline,
                event.action.as_str(),
                event.entity_id,
                event.property,
                serde_json::to_string(&event.payload)?,
                event.fingerprint,
            ],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM edits", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Has an identical write been recorded before (by any run)?
    pub fn contains_fingerprint(&self, fingerprint: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM edits WHERE fingerprint = ?1",
            params![fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Events for one entity, oldest first
    pub fn events_for_entity(&self, entity_id: &str) -> Result<Vec<EditEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, recorded_at, pipeline, action, entity_id, property, payload, fingerprint
             FROM edits
             WHERE entity_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (event_id, recorded_at, pipeline, action, entity_id, property, payload, fingerprint) in rows {
            events.push(EditEvent {
                event_id,
                recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                    .context("Bad timestamp in journal")?
                    .with_timezone(&Utc),
                pipeline,
                action: EditAction::parse(&action)
                    .with_context(|| format!("Unknown action in journal: {}", action))?,
                entity_id,
                property,
                payload: serde_json::from_str(&payload).context("Bad payload in journal")?,
                fingerprint,
            });
        }

        Ok(events)
    }
}

// ============================================================================
// JOURNALED CLIENT
// ============================================================================

/// Wraps a client and appends every successful write to a journal
pub struct JournaledKnowledgeBase<K> {
    inner: K,
    journal: Journal,
    pipeline: String,
}

impl<K: KnowledgeBase> JournaledKnowledgeBase<K> {
    pub fn new(inner: K, journal: Journal, pipeline: &str) -> Self {
        JournaledKnowledgeBase {
            inner,
            journal,
            pipeline: pipeline.to_string(),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }

    /// Journal a write that already went through; journal failures are logged, never returned
    fn log(
        &self,
        action: EditAction,
        entity_id: &str,
        property: Option<&str>,
        payload: serde_json::Value,
    ) {
        let event = EditEvent::new(&self.pipeline, action, entity_id, property, payload);

        if let Ok(true) = self.journal.contains_fingerprint(&event.fingerprint) {
            debug!(entity = %entity_id, action = action.as_str(), "same edit journaled by an earlier run");
        }

        if let Err(e) = self.journal.record(&event) {
            warn!(
                entity = %entity_id,
                action = action.as_str(),
                error = %e,
                "edit applied but not journaled"
            );
        }
    }
}

fn claim_entity(claim: &Claim) -> &str {
    claim.entity_id().unwrap_or_default()
}

impl<K: KnowledgeBase> KnowledgeBase for JournaledKnowledgeBase<K> {
    fn fetch(&self, id: &str) -> Result<Entity, KbError> {
        self.inner.fetch(id)
    }

    fn add_claim(
        &mut self,
        entity_id: &str,
        property: &str,
        value: &DataValue,
    ) -> Result<Claim, KbError> {
        let claim = self.inner.add_claim(entity_id, property, value)?;
        self.log(
            EditAction::CreateClaim,
            entity_id,
            Some(property),
            serde_json::json!({ "claim": claim.id, "value": value }),
        );
        Ok(claim)
    }

    fn add_qualifier(
        &mut self,
        claim: &Claim,
        property: &str,
        value: &DataValue,
    ) -> Result<(), KbError> {
        self.inner.add_qualifier(claim, property, value)?;
        self.log(
            EditAction::AddQualifier,
            claim_entity(claim),
            Some(property),
            serde_json::json!({ "claim": claim.id, "value": value }),
        );
        Ok(())
    }

    fn add_sources(&mut self, claim: &Claim, snaks: &[Snak]) -> Result<(), KbError> {
        self.inner.add_sources(claim, snaks)?;
        self.log(
            EditAction::AddSources,
            claim_entity(claim),
            Some(&claim.property),
            serde_json::json!({ "claim": claim.id, "snaks": snaks }),
        );
        Ok(())
    }

    fn query(&self, sparql: &str) -> Result<Vec<Binding>, KbError> {
        self.inner.query(sparql)
    }

    fn create_item(&mut self, draft: &ItemDraft) -> Result<String, KbError> {
        let id = self.inner.create_item(draft)?;
        let payload = serde_json::to_value(draft).unwrap_or_default();
        self.log(EditAction::CreateItem, &id, None, payload);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::InMemoryKnowledgeBase;

    #[test]
    fn test_record_and_read_back() {
        let journal = Journal::open_in_memory().unwrap();

        let event = EditEvent::new(
            "abundances",
            EditAction::CreateClaim,
            "Q1058",
            Some("P2374"),
            serde_json::json!({"amount": "+0.9893"}),
        );
        journal.record(&event).unwrap();

        assert_eq!(journal.count().unwrap(), 1);
        assert!(journal.contains_fingerprint(&event.fingerprint).unwrap());

        let events = journal.events_for_entity("Q1058").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, event.event_id);
        assert_eq!(events[0].action, EditAction::CreateClaim);
        assert_eq!(events[0].property.as_deref(), Some("P2374"));
        assert_eq!(events[0].payload["amount"], "+0.9893");
    }

    #[test]
    fn test_fingerprint_is_content_based() {
        let payload = serde_json::json!({"value": 1});
        let a = fingerprint("Q1", EditAction::AddSources, Some("P2374"), &payload);
        let b = fingerprint("Q1", EditAction::AddSources, Some("P2374"), &payload);
        let c = fingerprint("Q2", EditAction::AddSources, Some("P2374"), &payload);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_journaled_client_records_writes() {
        let inner = InMemoryKnowledgeBase::new().with_entity("Q1058");
        let journal = Journal::open_in_memory().unwrap();
        let mut kb = JournaledKnowledgeBase::new(inner, journal, "abundances");

        let claim = kb.add_claim("Q1058", "P2374", &DataValue::string("x")).unwrap();
        kb.add_qualifier(&claim, "P2571", &DataValue::item("Q159375")).unwrap();
        kb.add_sources(&claim, &[Snak::new("P248", DataValue::item("Q21234191"))])
            .unwrap();
        let item = kb.create_item(&ItemDraft::default()).unwrap();

        // Reads are not journaled
        kb.fetch("Q1058").unwrap();

        assert_eq!(kb.journal().count().unwrap(), 4);
        let actions: Vec<EditAction> = kb
            .journal()
            .events_for_entity("Q1058")
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![EditAction::CreateClaim, EditAction::AddQualifier, EditAction::AddSources]
        );
        assert_eq!(kb.journal().events_for_entity(&item).unwrap().len(), 1);
        assert_eq!(kb.inner().len(), 2);
    }

    #[test]
    fn test_journal_failure_does_not_interrupt_writes() {
        use crate::abundance::{AbundanceRecord, AbundanceSync};
        use crate::config::AbundanceSettings;
        use crate::properties::P_NATURAL_ABUNDANCE;

        let inner = InMemoryKnowledgeBase::new().with_entity("Q123");
        let journal = Journal::open_in_memory().unwrap();
        journal.conn.execute("DROP TABLE edits", []).unwrap();
        let mut kb = JournaledKnowledgeBase::new(inner, journal, "abundances");

        let row = AbundanceRecord {
            entity_id: "Q123".to_string(),
            value: 0.9926,
            uncertainty: 0.0008,
            name: "Carbon-12".to_string(),
            source_url: "http://example".to_string(),
            line: 1,
        };
        let report = AbundanceSync::new(&mut kb, &AbundanceSettings::default()).run(&[row]);

        assert_eq!(report.created(), 1);
        assert_eq!(report.failed(), 0);

        let claims = kb.inner().entity("Q123").unwrap().claims_for(P_NATURAL_ABUNDANCE);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].qualifiers.len(), 1);
        assert_eq!(claims[0].sources.len(), 1);
    }

    #[test]
    fn test_failed_write_is_not_journaled() {
        let journal = Journal::open_in_memory().unwrap();
        let mut kb = JournaledKnowledgeBase::new(InMemoryKnowledgeBase::new(), journal, "abundances");

        assert!(kb.add_claim("Q404", "P2374", &DataValue::string("x")).is_err());
        assert_eq!(kb.journal().count().unwrap(), 0);
    }
}
