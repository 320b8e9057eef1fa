// 🧪 Abundance Sync - push NNDC abundance measurements into the knowledge base
//
// For each CSV row:
//   1. fetch the nuclide entity
//   2. look for a claim with the same value ± uncertainty
//   3a. none → create claim + standard-deviation qualifier + full provenance
//   3b. found → append provenance if no source block already cites it
//
// A failing row is logged and counted; the batch always runs to the end.

use super::loader::{load_abundances, AbundanceRecord};
use super::reconcile::{has_required_sources, AbundanceReconciler, ClaimMatch};
use crate::config::AbundanceSettings;
use crate::kb::{DataValue, KbError, KnowledgeBase, Quantity, Snak, WbTime};
use crate::properties::*;
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// ROW OUTCOMES & REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowOutcome {
    /// New claim created with qualifier and provenance
    Created {
        claim_id: Option<String>,
        /// Existing claims were present but could not be inspected
        replaced_malformed: bool,
    },

    /// Matching claim found; a provenance block was appended
    SourcesAdded { claim_id: Option<String> },

    /// Matching claim found and already sourced; nothing written
    AlreadySourced { claim_id: Option<String> },

    /// The row could not be processed
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowResult {
    pub entity_id: String,
    pub line: usize,
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbundanceReport {
    pub results: Vec<RowResult>,
}

impl AbundanceReport {
    pub fn rows(&self) -> usize {
        self.results.len()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Created { .. }))
    }

    pub fn sources_added(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::SourcesAdded { .. }))
    }

    pub fn already_sourced(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::AlreadySourced { .. }))
    }

    pub fn malformed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                RowOutcome::Created {
                    replaced_malformed: true,
                    ..
                }
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&RowOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} created ({} beside malformed claims), {} sources added, {} already sourced, {} failed",
            self.rows(),
            self.created(),
            self.malformed(),
            self.sources_added(),
            self.already_sourced(),
            self.failed()
        )
    }
}

// ============================================================================
// PROVENANCE BLOCKS
// ============================================================================

/// Source snaks citing NuDat for one row. `retrieved` adds the retrieval date.
pub fn nudat_sources(edition: &str, source_url: &str, retrieved: Option<NaiveDate>) -> Vec<Snak> {
    let mut snaks = vec![
        Snak::new(P_STATED_IN, DataValue::item(Q_NUDAT)),
        Snak::new(P_EDITION, DataValue::string(edition)),
        Snak::new(P_REFERENCE_URL, DataValue::string(source_url)),
    ];
    if let Some(date) = retrieved {
        snaks.push(Snak::new(P_RETRIEVED, DataValue::Time(WbTime::from_date(date))));
    }
    snaks
}

// ============================================================================
// SYNC ENGINE
// ============================================================================

pub struct AbundanceSync<'a, K: KnowledgeBase> {
    kb: &'a mut K,
    reconciler: AbundanceReconciler,
    edition: String,
    retrieved: NaiveDate,
}

impl<'a, K: KnowledgeBase> AbundanceSync<'a, K> {
    pub fn new(kb: &'a mut K, settings: &AbundanceSettings) -> Self {
        AbundanceSync {
            kb,
            reconciler: AbundanceReconciler::new(),
            edition: settings.edition.clone(),
            retrieved: settings.retrieved,
        }
    }

    /// Process every record; never stops early
    pub fn run(&mut self, records: &[AbundanceRecord]) -> AbundanceReport {
        let mut report = AbundanceReport::default();

        for record in records {
            let outcome = match self.process_record(record) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(entity = %record.entity_id, line = record.line, error = %e, "row failed");
                    RowOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            report.results.push(RowResult {
                entity_id: record.entity_id.clone(),
                line: record.line,
                outcome,
            });
        }

        info!("{}", report.summary());
        report
    }

    pub fn process_record(&mut self, record: &AbundanceRecord) -> Result<RowOutcome, KbError> {
        let entity = self.kb.fetch(&record.entity_id)?;

        let found = self.reconciler.find_matching_claim(
            &entity,
            P_NATURAL_ABUNDANCE,
            record.value,
            record.uncertainty,
        );

        match found {
            ClaimMatch::Matched(claim) => {
                let required = nudat_sources(&self.edition, &record.source_url, None);
                if has_required_sources(&claim, &required) {
                    return Ok(RowOutcome::AlreadySourced { claim_id: claim.id });
                }

                info!(entity = %record.entity_id, url = %record.source_url, "adding source to existing claim");
                let sources = nudat_sources(&self.edition, &record.source_url, Some(self.retrieved));
                self.kb.add_sources(&claim, &sources)?;
                Ok(RowOutcome::SourcesAdded { claim_id: claim.id })
            }
            ClaimMatch::NotMatched => self.create_claim(record, false),
            ClaimMatch::Malformed { claim_id, reason } => {
                warn!(
                    entity = %record.entity_id,
                    claim = ?claim_id,
                    reason = %reason,
                    "existing claim could not be checked, treating as no match"
                );
                self.create_claim(record, true)
            }
        }
    }

    fn create_claim(
        &mut self,
        record: &AbundanceRecord,
        replaced_malformed: bool,
    ) -> Result<RowOutcome, KbError> {
        info!(
            "New entry: {}±{} for {} ({})",
            record.value, record.uncertainty, record.entity_id, record.name
        );

        let value = DataValue::Quantity(Quantity::with_symmetric_error(
            record.value,
            record.uncertainty,
        ));
        let claim = self
            .kb
            .add_claim(&record.entity_id, P_NATURAL_ABUNDANCE, &value)?;

        self.kb.add_qualifier(
            &claim,
            P_UNCERTAINTY_CORRESPONDS_TO,
            &DataValue::item(Q_STANDARD_DEVIATION),
        )?;

        let sources = nudat_sources(&self.edition, &record.source_url, Some(self.retrieved));
        self.kb.add_sources(&claim, &sources)?;

        Ok(RowOutcome::Created {
            claim_id: claim.id,
            replaced_malformed,
        })
    }
}

/// Load the configured CSV and sync every row against `kb`
pub fn sync_abundances<K: KnowledgeBase>(
    kb: &mut K,
    settings: &AbundanceSettings,
) -> Result<AbundanceReport> {
    let records = load_abundances(&settings.csv_path)?;
    info!("Loaded {} abundance rows from {}", records.len(), settings.csv_path.display());

    let mut sync = AbundanceSync::new(kb, settings);
    Ok(sync.run(&records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::{Claim, Entity, InMemoryKnowledgeBase, SourceBlock};
    use std::io::Write;

    fn record(entity_id: &str, value: f64, uncertainty: f64, url: &str) -> AbundanceRecord {
        AbundanceRecord {
            entity_id: entity_id.to_string(),
            value,
            uncertainty,
            name: "Carbon-12".to_string(),
            source_url: url.to_string(),
            line: 1,
        }
    }

    fn settings() -> AbundanceSettings {
        AbundanceSettings::default()
    }

    fn entity_with_claim(id: &str, claim: Claim) -> Entity {
        let mut entity = Entity::new(id);
        entity
            .claims
            .insert(P_NATURAL_ABUNDANCE.to_string(), vec![claim]);
        entity
    }

    fn existing_claim(entity_id: &str, value: f64, uncertainty: f64) -> Claim {
        let mut claim = Claim::new(
            P_NATURAL_ABUNDANCE,
            DataValue::Quantity(Quantity::with_symmetric_error(value, uncertainty)),
        );
        claim.id = Some(format!("{}$EXISTING", entity_id));
        claim
    }

    #[test]
    fn test_new_claim_with_qualifier_and_full_provenance() {
        let mut kb = InMemoryKnowledgeBase::new().with_entity("Q123");
        let settings = settings();

        let report = AbundanceSync::new(&mut kb, &settings)
            .run(&[record("Q123", 0.9926, 0.0008, "http://example")]);

        assert_eq!(report.created(), 1);
        assert_eq!(report.failed(), 0);

        let claims = kb.entity("Q123").unwrap().claims_for(P_NATURAL_ABUNDANCE);
        assert_eq!(claims.len(), 1);

        let quantity = claims[0].value.as_ref().and_then(DataValue::as_quantity).unwrap();
        assert_eq!(quantity.amount, "+0.9926");
        assert_eq!(quantity.lower_bound.as_deref(), Some("+0.9918"));
        assert_eq!(quantity.upper_bound.as_deref(), Some("+0.9934"));

        assert_eq!(
            claims[0].qualifiers,
            vec![Snak::new(P_UNCERTAINTY_CORRESPONDS_TO, DataValue::item(Q_STANDARD_DEVIATION))]
        );

        assert_eq!(claims[0].sources.len(), 1);
        let source = &claims[0].sources[0];
        let properties: Vec<&str> = source.snaks.iter().map(|s| s.property.as_str()).collect();
        assert_eq!(properties, vec![P_STATED_IN, P_EDITION, P_REFERENCE_URL, P_RETRIEVED]);
        assert_eq!(
            source.snaks[3].value,
            Some(DataValue::Time(WbTime::from_date(settings.retrieved)))
        );

        println!("✅ {}", report.summary());
    }

    #[test]
    fn test_matching_claim_gets_sources_once() {
        let mut kb = InMemoryKnowledgeBase::new();
        kb.insert(entity_with_claim("Q1058", existing_claim("Q1058", 0.9893, 0.0008)));
        let settings = settings();
        let rows = [record("Q1058", 0.9893, 0.0008, "http://example")];

        let first = AbundanceSync::new(&mut kb, &settings).run(&rows);
        assert_eq!(first.sources_added(), 1);
        assert_eq!(first.created(), 0);

        // Re-running finds the provenance already there
        let second = AbundanceSync::new(&mut kb, &settings).run(&rows);
        assert_eq!(second.already_sourced(), 1);

        let claims = kb.entity("Q1058").unwrap().claims_for(P_NATURAL_ABUNDANCE);
        assert_eq!(claims.len(), 1, "existing claims are never duplicated");
        assert_eq!(claims[0].sources.len(), 1);
        assert!(claims[0].qualifiers.is_empty());
    }

    #[test]
    fn test_already_sourced_claim_is_left_alone() {
        let mut claim = existing_claim("Q1058", 0.9893, 0.0008);
        claim.sources.push(SourceBlock::new(nudat_sources(
            "2.6",
            "http://example",
            None,
        )));
        let mut kb = InMemoryKnowledgeBase::new();
        kb.insert(entity_with_claim("Q1058", claim));

        let report = AbundanceSync::new(&mut kb, &settings())
            .run(&[record("Q1058", 0.9893, 0.0008, "http://example")]);

        assert_eq!(report.already_sourced(), 1);
        let claims = kb.entity("Q1058").unwrap().claims_for(P_NATURAL_ABUNDANCE);
        assert_eq!(claims[0].sources.len(), 1);
    }

    #[test]
    fn test_different_edition_adds_new_block() {
        let mut claim = existing_claim("Q1058", 0.9893, 0.0008);
        claim.sources.push(SourceBlock::new(nudat_sources("2.5", "http://example", None)));
        let mut kb = InMemoryKnowledgeBase::new();
        kb.insert(entity_with_claim("Q1058", claim));

        let report = AbundanceSync::new(&mut kb, &settings())
            .run(&[record("Q1058", 0.9893, 0.0008, "http://example")]);

        assert_eq!(report.sources_added(), 1);
        let claims = kb.entity("Q1058").unwrap().claims_for(P_NATURAL_ABUNDANCE);
        assert_eq!(claims[0].sources.len(), 2);
    }

    #[test]
    fn test_malformed_existing_claim_fails_open() {
        let mut broken = existing_claim("Q1058", 0.9893, 0.0008);
        if let Some(DataValue::Quantity(q)) = broken.value.as_mut() {
            q.lower_bound = None;
        }
        let mut kb = InMemoryKnowledgeBase::new();
        kb.insert(entity_with_claim("Q1058", broken));

        let report = AbundanceSync::new(&mut kb, &settings())
            .run(&[record("Q1058", 0.9893, 0.0008, "http://example")]);

        assert_eq!(report.created(), 1);
        assert_eq!(report.malformed(), 1);
        assert_eq!(
            kb.entity("Q1058").unwrap().claims_for(P_NATURAL_ABUNDANCE).len(),
            2
        );
    }

    #[test]
    fn test_failed_row_does_not_stop_batch() {
        let mut kb = InMemoryKnowledgeBase::new().with_entity("Q123");

        let report = AbundanceSync::new(&mut kb, &settings()).run(&[
            record("Q404", 0.5, 0.1, "http://missing"),
            record("Q123", 0.9926, 0.0008, "http://example"),
        ]);

        assert_eq!(report.rows(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.created(), 1);
        assert!(matches!(
            &report.results[0].outcome,
            RowOutcome::Failed { reason } if reason.contains("Q404")
        ));
    }

    #[test]
    fn test_sync_from_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Q123,0.9926,0.0008,Carbon-12,http://example").unwrap();
        writeln!(file, "Q124,1.0,None,Hydrogen-1,http://example/h").unwrap();

        let mut kb = InMemoryKnowledgeBase::new()
            .with_entity("Q123")
            .with_entity("Q124");
        let settings = AbundanceSettings {
            csv_path: file.path().to_path_buf(),
            ..AbundanceSettings::default()
        };

        let report = sync_abundances(&mut kb, &settings).unwrap();
        assert_eq!(report.created(), 2);

        let quantity = kb.entity("Q124").unwrap().claims_for(P_NATURAL_ABUNDANCE)[0]
            .value
            .clone()
            .unwrap();
        assert_eq!(
            quantity,
            DataValue::Quantity(Quantity::with_symmetric_error(1.0, 0.0))
        );
    }
}
