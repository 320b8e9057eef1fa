// 🏗️ Organization Sync - create knowledge-base items for ROR organizations
//
// Candidates are the active ROR ids with no known entity link. Each one is
// checked against the query service first; only ids nobody carries yet are
// turned into a new item. Any error stops the batch.

use super::registry::OrganizationRegistry;
use super::transform::{LocalizedLabel, OrganizationBase, DEFAULT_LANGUAGE};
use crate::config::OrganizationSettings;
use crate::kb::{Claim, DataValue, ItemDraft, KnowledgeBase, Snak, WbTime};
use crate::properties::*;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// SPARQL asking for items that already carry `ror_id`
pub fn ror_lookup_query(ror_id: &str) -> String {
    let escaped = ror_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("SELECT ?item WHERE {{ ?item wdt:{} '{}' . }}", P_ROR_ID, escaped)
}

/// True when at least one item already has this ROR id
pub fn is_in_knowledge_base<K: KnowledgeBase>(kb: &K, ror_id: &str) -> Result<bool> {
    let rows = kb
        .query(&ror_lookup_query(ror_id))
        .with_context(|| format!("Existence check failed for {}", ror_id))?;
    Ok(!rows.is_empty())
}

/// Source block attached to every claim of a ROR-derived item
pub fn ror_sources(ror_id: &str, retrieved: NaiveDate) -> Vec<Snak> {
    vec![
        Snak::new(P_STATED_IN, DataValue::item(Q_ROR)),
        Snak::new(P_ROR_ID, DataValue::string(ror_id)),
        Snak::new(P_RETRIEVED, DataValue::Time(WbTime::from_date(retrieved))),
    ]
}

fn language_or_default(language: Option<&str>) -> String {
    language
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

pub fn build_item_draft(
    base: &OrganizationBase,
    labels: &[LocalizedLabel],
    aliases: &BTreeMap<String, Vec<String>>,
    retrieved: NaiveDate,
) -> ItemDraft {
    let mut draft = ItemDraft::default();

    if let Some(label) = &base.label {
        draft
            .labels
            .insert(language_or_default(base.label_language.as_deref()), label.clone());
    }

    // One label per language; a label losing its slot is kept as an alias
    let mut displaced: Vec<(String, String)> = Vec::new();
    for extra in labels {
        let language = language_or_default(extra.language.as_deref());
        match draft.labels.get(&language) {
            Some(taken) if *taken != extra.label => displaced.push((language, extra.label.clone())),
            Some(_) => {}
            None => {
                draft.labels.insert(language, extra.label.clone());
            }
        }
    }

    draft
        .descriptions
        .insert(DEFAULT_LANGUAGE.to_string(), base.description.clone());

    let alias_names = displaced.into_iter().chain(
        aliases
            .iter()
            .flat_map(|(language, names)| names.iter().map(move |n| (language.clone(), n.clone()))),
    );
    for (language, name) in alias_names {
        if draft.labels.get(&language) == Some(&name) {
            continue;
        }
        let list = draft.aliases.entry(language).or_default();
        if !list.contains(&name) {
            list.push(name);
        }
    }

    let sources = ror_sources(&base.ror_id, retrieved);
    let mut claim = |property: &str, value: DataValue| {
        draft
            .claims
            .push(Claim::new(property, value).with_source(sources.clone()));
    };

    claim(P_INSTANCE_OF, DataValue::item(&base.type_entity));
    if let Some(country) = &base.country_entity {
        claim(P_COUNTRY, DataValue::item(country));
    }
    if let Some(year) = base.inception {
        claim(P_INCEPTION, DataValue::Time(WbTime::from_year(year)));
    }
    if let Some(website) = &base.website {
        claim(P_OFFICIAL_WEBSITE, DataValue::string(website.as_str()));
    }
    claim(P_ROR_ID, DataValue::string(base.ror_id.as_str()));

    draft
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationReport {
    pub candidates: usize,
    /// (ROR id, new entity id)
    pub created: Vec<(String, String)>,
    /// ROR ids the query service already knows about
    pub already_present: Vec<String>,
}

impl OrganizationReport {
    pub fn summary(&self) -> String {
        format!(
            "{} candidates: {} items created, {} already present",
            self.candidates,
            self.created.len(),
            self.already_present.len()
        )
    }
}

// ============================================================================
// SYNC ENGINE
// ============================================================================

pub struct OrganizationSync<'a, K: KnowledgeBase> {
    kb: &'a mut K,
    registry: &'a OrganizationRegistry,
    retrieved: NaiveDate,
    limit: Option<usize>,
}

impl<'a, K: KnowledgeBase> OrganizationSync<'a, K> {
    pub fn new(kb: &'a mut K, registry: &'a OrganizationRegistry, retrieved: NaiveDate) -> Self {
        OrganizationSync {
            kb,
            registry,
            retrieved,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn run(&mut self) -> Result<OrganizationReport> {
        let candidates = self.registry.valid_ids_not_in_wikidata();
        let mut report = OrganizationReport {
            candidates: candidates.len(),
            ..Default::default()
        };
        info!("{} organizations without an entity link", candidates.len());

        for ror_id in &candidates {
            if self.limit.is_some_and(|limit| report.created.len() >= limit) {
                info!("Reached limit of {} new items", report.created.len());
                break;
            }

            if is_in_knowledge_base(&*self.kb, ror_id)? {
                debug!(ror_id = %ror_id, "already in knowledge base, skipping");
                report.already_present.push(ror_id.clone());
                continue;
            }

            let entity_id = self
                .create_organization(ror_id)
                .with_context(|| format!("Failed to create item for {}", ror_id))?;
            report.created.push((ror_id.clone(), entity_id));
        }

        info!("{}", report.summary());
        Ok(report)
    }

    pub fn create_organization(&mut self, ror_id: &str) -> Result<String> {
        let base = self.registry.base_data_for_id(ror_id)?;
        let labels = self.registry.labels_for_id(ror_id)?;
        let aliases = self.registry.aliases_for_id(ror_id)?;

        let draft = build_item_draft(&base, &labels, &aliases, self.retrieved);
        let entity_id = self.kb.create_item(&draft)?;

        info!(
            "Created {} for {} ({})",
            entity_id,
            ror_id,
            base.label.as_deref().unwrap_or("no label")
        );
        Ok(entity_id)
    }
}

/// Load the registry and lookup tables, then create every missing organization
pub fn sync_organizations<K: KnowledgeBase>(
    kb: &mut K,
    settings: &OrganizationSettings,
) -> Result<OrganizationReport> {
    let mut registry =
        OrganizationRegistry::load(&settings.ror_data_path, &settings.wikidata_links_path)?;
    registry.load_country_map(&settings.country_map_path)?;
    registry.load_type_map(&settings.type_map_path)?;
    info!(
        "Loaded {} organizations from {}",
        registry.len(),
        settings.ror_data_path.display()
    );

    let today = Utc::now().date_naive();
    OrganizationSync::new(kb, &registry, today)
        .with_limit(settings.limit)
        .run()
}
