// 🏛️ Organization Registry - ROR dump + lookup tables
//
// Holds the full registry in memory with an index by short ROR id, plus the
// three static tables the transformer needs:
// - country map   (ISO country code → entity id)
// - type map      (ROR type label → entity id)
// - links map     (ROR id → entity id already carrying it)
// All of them are built once at startup and never mutated afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const ACTIVE_STATUS: &str = "active";

// ============================================================================
// ROR RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationName {
    pub value: String,

    /// Roles: "ror_display", "label", "alias", "acronym"
    #[serde(default)]
    pub types: Vec<String>,

    #[serde(default)]
    pub lang: Option<String>,
}

impl OrganizationName {
    pub fn has_type(&self, name_type: &str) -> bool {
        self.types.iter().any(|t| t == name_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationLink {
    #[serde(rename = "type")]
    pub link_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeonamesDetails {
    #[serde(default)]
    pub name: Option<String>,
    pub country_name: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationLocation {
    #[serde(default)]
    pub geonames_id: Option<u64>,
    pub geonames_details: GeonamesDetails,
}

/// One organization from a ROR v2 dump. Keys this crate doesn't use are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    /// Full ROR URL, e.g. "https://ror.org/03vek6s52"
    pub id: String,

    #[serde(default)]
    pub names: Vec<OrganizationName>,

    #[serde(default)]
    pub established: Option<i32>,

    #[serde(default)]
    pub types: Vec<String>,

    #[serde(default)]
    pub links: Vec<OrganizationLink>,

    #[serde(default)]
    pub locations: Vec<OrganizationLocation>,

    pub status: String,
}

impl OrganizationRecord {
    /// Last path segment of the ROR URL
    pub fn short_id(&self) -> &str {
        short_ror_id(&self.id)
    }

    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }
}

pub fn short_ror_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Default)]
pub struct OrganizationRegistry {
    records: Vec<OrganizationRecord>,
    index: HashMap<String, usize>,
    wikidata_links: HashMap<String, String>,
    pub(crate) country_map: HashMap<String, String>,
    pub(crate) type_map: HashMap<String, String>,
}

impl OrganizationRegistry {
    pub fn from_records(records: Vec<OrganizationRecord>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.short_id().to_string(), i))
            .collect();

        OrganizationRegistry {
            records,
            index,
            ..Default::default()
        }
    }

    /// Load the ROR dump and the entity-id links; maps are loaded separately
    pub fn load(ror_data_path: &Path, wikidata_links_path: &Path) -> Result<Self> {
        let file = File::open(ror_data_path)
            .with_context(|| format!("Failed to open file: {}", ror_data_path.display()))?;
        let records = read_records(BufReader::new(file))
            .with_context(|| format!("Failed to parse ROR data: {}", ror_data_path.display()))?;

        let links = load_code_map(wikidata_links_path, LinkColumns::EntityThenCode)?;
        Ok(Self::from_records(records).with_wikidata_links(links))
    }

    pub fn with_wikidata_links(mut self, links: HashMap<String, String>) -> Self {
        self.wikidata_links = links;
        self
    }

    pub fn with_country_map(mut self, map: HashMap<String, String>) -> Self {
        self.country_map = map;
        self
    }

    pub fn with_type_map(mut self, map: HashMap<String, String>) -> Self {
        self.type_map = map;
        self
    }

    pub fn load_country_map(&mut self, path: &Path) -> Result<()> {
        self.country_map = load_code_map(path, LinkColumns::CodeThenEntity)?;
        Ok(())
    }

    pub fn load_type_map(&mut self, path: &Path) -> Result<()> {
        self.type_map = load_code_map(path, LinkColumns::CodeThenEntity)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, ror_id: &str) -> Option<&OrganizationRecord> {
        self.index.get(ror_id).map(|&i| &self.records[i])
    }

    /// Short ids of every active organization, in registry order
    pub fn all_valid_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.short_id().to_string())
            .collect()
    }

    /// Active ids with no known counterpart in the knowledge base
    pub fn valid_ids_not_in_wikidata(&self) -> Vec<String> {
        self.all_valid_ids()
            .into_iter()
            .filter(|id| !self.wikidata_links.contains_key(id))
            .collect()
    }
}

// ============================================================================
// FILE LOADING
// ============================================================================

pub fn read_records<R: Read>(reader: R) -> Result<Vec<OrganizationRecord>> {
    Ok(serde_json::from_reader(reader)?)
}

/// Which column of a two-column CSV is the key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkColumns {
    /// `code,entity` (country and type maps)
    CodeThenEntity,
    /// `entity,code` (the links export, keyed by the ROR id in column two)
    EntityThenCode,
}

pub fn load_code_map(path: &Path, columns: LinkColumns) -> Result<HashMap<String, String>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_code_map(file, columns).with_context(|| format!("Failed to load {}", path.display()))
}

/// Read a header-less two-column CSV into key → value
pub fn read_code_map<R: Read>(reader: R, columns: LinkColumns) -> Result<HashMap<String, String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);

    let mut map = HashMap::new();
    for (index, result) in rdr.deserialize::<(String, String)>().enumerate() {
        let (first, second) = result.with_context(|| format!("Bad row {}", index + 1))?;
        let (key, value) = match columns {
            LinkColumns::CodeThenEntity => (first, second),
            LinkColumns::EntityThenCode => (second, first),
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}
