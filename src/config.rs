// ⚙️ Run configuration
// Every field has a default that reproduces the batch scripts' fixed filenames
// and provenance constants, so a bare `claim-sync abundances` works in a
// directory holding the input files. A TOML file can override any of them.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub kb: KbSettings,
    pub abundance: AbundanceSettings,
    pub organization: OrganizationSettings,

    /// SQLite edit journal; None disables journaling
    pub journal_path: Option<PathBuf>,
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

// ============================================================================
// KNOWLEDGE BASE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KbSettings {
    /// MediaWiki Action API endpoint
    pub api_url: String,

    /// SPARQL query service endpoint
    pub sparql_url: String,

    pub user_agent: String,

    /// Flag edits as bot edits
    pub bot: bool,
}

impl Default for KbSettings {
    fn default() -> Self {
        KbSettings {
            api_url: "https://www.wikidata.org/w/api.php".to_string(),
            sparql_url: "https://query.wikidata.org/sparql".to_string(),
            user_agent: format!("claim-sync/{}", env!("CARGO_PKG_VERSION")),
            bot: true,
        }
    }
}

/// Bot-password credentials, read from the environment only
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub const USERNAME_VAR: &'static str = "KB_USERNAME";
    pub const PASSWORD_VAR: &'static str = "KB_PASSWORD";

    /// None unless both variables are set
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(Self::USERNAME_VAR).ok()?;
        let password = std::env::var(Self::PASSWORD_VAR).ok()?;
        Some(Credentials { username, password })
    }
}

// ============================================================================
// PIPELINES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbundanceSettings {
    pub csv_path: PathBuf,

    /// NuDat edition recorded in provenance
    pub edition: String,

    /// Retrieval date recorded in provenance
    pub retrieved: NaiveDate,

    pub summary: String,
    pub dry_run: bool,
}

impl Default for AbundanceSettings {
    fn default() -> Self {
        AbundanceSettings {
            csv_path: PathBuf::from("abundance_data.csv"),
            edition: "2.6".to_string(),
            retrieved: NaiveDate::from_ymd_opt(2016, 6, 23).unwrap_or_default(),
            summary: "Adding natural abundance claim from NNDC.".to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationSettings {
    /// ROR v2 JSON dump
    pub ror_data_path: PathBuf,

    /// CSV of (entity id, ROR id) pairs already linked
    pub wikidata_links_path: PathBuf,

    pub country_map_path: PathBuf,
    pub type_map_path: PathBuf,

    /// Stop after creating this many items
    pub limit: Option<usize>,

    pub summary: String,
    pub dry_run: bool,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        OrganizationSettings {
            ror_data_path: PathBuf::from("ror_data.json"),
            wikidata_links_path: PathBuf::from("wikidata_ror.csv"),
            country_map_path: PathBuf::from("country_map.csv"),
            type_map_path: PathBuf::from("type_map.csv"),
            limit: None,
            summary: "Creating organization item from ROR.".to_string(),
            dry_run: false,
        }
    }
}
