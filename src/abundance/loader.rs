// 📂 Abundance CSV loader
// Rows are positional, no header: entity id, value, uncertainty, name, source URL

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Uncertainty literal meaning "no stated uncertainty"
pub const NO_UNCERTAINTY: &str = "None";

/// One measured natural abundance for a nuclide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbundanceRecord {
    pub entity_id: String,
    pub value: f64,
    pub uncertainty: f64,
    pub name: String,
    pub source_url: String,

    /// 1-based row in the source file
    pub line: usize,
}

/// Parse an uncertainty column; "None" means exactly 0.0
pub fn parse_uncertainty(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw == NO_UNCERTAINTY {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .with_context(|| format!("Invalid uncertainty: '{}'", raw))
}

pub fn load_abundances(csv_path: &Path) -> Result<Vec<AbundanceRecord>> {
    let file = File::open(csv_path)
        .with_context(|| format!("Failed to open file: {}", csv_path.display()))?;
    read_abundances(file).with_context(|| format!("Failed to load {}", csv_path.display()))
}

pub fn read_abundances<R: Read>(reader: R) -> Result<Vec<AbundanceRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let line = index + 1;
        let row = result.with_context(|| format!("Failed to read row {}", line))?;

        if row.len() != 5 {
            bail!("Row {}: expected 5 columns, found {}", line, row.len());
        }

        let value = row[1]
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Row {}: invalid value '{}'", line, &row[1]))?;
        let uncertainty =
            parse_uncertainty(&row[2]).with_context(|| format!("Row {}", line))?;

        records.push(AbundanceRecord {
            entity_id: row[0].trim().to_string(),
            value,
            uncertainty,
            name: row[3].to_string(),
            source_url: row[4].trim().to_string(),
            line,
        });
    }

    Ok(records)
}
