// 🧱 Knowledge-base data model
// Entities, claims, snaks and data values as the Wikibase data model defines them.
//
// Quantities keep their decimal strings exactly as the service returns them.
// Numbers are parsed on demand so a bad remote value is a typed failure at the
// point of comparison, not a crash while decoding the whole entity.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unit value for dimensionless quantities
pub const UNITLESS: &str = "1";

/// Proleptic Gregorian calendar model
pub const GREGORIAN_CALENDAR: &str = "http://www.wikidata.org/entity/Q1985727";

/// One SPARQL result row: variable name -> bound value
pub type Binding = BTreeMap<String, String>;

// ============================================================================
// QUANTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity has no {0}")]
    MissingBound(&'static str),

    #[error("cannot parse decimal '{0}'")]
    BadDecimal(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub amount: String,
    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub unit: String,
}

impl Quantity {
    /// Quantity without bounds
    pub fn exact(amount: f64) -> Self {
        Quantity {
            amount: format_decimal(amount),
            lower_bound: None,
            upper_bound: None,
            unit: UNITLESS.to_string(),
        }
    }

    /// Quantity with bounds at amount ± error.
    ///
    /// An error of 0.0 still writes bounds (equal to the amount), which is
    /// how a measured value with no stated uncertainty is stored.
    pub fn with_symmetric_error(amount: f64, error: f64) -> Self {
        Quantity {
            amount: format_decimal(amount),
            lower_bound: Some(format_decimal(amount - error)),
            upper_bound: Some(format_decimal(amount + error)),
            unit: UNITLESS.to_string(),
        }
    }

    pub fn amount(&self) -> Result<f64, QuantityError> {
        parse_decimal(&self.amount)
    }

    pub fn lower_bound(&self) -> Result<f64, QuantityError> {
        self.lower_bound
            .as_deref()
            .ok_or(QuantityError::MissingBound("lowerBound"))
            .and_then(parse_decimal)
    }

    pub fn upper_bound(&self) -> Result<f64, QuantityError> {
        self.upper_bound
            .as_deref()
            .ok_or(QuantityError::MissingBound("upperBound"))
            .and_then(parse_decimal)
    }
}

/// Format a number as a Wikibase decimal string ("+0.9926", "-1.5").
///
/// Twelve fractional digits, trailing zeros trimmed, so f64 noise from
/// bound arithmetic (0.9918000000000001) never reaches the wire.
pub fn format_decimal(value: f64) -> String {
    let mut digits = format!("{:.12}", value.abs());
    if digits.contains('.') {
        while digits.ends_with('0') {
            digits.pop();
        }
        if digits.ends_with('.') {
            digits.pop();
        }
    }

    let sign = if value < 0.0 && digits != "0" { '-' } else { '+' };
    format!("{}{}", sign, digits)
}

pub fn parse_decimal(text: &str) -> Result<f64, QuantityError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| QuantityError::BadDecimal(text.to_string()))
}

// ============================================================================
// TIME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WbTime {
    /// ISO-like timestamp with explicit sign, e.g. "+2016-06-23T00:00:00Z"
    pub time: String,
    pub precision: u8,
    pub calendar_model: String,
}

impl WbTime {
    pub const PRECISION_YEAR: u8 = 9;
    pub const PRECISION_DAY: u8 = 11;

    pub fn from_date(date: NaiveDate) -> Self {
        WbTime {
            time: format!(
                "{}-{:02}-{:02}T00:00:00Z",
                signed_year(date.year()),
                date.month(),
                date.day()
            ),
            precision: Self::PRECISION_DAY,
            calendar_model: GREGORIAN_CALENDAR.to_string(),
        }
    }

    pub fn from_year(year: i32) -> Self {
        WbTime {
            time: format!("{}-00-00T00:00:00Z", signed_year(year)),
            precision: Self::PRECISION_YEAR,
            calendar_model: GREGORIAN_CALENDAR.to_string(),
        }
    }
}

fn signed_year(year: i32) -> String {
    if year < 0 {
        format!("-{:04}", -year)
    } else {
        format!("+{:04}", year)
    }
}

// ============================================================================
// DATA VALUES & SNAKS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    /// Entity reference by id (Q42, P31)
    Item(String),
    String(String),
    Quantity(Quantity),
    Time(WbTime),
    Monolingual { text: String, language: String },
    /// A value type this crate does not interpret; holds the type name
    Other(String),
}

impl DataValue {
    pub fn item(id: &str) -> Self {
        DataValue::Item(id.to_string())
    }

    pub fn string(text: impl Into<String>) -> Self {
        DataValue::String(text.into())
    }

    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            DataValue::Quantity(q) => Some(q),
            _ => None,
        }
    }

    /// Wikibase datavalue type name
    pub fn type_name(&self) -> &str {
        match self {
            DataValue::Item(_) => "wikibase-entityid",
            DataValue::String(_) => "string",
            DataValue::Quantity(_) => "quantity",
            DataValue::Time(_) => "time",
            DataValue::Monolingual { .. } => "monolingualtext",
            DataValue::Other(type_name) => type_name,
        }
    }
}

/// A property/value pair. `value` is None for "some value" and "no value" snaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snak {
    pub property: String,
    pub value: Option<DataValue>,
}

impl Snak {
    pub fn new(property: &str, value: DataValue) -> Self {
        Snak {
            property: property.to_string(),
            value: Some(value),
        }
    }
}

/// One reference attached to a claim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub hash: Option<String>,
    pub snaks: Vec<Snak>,
}

impl SourceBlock {
    pub fn new(snaks: Vec<Snak>) -> Self {
        SourceBlock { hash: None, snaks }
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.snaks.iter().any(|s| s.property == property)
    }

    /// All values recorded under a property in this block
    pub fn values<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a DataValue> + 'a {
        self.snaks
            .iter()
            .filter(move |s| s.property == property)
            .filter_map(|s| s.value.as_ref())
    }
}

// ============================================================================
// CLAIMS & ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Statement GUID ("Q42$5627..."); None until saved
    pub id: Option<String>,
    pub property: String,
    pub value: Option<DataValue>,
    pub qualifiers: Vec<Snak>,
    pub sources: Vec<SourceBlock>,
}

impl Claim {
    pub fn new(property: &str, value: DataValue) -> Self {
        Claim {
            id: None,
            property: property.to_string(),
            value: Some(value),
            qualifiers: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, property: &str, value: DataValue) -> Self {
        self.qualifiers.push(Snak::new(property, value));
        self
    }

    pub fn with_source(mut self, snaks: Vec<Snak>) -> Self {
        self.sources.push(SourceBlock::new(snaks));
        self
    }

    /// Entity id part of the statement GUID
    pub fn entity_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .and_then(|guid| guid.split('$').next())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub labels: BTreeMap<String, String>,
    pub descriptions: BTreeMap<String, String>,
    pub aliases: BTreeMap<String, Vec<String>>,
    pub claims: BTreeMap<String, Vec<Claim>>,
}

impl Entity {
    pub fn new(id: &str) -> Self {
        Entity {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// Claims for a property; an absent property has no claims
    pub fn claims_for(&self, property: &str) -> &[Claim] {
        self.claims
            .get(property)
            .map(|claims| claims.as_slice())
            .unwrap_or(&[])
    }
}

/// Everything needed to create a new item in one edit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub labels: BTreeMap<String, String>,
    pub descriptions: BTreeMap<String, String>,
    pub aliases: BTreeMap<String, Vec<String>>,
    pub claims: Vec<Claim>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(0.9926), "+0.9926");
        assert_eq!(format_decimal(0.9926 - 0.0008), "+0.9918");
        assert_eq!(format_decimal(-1.5), "-1.5");
        assert_eq!(format_decimal(0.0), "+0");
        assert_eq!(format_decimal(12.0), "+12");
    }

    #[test]
    fn test_symmetric_error_bounds() {
        let q = Quantity::with_symmetric_error(0.9926, 0.0008);

        assert_eq!(q.amount, "+0.9926");
        assert_eq!(q.lower_bound.as_deref(), Some("+0.9918"));
        assert_eq!(q.upper_bound.as_deref(), Some("+0.9934"));
        assert_eq!(q.unit, UNITLESS);
        assert!((q.amount().unwrap() - 0.9926).abs() < 1e-12);
    }

    #[test]
    fn test_quantity_bound_errors() {
        let q = Quantity::exact(1.0);
        assert_eq!(q.lower_bound(), Err(QuantityError::MissingBound("lowerBound")));

        let bad = Quantity {
            amount: "abc".to_string(),
            lower_bound: None,
            upper_bound: None,
            unit: UNITLESS.to_string(),
        };
        assert!(matches!(bad.amount(), Err(QuantityError::BadDecimal(_))));
    }

    #[test]
    fn test_wbtime() {
        let date = NaiveDate::from_ymd_opt(2016, 6, 23).unwrap();
        let t = WbTime::from_date(date);
        assert_eq!(t.time, "+2016-06-23T00:00:00Z");
        assert_eq!(t.precision, WbTime::PRECISION_DAY);

        let y = WbTime::from_year(1861);
        assert_eq!(y.time, "+1861-00-00T00:00:00Z");
        assert_eq!(y.precision, WbTime::PRECISION_YEAR);
    }

    #[test]
    fn test_claim_entity_id_and_missing_property() {
        let mut claim = Claim::new("P31", DataValue::item("Q5"));
        assert_eq!(claim.entity_id(), None);

        claim.id = Some("Q42$ABC-123".to_string());
        assert_eq!(claim.entity_id(), Some("Q42"));

        let entity = Entity::new("Q42");
        assert!(entity.claims_for("P2374").is_empty());
    }
}
