// 🔄 Organization Transformer - ROR record → knowledge-base projection
//
// Produces the pieces needed to describe an organization as an item:
// display label, per-language labels and aliases, a synthesized description,
// the organization type and country resolved to entity ids, website and
// inception year.

use super::registry::{OrganizationRecord, OrganizationRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DISPLAY_NAME: &str = "ror_display";
pub const LABEL_NAME: &str = "label";
pub const WEBSITE_LINK: &str = "website";
pub const FUNDER_TYPE: &str = "funder";
pub const DEFAULT_TYPE: &str = "other";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Types that are already nouns on their own ("company in Paris, France")
const STANDALONE_TYPES: [&str; 2] = ["company", "facility"];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OrganizationError {
    #[error("no organization with ROR id {0}")]
    UnknownId(String),

    #[error("{ror_id}: organization type '{type_label}' is not in the type map")]
    UnknownType { ror_id: String, type_label: String },

    #[error("{ror_id}: country code '{country_code}' is not in the country map")]
    UnknownCountry { ror_id: String, country_code: String },
}

// ============================================================================
// PROJECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationBase {
    pub ror_id: String,
    pub label: Option<String>,
    /// Language of the display name, when the registry gives one
    pub label_language: Option<String>,
    pub description: String,
    pub inception: Option<i32>,
    pub type_label: String,
    pub type_entity: String,
    pub website: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_entity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedLabel {
    pub label: String,
    pub language: Option<String>,
}

// ============================================================================
// RECORD-LEVEL RULES
// ============================================================================

/// The name carrying the display role (the last one, if the registry lists several)
pub fn display_name(record: &OrganizationRecord) -> Option<(&str, Option<&str>)> {
    record
        .names
        .iter()
        .filter(|n| n.has_type(DISPLAY_NAME))
        .last()
        .map(|n| (n.value.as_str(), n.lang.as_deref()))
}

/// Names typed "label", excluding the display name
pub fn labels(record: &OrganizationRecord) -> Vec<LocalizedLabel> {
    record
        .names
        .iter()
        .filter(|n| !n.has_type(DISPLAY_NAME) && n.has_type(LABEL_NAME))
        .map(|n| LocalizedLabel {
            label: n.value.clone(),
            language: n.lang.clone(),
        })
        .collect()
}

/// Every other name, grouped by language in arrival order
pub fn aliases(record: &OrganizationRecord) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for name in &record.names {
        if name.has_type(DISPLAY_NAME) || name.has_type(LABEL_NAME) {
            continue;
        }
        let language = name
            .lang
            .as_deref()
            .filter(|lang| !lang.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);
        grouped
            .entry(language.to_string())
            .or_default()
            .push(name.value.clone());
    }

    grouped
}

/// "other" unless a non-funder type is present; the last such type wins
pub fn organization_type(record: &OrganizationRecord) -> &str {
    record
        .types
        .iter()
        .filter(|t| t.as_str() != FUNDER_TYPE)
        .last()
        .map(String::as_str)
        .unwrap_or(DEFAULT_TYPE)
}

/// First link typed "website", trimmed
pub fn website(record: &OrganizationRecord) -> Option<String> {
    record
        .links
        .iter()
        .find(|link| link.link_type == WEBSITE_LINK)
        .map(|link| link.value.trim().to_string())
}

/// "[type] [organization] in [city,] country"
///
/// Without a country there is nothing to say where, so the "in ..." part is dropped.
pub fn describe(type_label: &str, city: Option<&str>, country: Option<&str>) -> String {
    let mut words: Vec<String> = Vec::new();

    if type_label != DEFAULT_TYPE {
        words.push(type_label.to_lowercase());
    }
    if !STANDALONE_TYPES.contains(&type_label) {
        words.push("organization".to_string());
    }

    if let Some(country) = country {
        words.push("in".to_string());
        if let Some(city) = city.filter(|c| !c.is_empty()) {
            words.push(format!("{},", city));
        }
        words.push(country.to_string());
    }

    words.join(" ")
}

// ============================================================================
// REGISTRY LOOKUPS
// ============================================================================

impl OrganizationRegistry {
    fn record_for(&self, ror_id: &str) -> Result<&OrganizationRecord, OrganizationError> {
        self.get(ror_id)
            .ok_or_else(|| OrganizationError::UnknownId(ror_id.to_string()))
    }

    pub fn base_data_for_id(&self, ror_id: &str) -> Result<OrganizationBase, OrganizationError> {
        let record = self.record_for(ror_id)?;

        let (label, label_language) = match display_name(record) {
            Some((value, lang)) => (Some(value.to_string()), lang.map(String::from)),
            None => (None, None),
        };

        let type_label = organization_type(record);
        let type_entity = self
            .type_map
            .get(type_label)
            .cloned()
            .ok_or_else(|| OrganizationError::UnknownType {
                ror_id: ror_id.to_string(),
                type_label: type_label.to_string(),
            })?;

        let (city, country, country_entity) = match record.locations.first() {
            Some(location) => {
                let details = &location.geonames_details;
                let entity = self
                    .country_map
                    .get(&details.country_code)
                    .cloned()
                    .ok_or_else(|| OrganizationError::UnknownCountry {
                        ror_id: ror_id.to_string(),
                        country_code: details.country_code.clone(),
                    })?;
                (
                    details.name.clone(),
                    Some(details.country_name.clone()),
                    Some(entity),
                )
            }
            None => (None, None, None),
        };

        let description = describe(type_label, city.as_deref(), country.as_deref());

        Ok(OrganizationBase {
            ror_id: ror_id.to_string(),
            label,
            label_language,
            description,
            inception: record.established,
            type_label: type_label.to_string(),
            type_entity,
            website: website(record),
            city,
            country,
            country_entity,
        })
    }

    pub fn labels_for_id(&self, ror_id: &str) -> Result<Vec<LocalizedLabel>, OrganizationError> {
        Ok(labels(self.record_for(ror_id)?))
    }

    pub fn aliases_for_id(
        &self,
        ror_id: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, OrganizationError> {
        Ok(aliases(self.record_for(ror_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn registry_with(record: serde_json::Value) -> OrganizationRegistry {
        let record: OrganizationRecord = serde_json::from_value(record).unwrap();
        OrganizationRegistry::from_records(vec![record])
            .with_country_map(HashMap::from([
                ("US".to_string(), "Q30".to_string()),
                ("FR".to_string(), "Q142".to_string()),
            ]))
            .with_type_map(HashMap::from([
                ("Education".to_string(), "Q2385804".to_string()),
                ("education".to_string(), "Q2385804".to_string()),
                ("company".to_string(), "Q783794".to_string()),
                ("facility".to_string(), "Q13226383".to_string()),
                ("other".to_string(), "Q43229".to_string()),
            ]))
    }

    #[test]
    fn test_education_in_boston() {
        let registry = registry_with(json!({
            "id": "https://ror.org/01",
            "names": [{"value": "Boston Example University", "types": ["ror_display", "label"], "lang": "en"}],
            "established": 1869,
            "types": ["Education"],
            "links": [{"type": "website", "value": "  https://www.example.edu  "}],
            "locations": [{"geonames_details": {"name": "Boston", "country_name": "United States", "country_code": "US"}}],
            "status": "active"
        }));

        let base = registry.base_data_for_id("01").unwrap();
        assert_eq!(base.description, "education organization in Boston, United States");
        assert_eq!(base.label.as_deref(), Some("Boston Example University"));
        assert_eq!(base.label_language.as_deref(), Some("en"));
        assert_eq!(base.type_entity, "Q2385804");
        assert_eq!(base.country_entity.as_deref(), Some("Q30"));
        assert_eq!(base.website.as_deref(), Some("https://www.example.edu"));
        assert_eq!(base.inception, Some(1869));
    }

    #[test]
    fn test_company_has_no_organization_word() {
        let registry = registry_with(json!({
            "id": "https://ror.org/02",
            "names": [{"value": "Exemple SA", "types": ["ror_display"], "lang": "fr"}],
            "types": ["funder", "company", "funder"],
            "locations": [{"geonames_details": {"name": "Paris", "country_name": "France", "country_code": "FR"}}],
            "status": "active"
        }));

        let base = registry.base_data_for_id("02").unwrap();
        assert_eq!(base.description, "company in Paris, France");
        assert_eq!(base.type_label, "company");
        assert_eq!(base.website, None);
    }

    #[test]
    fn test_describe_variants() {
        assert_eq!(describe("other", Some("Lyon"), Some("France")), "organization in Lyon, France");
        assert_eq!(describe("facility", None, Some("France")), "facility in France");
        assert_eq!(describe("Healthcare", Some(""), Some("Chile")), "healthcare organization in Chile");
        assert_eq!(describe("education", None, None), "education organization");
    }

    #[test]
    fn test_type_resolution() {
        let registry = registry_with(json!({
            "id": "https://ror.org/03",
            "types": ["education", "funder", "facility"],
            "status": "active"
        }));
        // last non-funder wins
        assert_eq!(registry.base_data_for_id("03").unwrap().type_label, "facility");

        let funder_only = registry_with(json!({
            "id": "https://ror.org/04",
            "types": ["funder"],
            "status": "active"
        }));
        assert_eq!(funder_only.base_data_for_id("04").unwrap().type_label, "other");
    }

    #[test]
    fn test_zero_names_zero_types_no_location() {
        let registry = registry_with(json!({"id": "https://ror.org/05", "status": "active"}));

        let base = registry.base_data_for_id("05").unwrap();
        assert_eq!(base.label, None);
        assert_eq!(base.type_label, "other");
        assert_eq!(base.type_entity, "Q43229");
        assert_eq!(base.city, None);
        assert_eq!(base.country, None);
        assert_eq!(base.country_entity, None);
        assert_eq!(base.description, "organization");
    }

    #[test]
    fn test_unknown_type_and_country_are_errors() {
        let registry = registry_with(json!({
            "id": "https://ror.org/06",
            "types": ["government"],
            "status": "active"
        }));
        assert_eq!(
            registry.base_data_for_id("06"),
            Err(OrganizationError::UnknownType {
                ror_id: "06".to_string(),
                type_label: "government".to_string()
            })
        );

        let registry = registry_with(json!({
            "id": "https://ror.org/07",
            "locations": [{"geonames_details": {"name": "Oslo", "country_name": "Norway", "country_code": "NO"}}],
            "status": "active"
        }));
        assert!(matches!(
            registry.base_data_for_id("07"),
            Err(OrganizationError::UnknownCountry { country_code, .. }) if country_code == "NO"
        ));

        assert_eq!(
            registry.base_data_for_id("nope"),
            Err(OrganizationError::UnknownId("nope".to_string()))
        );
    }

    #[test]
    fn test_only_first_location_and_first_website() {
        let registry = registry_with(json!({
            "id": "https://ror.org/08",
            "links": [
                {"type": "wikipedia", "value": "https://en.wikipedia.org/wiki/Example"},
                {"type": "website", "value": "https://first.example"},
                {"type": "website", "value": "https://second.example"}
            ],
            "locations": [
                {"geonames_details": {"name": "Boston", "country_name": "United States", "country_code": "US"}},
                {"geonames_details": {"name": "Paris", "country_name": "France", "country_code": "FR"}}
            ],
            "status": "active"
        }));

        let base = registry.base_data_for_id("08").unwrap();
        assert_eq!(base.city.as_deref(), Some("Boston"));
        assert_eq!(base.website.as_deref(), Some("https://first.example"));
    }

    #[test]
    fn test_alias_grouping() {
        let registry = registry_with(json!({
            "id": "https://ror.org/09",
            "names": [
                {"value": "Display", "types": ["ror_display", "label"], "lang": "en"},
                {"value": "Étiquette", "types": ["label"], "lang": "fr"},
                {"value": "Example Alias", "types": ["alias"], "lang": "en"},
                {"value": "Alias Exemple", "types": ["alias"], "lang": "fr"}
            ],
            "status": "active"
        }));

        let aliases = registry.aliases_for_id("09").unwrap();
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases["en"], vec!["Example Alias"]);
        assert_eq!(aliases["fr"], vec!["Alias Exemple"]);

        let labels = registry.labels_for_id("09").unwrap();
        assert_eq!(
            labels,
            vec![LocalizedLabel {
                label: "Étiquette".to_string(),
                language: Some("fr".to_string())
            }]
        );
    }

    #[test]
    fn test_aliases_default_language_and_order() {
        let registry = registry_with(json!({
            "id": "https://ror.org/10",
            "names": [
                {"value": "EX", "types": ["acronym"], "lang": null},
                {"value": "Example", "types": ["alias"], "lang": ""},
                {"value": "Another", "types": ["alias"]}
            ],
            "status": "active"
        }));

        let aliases = registry.aliases_for_id("10").unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases["en"], vec!["EX", "Example", "Another"]);
    }
}
