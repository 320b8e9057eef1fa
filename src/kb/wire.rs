// 🔌 Wikibase JSON encoding
// Converts between the Action API / SPARQL JSON shapes and the crate model.

use super::model::{Binding, Claim, DataValue, Entity, ItemDraft, Quantity, Snak, SourceBlock, WbTime};
use super::KbError;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Type name given to datavalues that could not be decoded
pub const INVALID_VALUE: &str = "invalid";

// ============================================================================
// DECODING
// ============================================================================

/// Turn an `{"error": {...}}` response into a typed error
pub fn api_error(response: &Value) -> Option<KbError> {
    let error = response.get("error")?;
    Some(KbError::Api {
        code: error["code"].as_str().unwrap_or("unknown").to_string(),
        info: error["info"].as_str().unwrap_or_default().to_string(),
    })
}

/// Decode one entry of a `wbgetentities` response
pub fn decode_entity(json: &Value) -> Result<Entity, KbError> {
    let id = json["id"]
        .as_str()
        .ok_or_else(|| KbError::Parse("entity without id".into()))?;

    if json.get("missing").is_some() {
        return Err(KbError::MissingEntity(id.to_string()));
    }

    let mut entity = Entity::new(id);

    entity.labels = decode_terms(&json["labels"]);
    entity.descriptions = decode_terms(&json["descriptions"]);

    if let Some(aliases) = json["aliases"].as_object() {
        for (language, list) in aliases {
            let names: Vec<String> = list
                .as_array()
                .map(|terms| {
                    terms
                        .iter()
                        .filter_map(|term| term["value"].as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            entity.aliases.insert(language.clone(), names);
        }
    }

    if let Some(claims) = json["claims"].as_object() {
        for (property, statements) in claims {
            let decoded = statements
                .as_array()
                .map(|list| list.iter().map(decode_claim).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            entity.claims.insert(property.clone(), decoded);
        }
    }

    Ok(entity)
}

/// `{language: {"language", "value"}}` → language → text
fn decode_terms(json: &Value) -> BTreeMap<String, String> {
    json.as_object()
        .map(|terms| {
            terms
                .iter()
                .filter_map(|(language, term)| {
                    term["value"].as_str().map(|text| (language.clone(), text.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn decode_claim(json: &Value) -> Result<Claim, KbError> {
    let mainsnak = decode_snak(&json["mainsnak"])?;

    let qualifiers = decode_snak_group(&json["qualifiers"], &json["qualifiers-order"])?;

    let mut sources = Vec::new();
    if let Some(references) = json["references"].as_array() {
        for reference in references {
            sources.push(SourceBlock {
                hash: reference["hash"].as_str().map(String::from),
                snaks: decode_snak_group(&reference["snaks"], &reference["snaks-order"])?,
            });
        }
    }

    Ok(Claim {
        id: json["id"].as_str().map(String::from),
        property: mainsnak.property,
        value: mainsnak.value,
        qualifiers,
        sources,
    })
}

/// Decode a `{property: [snak, ...]}` map, honouring an explicit order list
fn decode_snak_group(group: &Value, order: &Value) -> Result<Vec<Snak>, KbError> {
    let Some(map) = group.as_object() else {
        return Ok(Vec::new());
    };

    let mut properties: Vec<&str> = order
        .as_array()
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    for key in map.keys() {
        if !properties.contains(&key.as_str()) {
            properties.push(key.as_str());
        }
    }

    let mut snaks = Vec::new();
    for property in properties {
        if let Some(list) = map.get(property).and_then(Value::as_array) {
            for snak in list {
                snaks.push(decode_snak(snak)?);
            }
        }
    }
    Ok(snaks)
}

pub fn decode_snak(json: &Value) -> Result<Snak, KbError> {
    let property = json["property"]
        .as_str()
        .ok_or_else(|| KbError::Parse("snak without property".into()))?;

    // An unreadable value stays visible as `Other` instead of failing the whole entity
    let value = match json["snaktype"].as_str() {
        Some("value") => Some(decode_datavalue(&json["datavalue"]).unwrap_or_else(|e| {
            warn!(property, error = %e, "keeping undecodable value as opaque");
            DataValue::Other(INVALID_VALUE.to_string())
        })),
        _ => None,
    };

    Ok(Snak {
        property: property.to_string(),
        value,
    })
}

pub fn decode_datavalue(json: &Value) -> Result<DataValue, KbError> {
    let value = &json["value"];
    let type_name = json["type"]
        .as_str()
        .ok_or_else(|| KbError::Parse("datavalue without type".into()))?;

    let decoded = match type_name {
        "wikibase-entityid" => {
            let id = value["id"].as_str().map(String::from).or_else(|| {
                let numeric = value["numeric-id"].as_u64()?;
                let prefix = match value["entity-type"].as_str() {
                    Some("property") => "P",
                    _ => "Q",
                };
                Some(format!("{}{}", prefix, numeric))
            });
            DataValue::Item(id.ok_or_else(|| KbError::Parse("entity id value without id".into()))?)
        }
        "string" => DataValue::String(
            value
                .as_str()
                .ok_or_else(|| KbError::Parse("string value is not a string".into()))?
                .to_string(),
        ),
        // Amount is kept even when empty; comparisons report it as malformed
        "quantity" => DataValue::Quantity(Quantity {
            amount: value["amount"].as_str().unwrap_or_default().to_string(),
            lower_bound: value["lowerBound"].as_str().map(String::from),
            upper_bound: value["upperBound"].as_str().map(String::from),
            unit: value["unit"].as_str().unwrap_or(super::model::UNITLESS).to_string(),
        }),
        "time" => DataValue::Time(WbTime {
            time: value["time"].as_str().unwrap_or_default().to_string(),
            precision: value["precision"]
                .as_u64()
                .and_then(|p| u8::try_from(p).ok())
                .ok_or_else(|| KbError::Parse("time value without a valid precision".into()))?,
            calendar_model: value["calendarmodel"]
                .as_str()
                .unwrap_or(super::model::GREGORIAN_CALENDAR)
                .to_string(),
        }),
        "monolingualtext" => DataValue::Monolingual {
            text: value["text"].as_str().unwrap_or_default().to_string(),
            language: value["language"].as_str().unwrap_or_default().to_string(),
        },
        other => DataValue::Other(other.to_string()),
    };

    Ok(decoded)
}

/// Bindings of a SPARQL JSON result, one map per row
pub fn decode_bindings(json: &Value) -> Result<Vec<Binding>, KbError> {
    let rows = json["results"]["bindings"]
        .as_array()
        .ok_or_else(|| KbError::Parse("SPARQL result without bindings".into()))?;

    Ok(rows
        .iter()
        .filter_map(Value::as_object)
        .map(|row| {
            row.iter()
                .filter_map(|(name, bound)| {
                    bound["value"].as_str().map(|v| (name.clone(), v.to_string()))
                })
                .collect()
        })
        .collect())
}

// ============================================================================
// ENCODING
// ============================================================================

/// The `value` part of a datavalue, as `wbcreateclaim` / `wbsetqualifier` expect it
pub fn encode_value(value: &DataValue) -> Result<Value, KbError> {
    let encoded = match value {
        DataValue::Item(id) => {
            let entity_type = if id.starts_with('P') { "property" } else { "item" };
            let mut object = json!({ "entity-type": entity_type, "id": id });
            if let Some(numeric) = id.get(1..).and_then(|n| n.parse::<u64>().ok()) {
                object["numeric-id"] = json!(numeric);
            }
            object
        }
        DataValue::String(text) => json!(text),
        DataValue::Quantity(q) => {
            let mut object = json!({ "amount": q.amount, "unit": q.unit });
            if let Some(upper) = &q.upper_bound {
                object["upperBound"] = json!(upper);
            }
            if let Some(lower) = &q.lower_bound {
                object["lowerBound"] = json!(lower);
            }
            object
        }
        DataValue::Time(t) => json!({
            "time": t.time,
            "timezone": 0,
            "before": 0,
            "after": 0,
            "precision": t.precision,
            "calendarmodel": t.calendar_model,
        }),
        DataValue::Monolingual { text, language } => json!({ "text": text, "language": language }),
        DataValue::Other(type_name) => {
            return Err(KbError::Parse(format!("cannot encode value of type {}", type_name)))
        }
    };
    Ok(encoded)
}

pub fn encode_snak(snak: &Snak) -> Result<Value, KbError> {
    match &snak.value {
        Some(value) => Ok(json!({
            "snaktype": "value",
            "property": snak.property,
            "datavalue": { "value": encode_value(value)?, "type": value.type_name() },
        })),
        None => Ok(json!({ "snaktype": "novalue", "property": snak.property })),
    }
}

/// Group snaks into `{property: [snak]}` plus the property order
pub fn encode_snak_group(snaks: &[Snak]) -> Result<(Value, Vec<String>), KbError> {
    let mut group = Map::new();
    let mut order: Vec<String> = Vec::new();

    for snak in snaks {
        if !order.contains(&snak.property) {
            order.push(snak.property.clone());
        }
        let entry = group
            .entry(snak.property.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.push(encode_snak(snak)?);
        }
    }

    Ok((Value::Object(group), order))
}

fn encode_claim(claim: &Claim) -> Result<Value, KbError> {
    let mainsnak = encode_snak(&Snak {
        property: claim.property.clone(),
        value: claim.value.clone(),
    })?;

    let mut statement = json!({
        "mainsnak": mainsnak,
        "type": "statement",
        "rank": "normal",
    });

    if !claim.qualifiers.is_empty() {
        let (qualifiers, order) = encode_snak_group(&claim.qualifiers)?;
        statement["qualifiers"] = qualifiers;
        statement["qualifiers-order"] = json!(order);
    }

    if !claim.sources.is_empty() {
        let mut references = Vec::new();
        for source in &claim.sources {
            let (snaks, order) = encode_snak_group(&source.snaks)?;
            references.push(json!({ "snaks": snaks, "snaks-order": order }));
        }
        statement["references"] = Value::Array(references);
    }

    Ok(statement)
}

/// `data` payload for `wbeditentity` with `new=item`
pub fn encode_draft(draft: &ItemDraft) -> Result<Value, KbError> {
    let terms = |map: &BTreeMap<String, String>| -> Value {
        map.iter()
            .map(|(language, text)| (language.clone(), json!({ "language": language, "value": text })))
            .collect::<Map<String, Value>>()
            .into()
    };

    let aliases: Map<String, Value> = draft
        .aliases
        .iter()
        .map(|(language, names)| {
            let list: Vec<Value> = names
                .iter()
                .map(|name| json!({ "language": language, "value": name }))
                .collect();
            (language.clone(), Value::Array(list))
        })
        .collect();

    let claims = draft
        .claims
        .iter()
        .map(encode_claim)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "labels": terms(&draft.labels),
        "descriptions": terms(&draft.descriptions),
        "aliases": aliases,
        "claims": claims,
    }))
}
