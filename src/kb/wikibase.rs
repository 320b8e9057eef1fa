// 🌍 Wikibase HTTP client
//
// Blocking reqwest client over the MediaWiki Action API and the SPARQL query
// service. One instance per run; it owns the cookie session and caches the
// CSRF token used by every write.

use super::model::{Binding, Claim, DataValue, Entity, ItemDraft, Snak};
use super::{statement_id, wire, KbError, KnowledgeBase};
use crate::config::{Credentials, KbSettings};
use serde_json::Value;
use tracing::{debug, info};

pub struct WikibaseClient {
    http: reqwest::blocking::Client,
    api_url: String,
    sparql_url: String,
    bot: bool,
    summary: Option<String>,
    csrf_token: Option<String>,
}

impl WikibaseClient {
    pub fn new(settings: &KbSettings) -> Result<Self, KbError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(settings.user_agent.clone())
            .cookie_store(true)
            .build()
            .map_err(|e| KbError::Network(e.to_string()))?;

        Ok(WikibaseClient {
            http,
            api_url: settings.api_url.clone(),
            sparql_url: settings.sparql_url.clone(),
            bot: settings.bot,
            summary: None,
            csrf_token: None,
        })
    }

    /// Edit summary attached to every write
    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    /// Log in with a bot password. The session cookie is kept by the client.
    pub fn login(&mut self, credentials: &Credentials) -> Result<(), KbError> {
        let tokens = self.get_api(&[("action", "query"), ("meta", "tokens"), ("type", "login")])?;
        let login_token = tokens["query"]["tokens"]["logintoken"]
            .as_str()
            .ok_or_else(|| KbError::Parse("missing login token".into()))?
            .to_string();

        let response = self.send_form(&[
            ("action", "login".to_string()),
            ("lgname", credentials.username.clone()),
            ("lgpassword", credentials.password.clone()),
            ("lgtoken", login_token),
        ])?;

        match response["login"]["result"].as_str() {
            Some("Success") => {
                info!(user = %credentials.username, "logged in");
                // Tokens are tied to the session; fetch a fresh one on next write
                self.csrf_token = None;
                Ok(())
            }
            other => Err(KbError::Login(
                response["login"]["reason"]
                    .as_str()
                    .or(other)
                    .unwrap_or("no result")
                    .to_string(),
            )),
        }
    }

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    fn get_api(&self, params: &[(&str, &str)]) -> Result<Value, KbError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(params)
            .query(&[("format", "json")])
            .send()
            .map_err(|e| KbError::Network(e.to_string()))?;
        read_json(response)
    }

    fn send_form(&self, params: &[(&str, String)]) -> Result<Value, KbError> {
        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("format", "json".to_string()));

        let response = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .map_err(|e| KbError::Network(e.to_string()))?;
        read_json(response)
    }

    fn csrf_token(&mut self) -> Result<String, KbError> {
        if let Some(token) = &self.csrf_token {
            return Ok(token.clone());
        }

        let tokens = self.get_api(&[("action", "query"), ("meta", "tokens")])?;
        let token = tokens["query"]["tokens"]["csrftoken"]
            .as_str()
            .ok_or_else(|| KbError::Parse("missing csrf token".into()))?
            .to_string();
        self.csrf_token = Some(token.clone());
        Ok(token)
    }

    /// POST an edit action with token, bot flag and summary filled in
    fn edit(&mut self, mut params: Vec<(&str, String)>) -> Result<Value, KbError> {
        params.push(("token", self.csrf_token()?));
        if self.bot {
            params.push(("bot", "1".to_string()));
        }
        if let Some(summary) = &self.summary {
            params.push(("summary", summary.clone()));
        }

        let result = self.send_form(&params);
        if let Err(KbError::Api { code, .. }) = &result {
            if code == "badtoken" {
                self.csrf_token = None;
            }
        }
        result
    }
}

fn read_json(response: reqwest::blocking::Response) -> Result<Value, KbError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(KbError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let json: Value = response.json().map_err(|e| KbError::Parse(e.to_string()))?;
    match wire::api_error(&json) {
        Some(error) => Err(error),
        None => Ok(json),
    }
}

// ============================================================================
// EDIT PARAMETERS
// ============================================================================

type Params = Vec<(&'static str, String)>;

fn create_claim_params(entity_id: &str, property: &str, value: &DataValue) -> Result<Params, KbError> {
    Ok(vec![
        ("action", "wbcreateclaim".to_string()),
        ("entity", entity_id.to_string()),
        ("property", property.to_string()),
        ("snaktype", "value".to_string()),
        ("value", wire::encode_value(value)?.to_string()),
    ])
}

fn qualifier_params(claim: &Claim, property: &str, value: &DataValue) -> Result<Params, KbError> {
    Ok(vec![
        ("action", "wbsetqualifier".to_string()),
        ("claim", statement_id(claim)?.to_string()),
        ("property", property.to_string()),
        ("snaktype", "value".to_string()),
        ("value", wire::encode_value(value)?.to_string()),
    ])
}

fn reference_params(claim: &Claim, snaks: &[Snak]) -> Result<Params, KbError> {
    let (group, order) = wire::encode_snak_group(snaks)?;
    Ok(vec![
        ("action", "wbsetreference".to_string()),
        ("statement", statement_id(claim)?.to_string()),
        ("snaks", group.to_string()),
        ("snaks-order", Value::from(order).to_string()),
    ])
}

fn new_item_params(draft: &ItemDraft) -> Result<Params, KbError> {
    Ok(vec![
        ("action", "wbeditentity".to_string()),
        ("new", "item".to_string()),
        ("data", wire::encode_draft(draft)?.to_string()),
    ])
}

impl KnowledgeBase for WikibaseClient {
    fn fetch(&self, id: &str) -> Result<Entity, KbError> {
        debug!(id, "fetching entity");
        let response = self.get_api(&[
            ("action", "wbgetentities"),
            ("ids", id),
            ("props", "labels|descriptions|aliases|claims"),
        ])?;

        let entities = response["entities"]
            .as_object()
            .ok_or_else(|| KbError::Parse("wbgetentities response without entities".into()))?;
        let entity = entities
            .get(id)
            .or_else(|| entities.values().next())
            .ok_or_else(|| KbError::MissingEntity(id.to_string()))?;

        wire::decode_entity(entity)
    }

    fn add_claim(
        &mut self,
        entity_id: &str,
        property: &str,
        value: &DataValue,
    ) -> Result<Claim, KbError> {
        let response = self.edit(create_claim_params(entity_id, property, value)?)?;

        wire::decode_claim(&response["claim"])
    }

    fn add_qualifier(
        &mut self,
        claim: &Claim,
        property: &str,
        value: &DataValue,
    ) -> Result<(), KbError> {
        self.edit(qualifier_params(claim, property, value)?)?;
        Ok(())
    }

    fn add_sources(&mut self, claim: &Claim, snaks: &[Snak]) -> Result<(), KbError> {
        self.edit(reference_params(claim, snaks)?)?;
        Ok(())
    }

    fn query(&self, sparql: &str) -> Result<Vec<Binding>, KbError> {
        debug!(sparql, "running query");
        let response = self
            .http
            .get(&self.sparql_url)
            .query(&[("query", sparql), ("format", "json")])
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .send()
            .map_err(|e| KbError::Network(e.to_string()))?;

        let json = read_json(response)?;
        wire::decode_bindings(&json)
    }

    fn create_item(&mut self, draft: &ItemDraft) -> Result<String, KbError> {
        let response = self.edit(new_item_params(draft)?)?;

        response["entity"]["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| KbError::Parse("wbeditentity response without entity id".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::Quantity;

    fn param<'a>(params: &'a Params, name: &str) -> &'a str {
        params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .unwrap()
    }

    fn saved_claim() -> Claim {
        let mut claim = Claim::new("P2374", DataValue::Quantity(Quantity::with_symmetric_error(0.9926, 0.0008)));
        claim.id = Some("Q123$ABC".to_string());
        claim
    }

    #[test]
    fn test_create_claim_params() {
        let value = DataValue::Quantity(Quantity::with_symmetric_error(0.9926, 0.0008));
        let params = create_claim_params("Q123", "P2374", &value).unwrap();

        assert_eq!(param(&params, "action"), "wbcreateclaim");
        assert_eq!(param(&params, "entity"), "Q123");
        assert_eq!(param(&params, "property"), "P2374");
        assert_eq!(param(&params, "snaktype"), "value");

        let encoded: Value = serde_json::from_str(param(&params, "value")).unwrap();
        assert_eq!(encoded["amount"], "+0.9926");
        assert_eq!(encoded["lowerBound"], "+0.9918");
    }

    #[test]
    fn test_qualifier_params() {
        let params = qualifier_params(&saved_claim(), "P2571", &DataValue::item("Q159375")).unwrap();

        assert_eq!(param(&params, "action"), "wbsetqualifier");
        assert_eq!(param(&params, "claim"), "Q123$ABC");
        assert_eq!(param(&params, "property"), "P2571");
        let encoded: Value = serde_json::from_str(param(&params, "value")).unwrap();
        assert_eq!(encoded["id"], "Q159375");
    }

    #[test]
    fn test_reference_params() {
        let snaks = vec![
            Snak::new("P248", DataValue::item("Q21234191")),
            Snak::new("P393", DataValue::string("2.6")),
            Snak::new("P854", DataValue::string("http://example")),
        ];
        let params = reference_params(&saved_claim(), &snaks).unwrap();

        assert_eq!(param(&params, "action"), "wbsetreference");
        assert_eq!(param(&params, "statement"), "Q123$ABC");
        assert_eq!(param(&params, "snaks-order"), r#"["P248","P393","P854"]"#);

        let group: Value = serde_json::from_str(param(&params, "snaks")).unwrap();
        assert_eq!(group["P393"][0]["datavalue"]["value"], "2.6");
        assert_eq!(group["P248"][0]["snaktype"], "value");
    }

    #[test]
    fn test_unsaved_claim_cannot_be_edited() {
        let claim = Claim::new("P2374", DataValue::string("x"));
        assert!(matches!(
            reference_params(&claim, &[]),
            Err(KbError::UnsavedClaim)
        ));
        assert!(qualifier_params(&claim, "P2571", &DataValue::item("Q1")).is_err());
    }

    #[test]
    fn test_new_item_params() {
        let mut draft = ItemDraft::default();
        draft.labels.insert("en".into(), "Example University".into());
        draft.descriptions.insert("en".into(), "education organization".into());
        draft.claims.push(Claim::new("P6782", DataValue::string("01")));

        let params = new_item_params(&draft).unwrap();

        assert_eq!(param(&params, "action"), "wbeditentity");
        assert_eq!(param(&params, "new"), "item");
        let data: Value = serde_json::from_str(param(&params, "data")).unwrap();
        assert_eq!(data["labels"]["en"]["value"], "Example University");
        assert_eq!(data["descriptions"]["en"]["value"], "education organization");
        assert_eq!(data["claims"][0]["mainsnak"]["property"], "P6782");
    }
}
