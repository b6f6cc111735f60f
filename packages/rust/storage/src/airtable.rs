//! Airtable REST API record store.

use async_trait::async_trait;
use contentpipe_formula::Formula;
use contentpipe_shared::{
    ContentPipeError, FieldValue, Fields, Record, RecordId, Result, StoreConfig, resolve_env,
    transport_error,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::RecordSource;

/// Resolved Airtable connection settings.
#[derive(Debug, Clone)]
pub struct AirtableSettings {
    pub api_url: String,
    pub api_key: String,
    pub base_id: String,
    pub table: String,
    pub view: Option<String>,
}

impl AirtableSettings {
    /// Resolve credentials named by `[store]` from the environment.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            api_url: config.api_url.clone(),
            api_key: resolve_env(&config.api_key_env)?,
            base_id: resolve_env(&config.base_id_env)?,
            table: resolve_env(&config.table_name_env)?,
            view: config.view.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<ApiRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    id: String,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl From<ApiRecord> for Record {
    fn from(api: ApiRecord) -> Self {
        let fields = api
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
            .collect();
        Record::new(api.id, fields)
    }
}

/// Record store backed by one Airtable table.
pub struct AirtableStore {
    client: Client,
    settings: AirtableSettings,
    table_url: Url,
}

impl AirtableStore {
    pub fn new(client: Client, settings: AirtableSettings) -> Result<Self> {
        let mut table_url = Url::parse(&settings.api_url).map_err(|e| {
            ContentPipeError::config(format!("invalid Airtable API URL '{}': {e}", settings.api_url))
        })?;
        table_url
            .path_segments_mut()
            .map_err(|_| ContentPipeError::config("Airtable API URL cannot be a base"))?
            .pop_if_empty()
            .push(&settings.base_id)
            .push(&settings.table);

        Ok(Self {
            client,
            settings,
            table_url,
        })
    }

    fn record_url(&self, id: &RecordId) -> Url {
        let mut url = self.table_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id.as_str());
        }
        url
    }

    async fn fetch_page(&self, filter: &str, offset: Option<&str>) -> Result<ListResponse> {
        let mut query: Vec<(&str, &str)> = vec![("filterByFormula", filter)];
        if let Some(view) = self.settings.view.as_deref() {
            query.push(("view", view));
        }
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }

        let response = self
            .client
            .get(self.table_url.clone())
            .bearer_auth(&self.settings.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(self.table_url.as_str(), e))?;

        let response = check_status(response, "list").await?;
        response
            .json()
            .await
            .map_err(|e| ContentPipeError::parse(format!("Airtable list response: {e}")))
    }
}

async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ContentPipeError::Storage(format!(
        "Airtable {operation} returned {status}: {body}"
    )))
}

fn fields_body(fields: &Fields) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::json!({ "fields": map })
}

#[async_trait]
impl RecordSource for AirtableStore {
    fn name(&self) -> &str {
        "airtable"
    }

    #[instrument(skip_all, fields(formula = %filter))]
    async fn list(&self, filter: &Formula) -> Result<Vec<Record>> {
        let formula = filter.to_string();
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.fetch_page(&formula, offset.as_deref()).await?;
            debug!(count = page.records.len(), "fetched page");
            records.extend(page.records.into_iter().map(Record::from));

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    #[instrument(skip_all, fields(record = %id))]
    async fn update(&self, id: &RecordId, fields: &Fields) -> Result<()> {
        let url = self.record_url(id);
        let response = self
            .client
            .patch(url.clone())
            .bearer_auth(&self.settings.api_key)
            .json(&fields_body(fields))
            .send()
            .await
            .map_err(|e| transport_error(url.as_str(), e))?;

        check_status(response, "update").await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn create(&self, fields: &Fields) -> Result<RecordId> {
        let response = self
            .client
            .post(self.table_url.clone())
            .bearer_auth(&self.settings.api_key)
            .json(&fields_body(fields))
            .send()
            .await
            .map_err(|e| transport_error(self.table_url.as_str(), e))?;

        let response = check_status(response, "create").await?;
        let created: ApiRecord = response
            .json()
            .await
            .map_err(|e| ContentPipeError::parse(format!("Airtable create response: {e}")))?;
        Ok(RecordId(created.id))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn store(server: &MockServer) -> AirtableStore {
        let settings = AirtableSettings {
            api_url: format!("{}/v0", server.uri()),
            api_key: "pat_test".into(),
            base_id: "appBASE".into(),
            table: "Content".into(),
            view: None,
        };
        AirtableStore::new(Client::new(), settings).unwrap()
    }

    #[tokio::test]
    async fn list_follows_offset_cursor() {
        let server = MockServer::start().await;
        let formula = Formula::eq("state", "INIT");

        Mock::given(method("GET"))
            .and(path("/v0/appBASE/Content"))
            .and(query_param("filterByFormula", "{state} = 'INIT'"))
            .and(query_param("offset", "itrNEXT"))
            .and(header("authorization", "Bearer pat_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [{"id": "rec2", "fields": {"state": "INIT"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v0/appBASE/Content"))
            .and(query_param("filterByFormula", "{state} = 'INIT'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [{"id": "rec1", "fields": {"state": "INIT", "count": 3}}],
                "offset": "itrNEXT"
            })))
            .mount(&server)
            .await;

        let records = store(&server).list(&formula).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec1", "rec2"]);
        assert_eq!(records[0].text("count"), "3");
    }

    #[tokio::test]
    async fn update_patches_fields() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v0/appBASE/Content/rec1"))
            .and(body_json(serde_json::json!({
                "fields": {"article_text": "hello", "state": "REVIEW_REQUIRED"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "rec1", "fields": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut fields = Fields::new();
        fields.insert("article_text".into(), "hello".into());
        fields.insert("state".into(), "REVIEW_REQUIRED".into());
        store(&server)
            .update(&RecordId::from("rec1"), &fields)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_returns_new_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v0/appBASE/Content"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "recNEW", "fields": {"source_content_url": "https://blog.example.com/1"}
            })))
            .mount(&server)
            .await;

        let mut fields = Fields::new();
        fields.insert("source_content_url".into(), "https://blog.example.com/1".into());
        let id = store(&server).create(&fields).await.unwrap();
        assert_eq!(id.as_str(), "recNEW");
    }

    #[tokio::test]
    async fn non_success_is_storage_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(422).set_body_string("INVALID_FILTER_BY_FORMULA"))
            .mount(&server)
            .await;

        let err = store(&server)
            .list(&Formula::eq("state", "INIT"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentPipeError::Storage(_)));
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("INVALID_FILTER_BY_FORMULA"));
    }
}
