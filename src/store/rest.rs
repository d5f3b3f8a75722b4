//! Remote store for signed-in accounts, spoken over a PostgREST-style HTTP API
//! (`/rest/v1/<table>`).
//!
//! Rows carry `user_id`, `text`, `translation`, `context`, `stage`,
//! `next_review_at` (epoch ms) and a server-stamped `created_at`. Requests
//! authenticate with the project api key plus the account's bearer token.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Deserializer, Serialize};

use super::{Store, StoreResult};
use crate::config::CloudConfig;
use crate::error::StoreError;
use crate::memory::types::{now_ms, ItemDraft, MemoryItem, Owner, SyncState};

#[derive(Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    table: String,
    api_key: String,
    access_token: String,
}

/// Row shape sent on insert.
#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    user_id: &'a str,
    text: &'a str,
    translation: Option<&'a str>,
    context: &'a str,
    stage: usize,
    next_review_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

/// Row shape returned by the server.
#[derive(Debug, Deserialize)]
struct Row {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    text: String,
    #[serde(default)]
    translation: Option<String>,
    #[serde(default)]
    context: Option<String>,
    stage: i64,
    next_review_at: i64,
    #[serde(default)]
    created_at: Option<String>,
}

/// Server ids may be uuids or integers.
fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

impl Row {
    fn into_item(self) -> MemoryItem {
        let added_at = self
            .created_at
            .as_deref()
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| {
                tracing::warn!(id = %self.id, "row without a parseable created_at");
                now_ms()
            });
        MemoryItem {
            id: self.id,
            text: self.text,
            translation: self.translation,
            context: self.context.unwrap_or_else(|| "General".into()),
            added_at,
            next_review_at: self.next_review_at,
            stage: usize::try_from(self.stage).unwrap_or(0),
            sync: SyncState::Synced,
        }
    }
}

impl RestStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            table: "memory_items".into(),
            api_key: api_key.into(),
            access_token: access_token.into(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Build a store from `[cloud]` config when a session is configured.
    pub fn from_config(config: &CloudConfig) -> Option<Self> {
        let (_, token) = config.session()?;
        Some(Self::new(&config.url, &config.api_key, token).with_table(&config.table))
    }

    fn endpoint(&self, params: &[(&str, String)], fail: fn(String) -> StoreError) -> StoreResult<Url> {
        let base = format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), self.table);
        Url::parse_with_params(&base, params).map_err(|e| fail(format!("invalid cloud url: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
    }

    fn account<'a>(&self, owner: &'a Owner, fail: fn(String) -> StoreError) -> StoreResult<&'a str> {
        match owner {
            Owner::Cloud { account_id } => Ok(account_id),
            Owner::Local => Err(fail("remote store only holds cloud accounts".into())),
        }
    }

    async fn send(&self, builder: RequestBuilder, fail: fn(String) -> StoreError) -> StoreResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(fail(format!("HTTP {status}: {body}")))
    }

    async fn rows(response: Response, fail: fn(String) -> StoreError) -> StoreResult<Vec<Row>> {
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| fail(format!("unexpected response body: {e}")))
    }
}

fn insert_row<'a>(account: &'a str, draft: &'a ItemDraft) -> InsertRow<'a> {
    InsertRow {
        user_id: account,
        text: &draft.text,
        translation: draft.translation.as_deref(),
        context: &draft.context,
        stage: draft.stage,
        next_review_at: draft.next_review_at,
        created_at: draft
            .added_at
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339()),
    }
}

#[async_trait]
impl Store for RestStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn list_items(&self, owner: &Owner) -> StoreResult<Vec<MemoryItem>> {
        let fail = StoreError::Unavailable;
        let account = self.account(owner, fail)?;
        let url = self.endpoint(
            &[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{account}")),
                ("order", "next_review_at.asc".to_string()),
            ],
            fail,
        )?;
        let response = self.send(self.request(Method::GET, url), fail).await?;
        let rows = Self::rows(response, fail).await?;
        tracing::debug!(account, count = rows.len(), "listed cloud items");
        Ok(rows.into_iter().map(Row::into_item).collect())
    }

    async fn create_item(&self, owner: &Owner, draft: &ItemDraft) -> StoreResult<MemoryItem> {
        let fail = StoreError::Write;
        let account = self.account(owner, fail)?;
        let url = self.endpoint(&[], fail)?;
        let builder = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&insert_row(account, draft));
        let response = self.send(builder, fail).await?;
        Self::rows(response, fail)
            .await?
            .into_iter()
            .next()
            .map(Row::into_item)
            .ok_or_else(|| fail("insert returned no row".into()))
    }

    async fn update_item(&self, id: &str, stage: usize, next_review_at: i64) -> StoreResult<()> {
        let fail = StoreError::Write;
        let url = self.endpoint(&[("id", format!("eq.{id}"))], fail)?;
        let builder = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "stage": stage, "next_review_at": next_review_at }));
        let response = self.send(builder, fail).await?;
        if Self::rows(response, fail).await?.is_empty() {
            return Err(fail(format!("unknown memory item: {id}")));
        }
        Ok(())
    }

    async fn bulk_create(&self, owner: &Owner, drafts: &[ItemDraft]) -> StoreResult<()> {
        let fail = StoreError::Write;
        let account = self.account(owner, fail)?;
        let url = self.endpoint(&[], fail)?;
        let rows: Vec<InsertRow<'_>> = drafts.iter().map(|d| insert_row(account, d)).collect();
        let builder = self
            .request(Method::POST, url)
            .header("Prefer", "return=minimal")
            .json(&rows);
        self.send(builder, fail).await?;
        tracing::info!(account, count = drafts.len(), "bulk insert accepted");
        Ok(())
    }

    async fn clear(&self, owner: &Owner) -> StoreResult<()> {
        let fail = StoreError::Write;
        let account = self.account(owner, fail)?;
        let url = self.endpoint(&[("user_id", format!("eq.{account}"))], fail)?;
        self.send(self.request(Method::DELETE, url), fail).await?;
        Ok(())
    }
}
