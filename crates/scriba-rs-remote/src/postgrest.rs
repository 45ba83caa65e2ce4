//! PostgREST-backed remote store.

use crate::error::RemoteError;
use crate::schema::{self, CREATE_PROCEDURE, EXEC_SQL_PROCEDURE, LIST_PROCEDURE};
use crate::store::{INTERACTIONS_TABLE, RemotePage, RemoteQuery, RemoteStore, WipeConfirmation};
use crate::strategy::{self, Attempt, Strategy};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use scriba_rs_protocol::{InteractionFilter, InteractionRecord, NewInteraction, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Sentinel id that never matches a row; `neq` on it selects every row.
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Connection options for [`PostgrestStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostgrestOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Try stored procedures before direct table access.
    pub use_stored_procedures: bool,
}

impl Default for PostgrestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            use_stored_procedures: true,
        }
    }
}

/// Remote store speaking the PostgREST dialect under `{url}/rest/v1`.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    http: Client,
    base_url: String,
    strategies: Vec<Strategy>,
}

impl PostgrestStore {
    /// Build a store for `url` authenticated with `key`.
    pub fn new(url: &str, key: &str, options: PostgrestOptions) -> Result<Self, RemoteError> {
        let url = url.trim();
        let key = key.trim();
        if url.is_empty() || key.is_empty() {
            return Err(RemoteError::InvalidConfig(
                "url and key must be non-empty".to_string(),
            ));
        }
        Url::parse(url).map_err(|err| RemoteError::InvalidConfig(format!("invalid url: {err}")))?;

        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(key)
            .map_err(|_| RemoteError::InvalidConfig("key is not a valid header value".to_string()))?;
        api_key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| RemoteError::InvalidConfig("key is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;
        let base_url = url.trim_end_matches('/').to_string();
        info!(
            "initialized postgrest store (url={}, timeout_secs={}, stored_procedures={})",
            base_url,
            options.timeout.as_secs(),
            options.use_stored_procedures
        );
        Ok(Self {
            http,
            base_url,
            strategies: strategy::plan(options.use_stored_procedures),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{procedure}", self.base_url)
    }

    /// Send a request and turn non-success statuses into classified errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status, &body))
    }

    async fn insert_via_procedure(
        &self,
        input: &NewInteraction,
    ) -> Result<InteractionRecord, RemoteError> {
        let args = CreateArgs::from_input(input);
        let response = self
            .send(self.http.post(self.rpc_url(CREATE_PROCEDURE)).json(&args))
            .await?;
        let id: String = response.json().await?;
        Ok(InteractionRecord::from_new(
            RecordId::new(id),
            Utc::now(),
            input.clone(),
        ))
    }

    async fn insert_rows(
        &self,
        inputs: &[NewInteraction],
    ) -> Result<Vec<InteractionRecord>, RemoteError> {
        let rows: Vec<InsertRow<'_>> = inputs.iter().map(InsertRow::from_input).collect();
        let response = self
            .send(
                self.http
                    .post(self.table_url(INTERACTIONS_TABLE))
                    .header("Prefer", "return=representation")
                    .json(&rows),
            )
            .await?;
        let records: Vec<InteractionRecord> = response.json().await?;
        if records.len() != inputs.len() {
            return Err(RemoteError::Decode(format!(
                "insert returned {} rows for {} inputs",
                records.len(),
                inputs.len()
            )));
        }
        Ok(records)
    }

    async fn query_via_procedure(&self, query: &RemoteQuery) -> Result<RemotePage, RemoteError> {
        let args = ListArgs::from_query(query);
        let response = self
            .send(self.http.post(self.rpc_url(LIST_PROCEDURE)).json(&args))
            .await?;
        let records: Vec<InteractionRecord> = response.json().await?;
        Ok(RemotePage {
            records,
            total: None,
        })
    }

    async fn query_table(&self, query: &RemoteQuery) -> Result<RemotePage, RemoteError> {
        let direction = query.direction.as_str();
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            (
                "order".to_string(),
                format!("{}.{direction},id.{direction}", query.sort_by.column()),
            ),
            ("offset".to_string(), query.offset.to_string()),
            ("limit".to_string(), query.limit.to_string()),
        ];
        params.extend(filter_params(&query.filter));

        let mut request = self
            .http
            .get(self.table_url(INTERACTIONS_TABLE))
            .query(&params);
        if query.count_total {
            request = request.header("Prefer", "count=exact");
        }
        let response = self.send(request).await?;
        let total = parse_content_range_total(response.headers().get(CONTENT_RANGE));
        let records: Vec<InteractionRecord> = response.json().await?;
        Ok(RemotePage { records, total })
    }
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    async fn insert(&self, input: &NewInteraction) -> Result<InteractionRecord, RemoteError> {
        let record = strategy::dispatch("insert", &self.strategies, |strategy| async move {
            match strategy {
                Strategy::StoredProcedure => {
                    Attempt::from_write_result(self.insert_via_procedure(input).await)
                }
                Strategy::DirectTable => Attempt::from_write_result(
                    self.insert_rows(std::slice::from_ref(input))
                        .await
                        .and_then(|mut rows| {
                            rows.pop().ok_or_else(|| {
                                RemoteError::Decode("insert returned no rows".to_string())
                            })
                        }),
                ),
            }
        })
        .await?;
        debug!(
            "inserted remote interaction (id={}, type={})",
            record.id, record.interaction_type
        );
        Ok(record)
    }

    async fn insert_batch(
        &self,
        inputs: &[NewInteraction],
    ) -> Result<Vec<InteractionRecord>, RemoteError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.insert_rows(inputs).await?;
        debug!("inserted remote interaction batch (count={})", records.len());
        Ok(records)
    }

    async fn query(&self, query: &RemoteQuery) -> Result<RemotePage, RemoteError> {
        let strategies: Vec<Strategy> = self
            .strategies
            .iter()
            .copied()
            .filter(|strategy| *strategy != Strategy::StoredProcedure || query.is_default_order())
            .collect();
        let page = strategy::dispatch("query", &strategies, |strategy| async move {
            match strategy {
                Strategy::StoredProcedure => {
                    Attempt::from_result(self.query_via_procedure(query).await)
                }
                Strategy::DirectTable => Attempt::from_result(self.query_table(query).await),
            }
        })
        .await?;
        debug!(
            "queried remote interactions (offset={}, limit={}, returned={}, total={:?})",
            query.offset,
            query.limit,
            page.records.len(),
            page.total
        );
        Ok(page)
    }

    async fn count(&self, filter: &InteractionFilter) -> Result<usize, RemoteError> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(filter_params(filter));
        let response = self
            .send(
                self.http
                    .head(self.table_url(INTERACTIONS_TABLE))
                    .query(&params)
                    .header("Prefer", "count=exact"),
            )
            .await?;
        let total = parse_content_range_total(response.headers().get(CONTENT_RANGE))
            .ok_or_else(|| RemoteError::Decode("count response without a total".to_string()))?;
        debug!("counted remote interactions (total={})", total);
        Ok(total)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<InteractionRecord>, RemoteError> {
        let response = self
            .send(
                self.http
                    .get(self.table_url(INTERACTIONS_TABLE))
                    .query(&[
                        ("select", "*".to_string()),
                        ("id", format!("eq.{id}")),
                        ("limit", "1".to_string()),
                    ]),
            )
            .await?;
        let mut records: Vec<InteractionRecord> = response.json().await?;
        Ok(records.pop())
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<bool, RemoteError> {
        let response = self
            .send(
                self.http
                    .delete(self.table_url(INTERACTIONS_TABLE))
                    .query(&[("id", format!("eq.{id}"))])
                    .header("Prefer", "return=representation"),
            )
            .await?;
        let rows: Vec<Value> = response.json().await?;
        let deleted = !rows.is_empty();
        debug!("deleted remote interaction (id={}, found={})", id, deleted);
        Ok(deleted)
    }

    async fn delete_all(&self, confirmation: WipeConfirmation) -> Result<usize, RemoteError> {
        warn!("deleting every remote interaction (table={})", confirmation.table());
        let response = self
            .send(
                self.http
                    .delete(self.table_url(confirmation.table()))
                    .query(&[("id", format!("neq.{NIL_UUID}"))])
                    .header("Prefer", "count=exact, return=minimal"),
            )
            .await?;
        let removed = parse_content_range_total(response.headers().get(CONTENT_RANGE)).unwrap_or(0);
        info!("remote interactions deleted (removed={})", removed);
        Ok(removed)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, RemoteError> {
        let request = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*"), ("limit", "0")]);
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(RemoteError::RelationMissing(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn ensure_schema(&self) -> Result<(), RemoteError> {
        info!("bootstrapping remote schema (table={})", INTERACTIONS_TABLE);
        let body = serde_json::json!({ "sql": schema::bootstrap_sql() });
        match self
            .send(self.http.post(self.rpc_url(EXEC_SQL_PROCEDURE)).json(&body))
            .await
        {
            Ok(_) => Ok(()),
            Err(RemoteError::ProcedureMissing(message)) => Err(RemoteError::ProcedureMissing(
                format!("{EXEC_SQL_PROCEDURE} unavailable; apply the schema SQL manually ({message})"),
            )),
            Err(err) => Err(err),
        }
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    prompt: &'a str,
    response: &'a str,
    model: &'a str,
    interaction_type: &'static str,
    metadata: &'a Value,
    project_id: Option<&'a str>,
    task_id: Option<&'a str>,
    document_id: Option<&'a str>,
}

impl<'a> InsertRow<'a> {
    fn from_input(input: &'a NewInteraction) -> Self {
        Self {
            prompt: &input.prompt,
            response: &input.response,
            model: &input.model,
            interaction_type: input.interaction_type.as_str(),
            metadata: &input.metadata,
            project_id: input.relations.project_id.as_deref(),
            task_id: input.relations.task_id.as_deref(),
            document_id: input.relations.document_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct CreateArgs<'a> {
    p_prompt: &'a str,
    p_response: &'a str,
    p_model: &'a str,
    p_interaction_type: &'static str,
    p_metadata: &'a Value,
    p_project_id: Option<&'a str>,
    p_task_id: Option<&'a str>,
    p_document_id: Option<&'a str>,
}

impl<'a> CreateArgs<'a> {
    fn from_input(input: &'a NewInteraction) -> Self {
        Self {
            p_prompt: &input.prompt,
            p_response: &input.response,
            p_model: &input.model,
            p_interaction_type: input.interaction_type.as_str(),
            p_metadata: &input.metadata,
            p_project_id: input.relations.project_id.as_deref(),
            p_task_id: input.relations.task_id.as_deref(),
            p_document_id: input.relations.document_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ListArgs<'a> {
    p_interaction_type: Option<&'static str>,
    p_project_id: Option<&'a str>,
    p_task_id: Option<&'a str>,
    p_document_id: Option<&'a str>,
    p_limit: usize,
    p_offset: usize,
}

impl<'a> ListArgs<'a> {
    fn from_query(query: &'a RemoteQuery) -> Self {
        Self {
            p_interaction_type: query.filter.interaction_type.map(|kind| kind.as_str()),
            p_project_id: query.filter.project_id.as_deref(),
            p_task_id: query.filter.task_id.as_deref(),
            p_document_id: query.filter.document_id.as_deref(),
            p_limit: query.limit,
            p_offset: query.offset,
        }
    }
}

/// Equality filters in PostgREST `column=eq.value` form.
fn filter_params(filter: &InteractionFilter) -> Vec<(String, String)> {
    [
        (
            "interaction_type",
            filter.interaction_type.map(|kind| kind.as_str().to_string()),
        ),
        ("project_id", filter.project_id.clone()),
        ("task_id", filter.task_id.clone()),
        ("document_id", filter.document_id.clone()),
    ]
    .into_iter()
    .filter_map(|(column, value)| value.map(|value| (column.to_string(), format!("eq.{value}"))))
    .collect()
}

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map an error response onto the remote error taxonomy.
fn classify_error(status: StatusCode, body: &str) -> RemoteError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    match parsed.code.as_deref() {
        Some("42P01") | Some("PGRST205") => return RemoteError::RelationMissing(message),
        Some("42883") | Some("PGRST202") => return RemoteError::ProcedureMissing(message),
        _ => {}
    }
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return RemoteError::Unavailable(format!("{status}: {message}"));
    }
    RemoteError::Api {
        status: status.as_u16(),
        code: parsed.code,
        message,
    }
}

/// Total from a `Content-Range: 0-9/42` header; `None` when unknown.
fn parse_content_range_total(header: Option<&HeaderValue>) -> Option<usize> {
    let value = header?.to_str().ok()?;
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
