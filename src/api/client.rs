use anyhow::Context;
use serde_json::{Map, Value, json};
use std::time::Duration;

use super::constants::{
    API_VERSION, actions, headers, resource_endpoint, resources, securable_types,
};
use super::credentials::CredentialPool;
use super::models::{
    ColumnProperties, DashboardDocument, DatasetSchema, HierarchyNode, first_row,
};
use super::resilience::{CallFailure, CallOutcome, FailureKind, OperationContext, RetryPolicy};
use crate::config::Config;

/// Luzmo REST API client with connection pooling.
///
/// Every request is a JSON POST to `<base_url>/<resource>` whose body carries
/// the action, API version and a credential pair taken from the pool.
#[derive(Debug, Clone)]
pub struct LuzmoClient {
    base_url: String,
    http_client: reqwest::Client,
    credentials: CredentialPool,
    retry_policy: RetryPolicy,
}

impl LuzmoClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: CredentialPool,
        retry_policy: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let http_client =
            Self::build_http_client(Duration::from_secs(60), Duration::from_secs(10))?;
        Ok(Self::with_http_client(base_url, http_client, credentials, retry_policy))
    }

    pub fn with_http_client(
        base_url: impl Into<String>,
        http_client: reqwest::Client,
        credentials: CredentialPool,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
            credentials,
            retry_policy,
        }
    }

    pub fn from_config(config: &Config, retry_policy: RetryPolicy) -> anyhow::Result<Self> {
        let credentials = CredentialPool::new(
            config.credentials.clone(),
            config.credentials_rotation.swap_threshold,
        )
        .context("No Luzmo credentials configured")?;
        let http_client = Self::build_http_client(
            Duration::from_secs(config.api.request_timeout_secs),
            Duration::from_secs(config.api.connect_timeout_secs),
        )?;
        Ok(Self::with_http_client(
            config.api.base_url.clone(),
            http_client,
            credentials,
            retry_policy,
        ))
    }

    pub fn build_http_client(
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("dashboard-cloner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")
    }

    /// Same transport, deadline and retry settings, different credential pool.
    /// Used when the destination tenant authenticates differently from the source.
    pub fn with_credentials(&self, credentials: CredentialPool) -> Self {
        Self {
            base_url: self.base_url.clone(),
            http_client: self.http_client.clone(),
            credentials,
            retry_policy: self.retry_policy.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Send one action to a resource through the retry policy.
    ///
    /// `parse` validates a 2xx body; a rejection is a fatal `InvalidResponse`.
    pub async fn call<T, P>(
        &self,
        resource: &str,
        action: &str,
        body: Map<String, Value>,
        parse: P,
    ) -> CallOutcome<T>
    where
        P: Fn(Value) -> Result<T, String>,
    {
        let url = resource_endpoint(&self.base_url, resource);
        let logger = self.retry_policy.logger();
        let mut context = logger.start_operation(action, resource, "");
        logger.add_metadata(&mut context, "url", json!(url));

        self.retry_policy
            .execute(&context, || self.attempt(&context, &url, action, &body, &parse))
            .await
    }

    async fn attempt<T, P>(
        &self,
        context: &OperationContext,
        url: &str,
        action: &str,
        body: &Map<String, Value>,
        parse: &P,
    ) -> CallOutcome<T>
    where
        P: Fn(Value) -> Result<T, String>,
    {
        let credential = self.credentials.next_credential();

        let mut payload = body.clone();
        payload.insert("action".to_string(), json!(action));
        payload.insert("version".to_string(), json!(API_VERSION));
        payload.insert("key".to_string(), json!(credential.key));
        payload.insert("token".to_string(), json!(credential.token));
        let payload = Value::Object(payload);

        self.retry_policy.logger().log_request(context, url, &payload);

        let response = match self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, headers::CONTENT_TYPE_JSON)
            .header(headers::X_CORRELATION_ID, &context.correlation_id)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return CallOutcome::failed(CallFailure::from_reqwest_error(&e)),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return CallOutcome::failed(CallFailure::from_reqwest_error(&e)),
        };

        if !status.is_success() {
            return CallOutcome::failed(CallFailure::from_status(status.as_u16(), &text));
        }

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                return CallOutcome::FatalFailure(
                    CallFailure::new(
                        FailureKind::InvalidResponse,
                        format!("response is not JSON: {}", e),
                    )
                    .with_status(status.as_u16()),
                );
            }
        };

        match parse(value) {
            Ok(parsed) => CallOutcome::Success(parsed),
            Err(message) => CallOutcome::FatalFailure(
                CallFailure::new(FailureKind::InvalidResponse, message)
                    .with_status(status.as_u16()),
            ),
        }
    }

    /// All columns of a dataset
    pub async fn get_dataset_schema(&self, dataset_id: &str) -> CallOutcome<DatasetSchema> {
        let body = object(json!({
            "find": {
                "where": {"type": securable_types::DATASET, "id": dataset_id},
                "include": [{"model": "Column"}]
            }
        }));
        let id = dataset_id.to_string();

        self.call(resources::SECURABLE, actions::GET, body, move |value| {
            let row = first_row(&value).ok_or_else(|| format!("Dataset {} not found", id))?;
            DatasetSchema::from_row(&id, row)
        })
        .await
    }

    /// Full property bag of one column
    pub async fn get_column(&self, column_id: &str) -> CallOutcome<ColumnProperties> {
        let body = object(json!({"find": {"where": {"id": column_id}}}));
        let id = column_id.to_string();

        self.call(resources::COLUMN, actions::GET, body, move |value| {
            first_row(&value)
                .and_then(|row| row.as_object())
                .cloned()
                .ok_or_else(|| format!("Column {} not found", id))
        })
        .await
    }

    pub async fn update_column(
        &self,
        column_id: &str,
        properties: &ColumnProperties,
    ) -> CallOutcome<Value> {
        let body = object(json!({"id": column_id, "properties": properties}));
        self.call(resources::COLUMN, actions::UPDATE, body, Ok).await
    }

    /// Hierarchy tree of a column. The service answers with a bare array of
    /// root nodes; a `rows` envelope is accepted as well.
    pub async fn get_hierarchy(
        &self,
        column_id: &str,
        dataset_id: &str,
    ) -> CallOutcome<Vec<HierarchyNode>> {
        let body = object(json!({
            "find": {"where": {"column_id": column_id, "securable_id": dataset_id}}
        }));

        self.call(resources::HIERARCHY, actions::GET, body, |value| {
            let nodes = match value {
                Value::Array(nodes) => Value::Array(nodes),
                Value::Object(mut map) => map
                    .remove("rows")
                    .ok_or_else(|| "Hierarchy response has no rows".to_string())?,
                other => return Err(format!("Unexpected hierarchy response: {}", other)),
            };
            serde_json::from_value(nodes).map_err(|e| format!("Malformed hierarchy: {}", e))
        })
        .await
    }

    pub async fn update_hierarchy(
        &self,
        column_id: &str,
        updates: &[HierarchyNode],
    ) -> CallOutcome<Value> {
        let body = object(json!({"id": column_id, "properties": {"updates": updates}}));
        self.call(resources::HIERARCHY, actions::UPDATE, body, Ok).await
    }

    /// Dashboard securable with its datasets and their column ids and names embedded
    pub async fn get_dashboard(&self, dashboard_id: &str) -> CallOutcome<DashboardDocument> {
        let body = object(json!({
            "find": {
                "where": {"id": dashboard_id, "type": securable_types::DASHBOARD},
                "include": [{
                    "model": "Securable",
                    "as": "Datasets",
                    "include": [{
                        "attributes": ["id", "name"],
                        "model": "Column",
                        "jointype": "inner"
                    }]
                }]
            }
        }));
        let id = dashboard_id.to_string();

        self.call(resources::SECURABLE, actions::GET, body, move |value| {
            let row = first_row(&value).ok_or_else(|| format!("Dashboard {} not found", id))?;
            serde_json::from_value(row.clone())
                .map_err(|e| format!("Malformed dashboard {}: {}", id, e))
        })
        .await
    }

    /// Create a dashboard and return its id
    pub async fn create_dashboard(
        &self,
        name: &str,
        contents: &Value,
        css: &Value,
    ) -> CallOutcome<String> {
        let body = object(json!({
            "properties": {
                "type": securable_types::DASHBOARD,
                "name": {"en": name},
                "contents": contents,
                "css": css
            }
        }));
        self.call(resources::SECURABLE, actions::CREATE, body, |value| id_field(&value))
            .await
    }

    /// Dataset id imported from the given source table, if one exists
    pub async fn find_dataset_by_source(&self, table_id: &str) -> CallOutcome<Option<String>> {
        let body = object(json!({
            "find": {
                "where": {"type": securable_types::DATASET, "source_sheet": table_id},
                "attributes": ["id", "name", "source_sheet"]
            }
        }));

        self.call(resources::SECURABLE, actions::GET, body, |value| {
            Ok(first_row(&value)
                .and_then(|row| row.get("id"))
                .and_then(|id| id.as_str())
                .map(str::to_string))
        })
        .await
    }

    /// Import a BigQuery table as a new dataset, returning the dataset id
    pub async fn create_dataset_provider(
        &self,
        account_id: &str,
        table_id: &str,
    ) -> CallOutcome<String> {
        let body = object(json!({
            "properties": {
                "provider": "bigquery",
                "action": "create",
                "account_id": account_id,
                "datasets": [table_id]
            }
        }));

        self.call(resources::DATAPROVIDER, actions::CREATE, body, |value| {
            value
                .get("data")
                .and_then(|data| data.get(0))
                .and_then(|dataset| dataset.get("id"))
                .and_then(|id| id.as_str())
                .map(str::to_string)
                .ok_or_else(|| "Data provider response has no data[0].id".to_string())
        })
        .await
    }

    /// Create a full-load acceleration schedule, returning its id
    pub async fn create_acceleration(
        &self,
        started_at: &str,
        frequency_hours: u32,
    ) -> CallOutcome<String> {
        let body = object(json!({
            "properties": {
                "load_type": "full",
                "schedule": {
                    "started_at": started_at,
                    "frequency_quantity": frequency_hours,
                    "frequency_unit": "hour"
                }
            }
        }));
        self.call(resources::ACCELERATION, actions::CREATE, body, |value| id_field(&value))
            .await
    }

    pub async fn associate_acceleration(
        &self,
        acceleration_id: &str,
        dataset_id: &str,
    ) -> CallOutcome<Value> {
        let body = object(json!({
            "id": acceleration_id,
            "resource": {"role": "Securable", "id": dataset_id}
        }));
        self.call(resources::ACCELERATION, actions::ASSOCIATE, body, Ok)
            .await
    }

    pub async fn create_collection(&self, name: &str) -> CallOutcome<String> {
        let body = object(json!({"properties": {"name": {"en": name}}}));
        self.call(resources::COLLECTION, actions::CREATE, body, |value| id_field(&value))
            .await
    }

    /// Add a securable to a collection with full access flags
    pub async fn associate_collection(
        &self,
        collection_id: &str,
        resource_id: &str,
    ) -> CallOutcome<Value> {
        let body = object(json!({
            "id": collection_id,
            "resource": {"role": "Securables", "id": resource_id},
            "properties": {
                "flagRead": true,
                "flagModify": true,
                "flagUse": true,
                "flagOwn": true
            }
        }));
        self.call(resources::COLLECTION, actions::ASSOCIATE, body, Ok)
            .await
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn id_field(value: &Value) -> Result<String, String> {
    value
        .get("id")
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .ok_or_else(|| "Response has no 'id' field".to_string())
}
