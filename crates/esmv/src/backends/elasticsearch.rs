//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The monitoring dashboard glows amber in the dark. One engineer, alone,
//! stares at two clusters. The old one is yellow. The new one is green and empty.
//! "I'll just reindex it from remote," they whispered. "It'll be fast," they said.
//!
//! 🚀 This module speaks REST to a real cluster on the migration's behalf: list things,
//! create things, start a remote reindex, poll it, flip aliases. It is equal parts HTTP
//! client, status-code interpreter, and coping mechanism.
//!
//! 🧠 Knowledge graph:
//! - Auth: API key beats basic auth. Same rule, every request.
//! - Status codes become [`MigrationError`] kinds in exactly one place: [`classify_failure`].
//! - Metadata endpoints are all different; [`metadata_wire`] absorbs the differences.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::backends::Cluster;
use crate::common::{
    AliasAction, ComponentTemplate, IndexCreateBody, IndexTemplate, MetadataItem, MetadataKind,
    ReindexRequest, RemoteSource, TaskStatus, TemplateBody,
};
use crate::errors::MigrationError;

mod metadata_wire;

// ============================================================
//  ⚙️ Config
// ============================================================

/// 📡 How to reach one cluster. Lives in `[source]` or `[destination]` of the config.
///
/// 🔧 auth is tri-modal: username+password, api_key, or "I hope anonymous works" (it won't).
#[derive(Deserialize, Clone, PartialEq)]
pub struct ElasticsearchClusterConfig {
    /// 📡 Scheme, host, port. All of it. Yes, I know `localhost` worked in dev.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 Preferred over basic auth when both are set. Hierarchy.
    #[serde(default)]
    pub api_key: Option<String>,
    /// 🔁 The host the *destination* uses to reach this cluster during a remote reindex,
    /// when that differs from `url` (private networks, proxies). Only meaningful on `[source]`.
    #[serde(default)]
    pub remote_host: Option<String>,
    /// ⏳ Whole-request timeout. Generous, because listing a big cluster's templates is not quick.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl ElasticsearchClusterConfig {
    /// 🔧 A config with just a URL and the default timeouts. No credentials.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            api_key: None,
            remote_host: None,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    /// 🔁 This cluster, as the other cluster should see it when pulling documents from it.
    pub fn remote_source(&self) -> RemoteSource {
        RemoteSource {
            host: self
                .remote_host
                .clone()
                .unwrap_or_else(|| self.url.clone())
                .trim_end_matches('/')
                .to_string(),
            username: self.username.clone(),
            password: self.password.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

// -- 🔒 passwords in config are bad enough. passwords in debug logs are a postmortem.
impl fmt::Debug for ElasticsearchClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticsearchClusterConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("remote_host", &self.remote_host)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

// ============================================================
//  📡 The client
// ============================================================

/// 📡 A real cluster, over HTTP.
///
/// One `reqwest::Client` per cluster, reused for every call. Spinning up a new client per
/// request is the networking equivalent of buying a new car every time you need groceries.
#[derive(Debug)]
pub struct ElasticsearchCluster {
    client: reqwest::Client,
    base_url: String,
    config: ElasticsearchClusterConfig,
}

impl ElasticsearchCluster {
    /// 🔧 Build the client without touching the network.
    pub fn new(config: ElasticsearchClusterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// 🚀 Build the client and ping the cluster root, so a wrong URL or bad credentials fail
    /// here instead of forty indices into the run.
    pub async fn connect(config: ElasticsearchClusterConfig) -> Result<Self> {
        let cluster = Self::new(config)?;

        let response = cluster
            .request(Method::GET, "")
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 Knocked on '{}' and nobody answered. Check the URL, the network, and whether the cluster is actually up.",
                    cluster.base_url
                )
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 '{}' answered the ping with {}: {}",
                cluster.base_url,
                status,
                body
            );
        }
        debug!("✅ '{}' is home and taking visitors", cluster.base_url);

        Ok(cluster)
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // -- 🔒 api_key beats basic auth in this club
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {api_key}"))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }

    /// 📡 Send, classify, decode. Empty success bodies come back as `Value::Null`.
    async fn exchange(&self, request: RequestBuilder, action: &str) -> Result<Value, MigrationError> {
        trace!("📡 {}", action);
        let response = request
            .send()
            .await
            .map_err(|cause| MigrationError::unreachable(action, cause))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|cause| MigrationError::unreachable(action, cause))?;

        if !status.is_success() {
            return Err(classify_failure(action, status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|cause| {
            MigrationError::fatal(action, format!("response body is not JSON ({cause}): {body}"))
        })
    }

    async fn get_json(&self, path: &str, action: &str) -> Result<Value, MigrationError> {
        self.exchange(self.request(Method::GET, path), action).await
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        action: &str,
    ) -> Result<Value, MigrationError> {
        self.exchange(self.request(method, path).json(body), action)
            .await
    }

    // -- 🗂️ listings where "nothing of this kind here" comes back as 404
    async fn list_or_empty(&self, kind: MetadataKind) -> Result<Vec<MetadataItem>, MigrationError> {
        match self.list_metadata(kind).await {
            Err(MigrationError::NotFound { .. }) => Ok(Vec::new()),
            other => other,
        }
    }
}

/// 🏷️ The one place an HTTP status turns into a [`MigrationError`] kind.
///
/// - 404 → `NotFound`
/// - 400 carrying `resource_already_exists_exception` → `AlreadyExists`
/// - everything else (401, 403, other 4xx, 5xx) → `Fatal`
///
/// Transport errors never get here; they are `Unreachable` before a status exists.
pub(crate) fn classify_failure(action: &str, status: StatusCode, body: &str) -> MigrationError {
    if status == StatusCode::NOT_FOUND {
        return MigrationError::not_found(action);
    }
    if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
        return MigrationError::already_exists(action);
    }
    MigrationError::fatal(action, format!("{status}: {body}"))
}

// ============================================================
//  📦 Response shapes
// ============================================================

#[derive(Debug, Deserialize)]
struct CatIndexRow {
    index: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SubmittedTask {
    task: String,
}

#[derive(Debug, Deserialize)]
struct IndexTemplateWire {
    #[serde(default)]
    index_patterns: Vec<String>,
    #[serde(default)]
    composed_of: Vec<String>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    template: TemplateBody,
}

#[derive(Debug, Deserialize)]
struct ComponentTemplateWire {
    #[serde(default)]
    template: TemplateBody,
}

/// 📊 Read a `GET _tasks/{id}` response.
///
/// Counters come from `task.status`, which sums across slices. Document failures live in
/// `response.failures` once the task is done. A top-level `error` means the task itself
/// blew up, which is a different animal from a few bad documents.
pub(crate) fn task_status_from(body: &Value) -> TaskStatus {
    let status = body.pointer("/task/status");
    let counter = |name: &str| {
        status
            .and_then(|status| status.get(name))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    let failures = body
        .pointer("/response/failures")
        .or_else(|| status.and_then(|status| status.get("failures")))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let error = body.get("error").filter(|error| !error.is_null()).map(|error| {
        error
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string())
    });

    TaskStatus {
        completed: body.get("completed").and_then(Value::as_bool).unwrap_or(false),
        created: counter("created"),
        updated: counter("updated"),
        total: counter("total"),
        failures,
        error,
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, action: &str) -> Result<T, MigrationError> {
    serde_json::from_value(value)
        .map_err(|cause| MigrationError::fatal(action, format!("unexpected response shape: {cause}")))
}

// ============================================================
//  🏛️ Cluster impl
// ============================================================

#[async_trait]
impl Cluster for ElasticsearchCluster {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn list_indices(&self) -> Result<Vec<String>, MigrationError> {
        let action = "list indices";
        let rows = self
            .get_json("_cat/indices?format=json&expand_wildcards=all&h=index", action)
            .await?;
        let rows: Vec<CatIndexRow> = decode(rows, action)?;
        Ok(rows.into_iter().map(|row| row.index).collect())
    }

    async fn get_index(&self, index: &str) -> Result<Value, MigrationError> {
        let action = format!("describe index '{index}'");
        let mut body = self.get_json(index, &action).await?;
        match body.get_mut(index).map(Value::take) {
            Some(described) => Ok(described),
            None => Err(MigrationError::fatal(
                action,
                "response does not mention the index by name",
            )),
        }
    }

    async fn count_documents(&self, index: &str) -> Result<u64, MigrationError> {
        let action = format!("count documents in '{index}'");
        let body = self.get_json(&format!("{index}/_count"), &action).await?;
        Ok(decode::<CountResponse>(body, &action)?.count)
    }

    async fn list_index_templates(&self) -> Result<Vec<IndexTemplate>, MigrationError> {
        let action = "list index templates";
        self.list_or_empty(MetadataKind::IndexTemplates)
            .await?
            .into_iter()
            .map(|item| {
                let wire: IndexTemplateWire = decode(item.body, action)?;
                Ok(IndexTemplate {
                    name: item.name,
                    index_patterns: wire.index_patterns,
                    composed_of: wire.composed_of,
                    priority: wire.priority.unwrap_or(0),
                    template: wire.template,
                })
            })
            .collect()
    }

    async fn list_component_templates(&self) -> Result<Vec<ComponentTemplate>, MigrationError> {
        let action = "list component templates";
        self.list_or_empty(MetadataKind::ComponentTemplates)
            .await?
            .into_iter()
            .map(|item| {
                let wire: ComponentTemplateWire = decode(item.body, action)?;
                Ok(ComponentTemplate {
                    name: item.name,
                    template: wire.template,
                })
            })
            .collect()
    }

    async fn create_index(&self, index: &str, body: &IndexCreateBody) -> Result<(), MigrationError> {
        let action = format!("create index '{index}'");
        self.send_json(Method::PUT, index, &body.to_json(), &action)
            .await?;
        Ok(())
    }

    async fn put_index_settings(&self, index: &str, settings: &Value) -> Result<(), MigrationError> {
        let action = format!("update settings of '{index}'");
        self.send_json(Method::PUT, &format!("{index}/_settings"), settings, &action)
            .await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), MigrationError> {
        let action = format!("delete index '{index}'");
        self.exchange(self.request(Method::DELETE, index), &action)
            .await?;
        Ok(())
    }

    async fn get_alias_bindings(&self, alias: &str) -> Result<BTreeSet<String>, MigrationError> {
        let action = format!("look up alias '{alias}'");
        match self.get_json(&format!("_alias/{alias}"), &action).await {
            Ok(Value::Object(bound)) => Ok(bound.keys().cloned().collect()),
            Ok(_) => Ok(BTreeSet::new()),
            // -- an alias nobody uses yet is an empty set, not a problem
            Err(MigrationError::NotFound { .. }) => Ok(BTreeSet::new()),
            Err(other) => Err(other),
        }
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), MigrationError> {
        let action = format!("apply {} alias action(s)", actions.len());
        self.send_json(Method::POST, "_aliases", &json!({ "actions": actions }), &action)
            .await?;
        Ok(())
    }

    async fn submit_reindex(&self, request: &ReindexRequest) -> Result<String, MigrationError> {
        let action = format!(
            "submit reindex '{}' → '{}'",
            request.source_index, request.dest_index
        );
        let path = format!(
            "_reindex?wait_for_completion=false&slices={}&requests_per_second={}",
            request.slices,
            request.throughput.as_param()
        );
        let body = self
            .send_json(Method::POST, &path, &request.to_json(), &action)
            .await?;
        Ok(decode::<SubmittedTask>(body, &action)?.task)
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus, MigrationError> {
        let action = format!("poll task '{task_id}'");
        let body = self.get_json(&format!("_tasks/{task_id}"), &action).await?;
        Ok(task_status_from(&body))
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), MigrationError> {
        let action = format!("cancel task '{task_id}'");
        self.exchange(
            self.request(Method::POST, &format!("_tasks/{task_id}/_cancel")),
            &action,
        )
        .await?;
        Ok(())
    }

    async fn list_metadata(&self, kind: MetadataKind) -> Result<Vec<MetadataItem>, MigrationError> {
        let action = format!("list {kind}s");
        let call = metadata_wire::list_request(kind);
        let listing = match call.body {
            Some(ref body) => self.send_json(call.method, call.path, body, &action).await?,
            None => self.get_json(call.path, &action).await?,
        };
        metadata_wire::items_from_listing(kind, listing)
            .map_err(|cause| MigrationError::fatal(action, cause))
    }

    async fn put_metadata(&self, kind: MetadataKind, item: &MetadataItem) -> Result<(), MigrationError> {
        let action = format!("put {kind} '{}'", item.name);
        self.send_json(
            Method::PUT,
            &metadata_wire::put_path(kind, &item.name),
            &item.body,
            &action,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Throughput;
    use crate::errors::ErrorKind;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cluster_at(server: &MockServer) -> ElasticsearchCluster {
        ElasticsearchCluster::new(ElasticsearchClusterConfig::new(server.uri()))
            .expect("💀 test client should build")
    }

    #[test]
    fn the_one_where_status_codes_become_error_kinds() {
        assert_eq!(
            classify_failure("x", StatusCode::NOT_FOUND, "").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            classify_failure(
                "x",
                StatusCode::BAD_REQUEST,
                r#"{"error":{"type":"resource_already_exists_exception"}}"#
            )
            .kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            classify_failure("x", StatusCode::BAD_REQUEST, r#"{"error":{"type":"mapper_parsing_exception"}}"#)
                .kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            classify_failure("x", StatusCode::FORBIDDEN, "").kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            classify_failure("x", StatusCode::INTERNAL_SERVER_ERROR, "").kind(),
            ErrorKind::Fatal
        );
    }

    #[test]
    fn the_one_where_the_remote_host_override_wins() {
        let mut the_config = ElasticsearchClusterConfig::new("http://public:9200/");
        assert_eq!(the_config.remote_source().host, "http://public:9200");

        the_config.remote_host = Some("http://private:9200".into());
        the_config.password = Some("hunter2".into());
        assert_eq!(the_config.remote_source().host, "http://private:9200");
        assert!(!format!("{the_config:?}").contains("hunter2"));
    }

    #[test]
    fn the_one_where_a_finished_task_with_bad_documents_is_read_faithfully() {
        let the_body = json!({
            "completed": true,
            "task": {"status": {"total": 10000, "created": 9990, "updated": 0}},
            "response": {"failures": [{"id": "1"}, {"id": "2"}]}
        });

        let the_status = task_status_from(&the_body);

        assert!(the_status.completed);
        assert_eq!((the_status.created, the_status.total), (9990, 10000));
        assert_eq!(the_status.failures.len(), 2);
        assert_eq!(the_status.error, None);
    }

    #[test]
    fn the_one_where_a_task_level_error_is_not_mistaken_for_success() {
        let the_body = json!({
            "completed": true,
            "task": {"status": {"total": 0, "created": 0}},
            "error": {"type": "illegal_argument_exception", "reason": "[host] not whitelisted"}
        });

        assert_eq!(
            task_status_from(&the_body).error.as_deref(),
            Some("[host] not whitelisted")
        );
    }

    #[tokio::test]
    async fn the_one_where_connect_pings_the_root_with_the_api_key() -> Result<()> {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("Authorization", "ApiKey s3cr3t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": {"number": "8.11.0"}})))
            .expect(1)
            .mount(&the_server)
            .await;

        let mut the_config = ElasticsearchClusterConfig::new(the_server.uri());
        the_config.api_key = Some("s3cr3t".into());
        the_config.username = Some("ignored".into());

        ElasticsearchCluster::connect(the_config).await?;
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_connect_refuses_a_cluster_that_says_no() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&the_server)
            .await;

        let the_result =
            ElasticsearchCluster::connect(ElasticsearchClusterConfig::new(the_server.uri())).await;
        assert!(the_result.is_err());
    }

    #[tokio::test]
    async fn the_one_where_creating_an_existing_index_is_already_exists() {
        let the_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/migrated-logs-2024"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"type": "resource_already_exists_exception", "reason": "index [migrated-logs-2024/abc] already exists"},
                "status": 400
            })))
            .mount(&the_server)
            .await;

        let the_result = cluster_at(&the_server)
            .create_index("migrated-logs-2024", &IndexCreateBody::default())
            .await;

        assert!(matches!(the_result, Err(MigrationError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn the_one_where_listing_indices_reads_the_cat_api() -> Result<(), MigrationError> {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_cat/indices"))
            .and(query_param("format", "json"))
            .and(query_param("expand_wildcards", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"index": "logs-2024"},
                {"index": ".security-7"}
            ])))
            .mount(&the_server)
            .await;

        let the_indices = cluster_at(&the_server).list_indices().await?;

        assert_eq!(the_indices, vec!["logs-2024".to_string(), ".security-7".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_reindex_is_submitted_async_with_slices_and_no_brakes(
    ) -> Result<(), MigrationError> {
        let the_server = MockServer::start().await;
        let the_request = ReindexRequest {
            remote: RemoteSource {
                host: "http://source:9200".into(),
                username: Some("elastic".into()),
                password: Some("changeme".into()),
                api_key: None,
            },
            source_index: "logs-2024".into(),
            dest_index: "migrated-logs-2024".into(),
            batch_size: 1000,
            slices: 4,
            throughput: Throughput::Unlimited,
        };
        Mock::given(method("POST"))
            .and(path("/_reindex"))
            .and(query_param("wait_for_completion", "false"))
            .and(query_param("slices", "4"))
            .and(query_param("requests_per_second", "-1"))
            .and(body_json(the_request.to_json()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task": "node-1:42"})))
            .expect(1)
            .mount(&the_server)
            .await;

        let the_task_id = cluster_at(&the_server).submit_reindex(&the_request).await?;

        assert_eq!(the_task_id, "node-1:42");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_alias_updates_go_out_as_one_request() -> Result<(), MigrationError> {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_aliases"))
            .and(body_json(json!({"actions": [
                {"remove": {"index": "logs-2024", "alias": "logs-current"}},
                {"add": {"index": "migrated-logs-2024", "alias": "logs-current"}}
            ]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&the_server)
            .await;

        cluster_at(&the_server)
            .update_aliases(&[
                AliasAction::Remove {
                    index: "logs-2024".into(),
                    alias: "logs-current".into(),
                },
                AliasAction::Add {
                    index: "migrated-logs-2024".into(),
                    alias: "logs-current".into(),
                },
            ])
            .await
    }

    #[tokio::test]
    async fn the_one_where_an_unknown_alias_resolves_to_nobody() -> Result<(), MigrationError> {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_alias/logs-current"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "alias [logs-current] missing", "status": 404
            })))
            .mount(&the_server)
            .await;

        assert!(
            cluster_at(&the_server)
                .get_alias_bindings("logs-current")
                .await?
                .is_empty()
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_index_templates_come_back_typed() -> Result<(), MigrationError> {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_index_template"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"index_templates": [{
                "name": "logs",
                "index_template": {
                    "index_patterns": ["logs-*"],
                    "composed_of": ["base"],
                    "priority": 200,
                    "template": {"settings": {"index": {"number_of_shards": "2"}}}
                }
            }]})))
            .mount(&the_server)
            .await;

        let the_templates = cluster_at(&the_server).list_index_templates().await?;

        assert_eq!(the_templates.len(), 1);
        assert_eq!(the_templates[0].name, "logs");
        assert_eq!(the_templates[0].priority, 200);
        assert_eq!(the_templates[0].composed_of, vec!["base".to_string()]);
        assert_eq!(the_templates[0].index_patterns, vec!["logs-*".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_dead_port_is_unreachable() {
        // -- port 9 (discard) on localhost: nobody home
        let the_cluster = ElasticsearchCluster::new(ElasticsearchClusterConfig::new("http://127.0.0.1:9"))
            .expect("💀 test client should build");

        let the_result = the_cluster.get_task("node-1:42").await;

        assert!(matches!(the_result, Err(MigrationError::Unreachable { .. })));
    }
}
