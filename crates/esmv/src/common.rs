//! 📦 Common data structures — the nouns of a cluster move.
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! Two clusters. One is old and full of indices that everyone is afraid to touch.
//! The other is new, empty, and smells faintly of freshly provisioned SSDs.
//! Between them: a moving truck made of structs. These are the boxes.
//!
//! Every type here is a snapshot. An `IndexDescriptor` is what the source looked like
//! when we asked, not what it looks like now. Clusters are shared, mutable, and owned by
//! other people. We hold no locks over them. We just read, copy, and hope. 🦆

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::MigrationError;
use crate::settings;

/// 🗺️ A JSON object. Settings, mappings, alias bodies — they all end up as one of these.
pub type JsonMap = serde_json::Map<String, Value>;

/// 🔒 Index names starting with this are cluster-internal and never read or migrated.
pub const SYSTEM_INDEX_MARKER: char = '.';

/// 🔒 `.security-7`, `.kibana_1`, `.watcher-history-*` — the cluster's own diary. Hands off.
pub fn is_system_index(name: &str) -> bool {
    name.starts_with(SYSTEM_INDEX_MARKER)
}

// ============================================================
//  📇 Index descriptors and templates
// ============================================================

/// 📇 One live index on the source, frozen at the moment we described it.
///
/// `settings` is the index namespace in nested form (see [`crate::settings`]).
/// Ephemeral keys like `uuid` are still in here; the provisioner strips them.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub name: String,
    pub settings: JsonMap,
    pub mappings: JsonMap,
    pub aliases: BTreeSet<String>,
    pub lifecycle_policy: Option<String>,
}

impl IndexDescriptor {
    /// 🔧 Build a descriptor from the `{aliases, mappings, settings}` body the cluster returns
    /// for `GET /{index}`.
    pub fn from_index_body(name: &str, body: &Value) -> Result<Self, MigrationError> {
        let Value::Object(body) = body else {
            return Err(MigrationError::fatal(
                format!("describe index '{name}'"),
                "index body is not a JSON object",
            ));
        };

        let raw_settings = object_at(body, "settings");
        let settings = settings::index_namespace(&raw_settings);
        let lifecycle_policy = settings::lifecycle_name(&settings);
        let aliases = object_at(body, "aliases").keys().cloned().collect();

        Ok(Self {
            name: name.to_string(),
            settings,
            mappings: object_at(body, "mappings"),
            aliases,
            lifecycle_policy,
        })
    }
}

// -- 🔍 missing or non-object → empty map. the cluster omits empty sections all the time.
pub(crate) fn object_at(body: &JsonMap, key: &str) -> JsonMap {
    match body.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => JsonMap::new(),
    }
}

/// 🧩 The `template` section shared by index and component templates.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TemplateBody {
    #[serde(default)]
    pub settings: JsonMap,
    #[serde(default)]
    pub mappings: JsonMap,
    #[serde(default)]
    pub aliases: JsonMap,
}

/// 🧩 A composable index template: patterns, priority, components, and its own body.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTemplate {
    pub name: String,
    pub index_patterns: Vec<String>,
    pub composed_of: Vec<String>,
    pub priority: i64,
    pub template: TemplateBody,
}

/// 🧱 A reusable settings/mappings fragment that index templates compose.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTemplate {
    pub name: String,
    pub template: TemplateBody,
}

/// 🏗️ Everything needed to create one destination index in a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexCreateBody {
    /// Index namespace, nested, already free of ephemeral keys.
    pub settings: JsonMap,
    pub mappings: JsonMap,
    pub aliases: JsonMap,
}

impl IndexCreateBody {
    /// 📡 The `PUT /{index}` wire body. Empty sections are left out.
    pub fn to_json(&self) -> Value {
        let mut body = JsonMap::new();
        if !self.settings.is_empty() {
            body.insert("settings".into(), json!({ "index": self.settings }));
        }
        if !self.mappings.is_empty() {
            body.insert("mappings".into(), Value::Object(self.mappings.clone()));
        }
        if !self.aliases.is_empty() {
            body.insert("aliases".into(), Value::Object(self.aliases.clone()));
        }
        Value::Object(body)
    }
}

// ============================================================
//  🔗 Aliases
// ============================================================

/// 🔗 One action inside an atomic `_aliases` request.
///
/// Serializes to the cluster's shape: `{"add": {"index": "...", "alias": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

// ============================================================
//  🗂️ Cluster metadata kinds
// ============================================================

/// 🗂️ Every kind of cluster-level metadata the replicator knows how to move.
///
/// Declaration order IS dependency order: `Ord` sorts a config list into the order the
/// passes must run. Component templates before the index templates that compose them,
/// policies before anything that binds them, principals before the jobs that run as them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    ComponentTemplates,
    IndexTemplates,
    LifecyclePolicies,
    Roles,
    Users,
    RoleMappings,
    IngestPipelines,
    StoredScripts,
    Transforms,
    RollupJobs,
    Watches,
    EnrichPolicies,
}

impl MetadataKind {
    /// 📋 All kinds, dependency order.
    pub const ALL: [MetadataKind; 12] = [
        MetadataKind::ComponentTemplates,
        MetadataKind::IndexTemplates,
        MetadataKind::LifecyclePolicies,
        MetadataKind::Roles,
        MetadataKind::Users,
        MetadataKind::RoleMappings,
        MetadataKind::IngestPipelines,
        MetadataKind::StoredScripts,
        MetadataKind::Transforms,
        MetadataKind::RollupJobs,
        MetadataKind::Watches,
        MetadataKind::EnrichPolicies,
    ];

    /// 🏷️ Singular, human-readable. Shows up in logs and the report.
    pub fn label(&self) -> &'static str {
        match self {
            MetadataKind::ComponentTemplates => "component template",
            MetadataKind::IndexTemplates => "index template",
            MetadataKind::LifecyclePolicies => "lifecycle policy",
            MetadataKind::Roles => "role",
            MetadataKind::Users => "user",
            MetadataKind::RoleMappings => "role mapping",
            MetadataKind::IngestPipelines => "ingest pipeline",
            MetadataKind::StoredScripts => "stored script",
            MetadataKind::Transforms => "transform",
            MetadataKind::RollupJobs => "rollup job",
            MetadataKind::Watches => "watch",
            MetadataKind::EnrichPolicies => "enrich policy",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 📦 One named piece of metadata. `body` is already in the shape the destination's PUT wants.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataItem {
    pub name: String,
    pub body: Value,
}

// ============================================================
//  🚚 Reindex wire types
// ============================================================

/// 🚦 Remote copy rate cap. `Unlimited` is the default and goes over the wire as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Throughput {
    #[default]
    Unlimited,
    DocsPerSecond(f64),
}

impl Throughput {
    /// 🔧 Anything absent, zero, or negative means "no brakes".
    pub fn from_config(requests_per_second: Option<f64>) -> Self {
        match requests_per_second {
            Some(rate) if rate > 0.0 => Throughput::DocsPerSecond(rate),
            _ => Throughput::Unlimited,
        }
    }

    /// 📡 The `requests_per_second` query parameter value.
    pub fn as_param(&self) -> String {
        match self {
            Throughput::Unlimited => "-1".to_string(),
            Throughput::DocsPerSecond(rate) => rate.to_string(),
        }
    }
}

/// 🔒 How the destination cluster reaches back to the source during a remote reindex.
#[derive(Clone, PartialEq)]
pub struct RemoteSource {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
}

// -- 🔒 credentials stay out of debug output, including the logs of whoever debug-prints a request
impl fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSource")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// 🚚 Everything the destination needs to start one asynchronous, sliced, remote copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReindexRequest {
    pub remote: RemoteSource,
    pub source_index: String,
    pub dest_index: String,
    pub batch_size: u32,
    pub slices: u32,
    pub throughput: Throughput,
}

impl ReindexRequest {
    /// 📡 The `POST /_reindex` body. Slices and throttle ride on the query string instead.
    pub fn to_json(&self) -> Value {
        let mut remote = JsonMap::new();
        remote.insert("host".into(), json!(self.remote.host));
        if let Some(ref username) = self.remote.username {
            remote.insert("username".into(), json!(username));
        }
        if let Some(ref password) = self.remote.password {
            remote.insert("password".into(), json!(password));
        }
        if let Some(ref api_key) = self.remote.api_key {
            remote.insert(
                "headers".into(),
                json!({ "Authorization": format!("ApiKey {api_key}") }),
            );
        }

        json!({
            "source": {
                "remote": remote,
                "index": self.source_index,
                "size": self.batch_size,
            },
            "dest": { "index": self.dest_index },
        })
    }
}

/// 📊 One status poll of a remote task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStatus {
    pub completed: bool,
    pub created: u64,
    pub updated: u64,
    pub total: u64,
    /// Document-level failure records, passed through as the cluster reported them.
    pub failures: Vec<Value>,
    /// Task-level error: the task finished, but the copy itself blew up.
    pub error: Option<String>,
}
