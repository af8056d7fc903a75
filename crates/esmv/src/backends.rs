//! 🔌 Backends — where the real I/O happens.
//!
//! 🎭 This module is the casting agency for clusters. Need to talk to a real
//! Elasticsearch over HTTP? Need a pretend one that lives in RAM and does exactly
//! what the test told it to? We've got a backend for that.
//!
//! Everything the migration core does to a cluster goes through [`Cluster`]. The core
//! holds an `Arc<dyn Cluster>` for each side and never learns which kind it got.
//! Ignorance is a feature. It's called "abstraction."
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::{
    AliasAction, ComponentTemplate, IndexCreateBody, IndexTemplate, MetadataItem, MetadataKind,
    ReindexRequest, TaskStatus,
};
use crate::errors::MigrationError;

pub mod elasticsearch;
pub mod in_mem;

pub use elasticsearch::{ElasticsearchCluster, ElasticsearchClusterConfig};
pub use in_mem::{InMemoryCluster, ReindexScript};

/// 🏛️ A cluster, as far as a migration is concerned.
///
/// Every call may block on I/O and every call may fail with any [`MigrationError`] kind.
/// The cluster is shared with the rest of the world: nothing here holds a lock over it,
/// and two calls in a row may see different states.
///
/// # Contract
/// - `create_index` on an existing name fails with `AlreadyExists`. Callers decide if that's a win.
/// - `get_alias_bindings` on an alias nobody uses returns an empty set, not `NotFound`.
/// - `update_aliases` applies every action or none of them.
/// - `list_metadata` returns bodies already shaped for `put_metadata` on another cluster.
#[async_trait]
pub trait Cluster: std::fmt::Debug + Send + Sync {
    /// 🏷️ Something to put in log lines. A URL, a label, a nickname.
    fn name(&self) -> &str;

    /// 📋 Every index name, system ones included. Filtering is the catalog's job.
    async fn list_indices(&self) -> Result<Vec<String>, MigrationError>;

    /// 📇 The raw `{aliases, mappings, settings}` body for one index.
    async fn get_index(&self, index: &str) -> Result<Value, MigrationError>;

    /// 🔢 How many documents live in `index` right now.
    async fn count_documents(&self, index: &str) -> Result<u64, MigrationError>;

    async fn list_index_templates(&self) -> Result<Vec<IndexTemplate>, MigrationError>;

    async fn list_component_templates(&self) -> Result<Vec<ComponentTemplate>, MigrationError>;

    /// 🏗️ Create an index in one request: settings, mappings and aliases together.
    async fn create_index(&self, index: &str, body: &IndexCreateBody)
    -> Result<(), MigrationError>;

    /// ⚙️ Dynamic settings update, e.g. `{"index.lifecycle.name": "hot-warm"}`.
    async fn put_index_settings(&self, index: &str, settings: &Value)
    -> Result<(), MigrationError>;

    async fn delete_index(&self, index: &str) -> Result<(), MigrationError>;

    /// 🔗 Which indices does `alias` resolve to right now?
    async fn get_alias_bindings(&self, alias: &str) -> Result<BTreeSet<String>, MigrationError>;

    /// ⚛️ Apply every action in one atomic request.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), MigrationError>;

    /// 🚚 Start an async remote reindex. Returns the task id.
    async fn submit_reindex(&self, request: &ReindexRequest) -> Result<String, MigrationError>;

    /// 📊 One status check of a running (or finished) task.
    async fn get_task(&self, task_id: &str) -> Result<TaskStatus, MigrationError>;

    /// 🛑 Ask the cluster to stop a task. Best effort, the task may already be done.
    async fn cancel_task(&self, task_id: &str) -> Result<(), MigrationError>;

    /// 🗂️ Every item of one metadata kind.
    async fn list_metadata(&self, kind: MetadataKind) -> Result<Vec<MetadataItem>, MigrationError>;

    /// 🗂️ Create or overwrite one item of one metadata kind.
    async fn put_metadata(&self, kind: MetadataKind, item: &MetadataItem)
    -> Result<(), MigrationError>;
}
