//! # Previously, on esmv...
//!
//! 🎬 The clusters were real, the cloud bill was too. Someone had to stand up a pair of
//! Elasticsearch clusters for every test, and that someone said "no". So here we are:
//! a cluster so simple it lives entirely in RAM, gone the moment you blink.
//!
//! [`InMemoryCluster`] implements [`Cluster`] without a network. It keeps indices,
//! aliases, templates and metadata behind an `Arc<Mutex<...>>` so a test can hand one
//! clone to the migration and keep another to peek inside afterwards.
//!
//! What makes it more than a `HashMap` with ambitions:
//! - every alias change is recorded as a snapshot, so tests can check that nobody ever
//!   saw an alias pointing at zero indices or two
//! - remote reindex is scripted: complete after N polls, lose some documents, fail the
//!   transport, fail the whole task, or never finish at all
//! - the whole cluster can be made unreachable with one call
//!
//! 🦆
//!
//! ⚠️ This is NOT for production. This is for tests. If you're deploying this
//! to prod, please also deploy a therapist.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::backends::Cluster;
use crate::common::{
    AliasAction, ComponentTemplate, IndexCreateBody, IndexTemplate, JsonMap, MetadataItem,
    MetadataKind, ReindexRequest, TaskStatus, TemplateBody,
};
use crate::errors::MigrationError;
use crate::settings;

/// 📇 One index as the in-memory cluster stores it. Settings are the nested index namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredIndex {
    pub settings: JsonMap,
    pub mappings: JsonMap,
    pub aliases: BTreeSet<String>,
    pub doc_count: u64,
}

/// 📸 Who every alias pointed at right after one alias-changing operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasSnapshot {
    pub operation: String,
    pub bindings: BTreeMap<String, BTreeSet<String>>,
}

impl AliasSnapshot {
    pub fn bound_to(&self, alias: &str) -> BTreeSet<String> {
        self.bindings.get(alias).cloned().unwrap_or_default()
    }
}

/// 🎬 How the next remote reindex tasks on this cluster will behave.
#[derive(Debug, Clone, PartialEq)]
pub struct ReindexScript {
    /// Status checks before the task reports completion. `None` never completes.
    pub polls_until_complete: Option<u32>,
    /// Documents that fail to copy; each becomes one failure record.
    pub failed_documents: u64,
    /// Every status check fails at the transport level.
    pub poll_transport_error: bool,
    /// Every status check hangs and never answers, like a cluster stuck in a long GC.
    pub stall_polls: bool,
    /// The task completes, but with a task-level error and nothing copied.
    pub completion_error: Option<String>,
}

impl Default for ReindexScript {
    fn default() -> Self {
        Self {
            polls_until_complete: Some(1),
            failed_documents: 0,
            poll_transport_error: false,
            stall_polls: false,
            completion_error: None,
        }
    }
}

#[derive(Debug)]
struct RunningTask {
    dest_index: String,
    total: u64,
    /// Documents the destination already held at submission; copies of them count as updates.
    already_present: u64,
    polls: u32,
    script: ReindexScript,
    landed: bool,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct ClusterState {
    indices: BTreeMap<String, StoredIndex>,
    index_templates: Vec<IndexTemplate>,
    component_templates: Vec<ComponentTemplate>,
    metadata: BTreeMap<MetadataKind, Vec<MetadataItem>>,
    disabled_kinds: BTreeSet<MetadataKind>,
    failing_puts: BTreeSet<(MetadataKind, String)>,
    remote: Option<InMemoryCluster>,
    script: ReindexScript,
    tasks: BTreeMap<String, RunningTask>,
    next_task: u64,
    reindex_requests: Vec<ReindexRequest>,
    cancelled_tasks: Vec<String>,
    alias_history: Vec<AliasSnapshot>,
    unreachable: bool,
}

impl ClusterState {
    fn check_reachable(&self, action: &str) -> Result<(), MigrationError> {
        if self.unreachable {
            return Err(MigrationError::unreachable(action, "connection refused (in-memory cluster is down)"));
        }
        Ok(())
    }

    fn snapshot_aliases(&mut self, operation: impl Into<String>) {
        let mut bindings: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (index_name, index) in &self.indices {
            for alias in &index.aliases {
                bindings
                    .entry(alias.clone())
                    .or_default()
                    .insert(index_name.clone());
            }
        }
        self.alias_history.push(AliasSnapshot {
            operation: operation.into(),
            bindings,
        });
    }

    fn index_mut(&mut self, index: &str, action: &str) -> Result<&mut StoredIndex, MigrationError> {
        self.indices
            .get_mut(index)
            .ok_or_else(|| MigrationError::not_found(action))
    }
}

/// 🧠 A cluster in a `Mutex`. Clones share the same state.
#[derive(Debug, Clone)]
pub struct InMemoryCluster {
    label: String,
    state: Arc<Mutex<ClusterState>>,
}

fn object(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

impl InMemoryCluster {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Arc::new(Mutex::new(ClusterState::default())),
        }
    }

    // ----- 🌱 seeding -----

    /// 🌱 Put an index straight into the cluster. `settings` may use any of the cluster's spellings.
    pub async fn seed_index(
        &self,
        name: &str,
        settings: Value,
        mappings: Value,
        aliases: &[&str],
        doc_count: u64,
    ) {
        let mut state = self.state.lock().await;
        state.indices.insert(
            name.to_string(),
            StoredIndex {
                settings: settings::index_namespace(&object(settings)),
                mappings: object(mappings),
                aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
                doc_count,
            },
        );
        if !aliases.is_empty() {
            state.snapshot_aliases(format!("seed index '{name}'"));
        }
    }

    pub async fn seed_index_template(&self, template: IndexTemplate) {
        self.state.lock().await.index_templates.push(template);
    }

    pub async fn seed_component_template(&self, template: ComponentTemplate) {
        self.state.lock().await.component_templates.push(template);
    }

    /// 🌱 Store one metadata item. Template kinds go through [`Self::seed_index_template`] instead.
    pub async fn seed_metadata(&self, kind: MetadataKind, name: &str, body: Value) {
        let mut state = self.state.lock().await;
        upsert(
            state.metadata.entry(kind).or_default(),
            MetadataItem {
                name: name.to_string(),
                body,
            },
        );
    }

    /// 🔗 Remote reindex tasks on this cluster pull documents from `source`.
    pub async fn link_remote(&self, source: &InMemoryCluster) {
        self.state.lock().await.remote = Some(source.clone());
    }

    pub async fn script_reindex(&self, script: ReindexScript) {
        self.state.lock().await.script = script;
    }

    /// 💥 Every put of this one item fails as `Fatal`.
    pub async fn fail_puts_for(&self, kind: MetadataKind, name: &str) {
        self.state
            .lock()
            .await
            .failing_puts
            .insert((kind, name.to_string()));
    }

    /// 🚫 Listing this kind answers `NotFound`, like a cluster without the feature installed.
    pub async fn disable_kind(&self, kind: MetadataKind) {
        self.state.lock().await.disabled_kinds.insert(kind);
    }

    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }

    // ----- 🔍 inspection -----

    pub async fn index(&self, name: &str) -> Option<StoredIndex> {
        self.state.lock().await.indices.get(name).cloned()
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.state.lock().await.indices.keys().cloned().collect()
    }

    pub async fn alias_history(&self) -> Vec<AliasSnapshot> {
        self.state.lock().await.alias_history.clone()
    }

    pub async fn metadata(&self, kind: MetadataKind) -> Vec<MetadataItem> {
        let state = self.state.lock().await;
        items_of(&state, kind)
    }

    pub async fn reindex_requests(&self) -> Vec<ReindexRequest> {
        self.state.lock().await.reindex_requests.clone()
    }

    pub async fn cancelled_tasks(&self) -> Vec<String> {
        self.state.lock().await.cancelled_tasks.clone()
    }
}

fn upsert(items: &mut Vec<MetadataItem>, item: MetadataItem) {
    match items.iter_mut().find(|existing| existing.name == item.name) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

// -- 🧩 template kinds live in their typed lists so list_index_templates sees replicated ones
fn items_of(state: &ClusterState, kind: MetadataKind) -> Vec<MetadataItem> {
    match kind {
        MetadataKind::IndexTemplates => state
            .index_templates
            .iter()
            .map(|template| MetadataItem {
                name: template.name.clone(),
                body: json!({
                    "index_patterns": template.index_patterns,
                    "composed_of": template.composed_of,
                    "priority": template.priority,
                    "template": template.template,
                }),
            })
            .collect(),
        MetadataKind::ComponentTemplates => state
            .component_templates
            .iter()
            .map(|component| MetadataItem {
                name: component.name.clone(),
                body: json!({ "template": component.template }),
            })
            .collect(),
        _ => state.metadata.get(&kind).cloned().unwrap_or_default(),
    }
}

fn template_body_at(body: &Value, action: &str) -> Result<TemplateBody, MigrationError> {
    match body.get("template") {
        None => Ok(TemplateBody::default()),
        Some(template) => serde_json::from_value(template.clone())
            .map_err(|cause| MigrationError::fatal(action, cause)),
    }
}

fn strings_at(body: &Value, key: &str) -> Vec<String> {
    body.get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Cluster for InMemoryCluster {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_indices(&self) -> Result<Vec<String>, MigrationError> {
        let state = self.state.lock().await;
        state.check_reachable("list indices")?;
        Ok(state.indices.keys().cloned().collect())
    }

    async fn get_index(&self, index: &str) -> Result<Value, MigrationError> {
        let action = format!("describe index '{index}'");
        let state = self.state.lock().await;
        state.check_reachable(&action)?;
        let stored = state
            .indices
            .get(index)
            .ok_or_else(|| MigrationError::not_found(&action))?;
        let aliases: JsonMap = stored
            .aliases
            .iter()
            .map(|alias| (alias.clone(), json!({})))
            .collect();
        Ok(json!({
            "aliases": aliases,
            "mappings": stored.mappings,
            "settings": { "index": stored.settings },
        }))
    }

    async fn count_documents(&self, index: &str) -> Result<u64, MigrationError> {
        let action = format!("count documents in '{index}'");
        let state = self.state.lock().await;
        state.check_reachable(&action)?;
        state
            .indices
            .get(index)
            .map(|stored| stored.doc_count)
            .ok_or_else(|| MigrationError::not_found(action))
    }

    async fn list_index_templates(&self) -> Result<Vec<IndexTemplate>, MigrationError> {
        let state = self.state.lock().await;
        state.check_reachable("list index templates")?;
        Ok(state.index_templates.clone())
    }

    async fn list_component_templates(&self) -> Result<Vec<ComponentTemplate>, MigrationError> {
        let state = self.state.lock().await;
        state.check_reachable("list component templates")?;
        Ok(state.component_templates.clone())
    }

    async fn create_index(&self, index: &str, body: &IndexCreateBody) -> Result<(), MigrationError> {
        let action = format!("create index '{index}'");
        let mut state = self.state.lock().await;
        state.check_reachable(&action)?;
        if state.indices.contains_key(index) {
            return Err(MigrationError::already_exists(action));
        }
        state.indices.insert(
            index.to_string(),
            StoredIndex {
                settings: settings::index_namespace(&body.settings),
                mappings: body.mappings.clone(),
                aliases: body.aliases.keys().cloned().collect(),
                doc_count: 0,
            },
        );
        if !body.aliases.is_empty() {
            state.snapshot_aliases(action);
        }
        Ok(())
    }

    async fn put_index_settings(&self, index: &str, settings: &Value) -> Result<(), MigrationError> {
        let action = format!("update settings of '{index}'");
        let mut state = self.state.lock().await;
        state.check_reachable(&action)?;
        let Value::Object(update) = settings else {
            return Err(MigrationError::fatal(action, "settings body is not an object"));
        };
        let stored = state.index_mut(index, &action)?;
        settings::deep_merge(&mut stored.settings, &settings::index_namespace(update));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), MigrationError> {
        let action = format!("delete index '{index}'");
        let mut state = self.state.lock().await;
        state.check_reachable(&action)?;
        let removed = state
            .indices
            .remove(index)
            .ok_or_else(|| MigrationError::not_found(&action))?;
        if !removed.aliases.is_empty() {
            state.snapshot_aliases(action);
        }
        Ok(())
    }

    async fn get_alias_bindings(&self, alias: &str) -> Result<BTreeSet<String>, MigrationError> {
        let state = self.state.lock().await;
        state.check_reachable(&format!("look up alias '{alias}'"))?;
        Ok(state
            .indices
            .iter()
            .filter(|(_, stored)| stored.aliases.contains(alias))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), MigrationError> {
        let action = format!("apply {} alias action(s)", actions.len());
        let mut state = self.state.lock().await;
        state.check_reachable(&action)?;

        // -- ⚛️ stage on a copy, commit only if every action applies
        let mut staged = state.indices.clone();
        for alias_action in actions {
            match alias_action {
                AliasAction::Add { index, alias } => {
                    staged
                        .get_mut(index)
                        .ok_or_else(|| MigrationError::not_found(format!("index '{index}'")))?
                        .aliases
                        .insert(alias.clone());
                }
                AliasAction::Remove { index, alias } => {
                    let removed = staged
                        .get_mut(index)
                        .map(|stored| stored.aliases.remove(alias))
                        .unwrap_or(false);
                    if !removed {
                        return Err(MigrationError::not_found(format!(
                            "alias '{alias}' on index '{index}'"
                        )));
                    }
                }
            }
        }
        state.indices = staged;
        state.snapshot_aliases(action);
        Ok(())
    }

    async fn submit_reindex(&self, request: &ReindexRequest) -> Result<String, MigrationError> {
        let action = format!(
            "submit reindex '{}' → '{}'",
            request.source_index, request.dest_index
        );
        let remote = {
            let state = self.state.lock().await;
            state.check_reachable(&action)?;
            state.remote.clone()
        };
        let Some(remote) = remote else {
            return Err(MigrationError::fatal(action, "no remote source cluster linked"));
        };
        let total = remote.count_documents(&request.source_index).await?;

        let mut state = self.state.lock().await;
        state.reindex_requests.push(request.clone());
        // -- the cluster auto-creates a missing destination, so we do too
        let already_present = state
            .indices
            .entry(request.dest_index.clone())
            .or_default()
            .doc_count;
        state.next_task += 1;
        let task_id = format!("{}:{}", self.label, state.next_task);
        let script = state.script.clone();
        state.tasks.insert(
            task_id.clone(),
            RunningTask {
                dest_index: request.dest_index.clone(),
                total,
                already_present,
                polls: 0,
                script,
                landed: false,
                cancelled: false,
            },
        );
        Ok(task_id)
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus, MigrationError> {
        let action = format!("poll task '{task_id}'");
        let mut guard = self.state.lock().await;
        // -- reborrow so `tasks` and `indices` can be borrowed side by side
        let state = &mut *guard;
        state.check_reachable(&action)?;

        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| MigrationError::not_found(&action))?;
        if task.script.poll_transport_error {
            return Err(MigrationError::unreachable(action, "connection reset by peer"));
        }
        if task.script.stall_polls {
            // -- let go of the state first, other callers still get answers
            drop(guard);
            return std::future::pending().await;
        }
        task.polls += 1;

        let finished = !task.cancelled
            && task
                .script
                .polls_until_complete
                .is_some_and(|needed| task.polls >= needed);
        let copyable = task.total.saturating_sub(task.script.failed_documents);

        if !finished {
            let created = match task.script.polls_until_complete {
                Some(needed) if needed > 0 => copyable * u64::from(task.polls) / u64::from(needed + 1),
                _ => 0,
            };
            return Ok(TaskStatus {
                completed: false,
                created,
                updated: 0,
                total: task.total,
                failures: Vec::new(),
                error: None,
            });
        }

        if let Some(ref reason) = task.script.completion_error {
            return Ok(TaskStatus {
                completed: true,
                created: 0,
                updated: 0,
                total: task.total,
                failures: Vec::new(),
                error: Some(reason.clone()),
            });
        }

        let failures = (0..task.script.failed_documents)
            .map(|n| {
                json!({
                    "index": task.dest_index,
                    "id": format!("doc-{n}"),
                    "cause": {"type": "mapper_parsing_exception", "reason": "failed to parse"},
                    "status": 400
                })
            })
            .collect();
        let updated = task.already_present.min(copyable);
        let created = copyable - updated;
        let status = TaskStatus {
            completed: true,
            created,
            updated,
            total: task.total,
            failures,
            error: None,
        };

        if !task.landed {
            task.landed = true;
            let dest_index = task.dest_index.clone();
            if let Some(stored) = state.indices.get_mut(&dest_index) {
                stored.doc_count += created;
            }
        }
        Ok(status)
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), MigrationError> {
        let action = format!("cancel task '{task_id}'");
        let mut state = self.state.lock().await;
        state.check_reachable(&action)?;
        state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| MigrationError::not_found(&action))?
            .cancelled = true;
        state.cancelled_tasks.push(task_id.to_string());
        Ok(())
    }

    async fn list_metadata(&self, kind: MetadataKind) -> Result<Vec<MetadataItem>, MigrationError> {
        let action = format!("list {kind}s");
        let state = self.state.lock().await;
        state.check_reachable(&action)?;
        if state.disabled_kinds.contains(&kind) {
            return Err(MigrationError::not_found(action));
        }
        Ok(items_of(&state, kind))
    }

    async fn put_metadata(&self, kind: MetadataKind, item: &MetadataItem) -> Result<(), MigrationError> {
        let action = format!("put {kind} '{}'", item.name);
        let mut state = self.state.lock().await;
        state.check_reachable(&action)?;
        if state.failing_puts.contains(&(kind, item.name.clone())) {
            return Err(MigrationError::fatal(action, "403 Forbidden: action is unauthorized"));
        }

        match kind {
            MetadataKind::IndexTemplates => {
                let template = IndexTemplate {
                    name: item.name.clone(),
                    index_patterns: strings_at(&item.body, "index_patterns"),
                    composed_of: strings_at(&item.body, "composed_of"),
                    priority: item.body.get("priority").and_then(Value::as_i64).unwrap_or(0),
                    template: template_body_at(&item.body, &action)?,
                };
                state.index_templates.retain(|existing| existing.name != template.name);
                state.index_templates.push(template);
            }
            MetadataKind::ComponentTemplates => {
                let component = ComponentTemplate {
                    name: item.name.clone(),
                    template: template_body_at(&item.body, &action)?,
                };
                state
                    .component_templates
                    .retain(|existing| existing.name != component.name);
                state.component_templates.push(component);
            }
            _ => upsert(state.metadata.entry(kind).or_default(), item.clone()),
        }
        Ok(())
    }
}
