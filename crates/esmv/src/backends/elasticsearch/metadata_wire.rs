//! 🗂️ Metadata wire shapes — twelve APIs, twelve opinions about what a list looks like.
//!
//! Some endpoints answer with `{name: body}`, some with `{"things": [{"name": .., "thing": ..}]}`,
//! one hides its ids inside `config.match.name`, and stored scripts live in cluster state
//! because of course they do. This module turns each listing into `(name, body)` pairs where
//! `body` is exactly what the matching `PUT` accepts. The replicator never sees the mess.

use reqwest::Method;
use serde_json::{Value, json};

use crate::common::{MetadataItem, MetadataKind};

/// 📡 How to ask a cluster for every item of one kind.
pub(super) struct ListRequest {
    pub method: Method,
    pub path: &'static str,
    pub body: Option<Value>,
}

pub(super) fn list_request(kind: MetadataKind) -> ListRequest {
    let get = |path| ListRequest {
        method: Method::GET,
        path,
        body: None,
    };
    match kind {
        MetadataKind::ComponentTemplates => get("_component_template"),
        MetadataKind::IndexTemplates => get("_index_template"),
        MetadataKind::LifecyclePolicies => get("_ilm/policy"),
        MetadataKind::Roles => get("_security/role"),
        MetadataKind::Users => get("_security/user"),
        MetadataKind::RoleMappings => get("_security/role_mapping"),
        MetadataKind::IngestPipelines => get("_ingest/pipeline"),
        MetadataKind::StoredScripts => get("_cluster/state/metadata?filter_path=metadata.stored_scripts"),
        MetadataKind::Transforms => get("_transform?size=1000"),
        MetadataKind::RollupJobs => get("_rollup/job/_all"),
        MetadataKind::Watches => ListRequest {
            method: Method::POST,
            path: "_watcher/_query/watches",
            body: Some(json!({ "size": 1000 })),
        },
        MetadataKind::EnrichPolicies => get("_enrich/policy"),
    }
}

/// 📡 Where one item of one kind gets `PUT`.
pub(super) fn put_path(kind: MetadataKind, name: &str) -> String {
    match kind {
        MetadataKind::ComponentTemplates => format!("_component_template/{name}"),
        MetadataKind::IndexTemplates => format!("_index_template/{name}"),
        MetadataKind::LifecyclePolicies => format!("_ilm/policy/{name}"),
        MetadataKind::Roles => format!("_security/role/{name}"),
        MetadataKind::Users => format!("_security/user/{name}"),
        MetadataKind::RoleMappings => format!("_security/role_mapping/{name}"),
        MetadataKind::IngestPipelines => format!("_ingest/pipeline/{name}"),
        MetadataKind::StoredScripts => format!("_scripts/{name}"),
        // -- the transform's source index usually doesn't exist on the destination yet
        MetadataKind::Transforms => format!("_transform/{name}?defer_validation=true"),
        MetadataKind::RollupJobs => format!("_rollup/job/{name}"),
        MetadataKind::Watches => format!("_watcher/watch/{name}"),
        MetadataKind::EnrichPolicies => format!("_enrich/policy/{name}"),
    }
}

/// 🔄 Turn one listing response into put-ready items.
pub(super) fn items_from_listing(
    kind: MetadataKind,
    listing: Value,
) -> Result<Vec<MetadataItem>, String> {
    match kind {
        MetadataKind::ComponentTemplates => listed(
            listing,
            "component_templates",
            |entry| string_at(entry, &["name"]),
            |entry| field(entry, "component_template"),
        ),
        MetadataKind::IndexTemplates => listed(
            listing,
            "index_templates",
            |entry| string_at(entry, &["name"]),
            |entry| field(entry, "index_template"),
        ),
        MetadataKind::LifecyclePolicies => keyed(listing, |policy| {
            json!({ "policy": field(policy, "policy") })
        }),
        MetadataKind::Roles => keyed(listing, |role| without(role, &["transient_metadata"])),
        // -- the name rides in the path, the body may not repeat it
        MetadataKind::Users => keyed(listing, |user| without(user, &["username"])),
        MetadataKind::RoleMappings | MetadataKind::IngestPipelines => keyed(listing, |body| body),
        MetadataKind::StoredScripts => {
            let scripts = match listing.pointer("/metadata/stored_scripts") {
                Some(scripts) => scripts.clone(),
                // -- filter_path answers `{}` when the cluster has no stored scripts at all
                None => json!({}),
            };
            keyed(scripts, |script| json!({ "script": script }))
        }
        MetadataKind::Transforms => listed(
            listing,
            "transforms",
            |entry| string_at(entry, &["id"]),
            |entry| without(entry, &["id", "version", "create_time", "authorization"]),
        ),
        MetadataKind::RollupJobs => listed(
            listing,
            "jobs",
            |entry| string_at(entry, &["config", "id"]),
            |entry| without(field(entry, "config"), &["id"]),
        ),
        MetadataKind::Watches => listed(
            listing,
            "watches",
            |entry| string_at(entry, &["_id"]),
            |entry| field(entry, "watch"),
        ),
        MetadataKind::EnrichPolicies => listed(
            listing,
            "policies",
            enrich_policy_name,
            |entry| match field(entry, "config") {
                Value::Object(config) => Value::Object(
                    config
                        .into_iter()
                        .map(|(policy_type, body)| (policy_type, without(body, &["name"])))
                        .collect(),
                ),
                other => other,
            },
        ),
    }
}

// -- 🔑 `{name: body, ...}`
fn keyed(listing: Value, shape: impl Fn(Value) -> Value) -> Result<Vec<MetadataItem>, String> {
    match listing {
        Value::Object(entries) => Ok(entries
            .into_iter()
            .map(|(name, body)| MetadataItem {
                name,
                body: shape(body),
            })
            .collect()),
        other => Err(format!("expected an object keyed by name, got {other}")),
    }
}

// -- 📋 `{"<key>": [entry, ...]}`, each entry carrying its own name somewhere
fn listed(
    listing: Value,
    key: &str,
    name_of: impl Fn(&Value) -> Option<String>,
    shape: impl Fn(Value) -> Value,
) -> Result<Vec<MetadataItem>, String> {
    let entries = match listing.get(key) {
        Some(Value::Array(entries)) => entries.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => return Err(format!("expected '{key}' to be an array, got {other}")),
    };

    entries
        .into_iter()
        .map(|entry| {
            let name = name_of(&entry).ok_or_else(|| format!("a '{key}' entry has no name: {entry}"))?;
            Ok(MetadataItem {
                name,
                body: shape(entry),
            })
        })
        .collect()
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// -- enrich configs look like {"config": {"match": {"name": ..}}}; the one key is the policy type
fn enrich_policy_name(entry: &Value) -> Option<String> {
    entry
        .get("config")?
        .as_object()?
        .values()
        .find_map(|body| body.get("name").and_then(Value::as_str))
        .map(str::to_string)
}

fn field(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn without(value: Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(mut map) => {
            for key in keys {
                map.remove(*key);
            }
            Value::Object(map)
        }
        other => other,
    }
}
