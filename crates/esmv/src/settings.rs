//! ⚙️ Settings plumbing — turning the cluster's many spellings of "settings" into one.
//!
//! Elasticsearch will happily hand you `{"index": {"number_of_shards": "1"}}`,
//! `{"index.number_of_shards": "1"}`, or `{"number_of_shards": "1"}` and mean the same thing.
//! Everything in here normalizes to the *index namespace* as a nested map:
//! `{"number_of_shards": "1", "lifecycle": {"name": "hot-warm"}}`.

use serde_json::{Map, Value};

use crate::common::JsonMap;

/// 🗑️ Keys the cluster stamps onto a live index that must never be replayed on creation.
/// Matched as prefixes against the top level of the index namespace.
pub(crate) const EPHEMERAL_SETTING_PREFIXES: [&str; 3] = ["version", "uuid", "provided_name"];

/// 🔄 Fold any settings spelling into the nested index namespace.
pub(crate) fn index_namespace(raw: &JsonMap) -> JsonMap {
    let mut namespace = JsonMap::new();
    for (key, value) in raw {
        if key == "index" {
            if let Value::Object(inner) = value {
                for (inner_key, inner_value) in inner {
                    insert_path(&mut namespace, inner_key, inner_value.clone());
                }
                continue;
            }
        }
        let path = key.strip_prefix("index.").unwrap_or(key.as_str());
        insert_path(&mut namespace, path, value.clone());
    }
    namespace
}

// -- 🧵 "a.b.c" → {"a":{"b":{"c": value}}}, merging into whatever is already there
fn insert_path(target: &mut JsonMap, dotted: &str, value: Value) {
    match dotted.split_once('.') {
        None => {
            let merged = match (target.get_mut(dotted), &value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    deep_merge(existing, incoming);
                    true
                }
                _ => false,
            };
            if !merged {
                target.insert(dotted.to_string(), value);
            }
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// 🧹 Drop the ephemeral keys (`version*`, `uuid*`, `provided_name*`) from an index namespace.
pub(crate) fn strip_ephemeral(namespace: &JsonMap) -> JsonMap {
    namespace
        .iter()
        .filter(|(key, _)| {
            !EPHEMERAL_SETTING_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// 🥞 Layer `overlay` on top of `base`. Objects merge key by key, everything else is replaced.
pub(crate) fn deep_merge(base: &mut JsonMap, overlay: &JsonMap) {
    for (key, incoming) in overlay {
        if let (Some(Value::Object(existing)), Value::Object(incoming_map)) =
            (base.get_mut(key), incoming)
        {
            deep_merge(existing, incoming_map);
            continue;
        }
        base.insert(key.clone(), incoming.clone());
    }
}

/// 🕒 The lifecycle policy bound to an index, if any, from its index namespace.
pub(crate) fn lifecycle_name(namespace: &JsonMap) -> Option<String> {
    namespace
        .get("lifecycle")
        .and_then(|lifecycle| lifecycle.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("💀 expected an object, got {other}"),
        }
    }

    #[test]
    fn the_one_where_three_spellings_become_one_namespace() {
        let the_mess = as_map(json!({
            "index": {"number_of_shards": "3"},
            "index.lifecycle.name": "hot-warm",
            "number_of_replicas": "1"
        }));

        let the_namespace = index_namespace(&the_mess);

        assert_eq!(
            Value::Object(the_namespace),
            json!({
                "number_of_shards": "3",
                "number_of_replicas": "1",
                "lifecycle": {"name": "hot-warm"}
            })
        );
    }

    #[test]
    fn the_one_where_the_ephemeral_keys_get_shown_the_door() {
        let the_live_settings = as_map(json!({
            "number_of_shards": "1",
            "uuid": "abc123",
            "version": {"created": "8110099"},
            "provided_name": "logs-2024",
            "creation_date": "1700000000000"
        }));

        let the_survivors = strip_ephemeral(&the_live_settings);

        assert_eq!(
            Value::Object(the_survivors),
            json!({"number_of_shards": "1", "creation_date": "1700000000000"})
        );
    }

    #[test]
    fn the_one_where_later_layers_win_but_siblings_survive() {
        let mut the_base = as_map(json!({"properties": {"a": {"type": "keyword"}}, "dynamic": true}));
        let the_overlay = as_map(json!({"properties": {"b": {"type": "long"}}, "dynamic": false}));

        deep_merge(&mut the_base, &the_overlay);

        assert_eq!(
            Value::Object(the_base),
            json!({
                "properties": {"a": {"type": "keyword"}, "b": {"type": "long"}},
                "dynamic": false
            })
        );
    }

    #[test]
    fn the_one_where_an_empty_lifecycle_name_means_no_policy() {
        assert_eq!(
            lifecycle_name(&as_map(json!({"lifecycle": {"name": "hot-warm"}}))),
            Some("hot-warm".to_string())
        );
        assert_eq!(lifecycle_name(&as_map(json!({"lifecycle": {"name": ""}}))), None);
        assert_eq!(lifecycle_name(&JsonMap::new()), None);
    }
}
