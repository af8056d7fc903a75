//! 🪞 Cluster Metadata Replicator — everything that isn't documents.
//!
//! Templates, policies, roles, users, pipelines, jobs. Each kind gets the same pass:
//! list it all on the source, put each item on the destination, one at a time. One item
//! failing is a report line, not a reason to stop the pass. 🦆
//!
//! Passes run in [`MetadataKind`] order, which is dependency order, and they all finish
//! before the first index is touched.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backends::Cluster;
use crate::common::{MetadataItem, MetadataKind};
use crate::errors::MigrationError;
use crate::report::{MigrationReport, Outcome};

/// 🔐 User fields a destination cannot accept back. Passwords don't travel.
const CREDENTIAL_FIELDS: [&str; 2] = ["password", "password_hash"];

/// 🔧 The `[metadata]` section.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MetadataConfig {
    #[serde(default = "default_kinds")]
    pub kinds: Vec<MetadataKind>,
}

fn default_kinds() -> Vec<MetadataKind> {
    MetadataKind::ALL.to_vec()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
        }
    }
}

impl MetadataConfig {
    /// 📋 The configured kinds, deduplicated and re-sorted into dependency order.
    pub fn ordered_kinds(&self) -> Vec<MetadataKind> {
        let mut kinds = self.kinds.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// 📊 How one pass went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub kind: MetadataKind,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PassSummary {
    fn new(kind: MetadataKind) -> Self {
        Self {
            kind,
            copied: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// 🪞 Run every configured pass, source to destination, in dependency order.
pub async fn replicate(
    source: &dyn Cluster,
    destination: &dyn Cluster,
    config: &MetadataConfig,
    report: &mut MigrationReport,
) -> Vec<PassSummary> {
    let mut summaries = Vec::new();
    for kind in config.ordered_kinds() {
        summaries.push(replicate_kind(source, destination, kind, report).await);
    }
    summaries
}

/// 🪞 One pass: every `kind` item on the source, put on the destination.
///
/// A source that answers the listing with `NotFound` doesn't have the feature, and the pass
/// is skipped. Any other listing failure is reported once for the whole kind.
pub async fn replicate_kind(
    source: &dyn Cluster,
    destination: &dyn Cluster,
    kind: MetadataKind,
    report: &mut MigrationReport,
) -> PassSummary {
    let mut summary = PassSummary::new(kind);

    let items = match source.list_metadata(kind).await {
        Ok(items) => items,
        Err(MigrationError::NotFound { .. }) => {
            info!("🪞 '{}' has no {} API, skipping the pass", source.name(), kind);
            return summary;
        }
        Err(cause) => {
            warn!("🪞 Could not list {}s on '{}': {}", kind, source.name(), cause);
            report.record_error(kind.label(), "*", &cause);
            summary.failed += 1;
            return summary;
        }
    };

    info!("🪞 Replicating {} {}(s)", items.len(), kind);
    for item in items {
        if is_reserved(&item) {
            debug!("🔒 {} '{}' is built in, leaving it alone", kind, item.name);
            report.record(
                kind.label(),
                &item.name,
                Outcome::Skipped {
                    reason: "built-in (reserved)".to_string(),
                },
            );
            summary.skipped += 1;
            continue;
        }

        let item = prepared(kind, item);
        match destination.put_metadata(kind, &item).await {
            Ok(()) => {
                debug!("🪞 {} '{}' copied", kind, item.name);
                report.record(
                    kind.label(),
                    &item.name,
                    Outcome::Succeeded {
                        detail: "copied".to_string(),
                    },
                );
                summary.copied += 1;
            }
            Err(cause @ MigrationError::AlreadyExists { .. }) => {
                report.record_error(kind.label(), &item.name, &cause);
                summary.copied += 1;
            }
            Err(cause) => {
                warn!("🪞 {} '{}' was not copied: {}", kind, item.name, cause);
                report.record_error(kind.label(), &item.name, &cause);
                summary.failed += 1;
            }
        }
    }

    info!(
        "🪞 {} pass done: {} copied, {} skipped, {} failed",
        kind, summary.copied, summary.skipped, summary.failed
    );
    summary
}

// -- 🔒 roles, users and friends that ship with the cluster carry metadata._reserved = true
fn is_reserved(item: &MetadataItem) -> bool {
    item.body
        .pointer("/metadata/_reserved")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn prepared(kind: MetadataKind, mut item: MetadataItem) -> MetadataItem {
    if kind != MetadataKind::Users {
        return item;
    }
    if let Value::Object(ref mut body) = item.body {
        for field in CREDENTIAL_FIELDS {
            body.remove(field);
        }
    }
    item
}
