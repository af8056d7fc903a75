//! 🔀 Alias Cutover — flip the sign on the door.
//!
//! Readers find data through aliases. Once the copy is done, every alias the source index
//! carried is pointed at the new index with one atomic `_aliases` request per alias: remove it
//! from whatever the destination has it on, add it to the new index, same request. Nobody
//! reading through the alias ever sees it point at zero indices, or at two.
//!
//! Cutover is gated: it only runs for a `Completed` task, and [`CutoverPolicy`] decides
//! whether a completed task with document failures still gets the aliases.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::{info, warn};

use crate::backends::Cluster;
use crate::common::AliasAction;
use crate::errors::MigrationError;
use crate::reindex::{ReindexTask, TaskState};

/// 🚦 When a completed copy earns the aliases.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutoverPolicy {
    /// Any completed copy, document failures or not.
    #[default]
    Always,
    /// Only a completed copy with zero document failures.
    RequireZeroFailures,
}

/// 🔧 The `[cutover]` section.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct CutoverConfig {
    #[serde(default)]
    pub policy: CutoverPolicy,
}

impl CutoverPolicy {
    /// 🚦 `Err(reason)` when this task may not have the aliases.
    pub fn admits(&self, task: &ReindexTask) -> Result<(), String> {
        if task.state != TaskState::Completed {
            return Err(format!("reindex ended {:?}, not Completed", task.state));
        }
        match self {
            CutoverPolicy::RequireZeroFailures if !task.failures.is_empty() => Err(format!(
                "{} document failure(s) and the cutover policy requires zero",
                task.failures.len()
            )),
            _ => Ok(()),
        }
    }
}

/// 🔗 What happened to one alias.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasMove {
    pub alias: String,
    /// Indices the alias was taken off, on success.
    pub result: Result<Vec<String>, MigrationError>,
}

/// 📋 What cutover did for one index.
#[derive(Debug, Clone, PartialEq)]
pub enum CutoverOutcome {
    Blocked { reason: String },
    NoAliases,
    Moved(Vec<AliasMove>),
}

/// 🔀 Move every alias in `aliases` onto `task.dest_index`, if the policy admits the task.
///
/// Aliases are handled independently: one failing alias doesn't stop the rest.
pub async fn cutover(
    destination: &dyn Cluster,
    task: &ReindexTask,
    aliases: &BTreeSet<String>,
    policy: CutoverPolicy,
) -> CutoverOutcome {
    if let Err(reason) = policy.admits(task) {
        warn!("🚧 No cutover for '{}': {}", task.dest_index, reason);
        return CutoverOutcome::Blocked { reason };
    }
    if aliases.is_empty() {
        info!("🔀 '{}' has no aliases to move", task.source_index);
        return CutoverOutcome::NoAliases;
    }

    let mut moves = Vec::with_capacity(aliases.len());
    for alias in aliases {
        let result = move_alias(destination, alias, &task.dest_index).await;
        match result {
            Ok(ref removed_from) => info!(
                "🔀 Alias '{}' now resolves to '{}' (was {:?})",
                alias, task.dest_index, removed_from
            ),
            Err(ref cause) => warn!("🔀 Alias '{}' was not moved: {}", alias, cause),
        }
        moves.push(AliasMove {
            alias: alias.clone(),
            result,
        });
    }
    CutoverOutcome::Moved(moves)
}

// -- ⚛️ one request: every remove and the add travel together or not at all
async fn move_alias(
    destination: &dyn Cluster,
    alias: &str,
    new_index: &str,
) -> Result<Vec<String>, MigrationError> {
    let bound_to = destination.get_alias_bindings(alias).await?;
    let removed_from: Vec<String> = bound_to
        .into_iter()
        .filter(|index| index != new_index)
        .collect();

    let mut actions: Vec<AliasAction> = removed_from
        .iter()
        .map(|index| AliasAction::Remove {
            index: index.clone(),
            alias: alias.to_string(),
        })
        .collect();
    actions.push(AliasAction::Add {
        index: new_index.to_string(),
        alias: alias.to_string(),
    });

    destination.update_aliases(&actions).await?;
    Ok(removed_from)
}
