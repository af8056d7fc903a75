//! 🏷️ Errors — the five flavors of "well, that didn't go as planned."
//!
//! 🎬 *[a migration log scrolls by. one line is red. nobody knows if it matters.]*
//!
//! Every core operation returns `Result<T, MigrationError>`. The variant tells the caller
//! what kind of bad day it is, and the caller decides whether to keep going. Nothing in
//! here decides to abort the run. That's the supervisor's call. 🦆
//!
//! 🧠 Knowledge graph:
//! - `Unreachable` — transport blew up. Retry later, outside this run.
//! - `NotFound` — the thing on the source isn't there. Skip it.
//! - `AlreadyExists` — the thing on the destination is already there. That's a win, actually.
//! - `PartialDataFailure` — some documents didn't make it. Recorded, not fatal.
//! - `Fatal` — malformed request, permission denied, weird response. Abort this entity only.

use std::fmt;

use thiserror::Error;

/// 🏷️ The kind of failure, stripped of its backstory. Handy for reports and for `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unreachable,
    NotFound,
    AlreadyExists,
    PartialDataFailure,
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::PartialDataFailure => "partial data failure",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// 💀 A migration failure with enough context to read at 3am.
///
/// `action` / `entity` always names the thing we were touching (an index, a template,
/// a role) so the log line answers "which one?" without a second grep.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    #[error("📡 couldn't reach the cluster while trying to {action}: {cause}")]
    Unreachable { action: String, cause: String },

    #[error("🔍 {entity} does not exist")]
    NotFound { entity: String },

    #[error("♻️ {entity} already exists")]
    AlreadyExists { entity: String },

    #[error("⚠️ {index}: {failures} document failure(s) during copy ({created}/{total} created)")]
    PartialDataFailure {
        index: String,
        created: u64,
        total: u64,
        failures: usize,
    },

    #[error("💀 {action} failed: {cause}")]
    Fatal { action: String, cause: String },
}

impl MigrationError {
    /// 🏷️ Which of the five flavors is this?
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Unreachable { .. } => ErrorKind::Unreachable,
            MigrationError::NotFound { .. } => ErrorKind::NotFound,
            MigrationError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            MigrationError::PartialDataFailure { .. } => ErrorKind::PartialDataFailure,
            MigrationError::Fatal { .. } => ErrorKind::Fatal,
        }
    }

    pub(crate) fn fatal(action: impl Into<String>, cause: impl fmt::Display) -> Self {
        MigrationError::Fatal {
            action: action.into(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn unreachable(action: impl Into<String>, cause: impl fmt::Display) -> Self {
        MigrationError::Unreachable {
            action: action.into(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn not_found(entity: impl Into<String>) -> Self {
        MigrationError::NotFound {
            entity: entity.into(),
        }
    }

    pub(crate) fn already_exists(entity: impl Into<String>) -> Self {
        MigrationError::AlreadyExists {
            entity: entity.into(),
        }
    }
}
