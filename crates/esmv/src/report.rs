//! 🧾 End-of-run report — the receipt.
//!
//! Logging as you go is great until someone asks "so, did it work?" and the answer is
//! four thousand lines of scrollback. Every metadata item, index and alias gets one entry
//! here, and the run ends with a table and an exit code.

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};

use crate::errors::{ErrorKind, MigrationError};
use crate::progress::format_number;

/// 🏁 How one thing turned out.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded { detail: String },
    Skipped { reason: String },
    /// Copied, but some documents didn't make it.
    Partial {
        created: u64,
        total: u64,
        failures: usize,
    },
    Failed { kind: ErrorKind, cause: String },
}

impl Outcome {
    fn status(&self) -> &'static str {
        match self {
            Outcome::Succeeded { .. } => "✅ ok",
            Outcome::Skipped { .. } => "⏭️ skipped",
            Outcome::Partial { .. } => "⚠️ partial",
            Outcome::Failed { .. } => "💀 failed",
        }
    }

    fn detail(&self) -> String {
        match self {
            Outcome::Succeeded { detail } => detail.clone(),
            Outcome::Skipped { reason } => reason.clone(),
            Outcome::Partial {
                created,
                total,
                failures,
            } => format!(
                "{}/{} documents, {} failure(s)",
                format_number(*created),
                format_number(*total),
                failures
            ),
            Outcome::Failed { kind, cause } => format!("{kind}: {cause}"),
        }
    }
}

/// 📝 One line of the receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    /// "index", "alias", or a metadata kind like "role".
    pub category: String,
    pub subject: String,
    pub outcome: Outcome,
}

/// 🔢 Totals by outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub partial: usize,
    pub failed: usize,
}

/// 🧾 Everything that happened in one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    entries: Vec<ReportEntry>,
}

impl MigrationReport {
    pub fn record(&mut self, category: impl Into<String>, subject: impl Into<String>, outcome: Outcome) {
        self.entries.push(ReportEntry {
            category: category.into(),
            subject: subject.into(),
            outcome,
        });
    }

    /// 🏷️ Record an error by what its kind means for the run:
    /// `NotFound` is a skip, `AlreadyExists` is a success, `PartialDataFailure` is partial,
    /// and the rest are failures.
    pub fn record_error(
        &mut self,
        category: impl Into<String>,
        subject: impl Into<String>,
        error: &MigrationError,
    ) {
        let outcome = match error {
            MigrationError::NotFound { .. } => Outcome::Skipped {
                reason: error.to_string(),
            },
            MigrationError::AlreadyExists { .. } => Outcome::Succeeded {
                detail: "already present".to_string(),
            },
            MigrationError::PartialDataFailure {
                created,
                total,
                failures,
                ..
            } => Outcome::Partial {
                created: *created,
                total: *total,
                failures: *failures,
            },
            MigrationError::Unreachable { .. } | MigrationError::Fatal { .. } => Outcome::Failed {
                kind: error.kind(),
                cause: error.to_string(),
            },
        };
        self.record(category, subject, outcome);
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// 🔍 The entry for one subject in one category, if there is one.
    pub fn find(&self, category: &str, subject: &str) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|entry| entry.category == category && entry.subject == subject)
    }

    pub fn counts(&self) -> ReportCounts {
        self.entries
            .iter()
            .fold(ReportCounts::default(), |mut counts, entry| {
                match entry.outcome {
                    Outcome::Succeeded { .. } => counts.succeeded += 1,
                    Outcome::Skipped { .. } => counts.skipped += 1,
                    Outcome::Partial { .. } => counts.partial += 1,
                    Outcome::Failed { .. } => counts.failed += 1,
                }
                counts
            })
    }

    /// 🚪 `1` if anything failed or lost documents, `0` otherwise.
    pub fn exit_code(&self) -> i32 {
        let counts = self.counts();
        if counts.failed > 0 || counts.partial > 0 { 1 } else { 0 }
    }

    /// 🎨 The receipt as a table, with a totals line under it.
    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["kind", "name", "status", "detail"]);
        for entry in &self.entries {
            table.add_row(vec![
                Cell::new(&entry.category),
                Cell::new(&entry.subject),
                Cell::new(entry.outcome.status()).set_alignment(CellAlignment::Center),
                Cell::new(entry.outcome.detail()),
            ]);
        }

        let counts = self.counts();
        format!(
            "{table}\n{} succeeded · {} skipped · {} partial · {} failed",
            counts.succeeded, counts.skipped, counts.partial, counts.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_error_kinds_land_in_the_right_column() {
        let mut the_report = MigrationReport::default();
        the_report.record_error("role", "superuser", &MigrationError::not_found("role 'superuser'"));
        the_report.record_error("index", "logs", &MigrationError::already_exists("index 'logs'"));
        the_report.record_error(
            "index",
            "logs-2024",
            &MigrationError::PartialDataFailure {
                index: "migrated-logs-2024".into(),
                created: 9990,
                total: 10000,
                failures: 10,
            },
        );
        the_report.record_error("user", "bob", &MigrationError::fatal("put user 'bob'", "403"));

        assert_eq!(
            the_report.counts(),
            ReportCounts {
                succeeded: 1,
                skipped: 1,
                partial: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn the_one_where_skips_alone_still_exit_clean() {
        let mut the_report = MigrationReport::default();
        the_report.record("index", "a", Outcome::Succeeded { detail: "copied".into() });
        the_report.record("index", "b", Outcome::Skipped { reason: "cancelled".into() });
        assert_eq!(the_report.exit_code(), 0);

        the_report.record(
            "index",
            "c",
            Outcome::Partial {
                created: 1,
                total: 2,
                failures: 1,
            },
        );
        assert_eq!(the_report.exit_code(), 1);
    }

    #[test]
    fn the_one_where_the_receipt_names_names() {
        let mut the_report = MigrationReport::default();
        the_report.record(
            "index",
            "logs-2024",
            Outcome::Partial {
                created: 9990,
                total: 10000,
                failures: 10,
            },
        );

        let the_table = the_report.render();

        assert!(the_table.contains("logs-2024"));
        assert!(the_table.contains("9,990/10,000 documents, 10 failure(s)"));
        assert!(the_table.contains("0 succeeded · 0 skipped · 1 partial · 0 failed"));
    }
}
