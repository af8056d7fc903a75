//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[two clusters hum. one is old. one is new. a supervisor cracks its knuckles.]*
//! 🎬 "In a world where indices must move house..."
//! 🎬 "One supervisor dared to move them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor — part middle manager, part helicopter parent, part the friend with
//! the truck. It doesn't copy anything itself. It decides the order things happen in and
//! writes down how each one went:
//!
//! 1. Metadata passes, all of them, in dependency order.
//! 2. List the indices and fetch the templates, once.
//! 3. Per index: describe → resolve → provision → reindex → cutover.
//!
//! One index going wrong is a report line. The run keeps going. A cancelled run stops
//! starting new indices and reports the rest as skipped.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app_config::AppConfig;
use crate::backends::Cluster;
use crate::catalog;
use crate::common::{ComponentTemplate, IndexTemplate};
use crate::cutover::{self, CutoverOutcome};
use crate::provision::{ProvisionStrategy, Provisioner};
use crate::reindex::{ReindexOrchestrator, TaskState};
use crate::replicator;
use crate::report::{MigrationReport, Outcome};
use crate::templates;

/// 🧳 Everything one run works with: both clusters, the resolved config, and the big red button.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    pub source: Arc<dyn Cluster>,
    pub destination: Arc<dyn Cluster>,
    pub config: AppConfig,
    pub cancel: CancellationToken,
}

/// 📦 The Supervisor: walks the run from metadata to the last alias, in order.
pub(crate) struct Supervisor<'a> {
    context: &'a MigrationContext,
    report: MigrationReport,
}

impl<'a> Supervisor<'a> {
    pub(crate) fn new(context: &'a MigrationContext) -> Self {
        Self {
            context,
            report: MigrationReport::default(),
        }
    }

    /// 🚀 Run the whole migration and hand back the receipt.
    pub(crate) async fn run(mut self) -> MigrationReport {
        let context = self.context;
        info!(
            "🚚 Migrating '{}' → '{}'",
            context.source.name(),
            context.destination.name()
        );

        // -- 🪞 every pass finishes before the first index is touched
        replicator::replicate(
            context.source.as_ref(),
            context.destination.as_ref(),
            &context.config.metadata,
            &mut self.report,
        )
        .await;

        let indices = match catalog::list_migratable_indices(
            context.source.as_ref(),
            &context.config.selection,
        )
        .await
        {
            Ok(indices) => indices,
            Err(cause) => {
                error!("💀 Could not list indices on '{}': {}", context.source.name(), cause);
                self.report.record_error("index", "*", &cause);
                return self.report;
            }
        };

        let (index_templates, component_templates) =
            match catalog::fetch_templates(context.source.as_ref()).await {
                Ok(fetched) => fetched,
                Err(cause) => {
                    // -- without templates every index would be hand-copied, which is the wrong answer
                    error!(
                        "💀 Could not fetch templates from '{}': {}",
                        context.source.name(),
                        cause
                    );
                    self.report.record_error("index template", "*", &cause);
                    return self.report;
                }
            };

        for index in &indices {
            if context.cancel.is_cancelled() {
                self.report.record(
                    "index",
                    index,
                    Outcome::Skipped {
                        reason: "run cancelled before this index started".to_string(),
                    },
                );
                continue;
            }
            self.migrate_index(index, &index_templates, &component_templates)
                .await;
        }

        let counts = self.report.counts();
        info!(
            "🏁 Done: {} succeeded, {} skipped, {} partial, {} failed",
            counts.succeeded, counts.skipped, counts.partial, counts.failed
        );
        self.report
    }

    async fn migrate_index(
        &mut self,
        index: &str,
        index_templates: &[IndexTemplate],
        component_templates: &[ComponentTemplate],
    ) {
        let context = self.context;
        let source = context.source.as_ref();
        let destination = context.destination.as_ref();

        let descriptor = match catalog::describe_index(source, index).await {
            Ok(descriptor) => descriptor,
            Err(cause) => {
                warn!("📇 Could not describe '{}': {}", index, cause);
                self.report.record_error("index", index, &cause);
                return;
            }
        };

        let dest_index = context.config.naming.destination_name(index);
        let provisioner = Provisioner::select(templates::resolve(
            index,
            index_templates,
            component_templates,
        ));
        let provisioned = match provisioner.provision(destination, &descriptor, &dest_index).await {
            Ok(outcome) => outcome,
            Err(cause) => {
                error!("🏗️ Could not provision '{}' for '{}': {}", dest_index, index, cause);
                self.report.record_error("index", index, &cause);
                return;
            }
        };

        let orchestrator = ReindexOrchestrator {
            source,
            destination,
            remote: context.config.source.remote_source(),
            config: &context.config.reindex,
            cancel: context.cancel.clone(),
        };
        let task = orchestrator.run(index, &dest_index).await;

        match task.verdict() {
            Ok(()) => self.report.record(
                "index",
                index,
                Outcome::Succeeded {
                    detail: format!(
                        "{} document(s) into '{}' ({})",
                        task.copied(), dest_index, provisioned.strategy
                    ),
                },
            ),
            Err(cause) => self.report.record_error("index", index, &cause),
        }

        // -- 🔀 the task is terminal by now; the policy decides if it earned the aliases
        let outcome = cutover::cutover(
            destination,
            &task,
            &descriptor.aliases,
            context.config.cutover.policy,
        )
        .await;
        match outcome {
            CutoverOutcome::NoAliases => {}
            CutoverOutcome::Blocked { reason } => {
                // -- a failed copy already has its report line; only a policy block needs alias lines
                if task.state == TaskState::Completed {
                    for alias in &descriptor.aliases {
                        self.report.record(
                            "alias",
                            alias,
                            Outcome::Skipped {
                                reason: reason.clone(),
                            },
                        );
                    }
                }
            }
            CutoverOutcome::Moved(moves) => {
                for alias_move in moves {
                    match alias_move.result {
                        Ok(_) => self.report.record(
                            "alias",
                            &alias_move.alias,
                            Outcome::Succeeded {
                                detail: format!("→ '{dest_index}'"),
                            },
                        ),
                        Err(cause) => self.report.record_error("alias", &alias_move.alias, &cause),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{ElasticsearchClusterConfig, InMemoryCluster, ReindexScript};
    use crate::common::{MetadataKind, TemplateBody};
    use crate::cutover::{CutoverConfig, CutoverPolicy};
    use crate::naming::NamingRule;
    use crate::reindex::ReindexConfig;
    use crate::replicator::MetadataConfig;
    use crate::catalog::SelectionConfig;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn a_config() -> AppConfig {
        AppConfig {
            source: ElasticsearchClusterConfig::new("http://source:9200"),
            destination: ElasticsearchClusterConfig::new("http://dest:9200"),
            naming: NamingRule::default(),
            selection: SelectionConfig::default(),
            reindex: ReindexConfig::default(),
            cutover: CutoverConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }

    fn a_context(source: &InMemoryCluster, dest: &InMemoryCluster, config: AppConfig) -> MigrationContext {
        MigrationContext {
            source: Arc::new(source.clone()),
            destination: Arc::new(dest.clone()),
            config,
            cancel: CancellationToken::new(),
        }
    }

    async fn the_logs_clusters() -> (InMemoryCluster, InMemoryCluster) {
        let the_source = InMemoryCluster::new("source");
        the_source
            .seed_index(
                "logs-2024",
                json!({
                    "index.number_of_shards": "1",
                    "index.uuid": "abc",
                    "index.version.created": "7170099",
                    "index.lifecycle.name": "hot-warm"
                }),
                json!({"properties": {"message": {"type": "text"}}}),
                &["logs-current"],
                10_000,
            )
            .await;
        the_source
            .seed_index(".security-7", json!({}), json!({}), &[], 12)
            .await;
        the_source
            .seed_metadata(
                MetadataKind::LifecyclePolicies,
                "hot-warm",
                json!({"policy": {"phases": {"hot": {"actions": {"rollover": {"max_age": "7d"}}}, "warm": {"min_age": "30d", "actions": {}}}}}),
            )
            .await;
        let the_dest = InMemoryCluster::new("dest");
        the_dest.link_remote(&the_source).await;
        (the_source, the_dest)
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_logs_2024_moves_house_end_to_end() {
        let (the_source, the_dest) = the_logs_clusters().await;
        let the_context = a_context(&the_source, &the_dest, a_config());

        let the_report = Supervisor::new(&the_context).run().await;

        let the_index = the_dest
            .index("migrated-logs-2024")
            .await
            .expect("💀 the destination index should exist");
        assert_eq!(the_index.doc_count, 10_000);
        assert!(the_index.aliases.contains("logs-current"));
        assert_eq!(
            the_index.mappings,
            json!({"properties": {"message": {"type": "text"}}})
                .as_object()
                .cloned()
                .unwrap_or_default()
        );
        assert!(!the_index.settings.contains_key("uuid"));
        assert_eq!(the_index.settings["lifecycle"]["name"], "hot-warm");
        assert!(
            the_dest
                .metadata(MetadataKind::LifecyclePolicies)
                .await
                .iter()
                .any(|policy| policy.name == "hot-warm"),
            "the policy is on the destination before anything binds to it"
        );
        let the_last_bindings = the_dest
            .alias_history()
            .await
            .last()
            .cloned()
            .expect("💀 cutover should have moved the alias");
        assert_eq!(
            the_last_bindings.bound_to("logs-current"),
            BTreeSet::from(["migrated-logs-2024".to_string()])
        );
        assert!(the_dest.index("migrated-.security-7").await.is_none());
        assert!(matches!(
            the_report.find("index", "logs-2024").map(|entry| &entry.outcome),
            Some(Outcome::Succeeded { .. })
        ));
        assert_eq!(the_report.exit_code(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_template_claims_the_index() {
        let (the_source, the_dest) = the_logs_clusters().await;
        the_source
            .seed_index_template(IndexTemplate {
                name: "logs".into(),
                index_patterns: vec!["logs-*".into()],
                composed_of: Vec::new(),
                priority: 100,
                template: TemplateBody {
                    settings: json!({"index": {"number_of_shards": "3"}})
                        .as_object()
                        .cloned()
                        .unwrap_or_default(),
                    ..TemplateBody::default()
                },
            })
            .await;
        let the_context = a_context(&the_source, &the_dest, a_config());

        let the_report = Supervisor::new(&the_context).run().await;

        let the_index = the_dest
            .index("migrated-logs-2024")
            .await
            .expect("💀 the destination index should exist");
        assert_eq!(the_index.settings["number_of_shards"], "3");
        assert!(matches!(
            the_report.find("index template", "logs").map(|entry| &entry.outcome),
            Some(Outcome::Succeeded { .. })
        ));
        assert_eq!(the_dest.metadata(MetadataKind::IndexTemplates).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_partial_copy_is_reported_and_the_alias_stays_off_the_destination() {
        let (the_source, the_dest) = the_logs_clusters().await;
        the_dest
            .script_reindex(ReindexScript {
                failed_documents: 10,
                ..ReindexScript::default()
            })
            .await;
        let mut the_config = a_config();
        the_config.cutover.policy = CutoverPolicy::RequireZeroFailures;
        let the_context = a_context(&the_source, &the_dest, the_config);

        let the_report = Supervisor::new(&the_context).run().await;

        assert_eq!(
            the_report.find("index", "logs-2024").map(|entry| &entry.outcome),
            Some(&Outcome::Partial {
                created: 9990,
                total: 10_000,
                failures: 10
            })
        );
        assert!(matches!(
            the_report.find("alias", "logs-current").map(|entry| &entry.outcome),
            Some(Outcome::Skipped { .. })
        ));
        let the_index = the_dest
            .index("migrated-logs-2024")
            .await
            .expect("💀 the partial copy stays for inspection");
        assert!(the_index.aliases.is_empty(), "no reader should see a short index");
        assert!(
            the_dest
                .alias_history()
                .await
                .iter()
                .all(|snapshot| snapshot.bound_to("logs-current").is_empty())
        );
        assert_eq!(the_report.exit_code(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_failed_copy_never_gets_the_alias() {
        let (the_source, the_dest) = the_logs_clusters().await;
        the_dest
            .script_reindex(ReindexScript {
                poll_transport_error: true,
                ..ReindexScript::default()
            })
            .await;
        let the_context = a_context(&the_source, &the_dest, a_config());

        let the_report = Supervisor::new(&the_context).run().await;

        assert!(matches!(
            the_report.find("index", "logs-2024").map(|entry| &entry.outcome),
            Some(Outcome::Failed { .. })
        ));
        let the_index = the_dest
            .index("migrated-logs-2024")
            .await
            .expect("💀 the provisioned index should still be there");
        assert!(the_index.aliases.is_empty());
        assert!(
            the_dest
                .alias_history()
                .await
                .iter()
                .all(|snapshot| snapshot.bound_to("logs-current").is_empty())
        );
        assert_ne!(the_report.exit_code(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_cancelled_run_skips_what_is_left() {
        let (the_source, the_dest) = the_logs_clusters().await;
        the_source
            .seed_index("metrics", json!({}), json!({}), &[], 5)
            .await;
        let the_context = a_context(&the_source, &the_dest, a_config());
        the_context.cancel.cancel();

        let the_report = Supervisor::new(&the_context).run().await;

        assert!(the_dest.reindex_requests().await.is_empty());
        for the_index in ["logs-2024", "metrics"] {
            assert!(matches!(
                the_report.find("index", the_index).map(|entry| &entry.outcome),
                Some(Outcome::Skipped { .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_an_unreachable_source_stops_before_any_index() {
        let (the_source, the_dest) = the_logs_clusters().await;
        the_source.set_unreachable(true).await;
        let mut the_config = a_config();
        the_config.metadata.kinds = Vec::new();
        let the_context = a_context(&the_source, &the_dest, the_config);

        let the_report = Supervisor::new(&the_context).run().await;

        assert!(the_dest.index_names().await.is_empty());
        assert!(matches!(
            the_report.find("index", "*").map(|entry| &entry.outcome),
            Some(Outcome::Failed { .. })
        ));
    }
}
