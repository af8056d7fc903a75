//! 🚚 esmv — move an Elasticsearch cluster's indices, templates and security setup to
//! another cluster, and flip the aliases when the documents have landed.
//!
//! The destination does the heavy lifting (remote reindex). This crate decides what gets
//! created, in which order, with which settings, and whether the readers get switched over.

pub mod app_config;
pub mod backends;
pub mod catalog;
pub mod common;
pub mod cutover;
pub mod errors;
pub mod naming;
mod progress;
pub mod provision;
pub mod reindex;
pub mod replicator;
pub mod report;
mod settings;
mod supervisors;
pub mod templates;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::app_config::AppConfig;
use crate::backends::ElasticsearchCluster;
use crate::report::MigrationReport;
use crate::supervisors::Supervisor;

pub use crate::supervisors::MigrationContext;

/// 🚀 Connect to both clusters and run the whole migration.
///
/// Only setup can fail here. Once both clusters answer, everything that goes wrong lands in
/// the returned report instead.
pub async fn run(app_config: AppConfig, cancel: CancellationToken) -> Result<MigrationReport> {
    let source = ElasticsearchCluster::connect(app_config.source.clone())
        .await
        .context("💀 Could not connect to the source cluster")?;
    let destination = ElasticsearchCluster::connect(app_config.destination.clone())
        .await
        .context("💀 Could not connect to the destination cluster")?;

    let context = MigrationContext {
        source: Arc::new(source),
        destination: Arc::new(destination),
        config: app_config,
        cancel,
    };
    Ok(migrate(&context).await)
}

/// 🧳 Run a migration between two clusters that are already connected.
pub async fn migrate(context: &MigrationContext) -> MigrationReport {
    Supervisor::new(context).run().await
}
