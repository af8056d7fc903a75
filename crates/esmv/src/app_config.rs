//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment. Env vars (`ESMV_*`, nested with `__`) are the base layer, an
//! optional TOML file goes on top, and the file wins on conflicts.

use std::path::Path;

use anyhow::{Context, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::ElasticsearchClusterConfig;
use crate::cutover::CutoverConfig;
use crate::naming::NamingRule;
use crate::reindex::ReindexConfig;
use crate::replicator::MetadataConfig;
use crate::catalog::SelectionConfig;

/// 📦 Everything one migration run needs to know, resolved before anything touches a cluster.
///
/// Only the two endpoints are required. Every other section has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📤 Where the indices live today.
    pub source: ElasticsearchClusterConfig,
    /// 📥 Where they're moving to. Also the cluster that runs the reindex tasks.
    pub destination: ElasticsearchClusterConfig,
    #[serde(default)]
    pub naming: NamingRule,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub reindex: ReindexConfig,
    #[serde(default)]
    pub cutover: CutoverConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl AppConfig {
    /// 🔒 Reject configs that parse fine but can't possibly work.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.source.url.trim().is_empty(), "💀 [source] url is empty");
        ensure!(
            !self.destination.url.trim().is_empty(),
            "💀 [destination] url is empty"
        );
        ensure!(self.reindex.slices > 0, "💀 [reindex] slices must be at least 1");
        ensure!(
            self.reindex.batch_size > 0,
            "💀 [reindex] batch_size must be at least 1"
        );
        ensure!(
            self.reindex.poll_interval_secs > 0,
            "💀 [reindex] poll_interval_secs must be at least 1, or we'd poll the destination into the ground"
        );
        self.naming
            .validate()
            .map_err(|reason| anyhow::anyhow!("💀 [naming] {reason}"))?;
        Ok(())
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// - `None` → env vars only.
/// - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Errors if the result doesn't parse or doesn't validate. The message says which.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("ESMV_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (ESMV_*). \
             The file exists in our hearts, but apparently not in a shape we understand.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (ESMV_*). \
                 No file was provided, this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config
        .validate()
        .context("💀 Configuration parsed, but it doesn't make sense")?;
    Ok(app_config)
}
