//! 📚 Metadata Catalog Reader — "what's on the shelf, and what does each box look like?"
//!
//! Lists the indices worth migrating and describes one at a time. System indices
//! (leading `.`) are dropped here, before anyone downstream can even see their names.

use serde::Deserialize;
use tracing::{debug, info};

use crate::backends::Cluster;
use crate::common::{ComponentTemplate, IndexDescriptor, IndexTemplate, is_system_index};
use crate::errors::MigrationError;
use crate::templates::simple_match;

/// 🎯 Which indices to migrate, by `*` wildcard.
///
/// An index is selected when it matches at least one `include` pattern and no `exclude`
/// pattern. System indices are never selected, whatever the patterns say.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SelectionConfig {
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

impl SelectionConfig {
    pub fn selects(&self, index_name: &str) -> bool {
        !is_system_index(index_name)
            && self.include.iter().any(|p| simple_match(p, index_name))
            && !self.exclude.iter().any(|p| simple_match(p, index_name))
    }
}

/// 📋 Every selected, non-system index on `cluster`, sorted by name.
pub async fn list_migratable_indices(
    cluster: &dyn Cluster,
    selection: &SelectionConfig,
) -> Result<Vec<String>, MigrationError> {
    let all = cluster.list_indices().await?;
    let seen = all.len();
    let mut selected: Vec<String> = all
        .into_iter()
        .filter(|name| selection.selects(name))
        .collect();
    selected.sort();
    selected.dedup();

    info!(
        "📚 {} of {} indices on '{}' are up for migration",
        selected.len(),
        seen,
        cluster.name()
    );
    Ok(selected)
}

/// 📇 Live settings, mappings, aliases and lifecycle binding of one index.
///
/// Asking about a system index is answered with `NotFound`, same as an index that isn't there.
pub async fn describe_index(
    cluster: &dyn Cluster,
    index_name: &str,
) -> Result<IndexDescriptor, MigrationError> {
    if is_system_index(index_name) {
        return Err(MigrationError::not_found(format!(
            "index '{index_name}' (system indices are never read)"
        )));
    }
    let body = cluster.get_index(index_name).await?;
    let descriptor = IndexDescriptor::from_index_body(index_name, &body)?;
    debug!(
        "📇 '{}': {} setting(s), {} alias(es), lifecycle {:?}",
        index_name,
        descriptor.settings.len(),
        descriptor.aliases.len(),
        descriptor.lifecycle_policy
    );
    Ok(descriptor)
}

/// 🧩 Index and component templates, fetched once per run.
pub async fn fetch_templates(
    cluster: &dyn Cluster,
) -> Result<(Vec<IndexTemplate>, Vec<ComponentTemplate>), MigrationError> {
    let index_templates = cluster.list_index_templates().await?;
    let component_templates = cluster.list_component_templates().await?;
    debug!(
        "🧩 '{}' has {} index template(s) and {} component template(s)",
        cluster.name(),
        index_templates.len(),
        component_templates.len()
    );
    Ok((index_templates, component_templates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryCluster;
    use serde_json::json;

    async fn a_source_with(names: &[&str]) -> InMemoryCluster {
        let the_cluster = InMemoryCluster::new("source");
        for name in names {
            the_cluster.seed_index(name, json!({}), json!({}), &[], 0).await;
        }
        the_cluster
    }

    #[tokio::test]
    async fn the_one_where_dot_indices_never_make_the_list() -> Result<(), MigrationError> {
        let the_source =
            a_source_with(&[".security-7", "logs-2024", ".kibana_1", "metrics"]).await;

        let the_indices =
            list_migratable_indices(&the_source, &SelectionConfig::default()).await?;

        assert_eq!(the_indices, vec!["logs-2024".to_string(), "metrics".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_include_star_still_cannot_reach_the_system() -> Result<(), MigrationError> {
        let the_source = a_source_with(&[".tasks", "logs-2023", "logs-2024", "metrics"]).await;
        let the_selection = SelectionConfig {
            include: vec!["logs-*".into(), ".*".into()],
            exclude: vec!["*-2023".into()],
        };

        let the_indices = list_migratable_indices(&the_source, &the_selection).await?;

        assert_eq!(the_indices, vec!["logs-2024".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_describing_a_system_index_is_not_found() {
        let the_source = a_source_with(&[".security-7"]).await;

        let the_result = describe_index(&the_source, ".security-7").await;

        assert!(matches!(the_result, Err(MigrationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn the_one_where_a_description_carries_the_lifecycle_binding() -> Result<(), MigrationError> {
        let the_source = InMemoryCluster::new("source");
        the_source
            .seed_index(
                "logs-2024",
                json!({"index.lifecycle.name": "hot-warm", "index.number_of_shards": "1"}),
                json!({"properties": {"message": {"type": "text"}}}),
                &["logs-current"],
                10,
            )
            .await;

        let the_descriptor = describe_index(&the_source, "logs-2024").await?;

        assert_eq!(the_descriptor.lifecycle_policy.as_deref(), Some("hot-warm"));
        assert!(the_descriptor.aliases.contains("logs-current"));
        Ok(())
    }
}
