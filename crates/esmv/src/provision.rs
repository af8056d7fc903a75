//! 🏗️ Index Provisioner — build the new house before the furniture arrives.
//!
//! Two ways to create a destination index, picked once per index:
//! - [`FromTemplate`]: a source template claims the index, so its composed body is used as-is.
//! - [`ManualCopy`]: nobody claims it, so the live settings (minus ephemeral keys) and the
//!   live mapping are copied. Live aliases are left to cutover, which binds them only once
//!   the copy is `Completed`.
//!
//! Whichever path ran, the lifecycle policy binding is applied last, as a settings update.
//! An index that already exists on the destination is "already provisioned", not an error,
//! so running the whole thing twice is boring. Boring is the goal.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backends::Cluster;
use crate::common::{IndexCreateBody, IndexDescriptor};
use crate::errors::MigrationError;
use crate::settings;
use crate::templates::{ResolvedTemplate, TemplateResolution};

/// 📋 What provisioning did for one index.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionOutcome {
    pub dest_index: String,
    pub strategy: &'static str,
    /// `false` when the index was already there.
    pub created: bool,
    /// Aliases the new index already carries: the template's own, or live ones from an earlier run.
    pub aliases_bound: Vec<String>,
    /// Live aliases not on the new index yet; cutover binds or moves them.
    pub aliases_deferred: Vec<String>,
    pub lifecycle_policy: Option<String>,
}

/// 🔌 How to create one destination index.
#[async_trait]
pub trait ProvisionStrategy: std::fmt::Debug + Send + Sync {
    fn label(&self) -> &'static str;

    async fn provision(
        &self,
        destination: &dyn Cluster,
        source: &IndexDescriptor,
        dest_index: &str,
    ) -> Result<ProvisionOutcome, MigrationError>;
}

/// 🧩 Create from the winning template's composed body.
#[derive(Debug, Clone, PartialEq)]
pub struct FromTemplate {
    pub template: ResolvedTemplate,
}

/// 📋 Copy the live index: settings minus ephemeral keys, mapping verbatim, aliases deferred to cutover.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManualCopy;

/// 🎭 The strategy picked for one index. Dispatches to whichever one it holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Provisioner {
    FromTemplate(FromTemplate),
    ManualCopy(ManualCopy),
}

impl Provisioner {
    /// 🎯 A match means template, no match means manual copy. Decided here, once.
    pub fn select(resolution: TemplateResolution) -> Self {
        match resolution {
            TemplateResolution::Matched(template) => Provisioner::FromTemplate(FromTemplate { template }),
            TemplateResolution::NoMatch => Provisioner::ManualCopy(ManualCopy),
        }
    }
}

#[async_trait]
impl ProvisionStrategy for Provisioner {
    fn label(&self) -> &'static str {
        match self {
            Provisioner::FromTemplate(strategy) => strategy.label(),
            Provisioner::ManualCopy(strategy) => strategy.label(),
        }
    }

    async fn provision(
        &self,
        destination: &dyn Cluster,
        source: &IndexDescriptor,
        dest_index: &str,
    ) -> Result<ProvisionOutcome, MigrationError> {
        match self {
            Provisioner::FromTemplate(strategy) => strategy.provision(destination, source, dest_index).await,
            Provisioner::ManualCopy(strategy) => strategy.provision(destination, source, dest_index).await,
        }
    }
}

#[async_trait]
impl ProvisionStrategy for FromTemplate {
    fn label(&self) -> &'static str {
        "template"
    }

    async fn provision(
        &self,
        destination: &dyn Cluster,
        source: &IndexDescriptor,
        dest_index: &str,
    ) -> Result<ProvisionOutcome, MigrationError> {
        info!(
            "🧩 Creating '{}' from template '{}' (priority {})",
            dest_index, self.template.template_name, self.template.priority
        );
        let created = create_once(destination, dest_index, &self.template.create_body()).await?;
        let lifecycle_policy = apply_lifecycle(destination, source, dest_index).await?;

        Ok(ProvisionOutcome {
            dest_index: dest_index.to_string(),
            strategy: self.label(),
            created,
            aliases_bound: self.template.aliases.keys().cloned().collect(),
            aliases_deferred: Vec::new(),
            lifecycle_policy,
        })
    }
}

#[async_trait]
impl ProvisionStrategy for ManualCopy {
    fn label(&self) -> &'static str {
        "manual copy"
    }

    async fn provision(
        &self,
        destination: &dyn Cluster,
        source: &IndexDescriptor,
        dest_index: &str,
    ) -> Result<ProvisionOutcome, MigrationError> {
        info!(
            "📋 No template claims '{}'; copying its live settings and mapping to '{}'",
            source.name, dest_index
        );
        let body = IndexCreateBody {
            settings: settings::strip_ephemeral(&source.settings),
            mappings: source.mappings.clone(),
            aliases: Default::default(),
        };
        let created = create_once(destination, dest_index, &body).await?;

        // -- 🔗 an empty index gets no readers: live aliases are bound by cutover, after a Completed copy
        let mut aliases_bound = Vec::new();
        let mut aliases_deferred = Vec::new();
        for alias in &source.aliases {
            let bound_to = destination.get_alias_bindings(alias).await?;
            if bound_to.contains(dest_index) {
                aliases_bound.push(alias.clone());
            } else {
                debug!(
                    "🔗 Alias '{}' (now on {:?}) waits for cutover to reach '{}'",
                    alias, bound_to, dest_index
                );
                aliases_deferred.push(alias.clone());
            }
        }
        let lifecycle_policy = apply_lifecycle(destination, source, dest_index).await?;

        Ok(ProvisionOutcome {
            dest_index: dest_index.to_string(),
            strategy: self.label(),
            created,
            aliases_bound,
            aliases_deferred,
            lifecycle_policy,
        })
    }
}

// -- ♻️ AlreadyExists is the idempotent happy path: Ok(false)
async fn create_once(
    destination: &dyn Cluster,
    dest_index: &str,
    body: &IndexCreateBody,
) -> Result<bool, MigrationError> {
    match destination.create_index(dest_index, body).await {
        Ok(()) => {
            info!("🏗️ Created '{}' on '{}'", dest_index, destination.name());
            Ok(true)
        }
        Err(MigrationError::AlreadyExists { .. }) => {
            info!("♻️ '{}' already exists on '{}'; treating it as provisioned", dest_index, destination.name());
            Ok(false)
        }
        Err(other) => Err(other),
    }
}

// -- 🕒 a binding, not content: applied after creation on both paths
async fn apply_lifecycle(
    destination: &dyn Cluster,
    source: &IndexDescriptor,
    dest_index: &str,
) -> Result<Option<String>, MigrationError> {
    let Some(ref policy) = source.lifecycle_policy else {
        return Ok(None);
    };
    destination
        .put_index_settings(dest_index, &json!({ "index.lifecycle.name": policy }))
        .await
        .inspect_err(|cause| {
            warn!("🕒 Couldn't bind lifecycle policy '{}' to '{}': {}", policy, dest_index, cause);
        })?;
    info!("🕒 Bound lifecycle policy '{}' to '{}'", policy, dest_index);
    Ok(Some(policy.clone()))
}
