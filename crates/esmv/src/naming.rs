//! 🏷️ Naming — what the index is called after it moves house.
//!
//! The destination name is a pure function of the source name. No lookups, no clocks,
//! no "what's free on the destination right now". Run it twice, get the same answer.

use serde::Deserialize;

/// 🏷️ The rule that turns `logs-2024` into whatever the destination should call it.
///
/// TOML spelling follows the rest of the config's tagged tables:
/// ```toml
/// [naming.Prefix]
/// prefix = "migrated-"
///
/// # or
/// [naming.Template]
/// template = "restored-{index}-v2"
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum NamingRule {
    /// ➕ Glue a prefix on the front.
    Prefix { prefix: String },
    /// 🧩 Substitute every `{index}` placeholder with the source name.
    Template { template: String },
}

/// 🔖 The placeholder a `Template` rule must contain.
pub const INDEX_PLACEHOLDER: &str = "{index}";

impl Default for NamingRule {
    fn default() -> Self {
        NamingRule::Prefix {
            prefix: "migrated-".to_string(),
        }
    }
}

impl NamingRule {
    /// 🎯 Derive the destination name.
    pub fn destination_name(&self, source_name: &str) -> String {
        match self {
            NamingRule::Prefix { prefix } => format!("{prefix}{source_name}"),
            NamingRule::Template { template } => template.replace(INDEX_PLACEHOLDER, source_name),
        }
    }

    /// 🔒 Catch rules that would fold every index into one name, or none at all.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            NamingRule::Template { template } if !template.contains(INDEX_PLACEHOLDER) => Err(
                format!("naming template '{template}' has no {INDEX_PLACEHOLDER} placeholder, so every index would collide"),
            ),
            _ => Ok(()),
        }
    }
}
