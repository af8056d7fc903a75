//! 🧩 Template Resolver — "is there already a recipe for this index?"
//!
//! 🎬 *[the source index walks into a bar full of templates. several of them wave.]*
//!
//! Given an index name plus the source's index and component templates, find the
//! template the cluster itself would have used, compose it with its component
//! templates, and hand back a ready-to-create body. Or say, plainly, "nothing matches".
//!
//! 🧠 Knowledge graph:
//! - Matching: any pattern in `index_patterns` matches the name (`*` wildcards only,
//!   same as the cluster's own simple matcher).
//! - Selection: highest `priority` wins; ties go to the first one listed. Ties get a
//!   warning because the listing order is not something the cluster promises.
//! - Composition: component templates in `composed_of` order, then the template's own
//!   body on top. Later layers win. Missing components are skipped with a warning.
//! - Output: [`TemplateResolution::Matched`] or [`TemplateResolution::NoMatch`]. Never an
//!   "empty but matched" shrug.

use tracing::{debug, warn};

use crate::common::{ComponentTemplate, IndexCreateBody, IndexTemplate, JsonMap, TemplateBody};
use crate::settings;

/// 🎯 The outcome of asking "which template owns this index?"
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateResolution {
    Matched(ResolvedTemplate),
    NoMatch,
}

/// 🧩 A winning template, fully composed and ready to become a create body.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub template_name: String,
    pub priority: i64,
    /// Index namespace, nested, ephemeral keys stripped.
    pub settings: JsonMap,
    pub mappings: JsonMap,
    pub aliases: JsonMap,
    /// Component templates the winner asked for but the source didn't have.
    pub missing_components: Vec<String>,
}

impl ResolvedTemplate {
    /// 🏗️ The body to `PUT` on the destination.
    pub fn create_body(&self) -> IndexCreateBody {
        IndexCreateBody {
            settings: self.settings.clone(),
            mappings: self.mappings.clone(),
            aliases: self.aliases.clone(),
        }
    }
}

/// ✳️ `*`-only wildcard match. `*` eats any run of characters, including none.
pub fn simple_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    // -- 🔙 where the last star was, and how much text it has swallowed so far
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, swallowed)) = backtrack {
            p = star + 1;
            t = swallowed + 1;
            backtrack = Some((star, swallowed + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

impl IndexTemplate {
    /// 🔍 Does any of this template's patterns claim `index_name`?
    pub fn matches(&self, index_name: &str) -> bool {
        self.index_patterns
            .iter()
            .any(|pattern| simple_match(pattern, index_name))
    }
}

/// 🎯 Find and compose the template for `index_name`.
pub fn resolve(
    index_name: &str,
    templates: &[IndexTemplate],
    components: &[ComponentTemplate],
) -> TemplateResolution {
    let mut winner: Option<&IndexTemplate> = None;
    let mut tied_with_winner: Vec<&str> = Vec::new();

    for template in templates.iter().filter(|t| t.matches(index_name)) {
        match winner {
            None => winner = Some(template),
            Some(current) if template.priority > current.priority => {
                winner = Some(template);
                tied_with_winner.clear();
            }
            Some(current) if template.priority == current.priority => {
                tied_with_winner.push(&template.name);
            }
            Some(_) => {}
        }
    }

    let Some(winner) = winner else {
        debug!("🧩 No template claims '{}'", index_name);
        return TemplateResolution::NoMatch;
    };

    if !tied_with_winner.is_empty() {
        warn!(
            "⚖️ Templates {:?} tie with '{}' at priority {} for index '{}'; going with the first one listed",
            tied_with_winner, winner.name, winner.priority, index_name
        );
    }

    TemplateResolution::Matched(compose(winner, components))
}

// -- 🥞 components in composed_of order, then the template's own body. later layers win.
fn compose(template: &IndexTemplate, components: &[ComponentTemplate]) -> ResolvedTemplate {
    let mut layers: Vec<&TemplateBody> = Vec::with_capacity(template.composed_of.len() + 1);
    let mut missing_components = Vec::new();

    for component_name in &template.composed_of {
        match components.iter().find(|c| &c.name == component_name) {
            Some(component) => layers.push(&component.template),
            None => {
                warn!(
                    "🧱 Template '{}' composes '{}', which the source doesn't have; composing without it",
                    template.name, component_name
                );
                missing_components.push(component_name.clone());
            }
        }
    }
    layers.push(&template.template);

    let mut settings = JsonMap::new();
    let mut mappings = JsonMap::new();
    let mut aliases = JsonMap::new();
    for layer in layers {
        settings::deep_merge(&mut settings, &settings::index_namespace(&layer.settings));
        settings::deep_merge(&mut mappings, &layer.mappings);
        settings::deep_merge(&mut aliases, &layer.aliases);
    }

    ResolvedTemplate {
        template_name: template.name.clone(),
        priority: template.priority,
        settings: settings::strip_ephemeral(&settings),
        mappings,
        aliases,
        missing_components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn body(value: Value) -> TemplateBody {
        serde_json::from_value(value).expect("💀 test template body should deserialize")
    }

    fn template(name: &str, patterns: &[&str], priority: i64, template: Value) -> IndexTemplate {
        IndexTemplate {
            name: name.into(),
            index_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            composed_of: Vec::new(),
            priority,
            template: body(template),
        }
    }

    fn matched(resolution: TemplateResolution) -> ResolvedTemplate {
        match resolution {
            TemplateResolution::Matched(resolved) => resolved,
            TemplateResolution::NoMatch => panic!("💀 expected a template match, got NoMatch"),
        }
    }

    #[test]
    fn the_one_where_stars_eat_everything_and_nothing() {
        assert!(simple_match("logs-*", "logs-2024"));
        assert!(simple_match("logs-*", "logs-"));
        assert!(simple_match("*", "anything"));
        assert!(simple_match("*-2024", "logs-2024"));
        assert!(simple_match("l*s-*4", "logs-2024"));
        assert!(simple_match("exact", "exact"));
        assert!(!simple_match("logs-*", "metrics-2024"));
        assert!(!simple_match("exact", "exactly"));
        assert!(!simple_match("*-2023", "logs-2024"));
    }

    #[test]
    fn the_one_where_nothing_matches_and_we_say_so() {
        let the_templates = vec![template("metrics", &["metrics-*"], 100, json!({}))];
        assert_eq!(
            resolve("logs-2024", &the_templates, &[]),
            TemplateResolution::NoMatch
        );
    }

    #[test]
    fn the_one_where_a_single_match_wins_with_its_own_body() {
        let the_templates = vec![template(
            "logs",
            &["logs-*"],
            10,
            json!({
                "settings": {"index": {"number_of_shards": "2"}},
                "mappings": {"properties": {"message": {"type": "text"}}},
                "aliases": {"logs-all": {}}
            }),
        )];

        let the_winner = matched(resolve("logs-2024", &the_templates, &[]));

        assert_eq!(the_winner.template_name, "logs");
        assert_eq!(
            Value::Object(the_winner.create_body().settings),
            json!({"number_of_shards": "2"})
        );
        assert_eq!(
            Value::Object(the_winner.mappings),
            json!({"properties": {"message": {"type": "text"}}})
        );
        assert!(the_winner.aliases.contains_key("logs-all"));
    }

    #[test]
    fn the_one_where_the_higher_priority_takes_the_crown() {
        let the_templates = vec![
            template("low", &["logs-*"], 1, json!({"settings": {"number_of_shards": "1"}})),
            template("high", &["logs-20*"], 50, json!({"settings": {"number_of_shards": "5"}})),
            template("mid", &["*"], 10, json!({})),
        ];

        let the_winner = matched(resolve("logs-2024", &the_templates, &[]));

        assert_eq!(the_winner.template_name, "high");
        assert_eq!(the_winner.settings["number_of_shards"], "5");
    }

    #[test]
    fn the_one_where_a_tie_goes_to_whoever_showed_up_first() {
        let the_templates = vec![
            template("first", &["logs-*"], 7, json!({})),
            template("second", &["logs-2024"], 7, json!({})),
        ];

        assert_eq!(
            matched(resolve("logs-2024", &the_templates, &[])).template_name,
            "first"
        );
    }

    #[test]
    fn the_one_where_components_stack_and_the_template_gets_the_last_word() {
        let mut the_template = template(
            "logs",
            &["logs-*"],
            1,
            json!({
                "settings": {"index": {"number_of_replicas": "2"}},
                "mappings": {"properties": {"message": {"type": "text"}}}
            }),
        );
        the_template.composed_of = vec!["base".into(), "ghost".into(), "shards".into()];
        let the_components = vec![
            ComponentTemplate {
                name: "base".into(),
                template: body(json!({
                    "settings": {"index.number_of_replicas": "0", "index.codec": "best_compression"},
                    "mappings": {"properties": {"@timestamp": {"type": "date"}}}
                })),
            },
            ComponentTemplate {
                name: "shards".into(),
                template: body(json!({"settings": {"number_of_shards": "3"}})),
            },
        ];

        let the_winner = matched(resolve("logs-2024", &[the_template], &the_components));

        assert_eq!(
            Value::Object(the_winner.settings),
            json!({"number_of_replicas": "2", "codec": "best_compression", "number_of_shards": "3"})
        );
        assert_eq!(
            Value::Object(the_winner.mappings),
            json!({"properties": {"@timestamp": {"type": "date"}, "message": {"type": "text"}}})
        );
        assert_eq!(the_winner.missing_components, vec!["ghost".to_string()]);
    }

    #[test]
    fn the_one_where_template_settings_lose_their_ephemeral_baggage_too() {
        let the_templates = vec![template(
            "logs",
            &["logs-*"],
            1,
            json!({"settings": {"index": {"uuid": "nope", "number_of_shards": "1"}}}),
        )];

        let the_winner = matched(resolve("logs-2024", &the_templates, &[]));

        assert!(!the_winner.settings.contains_key("uuid"));
        assert_eq!(the_winner.settings["number_of_shards"], "1");
    }
}
