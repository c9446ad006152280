//! Command registry: the static table mapping user-typed aliases to handlers.

use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Closed set of handler identities.
///
/// Resolved once at registry-load time; dispatch is a single exhaustive
/// match, never a runtime string lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerId {
    /// Synthesized by the classifier for short salutations; not configurable.
    Greeting,
    Menu,
    Chatbot,
    Download,
    /// Synthesized by the classifier for bare-URL messages; not configurable.
    AutoDownload,
    DevMenu,
    CheckWhatsapp,
    GetAvatar,
    GetContactInfo,
    ShortenLink,
    MyLinks,
    LinkStats,
    AllLinks,
    VideoOnly,
}

/// One command as it appears in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandSpec {
    pub handler: HandlerId,
    pub aliases: Vec<String>,
    #[serde(default)]
    pub admin_only: bool,
}

/// A resolved command: what to run and whether the sender must be the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDefinition {
    pub handler: HandlerId,
    pub admin_only: bool,
}

/// Immutable alias table, built once from configuration.
///
/// Aliases are normalized (lowercased, dots stripped) and must be pairwise
/// distinct after normalization. Iteration order is configuration order,
/// which makes fuzzy tie-breaking deterministic.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDefinition>,
    // (normalized alias, index into `commands`), in configuration order.
    aliases: Vec<(String, usize)>,
    by_alias: HashMap<String, usize>,
}

/// Normalization applied to aliases and to candidate tokens before lookup.
#[must_use]
pub fn normalize_alias(raw: &str) -> String {
    raw.trim().to_lowercase().replace('.', "")
}

impl CommandRegistry {
    /// Builds the registry, rejecting aliases that collide after
    /// normalization.
    pub fn from_specs(specs: &[CommandSpec]) -> Result<Self> {
        let mut registry = Self::default();
        for spec in specs {
            let index = registry.commands.len();
            registry.commands.push(CommandDefinition {
                handler: spec.handler,
                admin_only: spec.admin_only,
            });
            for raw in &spec.aliases {
                let alias = normalize_alias(raw);
                if alias.is_empty() {
                    bail!("empty alias for handler {:?}", spec.handler);
                }
                if registry.by_alias.contains_key(&alias) {
                    bail!("alias {alias:?} registered for more than one command");
                }
                registry.by_alias.insert(alias.clone(), index);
                registry.aliases.push((alias, index));
            }
        }
        Ok(registry)
    }

    /// Exact, case-insensitive alias lookup. No fuzziness at this layer.
    #[must_use]
    pub fn resolve_alias(&self, token: &str) -> Option<&CommandDefinition> {
        self.by_alias
            .get(&normalize_alias(token))
            .map(|&index| &self.commands[index])
    }

    /// Whether `token` is a registered alias verbatim (after normalization).
    #[must_use]
    pub fn is_exact_alias(&self, token: &str) -> bool {
        self.by_alias.contains_key(&normalize_alias(token))
    }

    /// All aliases in configuration order.
    pub fn iter_aliases(&self) -> impl Iterator<Item = (&str, &CommandDefinition)> {
        self.aliases
            .iter()
            .map(|(alias, index)| (alias.as_str(), &self.commands[*index]))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
