//! User-agent source
//!
//! Loads a line-oriented list of user agents and hands out a random entry
//! per request, falling back to a single fixed string when the list is
//! missing or empty.

use crate::config::{UserAgentConfig, DEFAULT_USER_AGENT};
use rand::seq::IndexedRandom;
use std::path::Path;

/// Pool of user agents to pick from
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
    fallback: String,
}

impl UserAgentPool {
    /// Creates a pool from an in-memory list
    pub fn new(agents: Vec<String>, fallback: impl Into<String>) -> Self {
        let agents = agents
            .into_iter()
            .filter_map(|agent| clean_line(&agent))
            .collect();

        Self {
            agents,
            fallback: fallback.into(),
        }
    }

    /// Creates a pool that always yields `agent`
    pub fn single(agent: impl Into<String>) -> Self {
        Self::new(Vec::new(), agent)
    }

    /// Loads the pool described by the `[user-agent]` section
    ///
    /// A missing or unreadable list is logged and leaves only the fallback.
    pub fn from_config(config: &UserAgentConfig) -> Self {
        let agents = match config.list_path.as_deref() {
            Some(path) => load_user_agents(Path::new(path)).unwrap_or_else(|e| {
                tracing::warn!("Failed to load user agents file {}: {}", path, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        if agents.is_empty() {
            tracing::info!("No user agent list loaded; using the fallback user agent");
        } else {
            tracing::info!("Loaded {} user agents", agents.len());
        }

        Self::new(agents, config.fallback.clone())
    }

    /// Picks a user agent for one request
    pub fn pick(&self) -> &str {
        self.agents
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Number of listed agents, not counting the fallback
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::single(DEFAULT_USER_AGENT)
    }
}

/// Reads one user agent per line
///
/// A leading byte-order mark is ignored, non-ASCII characters are dropped
/// and blank lines skipped.
pub fn load_user_agents(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    Ok(content.lines().filter_map(clean_line).collect())
}

fn clean_line(line: &str) -> Option<String> {
    let ascii: String = line.chars().filter(char::is_ascii).collect();
    let trimmed = ascii.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
