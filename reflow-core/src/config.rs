//! Graph Configuration
//!
//! Settings that change engine policy for one graph. Configuration is
//! plain data so it can be loaded from JSON alongside application settings.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What a cell does when written with a value equal to its current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Every write bumps the revision and invalidates dependents.
    #[default]
    AlwaysBump,

    /// Writes of an equal value are ignored.
    SuppressEqual,
}

/// Per-graph configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Policy for writes that do not change the value.
    pub write_policy: WritePolicy,

    /// Maximum number of nested node evaluations in one read.
    pub max_depth: usize,
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Builder-style setter for the write policy.
    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    /// Builder-style setter for the depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            write_policy: WritePolicy::AlwaysBump,
            max_depth: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_always_bump() {
        let config = GraphConfig::default();
        assert_eq!(config.write_policy, WritePolicy::AlwaysBump);
        assert_eq!(config.max_depth, 512);
    }

    #[test]
    fn parses_partial_json() {
        let config = GraphConfig::from_json(r#"{ "write_policy": "suppress_equal" }"#).unwrap();
        assert_eq!(config.write_policy, WritePolicy::SuppressEqual);
        assert_eq!(config.max_depth, 512);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = GraphConfig::from_json(r#"{ "write_policy": "sometimes" }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
