//! Per-tree configuration.
//!
//! A [`TreeConfig`] fixes the path alphabet, the segment width (`steplen`),
//! the depth limit and the optional payload sort keys for one tree. The
//! values are constants for the lifetime of a populated tree: changing them
//! requires a dump and reload.

use serde::{Deserialize, Serialize};

use crate::codec::PathCodec;
use crate::error::CoreError;

/// Digits followed by uppercase ASCII letters (base 36).
pub const DEFAULT_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Characters per path segment.
pub const DEFAULT_STEPLEN: usize = 4;

/// Depth limit matching a 255-character path column at the default steplen.
pub const DEFAULT_MAX_DEPTH: usize = 63;

/// Configuration shared by every operation on one tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Ordered symbol set used to encode sibling positions.
    pub alphabet: String,
    /// Width of one path segment.
    pub steplen: usize,
    /// Maximum number of segments in a path.
    pub max_depth: usize,
    /// Payload fields that define sibling order. Empty means insertion order.
    pub node_order_by: Vec<String>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            alphabet: DEFAULT_ALPHABET.to_string(),
            steplen: DEFAULT_STEPLEN,
            max_depth: DEFAULT_MAX_DEPTH,
            node_order_by: Vec::new(),
        }
    }
}

impl TreeConfig {
    /// Returns a copy of this config that keeps siblings sorted by `fields`.
    pub fn with_order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum path length in characters.
    pub fn max_path_len(&self) -> usize {
        self.steplen.saturating_mul(self.max_depth)
    }

    /// Builds the path codec for this configuration, validating it.
    pub fn codec(&self) -> Result<PathCodec, CoreError> {
        PathCodec::new(&self.alphabet, self.steplen, self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_base36_steplen_four() {
        let config = TreeConfig::default();
        assert_eq!(config.alphabet.len(), 36);
        assert_eq!(config.steplen, 4);
        assert_eq!(config.max_path_len(), 252);
        assert!(config.node_order_by.is_empty());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: TreeConfig =
            serde_json::from_str(r#"{"steplen": 2, "node_order_by": ["name"]}"#).unwrap();
        assert_eq!(config.steplen, 2);
        assert_eq!(config.alphabet, DEFAULT_ALPHABET);
        assert_eq!(config.node_order_by, vec!["name".to_string()]);
    }

    #[test]
    fn codec_rejects_bad_config() {
        let config = TreeConfig {
            steplen: 0,
            ..TreeConfig::default()
        };
        assert!(matches!(
            config.codec(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
