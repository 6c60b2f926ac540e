//! Fixed-width path segment encoding.
//!
//! A node's path is the concatenation of one segment per tree level. Each
//! segment is the node's 1-based sibling position written in base
//! `alphabet.len()`, left-padded with the alphabet's first symbol to exactly
//! `steplen` characters. Because every segment has the same width and the
//! alphabet is strictly ascending, byte-wise string order of paths equals
//! numeric sibling order at every level, and a node's subtree is exactly the
//! set of paths it prefixes.

use crate::config::{DEFAULT_ALPHABET, DEFAULT_MAX_DEPTH, DEFAULT_STEPLEN};
use crate::error::CoreError;

/// Encoder/decoder for materialized paths.
///
/// Built once per tree from its [`TreeConfig`](crate::config::TreeConfig)
/// and passed to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCodec {
    alphabet: String,
    steplen: usize,
    max_depth: usize,
}

impl Default for PathCodec {
    fn default() -> Self {
        PathCodec {
            alphabet: DEFAULT_ALPHABET.to_string(),
            steplen: DEFAULT_STEPLEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl PathCodec {
    /// Creates a codec, validating the alphabet and limits.
    ///
    /// The alphabet must be ASCII, hold at least two symbols and be strictly
    /// ascending, otherwise path order would not follow position order.
    pub fn new(alphabet: &str, steplen: usize, max_depth: usize) -> Result<Self, CoreError> {
        if !alphabet.is_ascii() {
            return Err(CoreError::InvalidConfig {
                reason: "alphabet must be ASCII".to_string(),
            });
        }
        if alphabet.len() < 2 {
            return Err(CoreError::InvalidConfig {
                reason: "alphabet needs at least two symbols".to_string(),
            });
        }
        if !alphabet.as_bytes().windows(2).all(|w| w[0] < w[1]) {
            return Err(CoreError::InvalidConfig {
                reason: format!("alphabet '{alphabet}' is not strictly ascending"),
            });
        }
        if steplen == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "steplen must be at least 1".to_string(),
            });
        }
        if max_depth == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "max_depth must be at least 1".to_string(),
            });
        }
        Ok(PathCodec {
            alphabet: alphabet.to_string(),
            steplen,
            max_depth,
        })
    }

    pub fn alphabet(&self) -> &str {
        &self.alphabet
    }

    pub fn steplen(&self) -> usize {
        self.steplen
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Maximum path length in characters.
    pub fn max_path_len(&self) -> usize {
        self.steplen.saturating_mul(self.max_depth)
    }

    fn radix(&self) -> u64 {
        self.alphabet.len() as u64
    }

    fn zero(&self) -> char {
        self.alphabet.as_bytes()[0] as char
    }

    fn top(&self) -> char {
        self.alphabet.as_bytes()[self.alphabet.len() - 1] as char
    }

    /// Largest position a single segment can hold (saturates at `u64::MAX`).
    pub fn max_position(&self) -> u64 {
        let mut max: u64 = 1;
        for _ in 0..self.steplen {
            match max.checked_mul(self.radix()) {
                Some(next) => max = next,
                None => return u64::MAX,
            }
        }
        max - 1
    }

    /// Encodes a 1-based sibling position as one padded segment.
    pub fn encode(&self, position: u64) -> Result<String, CoreError> {
        if position == 0 {
            return Err(CoreError::InvalidSegment {
                segment: "0".to_string(),
                reason: "sibling positions start at 1".to_string(),
            });
        }
        let digits = self.alphabet.as_bytes();
        let mut rest = position;
        let mut out = Vec::with_capacity(self.steplen);
        while rest > 0 {
            out.push(digits[(rest % self.radix()) as usize]);
            rest /= self.radix();
        }
        if out.len() > self.steplen {
            return Err(CoreError::PathOverflow {
                path: position.to_string(),
                reason: format!(
                    "position {position} needs {} characters, segment width is {}",
                    out.len(),
                    self.steplen
                ),
            });
        }
        out.resize(self.steplen, digits[0]);
        out.reverse();
        // Every byte comes from the ASCII alphabet.
        Ok(out.into_iter().map(char::from).collect())
    }

    /// Decodes a segment back into its position.
    pub fn decode(&self, segment: &str) -> Result<u64, CoreError> {
        if segment.is_empty() {
            return Err(CoreError::InvalidSegment {
                segment: String::new(),
                reason: "empty segment".to_string(),
            });
        }
        let digits = self.alphabet.as_bytes();
        let mut value: u64 = 0;
        for byte in segment.bytes() {
            let digit = digits
                .binary_search(&byte)
                .map_err(|_| CoreError::InvalidSegment {
                    segment: segment.to_string(),
                    reason: format!("'{}' is not in the alphabet", byte as char),
                })?;
            value = value
                .checked_mul(self.radix())
                .and_then(|v| v.checked_add(digit as u64))
                .ok_or_else(|| CoreError::InvalidSegment {
                    segment: segment.to_string(),
                    reason: "value does not fit in 64 bits".to_string(),
                })?;
        }
        Ok(value)
    }

    /// Number of whole segments in `path`.
    pub fn depth_of(&self, path: &str) -> usize {
        path.len() / self.steplen
    }

    /// First `depth` segments of `path`; empty when `depth` is zero.
    pub fn basepath<'a>(&self, path: &'a str, depth: usize) -> &'a str {
        if depth == 0 || path.is_empty() {
            return "";
        }
        let end = depth.saturating_mul(self.steplen).min(path.len());
        path.get(..end).unwrap_or(path)
    }

    /// Path of the parent, or `None` for roots (and for paths too short to
    /// have one).
    pub fn parent_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let depth = self.depth_of(path);
        if depth <= 1 {
            return None;
        }
        Some(self.basepath(path, depth - 1))
    }

    /// Inclusive bounds of every possible direct child path of `path`.
    pub fn children_interval(&self, path: &str) -> (String, String) {
        let low = format!("{path}{}", self.zero().to_string().repeat(self.steplen));
        let high = format!("{path}{}", self.top().to_string().repeat(self.steplen));
        (low, high)
    }

    /// Final segment of `path`.
    pub fn last_segment<'a>(&self, path: &'a str) -> &'a str {
        let start = path.len().saturating_sub(self.steplen);
        path.get(start..).unwrap_or(path)
    }

    /// Sibling position encoded in the final segment of `path`.
    pub fn last_position(&self, path: &str) -> Result<u64, CoreError> {
        self.decode(self.last_segment(path))
    }

    /// Path of the child at `position` under `parent` (empty parent for roots).
    pub fn child_path(&self, parent: &str, position: u64) -> Result<String, CoreError> {
        let path = format!("{parent}{}", self.encode(position)?);
        self.check_len(&path)?;
        Ok(path)
    }

    /// Path at `position` among the siblings of the node at `path`.
    pub fn sibling_path(&self, path: &str, position: u64) -> Result<String, CoreError> {
        let depth = self.depth_of(path);
        let parent = self.basepath(path, depth.saturating_sub(1));
        self.child_path(parent, position)
    }

    /// Path of the next sibling slot after `path`.
    pub fn inc_path(&self, path: &str) -> Result<String, CoreError> {
        let next = self.last_position(path)? + 1;
        self.sibling_path(path, next)
            .map_err(|err| match err {
                CoreError::PathOverflow { reason, .. } => CoreError::PathOverflow {
                    path: path.to_string(),
                    reason,
                },
                other => other,
            })
    }

    /// Fails with [`CoreError::PathOverflow`] if `path` exceeds the limit.
    pub fn check_len(&self, path: &str) -> Result<(), CoreError> {
        if path.len() > self.max_path_len() {
            return Err(CoreError::PathOverflow {
                path: path.to_string(),
                reason: format!(
                    "length {} exceeds maximum path length {}",
                    path.len(),
                    self.max_path_len()
                ),
            });
        }
        Ok(())
    }

    /// Whether every character of `path` belongs to the alphabet.
    pub fn in_alphabet(&self, path: &str) -> bool {
        path.bytes()
            .all(|b| self.alphabet.as_bytes().binary_search(&b).is_ok())
    }

    /// Whether `path` is non-empty and a whole number of segments long.
    pub fn has_valid_length(&self, path: &str) -> bool {
        !path.is_empty() && path.len() % self.steplen == 0
    }
}
