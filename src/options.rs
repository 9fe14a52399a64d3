use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rope::DEFAULT_FLATTEN_DEPTH;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid options: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime switches for the rope engine and the native bridge.
///
/// Every field has a default, so a partial JSON object is a valid options
/// file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Serialize native calls behind the extension lock.
    pub cext_lock: bool,
    /// Never recycle handle blocks, so stale handles stay resolvable.
    pub keep_handles_alive: bool,
    /// Count handle allocations.
    pub tonative_stats: bool,
    /// Kept objects buffered before they are queued for marking.
    pub marking_cache: usize,
    /// Concatenations deeper than this are flattened eagerly.
    pub flatten_depth_threshold: u32,
    /// How often a thread waiting on the extension lock polls safepoints.
    pub safepoint_poll_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cext_lock: true,
            keep_handles_alive: false,
            tonative_stats: false,
            marking_cache: 100,
            flatten_depth_threshold: DEFAULT_FLATTEN_DEPTH,
            safepoint_poll_ms: 10,
        }
    }
}

impl Options {
    pub fn from_json_str(json: &str) -> Result<Options, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Options, OptionsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn safepoint_poll_interval(&self) -> Duration {
        Duration::from_millis(self.safepoint_poll_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = Options::from_json_str(r#"{ "cext_lock": false, "marking_cache": 8 }"#).unwrap();
        assert!(!options.cext_lock);
        assert_eq!(options.marking_cache, 8);
        assert_eq!(options.flatten_depth_threshold, DEFAULT_FLATTEN_DEPTH);
        assert_eq!(options.safepoint_poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(matches!(
            Options::from_json_str(r#"{ "cext_lok": true }"#),
            Err(OptionsError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Options::load_from_path("/nonexistent/rbrope.json").unwrap_err();
        assert!(err.to_string().starts_with("failed to read options file"));
    }
}
