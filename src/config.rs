//! Router configuration.

use serde::Deserialize;

/// What happens when an invalid response or a transport failure is not vetoed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Perform a full browser load of the requested URL.
    #[default]
    FullReload,
    /// Report the outcome to the caller and leave the page as it is.
    Surface,
}

/// Router configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Largest serialized page stored directly in a history entry.
    /// Larger pages are encoded through the state codec.
    /// Default: 2MB
    pub max_direct_state_bytes: usize,

    /// Encode every history entry, regardless of size.
    pub encrypt_history: bool,

    /// Number of decoded history blobs kept in memory.
    pub decode_cache_size: usize,

    /// Fallback for unvetoed invalid responses and exceptions.
    pub fallback: FallbackPolicy,

    /// Buffer size of event observer streams.
    pub event_stream_buffer: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_direct_state_bytes: 2 * 1024 * 1024, // 2MB
            encrypt_history: false,
            decode_cache_size: 64,
            fallback: FallbackPolicy::FullReload,
            event_stream_buffer: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_config_keeps_defaults() {
        let config: RouterConfig =
            serde_json::from_str(r#"{"encrypt_history": true, "fallback": "surface"}"#).unwrap();

        assert!(config.encrypt_history);
        assert_eq!(config.fallback, FallbackPolicy::Surface);
        assert_eq!(config.decode_cache_size, 64);
        assert_eq!(config.max_direct_state_bytes, 2 * 1024 * 1024);
    }
}
