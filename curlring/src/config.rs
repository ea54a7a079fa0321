use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Configuration for a [`TransferExecutor`](crate::TransferExecutor).
///
/// Loadable from TOML; unknown keys are rejected.
///
/// ```toml
/// max_handles = 2
/// max_nesting_depth = 8
/// select_timeout_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of idle handles kept for reuse. `None` keeps every
    /// released handle.
    pub max_handles: Option<usize>,
    /// How deep progress callbacks may nest transfers inside transfers.
    /// Default: 32.
    pub max_nesting_depth: usize,
    /// Upper bound on a single blocking poll of the multi handle, in
    /// milliseconds. Transfers still finish early; this only caps how long
    /// the loop sleeps when libcurl has no timer of its own.
    /// Default: 1000.
    pub select_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_handles: None,
            max_nesting_depth: 32,
            select_timeout_ms: 1000,
        }
    }
}

impl Config {
    /// Keep at most `max` idle handles.
    pub fn max_handles(mut self, max: usize) -> Self {
        self.max_handles = Some(max);
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values. Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_nesting_depth == 0 {
            return Err(Error::Config("max_nesting_depth must be > 0".into()));
        }
        if self.select_timeout_ms == 0 {
            return Err(Error::Config("select_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub(crate) fn select_timeout(&self) -> Duration {
        Duration::from_millis(self.select_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_handles, None);
    }

    #[test]
    fn from_toml_partial() {
        let config = Config::from_toml("max_handles = 2").unwrap();
        assert_eq!(config.max_handles, Some(2));
        assert_eq!(config.max_nesting_depth, 32);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            Config::from_toml("max_handle = 2"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn zero_depth_rejected() {
        assert!(Config::default().max_nesting_depth(0).validate().is_err());
        assert!(Config::from_toml("select_timeout_ms = 0").is_err());
    }
}
