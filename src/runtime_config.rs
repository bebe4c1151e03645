//! # Runtime Configuration
//!
//! Environment variables read once at startup by the `routeforge` binary and
//! by hosts embedding the router.
//!
//! ### `ROUTEFORGE_ROUTES`
//!
//! Path of the YAML route file loaded when no `--file` is given.
//!
//! ### `ROUTEFORGE_WATCH`
//!
//! `true` to reload the route file whenever it changes. Default: `false`.
//!
//! ### `ROUTEFORGE_SLOW_MATCH_US`
//!
//! Matches taking longer than this many microseconds are logged at `warn`.
//! Accepts decimal (`1000`) or hexadecimal (`0x3e8`). Default: `1000`.
//!
//! ```rust
//! use routeforge::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("slow match threshold: {:?}", config.slow_match);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::router::DEFAULT_SLOW_MATCH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Route file to load, if configured
    pub routes_file: Option<PathBuf>,
    /// Reload the route file on change
    pub watch: bool,
    /// Threshold for the slow-match warning
    pub slow_match: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            routes_file: None,
            watch: false,
            slow_match: DEFAULT_SLOW_MATCH,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let slow_match = lookup("ROUTEFORGE_SLOW_MATCH_US")
            .and_then(|val| parse_micros(&val))
            .map_or(defaults.slow_match, Duration::from_micros);
        RuntimeConfig {
            routes_file: lookup("ROUTEFORGE_ROUTES")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            watch: lookup("ROUTEFORGE_WATCH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.watch),
            slow_match,
        }
    }
}

fn parse_micros(val: &str) -> Option<u64> {
    match val.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(RuntimeConfig::from_lookup(lookup(&[])), RuntimeConfig::default());
    }

    #[test]
    fn test_values_from_environment() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("ROUTEFORGE_ROUTES", "config/routes.yaml"),
            ("ROUTEFORGE_WATCH", "true"),
            ("ROUTEFORGE_SLOW_MATCH_US", "0x10"),
        ]));
        assert_eq!(config.routes_file, Some(PathBuf::from("config/routes.yaml")));
        assert!(config.watch);
        assert_eq!(config.slow_match, Duration::from_micros(16));
    }

    #[test]
    fn test_unparsable_values_use_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("ROUTEFORGE_WATCH", "sometimes"),
            ("ROUTEFORGE_SLOW_MATCH_US", "fast"),
        ]));
        assert!(!config.watch);
        assert_eq!(config.slow_match, DEFAULT_SLOW_MATCH);
    }
}
