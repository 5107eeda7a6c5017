//! Runtime configuration.
//!
//! Construct with struct literal syntax and fill the rest from defaults:
//!
//! ```ignore
//! let config = RuntimeConfig {
//!     record_mutations: true,
//!     ..Default::default()
//! };
//! let rt = Runtime::with_config(config);
//! ```
//!
//! Or read overrides from the environment with [`RuntimeConfig::from_env`].

use std::env;

/// Env var toggling duplicate-key validation in keyed `each` regions.
pub const ENV_VALIDATE_KEYS: &str = "SPARK_DOM_VALIDATE_KEYS";
/// Env var toggling warnings for props the component does not declare.
pub const ENV_WARN_UNKNOWN_PROPS: &str = "SPARK_DOM_WARN_UNKNOWN_PROPS";
/// Env var toggling the DOM mutation journal.
pub const ENV_RECORD_MUTATIONS: &str = "SPARK_DOM_RECORD_MUTATIONS";

/// Behaviour switches shared by every component of one runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Check keyed lists for duplicate keys before reconciling. Duplicates
    /// are logged and only the first occurrence is rendered.
    pub validate_keys: bool,
    /// Log a warning when `set_props` receives a name the component does not
    /// declare.
    pub warn_unknown_props: bool,
    /// Keep a journal of every DOM mutation (see `Dom::take_journal`).
    pub record_mutations: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            validate_keys: true,
            warn_unknown_props: true,
            record_mutations: false,
        }
    }
}

impl RuntimeConfig {
    /// Defaults, overridden by any recognised `SPARK_DOM_*` variable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| {
            lookup(name)
                .and_then(|raw| parse_flag(&raw))
                .unwrap_or(default)
        };

        Self {
            validate_keys: flag(ENV_VALIDATE_KEYS, defaults.validate_keys),
            warn_unknown_props: flag(ENV_WARN_UNKNOWN_PROPS, defaults.warn_unknown_props),
            record_mutations: flag(ENV_RECORD_MUTATIONS, defaults.record_mutations),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
