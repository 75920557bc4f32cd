//! Environment configuration helpers
//!
//! Every service builds its config struct from `RELAY_*` environment
//! variables with sensible development defaults. The helpers here keep the
//! `from_env()` implementations uniform and let required options be
//! collected and reported together, so an operator sees every missing
//! name at once instead of fixing them one restart at a time.

use crate::error::ConfigError;
use std::str::FromStr;

/// Read an optional string variable, falling back to a default.
pub fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read an optional string variable.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Read and parse an optional variable, falling back to a default.
///
/// Unparseable values fall back rather than abort; startup validation of
/// required values goes through [`RequiredVars`] instead.
pub fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Read a comma-separated list variable.
pub fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .ok()
        .map(|s| {
            s.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Collector for required environment variables.
///
/// Call [`RequiredVars::take`] for each required option, then
/// [`RequiredVars::finish`]; the error lists every missing name.
#[derive(Debug, Default)]
pub struct RequiredVars {
    missing: Vec<String>,
}

impl RequiredVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a required variable, recording its name when absent or empty.
    pub fn take(&mut self, name: &str) -> String {
        match env_opt(name) {
            Some(value) => value,
            None => {
                self.missing.push(name.to_string());
                String::new()
            }
        }
    }

    /// Fail with the full list of missing names, if any.
    pub fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRequired {
                fields: self.missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; each uses its own names.

    #[test]
    fn test_env_string_default() {
        assert_eq!(env_string("RELAY_TEST_UNSET_STRING", "fallback"), "fallback");
    }

    #[test]
    fn test_env_parse_default_on_garbage() {
        std::env::set_var("RELAY_TEST_GARBAGE_NUM", "not-a-number");
        assert_eq!(env_parse("RELAY_TEST_GARBAGE_NUM", 42u16), 42);
        std::env::remove_var("RELAY_TEST_GARBAGE_NUM");
    }

    #[test]
    fn test_env_list_splits_and_trims() {
        std::env::set_var("RELAY_TEST_LIST", "a, b ,,c");
        assert_eq!(env_list("RELAY_TEST_LIST"), vec!["a", "b", "c"]);
        std::env::remove_var("RELAY_TEST_LIST");
    }

    #[test]
    fn test_required_vars_collects_all_missing() {
        let mut required = RequiredVars::new();
        required.take("RELAY_TEST_MISSING_ONE");
        required.take("RELAY_TEST_MISSING_TWO");
        let err = required.finish().unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("RELAY_TEST_MISSING_ONE"));
        assert!(rendered.contains("RELAY_TEST_MISSING_TWO"));
    }

    #[test]
    fn test_required_vars_ok_when_present() {
        std::env::set_var("RELAY_TEST_PRESENT", "value");
        let mut required = RequiredVars::new();
        assert_eq!(required.take("RELAY_TEST_PRESENT"), "value");
        assert!(required.finish().is_ok());
        std::env::remove_var("RELAY_TEST_PRESENT");
    }
}
