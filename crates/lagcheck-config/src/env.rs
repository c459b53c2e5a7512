use regex::Regex;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::types::{HumanDuration, LoadConfig, WorkloadKind};
use crate::ConfigError;

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern is valid")
    })
}

/// Interpolate environment variables in a string.
/// Replaces `${VAR_NAME}` with the value of the environment variable.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    interpolate_with(input, |name| env::var(name).ok())
}

pub(crate) fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let result = var_pattern().replace_all(input, |cap: &regex::Captures<'_>| {
        let var_name = &cap[1];
        match lookup(var_name) {
            Some(value) => value,
            None => {
                if !errors.iter().any(|e| e == var_name) {
                    errors.push(var_name.to_string());
                }
                String::new()
            }
        }
    });

    if !errors.is_empty() {
        return Err(ConfigError::MissingEnvVars(errors));
    }

    Ok(result.into_owned())
}

/// Read a variable, treating an empty value as unset.
fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn parsed<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: ToString,
{
    match non_empty(lookup, name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string())),
    }
}

impl LoadConfig {
    /// Apply `LAGCHECK_*` overrides from the process environment.
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides(|name| env::var(name).ok())
    }

    /// Apply `LAGCHECK_*` overrides using the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rate) = parsed::<_, u32>(&lookup, "LAGCHECK_RATE")? {
            self.rate = rate;
        }
        if let Some(window) = parsed::<_, usize>(&lookup, "LAGCHECK_WINDOW")? {
            self.window = window;
        }
        if let Some(timeout) = parsed::<_, HumanDuration>(&lookup, "LAGCHECK_TIMEOUT")? {
            self.timeout = timeout;
        }
        if let Some(keyspace) = parsed::<_, u64>(&lookup, "LAGCHECK_KEYSPACE")? {
            self.keyspace = keyspace;
        }
        if let Some(max) = parsed::<_, usize>(&lookup, "LAGCHECK_MAX_IN_FLIGHT")? {
            self.max_in_flight = max;
        }
        if let Some(workload) = parsed::<_, WorkloadKind>(&lookup, "LAGCHECK_WORKLOAD")? {
            self.workload = workload;
        }
        if let Some(check) = parsed::<_, bool>(&lookup, "LAGCHECK_CHECK")? {
            self.check = check;
        }
        if let Some(endpoint) = non_empty(&lookup, "LAGCHECK_STORE_ENDPOINT") {
            self.store.endpoint = Some(endpoint);
        }
        if let Some(user) = non_empty(&lookup, "LAGCHECK_STORE_USER") {
            self.store.user = Some(user);
        }
        if let Some(password) = non_empty(&lookup, "LAGCHECK_STORE_PASSWORD") {
            self.store.password = Some(password);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_interpolate_env() {
        let lookup = lookup_from(&[("TEST_VAR", "hello"), ("ANOTHER_VAR", "world")]);
        let input = "prefix ${TEST_VAR} middle ${ANOTHER_VAR} suffix";
        let result = interpolate_with(input, lookup).unwrap();
        assert_eq!(result, "prefix hello middle world suffix");
    }

    #[test]
    fn test_interpolate_env_missing_collects_all() {
        let lookup = lookup_from(&[]);
        let result = interpolate_with("${MISSING_ONE} and ${MISSING_TWO} and ${MISSING_ONE}", lookup);
        match result {
            Err(ConfigError::MissingEnvVars(vars)) => {
                assert_eq!(vars, vec!["MISSING_ONE", "MISSING_TWO"]);
            }
            _ => panic!("Expected MissingEnvVars error"),
        }
    }

    #[test]
    fn test_interpolate_env_partial_syntax_not_matched() {
        let lookup = lookup_from(&[]);
        assert_eq!(
            interpolate_with("not a $VAR or ${VAR variable", lookup).unwrap(),
            "not a $VAR or ${VAR variable"
        );
    }

    #[test]
    fn test_interpolate_process_env() {
        env::set_var("LAGCHECK_TEST_INTERP_HOST", "db.internal");
        let result = interpolate_env("endpoint: ${LAGCHECK_TEST_INTERP_HOST}:27017").unwrap();
        assert_eq!(result, "endpoint: db.internal:27017");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LoadConfig::default();
        let lookup = lookup_from(&[
            ("LAGCHECK_RATE", "30"),
            ("LAGCHECK_WINDOW", "300"),
            ("LAGCHECK_TIMEOUT", "500ms"),
            ("LAGCHECK_KEYSPACE", "50"),
            ("LAGCHECK_WORKLOAD", "insert_only"),
            ("LAGCHECK_CHECK", "false"),
            ("LAGCHECK_STORE_ENDPOINT", "127.0.0.1:4000"),
        ]);
        config.apply_env_overrides(lookup).unwrap();

        assert_eq!(config.rate, 30);
        assert_eq!(config.window, 300);
        assert_eq!(config.timeout.as_duration(), Duration::from_millis(500));
        assert_eq!(config.keyspace, 50);
        assert_eq!(config.workload, WorkloadKind::InsertOnly);
        assert!(!config.check);
        assert_eq!(config.store.endpoint.as_deref(), Some("127.0.0.1:4000"));
    }

    #[test]
    fn test_empty_env_value_is_unset() {
        let mut config = LoadConfig::default();
        let lookup = lookup_from(&[("LAGCHECK_RATE", ""), ("LAGCHECK_STORE_USER", "  ")]);
        config.apply_env_overrides(lookup).unwrap();
        assert_eq!(config.rate, 10);
        assert_eq!(config.store.user, None);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = LoadConfig::default();
        let lookup = lookup_from(&[("LAGCHECK_WINDOW", "lots")]);
        match config.apply_env_overrides(lookup) {
            Err(ConfigError::InvalidEnvVar(name, _)) => assert_eq!(name, "LAGCHECK_WINDOW"),
            other => panic!("Expected InvalidEnvVar, got {:?}", other),
        }
    }
}
