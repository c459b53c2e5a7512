use crate::types::LoadConfig;
use crate::ConfigError;

/// Highest accepted `rate`; one tick per nanosecond.
pub const MAX_RATE: u32 = 1_000_000_000;

/// Highest accepted `max_in_flight`. The dispatcher drains by acquiring every
/// slot in one call, which takes a `u32`.
pub const MAX_IN_FLIGHT: usize = u32::MAX as usize;

impl LoadConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.rate == 0 {
            errors.push(ConfigError::InvalidValue(
                "rate".to_string(),
                "must be at least 1 tick per second".to_string(),
            ));
        } else if self.rate > MAX_RATE {
            errors.push(ConfigError::InvalidValue(
                "rate".to_string(),
                format!("must be at most {} ticks per second", MAX_RATE),
            ));
        }

        if self.window == 0 {
            errors.push(ConfigError::InvalidValue(
                "window".to_string(),
                "capacity must be greater than zero".to_string(),
            ));
        }

        if self.timeout.as_duration().is_zero() {
            errors.push(ConfigError::InvalidValue(
                "timeout".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        if self.keyspace == 0 {
            errors.push(ConfigError::InvalidValue(
                "keyspace".to_string(),
                "must contain at least one key".to_string(),
            ));
        }

        if self.max_in_flight == 0 {
            errors.push(ConfigError::InvalidValue(
                "max_in_flight".to_string(),
                "must allow at least one write".to_string(),
            ));
        } else if self.max_in_flight > MAX_IN_FLIGHT {
            errors.push(ConfigError::InvalidValue(
                "max_in_flight".to_string(),
                format!("must be at most {}", MAX_IN_FLIGHT),
            ));
        }

        if self.store.password.is_some() && self.store.user.is_none() {
            errors.push(ConfigError::InvalidConfig(
                "store password is set without a store user".to_string(),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HumanDuration;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LoadConfig::default().validate().is_empty());
        assert!(LoadConfig::default().validate_or_err().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = LoadConfig {
            rate: 0,
            window: 0,
            timeout: HumanDuration(Duration::ZERO),
            keyspace: 0,
            max_in_flight: 0,
            ..Default::default()
        };

        let errors = config.validate();
        assert_eq!(errors.len(), 5);
        for field in ["rate", "window", "timeout", "keyspace", "max_in_flight"] {
            assert!(
                errors
                    .iter()
                    .any(|e| matches!(e, ConfigError::InvalidValue(f, _) if f == field)),
                "missing error for {}",
                field
            );
        }
    }

    #[test]
    fn test_rate_upper_bound() {
        let at_limit = LoadConfig {
            rate: MAX_RATE,
            ..Default::default()
        };
        assert!(at_limit.validate().is_empty());

        let config = LoadConfig {
            rate: 2_000_000_000,
            ..Default::default()
        };
        match config.validate_or_err() {
            Err(ConfigError::InvalidValue(field, _)) => assert_eq!(field, "rate"),
            other => panic!("Expected rate error, got {:?}", other),
        }
    }

    #[test]
    fn test_max_in_flight_upper_bound() {
        let at_limit = LoadConfig {
            max_in_flight: MAX_IN_FLIGHT,
            ..Default::default()
        };
        assert!(at_limit.validate().is_empty());

        let config = LoadConfig {
            max_in_flight: usize::MAX,
            ..Default::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ConfigError::InvalidValue(f, _) if f == "max_in_flight"));
    }

    #[test]
    fn test_validate_or_err_returns_first() {
        let config = LoadConfig {
            window: 0,
            keyspace: 0,
            ..Default::default()
        };
        match config.validate_or_err() {
            Err(ConfigError::InvalidValue(field, _)) => assert_eq!(field, "window"),
            other => panic!("Expected window error, got {:?}", other),
        }
    }

    #[test]
    fn test_password_without_user() {
        let mut config = LoadConfig::default();
        config.store.password = Some("secret".to_string());
        assert!(config
            .validate()
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidConfig(_))));
    }
}
