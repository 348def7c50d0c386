use super::types::{AuthMethod, Config};
use super::ConfigError;

/// Validate a loaded configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.sync.manager.worker_count < 1 {
        return Err(ConfigError::Invalid(
            "sync.worker_count must be at least 1".to_string(),
        ));
    }

    if config.sync.manager.dispatch_retry_ms == 0 {
        return Err(ConfigError::Invalid(
            "sync.dispatch_retry_ms must be greater than 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().unwrap_or("").is_empty()
    {
        return Err(ConfigError::Invalid(
            "auth.api_key is required when auth.method is api_key".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_valid_config() {
        let config = load_config_from_str(
            r#"
[auth]
method = "none"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = load_config_from_str(
            r#"
[auth]
method = "none"

[sync]
worker_count = 0
"#,
        )
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_api_key_method_requires_key() {
        let config = load_config_from_str(
            r#"
[auth]
method = "api_key"
"#,
        )
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_api_key_method_with_key_is_valid() {
        let config = load_config_from_str(
            r#"
[auth]
method = "api_key"
api_key = "sekrit"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }
}
