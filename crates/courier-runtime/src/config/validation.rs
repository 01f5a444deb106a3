//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, LogOutput, LoggingConfig, TelegramConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_telegram_config(&config.telegram)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.filters.keys().any(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter targets cannot be empty"));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation("logging.max_files must be greater than 0"));
    }

    Ok(())
}

fn validate_telegram_config(telegram: &TelegramConfig) -> ConfigResult<()> {
    if telegram.client_name.trim().is_empty() {
        return Err(ConfigError::missing_field("telegram.client_name"));
    }

    let mut seen = HashSet::new();
    for module in &telegram.include {
        if module.trim().is_empty() {
            return Err(ConfigError::validation("Include entries cannot be empty"));
        }
        if !seen.insert(module.as_str()) {
            return Err(ConfigError::DuplicateInclude(module.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_file_output_without_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;

        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_include_entries() {
        let mut config = CourierConfig::default();
        config.telegram.include = vec!["greeting".into(), "greeting".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateInclude(name)) if name == "greeting"
        ));

        config.telegram.include = vec![" ".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_empty_client_name() {
        let mut config = CourierConfig::default();
        config.telegram.client_name = String::new();
        assert!(validate_config(&config).is_err());
    }
}
