use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Transfer concurrency is at least 1
/// - Working directory names are plain, non-empty and distinct
/// - Transfer file naming parts are non-empty
/// - Timeouts are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Pipeline validation
    let pipeline = &config.pipeline;
    if pipeline.max_concurrent_downloads == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_concurrent_downloads cannot be 0".to_string(),
        ));
    }
    validate_dir_name("pipeline.downloads_dir", &pipeline.downloads_dir)?;
    validate_dir_name("pipeline.converted_dir", &pipeline.converted_dir)?;
    if pipeline.downloads_dir == pipeline.converted_dir {
        return Err(ConfigError::ValidationError(
            "pipeline.downloads_dir and pipeline.converted_dir must differ".to_string(),
        ));
    }

    // Transfer validation
    let transfer = &config.transfer;
    if transfer.file_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "transfer.file_prefix cannot be empty".to_string(),
        ));
    }
    if transfer.file_extension.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "transfer.file_extension cannot be empty".to_string(),
        ));
    }
    if transfer.connect_timeout_secs == 0 || transfer.read_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transfer timeouts cannot be 0".to_string(),
        ));
    }

    // Converter validation
    if config.converter.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "converter.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_dir_name(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ConfigError::ValidationError(format!(
            "{} must be a plain directory name, got {:?}",
            field, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let config = Config {
            pipeline: PipelineConfig::default().with_max_concurrent_downloads(0),
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_dir_names() {
        let mut config = Config::default();
        config.pipeline.downloads_dir = "a/b".to_string();
        assert!(validate_config(&config).is_err());

        config.pipeline.downloads_dir = "".to_string();
        assert!(validate_config(&config).is_err());

        config.pipeline.downloads_dir = "..".to_string();
        assert!(validate_config(&config).is_err());

        config.pipeline.downloads_dir = "converted".to_string();
        assert!(validate_config(&config).is_err());

        config.pipeline.downloads_dir = "raw".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_naming_and_timeouts() {
        let mut config = Config::default();
        config.transfer.file_extension = " ".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.transfer.read_timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.converter.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
