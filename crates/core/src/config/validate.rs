use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Auto-approve threshold is within [0, 1]
/// - Drive ids are non-empty
/// - Every library root and the workspace root are set
/// - Poll intervals are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let threshold = config.orchestrator.auto_approve_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.auto_approve_threshold must be between 0 and 1, got {}",
            threshold
        )));
    }

    if config.drives.ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "drives.ids cannot contain empty ids".to_string(),
        ));
    }

    if config.workspace.root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "workspace.root cannot be empty".to_string(),
        ));
    }

    let library = &config.library;
    for (name, path) in [
        ("movies", &library.movies),
        ("tv", &library.tv),
        ("home_movies", &library.home_movies),
        ("other", &library.other),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "library.{} cannot be empty",
                name
            )));
        }
    }

    let orch = &config.orchestrator;
    if orch.drive_poll_interval_ms == 0
        || orch.stage_poll_interval_ms == 0
        || orch.move_retry_interval_ms == 0
    {
        return Err(ConfigError::ValidationError(
            "orchestrator poll intervals must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
