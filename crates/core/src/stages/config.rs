//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the orchestrator.
    /// When disabled, the API still serves the job store but nothing is processed.
    #[serde(default)]
    pub enabled: bool,

    /// How often each drive is polled for a disc (milliseconds).
    #[serde(default = "default_drive_interval")]
    pub drive_poll_interval_ms: u64,

    /// How often the rip, encode and identify stages look for work (milliseconds).
    #[serde(default = "default_stage_interval")]
    pub stage_poll_interval_ms: u64,

    /// Minimum wait between placement attempts of a job whose library root
    /// was missing. First attempts run at the stage interval.
    #[serde(default = "default_move_interval")]
    pub move_retry_interval_ms: u64,

    /// Wait after claiming a rip before talking to the drive (milliseconds).
    #[serde(default = "default_settle_delay")]
    pub rip_settle_delay_ms: u64,

    /// Titles at least this long are feature candidates (seconds).
    #[serde(default = "default_min_feature")]
    pub min_feature_duration_secs: u64,

    /// Auto-approve threshold (0.0-1.0).
    /// Matches below this go to review.
    #[serde(default = "default_threshold")]
    pub auto_approve_threshold: f64,

    /// Placement attempts allowed while the library root is missing.
    #[serde(default = "default_max_move_retries")]
    pub max_move_retries: u32,

    /// How long `stop` waits for workers before aborting them (milliseconds).
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,

    /// How often the consistency check runs (milliseconds).
    #[serde(default = "default_oversight_interval")]
    pub oversight_interval_ms: u64,
}

fn default_drive_interval() -> u64 {
    15_000
}

fn default_stage_interval() -> u64 {
    5_000
}

fn default_move_interval() -> u64 {
    300_000 // 5 minutes
}

fn default_settle_delay() -> u64 {
    5_000
}

fn default_min_feature() -> u64 {
    3_600
}

fn default_threshold() -> f64 {
    0.85
}

fn default_max_move_retries() -> u32 {
    10
}

fn default_stop_timeout() -> u64 {
    5_000
}

fn default_oversight_interval() -> u64 {
    600_000 // 10 minutes
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            drive_poll_interval_ms: default_drive_interval(),
            stage_poll_interval_ms: default_stage_interval(),
            move_retry_interval_ms: default_move_interval(),
            rip_settle_delay_ms: default_settle_delay(),
            min_feature_duration_secs: default_min_feature(),
            auto_approve_threshold: default_threshold(),
            max_move_retries: default_max_move_retries(),
            stop_timeout_ms: default_stop_timeout(),
            oversight_interval_ms: default_oversight_interval(),
        }
    }
}

impl OrchestratorConfig {
    pub fn drive_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drive_poll_interval_ms)
    }

    pub fn stage_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stage_poll_interval_ms)
    }

    pub fn move_retry_interval(&self) -> Duration {
        Duration::from_millis(self.move_retry_interval_ms)
    }

    pub fn rip_settle_delay(&self) -> Duration {
        Duration::from_millis(self.rip_settle_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn oversight_interval(&self) -> Duration {
        Duration::from_millis(self.oversight_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.drive_poll_interval_ms, 15000);
        assert_eq!(config.stage_poll_interval_ms, 5000);
        assert_eq!(config.move_retry_interval(), Duration::from_secs(300));
        assert_eq!(config.min_feature_duration_secs, 3600);
        assert_eq!(config.auto_approve_threshold, 0.85);
        assert_eq!(config.max_move_retries, 10);
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            enabled = true
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.stage_poll_interval_ms, 5000);
        assert_eq!(config.auto_approve_threshold, 0.85);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            enabled = true
            drive_poll_interval_ms = 1000
            stage_poll_interval_ms = 200
            move_retry_interval_ms = 60000
            rip_settle_delay_ms = 0
            min_feature_duration_secs = 2700
            auto_approve_threshold = 0.90
            max_move_retries = 3
            stop_timeout_ms = 100
            oversight_interval_ms = 1000
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.drive_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.rip_settle_delay(), Duration::ZERO);
        assert_eq!(config.min_feature_duration_secs, 2700);
        assert_eq!(config.auto_approve_threshold, 0.90);
        assert_eq!(config.max_move_retries, 3);
        assert_eq!(config.stop_timeout(), Duration::from_millis(100));
    }
}
