use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::external_catalog::TmdbConfig;
use crate::job::ContentMode;
use crate::notify::PushoverConfig;
use crate::stages::OrchestratorConfig;
use crate::vision::AiConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub workspace: WorkspaceConfig,
    pub library: LibraryConfig,
    #[serde(default)]
    pub drives: DrivesConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub tmdb: Option<TmdbConfig>,
    #[serde(default)]
    pub ai: Option<AiConfig>,
    #[serde(default)]
    pub notifications: Option<PushoverConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("discshelf.db")
}

/// Scratch space for in-flight rips and encodes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
}

impl WorkspaceConfig {
    /// Directory a job's rip output is written to.
    pub fn staging_dir(&self, job_id: i64) -> PathBuf {
        self.root.join("staging").join(format!("job_{}", job_id))
    }

    /// Directory a job's encode output is written to.
    pub fn encoding_dir(&self, job_id: i64) -> PathBuf {
        self.root.join("encoding").join(format!("job_{}", job_id))
    }
}

/// Destination roots, one per content mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    pub movies: PathBuf,
    pub tv: PathBuf,
    pub home_movies: PathBuf,
    pub other: PathBuf,
}

impl LibraryConfig {
    /// Library root that files of the given mode are placed under.
    pub fn root_for(&self, mode: ContentMode) -> &Path {
        match mode {
            ContentMode::Movie => &self.movies,
            ContentMode::Tv => &self.tv,
            ContentMode::HomeMovies => &self.home_movies,
            ContentMode::Other => &self.other,
        }
    }
}

/// Optical drives to watch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DrivesConfig {
    #[serde(default = "default_drive_ids")]
    pub ids: Vec<String>,
}

impl Default for DrivesConfig {
    fn default() -> Self {
        Self {
            ids: default_drive_ids(),
        }
    }
}

fn default_drive_ids() -> Vec<String> {
    vec!["1".to_string()]
}

/// Paths to the external command line tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_makemkvcon")]
    pub makemkvcon: PathBuf,
    #[serde(default = "default_handbrake")]
    pub handbrake: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
    #[serde(default = "default_drutil")]
    pub drutil: PathBuf,
    #[serde(default = "default_diskutil")]
    pub diskutil: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            makemkvcon: default_makemkvcon(),
            handbrake: default_handbrake(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            drutil: default_drutil(),
            diskutil: default_diskutil(),
        }
    }
}

fn default_makemkvcon() -> PathBuf {
    PathBuf::from("makemkvcon")
}

fn default_handbrake() -> PathBuf {
    PathBuf::from("HandBrakeCLI")
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_drutil() -> PathBuf {
    PathBuf::from("drutil")
}

fn default_diskutil() -> PathBuf {
    PathBuf::from("diskutil")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub workspace: WorkspaceConfig,
    pub library: LibraryConfig,
    pub drives: DrivesConfig,
    pub orchestrator: OrchestratorConfig,
    pub tools: ToolsConfig,
    pub tmdb_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    pub notifications_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            workspace: config.workspace.clone(),
            library: config.library.clone(),
            drives: config.drives.clone(),
            orchestrator: config.orchestrator.clone(),
            tools: config.tools.clone(),
            tmdb_configured: config
                .tmdb
                .as_ref()
                .is_some_and(|t| !t.api_token.is_empty()),
            ai_model: config.ai.as_ref().map(|a| a.model.clone()),
            notifications_configured: config.notifications.is_some(),
        }
    }
}
