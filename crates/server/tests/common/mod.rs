//! Common helpers for tests that run the `discshelf` binary.

use std::io::Write;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tempfile::TempDir;
use tokio::time::sleep;

/// Find an available port
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A config with every required section, rooted in `root`
pub fn minimal_config(port: u16, root: &Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {port}

[database]
path = "{root}/discshelf.db"

[workspace]
root = "{root}/work"

[library]
movies = "{root}/library/Movies"
tv = "{root}/library/TV Shows"
home_movies = "{root}/library/Home Movies"
other = "{root}/library/Other"
"#,
        port = port,
        root = root.display()
    )
}

/// A running server with its temp directory.
pub struct TestServer {
    pub port: u16,
    pub client: Client,
    pub dir: TempDir,
    child: tokio::process::Child,
}

impl TestServer {
    /// Start a server after letting `prepare` seed its database.
    pub async fn start_with(prepare: impl FnOnce(&Path)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let port = get_available_port();
        prepare(&dir.path().join("discshelf.db"));

        let config_path = write_config(dir.path(), &minimal_config(port, dir.path()));
        let child = spawn_server(&config_path).await;

        let server = Self {
            port,
            client: Client::new(),
            dir,
            child,
        };
        assert!(
            wait_for_server(port, 100).await,
            "Server did not start in time"
        );
        server
    }

    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}/api/v1{}", self.port, path)
    }

    pub async fn stop(mut self) {
        self.child.kill().await.ok();
    }
}

pub fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    path
}

/// Spawn the server and return a handle
pub async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_discshelf"))
        .env("DISCSHELF_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}
