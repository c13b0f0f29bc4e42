mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use discshelf_core::{
    create_event_system, load_config, validate_config,
    drive::DrutilDrive,
    encoder::HandBrakeEncoder,
    external_catalog::{MetadataSearch, TmdbClient},
    notify::{EventSink, PushoverNotifier},
    placer::FsPlacer,
    ripper::MakeMkvRipper,
    stages::{Oversight, ReviewActions},
    vision::{AiIdentifier, AnthropicVision, FfmpegScreenshotter, ScreenshotExtractor},
    Orchestrator, PipelineBackends, SqliteJobStore,
};

use api::create_router;
use state::AppState;

/// Buffer size for the pipeline event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// How long shutdown waits for queued notifications
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DISCSHELF_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Configuration loaded successfully (hash {})", &config_hash[..16]);
    info!("Database path: {:?}", config.database.path);
    info!("Drives: {:?}", config.drives.ids);

    // Create SQLite job store
    let store = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    // Notification sinks
    let mut sinks: Vec<Arc<dyn EventSink>> = Vec::new();
    match &config.notifications {
        Some(pushover) => match PushoverNotifier::new(pushover.clone()) {
            Ok(notifier) => {
                info!("Pushover notifications enabled");
                sinks.push(Arc::new(notifier));
            }
            Err(e) => error!("Failed to create Pushover notifier: {}", e),
        },
        None => info!("Notifications not configured"),
    }

    // Create event system
    let (events, dispatcher) = create_event_system(sinks, EVENT_BUFFER_SIZE);
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // Metadata search
    let search: Option<Arc<dyn MetadataSearch>> = match &config.tmdb {
        Some(tmdb_config) => match TmdbClient::new(tmdb_config.clone()) {
            Ok(client) => {
                info!("Initializing TMDB client");
                Some(Arc::new(client))
            }
            Err(e) => {
                error!("Failed to create TMDB client: {}", e);
                None
            }
        },
        None => {
            warn!("TMDB not configured, movies will always need review");
            None
        }
    };

    // AI fallback
    let ai: Option<Arc<dyn AiIdentifier>> = match &config.ai {
        Some(ai_config) => match AnthropicVision::new(ai_config.clone()) {
            Ok(vision) => {
                info!("AI identification enabled (model {})", vision.model());
                Some(Arc::new(vision))
            }
            Err(e) => {
                error!("Failed to create AI identifier: {}", e);
                None
            }
        },
        None => {
            info!("AI identification not configured");
            None
        }
    };
    let screenshots: Option<Arc<dyn ScreenshotExtractor>> = ai.as_ref().map(|_| {
        Arc::new(FfmpegScreenshotter::new(
            &config.tools.ffmpeg,
            &config.tools.ffprobe,
        )) as Arc<dyn ScreenshotExtractor>
    });

    let backends = PipelineBackends {
        drive: Arc::new(DrutilDrive::new(&config.tools.drutil, &config.tools.diskutil)),
        ripper: Arc::new(MakeMkvRipper::new(&config.tools.makemkvcon)),
        encoder: Arc::new(HandBrakeEncoder::new(&config.tools.handbrake)),
        placer: Arc::new(FsPlacer::new()),
        search,
        ai,
        screenshots,
    };

    // Create orchestrator
    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        Arc::clone(&store),
        backends,
        Some(events.clone()),
    ));
    if config.orchestrator.enabled {
        orchestrator.start().await;
        info!("Orchestrator started");
    } else {
        info!("Orchestrator disabled in config");
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&store),
        ReviewActions::new(store.clone(), store.clone()),
        Oversight::new(store.clone()),
        Arc::clone(&orchestrator),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop orchestrator if running
    info!("Stopping orchestrator...");
    orchestrator.stop().await;
    info!("Orchestrator stopped");

    // Drop all holders of EventHandle so the dispatcher's channel closes.
    // The stages inside the orchestrator hold clones, so it goes first.
    drop(orchestrator);
    drop(events);

    // Wait for the dispatcher to deliver remaining events
    match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
        Ok(_) => info!("Event dispatcher stopped"),
        Err(_) => warn!("Event dispatcher did not drain in time"),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
