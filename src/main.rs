use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use campus_food_share::{
    auth::{PasswordHasher, SessionManager},
    build_router,
    config::{AppConfig, LogFormat},
    images::ImageStore,
    seed,
    state::AppState,
    store::{MemoryStore, Store},
};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Parser)]
#[command(name = "campus-food-share")]
#[command(about = "Campus leftover-food sharing service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (the default).
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Load campus locations from a JSON array of `{name, lat, lng, type}`.
    SeedLocations {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Fold the journal into a fresh snapshot.
    Checkpoint {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
        data_dir: None,
    }) {
        Command::Serve {
            host,
            port,
            data_dir,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if data_dir.is_some() {
                config.data_dir = data_dir;
            }
            serve(config).await
        }
        Command::SeedLocations { file, data_dir } => {
            if data_dir.is_some() {
                config.data_dir = data_dir;
            }
            seed_locations(&config, &file).await
        }
        Command::Checkpoint { data_dir } => {
            config.data_dir = Some(data_dir);
            let store = open_store(&config)?;
            store.checkpoint().await.context("checkpoint failed")?;
            info!("checkpoint written");
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let store = open_store(&config)?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;

    let sessions = Arc::new(SessionManager::new(chrono::Duration::hours(
        config.session_ttl_hours,
    )));
    let images = Arc::new(ImageStore::new(
        config.upload_dir.clone(),
        &config.public_base_url,
        config.max_upload_bytes,
    ));
    let state = AppState::new(
        store.clone(),
        sessions.clone(),
        PasswordHasher::new(config.bcrypt_cost),
        images,
    );

    let purge = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let dropped = sessions.purge_expired().await;
            if dropped > 0 {
                info!(dropped, "expired sessions purged");
            }
        }
    });

    let app = build_router(state, &config.cors_allow_origin);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        address = %addr,
        durable = config.data_dir.is_some(),
        durability = ?config.durability,
        "campus food share started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    purge.abort();
    if config.data_dir.is_some() {
        store
            .checkpoint()
            .await
            .context("failed to checkpoint on shutdown")?;
        info!("store checkpointed on shutdown");
    }

    Ok(())
}

async fn seed_locations(config: &AppConfig, file: &Path) -> Result<()> {
    if config.data_dir.is_none() {
        warn!("no DATA_DIR configured, seeded locations will not be kept");
    }

    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let store = open_store(config)?;
    let report = seed::seed_locations(store.as_ref(), &raw).await?;

    store.checkpoint().await.context("checkpoint failed")?;
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "locations seeded"
    );
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match &config.data_dir {
        Some(dir) => Arc::new(
            MemoryStore::open(dir, config.durability, config.checkpoint_every)
                .with_context(|| format!("failed to open store in {}", dir.display()))?,
        ),
        None => {
            info!("no DATA_DIR configured, running memory-only");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("campus_food_share=debug,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
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

    info!("shutdown signal received");
}
