//! Command implementations for the clusters daemon.
//!
//! - start: load config, open storage, build the engine, run sweep job and HTTP server
//! - stop / status: via the PID file
//! - sweep: one pass against the local database
//! - admin: stats, reset, compact

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clusters_embeddings::load_embedder;
use clusters_engine::{llm_from_settings, ClusteringEngine, EmbeddingClusteringEngine};
use clusters_scheduler::{
    create_compaction_job, create_sweep_job, forwarder_from_settings, CompactionJobConfig,
    JobRegistry, SchedulerService, Sweeper, UpdateQueue,
};
use clusters_service::{run_server_with_shutdown, AppState};
use clusters_storage::{Storage, TopicStore};
use clusters_types::Settings;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::AdminCommands;

fn pid_file_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| {
            #[cfg(unix)]
            {
                dirs.runtime_dir()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| dirs.cache_dir().to_path_buf())
            }
            #[cfg(not(unix))]
            {
                dirs.cache_dir().to_path_buf()
            }
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("topic-clusters")
        .join("daemon.pid")
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;
    info!("Wrote PID file: {:?}", pid_path);
    Ok(())
}

fn remove_pid_file() {
    let pid_path = pid_file_path();
    if pid_path.exists() {
        if let Err(e) = fs::remove_file(&pid_path) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
}

fn read_pid_file() -> Option<u32> {
    fs::read_to_string(pid_file_path())
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    // Signal 0 only checks that the process exists
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Load settings and apply CLI overrides.
fn load_settings(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    info!("Opening storage at {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let storage = Storage::open(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

/// Build the clustering engine. Model loading may download files, so it
/// runs on the blocking pool.
async fn build_engine(settings: &Settings) -> Result<Arc<dyn ClusteringEngine>> {
    let embedding_settings = settings.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || load_embedder(&embedding_settings))
        .await
        .context("Embedder loading task failed")?
        .context("Failed to load embedding model")?;
    info!(
        model = %embedder.info().name,
        dimension = embedder.info().dimension,
        "Embedding model ready"
    );

    let llm = llm_from_settings(settings).context("Failed to configure LLM client")?;
    Ok(Arc::new(EmbeddingClusteringEngine::from_config(
        settings.engine.clone(),
        embedder,
        llm,
    )))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

/// Start the daemon.
///
/// 1. Load configuration (defaults -> file -> env -> CLI)
/// 2. Open RocksDB storage and build the engine
/// 3. Register and start the sweep job
/// 4. Serve HTTP until SIGINT/SIGTERM, then stop the scheduler
pub async fn start_daemon(
    config_path: Option<&str>,
    port_override: Option<u16>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
    no_scheduler: bool,
) -> Result<()> {
    let mut settings = load_settings(config_path, db_path_override, log_level_override)?;
    if let Some(port) = port_override {
        settings.http_port = port;
    }
    if no_scheduler {
        settings.scheduler.enabled = false;
    }

    init_logging(&settings.log_level)?;

    info!("Clusters daemon starting...");
    info!("  Database path: {}", settings.db_path);
    info!("  HTTP address: {}", settings.http_addr());
    info!("  Sweep: {} ({})", settings.scheduler.sweep_cron, settings.scheduler.timezone);

    let storage = open_storage(&settings)?;
    let store = Arc::new(TopicStore::new(Arc::clone(&storage)));
    let queue = Arc::new(UpdateQueue::new());

    let mut scheduler = SchedulerService::new(settings.scheduler.clone())
        .await
        .context("Failed to create scheduler")?;

    let registry: Arc<JobRegistry> = if settings.scheduler.enabled {
        let engine = build_engine(&settings).await?;
        let forwarder =
            forwarder_from_settings(&settings.forward).context("Failed to configure forwarder")?;
        let sweeper = Arc::new(Sweeper::new(
            Arc::clone(&store),
            engine,
            Arc::clone(&queue),
            forwarder,
        ));

        create_sweep_job(&scheduler, sweeper)
            .await
            .context("Failed to register sweep job")?;
        create_compaction_job(&scheduler, Arc::clone(&storage), CompactionJobConfig::default())
            .await
            .context("Failed to register compaction job")?;

        scheduler.start().await.context("Failed to start scheduler")?;
        scheduler.registry()
    } else {
        warn!("Scheduler disabled; topics will not be processed");
        Arc::new(JobRegistry::new())
    };

    write_pid_file()?;

    let addr: SocketAddr = settings
        .http_addr()
        .parse()
        .context("Invalid HTTP address")?;
    let state = AppState::new(store, queue, registry);

    let result = run_server_with_shutdown(addr, state, shutdown_signal()).await;

    if scheduler.is_running() {
        if let Err(e) = scheduler.shutdown().await {
            warn!("Scheduler shutdown failed: {}", e);
        }
    }
    remove_pid_file();

    result.map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

/// Stop the running daemon by sending SIGTERM.
pub fn stop_daemon() -> Result<()> {
    let pid = read_pid_file().context("No PID file found - daemon may not be running")?;

    if !is_process_running(pid) {
        remove_pid_file();
        anyhow::bail!("Daemon not running (stale PID file removed)");
    }

    #[cfg(unix)]
    {
        if unsafe { libc::kill(pid as i32, libc::SIGTERM) } != 0 {
            anyhow::bail!("Failed to send SIGTERM to daemon");
        }
        println!("Sent SIGTERM to daemon (PID {})", pid);
    }

    #[cfg(not(unix))]
    {
        anyhow::bail!("Stop command not yet implemented on this platform");
    }

    Ok(())
}

/// Show daemon status.
pub fn show_status() -> Result<()> {
    match read_pid_file() {
        Some(pid) if is_process_running(pid) => {
            println!("Clusters daemon is running (PID {})", pid);
        }
        Some(pid) => {
            println!("Clusters daemon is NOT running (stale PID {})", pid);
        }
        None => {
            println!("Clusters daemon is NOT running (no PID file)");
        }
    }
    Ok(())
}

/// Run one sweep against the local database and print the report.
pub async fn run_sweep(
    config_path: Option<&str>,
    db_path: Option<&str>,
    log_level: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config_path, db_path, log_level)?;
    init_logging(&settings.log_level)?;

    let storage = open_storage(&settings)?;
    let store = Arc::new(TopicStore::new(storage));
    let queue = Arc::new(UpdateQueue::new());
    let sweeper = Sweeper::new(
        store,
        build_engine(&settings).await?,
        Arc::clone(&queue),
        forwarder_from_settings(&settings.forward).context("Failed to configure forwarder")?,
    );

    let report = sweeper
        .sweep_once(&CancellationToken::new())
        .await
        .context("Sweep failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("Update events produced: {}", queue.len());
    Ok(())
}

/// Handle admin commands against the local database.
pub fn handle_admin(
    config_path: Option<&str>,
    db_path: Option<&str>,
    command: AdminCommands,
) -> Result<()> {
    let settings = load_settings(config_path, db_path, None)?;
    let storage = open_storage(&settings)?;
    let store = TopicStore::new(Arc::clone(&storage));

    match command {
        AdminCommands::Stats => {
            let stats = store.stats().context("Failed to read stats")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        AdminCommands::Reset => {
            let count = store.reset_processed().context("Failed to reset topics")?;
            println!("Marked {} topic(s) for reprocessing", count);
        }
        AdminCommands::Compact => {
            storage.compact().context("Compaction failed")?;
            println!("Compaction complete");
        }
    }
    Ok(())
}
