//! cv-mcp server.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cv_mcp::{config::Config, create_app_with_config, email, profile, state::AppState};

/// cv-mcp - MCP and REST server for CV questions and outbound email
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Profile document (JSON); the bundled sample is used when omitted
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Extra TOML config file, merged after the default locations
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(args.port, args.profile, args.config)?;
    let _log_guard = init_logging(&config)?;
    info!("Configuration loaded");

    let profile = profile::load(config.profile_path.as_deref())?;
    info!(
        "Loaded profile for {} ({} positions, {} skills)",
        profile.name.as_deref().unwrap_or("unnamed candidate"),
        profile.experience.len(),
        profile.skills.len()
    );

    let mailer = email::mailer_from_config(&config.email)?;
    let state = AppState::new(profile, mailer);

    let sweeper = config.session_idle_timeout().map(|idle| {
        info!(
            "MCP sessions expire after {}s idle (swept every {}s)",
            idle.as_secs(),
            config.sweep_interval().as_secs()
        );
        state
            .sessions()
            .spawn_idle_sweeper(idle, config.sweep_interval())
    });

    let app = create_app_with_config(state, config.cors_origins.clone());

    // Bind to 0.0.0.0 to be accessible from all interfaces (Docker, network, etc.)
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully...");
}

/// Initialize logging. `log_level` overrides `RUST_LOG`; `log_file` adds a
/// plain-text file sink next to stdout.
fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = match &config.log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: {}", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let stdout_layer = fmt::layer().with_target(false).compact();

    let Some(path) = &config.log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}
