#![forbid(unsafe_code)]

//! `agent-dispatch`: the orchestrator binary.
//!
//! Bootstraps configuration, connects the broker and the ledger
//! database, and starts the work-request and stop-request consumers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use agent_dispatch::agent::SubprocessLauncher;
use agent_dispatch::bus::{BusConnection, Consumer, ConsumerConfig, Publisher};
use agent_dispatch::config::GlobalConfig;
use agent_dispatch::messages::{
    CANCEL_QUEUE, CANCEL_ROUTING_KEY, REQUEST_EXCHANGE, RESPONSE_EXCHANGE, SUBMIT_QUEUE,
    SUBMIT_ROUTING_KEY,
};
use agent_dispatch::orchestrator::{RequestHandler, SessionRegistry, StopHandler, TurnSettings};
use agent_dispatch::persistence::dedupe_repo::DedupeRepo;
use agent_dispatch::persistence::job_repo::JobRepo;
use agent_dispatch::persistence::lock_repo::ProjectLockRepo;
use agent_dispatch::persistence::paused_turn_repo::PausedTurnRepo;
use agent_dispatch::persistence::turn_repo::TurnRepo;
use agent_dispatch::persistence::{db, retention};
use agent_dispatch::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-dispatch", about = "Agent execution orchestrator", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-dispatch bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config_text = std::fs::read_to_string(&args.config)
        .map_err(|err| AppError::Config(format!("cannot read config: {err}")))?;
    let config = GlobalConfig::from_toml_str(&config_text)?;
    info!("configuration loaded");

    let db = Arc::new(db::connect(&config.database.path).await?);
    info!("database connected");

    let bus = BusConnection::connect(&config.amqp.url).await?;
    info!("broker connected");

    let ct = CancellationToken::new();
    let retention_handle = retention::spawn_retention_task(Arc::clone(&db), ct.clone());

    let launcher = Arc::new(SubprocessLauncher::new(config.agent.clone()));
    let registry = Arc::new(SessionRegistry::new(launcher));
    let responses = Arc::new(Publisher::new(&bus, RESPONSE_EXCHANGE).await?);

    let request_handler = Arc::new(RequestHandler::new(
        Arc::clone(&registry),
        responses,
        JobRepo::new(Arc::clone(&db)),
        TurnRepo::new(Arc::clone(&db)),
        PausedTurnRepo::new(Arc::clone(&db)),
        ProjectLockRepo::new(Arc::clone(&db)),
        DedupeRepo::new(Arc::clone(&db)),
        TurnSettings::from_config(&config),
    ));
    let stop_handler = Arc::new(StopHandler::new(Arc::clone(&registry)));

    let request_consumer = Consumer::start(
        &bus,
        ConsumerConfig {
            exchange: REQUEST_EXCHANGE.to_owned(),
            queue: SUBMIT_QUEUE.to_owned(),
            routing_key: SUBMIT_ROUTING_KEY.to_owned(),
            prefetch: config.amqp.request_prefetch,
        },
        request_handler,
        ct.clone(),
    )
    .await?;

    let stop_consumer = Consumer::start(
        &bus,
        ConsumerConfig {
            exchange: REQUEST_EXCHANGE.to_owned(),
            queue: CANCEL_QUEUE.to_owned(),
            routing_key: CANCEL_ROUTING_KEY.to_owned(),
            prefetch: config.amqp.stop_prefetch,
        },
        stop_handler,
        ct.clone(),
    )
    .await?;

    info!("orchestrator ready");

    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(request_consumer, stop_consumer, retention_handle);

    // Live sessions hold child processes; close them before the broker
    // connection so in-flight turns end with a clean disconnect.
    for session in registry.active_sessions() {
        registry.close_session(&session.id).await;
    }

    if let Err(err) = bus.close().await {
        tracing::warn!(%err, "broker close failed");
    }
    info!("agent-dispatch shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
