use std::time::Duration;

use {
    anyhow::Context,
    clap::Parser,
    tether_keeper::{InstanceLock, Keeper, KeeperHandle},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

/// Slack on top of the loop's own bounded leave (the fault delay) before the
/// process stops waiting for it.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "tether", about = "tether: keeps a bot joined to one voice channel")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TETHER_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false, env = "TETHER_JSON_LOGS")]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tether starting");

    let config = tether_config::load_from_env().context("invalid configuration")?;
    info!(
        guild_id = %config.target.guild_id,
        channel_id = %config.target.channel_id,
        "configuration loaded"
    );

    let _instance = InstanceLock::acquire(&config.instance_guard)
        .context("refusing to start a second instance for this target")?;

    let shutdown_grace = config.policy.fault_delay + SHUTDOWN_SLACK;
    let handle = KeeperHandle::new(config.target);
    let runtime = tether_discord::build_client(&config, handle.clone())
        .await
        .context("failed to build discord client")?;
    let mut client = runtime.client;
    let shard_manager = client.shard_manager.clone();

    let keeper = Keeper::new(
        handle.clone(),
        runtime.platform,
        config.policy.clone(),
        config.connect.clone(),
    );
    let keeper_task = tokio::spawn(keeper.run());
    let mut client_task = tokio::spawn(async move { client.start().await });

    let client_result = tokio::select! {
        () = shutdown_signal() => {
            info!("termination signal received");
            None
        },
        res = &mut client_task => Some(res),
    };

    handle.shutdown();
    if tokio::time::timeout(shutdown_grace, keeper_task).await.is_err() {
        warn!("maintenance loop did not stop in time");
    }
    shard_manager.shutdown_all().await;

    match client_result {
        None => {
            info!("tether stopped");
            Ok(())
        },
        Some(Ok(Ok(()))) => {
            warn!("discord client stopped unexpectedly");
            Ok(())
        },
        Some(Ok(Err(e))) => {
            error!(error = %e, "discord client failed");
            Err(e).context("discord client failed")
        },
        Some(Err(e)) => Err(e).context("discord client task panicked"),
    }
}
