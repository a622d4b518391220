#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use args::{Args, Command};
use chorus_config::Config;
use chorus_server::Server;
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.server.listen_address = Some(listen);
    }

    // Initialize telemetry
    let _telemetry_guard = chorus_telemetry::init(&config.telemetry)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, &args.config).await,
        Command::Credits => credits(&config).await,
    }
}

async fn serve(config: Config, config_path: &std::path::Path) -> anyhow::Result<()> {
    tracing::info!(
        config_path = %config_path.display(),
        bot = config.bot.is_some(),
        "starting chorus"
    );

    // Build server
    let server = Box::pin(Server::new(config)).await?;

    // Set up graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    // Run server
    server.serve(shutdown).await?;

    tracing::info!("chorus stopped");
    Ok(())
}

async fn credits(config: &Config) -> anyhow::Result<()> {
    let provider = chorus_suno::build_provider(config)?;

    match provider.credits().await {
        Ok(credits) => {
            println!("{}", chorus_bot::command::credits_text(&credits));
            if let Some(limit) = credits.monthly_limit {
                println!("ᗚ Monthly limit: {limit}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("⁉️ Failed to get credits info: {e}");
            Err(e.into())
        }
    }
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
