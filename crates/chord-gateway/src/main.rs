//! Gateway client demo
//!
//! Run with:
//! ```bash
//! CHORD_TOKEN=... cargo run -p chord-gateway
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`). Logs READY,
//! GUILD_CREATE and MESSAGE_CREATE, reconnecting after recoverable failures
//! until Ctrl-C.

use chord_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use chord_gateway::events::{GuildCreate, MessageCreate, Ready};
use chord_gateway::{GatewayClient, GatewayConfig};
use chord_rest::{HttpRestClient, RestClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    // Initialize tracing
    let tracing_config = config.as_ref().map_or_else(
        |_| TracingConfig::default(),
        |config| TracingConfig::for_environment(config.app.env),
    );
    if let Err(e) = try_init_tracing_with_config(&tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            Err(e.into())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Gateway client stopped");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(
        env = ?config.app.env,
        shard_index = config.gateway.shard_index,
        shard_count = config.gateway.shard_count,
        "Configuration loaded"
    );

    let rest: Arc<dyn RestClient> = Arc::new(HttpRestClient::from_settings(&config.rest)?);
    let gateway = GatewayClient::new(rest, GatewayConfig::from_app_config(&config)?);
    register_handlers(&gateway)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                let _ = stop_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "Unable to listen for Ctrl-C");
                // Keep the sender alive so the client is not cancelled.
                std::future::pending::<()>().await;
            }
        }
    });

    let reconnect_delay = Duration::from_millis(config.gateway.reconnect_delay_ms);

    loop {
        let mut stop = stop_rx.clone();
        let result = gateway
            .run(async move {
                let _ = stop.wait_for(|stop| *stop).await;
            })
            .await;

        if *stop_rx.borrow() {
            break;
        }

        match result {
            Ok(()) => info!("Gateway connection ended"),
            Err(e) if e.should_reconnect() => warn!(
                error = %e,
                delay_ms = config.gateway.reconnect_delay_ms,
                "Gateway connection lost, reconnecting"
            ),
            Err(e) => return Err(e.into()),
        }

        let mut stop = stop_rx.clone();
        tokio::select! {
            () = tokio::time::sleep(reconnect_delay) => {}
            _ = stop.wait_for(|stop| *stop) => break,
        }
    }

    info!("Gateway client shut down");
    Ok(())
}

fn register_handlers(gateway: &GatewayClient) -> anyhow::Result<()> {
    gateway.add_handler::<Ready, _, _>(|ready| async move {
        info!(
            session_id = %ready.session_id,
            user = ?ready.user.as_ref().map(chord_rest::User::tag),
            guilds = ready.guilds.len(),
            "Ready"
        );
    })?;

    gateway.add_handler::<GuildCreate, _, _>(|event| async move {
        info!(
            guild_id = %event.guild.id,
            name = %event.guild.name,
            member_count = ?event.guild.member_count,
            "Guild available"
        );
    })?;

    gateway.add_handler::<MessageCreate, _, _>(|event| async move {
        let message = &event.message;
        info!(
            channel_id = %message.channel_id,
            author = %message.author.tag(),
            content = %message.content,
            "Message"
        );
    })?;

    Ok(())
}
