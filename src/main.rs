mod api;
mod commands;
mod gateway;
mod rate_limit;

use anyhow::Context;
use api::ApiState;
use clap::{Parser, Subcommand};
use gateway::Gateway;
use relay_core::config::{self, Config};
use relay_core::traits::{CredentialStore, MediaSource, QuoteSource, ReplyEngine, Transport};
use relay_memory::{ActivityLog, MemoryStore};
use relay_providers::{ChatEngine, ImageClient, QuoteClient};
use relay_transport::{BridgeTransport, FileCredentialStore, ReconnectPolicy, SessionManager};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relay", version, about = "Messaging gateway with an AI reply engine")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "relay.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway and its control API.
    Start,
    /// Query a running gateway's status over the control API.
    Status {
        /// Operator PIN, when the API has auth enabled.
        #[arg(long)]
        pin: Option<String>,
    },
    /// Print the SHA-256 digest of a PIN for the `api.pin_hash` config key.
    HashPin { pin: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.relay.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Start => run(config).await,
        Commands::Status { pin } => query_status(&config, pin.as_deref()).await,
        Commands::HashPin { pin } => {
            println!("{}", api::pin_digest(&pin));
            Ok(())
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("Starting {}", config.relay.name);

    let transport: Arc<dyn Transport> = Arc::new(BridgeTransport::new(&config.transport));
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(&config.session));
    let (session, messages) = SessionManager::new(
        transport.clone(),
        credentials,
        config.transport.phone_number.clone(),
        ReconnectPolicy::from(&config.session),
    );

    let memory = MemoryStore::new(&config.memory);
    let log = ActivityLog::new(&config.memory)
        .await
        .context("failed to open activity log")?;

    let engine: Arc<dyn ReplyEngine> = Arc::new(ChatEngine::from_config(&config.provider));
    let quotes: Arc<dyn QuoteSource> = Arc::new(QuoteClient::from_config(&config.quote));
    let media: Arc<dyn MediaSource> = Arc::new(ImageClient::from_config(&config.image));

    let gateway = Gateway::new(
        &config,
        transport.clone(),
        engine,
        quotes,
        media,
        memory.clone(),
        log.clone(),
    );
    let api_state = ApiState::new(&config.api, session.clone(), transport, log.clone(), memory);

    session.start();

    tokio::select! {
        result = api::serve(api_state, &config.api.host, config.api.port) => {
            result.context("control API failed")?;
        }
        _ = gateway.run(messages) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            session.stop().await;
            log.close().await;
        }
    }
    Ok(())
}

async fn query_status(config: &Config, pin: Option<&str>) -> anyhow::Result<()> {
    let url = format!("http://{}:{}/status", config.api.host, config.api.port);
    let client = reqwest::Client::new();
    let mut request = client.get(&url);
    if let Some(pin) = pin {
        request = request.bearer_auth(pin);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("is the gateway running at {url}?"))?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.context("invalid status response")?;
    if !status.is_success() {
        anyhow::bail!("status request failed ({status}): {body}");
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
