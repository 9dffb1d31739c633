//! swg-propensity
//!
//! Command-line host for the propensity client: reports subscription states
//! and publisher events, and queries propensity scores.

mod config;

use clap::{Parser, Subcommand};
use config::ConfigLoader;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use swg_core::config::ConfigStore;
use swg_core::events::{ClientEventManager, ready_gate};
use swg_core::processors::{Propensity, PropensityServer};
use swg_sdk::client::HttpFetcher;
use swg_sdk::objects::{PropensityType, PublisherEventName, SubscriptionState, UserEvent};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Propensity client - report reader behaviour and query propensity scores
#[derive(Parser, Debug)]
#[command(name = "swg-propensity")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./swg-propensity.toml")]
    config: PathBuf,

    /// Override `propensity.enable` from the configuration file
    #[arg(long, env = "SWG_ENABLE_PROPENSITY")]
    enable_propensity: Option<bool>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query the propensity score for the configured page
    Score {
        /// Kind of score (general or paywall)
        #[arg(long = "type")]
        propensity_type: Option<PropensityType>,
    },
    /// Report the reader's subscription state
    State {
        /// unknown, subscriber, non_subscriber or past_subscriber
        state: SubscriptionState,
        /// Entitlements as a JSON object
        #[arg(long)]
        entitlements: Option<String>,
    },
    /// Report a publisher event
    Event {
        /// Event name, e.g. paywall or offer_selected
        name: PublisherEventName,
        /// Whether a human action triggered the event
        #[arg(long)]
        active: Option<bool>,
        /// Event data as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting swg-propensity v{}", env!("CARGO_PKG_VERSION"));

    let loaded = ConfigLoader::new(&args.config, args.enable_propensity)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let mut fetcher = HttpFetcher::new();
    if let Some(timeout) = loaded.timeout {
        fetcher = fetcher.with_http_client(
            reqwest::Client::builder()
                .cookie_store(true)
                .timeout(timeout)
                .build()?,
        );
    }

    let (trigger, gate) = ready_gate();
    let events = ClientEventManager::new(gate);
    let server = PropensityServer::register(
        &events,
        loaded.server,
        ConfigStore::new(loaded.client),
        Arc::new(fetcher),
        Arc::new(loaded.document),
    );
    let propensity = Propensity::new(events.clone(), Arc::clone(&server));
    trigger.resolve();

    match args.command {
        Command::Score { propensity_type } => {
            let score = propensity.get_propensity(propensity_type).await?;
            println!("{}", serde_json::to_string_pretty(&score)?);
        }
        Command::State {
            state,
            entitlements,
        } => {
            let entitlements = entitlements
                .as_deref()
                .map(serde_json::from_str::<Value>)
                .transpose()?;
            propensity.send_subscription_state(state, entitlements)?;
        }
        Command::Event { name, active, data } => {
            let data = data
                .as_deref()
                .map(serde_json::from_str::<Value>)
                .transpose()?;
            let data = match data {
                Some(Value::Object(map)) => Some(map),
                Some(_) => anyhow::bail!("--data must be a JSON object"),
                None => None,
            };
            propensity.send_event(UserEvent { name, active, data });
        }
    }

    events.last_dispatch().await;
    server.flush().await;
    tracing::info!("Done");
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
