use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use dotenvy::dotenv;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::Tracer, Resource};
use serenity::{client::Client, prelude::GatewayIntents};
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vcnotifybot::{serve_health, BotStatus, Handler, NotificationChannels};

fn init_tracer(otlp_endpoint: String) -> anyhow::Result<Tracer> {
    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(otlp_endpoint);
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config().with_resource(Resource::new(vec![KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                "vcnotifybot",
            )])),
        )
        .install_simple()
        .context("Failed to install opentelemetry pipeline")
}

fn init_tracing_subscriber(otlp_endpoint: Option<String>) -> anyhow::Result<()> {
    let otel = otlp_endpoint
        .map(init_tracer)
        .transpose()?
        .map(OpenTelemetryLayer::new);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(otel)
        .init();
    Ok(())
}

#[derive(Parser)]
#[clap(version, about)]
struct Opt {
    #[clap(long, env = "DISCORD_BOT_TOKEN")]
    discord_token: String,

    /// Port of the health check server.
    #[clap(long, env, default_value_t = 3000)]
    port: u16,

    #[clap(long, env, value_parser, default_value = "config.json")]
    config_file: PathBuf,

    /// Keep notification channels in memory only.
    #[clap(long, env)]
    in_memory: bool,

    #[clap(long, env)]
    otlp_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let opt = Opt::parse();

    init_tracing_subscriber(opt.otlp_endpoint)?;

    let channels = if opt.in_memory {
        NotificationChannels::in_memory()
    } else {
        NotificationChannels::load(&opt.config_file)
    };
    let status = Arc::new(BotStatus::new());

    tokio::spawn({
        let status = Arc::clone(&status);
        async move {
            if let Err(e) = serve_health(opt.port, status).await {
                warn!("Health check server failed: {e:?}");
            }
        }
    });

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&opt.discord_token, intents)
        .event_handler(Handler)
        .await
        .context("Error while creating client")?;

    {
        let mut data = client.data.write().await;
        data.insert::<NotificationChannels>(Arc::new(channels));
        data.insert::<BotStatus>(status);
    }

    let shard_manager = client.shard_manager.clone();

    #[allow(clippy::redundant_pub_crate)]
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
        }
        info!("Shutting down");
        shard_manager.shutdown_all().await;
    });

    client.start().await.context("Client ended")?;

    Ok(())
}
