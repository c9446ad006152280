mod config;
mod logging;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{info, warn};

use chat_relay::ChatRelay;
use chat_store::FileStore;
use link_shortener::ShortenerClient;
use router_core::{Collaborators, Router};
use video_fetch::VideoResolver;
use wa_gateway::{GatewayConfig, GreenApi};

use crate::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(
    name = "wa-router-bot",
    version,
    about = "Webhook-driven WhatsApp command router"
)]
struct Args {
    /// Path to the YAML config (prefix, command table, reply overrides)
    #[arg(long, env = "BOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Port for the webhook HTTP server
    #[arg(long, env = "BOT_PORT", default_value_t = 8080)]
    port: u16,

    /// Messaging gateway instance id
    #[arg(long, env = "GREEN_API_INSTANCE_ID")]
    instance_id: String,

    /// Messaging gateway API token
    #[arg(long, env = "GREEN_API_TOKEN")]
    token: String,

    /// Conversational relay endpoint
    #[arg(
        long,
        env = "CHAT_RELAY_URL",
        default_value = "https://batgpt.vercel.app/api/gpt"
    )]
    relay_url: String,

    /// Video resolver endpoint
    #[arg(
        long,
        env = "VIDEO_RESOLVER_URL",
        default_value = "https://batgpt.vercel.app/api/alldl"
    )]
    resolver_url: String,

    /// Link shortener base URL
    #[arg(long, env = "SHORTENER_URL", default_value = "https://ice.bio")]
    shortener_url: String,

    /// Link shortener API key
    #[arg(long, env = "SHORTENER_API_KEY", default_value = "")]
    shortener_key: String,

    /// JSON file for persistent state (chats, links, video-only groups)
    #[arg(long, env = "BOT_STATE_FILE", default_value = "./bot-state.json")]
    state_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let bot_config = config::load_config(&args.config);

    let gateway = Arc::new(
        GreenApi::new(GatewayConfig {
            instance_id: args.instance_id.clone(),
            token: args.token,
        })
        .context("building gateway client")?,
    );

    // Learn our own number so webhook echoes of our sends can be dropped.
    let own_number = match gateway.settings().await {
        Ok(settings) if !settings.wid.is_empty() => {
            let own: String = settings.wid.chars().filter(char::is_ascii_digit).collect();
            info!(own = %own, "Gateway instance initialized");
            Some(own)
        }
        Ok(_) => {
            warn!("Gateway settings carried no own id; self-messages will not be filtered");
            None
        }
        Err(error) => {
            warn!(%error, "Could not fetch gateway settings; self-messages will not be filtered");
            None
        }
    };

    let store = Arc::new(
        FileStore::open(&args.state_file, bot_config.admin_number.clone())
            .await
            .context("opening state store")?,
    );

    let collab = Collaborators {
        gateway: Arc::clone(&gateway) as Arc<dyn router_core::ChatGateway>,
        conversation: Arc::new(ChatRelay::new(args.relay_url).context("building relay client")?),
        video: Arc::new(
            VideoResolver::new(args.resolver_url).context("building resolver client")?,
        ),
        shortener: Arc::new(
            ShortenerClient::new(args.shortener_url, args.shortener_key)
                .context("building shortener client")?,
        ),
        store,
    };

    let router = Arc::new(Router::new(
        bot_config.router_config(),
        collab,
        bot_config.replies.clone(),
    ));

    spawn_reload_on_sighup(Arc::clone(&router), args.config.clone());

    let state = webhook::AppState {
        router,
        own_number,
        instance_label: truncate_label(&args.instance_id),
    };
    webhook::serve(args.port, state).await
}

/// Instance id shortened for the health endpoint; the full id is a secret-ish
/// routing detail nobody needs to see there.
fn truncate_label(id: &str) -> String {
    let head: String = id.chars().take(6).collect();
    if head.chars().count() < id.chars().count() {
        format!("{head}...")
    } else {
        head
    }
}

/// Reloads prefix, command table, and timeout on SIGHUP, without a restart.
#[cfg(unix)]
fn spawn_reload_on_sighup(router: Arc<Router>, config_path: PathBuf) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(hup) => hup,
            Err(error) => {
                warn!(%error, "SIGHUP handler unavailable; config reload disabled");
                return;
            }
        };
        while hup.recv().await.is_some() {
            info!(path = %config_path.display(), "SIGHUP received; reloading configuration");
            let fresh = config::load_config(&config_path);
            router.reload(fresh.router_config()).await;
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_sighup(_router: Arc<Router>, _config_path: PathBuf) {}
