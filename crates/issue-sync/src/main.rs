use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use issue_sync::{serve, AppState};
use linear_core::auth::{AuthSession, TokenType};
use linear_core::config::{SyncSettings, DEFAULT_MAX_IN_FLIGHT, DEFAULT_PAGE_SIZE};
use linear_core::graphql::{LinearGraphqlClient, DEFAULT_ENDPOINT};
use linear_core::services::sync::IssueSyncService;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Label every Linear issue over HTTP")]
struct Cli {
    /// Linear API key or OAuth access token
    #[arg(long, env = "LINEAR_API_KEY", hide_env_values = true)]
    api_key: String,
    /// How the credential is presented (api-key or bearer)
    #[arg(long, env = "LINEAR_TOKEN_TYPE", default_value = "api-key")]
    token_type: TokenType,
    /// GraphQL endpoint
    #[arg(long, env = "LINEAR_API_URL", default_value = DEFAULT_ENDPOINT)]
    api_url: String,
    /// Address to listen on
    #[arg(long, env = "ISSUE_SYNC_ADDR", default_value = "0.0.0.0:3000")]
    addr: SocketAddr,
    /// Issues requested per page
    #[arg(long, env = "ISSUE_SYNC_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// Maximum concurrent label mutations
    #[arg(long, env = "ISSUE_SYNC_MAX_IN_FLIGHT", default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,
    /// Label ids applied to every issue; when omitted each issue gets a label matching its own id
    #[arg(long = "label-id", env = "ISSUE_SYNC_LABEL_IDS", value_delimiter = ',')]
    label_ids: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let session =
        AuthSession::new(cli.api_key, cli.token_type).context("invalid Linear credential")?;
    let settings = SyncSettings::new(cli.page_size, cli.max_in_flight, cli.label_ids)
        .context("invalid sync settings")?;
    let client = LinearGraphqlClient::with_endpoint(&session, &cli.api_url)
        .context("failed to build Linear client")?;
    tracing::info!(
        endpoint = %client.endpoint(),
        page_size = settings.page_size,
        max_in_flight = settings.max_in_flight,
        "configured Linear tracker"
    );

    let sync = IssueSyncService::from_settings(Arc::new(client), &settings);
    let listener = TcpListener::bind(cli.addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.addr))?;
    serve(listener, AppState::new(sync)).await
}
