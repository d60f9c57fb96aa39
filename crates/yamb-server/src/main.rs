mod client;
mod room;
mod state;

use anyhow::Context;
use state::ServerState;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PORT: u16 = 42933;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_env("YAMB_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!("Server Version: {}", crate::VERSION);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!("Listening on port {port}");

    let state = ServerState::default();
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(it) => it,
            Err(e) => {
                tracing::warn!("Failed to accept connection: {e}");
                continue;
            }
        };
        tracing::debug!("Accepted connection from {addr}");

        tokio::spawn(client::handle_new_connection(state.clone(), socket));
    }
}
