//! Presence server: admits authenticated peers and tracks who is alive.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tether::prelude::*;

#[derive(Parser)]
#[command(name = "tether-server")]
#[command(about = "WebSocket presence server with liveness probing")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:9999")]
    addr: String,

    /// Shared secret for verifying HS256 bearer tokens
    #[arg(long, default_value = "changeme")]
    jwt_key: String,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seconds a peer may stay silent before it is dropped
    #[arg(long, default_value_t = 60)]
    liveness_window_secs: u64,

    /// Budget for writing one probe acknowledgment, in milliseconds
    #[arg(long, default_value_t = 1000)]
    ack_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), TetherError> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = SessionConfig {
        liveness_window: Duration::from_secs(cli.liveness_window_secs),
        ack_timeout: Duration::from_millis(cli.ack_timeout_ms),
        ..SessionConfig::default()
    };
    let server = TetherServerBuilder::new()
        .bind(&cli.addr)
        .session_config(config)
        .build(SharedSecretAuth::new(cli.jwt_key.as_bytes()))
        .await?;

    let signal = ShutdownSignal::new();
    signal.listen_for_interrupt();
    let token = server.shutdown_token();
    tokio::spawn(async move {
        signal.wait().await;
        token.cancel();
    });

    let snapshot = server.run().await?;
    tracing::info!(remaining = snapshot.len(), "bye");
    Ok(())
}
