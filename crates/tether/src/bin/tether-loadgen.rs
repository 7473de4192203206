//! Load generator: opens many probing connections, closes them on Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tether::prelude::*;

#[derive(Parser)]
#[command(name = "tether-loadgen")]
#[command(about = "Simulates many peers against a tether-server")]
struct Cli {
    /// Server address, host:port
    #[arg(long, default_value = "localhost:9999")]
    addr: String,

    /// Number of simulated peers
    #[arg(long, default_value_t = 1000)]
    num: usize,

    /// Shared secret for signing HS256 bearer tokens
    #[arg(long, default_value = "changeme")]
    jwt_key: String,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Milliseconds between probes from each peer
    #[arg(long, default_value_t = 1000)]
    probe_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), TetherError> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = LoadConfig {
        addr: cli.addr,
        peers: cli.num,
        probe_interval: Duration::from_millis(cli.probe_interval_ms),
        ..LoadConfig::default()
    };
    let issuer = Arc::new(SharedSecretAuth::new(cli.jwt_key.as_bytes()));

    let signal = ShutdownSignal::new();
    signal.listen_for_interrupt();

    let report = Coordinator::new(config, issuer).run(signal).await?;
    tracing::info!(
        interrupted = report.interrupted,
        server_closed = report.server_closed,
        failed = report.failed,
        "all peers stopped"
    );
    Ok(())
}
