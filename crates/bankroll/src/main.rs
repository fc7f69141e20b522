//! `bankroll-server`: runs a Bank game server until Ctrl-C.
//!
//! Configuration comes from `BANKROLL_*` environment variables (see
//! [`ServerConfig::from_env`]); log filtering from `RUST_LOG`.

use bankroll::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BankrollError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        bind = %config.bind,
        rounds = config.room_defaults.total_rounds,
        roll_interval_ms = config.room_defaults.roll_interval.as_millis() as u64,
        "starting bankroll-server"
    );

    let server = BankrollServer::builder().config(config).build().await?;
    server.run().await
}
