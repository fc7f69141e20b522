//! `BankrollServer` builder, configuration, and accept loop.
//!
//! This is the entry point for running a Bank game server. It ties
//! together all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bankroll_protocol::{Codec, JsonCodec};
use bankroll_room::{RoomConfig, RoomRegistry};
use bankroll_session::SessionManager;
use bankroll_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::BankrollError;
use crate::handler::handle_connection;

/// Listener, connection, and room-default settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,

    /// A connection that sends nothing for this long is closed. Clients
    /// keep it open with `heartbeat` requests.
    pub idle_timeout: Duration,

    /// What a room gets when its host overrides nothing.
    pub room_defaults: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(30),
            room_defaults: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the process environment.
    ///
    /// | variable                            | field                         |
    /// |-------------------------------------|-------------------------------|
    /// | `BANKROLL_BIND`                     | `bind`                        |
    /// | `BANKROLL_IDLE_TIMEOUT_SECS`        | `idle_timeout`                |
    /// | `BANKROLL_DEFAULT_ROUNDS`           | `room_defaults.total_rounds`  |
    /// | `BANKROLL_DEFAULT_ROLL_INTERVAL_MS` | `room_defaults.roll_interval` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with the variables supplied by
    /// `lookup`. Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind) = lookup("BANKROLL_BIND") {
            config.bind = bind;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "BANKROLL_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = Duration::from_secs(secs.max(1));
        }
        config.room_defaults = config
            .room_defaults
            .with_overrides(
                parse_var(&lookup, "BANKROLL_DEFAULT_ROUNDS"),
                parse_var(&lookup, "BANKROLL_DEFAULT_ROLL_INTERVAL_MS"),
            )
            .validated();

        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    pub(crate) started: Instant,
}

impl<C: Codec> ServerState<C> {
    /// Milliseconds since the server started. Used for envelope
    /// timestamps and heartbeat replies.
    pub(crate) fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Bankroll server.
///
/// # Example
///
/// ```rust,no_run
/// use bankroll::prelude::*;
///
/// # async fn run() -> Result<(), BankrollError> {
/// let server = BankrollServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BankrollServerBuilder {
    config: ServerConfig,
}

impl BankrollServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once, e.g. with [`ServerConfig::from_env`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets how long a silent connection stays open.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the config new rooms start from.
    pub fn room_defaults(mut self, defaults: RoomConfig) -> Self {
        self.config.room_defaults = defaults.validated();
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<BankrollServer, BankrollError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new()),
            rooms: Mutex::new(RoomRegistry::new(self.config.room_defaults.clone())),
            codec: JsonCodec,
            config: self.config,
            started: Instant::now(),
        });

        Ok(BankrollServer { transport, state })
    }
}

impl Default for BankrollServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Bankroll server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BankrollServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl BankrollServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> BankrollServerBuilder {
        BankrollServerBuilder::new()
    }
}

impl<C: Codec> BankrollServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs until Ctrl-C, then shuts every room down.
    pub async fn run(self) -> Result<(), BankrollError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted connection gets its own handler task. On shutdown
    /// every room's timer is cancelled and the registry is cleared;
    /// handler tasks end as their sockets close.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), BankrollError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Bankroll server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        self.state.rooms.lock().await.shutdown_all().await;
        Ok(())
    }
}
