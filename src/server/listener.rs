//! TCP listeners and the accept loop

use super::connection::handle_connection;
use super::reaper::idle_reaper;
use super::ServerState;
use crate::transport::{raw, websocket};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Written to everyone online when the server stops
pub const SHUTDOWN_NOTICE: &str = "\n*** Server shutting down ***\n";

/// Both listeners, bound and ready to accept
pub struct ServerListener {
    state: Arc<ServerState>,
    main: TcpListener,
    web: TcpListener,
}

impl ServerListener {
    /// Bind the raw and WebSocket ports named in the config
    pub async fn bind(state: Arc<ServerState>) -> Result<Self> {
        let main_addr = state.config.main_addr();
        let main = TcpListener::bind(&main_addr)
            .await
            .with_context(|| format!("unable to listen on {}", main_addr))?;

        let web_addr = state.config.web_addr();
        let web = TcpListener::bind(&web_addr)
            .await
            .with_context(|| format!("unable to listen on {}", web_addr))?;

        Ok(Self { state, main, web })
    }

    /// Actual `(raw, websocket)` addresses, useful when binding port 0
    pub fn local_addrs(&self) -> Result<(SocketAddr, SocketAddr)> {
        Ok((self.main.local_addr()?, self.web.local_addr()?))
    }

    /// Accept connections until a shutdown signal arrives
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let (main_addr, web_addr) = self.local_addrs()?;
        tracing::info!("Talker listening on {} (raw) and {} (websocket)", main_addr, web_addr);

        let reaper = self.state.config.user_idle_timeout().map(|limit| {
            tracing::info!("Idle users are disconnected after {:?}", limit);
            tokio::spawn(idle_reaper(Arc::clone(&self.state), limit))
        });

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                accept_result = self.main.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.spawn_raw(stream, addr),
                        Err(e) => tracing::error!("Failed to accept connection: {}", e),
                    }
                }

                accept_result = self.web.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.spawn_websocket(stream, addr),
                        Err(e) => tracing::error!("Failed to accept websocket connection: {}", e),
                    }
                }
            }
        }

        if let Some(reaper) = reaper {
            reaper.abort();
        }
        self.state.disconnect_all(SHUTDOWN_NOTICE);
        Ok(())
    }

    fn spawn_raw(&self, stream: TcpStream, addr: SocketAddr) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let (transport, lines) = raw::accept(stream, addr.to_string());
            handle_connection(state, transport, lines).await;
        });
    }

    fn spawn_websocket(&self, stream: TcpStream, addr: SocketAddr) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let path = state.config.web_path.clone();
            match websocket::accept(stream, addr.to_string(), &path).await {
                Ok((transport, lines)) => handle_connection(state, transport, lines).await,
                Err(e) => tracing::warn!(peer = %addr, "websocket handshake failed: {}", e),
            }
        });
    }
}
