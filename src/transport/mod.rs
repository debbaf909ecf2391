//! Transports - how bytes reach a client and how its lines come back
//!
//! A connection is split into two capabilities:
//! - [`Transport`], shared by the session and anyone writing to it
//! - [`LineReceiver`], owned by the connection's single read loop
//!
//! Closing the [`Transport`] wakes a pending [`LineReceiver::receive_line`]
//! with [`TransportError::Closed`]; that is how a session is torn down from
//! outside its own task.

mod line;
pub mod memory;
pub mod raw;
pub mod websocket;

pub use line::InputLines;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Longest inbound line accepted before the connection is dropped
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Writes a connection may have queued before it is dropped as too slow
pub const OUTBOUND_QUEUE_LEN: usize = 256;

/// How long a writer task keeps flushing after its transport closes
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Which listener a connection came in on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Raw,
    WebSocket,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Raw => write!(f, "raw"),
            TransportKind::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Transport-level failures. All of them end the session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed")]
    Closed,

    #[error("line too long (max: {max} bytes)")]
    LineTooLong { max: usize },

    #[error("output queue full ({queued} writes pending)")]
    Backlogged { queued: usize },
}

/// Outbound capability of a connection
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Remote address as reported when the connection was accepted
    fn peer(&self) -> &str;

    /// Queue one outbound write. Each call is delivered as a unit.
    ///
    /// Never waits. A peer that stops reading is closed once its queue
    /// fills up.
    fn send(&self, bytes: Bytes) -> Result<(), TransportError>;

    /// Close the connection. Only the first call has any effect.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Inbound capability of a connection
#[async_trait]
pub trait LineReceiver: Send {
    /// Wait for the next logical input line, without its terminator
    async fn receive_line(&mut self) -> Result<String, TransportError>;
}

/// [`Transport`] backed by a writer task.
///
/// Writes are queued to the task, so callers never block on a slow peer.
/// Both raw and WebSocket connections use this; only the writer task and
/// the receiver differ per kind.
pub struct ChannelTransport {
    kind: TransportKind,
    peer: String,
    sender: mpsc::Sender<Bytes>,
    closed: watch::Sender<bool>,
}

impl ChannelTransport {
    /// Create the transport together with the ends its writer task and
    /// receiver need.
    pub(crate) fn new(
        kind: TransportKind,
        peer: String,
    ) -> (Self, mpsc::Receiver<Bytes>, watch::Receiver<bool>) {
        let (sender, outbound) = mpsc::channel(OUTBOUND_QUEUE_LEN);
        let (closed, closed_rx) = watch::channel(false);
        (
            Self {
                kind,
                peer,
                sender,
                closed,
            },
            outbound,
            closed_rx,
        )
    }
}

impl Transport for ChannelTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn peer(&self) -> &str {
        &self.peer
    }

    fn send(&self, bytes: Bytes) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        match self.sender.try_send(bytes) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(peer = %self.peer, kind = %self.kind, "output queue full, dropping client");
                self.close();
                Err(TransportError::Backlogged {
                    queued: OUTBOUND_QUEUE_LEN,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        if !self.closed.send_replace(true) {
            tracing::debug!(peer = %self.peer, kind = %self.kind, "closing transport");
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Resolves once the transport has been closed (or its owner dropped)
pub(crate) async fn closed(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|closed| *closed).await;
}

/// Resolves [`FLUSH_TIMEOUT`] after the transport has been closed.
///
/// Writer tasks race their socket writes against this, so a peer that
/// stopped reading cannot hold a writer task forever.
pub(crate) async fn stalled(signal: &mut watch::Receiver<bool>) {
    closed(signal).await;
    tokio::time::sleep(FLUSH_TIMEOUT).await;
}
