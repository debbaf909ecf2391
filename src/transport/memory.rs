//! In-process transport, for driving sessions without a socket

use super::{closed, LineReceiver, Transport, TransportError, TransportKind};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Transport that records every write it is given
pub struct MemoryTransport {
    kind: TransportKind,
    peer: String,
    sent: Mutex<Vec<Bytes>>,
    closed: watch::Sender<bool>,
}

impl MemoryTransport {
    /// Each recorded write, decoded as text
    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    /// All recorded writes concatenated
    pub fn output(&self) -> String {
        self.sent_text().concat()
    }

    pub fn write_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for MemoryTransport {
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
        self.sent.lock().push(bytes);
        Ok(())
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Receiving end fed by the `UnboundedSender` returned from [`pair`]
pub struct MemoryLineReceiver {
    lines: mpsc::UnboundedReceiver<String>,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl LineReceiver for MemoryLineReceiver {
    async fn receive_line(&mut self) -> Result<String, TransportError> {
        tokio::select! {
            biased;
            _ = closed(&mut self.closed) => Err(TransportError::Closed),
            line = self.lines.recv() => line.ok_or(TransportError::Closed),
        }
    }
}

/// Create a memory transport, its receiver, and the sender that plays the
/// client's keyboard. Dropping the sender reads as a disconnect.
pub fn pair(
    peer: impl Into<String>,
) -> (
    Arc<MemoryTransport>,
    MemoryLineReceiver,
    mpsc::UnboundedSender<String>,
) {
    let (input, lines) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(false);
    let transport = Arc::new(MemoryTransport {
        kind: TransportKind::Raw,
        peer: peer.into(),
        sent: Mutex::new(Vec::new()),
        closed: closed_tx,
    });
    let receiver = MemoryLineReceiver {
        lines,
        closed: closed_rx,
    };
    (transport, receiver, input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_wakes_pending_receive() {
        let (transport, mut receiver, _input) = pair("test");

        let pending = tokio::spawn(async move { receiver.receive_line().await });
        tokio::task::yield_now().await;
        transport.close();
        transport.close();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(transport.send(Bytes::from_static(b"late")).is_err());
        assert_eq!(transport.write_count(), 0);
    }

    #[tokio::test]
    async fn test_lines_arrive_in_order() {
        let (_transport, mut receiver, input) = pair("test");
        input.send("one".to_string()).unwrap();
        input.send("two".to_string()).unwrap();
        drop(input);

        assert_eq!(receiver.receive_line().await.unwrap(), "one");
        assert_eq!(receiver.receive_line().await.unwrap(), "two");
        assert!(receiver.receive_line().await.is_err());
    }
}
