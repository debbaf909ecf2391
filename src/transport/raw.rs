//! Raw TCP transport - newline-delimited UTF-8 text

use super::{
    closed, ChannelTransport, InputLines, LineReceiver, Transport, TransportError, TransportKind,
    stalled, FLUSH_TIMEOUT,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

/// Line receiver over the read half of a TCP stream
pub struct RawLineReceiver {
    lines: InputLines<OwnedReadHalf>,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl LineReceiver for RawLineReceiver {
    async fn receive_line(&mut self) -> Result<String, TransportError> {
        tokio::select! {
            biased;
            _ = closed(&mut self.closed) => Err(TransportError::Closed),
            line = self.lines.next_line() => line,
        }
    }
}

/// Wrap an accepted TCP stream and spawn its writer task
pub fn accept(stream: TcpStream, peer: String) -> (Arc<dyn Transport>, Box<dyn LineReceiver>) {
    let (reader, writer) = stream.into_split();
    let (transport, outbound, closed_rx) = ChannelTransport::new(TransportKind::Raw, peer.clone());

    tokio::spawn(raw_writer_task(writer, outbound, closed_rx.clone(), peer));

    let receiver = RawLineReceiver {
        lines: InputLines::new(reader),
        closed: closed_rx,
    };
    (Arc::new(transport), Box::new(receiver))
}

/// Task to write queued output to the socket until the transport closes
async fn raw_writer_task(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
    mut closed_rx: watch::Receiver<bool>,
    peer: String,
) {
    loop {
        tokio::select! {
            biased;
            msg = outbound.recv() => match msg {
                Some(bytes) => tokio::select! {
                    result = writer.write_all(&bytes) => if let Err(e) = result {
                        tracing::warn!(peer = %peer, "failed to write to client: {}", e);
                        return;
                    },
                    _ = stalled(&mut closed_rx) => {
                        tracing::debug!(peer = %peer, "gave up writing to client");
                        return;
                    }
                },
                None => break,
            },
            _ = closed(&mut closed_rx) => break,
        }
    }

    // Flush whatever was queued before the close, e.g. a farewell line
    let flush = async {
        while let Ok(bytes) = outbound.try_recv() {
            if writer.write_all(&bytes).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    };
    if tokio::time::timeout(FLUSH_TIMEOUT, flush).await.is_err() {
        tracing::debug!(peer = %peer, "gave up flushing to client");
    }

    tracing::debug!(peer = %peer, "raw writer task finished");
}
