//! WebSocket transport - one text message per line in each direction

use super::{
    closed, ChannelTransport, LineReceiver, Transport, TransportError, TransportKind,
    stalled, FLUSH_TIMEOUT, MAX_LINE_LEN,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

type WsStream = WebSocketStream<TcpStream>;

/// Line receiver over the read half of a WebSocket
pub struct WsLineReceiver {
    stream: SplitStream<WsStream>,
    closed: watch::Receiver<bool>,
}

async fn next_text(stream: &mut SplitStream<WsStream>) -> Result<String, TransportError> {
    while let Some(msg) = stream.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(_) => return Err(TransportError::Closed),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };
        if text.len() > MAX_LINE_LEN {
            return Err(TransportError::LineTooLong { max: MAX_LINE_LEN });
        }
        return Ok(text);
    }
    Err(TransportError::Closed)
}

#[async_trait]
impl LineReceiver for WsLineReceiver {
    async fn receive_line(&mut self) -> Result<String, TransportError> {
        tokio::select! {
            biased;
            _ = closed(&mut self.closed) => Err(TransportError::Closed),
            text = next_text(&mut self.stream) => text,
        }
    }
}

/// Perform the WebSocket handshake on an accepted stream.
///
/// Upgrades are only accepted on `path`; anything else gets a 404.
pub async fn accept(
    stream: TcpStream,
    peer: String,
    path: &str,
) -> Result<(Arc<dyn Transport>, Box<dyn LineReceiver>), TransportError> {
    let check_path = |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            let mut refusal = ErrorResponse::new(Some("not found".to_string()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, check_path).await?;

    let (sink, stream) = ws.split();
    let (transport, outbound, closed_rx) =
        ChannelTransport::new(TransportKind::WebSocket, peer.clone());

    tokio::spawn(ws_writer_task(sink, outbound, closed_rx.clone(), peer));

    let receiver = WsLineReceiver {
        stream,
        closed: closed_rx,
    };
    Ok((Arc::new(transport), Box::new(receiver)))
}

/// Task to send queued output as text messages until the transport closes
async fn ws_writer_task(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<Bytes>,
    mut closed_rx: watch::Receiver<bool>,
    peer: String,
) {
    loop {
        tokio::select! {
            biased;
            msg = outbound.recv() => match msg {
                Some(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    tokio::select! {
                        result = sink.send(Message::Text(text)) => if let Err(e) = result {
                            tracing::warn!(peer = %peer, "failed to send to web client: {}", e);
                            return;
                        },
                        _ = stalled(&mut closed_rx) => {
                            tracing::debug!(peer = %peer, "gave up sending to web client");
                            return;
                        }
                    }
                }
                None => break,
            },
            _ = closed(&mut closed_rx) => break,
        }
    }

    let flush = async {
        while let Ok(bytes) = outbound.try_recv() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    };
    if tokio::time::timeout(FLUSH_TIMEOUT, flush).await.is_err() {
        tracing::debug!(peer = %peer, "gave up flushing to web client");
    }

    tracing::debug!(peer = %peer, "websocket writer task finished");
}
