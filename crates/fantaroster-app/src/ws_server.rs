// WebSocket server for roster service clients.
//
// Every connection gets its own task. Text frames are forwarded to the app
// loop together with a oneshot reply channel, and the reply is written back
// on the same connection before the next frame is read.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Events emitted by the WebSocket server to the application layer.
#[derive(Debug)]
pub enum WsEvent {
    /// A client completed the WebSocket handshake.
    Connected { addr: String },
    /// A client went away.
    Disconnected { addr: String },
    /// A text frame (raw JSON) and the channel its response goes back on.
    Request {
        addr: String,
        body: String,
        reply: oneshot::Sender<String>,
    },
}

/// Bind the listener on `host:port`.
pub async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind((host, port)).await?;
    info!("WebSocket server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, forwarding events through `tx`.
///
/// Returns once the app side has dropped its receiver.
pub async fn run(listener: TcpListener, tx: mpsc::Sender<WsEvent>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        if tx.is_closed() {
            break;
        }
        let addr = addr.to_string();
        debug!("Accepted TCP connection from {addr}");

        let tx = tx.clone();
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr}: {e}");
                    return;
                }
            };

            if tx
                .send(WsEvent::Connected { addr: addr.clone() })
                .await
                .is_err()
            {
                return;
            }

            let (write, read) = ws_stream.split();
            if process_message_stream(read, write, &tx, &addr).await.is_err() {
                return;
            }

            let _ = tx.send(WsEvent::Disconnected { addr }).await;
        });
    }

    Ok(())
}

/// Serve one connection: forward each text frame as a [`WsEvent::Request`]
/// and write the reply back through `sink`.
///
/// Generic over the stream and sink so it can be driven by in-memory
/// streams in tests. Returns `Err(())` when the app side has gone away.
pub async fn process_message_stream<St, Si>(
    mut stream: St,
    mut sink: Si,
    tx: &mpsc::Sender<WsEvent>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    Si: Sink<Message> + Unpin,
    Si::Error: std::fmt::Display,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                let event = WsEvent::Request {
                    addr: addr.to_string(),
                    body: text.to_string(),
                    reply: reply_tx,
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
                let Ok(reply) = reply_rx.await else {
                    return Err(());
                };
                if let Err(e) = sink.send(Message::Text(reply.into())).await {
                    warn!("Failed to write reply to {addr}: {e}");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Binary, Ping, Pong and raw frames carry no requests.
            }
        }
    }
    Ok(())
}
