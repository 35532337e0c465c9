//! WebSocket transport: accepts connections, requires a login frame before
//! anything else, then pumps JSON intents into the dispatcher queue and
//! outbound frames back to the socket. One task per direction per
//! connection; neither ever touches the world directly.

use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use shared::{ClientIntent, LoginFrame};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::dispatch::{Intent, IntentSender};
use crate::registry::Outbound;

/// Accept loop. Runs until the listener fails fatally.
pub async fn serve(listener: TcpListener, queue: IntentSender) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("connection from {addr}");
                tokio::spawn(handle_connection(stream, queue.clone()));
            }
            Err(e) => error!("accept failed: {e}"),
        }
    }
}

async fn handle_connection(stream: TcpStream, queue: IntentSender) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("websocket handshake failed: {e}");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    // Identity first. A connection that cannot present one is cut off before
    // it reaches the queue at all.
    let username = match source.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<LoginFrame>(&text) {
            Ok(frame) => frame.username,
            Err(e) => {
                warn!("connection rejected, bad login frame: {e}");
                return;
            }
        },
        _ => {
            warn!("connection rejected, no login frame");
            return;
        }
    };

    let (sender, mut outbound) = mpsc::unbounded_channel::<Outbound>();
    if queue
        .send(Intent::Connect {
            username: username.clone(),
            sender,
        })
        .is_err()
    {
        return;
    }

    // Writer: drains the per-connection queue onto the socket. Ends when the
    // dispatcher drops the sender (rejection, replacement, disconnect).
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let json = match &frame {
                Outbound::State(state) => serde_json::to_string(state),
                Outbound::Chat(chat) => serde_json::to_string(chat),
            };
            match json {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("failed to serialize outbound frame: {e}"),
            }
        }
    });

    // Reader: every well-formed intent is enqueued; malformed ones are
    // dropped and the connection lives on.
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientIntent>(&text) {
                Ok(intent) => {
                    if queue
                        .send(Intent::Client {
                            username: username.clone(),
                            intent,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => warn!("discarding malformed intent from {username}: {e}"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("socket error for {username}: {e}");
                break;
            }
        }
    }

    let _ = queue.send(Intent::Disconnect {
        username: username.clone(),
    });
    writer.abort();
    info!("{username} connection closed");
}
