//! Realtime insert subscription over a websocket.
//!
//! [`subscribe`] opens one socket, joins the missions channel, and spawns a
//! task that forwards insert events into a bounded channel until the
//! returned [`Subscription`] is released.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::backend::BackendClient;
use crate::error::{Error, Result};
use crate::mission::Mission;
use crate::store::protocol::{self, FrameEncoder, Inbound};
use crate::store::Subscription;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open an insert subscription on the backend's realtime socket.
///
/// # Errors
///
/// Returns [`Error::Connectivity`] if the socket cannot be opened or the
/// join frame cannot be sent.
pub async fn subscribe(client: &BackendClient) -> Result<Subscription> {
    let deadline = client.request_timeout();
    let (socket, encoder) = tokio::time::timeout(deadline, open_channel(client))
        .await
        .map_err(|_| {
            Error::connectivity(
                "subscribe",
                format!("realtime socket did not open within {deadline:?}"),
            )
        })??;
    info!(topic = %encoder.topic(), "joined realtime channel");

    let (tx, rx) = mpsc::channel(client.event_buffer());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat = client.heartbeat_interval();

    let task = tokio::spawn(async move {
        run_channel(socket, encoder, heartbeat, shutdown_rx, tx).await;
    });

    Ok(Subscription::new(rx, shutdown_tx, task))
}

/// Connect the socket and send the join frame.
async fn open_channel(client: &BackendClient) -> Result<(Socket, FrameEncoder)> {
    let url = client.realtime_url()?;
    let (mut socket, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| Error::connectivity("subscribe", e.to_string()))?;

    let mut encoder = FrameEncoder::new(client.channel());
    let join = encoder.join(client.schema(), client.table(), client.api_key());
    socket
        .send(Message::Text(join.encode()?))
        .await
        .map_err(|e| Error::connectivity("subscribe", e.to_string()))?;
    Ok((socket, encoder))
}

async fn run_channel(
    socket: Socket,
    mut encoder: FrameEncoder,
    heartbeat_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    tx: mpsc::Sender<Mission>,
) {
    let (mut sink, mut stream) = socket.split();
    let mut ticker = tokio::time::interval(heartbeat_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let beat = match encoder.heartbeat().encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to encode heartbeat");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(beat)).await {
                    warn!(error = %e, "heartbeat failed, closing subscription");
                    break;
                }
                trace!("heartbeat sent");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    if let Ok(leave) = encoder.leave().encode() {
                        let _ = sink.send(Message::Text(leave)).await;
                    }
                    let _ = sink.send(Message::Close(None)).await;
                    debug!(topic = %encoder.topic(), "left realtime channel");
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_text(&text, &tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(close))) => {
                        info!(?close, "realtime socket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "realtime socket error");
                        break;
                    }
                    None => {
                        info!("realtime socket ended");
                        break;
                    }
                }
            }
        }
    }
}

/// Act on one text frame. Returns `false` when the channel should stop.
async fn handle_text(text: &str, tx: &mpsc::Sender<Mission>) -> bool {
    match protocol::decode(text) {
        Ok(Inbound::Change(change)) => match change.into_insert() {
            Ok(Some(mission)) => {
                debug!(id = %mission.id, "insert event received");
                if tx.send(mission).await.is_err() {
                    debug!("subscriber went away");
                    return false;
                }
            }
            Ok(None) => trace!("ignoring non-insert change"),
            Err(e) => warn!(error = %e, "skipping malformed insert event"),
        },
        Ok(Inbound::Reply { ok: true, .. }) => trace!("reply ok"),
        Ok(Inbound::Reply {
            ok: false,
            response,
            ..
        }) => {
            warn!(%response, "realtime server rejected request");
            return false;
        }
        Ok(Inbound::ChannelError(payload)) => {
            warn!(%payload, "realtime channel error");
            return false;
        }
        Ok(Inbound::ChannelClosed) => {
            info!("realtime channel closed by server");
            return false;
        }
        Ok(Inbound::Other(event)) => trace!(%event, "ignoring realtime event"),
        Err(e) => warn!(error = %e, "skipping malformed realtime frame"),
    }
    true
}
