//! WS fan-out — delivers BroadcastHub events to connected clients
//!
//! Protocol: client connects, sends `{"subscribe": ["live-matches",
//! "team:t1", ...]}` and from then on receives every event published on
//! those topics as one JSON text frame per event. Per-connection ordering
//! follows the hub's per-topic publish order.

use anyhow::{Context, Result};
use broadcast_hub::{BroadcastEvent, BroadcastHub};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    subscribe: Vec<String>,
}

pub async fn run_ws_fanout(
    hub: Arc<BroadcastHub>,
    bind: SocketAddr,
    connections: Arc<AtomicUsize>,
) -> Result<()> {
    let listener = TcpListener::bind(bind).await.context("ws fan-out bind")?;
    info!("ws fan-out listening on ws://{bind}");

    loop {
        let (stream, peer) = listener.accept().await.context("ws accept")?;
        let hub = Arc::clone(&hub);
        let connections = Arc::clone(&connections);
        tokio::spawn(async move {
            connections.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = handle_client(peer, stream, hub).await {
                debug!("ws client {peer} err: {e:#}");
            }
            connections.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

async fn handle_client(peer: SocketAddr, stream: TcpStream, hub: Arc<BroadcastHub>) -> Result<()> {
    let ws = accept_async(stream).await.context("WS handshake failed")?;
    info!("ws client connected: {peer}");

    let (mut sink, mut stream) = ws.split();
    // hub receivers forward into this per-connection queue
    let (out_tx, mut out_rx) = mpsc::channel::<BroadcastEvent>(64);
    // one forwarder per topic per connection; a repeated subscribe frame
    // must not double the delivery
    let mut subscribed: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            Some(event) = out_rx.recv() => {
                let json = serde_json::to_string(&event)?;
                sink.send(Message::Text(json.into())).await?;
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(txt))) => {
                    match serde_json::from_str::<SubscribeRequest>(&txt) {
                        Ok(req) => {
                            for topic in &req.subscribe {
                                if !subscribed.insert(topic.clone()) {
                                    continue;
                                }
                                let mut rx = hub.subscribe(topic);
                                let out_tx = out_tx.clone();
                                tokio::spawn(async move {
                                    while let Ok(event) = rx.recv().await {
                                        if out_tx.send(event).await.is_err() {
                                            break; // client gone
                                        }
                                    }
                                });
                            }
                            let ack = serde_json::json!({"ok": true, "subscribed": req.subscribe});
                            sink.send(Message::Text(ack.to_string().into())).await?;
                        }
                        Err(e) => {
                            warn!("ws {peer}: bad subscribe frame: {e}");
                            let ack = serde_json::json!({"ok": false, "note": "expected {\"subscribe\": [..]}"});
                            sink.send(Message::Text(ack.to_string().into())).await?;
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    sink.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("ws recv err from {peer}: {e}");
                    break;
                }
            }
        }
    }

    info!("ws client disconnected: {peer}");
    Ok(())
}
