use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use clap::Parser;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use blockfall::room::{ConnId, PeerSender, RoomRegistry, SWEEP_INTERVAL};

/// Websocket relay for two-player rooms. Pairs clients by room code and
/// forwards their traffic; gameplay stays client-authoritative.
#[derive(Parser, Debug, Clone)]
struct Opts {
    /// Address to listen for websocket connections
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,
}

static NEXT_CONN: AtomicU64 = AtomicU64::new(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();
    let listener = TcpListener::bind(&opts.listen).await?;
    info!("relay listening on ws://{}", opts.listen);

    let registry = Arc::new(Mutex::new(RoomRegistry::new()));

    let sweeper = registry.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            sweeper.lock().await.sweep(Instant::now());
        }
    });

    loop {
        let (stream, addr) = listener.accept().await?;
        let registry = registry.clone();
        tokio::spawn(async move {
            let conn = NEXT_CONN.fetch_add(1, Ordering::Relaxed);
            debug!("conn {conn} accepted from {addr}");
            if let Err(e) = handle_conn(stream, conn, registry.clone()).await {
                debug!("conn {conn} error: {e:?}");
            }
            registry.lock().await.disconnect(conn);
            debug!("conn {conn} closed");
        });
    }
}

async fn handle_conn(
    stream: TcpStream,
    conn: ConnId,
    registry: Arc<Mutex<RoomRegistry>>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // Registry methods push outbound text here; this task owns the socket
    // sink so sends never block room bookkeeping.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                dispatch(&registry, conn, &tx, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("conn {conn} read error: {e}");
                break;
            }
        }
    }

    writer.abort();
    Ok(())
}

/// Route one inbound frame. Only the lobby verbs and `game_over` are
/// interpreted; everything else with a type tag relays to the room peer
/// untouched. Frames without a readable type tag are dropped.
async fn dispatch(
    registry: &Arc<Mutex<RoomRegistry>>,
    conn: ConnId,
    tx: &PeerSender,
    raw: &str,
) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("conn {conn}: unparseable frame dropped: {e}");
            return;
        }
    };
    let Some(kind) = value.get("type").and_then(|t| t.as_str()) else {
        warn!("conn {conn}: frame without type tag dropped");
        return;
    };

    let mut registry = registry.lock().await;
    match kind {
        "create_room" => {
            registry.create_room(conn, tx.clone(), Instant::now());
        }
        "join_room" => {
            let code = value.get("code").and_then(|c| c.as_str()).unwrap_or("");
            let _ = registry.join_room(conn, code, tx.clone());
        }
        "ready" => registry.ready(conn),
        "game_over" => {
            registry.mark_finished(conn, Instant::now());
            registry.relay(conn, raw);
        }
        _ => registry.relay(conn, raw),
    }
}
