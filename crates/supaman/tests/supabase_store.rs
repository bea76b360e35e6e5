//! `SupabaseStore` against local stand-ins for the REST and realtime APIs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

use supaman::feed::{Draft, FeedView, RetryPolicy, UiInput};
use supaman::{
    BackendClient, Config, FeedController, FeedOptions, FeedState, MissionId, MissionStore,
    NewMission, SupabaseStore,
};

const WAIT: Duration = Duration::from_secs(5);

fn config_for(addr: SocketAddr) -> Config {
    let mut config = Config::default();
    config.backend.url = Some(format!("http://{addr}"));
    config.backend.api_key = Some("anon-key".to_string());
    config.backend.request_timeout_secs = 2;
    config.realtime.heartbeat_interval_secs = 1;
    config
}

fn store_for(addr: SocketAddr) -> SupabaseStore {
    SupabaseStore::new(Arc::new(BackendClient::new(&config_for(addr)).unwrap()))
}

// === REST ===

#[derive(Default)]
struct Rest {
    rows: Value,
    fail_reads: bool,
    reject_writes: bool,
    reads: Mutex<Vec<(HeaderMap, HashMap<String, String>)>>,
    writes: Mutex<Vec<(HeaderMap, Value)>>,
}

async fn list_missions(
    State(rest): State<Arc<Rest>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    rest.reads.lock().unwrap().push((headers, query));
    if rest.fail_reads {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(rest.rows.clone()))
}

async fn insert_mission(
    State(rest): State<Arc<Rest>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    rest.writes.lock().unwrap().push((headers, body));
    if rest.reject_writes {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": "23514", "message": "title is required" })),
        ));
    }
    Ok(StatusCode::CREATED)
}

async fn serve_rest(rest: Rest) -> (SocketAddr, Arc<Rest>) {
    let rest = Arc::new(rest);
    let app = Router::new()
        .route("/rest/v1/missions", get(list_missions).post(insert_mission))
        .with_state(Arc::clone(&rest));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, rest)
}

#[tokio::test]
async fn fetch_all_reads_ordered_missions_with_auth() {
    let (addr, rest) = serve_rest(Rest {
        rows: json!([
            { "id": 2, "title": "Stop villain", "description": null, "status": "active",
              "created_at": "2024-05-01T12:30:00+00:00" },
            { "id": 1, "title": "Rescue cat", "description": "Tree", "status": "pending",
              "created_at": "2024-05-01T12:00:00+00:00" }
        ]),
        ..Rest::default()
    })
    .await;

    let missions = store_for(addr).fetch_all().await.unwrap();
    assert_eq!(missions.len(), 2);
    assert_eq!(missions[0].id, MissionId::from(2));
    assert_eq!(missions[0].description, "");
    assert_eq!(missions[1].title, "Rescue cat");

    let reads = rest.reads.lock().unwrap();
    let (headers, query) = &reads[0];
    assert_eq!(headers["apikey"], "anon-key");
    assert_eq!(headers["authorization"], "Bearer anon-key");
    assert_eq!(headers["accept-profile"], "public");
    assert_eq!(query["select"], "*");
    assert_eq!(query["order"], "created_at.desc");
}

#[tokio::test]
async fn fetch_all_maps_server_error_to_connectivity() {
    let (addr, _rest) = serve_rest(Rest {
        fail_reads: true,
        ..Rest::default()
    })
    .await;

    let err = store_for(addr).fetch_all().await.unwrap_err();
    assert!(err.is_connectivity());
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn fetch_all_unreachable_is_connectivity() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(store_for(addr).fetch_all().await.unwrap_err().is_connectivity());
}

#[tokio::test]
async fn insert_posts_single_pending_row() {
    let (addr, rest) = serve_rest(Rest::default()).await;

    store_for(addr)
        .insert(NewMission::pending("Rescue cat", "Tree"))
        .await
        .unwrap();

    let writes = rest.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    let (headers, body) = &writes[0];
    assert_eq!(headers["prefer"], "return=minimal");
    assert_eq!(headers["content-profile"], "public");
    assert_eq!(
        body,
        &json!([{ "title": "Rescue cat", "description": "Tree", "status": "pending" }])
    );
}

#[tokio::test]
async fn rejected_insert_is_write_error_with_backend_message() {
    let (addr, _rest) = serve_rest(Rest {
        reject_writes: true,
        ..Rest::default()
    })
    .await;

    let err = store_for(addr)
        .insert(NewMission::pending("x", ""))
        .await
        .unwrap_err();
    assert!(err.is_write());
    assert!(err.to_string().contains("title is required"));
}

// === Realtime ===

struct Realtime {
    /// Frames the client sent, decoded.
    received: mpsc::UnboundedReceiver<Value>,
    /// Text frames to push to the client.
    push: mpsc::UnboundedSender<String>,
    /// Request URI of the websocket handshake.
    uri: oneshot::Receiver<String>,
}

async fn serve_realtime() -> (SocketAddr, Realtime) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (received_tx, received) = mpsc::unbounded_channel();
    let (push, mut push_rx) = mpsc::unbounded_channel::<String>();
    let (uri_tx, uri) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |req: &Request, response: Response| {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(response)
        };
        let socket = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                outgoing = push_rx.recv() => match outgoing {
                    Some(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // Dropping the sender hangs up on the client.
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = received_tx.send(serde_json::from_str(&text).unwrap());
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    (
        addr,
        Realtime {
            received,
            push,
            uri,
        },
    )
}

impl Realtime {
    async fn next_event(&mut self, event: &str) -> Value {
        tokio::time::timeout(WAIT, async {
            loop {
                let frame = self.received.recv().await.expect("client went away");
                if frame["event"] == event {
                    return frame;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {event} frame"))
    }

    fn push(&self, frame: &Value) {
        self.push.send(frame.to_string()).unwrap();
    }
}

fn change(kind: &str, id: i64, title: &str) -> Value {
    json!({
        "topic": "realtime:realtime-missions",
        "event": "postgres_changes",
        "payload": {
            "ids": [1],
            "data": {
                "schema": "public",
                "table": "missions",
                "commit_timestamp": "2024-05-01T12:30:00Z",
                "type": kind,
                "record": {
                    "id": id,
                    "title": title,
                    "description": "",
                    "status": "pending",
                    "created_at": "2024-05-01T12:30:00Z"
                }
            }
        },
        "ref": null
    })
}

fn join_reply(status: &str) -> Value {
    json!({
        "topic": "realtime:realtime-missions",
        "event": "phx_reply",
        "payload": { "status": status, "response": {} },
        "ref": "1"
    })
}

#[tokio::test]
async fn subscription_joins_forwards_inserts_and_leaves_on_release() {
    let (addr, mut server) = serve_realtime().await;
    let mut subscription = store_for(addr).subscribe_inserts().await.unwrap();

    let uri = tokio::time::timeout(WAIT, &mut server.uri).await.unwrap().unwrap();
    assert!(uri.starts_with("/realtime/v1/websocket?"));
    assert!(uri.contains("apikey=anon-key"));
    assert!(uri.contains("vsn=1.0.0"));

    let join = server.next_event("phx_join").await;
    assert_eq!(join["topic"], "realtime:realtime-missions");
    assert_eq!(join["ref"], "1");
    assert_eq!(join["payload"]["access_token"], "anon-key");
    assert_eq!(
        join["payload"]["config"]["postgres_changes"][0],
        json!({ "event": "*", "schema": "public", "table": "missions" })
    );

    server.push(&join_reply("ok"));
    server.push(&change("UPDATE", 1, "ignored"));
    server.push(&change("INSERT", 7, "Stop villain"));

    let mission = tokio::time::timeout(WAIT, subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mission.id, MissionId::from(7));
    assert_eq!(mission.title, "Stop villain");

    subscription.release().await;
    let leave = server.next_event("phx_leave").await;
    assert_eq!(leave["topic"], "realtime:realtime-missions");
}

#[tokio::test]
async fn subscription_sends_heartbeats() {
    let (addr, mut server) = serve_realtime().await;
    let subscription = store_for(addr).subscribe_inserts().await.unwrap();

    let beat = server.next_event("heartbeat").await;
    assert_eq!(beat["topic"], "phoenix");
    subscription.release().await;
}

#[tokio::test]
async fn subscription_ends_when_join_is_rejected() {
    let (addr, mut server) = serve_realtime().await;
    let mut subscription = store_for(addr).subscribe_inserts().await.unwrap();
    server.next_event("phx_join").await;

    server.push(&join_reply("error"));
    let ended = tokio::time::timeout(WAIT, subscription.recv()).await.unwrap();
    assert!(ended.is_none());
    subscription.release().await;
}

#[tokio::test]
async fn subscription_ends_when_server_hangs_up() {
    let (addr, mut server) = serve_realtime().await;
    let mut subscription = store_for(addr).subscribe_inserts().await.unwrap();
    server.next_event("phx_join").await;

    let Realtime { push, .. } = server;
    drop(push);
    let ended = tokio::time::timeout(WAIT, subscription.recv()).await.unwrap();
    assert!(ended.is_none());
}

#[tokio::test]
async fn subscribe_to_unreachable_backend_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = store_for(addr).subscribe_inserts().await.unwrap_err();
    assert!(err.is_connectivity());
}

// === Stalled backend ===

/// Accepts connections and never answers on them.
async fn serve_stalled() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            if let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        }
    });
    addr
}

struct NullView;

impl FeedView for NullView {
    fn render(&mut self, _state: &FeedState, _draft: &Draft) {}
}

#[tokio::test]
async fn subscribe_times_out_when_handshake_stalls() {
    let addr = serve_stalled().await;
    let mut config = config_for(addr);
    config.backend.request_timeout_secs = 1;
    let store = SupabaseStore::new(Arc::new(BackendClient::new(&config).unwrap()));

    let err = tokio::time::timeout(WAIT, store.subscribe_inserts())
        .await
        .expect("subscribe did not give up")
        .unwrap_err();
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn dashboard_unmounts_while_backend_stalls() {
    let addr = serve_stalled().await;
    let mut config = config_for(addr);
    config.backend.request_timeout_secs = 60;
    let store = SupabaseStore::new(Arc::new(BackendClient::new(&config).unwrap()));
    let feed = FeedController::new(
        Arc::new(store),
        FeedOptions {
            retry: RetryPolicy::once(),
            ..FeedOptions::default()
        },
    );

    let (inputs, inputs_rx) = mpsc::channel(1);
    let done = tokio::spawn(async move { feed.run(inputs_rx, &mut NullView).await });
    inputs.send(UiInput::Unmount).await.unwrap();

    let state = tokio::time::timeout(Duration::from_secs(2), done)
        .await
        .expect("unmount was not served while connecting")
        .unwrap();
    assert!(state.missions.is_empty());
}
