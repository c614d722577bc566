// Roster service over a real WebSocket connection on an ephemeral port.

use fantaroster_app::{app, ws_server};
use fantaroster_core::roster::{RosterLayout, RosterStore};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const SEED: &str = "\
id,player,squad,pos,partite,minuti,goal,assist,rigori,gialli,rossi
1,Lautaro Martinez,Inter,A,34,2800,24,3,2,4,0
2,Nicolò Barella,Inter,CC,33,2700,3,6,0,8,0
";

async fn start(store: RosterStore) -> String {
    let listener = ws_server::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (ws_tx, ws_rx) = mpsc::channel(16);
    tokio::spawn(ws_server::run(listener, ws_tx));
    tokio::spawn(app::run(ws_rx, app::AppState::new(store)));
    format!("ws://{addr}")
}

async fn call<S>(ws: &mut S, request: Value) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    ws.send(Message::Text(request.to_string().into())).await.unwrap();
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn list_add_delete_over_websocket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.csv");
    std::fs::write(&path, SEED).unwrap();
    let url = start(RosterStore::new(&path, RosterLayout::default())).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let reply = call(&mut ws, json!({"type": "LIST_PLAYERS"})).await;
    assert_eq!(reply["type"], "PLAYERS");
    assert_eq!(reply["total"], 2);

    let reply = call(
        &mut ws,
        json!({"type": "ADD_PLAYER", "player": {"player": "Paulo Dybala", "squad": "Roma", "goal": 11}}),
    )
    .await;
    assert_eq!(reply, json!({"type": "PLAYER_ADDED", "id": 3}));

    let reply = call(
        &mut ws,
        json!({"type": "LIST_PLAYERS", "filter": {"team": "Roma"}}),
    )
    .await;
    assert_eq!(reply["total"], 1);
    assert_eq!(reply["players"][0]["goal"], "11");

    let reply = call(&mut ws, json!({"type": "DELETE_PLAYER", "id": 1})).await;
    assert_eq!(reply, json!({"type": "PLAYER_DELETED", "removed": 1}));

    let reply = call(&mut ws, json!({"type": "SHUFFLE"})).await;
    assert_eq!(reply["type"], "ERROR");

    ws.close(None).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let ids: Vec<&str> = text
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(ids, vec!["2", "3"]);
}

#[tokio::test]
async fn two_clients_share_one_roster() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.csv");
    let url = start(RosterStore::new(&path, RosterLayout::default())).await;

    let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let reply = call(
        &mut first,
        json!({"type": "ADD_PLAYER", "player": {"player": "Mario Rossi"}}),
    )
    .await;
    assert_eq!(reply["id"], 1);
    let reply = call(
        &mut second,
        json!({"type": "ADD_PLAYER", "player": {"player": "Paolo Rossi"}}),
    )
    .await;
    assert_eq!(reply["id"], 2);

    let reply = call(&mut first, json!({"type": "LIST_PLAYERS", "filter": {"search": "rossi"}})).await;
    assert_eq!(reply["total"], 2);
}
