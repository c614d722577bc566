// Roster service orchestration.
//
// The event loop owns the roster store and answers requests forwarded by the
// WebSocket server one at a time, so every mutation of the roster file is
// serialized through this task.

use std::collections::HashSet;

use fantaroster_core::roster::RosterStore;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{player_record, ClientRequest, ServerResponse};
use crate::ws_server::WsEvent;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

pub struct AppState {
    pub store: RosterStore,
    /// Addresses of the clients currently connected.
    pub clients: HashSet<String>,
    pub requests_served: u64,
}

impl AppState {
    pub fn new(store: RosterStore) -> Self {
        Self {
            store,
            clients: HashSet::new(),
            requests_served: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the application event loop until the WebSocket channel closes.
///
/// Store access is blocking file I/O, so each request runs on the blocking
/// pool; the loop awaits it before taking the next event.
pub async fn run(mut ws_rx: mpsc::Receiver<WsEvent>, mut state: AppState) -> anyhow::Result<()> {
    info!(
        "Application event loop started (roster at {})",
        state.store.path().display()
    );

    while let Some(event) = ws_rx.recv().await {
        handle_event(&mut state, event).await;
    }

    info!(
        "WebSocket channel closed after {} request(s), shutting down",
        state.requests_served
    );
    Ok(())
}

/// Apply one server event to the state, answering requests through their
/// reply channel.
pub async fn handle_event(state: &mut AppState, event: WsEvent) {
    match event {
        WsEvent::Connected { addr } => {
            state.clients.insert(addr.clone());
            info!(
                "Client connected from {addr} ({} connected)",
                state.clients.len()
            );
        }
        WsEvent::Disconnected { addr } => {
            state.clients.remove(&addr);
            info!(
                "Client {addr} disconnected ({} connected)",
                state.clients.len()
            );
        }
        WsEvent::Request { addr, body, reply } => {
            debug!("Request from {addr}: {body}");
            let store = state.store.clone();
            let response =
                match tokio::task::spawn_blocking(move || handle_request(&store, &body)).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Request handler for {addr} failed: {e}");
                        ServerResponse::error("internal error")
                    }
                };
            state.requests_served += 1;
            if reply.send(response.to_json()).is_err() {
                debug!("Client {addr} went away before the reply was sent");
            }
        }
    }
}

/// Decode one JSON request and apply it to the store.
pub fn handle_request(store: &RosterStore, json_str: &str) -> ServerResponse {
    let request: ClientRequest = match serde_json::from_str(json_str) {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to parse client request: {e}");
            return ServerResponse::error(format!("invalid request: {e}"));
        }
    };

    let result = match request {
        ClientRequest::ListPlayers { filter } => store.list(&filter).map(|players| {
            let total = players.len();
            ServerResponse::Players { players, total }
        }),
        ClientRequest::AddPlayer { player } => store
            .add(player_record(&player))
            .map(|id| ServerResponse::PlayerAdded { id }),
        ClientRequest::DeletePlayer { id } => store
            .delete_by_id(id)
            .map(|removed| ServerResponse::PlayerDeleted {
                removed: usize::from(removed),
            }),
        ClientRequest::DeletePlayerByName { name, team } => store
            .delete_by_name(&name, team.as_deref())
            .map(|removed| ServerResponse::PlayerDeleted { removed }),
    };

    result.unwrap_or_else(|e| {
        warn!("Roster request failed: {e}");
        ServerResponse::error(e.to_string())
    })
}
