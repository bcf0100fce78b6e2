// WebSocket endpoint for room subscriptions
//
// Clients authenticate on upgrade, are joined to their own user room, and
// may ask to join a resident room or the security room. Events are only
// ever pushed by the server.

use crate::api::AppState;
use crate::auth::{principal, Principal};
use crate::authz::{self, Ownership};
use crate::errors::{AppError, Result};
use crate::realtime::{hub::RoomSubscription, rooms, RoomHub};
use crate::store::{ResidentStore, Store};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// Client-to-server frames
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    JoinResidentRoom { resident_id: Uuid },
    JoinSecurityRoom,
}

/// Server-to-client acknowledgements; room events are sent as `RoomEvent`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Reply {
    Joined { room: String },
    Error { message: String },
}

/// GET /ws?token=<jwt>
pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let token = query
        .token
        .as_deref()
        .or_else(|| principal::bearer_token(&headers))
        .ok_or(AppError::Unauthorized)?
        .to_string();
    let caller = principal::authenticate(&state.jwt, state.store.as_ref(), &token).await?;

    let hub = state.hub.clone();
    let store = state.store.clone();
    Ok(ws.on_upgrade(move |socket| session(socket, caller, hub, store)))
}

/// Resolve a join request to the room name it grants.
async fn authorize_join(
    store: &dyn Store,
    caller: &Principal,
    frame: &ClientFrame,
) -> Result<String> {
    match frame {
        ClientFrame::JoinSecurityRoom => {
            authz::authorize(caller, authz::JOIN_SECURITY_ROOM, Ownership::NotApplicable)?;
            Ok(rooms::SECURITY.to_string())
        }
        ClientFrame::JoinResidentRoom { resident_id } => {
            let owner = store
                .find_resident_by_user(caller.user_id)
                .await?
                .map(|r| r.id == *resident_id)
                .unwrap_or(false);
            authz::authorize(caller, authz::JOIN_RESIDENT_ROOM, owner.into())?;
            Ok(rooms::resident(*resident_id))
        }
    }
}

async fn handle_frame(
    store: &dyn Store,
    caller: &Principal,
    subscription: &mut RoomSubscription,
    text: &str,
) -> Reply {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(_) => {
            return Reply::Error {
                message: "Unknown action".to_string(),
            }
        }
    };

    match authorize_join(store, caller, &frame).await {
        Ok(room) => {
            subscription.join(room.clone());
            tracing::debug!(user_id = %caller.user_id, room = %room, "Joined room");
            Reply::Joined { room }
        }
        Err(e) => Reply::Error {
            message: e.to_string(),
        },
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode frame: {}", e);
            true
        }
    }
}

#[tracing::instrument(skip(socket, hub, store), fields(user_id = %caller.user_id))]
async fn session(mut socket: WebSocket, caller: Principal, hub: RoomHub, store: Arc<dyn Store>) {
    let mut subscription = hub.subscribe();
    subscription.join(rooms::user(caller.user_id));
    tracing::info!("Realtime session opened");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!("Socket error: {}", e);
                        break;
                    }
                };
                let reply = handle_frame(store.as_ref(), &caller, &mut subscription, &text).await;
                if !send_json(&mut socket, &reply).await {
                    break;
                }
            }
            event = subscription.next() => {
                let Some(event) = event else { break };
                if !send_json(&mut socket, &event).await {
                    break;
                }
            }
        }
    }

    tracing::info!("Realtime session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;
    use crate::services::test_support::Harness;

    #[test]
    fn test_client_frames_parse() {
        let id = Uuid::new_v4();
        let frame: ClientFrame = serde_json::from_str(&format!(
            r#"{{"action":"join-resident-room","residentId":"{}"}}"#,
            id
        ))
        .unwrap();
        assert_eq!(frame, ClientFrame::JoinResidentRoom { resident_id: id });

        let frame: ClientFrame =
            serde_json::from_str(r#"{"action":"join-security-room"}"#).unwrap();
        assert_eq!(frame, ClientFrame::JoinSecurityRoom);

        assert!(serde_json::from_str::<ClientFrame>(r#"{"action":"leave"}"#).is_err());
    }

    #[tokio::test]
    async fn test_resident_joins_only_own_room() {
        let harness = Harness::new();
        let (principal, resident) = harness.resident().await;
        let store = harness.store.as_ref();

        let own = ClientFrame::JoinResidentRoom {
            resident_id: resident.id,
        };
        assert_eq!(
            authorize_join(store, &principal, &own).await.unwrap(),
            rooms::resident(resident.id)
        );

        let other = ClientFrame::JoinResidentRoom {
            resident_id: Uuid::new_v4(),
        };
        assert!(matches!(
            authorize_join(store, &principal, &other).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(authorize_join(store, &principal, &ClientFrame::JoinSecurityRoom)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_security_joins_any_room() {
        let harness = Harness::new();
        let guard = harness.user(Role::Security).await;
        let store = harness.store.as_ref();

        assert_eq!(
            authorize_join(store, &guard, &ClientFrame::JoinSecurityRoom)
                .await
                .unwrap(),
            rooms::SECURITY
        );
        let frame = ClientFrame::JoinResidentRoom {
            resident_id: Uuid::new_v4(),
        };
        assert!(authorize_join(store, &guard, &frame).await.is_ok());
    }

    #[tokio::test]
    async fn test_joined_room_receives_events() {
        let harness = Harness::new();
        let guard = harness.user(Role::Security).await;
        let mut subscription = harness.hub.subscribe();

        let reply = handle_frame(
            harness.store.as_ref(),
            &guard,
            &mut subscription,
            r#"{"action":"join-security-room"}"#,
        )
        .await;
        assert!(matches!(reply, Reply::Joined { .. }));
        assert!(subscription.is_member(rooms::SECURITY));

        let reply = handle_frame(harness.store.as_ref(), &guard, &mut subscription, "nope").await;
        assert!(matches!(reply, Reply::Error { .. }));
    }
}
