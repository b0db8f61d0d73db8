//! Frame types exchanged with the game server.
//!
//! Every frame is a JSON object. The client sends exactly two shapes:
//!
//! ```text
//! {"version": "<tag>"}                                  handshake
//! {"action": "join_game", "call_id": 7, "code": "AB"}   call request
//! ```
//!
//! The server answers the handshake once, then sends any mix of:
//!
//! ```text
//! {"disconnect": "connected_elsewhere"}                 takeover notice
//! {"call_id": 7, "error": null, ...result fields}       call response
//! {"game": {...}, "hand": [...], "events": [...]}       push update
//! ```
//!
//! [`ServerFrame::from_value`] tells these apart by key presence.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;
use crate::game::{GameEvent, GameInfo, GameOptions, PlayerInfo, WhiteCard};

/// Version tag this client sends in its handshake unless configured
/// otherwise.
pub const PROTOCOL_VERSION: &str = "1";

/// Close code the server uses when it can no longer talk to this client.
///
/// Receiving it is fatal: the client must not reconnect.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1003;

/// Reason carried by a `disconnect` frame when the same user connected
/// from another place.
pub const DISCONNECT_CONNECTED_ELSEWHERE: &str = "connected_elsewhere";

/// Error code meaning the session is not (or no longer) authenticated.
pub const NOT_AUTHENTICATED: &str = "not_authenticated";

/// Key/value payload of a call request or a successful call response.
pub type Params = Map<String, Value>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Client-assigned identifier correlating a call with its response.
///
/// Ids come from one counter per client and are never reused, so their
/// order is also the order calls were submitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Every action the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiAction {
    Authenticate,
    LogOut,
    GameList,
    CreateGame,
    JoinGame,
    LeaveGame,
    KickPlayer,
    GameOptions,
    StartGame,
    StopGame,
    PlayWhite,
    ChooseWinner,
    Chat,
}

impl ApiAction {
    /// The action name as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::LogOut => "log_out",
            Self::GameList => "game_list",
            Self::CreateGame => "create_game",
            Self::JoinGame => "join_game",
            Self::LeaveGame => "leave_game",
            Self::KickPlayer => "kick_player",
            Self::GameOptions => "game_options",
            Self::StartGame => "start_game",
            Self::StopGame => "stop_game",
            Self::PlayWhite => "play_white",
            Self::ChooseWinner => "choose_winner",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for ApiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// First frame sent on every new connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub version: String,
}

impl HandshakeRequest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// Server configuration delivered by a successful handshake.
///
/// Kept as raw JSON: the connection manager only forwards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerConfig(pub Value);

impl ServerConfig {
    /// Returns one top-level section of the configuration, e.g. `"game"`.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// The server's reply to a [`HandshakeRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeResponse {
    /// The version was accepted.
    Accepted(ServerConfig),
    /// The server refused this client, typically with `incorrect_version`.
    Rejected(String),
}

impl HandshakeResponse {
    /// Interprets the first frame received on a connection.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` if the frame carries
    /// neither an `error` nor a `config`.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::InvalidMessage(
                "handshake reply is not an object".into(),
            ));
        };
        match map.remove("error") {
            Some(Value::String(code)) => return Ok(Self::Rejected(code)),
            None | Some(Value::Null) => {}
            Some(other) => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "handshake error is not a string: {other}"
                )));
            }
        }
        map.remove("config")
            .map(|config| Self::Accepted(ServerConfig(config)))
            .ok_or_else(|| ProtocolError::InvalidMessage("handshake reply has no config".into()))
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// One call as sent on the wire. Parameters are flattened into the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRequest<'a> {
    pub action: ApiAction,
    pub call_id: CallId,
    #[serde(flatten)]
    pub params: &'a Params,
}

/// An application-level failure reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub code: String,
    pub description: String,
}

/// The server's answer to one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    pub call_id: CallId,
    /// Result fields on success, the failure otherwise.
    pub outcome: Result<Params, CallFailure>,
}

// ---------------------------------------------------------------------------
// Push updates
// ---------------------------------------------------------------------------

/// Unsolicited state fragments and events.
///
/// `game` has three states: absent (no news), `Some(None)` (the user is not
/// in a game any more), and `Some(Some(_))` (new game info).
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PushUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub game: Option<Option<GameInfo>>,
    #[serde(default)]
    pub options: Option<GameOptions>,
    #[serde(default)]
    pub hand: Option<Vec<WhiteCard>>,
    #[serde(default)]
    pub players: Option<Vec<PlayerInfo>>,
    #[serde(default)]
    pub events: Vec<GameEvent>,
}

/// Maps a present key to `Some(..)` even when its value is `null`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Server frames
// ---------------------------------------------------------------------------

/// Any frame the server sends after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// The server is dropping this connection on purpose.
    Disconnect(String),
    /// The answer to an earlier call.
    Response(CallResponse),
    /// State fragments and events.
    Push(PushUpdate),
}

impl ServerFrame {
    /// Classifies a decoded frame by the keys it carries.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` for non-object frames or
    /// malformed error fields, and `ProtocolError::Decode` when a push
    /// payload does not match the game types.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::InvalidMessage("frame is not an object".into()));
        };

        if let Some(reason) = map.remove("disconnect") {
            let reason = match reason {
                Value::String(reason) => reason,
                other => other.to_string(),
            };
            return Ok(Self::Disconnect(reason));
        }

        if let Some(call_id) = map.remove("call_id") {
            let call_id: CallId =
                serde_json::from_value(call_id).map_err(ProtocolError::Decode)?;
            let outcome = match map.remove("error") {
                None | Some(Value::Null) => Ok(map),
                Some(Value::String(code)) => {
                    let description = match map.remove("description") {
                        Some(Value::String(description)) => description,
                        _ => String::new(),
                    };
                    Err(CallFailure { code, description })
                }
                Some(other) => {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "{call_id} error is not a string: {other}"
                    )));
                }
            };
            return Ok(Self::Response(CallResponse { call_id, outcome }));
        }

        serde_json::from_value(Value::Object(map))
            .map(Self::Push)
            .map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameStatus;
    use serde_json::json;

    #[test]
    fn test_call_request_flattens_params() {
        let mut params = Params::new();
        params.insert("code".into(), json!("ABCD"));
        let request = CallRequest {
            action: ApiAction::JoinGame,
            call_id: CallId(7),
            params: &params,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"action": "join_game", "call_id": 7, "code": "ABCD"})
        );
    }

    #[test]
    fn test_api_action_as_str_matches_serde() {
        for action in [ApiAction::LogOut, ApiAction::GameOptions, ApiAction::PlayWhite] {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(action.as_str()));
        }
    }

    #[test]
    fn test_handshake_response_accepted() {
        let response = HandshakeResponse::from_value(json!({"config": {"chat": {}}})).unwrap();
        match response {
            HandshakeResponse::Accepted(config) => {
                assert!(config.section("chat").is_some());
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[test]
    fn test_handshake_response_rejected() {
        let response = HandshakeResponse::from_value(json!({"error": "incorrect_version"})).unwrap();
        assert_eq!(response, HandshakeResponse::Rejected("incorrect_version".into()));
    }

    #[test]
    fn test_handshake_response_without_config_is_invalid() {
        let result = HandshakeResponse::from_value(json!({"hello": 1}));
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_server_frame_disconnect() {
        let frame = ServerFrame::from_value(json!({"disconnect": "connected_elsewhere"})).unwrap();
        assert_eq!(frame, ServerFrame::Disconnect(DISCONNECT_CONNECTED_ELSEWHERE.into()));
    }

    #[test]
    fn test_server_frame_success_response_strips_envelope() {
        let frame =
            ServerFrame::from_value(json!({"call_id": 3, "error": null, "games": []})).unwrap();
        let ServerFrame::Response(response) = frame else {
            panic!("expected response");
        };
        assert_eq!(response.call_id, CallId(3));
        let result = response.outcome.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["games"], json!([]));
    }

    #[test]
    fn test_server_frame_error_response() {
        let frame = ServerFrame::from_value(json!({
            "call_id": 4,
            "error": "not_authenticated",
            "description": "log in first"
        }))
        .unwrap();
        let ServerFrame::Response(response) = frame else {
            panic!("expected response");
        };
        assert_eq!(
            response.outcome,
            Err(CallFailure {
                code: NOT_AUTHENTICATED.into(),
                description: "log in first".into(),
            })
        );
    }

    #[test]
    fn test_server_frame_push_distinguishes_null_game_from_absent() {
        let ServerFrame::Push(absent) = ServerFrame::from_value(json!({"hand": []})).unwrap() else {
            panic!("expected push");
        };
        assert_eq!(absent.game, None);
        assert_eq!(absent.hand, Some(vec![]));

        let ServerFrame::Push(null) = ServerFrame::from_value(json!({"game": null})).unwrap() else {
            panic!("expected push");
        };
        assert_eq!(null.game, Some(None));
    }

    #[test]
    fn test_server_frame_push_with_game_and_events() {
        let frame = ServerFrame::from_value(json!({
            "game": {"code": "QWER", "state": "not_started", "current_round": null},
            "events": [{"type": "player_join", "player": {"id": "u1", "name": "amy"}}]
        }))
        .unwrap();
        let ServerFrame::Push(update) = frame else {
            panic!("expected push");
        };
        let game = update.game.unwrap().unwrap();
        assert_eq!(game.code, "QWER");
        assert_eq!(game.state, GameStatus::NotStarted);
        assert_eq!(update.events.len(), 1);
        assert_eq!(update.events[0].kind, "player_join");
    }

    #[test]
    fn test_server_frame_non_object_is_invalid() {
        let result = ServerFrame::from_value(json!([1, 2]));
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }
}
