//! Game payloads carried by push updates and call results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Params;

/// Lifecycle of a game as reported in `game.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    NotStarted,
    Playing,
    Judging,
    RoundEnded,
    GameEnded,
}

/// The `game` fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    pub code: String,
    pub state: GameStatus,
    #[serde(default)]
    pub current_round: Option<RoundInfo>,
}

/// The round in progress. Absent before the first round starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub id: String,
    pub black_card: BlackCard,
    /// Played answers, one group per player, visible once judging starts.
    #[serde(default)]
    pub white_cards: Option<Vec<Vec<WhiteCard>>>,
    pub card_czar: String,
    #[serde(default)]
    pub winner: Option<RoundWinner>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundWinner {
    pub player: String,
    pub cards: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackCard {
    pub text: String,
    pub pick_count: u32,
    pub draw_count: u32,
    #[serde(default)]
    pub pack_name: Option<String>,
}

/// A white card. Blank cards carry no text until a player writes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteCard {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub blank: bool,
    #[serde(default)]
    pub pack_name: Option<String>,
}

/// One entry of the `players` fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub playing: bool,
}

/// The `options` fragment, also the parameter set of a `game_options` call.
///
/// Missing fields fall back to their defaults so an older server that
/// omits one does not break the whole push frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    pub game_title: String,
    pub public: bool,
    pub think_time: u32,
    pub round_end_time: u32,
    pub idle_rounds: u32,
    pub blank_cards: u32,
    pub player_limit: u32,
    pub point_limit: u32,
    pub password: String,
    /// Ids of the enabled card packs.
    pub card_packs: Vec<String>,
}

/// A game event such as `player_join` or `chat_message`.
///
/// Only the `type` tag is interpreted; the rest is passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// One row of the public game list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameListEntry {
    pub code: String,
    pub title: String,
    pub players: u32,
    pub player_limit: u32,
    pub passworded: bool,
}

/// Result of a successful `authenticate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateResult {
    pub id: String,
    pub token: String,
    pub name: String,
    #[serde(default)]
    pub in_game: bool,
}

/// Parameters of an `authenticate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// Resume an existing user.
    Resume { id: String, token: String },
    /// Create a new user with this display name.
    Name { name: String },
}

impl Credentials {
    /// The call parameters for an `authenticate` request.
    pub fn into_params(self) -> Params {
        let mut params = Params::new();
        match self {
            Self::Resume { id, token } => {
                params.insert("id".into(), Value::String(id));
                params.insert("token".into(), Value::String(token));
            }
            Self::Name { name } => {
                params.insert("name".into(), Value::String(name));
            }
        }
        params
    }
}

/// A white card submitted with `play_white`. `text` is only set for blanks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedCard {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}
