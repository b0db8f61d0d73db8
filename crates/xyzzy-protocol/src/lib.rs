//! Wire protocol for the xyzzy client.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Frames** ([`HandshakeRequest`], [`CallRequest`], [`ServerFrame`],
//!   [`PushUpdate`]): the JSON objects that travel on the wire.
//! - **Game payloads** ([`GameInfo`], [`GameOptions`], [`WhiteCard`], ...):
//!   the typed fragments inside push updates and call results.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become text.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (typed frames) → Client (calls, state)
//! ```
//!
//! The protocol layer knows nothing about connections or sessions.

mod codec;
mod error;
mod game;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use game::{
    AuthenticateResult, BlackCard, Credentials, GameEvent, GameInfo, GameListEntry, GameOptions,
    GameStatus, PlayedCard, PlayerInfo, RoundInfo, RoundWinner, WhiteCard,
};
pub use types::{
    ApiAction, CLOSE_PROTOCOL_ERROR, CallFailure, CallId, CallRequest, CallResponse,
    DISCONNECT_CONNECTED_ELSEWHERE, HandshakeRequest, HandshakeResponse, NOT_AUTHENTICATED,
    PROTOCOL_VERSION, Params, PushUpdate, ServerConfig, ServerFrame,
};
