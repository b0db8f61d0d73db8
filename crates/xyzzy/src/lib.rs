//! # xyzzy
//!
//! Client connection manager for the xyzzy party game service.
//!
//! A [`Client`] keeps one connection to the game server alive for the
//! lifetime of the application:
//!
//! - a version handshake on every new connection, fatal when rejected
//! - request/response calls multiplexed by call id, with ephemeral calls
//!   that fail on disconnection and persistent calls that are replayed
//! - a durable session with automatic relogin after reconnecting
//! - exponential-backoff reconnection
//! - game-state push fragments assembled into complete snapshots
//!
//! Everything the application needs to show arrives as a [`ClientEvent`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xyzzy::prelude::*;
//!
//! # async fn demo() -> Result<(), XyzzyError> {
//! let (client, mut events) = Client::builder("ws://localhost:8080/ws").connect();
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::ConnectionStateChanged { state: ConnectionState::Connected, session: None } = event {
//!         let session = client.login("amy").await?;
//!         println!("logged in as {}", session.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod driver;
mod error;
mod event;
mod registry;

pub use client::{Client, ClientBuilder, Events};
pub use config::ClientConfig;
pub use error::{CallError, XyzzyError};
pub use event::{ClientEvent, ConnectionState};

pub use xyzzy_protocol as protocol;
pub use xyzzy_reconnect::ReconnectConfig;
pub use xyzzy_session::{FileStore, MemoryStore, Session, SessionStore};
pub use xyzzy_state::GameSnapshot;
pub use xyzzy_transport as transport;

pub mod prelude {
    //! The types most applications need.

    pub use crate::{
        CallError, Client, ClientBuilder, ClientConfig, ClientEvent, ConnectionState, FileStore,
        GameSnapshot, MemoryStore, ReconnectConfig, Session, SessionStore, XyzzyError,
    };
    pub use xyzzy_protocol::{ApiAction, GameEvent, GameOptions, Params, PlayedCard};
}
