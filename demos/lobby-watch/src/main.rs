//! Logs in, lists the public games, and then follows the connection.
//!
//! ```text
//! XYZZY_URL=ws://localhost:8080/ws RUST_LOG=info,xyzzy=debug cargo run -p lobby-watch -- amy
//! ```
//!
//! The session is kept in the user's data directory, so a second run
//! resumes it instead of creating a new user.

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xyzzy::prelude::*;

const DEFAULT_URL: &str = "ws://localhost:8080/ws";

#[tokio::main]
async fn main() -> Result<(), XyzzyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::var("XYZZY_URL").unwrap_or_else(|_| DEFAULT_URL.to_owned());
    let name = std::env::args().nth(1).unwrap_or_else(|| "lobby-watch".to_owned());

    let (client, mut events) = Client::builder(url)
        .session_store(FileStore::in_data_dir("lobby-watch")?)
        .connect();

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::ConnectionStateChanged { state, session } => {
                info!(%state, user = session.as_ref().map(|s| s.name.as_str()), "connection");
                if state != ConnectionState::Connected {
                    if state.is_terminal() {
                        warn!(%state, "giving up");
                        break;
                    }
                    continue;
                }
                if session.is_none() {
                    // The login reports Connected again, with a session.
                    match client.login(name.clone()).await {
                        Ok(session) => info!(id = %session.id, "logged in as {}", session.name),
                        Err(error) => warn!(%error, "login failed"),
                    }
                    continue;
                }
                let games = match client.game_list().await {
                    Ok(games) => games,
                    Err(error) => {
                        warn!(%error, "cannot list games");
                        continue;
                    }
                };
                for game in games {
                    info!(
                        code = %game.code,
                        players = game.players,
                        limit = game.player_limit,
                        passworded = game.passworded,
                        "{}",
                        game.title
                    );
                }
            }
            ClientEvent::ReloginFailed(error) => warn!(%error, "stored session rejected"),
            ClientEvent::ReloadRequired => {
                warn!("server speaks a different protocol version");
                break;
            }
            ClientEvent::ServerConfig(_) | ClientEvent::Snapshot(_) | ClientEvent::NoGame => {}
            ClientEvent::GameEvent(event) => info!(kind = %event.kind, "game event"),
        }
    }

    client.disconnect().await;
    Ok(())
}
