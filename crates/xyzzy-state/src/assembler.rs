//! The fragment accumulator.

use xyzzy_protocol::{GameInfo, GameOptions, PlayerInfo, PushUpdate, WhiteCard};

/// A complete view of the game the user is in.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub game: GameInfo,
    pub options: GameOptions,
    pub hand: Vec<WhiteCard>,
    pub players: Vec<PlayerInfo>,
}

/// What the application should be told after applying a push update.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Every fragment is known; here is the full game.
    Snapshot(GameSnapshot),
    /// The user is not in a game.
    NoGame,
}

/// Accumulates push fragments until they form a [`GameSnapshot`].
///
/// ## Lifecycle
///
/// ```text
/// apply(hand) ──→ apply(game, options) ──→ apply(players) ──→ Snapshot
///                                                              │
///        apply(game: null) ──→ everything cleared ──→ NoGame ◄─┘
/// ```
///
/// `game` is tracked as `Option<Option<_>>`: never received, received as
/// `null`, or received with a value.
#[derive(Debug, Default)]
pub struct StateAssembler {
    game: Option<Option<GameInfo>>,
    options: Option<GameOptions>,
    hand: Option<Vec<WhiteCard>>,
    players: Option<Vec<PlayerInfo>>,
}

impl StateAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one push update into the accumulator.
    ///
    /// Returns what to dispatch, or `None` while fragments are still
    /// missing or when the update carried no fragment at all.
    pub fn apply(&mut self, update: PushUpdate) -> Option<Dispatch> {
        let PushUpdate {
            game,
            options,
            hand,
            players,
            events: _,
        } = update;

        // Leaving a game must not leak its per-game fragments.
        if matches!(game, Some(None)) && matches!(self.game, Some(Some(_))) {
            tracing::debug!("game left; clearing assembled state");
            self.reset();
        }

        let mut touched = false;
        if let Some(game) = game {
            self.game = Some(game);
            touched = true;
        }
        if let Some(options) = options {
            self.options = Some(options);
            touched = true;
        }
        if let Some(hand) = hand {
            self.hand = Some(hand);
            touched = true;
        }
        if let Some(players) = players {
            self.players = Some(players);
            touched = true;
        }

        if touched { self.dispatch() } else { None }
    }

    /// Forgets every fragment.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether no fragment has been received since the last reset.
    pub fn is_empty(&self) -> bool {
        self.game.is_none() && self.options.is_none() && self.hand.is_none() && self.players.is_none()
    }

    fn dispatch(&self) -> Option<Dispatch> {
        match (&self.game, &self.options, &self.hand, &self.players) {
            (Some(None), ..) => Some(Dispatch::NoGame),
            (Some(Some(game)), Some(options), Some(hand), Some(players)) => {
                Some(Dispatch::Snapshot(GameSnapshot {
                    game: game.clone(),
                    options: options.clone(),
                    hand: hand.clone(),
                    players: players.clone(),
                }))
            }
            _ => {
                tracing::trace!("game state still assembling");
                None
            }
        }
    }
}
