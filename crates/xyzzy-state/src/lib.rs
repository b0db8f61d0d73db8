//! Game-state assembly for the xyzzy client.
//!
//! The server pushes game state in four independent fragments (`game`,
//! `options`, `hand`, `players`) that may arrive in any combination and
//! order. [`StateAssembler`] accumulates them and hands the application
//! a complete [`GameSnapshot`] only once every fragment is known, so the
//! UI never renders a half-updated game.

mod assembler;

pub use assembler::{Dispatch, GameSnapshot, StateAssembler};
