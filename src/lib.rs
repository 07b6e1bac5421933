//! Deterministic falling-block engine with a roguelike trait layer.
//!
//! The crate splits into three layers:
//! - the simulation: [`board`], [`piece`], [`bag`], [`engine`], [`traits`];
//! - the application shell: [`app`], which drives one or two seats and
//!   routes attacks between them;
//! - the network layer: [`protocol`] (wire types), [`session`] and
//!   [`remote`] (client side), [`room`] (server-side registry used by the
//!   relay binary).
//!
//! All gameplay randomness flows through a seedable RNG, so two engines
//! built with [`engine::Game::with_seed`] replay identically.

#![forbid(unsafe_code)]

pub mod app;
pub mod bag;
pub mod board;
pub mod engine;
pub mod piece;
pub mod protocol;
pub mod remote;
pub mod room;
pub mod session;
pub mod traits;

pub use app::{App, Command, Mode};
pub use bag::SevenBag;
pub use board::{BASE_COLS, BASE_ROWS, Board};
pub use engine::{AttackAction, AttackSink, Game, GameEvent, LINES_PER_TRAIT, WIN_SCORE};
pub use piece::{Piece, PieceKind};
pub use protocol::{ClientMessage, ServerMessage, StateSnapshot, SYNC_INTERVAL_MS};
pub use remote::RemoteMirror;
pub use room::{RoomRegistry, RoomState};
pub use session::OnlineSession;
pub use traits::{TraitId, TraitSystem};
