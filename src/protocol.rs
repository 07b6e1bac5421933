use serde::{Deserialize, Serialize};

use crate::engine::{AttackAction, Game};
use crate::piece::{Color, PieceKind, Shape};
use crate::traits::TraitId;

/// How often a peer broadcasts its state snapshot, independent of tick rate.
pub const SYNC_INTERVAL_MS: f64 = 100.0;

/// Wire name of an attack call; arguments travel in a separate `args` array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttackKind {
    AddGarbageRow,
    AddRandomBlocks,
    ExpandBoard,
}

pub fn encode_attack(action: AttackAction) -> (AttackKind, Vec<i64>) {
    match action {
        AttackAction::AddGarbageRow => (AttackKind::AddGarbageRow, Vec::new()),
        AttackAction::AddRandomBlocks(n) => (AttackKind::AddRandomBlocks, vec![n as i64]),
        AttackAction::ExpandBoard(extra) => (AttackKind::ExpandBoard, vec![extra as i64]),
    }
}

/// Decode a received attack; malformed argument lists yield `None` and the
/// message is dropped.
pub fn decode_attack(kind: AttackKind, args: &[i64]) -> Option<AttackAction> {
    match kind {
        AttackKind::AddGarbageRow => Some(AttackAction::AddGarbageRow),
        AttackKind::AddRandomBlocks => {
            let n = u32::try_from(*args.first()?).ok()?;
            Some(AttackAction::AddRandomBlocks(n))
        }
        AttackKind::ExpandBoard => {
            let extra = i32::try_from(*args.first()?).ok()?;
            Some(AttackAction::ExpandBoard(extra))
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PieceView {
    pub name: PieceKind,
    pub shape: Shape,
    pub color: Color,
}

impl PieceView {
    pub fn of(kind: PieceKind) -> Self {
        Self {
            name: kind,
            shape: kind.base_shape(),
            color: kind.color_id(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveView {
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
    pub color: Color,
    pub name: PieceKind,
}

/// Everything a peer needs to display the other board; replaced wholesale on
/// every receipt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub board: Vec<Vec<Option<Color>>>,
    pub current: Option<ActiveView>,
    pub ghost_y: i32,
    pub score: u64,
    pub lines: u32,
    pub level: u32,
    pub total_lines_for_trait: u32,
    pub lines_until_trait: u32,
    pub hold_piece: Option<PieceView>,
    pub next_pieces: Vec<PieceView>,
    pub next_count: usize,
    pub game_over: bool,
    pub cols: usize,
    pub rows: usize,
}

impl StateSnapshot {
    pub fn capture(game: &Game) -> Self {
        Self {
            board: game.board.grid().to_vec(),
            current: game.current.as_ref().map(|p| ActiveView {
                shape: p.shape.clone(),
                x: p.x,
                y: p.y,
                color: p.color(),
                name: p.kind,
            }),
            ghost_y: game.ghost_y,
            score: game.score,
            lines: game.lines,
            level: game.level,
            total_lines_for_trait: game.total_lines_for_trait,
            lines_until_trait: game.lines_until_trait,
            hold_piece: game.hold_piece.map(PieceView::of),
            next_pieces: game
                .next_pieces()
                .take(game.next_count)
                .map(PieceView::of)
                .collect(),
            next_count: game.next_count,
            game_over: game.game_over,
            cols: game.board.cols(),
            rows: game.board.rows(),
        }
    }
}

/// Client-to-server messages. Room-control variants are handled by the
/// server; everything else it relays verbatim to the room's other occupant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom,
    JoinRoom {
        code: String,
    },
    Ready,
    StateUpdate {
        data: StateSnapshot,
    },
    Attack {
        action: AttackKind,
        #[serde(default)]
        args: Vec<i64>,
    },
    GameOver,
    TraitSelected {
        #[serde(rename = "traitId")]
        trait_id: TraitId,
    },
}

impl ClientMessage {
    pub fn attack(action: AttackAction) -> Self {
        let (action, args) = encode_attack(action);
        ClientMessage::Attack { action, args }
    }
}

/// Server-to-client messages, including the four relayed peer message types.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated {
        code: String,
    },
    PlayerJoined {
        #[serde(rename = "playerNumber")]
        player_number: u8,
    },
    OpponentJoined,
    GameStart,
    OpponentDisconnected,
    Error {
        message: String,
    },
    StateUpdate {
        data: StateSnapshot,
    },
    Attack {
        action: AttackKind,
        #[serde(default)]
        args: Vec<i64>,
    },
    GameOver,
    TraitSelected {
        #[serde(rename = "traitId")]
        trait_id: TraitId,
    },
}
