use crate::board::{BASE_COLS, BASE_ROWS};
use crate::engine::LINES_PER_TRAIT;
use crate::piece::Color;
use crate::protocol::{ActiveView, PieceView, StateSnapshot};

/// Passive reconstruction of the peer's engine-observable state, for display
/// only. Each received snapshot replaces the previous one wholesale;
/// last write wins, no merging.
#[derive(Clone, Debug)]
pub struct RemoteMirror {
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

impl Default for RemoteMirror {
    fn default() -> Self {
        Self {
            board: vec![vec![None; BASE_COLS]; BASE_ROWS],
            current: None,
            ghost_y: 0,
            score: 0,
            lines: 0,
            level: 1,
            total_lines_for_trait: 0,
            lines_until_trait: LINES_PER_TRAIT,
            hold_piece: None,
            next_pieces: Vec::new(),
            next_count: 1,
            game_over: false,
            cols: BASE_COLS,
            rows: BASE_ROWS,
        }
    }
}

impl RemoteMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, snapshot: StateSnapshot) {
        self.board = snapshot.board;
        self.current = snapshot.current;
        self.ghost_y = snapshot.ghost_y;
        self.score = snapshot.score;
        self.lines = snapshot.lines;
        self.level = snapshot.level;
        self.total_lines_for_trait = snapshot.total_lines_for_trait;
        self.lines_until_trait = snapshot.lines_until_trait;
        self.hold_piece = snapshot.hold_piece;
        self.next_pieces = snapshot.next_pieces;
        self.next_count = snapshot.next_count;
        self.game_over = snapshot.game_over;
        self.cols = snapshot.cols;
        self.rows = snapshot.rows;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Game;

    #[test]
    fn apply_replaces_state_wholesale() {
        let mut game = Game::with_seed(11);
        game.score = 4200;
        game.resize_board(12);
        let mut mirror = RemoteMirror::new();
        mirror.apply(StateSnapshot::capture(&game));
        assert_eq!(mirror.score, 4200);
        assert_eq!(mirror.cols, 12);
        assert!(mirror.current.is_some());

        game.current = None;
        game.game_over = true;
        mirror.apply(StateSnapshot::capture(&game));
        // Last write wins, including the cleared piece.
        assert!(mirror.current.is_none());
        assert!(mirror.game_over);
    }
}
