use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bag::SevenBag;
use crate::board::{BASE_COLS, BASE_ROWS, Board};
use crate::piece::{Piece, PieceKind, spawn_x};

pub const LOCK_DELAY_MS: f64 = 500.0;
pub const WIN_SCORE: u64 = 100_000;
pub const LINES_PER_TRAIT: u32 = 10;
pub const LINE_CLEARER_INTERVAL_MS: f64 = 60_000.0;
/// Internal lookahead depth; `next_count` controls how many are shown.
const QUEUE_DEPTH: usize = 5;

/// One-shot adverse mutation applied to an opponent board. Carried on the
/// wire as an `attack` message (see `protocol`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackAction {
    AddGarbageRow,
    AddRandomBlocks(u32),
    ExpandBoard(i32),
}

/// Capability interface for delivering attacks to an opponent. Solo engines
/// have no sink; local-versus engines hold a queued sink drained at the tick
/// boundary; online engines hold a sink that serializes onto the wire.
pub trait AttackSink {
    fn add_garbage_row(&mut self);
    fn add_random_blocks(&mut self, count: u32);
    fn expand_board(&mut self, extra: i32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    LinesCleared(u32),
    TraitReady,
    GameOver,
    GameWon,
}

/// One player's simulation: board, active piece, lookahead, counters, trait
/// flags. Driven by `update(dt)` plus the discrete input commands; raises
/// tagged events drained by the surrounding controller.
pub struct Game {
    pub board: Board,
    pub current: Option<Piece>,
    pub ghost_y: i32,
    bag: SevenBag,
    next_pieces: VecDeque<PieceKind>,
    pub next_count: usize,
    pub hold_piece: Option<PieceKind>,
    hold_used: bool,

    pub score: u64,
    pub lines: u32,
    pub level: u32,
    pub total_lines_for_trait: u32,
    pub lines_until_trait: u32,

    pub game_over: bool,
    pub game_won: bool,
    pub paused: bool,
    pub trait_pending: bool,

    drop_interval: f64,
    drop_timer: f64,
    lock_timer: f64,
    is_locking: bool,

    pub speed_multiplier: f64,
    pub score_multiplier: f64,

    // Trait flags.
    pub lucky_dice: bool,
    pub safety_net_charges: u32,
    pub blast_expert: bool,
    pub crusher: bool,
    pub chaos: bool,
    pub line_clearer_active: bool,
    line_clearer_timer: f64,

    opponent: Option<Box<dyn AttackSink>>,
    events: Vec<GameEvent>,
    rng: StdRng,
}

impl Game {
    pub fn new() -> Self {
        Self::with_seed(rand::random::<u64>())
    }

    pub fn with_seed(seed: u64) -> Self {
        let mut game = Self {
            board: Board::new(BASE_ROWS, BASE_COLS),
            current: None,
            ghost_y: 0,
            bag: SevenBag::new(),
            next_pieces: VecDeque::new(),
            next_count: 1,
            hold_piece: None,
            hold_used: false,
            score: 0,
            lines: 0,
            level: 1,
            total_lines_for_trait: 0,
            lines_until_trait: LINES_PER_TRAIT,
            game_over: false,
            game_won: false,
            paused: false,
            trait_pending: false,
            drop_interval: 1000.0,
            drop_timer: 0.0,
            lock_timer: 0.0,
            is_locking: false,
            speed_multiplier: 1.0,
            score_multiplier: 1.0,
            lucky_dice: false,
            safety_net_charges: 0,
            blast_expert: false,
            crusher: false,
            chaos: false,
            line_clearer_active: false,
            line_clearer_timer: 0.0,
            opponent: None,
            events: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        };
        for _ in 0..QUEUE_DEPTH {
            let kind = game.bag.next(&mut game.rng);
            game.next_pieces.push_back(kind);
        }
        game.spawn_piece();
        game
    }

    pub fn set_opponent(&mut self, sink: Box<dyn AttackSink>) {
        self.opponent = Some(sink);
    }

    pub fn has_opponent(&self) -> bool {
        self.opponent.is_some()
    }

    #[cfg(test)]
    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn next_pieces(&self) -> impl Iterator<Item = PieceKind> + '_ {
        self.next_pieces.iter().copied()
    }

    pub fn is_locking(&self) -> bool {
        self.is_locking
    }

    pub fn lock_timer(&self) -> f64 {
        self.lock_timer
    }

    pub fn drop_interval(&self) -> f64 {
        self.drop_interval
    }

    fn blocked(&self) -> bool {
        self.game_over || self.paused || self.trait_pending
    }

    /// Advance the simulation by `dt` milliseconds. Blocked entirely while
    /// paused, trait-pending, or over.
    pub fn update(&mut self, dt: f64) {
        if self.blocked() {
            return;
        }
        self.tick_line_clearer(dt);
        let Some(current) = &self.current else {
            return;
        };
        if !self
            .board
            .is_valid_position(&current.shape, current.x, current.y + 1)
        {
            self.is_locking = true;
            self.lock_timer += dt;
            if self.lock_timer >= LOCK_DELAY_MS {
                self.lock_piece();
                return;
            }
        } else {
            self.is_locking = false;
            self.lock_timer = 0.0;
        }

        self.drop_timer += dt;
        if self.drop_timer >= self.drop_interval {
            self.drop_timer = 0.0;
            if let Some(current) = &mut self.current {
                if self
                    .board
                    .is_valid_position(&current.shape, current.x, current.y + 1)
                {
                    current.y += 1;
                }
            }
        }
    }

    fn tick_line_clearer(&mut self, dt: f64) {
        if !self.line_clearer_active {
            return;
        }
        self.line_clearer_timer += dt;
        if self.line_clearer_timer >= LINE_CLEARER_INTERVAL_MS {
            self.line_clearer_timer = 0.0;
            if !self.attack_opponent(AttackAction::AddGarbageRow) {
                self.board.clear_bottom_row();
            }
        }
    }

    pub fn activate_line_clearer(&mut self) {
        self.line_clearer_active = true;
        self.line_clearer_timer = 0.0;
    }

    /// Horizontal step. Invalid moves are silently rejected; a successful move
    /// during lock delay resets the lock timer.
    pub fn move_piece(&mut self, dx: i32) {
        if self.blocked() {
            return;
        }
        let Some(current) = &mut self.current else {
            return;
        };
        if self
            .board
            .is_valid_position(&current.shape, current.x + dx, current.y)
        {
            current.x += dx;
            self.update_ghost();
            if self.is_locking {
                self.lock_timer = 0.0;
            }
        }
    }

    /// Transpose rotation with wall-kick offsets [0,-1,+1,-2,+2]; `O` is
    /// exempt. Rejected rotations leave the pose untouched.
    pub fn rotate(&mut self, dir: i32) {
        if self.blocked() {
            return;
        }
        let Some(current) = &mut self.current else {
            return;
        };
        if current.kind == PieceKind::O {
            return;
        }
        let rotated = crate::piece::rotate_shape(&current.shape, dir);
        for kick in [0, -1, 1, -2, 2] {
            if self
                .board
                .is_valid_position(&rotated, current.x + kick, current.y)
            {
                current.shape = rotated;
                current.x += kick;
                self.update_ghost();
                if self.is_locking {
                    self.lock_timer = 0.0;
                }
                return;
            }
        }
    }

    pub fn soft_drop(&mut self) {
        if self.blocked() {
            return;
        }
        let Some(current) = &mut self.current else {
            return;
        };
        if self
            .board
            .is_valid_position(&current.shape, current.x, current.y + 1)
        {
            current.y += 1;
            self.score += 1;
            self.is_locking = false;
            self.lock_timer = 0.0;
        }
    }

    pub fn hard_drop(&mut self) {
        if self.blocked() {
            return;
        }
        let Some(current) = &mut self.current else {
            return;
        };
        let mut dist = 0u64;
        while self
            .board
            .is_valid_position(&current.shape, current.x, current.y + 1)
        {
            current.y += 1;
            dist += 1;
        }
        self.score += dist * 2;
        self.lock_piece();
    }

    /// Swap the current piece with the held one, or stash it and spawn the
    /// next. Blocked after first use per spawn; the hold-master hook clears
    /// the used flag externally. Stashes the canonical rotation-0 shape.
    pub fn hold(&mut self) {
        if self.blocked() || self.hold_used {
            return;
        }
        let Some(current) = &self.current else {
            return;
        };
        let stashed = current.kind;
        match self.hold_piece.take() {
            None => {
                self.hold_piece = Some(stashed);
                self.spawn_piece();
            }
            Some(held) => {
                self.hold_piece = Some(stashed);
                self.current = Some(Piece::spawn(held, self.board.cols()));
                self.update_ghost();
            }
        }
        self.hold_used = true;
    }

    pub fn hold_used(&self) -> bool {
        self.hold_used
    }

    /// Hold-master hook: re-arms hold for the current spawn.
    pub fn reset_hold_used(&mut self) {
        self.hold_used = false;
    }

    fn next_from_queue(&mut self) -> PieceKind {
        let head = self.next_pieces.pop_front().unwrap_or(PieceKind::I);
        let refill = self.bag.next(&mut self.rng);
        self.next_pieces.push_back(refill);
        head
    }

    /// Draw the lookahead head (lucky-dice substitutes an `I` half the time),
    /// refill one bag draw, center the piece. An invalid spawn pose is game
    /// over unless a safety-net charge saves it.
    pub fn spawn_piece(&mut self) {
        let mut kind = self.next_from_queue();
        if self.lucky_dice && self.rng.gen_bool(0.5) {
            kind = PieceKind::I;
        }
        let piece = Piece::spawn(kind, self.board.cols());
        self.hold_used = false;
        self.is_locking = false;
        self.lock_timer = 0.0;

        if !self.board.is_valid_position(&piece.shape, piece.x, piece.y) {
            self.game_over = true;
            if self.safety_net_charges > 0 {
                self.safety_net_charges -= 1;
                self.board.clear_top_rows(3);
                self.game_over =
                    !self.board.is_valid_position(&piece.shape, piece.x, piece.y);
            }
            if self.game_over {
                self.events.push(GameEvent::GameOver);
            }
        }
        self.current = Some(piece);
        self.update_ghost();
    }

    pub fn update_ghost(&mut self) {
        let Some(current) = &self.current else {
            return;
        };
        let mut y = current.y;
        while self.board.is_valid_position(&current.shape, current.x, y + 1) {
            y += 1;
        }
        self.ghost_y = y;
    }

    /// Stamp the current piece, run clears and scoring, spawn the next piece.
    fn lock_piece(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };
        if self.crusher && !self.attack_opponent(AttackAction::AddRandomBlocks(2)) {
            self.crush_column(&current);
        }
        for (r, row) in current.shape.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                if cell == 0 {
                    continue;
                }
                let ny = current.y + r as i32;
                let nx = current.x + c as i32;
                if ny >= 0
                    && (ny as usize) < self.board.rows()
                    && nx >= 0
                    && (nx as usize) < self.board.cols()
                {
                    let color = if self.chaos {
                        self.rng.gen_range(1..=7)
                    } else {
                        current.color()
                    };
                    self.board.set_cell(ny as usize, nx as usize, color);
                }
            }
        }
        let cleared = self.board.clear_full_rows();
        self.handle_line_clears(cleared);
        self.spawn_piece();
    }

    /// Crusher solo compensation: fill the column under the piece's visually
    /// centered cell from its lowest occupied row down to the floor.
    fn crush_column(&mut self, piece: &Piece) {
        let center_c = piece.width() / 2;
        let bottom_r = (0..piece.shape.len())
            .rev()
            .find(|&r| piece.shape[r][center_c] != 0);
        let Some(bottom_r) = bottom_r else {
            return;
        };
        let board_x = piece.x + center_c as i32;
        if board_x < 0 || board_x >= self.board.cols() as i32 {
            return;
        }
        let color = piece.color();
        let start = piece.y + bottom_r as i32 + 1;
        for r in start.max(0)..self.board.rows() as i32 {
            if self.board.cell(r as usize, board_x as usize).is_none() {
                self.board.set_cell(r as usize, board_x as usize, color);
            }
        }
    }

    fn handle_line_clears(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        let points: u64 = match count {
            1 => 100,
            2 => 300,
            3 => 500,
            _ => 800,
        };
        self.score +=
            (points as f64 * self.level as f64 * self.score_multiplier).round() as u64;
        self.lines += count;
        self.total_lines_for_trait += count;

        if self.blast_expert
            && count >= 2
            && !self.attack_opponent(AttackAction::AddGarbageRow)
        {
            self.board.clear_bottom_row();
        }

        self.level = self.lines / 10 + 1;
        self.update_speed();

        if self.total_lines_for_trait >= self.lines_until_trait {
            self.total_lines_for_trait -= self.lines_until_trait;
            self.trait_pending = true;
            self.events.push(GameEvent::TraitReady);
        }
        self.events.push(GameEvent::LinesCleared(count));
        self.check_win();
    }

    fn check_win(&mut self) {
        if !self.game_won && self.score >= WIN_SCORE {
            self.game_won = true;
            self.game_over = true;
            self.events.push(GameEvent::GameWon);
        }
    }

    pub fn update_speed(&mut self) {
        let base = (1000 - (self.level as i64 - 1) * 80).max(100) as f64;
        self.drop_interval = base / self.speed_multiplier;
    }

    pub fn scale_speed(&mut self, factor: f64) {
        self.speed_multiplier *= factor;
        self.update_speed();
    }

    pub fn scale_score(&mut self, factor: f64) {
        self.score_multiplier *= factor;
    }

    /// Deliver an attack to the opponent sink. Returns false when solo, so
    /// callers can apply the documented solo compensation instead.
    pub fn attack_opponent(&mut self, action: AttackAction) -> bool {
        let Some(sink) = &mut self.opponent else {
            return false;
        };
        match action {
            AttackAction::AddGarbageRow => sink.add_garbage_row(),
            AttackAction::AddRandomBlocks(n) => sink.add_random_blocks(n),
            AttackAction::ExpandBoard(extra) => sink.expand_board(extra),
        }
        true
    }

    /// Apply a received attack to this board (authoritative local mutation).
    pub fn apply_attack(&mut self, action: AttackAction) {
        match action {
            AttackAction::AddGarbageRow => self.add_garbage_row(),
            AttackAction::AddRandomBlocks(n) => self.add_random_blocks(n),
            AttackAction::ExpandBoard(extra) => self.expand_board(extra),
        }
    }

    pub fn add_random_blocks(&mut self, count: u32) {
        self.board.add_random_blocks(count, &mut self.rng);
    }

    pub fn add_garbage_row(&mut self) {
        self.board.add_garbage_row(&mut self.rng);
        if let Some(current) = &mut self.current {
            if !self
                .board
                .is_valid_position(&current.shape, current.x, current.y)
            {
                current.y -= 1;
            }
        }
        self.update_ghost();
    }

    pub fn expand_board(&mut self, extra: i32) {
        let new_cols = (self.board.cols() as i32 + extra).max(1) as usize;
        self.resize_board(new_cols);
    }

    /// Change board width, shifting the active piece by the half-delta and
    /// recentering it if the shifted pose is invalid.
    pub fn resize_board(&mut self, new_cols: usize) {
        let diff = self.board.resize(new_cols);
        if diff == 0 {
            return;
        }
        if let Some(current) = &mut self.current {
            current.x += if diff > 0 {
                diff / 2
            } else {
                -(diff.unsigned_abs() as i32 / 2)
            };
            if !self
                .board
                .is_valid_position(&current.shape, current.x, current.y)
            {
                current.x = spawn_x(&current.shape, self.board.cols());
            }
        }
        self.update_ghost();
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

/// An engine is itself a valid attack target, used when applying received
/// attacks and in tests that wire two games directly.
impl AttackSink for Game {
    fn add_garbage_row(&mut self) {
        Game::add_garbage_row(self);
    }

    fn add_random_blocks(&mut self, count: u32) {
        Game::add_random_blocks(self, count);
    }

    fn expand_board(&mut self, extra: i32) {
        Game::expand_board(self, extra);
    }
}
