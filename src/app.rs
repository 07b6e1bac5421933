use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::debug;

use crate::engine::{AttackAction, AttackSink, Game, GameEvent};
use crate::protocol::ServerMessage;
use crate::session::OnlineSession;
use crate::traits::{TraitId, TraitSystem};

pub const TRAIT_CHOICES: usize = 3;

/// Discrete player input, already mapped from whatever raw input source the
/// frontend uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Move(i32),
    Rotate(i32),
    SoftDrop,
    HardDrop,
    Hold,
    TogglePause,
    SelectTrait(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Solo,
    LocalVersus,
    Online,
}

type AttackQueue = Rc<RefCell<VecDeque<AttackAction>>>;

/// Local-versus attack sink: attacks accumulate in the other seat's inbox and
/// are applied at the next tick boundary, never mid-move.
struct QueueSink {
    inbox: AttackQueue,
}

impl AttackSink for QueueSink {
    fn add_garbage_row(&mut self) {
        self.inbox.borrow_mut().push_back(AttackAction::AddGarbageRow);
    }

    fn add_random_blocks(&mut self, count: u32) {
        self.inbox
            .borrow_mut()
            .push_back(AttackAction::AddRandomBlocks(count));
    }

    fn expand_board(&mut self, extra: i32) {
        self.inbox
            .borrow_mut()
            .push_back(AttackAction::ExpandBoard(extra));
    }
}

/// One player's slice of the application: simulation, acquired traits, and
/// the currently offered trait choices (non-empty only while a pick is due).
pub struct Seat {
    pub game: Game,
    pub traits: TraitSystem,
    pub offer: Vec<TraitId>,
}

impl Seat {
    fn new(game: Game) -> Self {
        Self {
            game,
            traits: TraitSystem::new(),
            offer: Vec::new(),
        }
    }
}

/// Mode-agnostic controller: owns the seats, routes commands and queued
/// attacks, turns engine events into trait offers and session traffic.
pub struct App {
    pub mode: Mode,
    pub seats: Vec<Seat>,
    inboxes: Vec<AttackQueue>,
    pub session: Option<OnlineSession>,
}

impl App {
    pub fn solo() -> Self {
        Self {
            mode: Mode::Solo,
            seats: vec![Seat::new(Game::new())],
            inboxes: vec![Rc::new(RefCell::new(VecDeque::new()))],
            session: None,
        }
    }

    /// Two seats wired to each other through queued attack inboxes.
    pub fn local_versus() -> Self {
        let inboxes: Vec<AttackQueue> = (0..2)
            .map(|_| Rc::new(RefCell::new(VecDeque::new())))
            .collect();
        let mut seats = vec![Seat::new(Game::new()), Seat::new(Game::new())];
        for (i, seat) in seats.iter_mut().enumerate() {
            seat.game.set_opponent(Box::new(QueueSink {
                inbox: inboxes[1 - i].clone(),
            }));
        }
        Self {
            mode: Mode::LocalVersus,
            seats,
            inboxes,
            session: None,
        }
    }

    /// One local seat whose attacks serialize into the session outbox; the
    /// opponent exists only as the session's remote mirror.
    pub fn online(session: OnlineSession) -> Self {
        let mut seat = Seat::new(Game::new());
        seat.game.set_opponent(Box::new(session.attack_sink()));
        Self {
            mode: Mode::Online,
            seats: vec![seat],
            inboxes: vec![Rc::new(RefCell::new(VecDeque::new()))],
            session: Some(session),
        }
    }

    #[cfg(test)]
    fn solo_seeded(seed: u64) -> Self {
        let mut app = Self::solo();
        app.seats[0].game = Game::with_seed(seed);
        app
    }

    /// Advance all seats by `dt` milliseconds, then apply queued attacks and
    /// react to the events each simulation raised.
    pub fn tick(&mut self, dt: f64) {
        for seat in &mut self.seats {
            seat.game.update(dt);
        }

        for (i, inbox) in self.inboxes.iter().enumerate() {
            loop {
                let action = inbox.borrow_mut().pop_front();
                match action {
                    Some(action) => self.seats[i].game.apply_attack(action),
                    None => break,
                }
            }
        }

        for seat in &mut self.seats {
            for event in seat.game.take_events() {
                match event {
                    GameEvent::TraitReady => {
                        seat.offer = seat.traits.get_choices(TRAIT_CHOICES);
                        if seat.offer.is_empty() {
                            // Nothing left to offer; resume without a pick.
                            seat.game.trait_pending = false;
                        }
                    }
                    GameEvent::GameOver | GameEvent::GameWon => {
                        debug!("seat finished: {event:?}");
                        if let Some(session) = &mut self.session {
                            session.send_game_over();
                        }
                    }
                    GameEvent::LinesCleared(_) => {}
                }
            }
        }

        if let Some(session) = &mut self.session {
            session.tick(dt, &self.seats[0].game);
        }
    }

    /// Apply one input to the given seat. Movement commands are dropped while
    /// that seat is paused, awaiting a trait pick, or finished.
    pub fn command(&mut self, seat_idx: usize, cmd: Command) {
        let Some(seat) = self.seats.get_mut(seat_idx) else {
            return;
        };
        match cmd {
            Command::Move(dx) => seat.game.move_piece(dx),
            Command::Rotate(dir) => seat.game.rotate(dir),
            Command::SoftDrop => seat.game.soft_drop(),
            Command::HardDrop => seat.game.hard_drop(),
            Command::Hold => {
                let before = seat.game.hold_used();
                seat.game.hold();
                if !before && seat.game.hold_used() {
                    seat.traits.on_hold_used(&mut seat.game);
                }
            }
            Command::TogglePause => self.toggle_pause(seat_idx),
            Command::SelectTrait(idx) => self.select_trait(seat_idx, idx),
        }
    }

    /// Pause is shared in local versus (both boards freeze together) and
    /// unavailable while a trait pick is pending or the game is over.
    fn toggle_pause(&mut self, seat_idx: usize) {
        let seat = &self.seats[seat_idx];
        if seat.game.trait_pending || seat.game.game_over {
            return;
        }
        let paused = !seat.game.paused;
        match self.mode {
            Mode::LocalVersus => {
                for seat in &mut self.seats {
                    seat.game.paused = paused;
                }
            }
            _ => self.seats[seat_idx].game.paused = paused,
        }
    }

    fn select_trait(&mut self, seat_idx: usize, choice: usize) {
        let seat = &mut self.seats[seat_idx];
        if !seat.game.trait_pending {
            return;
        }
        let Some(&id) = seat.offer.get(choice) else {
            return;
        };
        seat.traits.apply_trait(id, &mut seat.game);
        seat.offer.clear();
        seat.game.trait_pending = false;
        if let Some(session) = &mut self.session {
            session.send_trait_selected(id);
        }
    }

    /// Feed one decoded server message into the online session and seat 0.
    pub fn handle_server_message(&mut self, msg: ServerMessage) {
        if let Some(session) = &mut self.session {
            session.handle_message(msg, &mut self.seats[0].game);
        }
    }
}
