use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{AttackAction, AttackSink, Game};
use crate::protocol::{ClientMessage, SYNC_INTERVAL_MS, ServerMessage, StateSnapshot, decode_attack};
use crate::remote::RemoteMirror;
use crate::traits::TraitId;

/// Attack sink that serializes calls onto the wire instead of mutating a
/// board. The outbox is shared with the owning session.
pub struct WireAttackSink {
    outbox: Rc<RefCell<Vec<ClientMessage>>>,
}

impl AttackSink for WireAttackSink {
    fn add_garbage_row(&mut self) {
        self.push(AttackAction::AddGarbageRow);
    }

    fn add_random_blocks(&mut self, count: u32) {
        self.push(AttackAction::AddRandomBlocks(count));
    }

    fn expand_board(&mut self, extra: i32) {
        self.push(AttackAction::ExpandBoard(extra));
    }
}

impl WireAttackSink {
    fn push(&mut self, action: AttackAction) {
        self.outbox.borrow_mut().push(ClientMessage::attack(action));
    }
}

/// Client side of a networked match: queues outbound messages for the
/// transport, broadcasts state snapshots on a fixed cadence, and dispatches
/// inbound messages into the local engine and the remote mirror.
///
/// Transport-agnostic: the owner pumps `take_outbox` onto its connection and
/// feeds received `ServerMessage`s back through `handle_message`.
pub struct OnlineSession {
    pub room_code: Option<String>,
    pub player_number: Option<u8>,
    pub mirror: RemoteMirror,
    pub remote_traits: Vec<TraitId>,
    pub opponent_joined: bool,
    pub game_started: bool,
    pub opponent_game_over: bool,
    pub opponent_disconnected: bool,
    pub last_error: Option<String>,
    sync_timer: f64,
    game_over_sent: bool,
    outbox: Rc<RefCell<Vec<ClientMessage>>>,
}

impl OnlineSession {
    pub fn new() -> Self {
        Self {
            room_code: None,
            player_number: None,
            mirror: RemoteMirror::new(),
            remote_traits: Vec::new(),
            opponent_joined: false,
            game_started: false,
            opponent_game_over: false,
            opponent_disconnected: false,
            last_error: None,
            sync_timer: 0.0,
            game_over_sent: false,
            outbox: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Sink handed to the local engine so its attacks go out on the wire.
    pub fn attack_sink(&self) -> WireAttackSink {
        WireAttackSink {
            outbox: self.outbox.clone(),
        }
    }

    pub fn create_room(&mut self) {
        self.queue(ClientMessage::CreateRoom);
    }

    pub fn join_room(&mut self, code: &str) {
        self.queue(ClientMessage::JoinRoom {
            code: code.trim().to_uppercase(),
        });
    }

    pub fn send_ready(&mut self) {
        self.queue(ClientMessage::Ready);
    }

    pub fn send_trait_selected(&mut self, trait_id: TraitId) {
        self.queue(ClientMessage::TraitSelected { trait_id });
    }

    /// Sent exactly once, on either loss or win; the peer treats it as "the
    /// opponent finished".
    pub fn send_game_over(&mut self) {
        if !self.game_over_sent {
            self.game_over_sent = true;
            self.queue(ClientMessage::GameOver);
        }
    }

    /// Queue a state broadcast every `SYNC_INTERVAL_MS`, independent of the
    /// engine tick rate. Stops once the local game is over.
    pub fn tick(&mut self, dt: f64, game: &Game) {
        if game.game_over {
            return;
        }
        self.sync_timer += dt;
        while self.sync_timer >= SYNC_INTERVAL_MS {
            self.sync_timer -= SYNC_INTERVAL_MS;
            self.queue(ClientMessage::StateUpdate {
                data: StateSnapshot::capture(game),
            });
        }
    }

    /// Dispatch one inbound message. Attacks are authoritative local
    /// mutations; state updates only feed the display mirror.
    pub fn handle_message(&mut self, msg: ServerMessage, game: &mut Game) {
        match msg {
            ServerMessage::RoomCreated { code } => self.room_code = Some(code),
            ServerMessage::PlayerJoined { player_number } => {
                self.player_number = Some(player_number);
            }
            ServerMessage::OpponentJoined => self.opponent_joined = true,
            ServerMessage::GameStart => self.game_started = true,
            ServerMessage::OpponentDisconnected => self.opponent_disconnected = true,
            ServerMessage::Error { message } => self.last_error = Some(message),
            ServerMessage::StateUpdate { data } => self.mirror.apply(data),
            ServerMessage::Attack { action, args } => {
                if let Some(action) = decode_attack(action, &args) {
                    game.apply_attack(action);
                }
            }
            ServerMessage::GameOver => self.opponent_game_over = true,
            ServerMessage::TraitSelected { trait_id } => self.remote_traits.push(trait_id),
        }
    }

    pub fn take_outbox(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    fn queue(&mut self, msg: ClientMessage) {
        self.outbox.borrow_mut().push(msg);
    }
}

impl Default for OnlineSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AttackAction;

    #[test]
    fn broadcasts_on_fixed_interval() {
        let mut session = OnlineSession::new();
        let game = Game::with_seed(5);
        session.tick(99.0, &game);
        assert!(session.take_outbox().is_empty());
        session.tick(1.0, &game);
        let out = session.take_outbox();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], ClientMessage::StateUpdate { .. }));
        // 250 ms of accumulated time yields two broadcasts, remainder carries.
        session.tick(250.0, &game);
        assert_eq!(session.take_outbox().len(), 2);
    }

    #[test]
    fn broadcast_stops_after_local_game_over() {
        let mut session = OnlineSession::new();
        let mut game = Game::with_seed(5);
        game.game_over = true;
        session.tick(1000.0, &game);
        assert!(session.take_outbox().is_empty());
    }

    #[test]
    fn engine_attacks_are_serialized_exactly_once() {
        let mut session = OnlineSession::new();
        let mut game = Game::with_seed(5);
        game.set_opponent(Box::new(session.attack_sink()));
        assert!(game.attack_opponent(AttackAction::AddRandomBlocks(2)));
        let out = session.take_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], ClientMessage::attack(AttackAction::AddRandomBlocks(2)));
        assert!(session.take_outbox().is_empty());
    }

    #[test]
    fn received_attack_mutates_local_board() {
        let mut session = OnlineSession::new();
        let mut game = Game::with_seed(5);
        game.current = None;
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"attack","action":"addGarbageRow","args":[]}"#)
                .unwrap();
        session.handle_message(msg, &mut game);
        assert_eq!(game.board.occupied_rows(), 1);
    }

    #[test]
    fn state_update_feeds_mirror_not_engine() {
        let mut session = OnlineSession::new();
        let mut game = Game::with_seed(5);
        let mut peer = Game::with_seed(6);
        peer.score = 777;
        let snap = StateSnapshot::capture(&peer);
        session.handle_message(ServerMessage::StateUpdate { data: snap }, &mut game);
        assert_eq!(session.mirror.score, 777);
        assert_eq!(game.score, 0);
    }

    #[test]
    fn game_over_is_sent_at_most_once() {
        let mut session = OnlineSession::new();
        session.send_game_over();
        session.send_game_over();
        assert_eq!(session.take_outbox().len(), 1);
    }

    #[test]
    fn join_code_is_normalized() {
        let mut session = OnlineSession::new();
        session.join_room("  abc234 ");
        assert_eq!(
            session.take_outbox(),
            vec![ClientMessage::JoinRoom {
                code: "ABC234".into()
            }]
        );
    }

    #[test]
    fn remote_trait_selections_accumulate_in_order() {
        let mut session = OnlineSession::new();
        let mut game = Game::with_seed(5);
        session.handle_message(
            ServerMessage::TraitSelected {
                trait_id: TraitId::Chaos,
            },
            &mut game,
        );
        session.handle_message(
            ServerMessage::TraitSelected {
                trait_id: TraitId::Gambler,
            },
            &mut game,
        );
        assert_eq!(session.remote_traits, vec![TraitId::Chaos, TraitId::Gambler]);
    }
}
