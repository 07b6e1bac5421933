use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use log::info;
use rand::Rng;
use rand::thread_rng;
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::ServerMessage;

/// Ambiguity-reduced room code alphabet (no 0/O, 1/I or lookalikes).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;

pub const WAITING_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const FINISHED_TIMEOUT: Duration = Duration::from_secs(60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub type ConnId = u64;
/// Per-connection outbound channel; the socket task drains it onto the wire.
pub type PeerSender = UnboundedSender<String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    Playing,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinError {
    NotFound,
    AlreadyStarted,
    Full,
}

impl JoinError {
    /// Client-facing error text, sent back on the requesting connection only.
    pub fn message(self) -> &'static str {
        match self {
            JoinError::NotFound => "Room not found",
            JoinError::AlreadyStarted => "Game already started",
            JoinError::Full => "Room is full",
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

struct Occupant {
    conn: ConnId,
    tx: PeerSender,
}

struct Room {
    code: String,
    slots: [Option<Occupant>; 2],
    state: RoomState,
    ready_count: u8,
    created_at: Instant,
    finished_at: Option<Instant>,
}

impl Room {
    fn other_occupant(&self, conn: ConnId) -> Option<&Occupant> {
        self.slots
            .iter()
            .flatten()
            .find(|occupant| occupant.conn != conn)
    }
}

/// All active rooms plus the connection-to-room index. Accessed from a single
/// logical event loop (the server wraps it in one async mutex); methods are
/// synchronous and never block.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    members: HashMap<ConnId, String>,
}

fn send(tx: &PeerSender, msg: &ServerMessage) {
    if let Ok(json) = serde_json::to_string(msg) {
        // A failed send means the peer is gone; disconnect cleanup follows.
        let _ = tx.send(json);
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn state_of(&self, code: &str) -> Option<RoomState> {
        self.rooms.get(code).map(|room| room.state)
    }

    fn generate_code(&self) -> String {
        let mut rng = thread_rng();
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Open a new room with the caller in slot 1. Announces `room_created`
    /// and `player_joined{1}` on the caller's channel.
    pub fn create_room(&mut self, conn: ConnId, tx: PeerSender, now: Instant) -> String {
        let code = self.generate_code();
        send(&tx, &ServerMessage::RoomCreated { code: code.clone() });
        send(&tx, &ServerMessage::PlayerJoined { player_number: 1 });
        let room = Room {
            code: code.clone(),
            slots: [Some(Occupant { conn, tx }), None],
            state: RoomState::Waiting,
            ready_count: 0,
            created_at: now,
            finished_at: None,
        };
        self.rooms.insert(code.clone(), room);
        self.members.insert(conn, code.clone());
        info!("room {code} created");
        code
    }

    /// Fill slot 2 of an existing room. Distinct errors for a missing room,
    /// a started game, and a full room; errors go to the requester only and
    /// leave the registry untouched.
    pub fn join_room(
        &mut self,
        conn: ConnId,
        code: &str,
        tx: PeerSender,
    ) -> Result<(), JoinError> {
        let code = code.trim().to_uppercase();
        let result = match self.rooms.get_mut(&code) {
            None => Err(JoinError::NotFound),
            Some(room) if room.state != RoomState::Waiting => Err(JoinError::AlreadyStarted),
            Some(room) if room.slots[1].is_some() => Err(JoinError::Full),
            Some(room) => {
                send(&tx, &ServerMessage::PlayerJoined { player_number: 2 });
                if let Some(host) = &room.slots[0] {
                    send(&host.tx, &ServerMessage::OpponentJoined);
                }
                send(&tx, &ServerMessage::OpponentJoined);
                room.slots[1] = Some(Occupant { conn, tx: tx.clone() });
                Ok(())
            }
        };
        match result {
            Ok(()) => {
                self.members.insert(conn, code.clone());
                info!("room {code}: player 2 joined");
                Ok(())
            }
            Err(err) => {
                send(
                    &tx,
                    &ServerMessage::Error {
                        message: err.message().to_string(),
                    },
                );
                Err(err)
            }
        }
    }

    /// Second `ready` in a waiting room starts the game for both sides.
    pub fn ready(&mut self, conn: ConnId) {
        let Some(room) = self.room_of_mut(conn) else {
            return;
        };
        room.ready_count += 1;
        if room.ready_count >= 2 && room.state == RoomState::Waiting {
            room.state = RoomState::Playing;
            for occupant in room.slots.iter().flatten() {
                send(&occupant.tx, &ServerMessage::GameStart);
            }
            info!("room {}: game started", room.code);
        }
    }

    /// Forward a raw message, unmodified, to the other occupant of the
    /// sender's room. The payload is never interpreted here.
    pub fn relay(&self, conn: ConnId, raw: &str) {
        let Some(room) = self.room_of(conn) else {
            return;
        };
        if let Some(other) = room.other_occupant(conn) {
            let _ = other.tx.send(raw.to_string());
        }
    }

    /// A relayed `game_over` transitions the room to `finished` so the sweep
    /// can reclaim it; the message itself still travels verbatim.
    pub fn mark_finished(&mut self, conn: ConnId, now: Instant) {
        if let Some(room) = self.room_of_mut(conn) {
            if room.state == RoomState::Playing {
                room.state = RoomState::Finished;
                room.finished_at = Some(now);
                info!("room {}: finished", room.code);
            }
        }
    }

    /// Notify the other occupant and delete the room immediately. There is no
    /// reconnection grace period; a dropped socket ends the match.
    pub fn disconnect(&mut self, conn: ConnId) {
        let Some(code) = self.members.remove(&conn) else {
            return;
        };
        let Some(room) = self.rooms.remove(&code) else {
            return;
        };
        for occupant in room.slots.iter().flatten() {
            if occupant.conn != conn {
                send(&occupant.tx, &ServerMessage::OpponentDisconnected);
                self.members.remove(&occupant.conn);
            }
        }
        info!("room {code}: closed (player disconnected)");
    }

    /// Periodic reclamation: waiting rooms past their timeout are force-closed
    /// with an error notice; finished rooms past theirs are dropped silently.
    pub fn sweep(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .rooms
            .values()
            .filter(|room| match room.state {
                RoomState::Waiting => now.duration_since(room.created_at) > WAITING_TIMEOUT,
                RoomState::Finished => room
                    .finished_at
                    .is_some_and(|at| now.duration_since(at) > FINISHED_TIMEOUT),
                RoomState::Playing => false,
            })
            .map(|room| room.code.clone())
            .collect();
        for code in expired {
            if let Some(room) = self.rooms.remove(&code) {
                for occupant in room.slots.iter().flatten() {
                    if room.state == RoomState::Waiting {
                        send(
                            &occupant.tx,
                            &ServerMessage::Error {
                                message: "Room timed out".to_string(),
                            },
                        );
                    }
                    self.members.remove(&occupant.conn);
                }
                info!("room {code}: timed out ({:?})", room.state);
            }
        }
    }

    fn room_of(&self, conn: ConnId) -> Option<&Room> {
        self.rooms.get(self.members.get(&conn)?)
    }

    fn room_of_mut(&mut self, conn: ConnId) -> Option<&mut Room> {
        let code = self.members.get(&conn)?.clone();
        self.rooms.get_mut(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    fn peer() -> (PeerSender, UnboundedReceiver<String>) {
        unbounded_channel()
    }

    fn recv_type(rx: &mut UnboundedReceiver<String>) -> String {
        let raw = rx.try_recv().expect("expected a message");
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["type"].as_str().unwrap_or_default().to_string()
    }

    fn paired_room(registry: &mut RoomRegistry) -> (String, UnboundedReceiver<String>, UnboundedReceiver<String>) {
        let (tx1, mut rx1) = peer();
        let (tx2, mut rx2) = peer();
        let code = registry.create_room(1, tx1, Instant::now());
        registry.join_room(2, &code, tx2).unwrap();
        // Drain the lobby handshake.
        while rx1.try_recv().is_ok() {}
        while rx2.try_recv().is_ok() {}
        (code, rx1, rx2)
    }

    #[test]
    fn create_room_announces_code_and_slot() {
        let mut registry = RoomRegistry::new();
        let (tx, mut rx) = peer();
        let code = registry.create_room(1, tx, Instant::now());
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(recv_type(&mut rx), "room_created");
        assert_eq!(recv_type(&mut rx), "player_joined");
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn join_unknown_code_errors_without_registry_change() {
        let mut registry = RoomRegistry::new();
        let (tx0, _rx0) = peer();
        registry.create_room(1, tx0, Instant::now());
        let (tx, mut rx) = peer();
        let err = registry.join_room(2, "ZZZZZZ", tx).unwrap_err();
        assert_eq!(err, JoinError::NotFound);
        let raw = rx.try_recv().unwrap();
        assert!(raw.contains("Room not found"));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn join_errors_are_distinct_per_condition() {
        let mut registry = RoomRegistry::new();
        let (tx1, _rx1) = peer();
        let code = registry.create_room(1, tx1, Instant::now());

        let (tx2, _rx2) = peer();
        registry.join_room(2, &code, tx2).unwrap();
        let (tx3, _rx3) = peer();
        assert_eq!(registry.join_room(3, &code, tx3).unwrap_err(), JoinError::Full);

        registry.ready(1);
        registry.ready(2);
        // Room is playing; any further join reports a started game. Full is
        // shadowed by AlreadyStarted, matching the check order.
        let (tx4, _rx4) = peer();
        assert_eq!(
            registry.join_room(4, &code, tx4).unwrap_err(),
            JoinError::AlreadyStarted
        );
    }

    #[test]
    fn join_code_is_case_insensitive() {
        let mut registry = RoomRegistry::new();
        let (tx1, _rx1) = peer();
        let code = registry.create_room(1, tx1, Instant::now());
        let (tx2, _rx2) = peer();
        assert!(registry.join_room(2, &code.to_lowercase(), tx2).is_ok());
    }

    #[test]
    fn join_notifies_both_sides() {
        let mut registry = RoomRegistry::new();
        let (tx1, mut rx1) = peer();
        let code = registry.create_room(1, tx1, Instant::now());
        recv_type(&mut rx1);
        recv_type(&mut rx1);
        let (tx2, mut rx2) = peer();
        registry.join_room(2, &code, tx2).unwrap();
        assert_eq!(recv_type(&mut rx2), "player_joined");
        assert_eq!(recv_type(&mut rx1), "opponent_joined");
        assert_eq!(recv_type(&mut rx2), "opponent_joined");
    }

    #[test]
    fn both_ready_starts_the_game_once() {
        let mut registry = RoomRegistry::new();
        let (code, mut rx1, mut rx2) = paired_room(&mut registry);
        registry.ready(1);
        assert!(rx1.try_recv().is_err());
        registry.ready(2);
        assert_eq!(recv_type(&mut rx1), "game_start");
        assert_eq!(recv_type(&mut rx2), "game_start");
        registry.ready(1);
        assert!(rx1.try_recv().is_err(), "game_start must not repeat");
        assert_eq!(registry.state_of(&code), Some(RoomState::Playing));
    }

    #[test]
    fn relay_forwards_raw_text_verbatim() {
        let mut registry = RoomRegistry::new();
        let (_code, mut rx1, mut rx2) = paired_room(&mut registry);
        let raw = r#"{"type":"state_update","data":{"garbled":"whatever"}}"#;
        registry.relay(1, raw);
        assert_eq!(rx2.try_recv().unwrap(), raw);
        registry.relay(2, "anything at all");
        assert_eq!(rx1.try_recv().unwrap(), "anything at all");
    }

    #[test]
    fn disconnect_notifies_peer_and_deletes_room() {
        let mut registry = RoomRegistry::new();
        let (_code, _rx1, mut rx2) = paired_room(&mut registry);
        registry.disconnect(1);
        assert_eq!(recv_type(&mut rx2), "opponent_disconnected");
        assert_eq!(registry.room_count(), 0);
        // Idempotent for the already-removed peer.
        registry.disconnect(2);
    }

    #[test]
    fn sweep_expires_stale_waiting_rooms_with_notice() {
        let mut registry = RoomRegistry::new();
        let (tx, mut rx) = peer();
        let created = Instant::now();
        registry.create_room(1, tx, created);
        recv_type(&mut rx);
        recv_type(&mut rx);
        registry.sweep(created + WAITING_TIMEOUT);
        assert_eq!(registry.room_count(), 1, "not yet past the timeout");
        registry.sweep(created + WAITING_TIMEOUT + Duration::from_secs(1));
        assert_eq!(registry.room_count(), 0);
        let raw = rx.try_recv().unwrap();
        assert!(raw.contains("Room timed out"));
    }

    #[test]
    fn game_over_marks_room_finished_and_sweep_reclaims_it() {
        let mut registry = RoomRegistry::new();
        let (code, _rx1, _rx2) = paired_room(&mut registry);
        registry.ready(1);
        registry.ready(2);
        let finished = Instant::now();
        registry.mark_finished(1, finished);
        assert_eq!(registry.state_of(&code), Some(RoomState::Finished));
        registry.sweep(finished + FINISHED_TIMEOUT + Duration::from_secs(1));
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn playing_rooms_never_expire_by_age() {
        let mut registry = RoomRegistry::new();
        let (_code, _rx1, _rx2) = paired_room(&mut registry);
        registry.ready(1);
        registry.ready(2);
        registry.sweep(Instant::now() + WAITING_TIMEOUT * 10);
        assert_eq!(registry.room_count(), 1);
    }
}
