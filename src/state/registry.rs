use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
};

use crate::{
    dto::{phase::VisibleRoomStatus, room::RoomSummary, validation::ROOM_CODE_LENGTH},
    state::room::Room,
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Mutable part of a registered room, guarded by the handle's mutex.
pub struct RoomSlot {
    /// The room aggregate.
    pub room: Room,
    /// Pending question timer or results delay, if any.
    pub round_timer: Option<JoinHandle<()>>,
    /// Set once every player left; late timer tasks must do nothing.
    pub dissolved: bool,
}

impl RoomSlot {
    /// Replace the pending timer, aborting the previous one.
    pub fn set_round_timer(&mut self, handle: JoinHandle<()>) {
        self.cancel_round_timer();
        self.round_timer = Some(handle);
    }

    /// Abort the pending timer, if any.
    pub fn cancel_round_timer(&mut self) {
        if let Some(handle) = self.round_timer.take() {
            handle.abort();
        }
    }

    /// Forget the pending timer without aborting it. Called from the timer
    /// task itself once it fired.
    pub fn detach_round_timer(&mut self) {
        self.round_timer = None;
    }
}

/// Shared handle on one room. Every mutation goes through [`RoomHandle::lock`].
pub struct RoomHandle {
    code: String,
    slot: Mutex<RoomSlot>,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        Self {
            code: room.id().to_owned(),
            slot: Mutex::new(RoomSlot {
                room,
                round_timer: None,
                dissolved: false,
            }),
        }
    }

    /// Room code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Acquire exclusive access to the room.
    pub async fn lock(&self) -> MutexGuard<'_, RoomSlot> {
        self.slot.lock().await
    }
}

/// Process-wide index of live rooms keyed by code.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<RoomHandle>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room built by `build` under a fresh code.
    pub fn create(&self, build: impl FnOnce(String) -> Room) -> Arc<RoomHandle> {
        loop {
            let code = generate_room_code();
            if let Entry::Vacant(vacant) = self.rooms.entry(code.clone()) {
                let handle = Arc::new(RoomHandle::new(build(code)));
                vacant.insert(handle.clone());
                return handle;
            }
        }
    }

    /// Look a room up by normalized code.
    pub fn get(&self, code: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Remove a room; returns whether it was still registered.
    pub fn remove(&self, code: &str) -> bool {
        self.rooms.remove(code).is_some()
    }

    /// Remove `handle` only if its code still designates it, so a late cleanup
    /// never drops a newer room that reused the code.
    pub fn remove_handle(&self, handle: &Arc<RoomHandle>) -> bool {
        self.rooms
            .remove_if(handle.code(), |_, registered| Arc::ptr_eq(registered, handle))
            .is_some()
    }

    /// Number of registered rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is registered.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Summaries of rooms still accepting players, oldest first.
    pub async fn list_waiting(&self) -> Vec<RoomSummary> {
        let handles: Vec<Arc<RoomHandle>> =
            self.rooms.iter().map(|entry| entry.value().clone()).collect();

        let mut waiting = Vec::new();
        for handle in handles {
            let slot = handle.lock().await;
            if !slot.dissolved && slot.room.status() == VisibleRoomStatus::Waiting {
                waiting.push((slot.room.created_at(), slot.room.summary()));
            }
        }
        waiting.sort_by_key(|(created_at, _)| *created_at);
        waiting.into_iter().map(|(_, summary)| summary).collect()
    }
}

/// Random uppercase alphanumeric room code.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
