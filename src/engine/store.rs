use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::SharedRoomState;

/// Id-keyed record store backing the engine. Rooms are held behind
/// per-room `RwLock`s so "check overlap, then write" can be serialized
/// per room; the reservation index resolves a reservation id to its room
/// without scanning.
pub struct InMemoryStore {
    users: DashMap<Ulid, User>,
    spaces: DashMap<Ulid, Space>,
    rooms: DashMap<Ulid, SharedRoomState>,
    /// Reverse lookup: reservation id → room id.
    reservation_to_room: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            spaces: DashMap::new(),
            rooms: DashMap::new(),
            reservation_to_room: DashMap::new(),
        }
    }

    // ── Users ────────────────────────────────────────────────

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn contains_user(&self, id: &Ulid) -> bool {
        self.users.contains_key(id)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.users.iter().map(|e| e.value().clone()).collect()
    }

    /// Everyone with admin capability — the recipients of extension-request
    /// notifications.
    pub fn admins(&self) -> Vec<User> {
        self.users
            .iter()
            .filter(|e| e.value().role == crate::auth::Role::Admin)
            .map(|e| e.value().clone())
            .collect()
    }

    // ── Spaces ───────────────────────────────────────────────

    pub fn insert_space(&self, space: Space) {
        self.spaces.insert(space.id, space);
    }

    pub fn get_space(&self, id: &Ulid) -> Option<Space> {
        self.spaces.get(id).map(|e| e.value().clone())
    }

    pub fn list_spaces(&self) -> Vec<Space> {
        self.spaces.iter().map(|e| e.value().clone()).collect()
    }

    /// Append a room to the space's back-reference list.
    pub fn add_room_to_space(&self, space_id: &Ulid, room_id: Ulid) {
        if let Some(mut space) = self.spaces.get_mut(space_id) {
            space.rooms.push(room_id);
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn insert_room(&self, id: Ulid, state: SharedRoomState) {
        self.rooms.insert(id, state);
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_ids(&self) -> Vec<Ulid> {
        self.rooms.iter().map(|e| *e.key()).collect()
    }

    // ── Reservation index ────────────────────────────────────

    pub fn map_reservation(&self, reservation_id: Ulid, room_id: Ulid) {
        self.reservation_to_room.insert(reservation_id, room_id);
    }

    pub fn room_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_room
            .get(reservation_id)
            .map(|e| *e.value())
    }
}
