use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::auth::{AuthContext, Role};

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// A registered account. Role mirrors the capability the auth boundary
/// reports for this user; it is what "notify all admins" scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// A co-working site containing rooms. `rooms` is a back-reference kept in
/// sync by room creation; the rooms map is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: Ulid,
    pub name: String,
    pub address: Option<String>,
    pub rooms: Vec<Ulid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Cancelled,
}

/// Extension negotiation state. `Approved` can only be reached through
/// `Requested`, so "approved implies previously requested" holds by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExtensionState {
    None,
    Requested { new_end: Ms },
    Approved,
}

/// A time-bound claim on one room by one owning user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub user_id: Ulid,
    pub room_id: Ulid,
    pub space_id: Ulid,
    pub span: Span,
    pub status: ReservationStatus,
    /// Users granted read + reminder access. Never contains the owner.
    pub shared_with: Vec<Ulid>,
    pub reminder_sent: bool,
    pub extension: ExtensionState,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    pub fn visible_to(&self, ctx: &AuthContext) -> bool {
        ctx.is_admin() || self.user_id == ctx.caller_id || self.shared_with.contains(&ctx.caller_id)
    }

    /// Shared users gain visibility, never mutation rights.
    pub fn modifiable_by(&self, ctx: &AuthContext) -> bool {
        ctx.is_admin() || self.user_id == ctx.caller_id
    }
}

/// Per-room state: the room's own attributes plus every reservation ever
/// made on it, sorted by `span.start`. Cancelled rows stay (logical delete)
/// and are skipped by the conflict scan. Authoritative for scheduling.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub space_id: Ulid,
    pub name: String,
    pub capacity: Option<u32>,
    pub amenities: Vec<String>,
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(
        id: Ulid,
        space_id: Ulid,
        name: String,
        capacity: Option<u32>,
        amenities: Vec<String>,
    ) -> Self {
        Self {
            id,
            space_id,
            name,
            capacity,
            amenities,
            reservations: Vec::new(),
        }
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Remove by id. Used when a mutation moves `span.start` (remove,
    /// mutate, re-insert keeps the order invariant).
    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        if let Some(pos) = self.reservations.iter().position(|r| r.id == id) {
            Some(self.reservations.remove(pos))
        } else {
            None
        }
    }

    pub fn get(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip rows starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}

// ── Query result types ───────────────────────────────────────────

/// Owned snapshot of a reservation, safe to hand out after the room lock
/// is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationInfo {
    pub id: Ulid,
    pub user_id: Ulid,
    pub room_id: Ulid,
    pub space_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub status: ReservationStatus,
    pub shared_with: Vec<Ulid>,
    pub reminder_sent: bool,
    pub extension: ExtensionState,
}

impl From<&Reservation> for ReservationInfo {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            room_id: r.room_id,
            space_id: r.space_id,
            start: r.span.start,
            end: r.span.end,
            status: r.status,
            shared_with: r.shared_with.clone(),
            reminder_sent: r.reminder_sent,
            extension: r.extension,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Ulid,
    pub space_id: Ulid,
    pub name: String,
    pub capacity: Option<u32>,
    pub amenities: Vec<String>,
}

impl From<&RoomState> for RoomInfo {
    fn from(rs: &RoomState) -> Self {
        Self {
            id: rs.id,
            space_id: rs.space_id,
            name: rs.name.clone(),
            capacity: rs.capacity,
            amenities: rs.amenities.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub id: Ulid,
    pub name: String,
    pub address: Option<String>,
    pub rooms: Vec<Ulid>,
}

impl From<&Space> for SpaceInfo {
    fn from(s: &Space) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            address: s.address.clone(),
            rooms: s.rooms.clone(),
        }
    }
}
