use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::auth::{AuthContext, Role};
use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_span};
use super::{Engine, EngineError};

impl Engine {
    // ── Reservation lifecycle ────────────────────────────────

    /// Create a reservation against a validated room + space pair. The room
    /// write lock is held across the conflict check and the commit, so two
    /// concurrent creates on the same room serialize.
    pub async fn create_reservation(
        &self,
        ctx: &AuthContext,
        room_id: Ulid,
        space_id: Ulid,
        span: Span,
    ) -> Result<ReservationInfo, EngineError> {
        validate_span(&span)?;
        if !self.store.contains_user(&ctx.caller_id) {
            return Err(EngineError::NotFound(ctx.caller_id));
        }
        if self.store.get_space(&space_id).is_none() {
            return Err(EngineError::NotFound(space_id));
        }
        let room = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let mut guard = room.write_owned().await;
        if guard.space_id != space_id {
            // The room exists but not under this space — the pair does not resolve.
            return Err(EngineError::NotFound(room_id));
        }
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }

        check_no_conflict(&guard, &span, None)?;

        let reservation = Reservation {
            id: Ulid::new(),
            user_id: ctx.caller_id,
            room_id,
            space_id,
            span,
            status: ReservationStatus::Active,
            shared_with: Vec::new(),
            reminder_sent: false,
            extension: ExtensionState::None,
        };
        let info = ReservationInfo::from(&reservation);
        guard.insert_reservation(reservation);
        self.store.map_reservation(info.id, room_id);
        drop(guard);

        self.scheduler.schedule(info.id).await;
        tracing::info!("reservation {} created on room {room_id}", info.id);
        Ok(info)
    }

    /// Patch the time window. When the start moves, the pending reminder job
    /// is cancelled and re-armed against the new start right after commit;
    /// a stale job that fires inside that window re-arms itself instead of
    /// delivering (see scheduler), and `initialize_reminders` recovers a
    /// job lost to a crash between commit and reschedule.
    pub async fn update_reservation(
        &self,
        ctx: &AuthContext,
        id: Ulid,
        new_start: Option<Ms>,
        new_end: Option<Ms>,
    ) -> Result<ReservationInfo, EngineError> {
        let (_room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let current = guard.get(id).ok_or(EngineError::NotFound(id))?;
        if !current.modifiable_by(ctx) {
            return Err(EngineError::Forbidden("not the owner of this reservation"));
        }
        if !current.is_active() {
            return Err(EngineError::InvalidState("reservation is cancelled"));
        }

        let span = Span::new(
            new_start.unwrap_or(current.span.start),
            new_end.unwrap_or(current.span.end),
        );
        validate_span(&span)?;
        check_no_conflict(&guard, &span, Some(id))?;

        let start_changed = span.start != current.span.start;
        let info = if start_changed {
            // Start is the sort key — remove, mutate, re-insert.
            let mut reservation = guard
                .remove_reservation(id)
                .ok_or(EngineError::NotFound(id))?;
            reservation.span = span;
            let info = ReservationInfo::from(&reservation);
            guard.insert_reservation(reservation);
            info
        } else {
            let reservation = guard.get_mut(id).ok_or(EngineError::NotFound(id))?;
            reservation.span = span;
            ReservationInfo::from(&*reservation)
        };
        drop(guard);

        if start_changed {
            self.scheduler.reschedule(id).await;
        }
        Ok(info)
    }

    /// Cancellation is terminal: the row stays (logical delete), conflict
    /// checks skip it, and any pending reminder job is dropped.
    pub async fn cancel_reservation(
        &self,
        ctx: &AuthContext,
        id: Ulid,
    ) -> Result<ReservationInfo, EngineError> {
        let (_room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let current = guard.get(id).ok_or(EngineError::NotFound(id))?;
        if !current.modifiable_by(ctx) {
            return Err(EngineError::Forbidden("not the owner of this reservation"));
        }
        if !current.is_active() {
            return Err(EngineError::InvalidState("reservation is already cancelled"));
        }

        let reservation = guard.get_mut(id).ok_or(EngineError::NotFound(id))?;
        reservation.status = ReservationStatus::Cancelled;
        let info = ReservationInfo::from(&*reservation);
        drop(guard);

        self.scheduler.cancel(&id);
        tracing::info!("reservation {id} cancelled");
        Ok(info)
    }

    // ── Sharing ──────────────────────────────────────────────

    /// Owner-only. The target gains read visibility and reminder delivery,
    /// never mutation rights.
    pub async fn share_reservation(
        &self,
        ctx: &AuthContext,
        id: Ulid,
        target_user_id: Ulid,
    ) -> Result<ReservationInfo, EngineError> {
        let (_room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let room_name = guard.name.clone();
        let current = guard.get(id).ok_or(EngineError::NotFound(id))?;
        if current.user_id != ctx.caller_id {
            return Err(EngineError::Forbidden("only the owner can share"));
        }
        if !current.is_active() {
            return Err(EngineError::InvalidState("reservation is cancelled"));
        }
        if self.store.get_user(&target_user_id).is_none() {
            return Err(EngineError::NotFound(target_user_id));
        }
        // The owner already has access and is never duplicated into the set.
        if target_user_id == current.user_id || current.shared_with.contains(&target_user_id) {
            return Err(EngineError::AlreadyShared(target_user_id));
        }
        if current.shared_with.len() >= MAX_SHARED_USERS {
            return Err(EngineError::LimitExceeded("too many shared users"));
        }

        let reservation = guard.get_mut(id).ok_or(EngineError::NotFound(id))?;
        reservation.shared_with.push(target_user_id);
        let info = ReservationInfo::from(&*reservation);
        drop(guard);

        let body = format!(
            "A reservation in {room_name} starting at {} was shared with you.",
            info.start
        );
        self.notify_user(&target_user_id, "Reservation shared with you", &body)
            .await;
        Ok(info)
    }

    /// Owner or admin. Removing an absent target is a no-op, not an error.
    pub async fn unshare_reservation(
        &self,
        ctx: &AuthContext,
        id: Ulid,
        target_user_id: Ulid,
    ) -> Result<ReservationInfo, EngineError> {
        let (_room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let room_name = guard.name.clone();
        let current = guard.get(id).ok_or(EngineError::NotFound(id))?;
        if !current.modifiable_by(ctx) {
            return Err(EngineError::Forbidden("not the owner of this reservation"));
        }

        let reservation = guard.get_mut(id).ok_or(EngineError::NotFound(id))?;
        let was_present = reservation.shared_with.contains(&target_user_id);
        reservation.shared_with.retain(|u| u != &target_user_id);
        let info = ReservationInfo::from(&*reservation);
        drop(guard);

        if was_present {
            let body = format!("Your access to a reservation in {room_name} was removed.");
            self.notify_user(&target_user_id, "Reservation access removed", &body)
                .await;
        }
        Ok(info)
    }

    // ── Extension negotiation ────────────────────────────────

    /// Owner or admin. Admin callers apply the new end immediately; user
    /// callers leave a pending request and every admin is notified. A second
    /// request while one is pending overwrites the pending one.
    pub async fn request_extension(
        &self,
        ctx: &AuthContext,
        id: Ulid,
        new_end: Ms,
    ) -> Result<ReservationInfo, EngineError> {
        let (_room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let current = guard.get(id).ok_or(EngineError::NotFound(id))?;
        if !current.modifiable_by(ctx) {
            return Err(EngineError::Forbidden("not the owner of this reservation"));
        }
        if !current.is_active() {
            return Err(EngineError::InvalidState("reservation is cancelled"));
        }
        if new_end <= current.span.end {
            return Err(EngineError::InvalidInterval(
                "new end must be after the current end",
            ));
        }
        validate_span(&Span::new(current.span.start, new_end))?;

        // Only the added tail can introduce new overlap.
        let window = Span::new(current.span.end, new_end);
        check_no_conflict(&guard, &window, Some(id))?;

        let owner_id = current.user_id;
        let reservation = guard.get_mut(id).ok_or(EngineError::NotFound(id))?;
        let info = if ctx.is_admin() {
            reservation.span.end = new_end;
            reservation.extension = ExtensionState::Approved;
            ReservationInfo::from(&*reservation)
        } else {
            reservation.extension = ExtensionState::Requested { new_end };
            ReservationInfo::from(&*reservation)
        };
        drop(guard);

        if ctx.is_admin() {
            let body = format!("Your reservation was extended to {new_end}.");
            self.notify_user(&owner_id, "Reservation extended", &body)
                .await;
        } else {
            let body = format!("Reservation {id} requests an extension to {new_end}.");
            for admin in self.store.admins() {
                self.notify_user(&admin.id, "Extension requested", &body)
                    .await;
            }
        }
        Ok(info)
    }

    /// Admin-only. Commits the pending end time. The conflict check runs
    /// again at commit time — another booking may have taken the window
    /// since the request was made.
    pub async fn approve_extension(
        &self,
        ctx: &AuthContext,
        id: Ulid,
    ) -> Result<ReservationInfo, EngineError> {
        if !ctx.is_admin() {
            return Err(EngineError::Forbidden("admin capability required"));
        }
        let (_room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let current = guard.get(id).ok_or(EngineError::NotFound(id))?;
        if !current.is_active() {
            return Err(EngineError::InvalidState("reservation is cancelled"));
        }
        let ExtensionState::Requested { new_end } = current.extension else {
            return Err(EngineError::InvalidState(
                "no extension requested for this reservation",
            ));
        };
        if new_end <= current.span.end {
            // The window moved past the request while it sat pending.
            return Err(EngineError::InvalidInterval(
                "pending end no longer extends the reservation",
            ));
        }
        let window = Span::new(current.span.end, new_end);
        check_no_conflict(&guard, &window, Some(id))?;

        let owner_id = current.user_id;
        let reservation = guard.get_mut(id).ok_or(EngineError::NotFound(id))?;
        reservation.span.end = new_end;
        reservation.extension = ExtensionState::Approved;
        let info = ReservationInfo::from(&*reservation);
        drop(guard);

        let body = format!("Your extension to {new_end} was approved.");
        self.notify_user(&owner_id, "Extension approved", &body)
            .await;
        Ok(info)
    }

    // ── Reminder recovery ────────────────────────────────────

    /// Admin-only restart recovery: drop every pending job, then re-scan
    /// and re-schedule all active, future, not-yet-reminded reservations.
    pub async fn initialize_reminders(&self, ctx: &AuthContext) -> Result<usize, EngineError> {
        if !ctx.is_admin() {
            return Err(EngineError::Forbidden("admin capability required"));
        }
        Ok(self.scheduler.initialize_all().await)
    }

    // ── Directory (admin) ────────────────────────────────────

    pub fn create_user(
        &self,
        ctx: &AuthContext,
        name: String,
        email: String,
        role: Role,
    ) -> Result<User, EngineError> {
        if !ctx.is_admin() {
            return Err(EngineError::Forbidden("admin capability required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("name too long"));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(EngineError::LimitExceeded("email too long"));
        }
        let user = User {
            id: Ulid::new(),
            name,
            email,
            role,
        };
        self.store.insert_user(user.clone());
        Ok(user)
    }

    pub fn create_space(
        &self,
        ctx: &AuthContext,
        name: String,
        address: Option<String>,
    ) -> Result<SpaceInfo, EngineError> {
        if !ctx.is_admin() {
            return Err(EngineError::Forbidden("admin capability required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("name too long"));
        }
        let space = Space {
            id: Ulid::new(),
            name,
            address,
            rooms: Vec::new(),
        };
        let info = SpaceInfo::from(&space);
        self.store.insert_space(space);
        Ok(info)
    }

    pub fn create_room(
        &self,
        ctx: &AuthContext,
        space_id: Ulid,
        name: String,
        capacity: Option<u32>,
        amenities: Vec<String>,
    ) -> Result<RoomInfo, EngineError> {
        if !ctx.is_admin() {
            return Err(EngineError::Forbidden("admin capability required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("name too long"));
        }
        if amenities.len() > MAX_AMENITIES {
            return Err(EngineError::LimitExceeded("too many amenities"));
        }
        let space = self
            .store
            .get_space(&space_id)
            .ok_or(EngineError::NotFound(space_id))?;
        if space.rooms.len() >= MAX_ROOMS_PER_SPACE {
            return Err(EngineError::LimitExceeded("too many rooms in space"));
        }

        let room = RoomState::new(Ulid::new(), space_id, name, capacity, amenities);
        let info = RoomInfo::from(&room);
        self.store
            .insert_room(room.id, Arc::new(RwLock::new(room)));
        self.store.add_room_to_space(&space_id, info.id);
        Ok(info)
    }
}
