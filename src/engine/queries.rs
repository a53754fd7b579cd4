use ulid::Ulid;

use crate::auth::AuthContext;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Visible to the owner, any admin, or anyone in `shared_with`.
    pub async fn get_reservation(
        &self,
        ctx: &AuthContext,
        id: Ulid,
    ) -> Result<ReservationInfo, EngineError> {
        let room_id = self
            .store
            .room_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let room = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = room.read().await;
        let reservation = guard.get(id).ok_or(EngineError::NotFound(id))?;
        if !reservation.visible_to(ctx) {
            return Err(EngineError::Forbidden(
                "not authorized to view this reservation",
            ));
        }
        Ok(ReservationInfo::from(reservation))
    }

    /// Admins see everything; users see what they own plus what is shared
    /// with them.
    pub async fn list_reservations(&self, ctx: &AuthContext) -> Vec<ReservationInfo> {
        let mut out = Vec::new();
        for room_id in self.store.room_ids() {
            let Some(room) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = room.read().await;
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.visible_to(ctx))
                    .map(ReservationInfo::from),
            );
        }
        out.sort_by_key(|r| (r.start, r.id));
        out
    }

    pub fn get_space(&self, id: Ulid) -> Result<SpaceInfo, EngineError> {
        self.store
            .get_space(&id)
            .map(|s| SpaceInfo::from(&s))
            .ok_or(EngineError::NotFound(id))
    }

    pub fn list_spaces(&self) -> Vec<SpaceInfo> {
        let mut spaces: Vec<SpaceInfo> = self
            .store
            .list_spaces()
            .iter()
            .map(SpaceInfo::from)
            .collect();
        spaces.sort_by_key(|s| s.id);
        spaces
    }

    pub async fn get_room(&self, id: Ulid) -> Result<RoomInfo, EngineError> {
        let room = self.store.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let guard = room.read().await;
        Ok(RoomInfo::from(&*guard))
    }

    pub async fn list_rooms(&self, space_id: Ulid) -> Result<Vec<RoomInfo>, EngineError> {
        let space = self
            .store
            .get_space(&space_id)
            .ok_or(EngineError::NotFound(space_id))?;
        let mut rooms = Vec::with_capacity(space.rooms.len());
        for room_id in &space.rooms {
            let Some(room) = self.store.get_room(room_id) else {
                continue;
            };
            let guard = room.read().await;
            rooms.push(RoomInfo::from(&*guard));
        }
        Ok(rooms)
    }

    pub fn list_users(&self, ctx: &AuthContext) -> Result<Vec<User>, EngineError> {
        if !ctx.is_admin() {
            return Err(EngineError::Forbidden("admin capability required"));
        }
        let mut users = self.store.list_users();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}
