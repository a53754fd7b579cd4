mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use error::EngineError;
pub use store::InMemoryStore;

pub(crate) use conflict::now_ms;

use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;
use crate::notify::Notifier;
use crate::scheduler::ReminderScheduler;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// Reservation lifecycle engine: validates and commits lifecycle, sharing
/// and extension mutations, consulting the conflict check under each room's
/// write lock, and drives the reminder scheduler whenever an effective
/// start time changes.
pub struct Engine {
    pub store: Arc<InMemoryStore>,
    pub scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(notifier: Arc<dyn Notifier>, reminder_lead_ms: Ms) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let scheduler = Arc::new(ReminderScheduler::new(
            store.clone(),
            notifier.clone(),
            reminder_lead_ms,
        ));
        Self {
            store,
            scheduler,
            notifier,
        }
    }

    /// Lookup reservation → room, get room, acquire write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .store
            .room_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let room = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = room.write_owned().await;
        Ok((room_id, guard))
    }

    /// Best-effort notification to one user. Failures are logged, never
    /// propagated — notification is not transactional with state change.
    pub(super) async fn notify_user(&self, user_id: &Ulid, subject: &str, body: &str) {
        let Some(user) = self.store.get_user(user_id) else {
            tracing::warn!("notification skipped: user {user_id} not found");
            return;
        };
        if let Err(e) = self.notifier.notify(&user.email, subject, body).await {
            tracing::warn!("notification to {} failed: {e}", user.email);
            metrics::counter!(crate::observability::NOTIFY_FAILURES_TOTAL).increment(1);
        }
    }
}
