use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use ulid::Ulid;

use crate::engine::{InMemoryStore, now_ms};
use crate::model::*;
use crate::notify::Notifier;
use crate::observability;

/// Default reminder lead: one hour before start.
pub const DEFAULT_REMINDER_LEAD_MS: Ms = 3_600_000;

struct ReminderJob {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Owned snapshot of everything delivery needs, taken under the room's
/// read lock and released before any sending happens.
struct ReminderTarget {
    room_id: Ulid,
    room_name: String,
    owner_id: Ulid,
    shared_with: Vec<Ulid>,
    span: Span,
    active: bool,
    reminder_sent: bool,
}

/// Time-based reminder jobs, keyed by reservation id — at most one pending
/// job per reservation. Jobs are generation-tagged so a finished task only
/// removes its own table entry and a cancel/reschedule racing a live task
/// can never strand or duplicate a job.
pub struct ReminderScheduler {
    store: Arc<InMemoryStore>,
    notifier: Arc<dyn Notifier>,
    lead_ms: Ms,
    jobs: DashMap<Ulid, ReminderJob>,
    generation: AtomicU64,
}

impl ReminderScheduler {
    pub fn new(store: Arc<InMemoryStore>, notifier: Arc<dyn Notifier>, lead_ms: Ms) -> Self {
        Self {
            store,
            notifier,
            lead_ms,
            jobs: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of pending deferred jobs. Diagnostic only.
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Compute the fire time for the reservation and either deliver right
    /// away (fire time already past) or register a deferred job. No-op for
    /// cancelled, already-reminded, or vanished reservations.
    pub async fn schedule(self: &Arc<Self>, reservation_id: Ulid) {
        let Some(target) = self.snapshot(reservation_id).await else {
            tracing::debug!("schedule skip {reservation_id}: not found");
            return;
        };
        if !target.active || target.reminder_sent {
            return;
        }
        let fire = target.span.start - self.lead_ms;
        let now = now_ms();
        if fire <= now {
            self.deliver(reservation_id).await;
        } else {
            self.arm(reservation_id, fire - now);
        }
    }

    /// Remove any pending job for the reservation. Idempotent — cancelling
    /// a job that does not exist (or already started executing) is fine.
    pub fn cancel(&self, reservation_id: &Ulid) {
        if let Some((_, job)) = self.jobs.remove(reservation_id) {
            job.handle.abort();
            metrics::counter!(observability::REMINDERS_CANCELLED_TOTAL).increment(1);
            tracing::debug!("reminder job for {reservation_id} cancelled");
        }
    }

    /// Cancel-then-schedule as a unit: exactly one pending job survives for
    /// a future reservation, never zero, never two.
    pub async fn reschedule(self: &Arc<Self>, reservation_id: Ulid) {
        self.cancel(&reservation_id);
        self.schedule(reservation_id).await;
    }

    /// Send one notification to the owner and one to each shared user, then
    /// mark the reservation reminded. At-least-once: a crash between send
    /// and mark may duplicate on recovery. Tolerates the reservation having
    /// been cancelled or removed while the job was pending; if the start
    /// moved later while this job was in flight, the job re-arms instead of
    /// delivering early.
    pub async fn deliver(self: &Arc<Self>, reservation_id: Ulid) {
        let Some(target) = self.snapshot(reservation_id).await else {
            tracing::debug!("reminder skip {reservation_id}: not found");
            return;
        };
        if !target.active || target.reminder_sent {
            return;
        }
        let fire = target.span.start - self.lead_ms;
        let now = now_ms();
        if fire > now {
            self.arm(reservation_id, fire - now);
            return;
        }

        let subject = "Upcoming reservation";
        let body = format!(
            "Reminder: your reservation in {} starts at {}.",
            target.room_name, target.span.start
        );
        let mut recipients = Vec::with_capacity(1 + target.shared_with.len());
        recipients.push(target.owner_id);
        recipients.extend(target.shared_with.iter().copied());
        for user_id in recipients {
            let Some(user) = self.store.get_user(&user_id) else {
                tracing::warn!("reminder for {reservation_id}: user {user_id} not found");
                continue;
            };
            if let Err(e) = self.notifier.notify(&user.email, subject, &body).await {
                tracing::warn!("reminder to {} failed: {e}", user.email);
                metrics::counter!(observability::NOTIFY_FAILURES_TOTAL).increment(1);
            }
        }

        if let Some(room) = self.store.get_room(&target.room_id) {
            let mut guard = room.write().await;
            if let Some(reservation) = guard.get_mut(reservation_id) {
                reservation.reminder_sent = true;
            }
        }
        metrics::counter!(observability::REMINDERS_SENT_TOTAL).increment(1);
        tracing::info!("reminder delivered for reservation {reservation_id}");
    }

    /// Drop every pending job, then re-scan all active, future,
    /// not-yet-reminded reservations and schedule each. Restart recovery —
    /// deferred jobs live in memory and do not survive the process.
    pub async fn initialize_all(self: &Arc<Self>) -> usize {
        let pending: Vec<Ulid> = self.jobs.iter().map(|e| *e.key()).collect();
        for id in pending {
            self.cancel(&id);
        }

        let now = now_ms();
        let mut scheduled = 0usize;
        for room_id in self.store.room_ids() {
            let Some(room) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = room.read().await;
            let ids: Vec<Ulid> = guard
                .reservations
                .iter()
                .filter(|r| r.is_active() && !r.reminder_sent && r.span.start > now)
                .map(|r| r.id)
                .collect();
            drop(guard);
            for id in ids {
                self.schedule(id).await;
                scheduled += 1;
            }
        }
        tracing::info!("reminder re-scan scheduled {scheduled} jobs");
        scheduled
    }

    /// Register the deferred job, replacing (and aborting) any pending one
    /// for the same reservation.
    fn arm(self: &Arc<Self>, reservation_id: Ulid, delay_ms: Ms) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
            scheduler.deliver(reservation_id).await;
            // Only this task's own entry — a newer job may have replaced it.
            scheduler
                .jobs
                .remove_if(&reservation_id, |_, job| job.generation == generation);
        });
        if let Some(previous) = self.jobs.insert(reservation_id, ReminderJob { generation, handle })
        {
            previous.handle.abort();
        }
        metrics::counter!(observability::REMINDERS_SCHEDULED_TOTAL).increment(1);
        tracing::debug!("reminder for {reservation_id} armed in {delay_ms}ms");
    }

    async fn snapshot(&self, reservation_id: Ulid) -> Option<ReminderTarget> {
        let room_id = self.store.room_for_reservation(&reservation_id)?;
        let room = self.store.get_room(&room_id)?;
        let guard = room.read().await;
        let reservation = guard.get(reservation_id)?;
        Some(ReminderTarget {
            room_id,
            room_name: guard.name.clone(),
            owner_id: reservation.user_id,
            shared_with: reservation.shared_with.clone(),
            span: reservation.span,
            active: reservation.is_active(),
            reminder_sent: reservation.reminder_sent,
        })
    }
}
