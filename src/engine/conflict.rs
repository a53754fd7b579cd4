use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.end <= span.start {
        return Err(EngineError::InvalidInterval("end must be after start"));
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("reservation too long"));
    }
    Ok(())
}

/// Pure overlap decision over one room's live reservation set.
///
/// Two intervals `[s1, e1)` and `[s2, e2)` conflict iff `s1 < e2 && s2 < e1`
/// — touching edges do not. Cancelled rows never conflict, and a reservation
/// is excluded from its own conflict set when checking its extension/move.
pub(crate) fn find_conflict(room: &RoomState, span: &Span, exclude: Option<Ulid>) -> Option<Ulid> {
    room.overlapping(span)
        .find(|r| r.is_active() && Some(r.id) != exclude)
        .map(|r| r.id)
}

/// Callers must hold the room's write lock so check + commit is atomic.
pub(crate) fn check_no_conflict(
    room: &RoomState,
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match find_conflict(room, span, exclude) {
        Some(id) => Err(EngineError::Conflict(id)),
        None => Ok(()),
    }
}
