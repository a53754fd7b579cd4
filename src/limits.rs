//! Input-validation bounds. Everything crossing the wire is checked against
//! these before it can touch engine state.

use crate::model::Ms;

pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// One year. No single reservation (or extension) may span longer.
pub const MAX_SPAN_DURATION_MS: Ms = 31_536_000_000;

pub const MAX_NAME_LEN: usize = 256;

pub const MAX_EMAIL_LEN: usize = 320;

pub const MAX_RESERVATIONS_PER_ROOM: usize = 100_000;

pub const MAX_ROOMS_PER_SPACE: usize = 4_096;

pub const MAX_SHARED_USERS: usize = 64;

pub const MAX_AMENITIES: usize = 64;

/// Longest accepted request line on the wire.
pub const MAX_WIRE_LINE_LEN: usize = 64 * 1024;
