//! Reservation engine for shared co-working spaces: time-window conflict
//! resolution, reservation lifecycle, sharing, extension negotiation, and
//! lead-time reminder scheduling.

pub mod auth;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod ops;
pub mod scheduler;
pub mod wire;
