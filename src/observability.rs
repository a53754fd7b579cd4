use std::net::SocketAddr;

use crate::ops::Operation;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total operations executed. Labels: op, status.
pub const OPERATIONS_TOTAL: &str = "hotdesk_operations_total";

/// Histogram: operation latency in seconds. Labels: op.
pub const OPERATION_DURATION_SECONDS: &str = "hotdesk_operation_duration_seconds";

/// Counter: operations rejected with a booking conflict.
pub const CONFLICTS_TOTAL: &str = "hotdesk_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "hotdesk_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "hotdesk_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "hotdesk_connections_rejected_total";

/// Counter: reminder jobs armed.
pub const REMINDERS_SCHEDULED_TOTAL: &str = "hotdesk_reminders_scheduled_total";

/// Counter: reminder deliveries completed.
pub const REMINDERS_SENT_TOTAL: &str = "hotdesk_reminders_sent_total";

/// Counter: pending reminder jobs dropped by cancel/reschedule.
pub const REMINDERS_CANCELLED_TOTAL: &str = "hotdesk_reminders_cancelled_total";

/// Counter: notification sink failures (logged, not retried).
pub const NOTIFY_FAILURES_TOTAL: &str = "hotdesk_notify_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map an Operation variant to a short label for metrics.
pub fn operation_label(op: &Operation) -> &'static str {
    match op {
        Operation::CreateReservation { .. } => "create_reservation",
        Operation::GetReservation { .. } => "get_reservation",
        Operation::ListReservations => "list_reservations",
        Operation::UpdateReservation { .. } => "update_reservation",
        Operation::CancelReservation { .. } => "cancel_reservation",
        Operation::ShareReservation { .. } => "share_reservation",
        Operation::UnshareReservation { .. } => "unshare_reservation",
        Operation::RequestExtension { .. } => "request_extension",
        Operation::ApproveExtension { .. } => "approve_extension",
        Operation::InitializeReminders => "initialize_reminders",
        Operation::CreateSpace { .. } => "create_space",
        Operation::GetSpace { .. } => "get_space",
        Operation::ListSpaces => "list_spaces",
        Operation::CreateRoom { .. } => "create_room",
        Operation::GetRoom { .. } => "get_room",
        Operation::ListRooms { .. } => "list_rooms",
        Operation::CreateUser { .. } => "create_user",
        Operation::ListUsers => "list_users",
    }
}
