use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::auth::{AuthContext, Role};
use crate::engine::{Engine, EngineError};
use crate::model::{Ms, Span};
use crate::observability;

/// The role-gated operation surface. Each variant names an operation and
/// its request shape; routing syntax belongs to whatever transport carries
/// the envelope.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    CreateReservation {
        room_id: Ulid,
        space_id: Ulid,
        start: Ms,
        end: Ms,
    },
    GetReservation {
        id: Ulid,
    },
    ListReservations,
    UpdateReservation {
        id: Ulid,
        #[serde(default)]
        start: Option<Ms>,
        #[serde(default)]
        end: Option<Ms>,
    },
    CancelReservation {
        id: Ulid,
    },
    ShareReservation {
        id: Ulid,
        user_id: Ulid,
    },
    UnshareReservation {
        id: Ulid,
        user_id: Ulid,
    },
    RequestExtension {
        id: Ulid,
        new_end: Ms,
    },
    ApproveExtension {
        id: Ulid,
    },
    InitializeReminders,
    CreateSpace {
        name: String,
        #[serde(default)]
        address: Option<String>,
    },
    GetSpace {
        id: Ulid,
    },
    ListSpaces,
    CreateRoom {
        space_id: Ulid,
        name: String,
        #[serde(default)]
        capacity: Option<u32>,
        #[serde(default)]
        amenities: Vec<String>,
    },
    GetRoom {
        id: Ulid,
    },
    ListRooms {
        space_id: Ulid,
    },
    CreateUser {
        name: String,
        email: String,
        role: Role,
    },
    ListUsers,
}

/// Wire reply. `error` carries the machine-readable kind, `message` the
/// human-readable rendering.
#[derive(Debug, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn engine_error(e: &EngineError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error_code(e).to_string()),
            message: Some(e.to_string()),
        }
    }

    pub fn bad_request(message: String) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some("bad_request".to_string()),
            message: Some(message),
        }
    }
}

pub fn error_code(e: &EngineError) -> &'static str {
    match e {
        EngineError::NotFound(_) => "not_found",
        EngineError::InvalidInterval(_) => "invalid_interval",
        EngineError::Conflict(_) => "conflict",
        EngineError::Forbidden(_) => "forbidden",
        EngineError::AlreadyShared(_) => "already_shared",
        EngineError::InvalidState(_) => "invalid_state",
        EngineError::LimitExceeded(_) => "limit_exceeded",
    }
}

/// Execute one operation against the engine and record RED metrics.
pub async fn dispatch(engine: &Engine, ctx: &AuthContext, op: Operation) -> Reply {
    let label = observability::operation_label(&op);
    let started = std::time::Instant::now();
    let result = run(engine, ctx, op).await;
    metrics::histogram!(observability::OPERATION_DURATION_SECONDS, "op" => label)
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(data) => {
            metrics::counter!(observability::OPERATIONS_TOTAL, "op" => label, "status" => "ok")
                .increment(1);
            Reply::ok(data)
        }
        Err(e) => {
            metrics::counter!(observability::OPERATIONS_TOTAL, "op" => label, "status" => "error")
                .increment(1);
            if matches!(e, EngineError::Conflict(_)) {
                metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
            }
            tracing::debug!("{label} rejected: {e}");
            Reply::engine_error(&e)
        }
    }
}

async fn run(
    engine: &Engine,
    ctx: &AuthContext,
    op: Operation,
) -> Result<serde_json::Value, EngineError> {
    let value = match op {
        Operation::CreateReservation {
            room_id,
            space_id,
            start,
            end,
        } => to_value(
            engine
                .create_reservation(ctx, room_id, space_id, Span::new(start, end))
                .await?,
        ),
        Operation::GetReservation { id } => to_value(engine.get_reservation(ctx, id).await?),
        Operation::ListReservations => to_value(engine.list_reservations(ctx).await),
        Operation::UpdateReservation { id, start, end } => {
            to_value(engine.update_reservation(ctx, id, start, end).await?)
        }
        Operation::CancelReservation { id } => to_value(engine.cancel_reservation(ctx, id).await?),
        Operation::ShareReservation { id, user_id } => {
            to_value(engine.share_reservation(ctx, id, user_id).await?)
        }
        Operation::UnshareReservation { id, user_id } => {
            to_value(engine.unshare_reservation(ctx, id, user_id).await?)
        }
        Operation::RequestExtension { id, new_end } => {
            to_value(engine.request_extension(ctx, id, new_end).await?)
        }
        Operation::ApproveExtension { id } => to_value(engine.approve_extension(ctx, id).await?),
        Operation::InitializeReminders => {
            let scheduled = engine.initialize_reminders(ctx).await?;
            serde_json::json!({ "scheduled": scheduled })
        }
        Operation::CreateSpace { name, address } => {
            to_value(engine.create_space(ctx, name, address)?)
        }
        Operation::GetSpace { id } => to_value(engine.get_space(id)?),
        Operation::ListSpaces => to_value(engine.list_spaces()),
        Operation::CreateRoom {
            space_id,
            name,
            capacity,
            amenities,
        } => to_value(engine.create_room(ctx, space_id, name, capacity, amenities)?),
        Operation::GetRoom { id } => to_value(engine.get_room(id).await?),
        Operation::ListRooms { space_id } => to_value(engine.list_rooms(space_id).await?),
        Operation::CreateUser { name, email, role } => {
            to_value(engine.create_user(ctx, name, email, role)?)
        }
        Operation::ListUsers => to_value(engine.list_users(ctx)?),
    };
    Ok(value)
}

fn to_value<T: Serialize>(v: T) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}
