use std::io;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

use crate::auth::{AuthContext, Role};
use crate::engine::Engine;
use crate::limits::MAX_WIRE_LINE_LEN;
use crate::ops::{self, Operation, Reply};

/// One request line. The auth boundary upstream is expected to have
/// authenticated the caller; the envelope only carries the resulting
/// context.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub caller_id: Ulid,
    pub role: Role,
    pub op: Operation,
}

/// Serve one connection: newline-delimited JSON envelopes in, one JSON
/// reply line per request out. A malformed line gets a `bad_request`
/// reply rather than dropping the connection.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> io::Result<()> {
    let codec = LinesCodec::new_with_max_length(MAX_WIRE_LINE_LEN);
    let mut framed = Framed::new(socket, codec);

    while let Some(line) = framed.next().await {
        let line = line.map_err(io::Error::other)?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => {
                let ctx = AuthContext::new(envelope.caller_id, envelope.role);
                ops::dispatch(&engine, &ctx, envelope.op).await
            }
            Err(e) => Reply::bad_request(format!("malformed request: {e}")),
        };
        let out = serde_json::to_string(&reply).map_err(io::Error::other)?;
        framed.send(out).await.map_err(io::Error::other)?;
    }
    Ok(())
}
