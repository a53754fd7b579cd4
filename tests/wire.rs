use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use ulid::Ulid;

use hotdesk::engine::Engine;
use hotdesk::notify::LogNotifier;
use hotdesk::wire;

// ── Test infrastructure ──────────────────────────────────────

const HOUR: i64 = 3_600_000;

async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let engine = Arc::new(Engine::new(Arc::new(LogNotifier), HOUR));
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let engine = engine.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, engine).await;
            });
        }
    });

    addr
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    async fn send_line(&mut self, line: &str) -> Value {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        let mut buf = String::new();
        self.reader.read_line(&mut buf).await.unwrap();
        serde_json::from_str(&buf).unwrap()
    }

    async fn request(&mut self, caller_id: &str, role: &str, op: Value) -> Value {
        let line = json!({ "caller_id": caller_id, "role": role, "op": op }).to_string();
        self.send_line(&line).await
    }
}

fn data_id(reply: &Value) -> String {
    assert_eq!(reply["ok"], true, "expected ok reply, got {reply}");
    reply["data"]["id"].as_str().unwrap().to_string()
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Bootstrap a space, a room, and a user; returns (user_id, space_id, room_id).
async fn seed(client: &mut Client, admin: &str) -> (String, String, String) {
    let user = client
        .request(
            admin,
            "admin",
            json!({ "type": "create_user", "name": "Alice", "email": "alice@example.com", "role": "user" }),
        )
        .await;
    let space = client
        .request(admin, "admin", json!({ "type": "create_space", "name": "Hub" }))
        .await;
    let space_id = data_id(&space);
    let room = client
        .request(
            admin,
            "admin",
            json!({ "type": "create_room", "space_id": space_id, "name": "Pod 1" }),
        )
        .await;
    (data_id(&user), space_id, data_id(&room))
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn reservation_round_trip() {
    let addr = start_test_server().await;
    let mut client = Client::connect(addr).await;
    let admin = Ulid::new().to_string();
    let (user_id, space_id, room_id) = seed(&mut client, &admin).await;

    let base = now_ms() + 24 * HOUR;
    let created = client
        .request(
            &user_id,
            "user",
            json!({
                "type": "create_reservation",
                "room_id": room_id, "space_id": space_id,
                "start": base, "end": base + HOUR,
            }),
        )
        .await;
    let reservation_id = data_id(&created);
    assert_eq!(created["data"]["status"], "active");

    let fetched = client
        .request(&user_id, "user", json!({ "type": "get_reservation", "id": reservation_id }))
        .await;
    assert_eq!(fetched["data"]["start"], base);

    let listed = client
        .request(&user_id, "user", json!({ "type": "list_reservations" }))
        .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn conflict_reported_over_the_wire() {
    let addr = start_test_server().await;
    let mut client = Client::connect(addr).await;
    let admin = Ulid::new().to_string();
    let (user_id, space_id, room_id) = seed(&mut client, &admin).await;

    let base = now_ms() + 24 * HOUR;
    client
        .request(
            &user_id,
            "user",
            json!({
                "type": "create_reservation",
                "room_id": room_id, "space_id": space_id,
                "start": base, "end": base + HOUR,
            }),
        )
        .await;

    let clash = client
        .request(
            &user_id,
            "user",
            json!({
                "type": "create_reservation",
                "room_id": room_id, "space_id": space_id,
                "start": base + HOUR / 2, "end": base + 2 * HOUR,
            }),
        )
        .await;
    assert_eq!(clash["ok"], false);
    assert_eq!(clash["error"], "conflict");

    // Touching edges are fine
    let touching = client
        .request(
            &user_id,
            "user",
            json!({
                "type": "create_reservation",
                "room_id": room_id, "space_id": space_id,
                "start": base + HOUR, "end": base + 2 * HOUR,
            }),
        )
        .await;
    assert_eq!(touching["ok"], true);
}

#[tokio::test]
async fn share_gates_visibility() {
    let addr = start_test_server().await;
    let mut client = Client::connect(addr).await;
    let admin = Ulid::new().to_string();
    let (alice, space_id, room_id) = seed(&mut client, &admin).await;
    let bob_reply = client
        .request(
            &admin,
            "admin",
            json!({ "type": "create_user", "name": "Bob", "email": "bob@example.com", "role": "user" }),
        )
        .await;
    let bob = data_id(&bob_reply);

    let base = now_ms() + 24 * HOUR;
    let created = client
        .request(
            &alice,
            "user",
            json!({
                "type": "create_reservation",
                "room_id": room_id, "space_id": space_id,
                "start": base, "end": base + HOUR,
            }),
        )
        .await;
    let reservation_id = data_id(&created);

    let denied = client
        .request(&bob, "user", json!({ "type": "get_reservation", "id": reservation_id }))
        .await;
    assert_eq!(denied["error"], "forbidden");

    let shared = client
        .request(
            &alice,
            "user",
            json!({ "type": "share_reservation", "id": reservation_id, "user_id": bob }),
        )
        .await;
    assert_eq!(shared["ok"], true);

    let allowed = client
        .request(&bob, "user", json!({ "type": "get_reservation", "id": reservation_id }))
        .await;
    assert_eq!(allowed["ok"], true);
}

#[tokio::test]
async fn cancel_twice_rejected() {
    let addr = start_test_server().await;
    let mut client = Client::connect(addr).await;
    let admin = Ulid::new().to_string();
    let (user_id, space_id, room_id) = seed(&mut client, &admin).await;

    let base = now_ms() + 24 * HOUR;
    let created = client
        .request(
            &user_id,
            "user",
            json!({
                "type": "create_reservation",
                "room_id": room_id, "space_id": space_id,
                "start": base, "end": base + HOUR,
            }),
        )
        .await;
    let reservation_id = data_id(&created);

    let first = client
        .request(&user_id, "user", json!({ "type": "cancel_reservation", "id": reservation_id }))
        .await;
    assert_eq!(first["data"]["status"], "cancelled");

    let second = client
        .request(&user_id, "user", json!({ "type": "cancel_reservation", "id": reservation_id }))
        .await;
    assert_eq!(second["ok"], false);
    assert_eq!(second["error"], "invalid_state");
}

#[tokio::test]
async fn initialize_reminders_role_gated() {
    let addr = start_test_server().await;
    let mut client = Client::connect(addr).await;
    let admin = Ulid::new().to_string();
    let (user_id, _space_id, _room_id) = seed(&mut client, &admin).await;

    let denied = client
        .request(&user_id, "user", json!({ "type": "initialize_reminders" }))
        .await;
    assert_eq!(denied["error"], "forbidden");

    let ok = client
        .request(&admin, "admin", json!({ "type": "initialize_reminders" }))
        .await;
    assert_eq!(ok["ok"], true);
    assert_eq!(ok["data"]["scheduled"], 0);
}

#[tokio::test]
async fn malformed_line_gets_bad_request() {
    let addr = start_test_server().await;
    let mut client = Client::connect(addr).await;

    let reply = client.send_line("this is not json").await;
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["error"], "bad_request");

    // Connection stays usable afterwards
    let reply = client
        .send_line(&json!({ "caller_id": Ulid::new().to_string(), "role": "admin", "op": { "type": "list_spaces" } }).to_string())
        .await;
    assert_eq!(reply["ok"], true);
}
