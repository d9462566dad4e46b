use std::{net::SocketAddr, time::Duration};

use chat_relay::{router, state::ChatState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpListener, net::TcpStream, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message as TungsteniteMessage, protocol::frame::coding::CloseCode},
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router(ChatState::new()))
            .await
            .ok();
    });
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (socket, _) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("connect");
    socket
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("socket error");
        if let TungsteniteMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json event");
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let result = timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

async fn send(client: &mut Client, value: Value) {
    client
        .send(TungsteniteMessage::Text(value.to_string().into()))
        .await
        .expect("send");
}

async fn health(addr: SocketAddr, path: &str) -> Value {
    reqwest::get(format!("http://{addr}{path}"))
        .await
        .expect("health request")
        .json()
        .await
        .expect("health json")
}

/// Waits until the relay has processed a disconnect.
async fn wait_for_connections(addr: SocketAddr, expected: u64) -> Value {
    for _ in 0..50 {
        let report = health(addr, "/health").await;
        if report["active_connections"] == expected {
            return report;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("active_connections never reached {expected}");
}

#[tokio::test]
async fn two_users_chat_in_one_conversation() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "/ws/chat/room1?token=anything").await;
    let established = next_event(&mut a).await;
    assert_eq!(established["type"], "connection_established");
    assert_eq!(established["conversation_id"], "room1");
    let a_name = established["user"]["display_name"].clone();

    let a_history = next_event(&mut a).await;
    assert_eq!(a_history["type"], "history");
    assert_eq!(a_history["messages"].as_array().unwrap().len(), 1);

    let mut b = connect(addr, "/ws/chat/room1").await;
    assert_eq!(next_event(&mut b).await["type"], "connection_established");
    let b_history = next_event(&mut b).await;
    assert_eq!(b_history["messages"], a_history["messages"]);
    assert_silent(&mut a).await;

    send(&mut a, json!({"type": "message", "message": "hi", "temp_id": "x"})).await;
    let ack = next_event(&mut a).await;
    assert_eq!(ack["type"], "message_ack");
    assert_eq!(ack["temp_id"], "x");
    assert_eq!(ack["status"], "sent");

    let received = next_event(&mut b).await;
    assert_eq!(received["type"], "message");
    assert_eq!(received["message"], "hi");
    assert_eq!(received["sender_name"], a_name);
    assert_eq!(received["message_id"], ack["message_id"]);
    assert_silent(&mut a).await;

    let before = health(addr, "/health").await;
    assert_eq!(before["status"], "OK");
    assert_eq!(before["active_connections"], 2);
    assert_eq!(before["active_conversations"], 1);

    a.close(None).await.expect("close");
    let after = wait_for_connections(addr, 1).await;
    assert_eq!(after["active_conversations"], 1);

    let detailed = health(addr, "/health/detailed").await;
    let conversations = detailed["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["id"], "room1");
    assert_eq!(conversations[0]["message_count"], 2);
    assert_eq!(conversations[0]["participants"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn protocol_errors_keep_the_connection_open() {
    let addr = spawn_server().await;
    let mut a = connect(addr, "/ws/chat/room1").await;
    next_event(&mut a).await;
    next_event(&mut a).await;

    a.send(TungsteniteMessage::Text("not json".into()))
        .await
        .expect("send");
    assert_eq!(next_event(&mut a).await["error"], "Invalid message format");

    send(&mut a, json!({"type": "dance"})).await;
    assert_eq!(next_event(&mut a).await["error"], "Unknown message type: dance");

    send(&mut a, json!({"type": "message", "message": "   "})).await;
    assert_eq!(next_event(&mut a).await["error"], "Message content cannot be empty");

    send(&mut a, json!({"type": "message"})).await;
    assert_eq!(next_event(&mut a).await["error"], "Message content is required");

    let report = health(addr, "/health/detailed").await;
    assert_eq!(report["active_connections"], 1);
    assert_eq!(report["conversations"][0]["message_count"], 1);
}

#[tokio::test]
async fn conversation_restarts_empty_after_everyone_leaves() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "/ws/chat/room9").await;
    next_event(&mut a).await;
    next_event(&mut a).await;
    send(&mut a, json!({"type": "message", "message": "remember me"})).await;
    a.close(None).await.expect("close");
    let report = wait_for_connections(addr, 0).await;
    assert_eq!(report["active_conversations"], 0);

    let mut b = connect(addr, "/ws/chat/room9").await;
    next_event(&mut b).await;
    let history = next_event(&mut b).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender_id"], "system");
}

#[tokio::test]
async fn missing_conversation_id_is_rejected() {
    let addr = spawn_server().await;
    let mut client = connect(addr, "/ws/chat").await;

    let frame = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("socket error");
    match frame {
        TungsteniteMessage::Close(Some(close)) => {
            assert_eq!(close.code, CloseCode::Policy);
            assert_eq!(close.reason.as_str(), "Conversation ID required");
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn health_allows_cross_origin_requests() {
    let addr = spawn_server().await;
    let response = reqwest::Client::new()
        .get(format!("http://{addr}/health"))
        .header("Origin", "http://example.com")
        .send()
        .await
        .expect("health request");
    assert!(response.status().is_success());
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn duplicated_token_parameter_still_connects() {
    let addr = spawn_server().await;
    let mut client = connect(addr, "/ws/chat/room1?token=a&token=b").await;

    let established = next_event(&mut client).await;
    assert_eq!(established["type"], "connection_established");
    assert_eq!(established["conversation_id"], "room1");
    assert_eq!(next_event(&mut client).await["type"], "history");
}
