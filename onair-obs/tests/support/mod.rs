//! In-process stand-in for OBS-WebSocket used by the transport tests.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use onair_obs::ObsConnectionConfig;
use onair_obs::protocol::{AuthChallenge, auth_response};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

pub type ServerSocket = WebSocketStream<TcpStream>;

pub async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake OBS");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

pub fn config(port: u16) -> ObsConnectionConfig {
    ObsConnectionConfig {
        host: "127.0.0.1".to_string(),
        port,
        password: None,
        use_password: false,
        reconnect: false,
        reconnect_delay: Duration::from_millis(50),
        request_timeout: Some(Duration::from_secs(5)),
        handshake_timeout: Duration::from_secs(2),
    }
}

pub fn hello(challenge: Option<&AuthChallenge>) -> Message {
    let mut d = json!({"obsWebSocketVersion": "5.5.0", "rpcVersion": 1});
    if let Some(c) = challenge {
        d["authentication"] = json!({"challenge": c.challenge, "salt": c.salt});
    }
    Message::Text(json!({"op": 0, "d": d}).to_string().into())
}

pub fn identified() -> Message {
    Message::Text(json!({"op": 2, "d": {"negotiatedRpcVersion": 1}}).to_string().into())
}

/// Accepts one client and walks it through Hello / Identify / Identified.
pub async fn accept_identified(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws = accept_async(stream).await.expect("websocket upgrade");
    ws.send(hello(None)).await.expect("send hello");
    let identify = read_frame(&mut ws).await.expect("identify frame");
    assert_eq!(identify["op"], 1);
    assert_eq!(identify["d"]["rpcVersion"], 1);
    ws.send(identified()).await.expect("send identified");
    ws
}

/// Same as `accept_identified` but demands the given password.
pub async fn accept_with_password(listener: &TcpListener, password: &str) -> ServerSocket {
    let challenge = AuthChallenge {
        challenge: "c2VydmVyLWNoYWxsZW5nZQ==".to_string(),
        salt: "c2VydmVyLXNhbHQ=".to_string(),
    };
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws = accept_async(stream).await.expect("websocket upgrade");
    ws.send(hello(Some(&challenge))).await.expect("send hello");
    let identify = read_frame(&mut ws).await.expect("identify frame");
    assert_eq!(
        identify["d"]["authentication"],
        Value::String(auth_response(password, &challenge))
    );
    ws.send(identified()).await.expect("send identified");
    ws
}

pub async fn read_frame(ws: &mut ServerSocket) -> Option<Value> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => return serde_json::from_str(text.as_str()).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Reads the next request frame and returns its `d` payload.
pub async fn read_request(ws: &mut ServerSocket) -> Option<Value> {
    loop {
        let frame = read_frame(ws).await?;
        if frame["op"] == 6 {
            return Some(frame["d"].clone());
        }
    }
}

pub fn ok_response(request: &Value, data: Value) -> Message {
    Message::Text(
        json!({
            "op": 7,
            "d": {
                "requestType": request["requestType"],
                "requestId": request["requestId"],
                "requestStatus": {"result": true, "code": 100},
                "responseData": data,
            }
        })
        .to_string()
        .into(),
    )
}

pub fn failed_response(request: &Value, code: i64, comment: &str) -> Message {
    Message::Text(
        json!({
            "op": 7,
            "d": {
                "requestType": request["requestType"],
                "requestId": request["requestId"],
                "requestStatus": {"result": false, "code": code, "comment": comment},
            }
        })
        .to_string()
        .into(),
    )
}

pub fn event(event_type: &str, data: Value) -> Message {
    Message::Text(
        json!({
            "op": 5,
            "d": {"eventType": event_type, "eventIntent": 8, "eventData": data}
        })
        .to_string()
        .into(),
    )
}
