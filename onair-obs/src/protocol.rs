//! OBS-WebSocket v5 framing.
//!
//! Every frame on the wire is `{"op": <int>, "d": {...}}`. Only the op codes
//! this client speaks are decoded; anything else is surfaced as
//! [`Incoming::Other`] so newer servers do not break the receive loop.
//! Payload structs ignore unknown fields.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ObsError, Result};

pub const RPC_VERSION: u32 = 1;

pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPayload<'a> {
    request_type: &'a str,
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    #[serde(default)]
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

impl ResponsePayload {
    /// Splits the response into its data or a `RequestFailed` error.
    pub fn into_result(self) -> Result<Value> {
        if !self.request_status.result {
            return Err(ObsError::RequestFailed {
                request_type: self.request_type,
                code: self.request_status.code,
                comment: self.request_status.comment,
            });
        }
        Ok(self.response_data.unwrap_or(Value::Null))
    }
}

/// An unsolicited event. Handlers receive the whole payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsEvent {
    pub event_type: String,
    #[serde(default)]
    pub event_intent: Option<u64>,
    #[serde(default)]
    pub event_data: Value,
}

impl ObsEvent {
    /// Decodes `eventData` into a typed event body.
    pub fn data<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.event_data.clone()).map_err(|e| {
            ObsError::Protocol(format!("malformed {} event: {}", self.event_type, e))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputVolumeChanged {
    pub input_name: String,
    #[serde(default)]
    pub input_volume_mul: f64,
    pub input_volume_db: f64,
}

impl InputVolumeChanged {
    pub const EVENT_TYPE: &'static str = "InputVolumeChanged";
}

#[derive(Debug, Clone)]
pub enum Incoming {
    Hello(Hello),
    Identified(Identified),
    Event(ObsEvent),
    Response(ResponsePayload),
    Other(u8),
}

pub fn decode(text: &str) -> Result<Incoming> {
    let frame: Frame = serde_json::from_str(text)?;
    let incoming = match frame.op {
        op::HELLO => Incoming::Hello(serde_json::from_value(frame.d)?),
        op::IDENTIFIED => Incoming::Identified(serde_json::from_value(frame.d)?),
        op::EVENT => Incoming::Event(serde_json::from_value(frame.d)?),
        op::REQUEST_RESPONSE => Incoming::Response(serde_json::from_value(frame.d)?),
        other => Incoming::Other(other),
    };
    Ok(incoming)
}

pub fn encode_identify(identify: &Identify) -> Result<String> {
    let frame = Frame {
        op: op::IDENTIFY,
        d: serde_json::to_value(identify)?,
    };
    Ok(serde_json::to_string(&frame)?)
}

pub fn encode_request(
    request_type: &str,
    request_id: &str,
    request_data: Option<Value>,
) -> Result<String> {
    let payload = RequestPayload {
        request_type,
        request_id,
        request_data,
    };
    let frame = Frame {
        op: op::REQUEST,
        d: serde_json::to_value(payload)?,
    };
    Ok(serde_json::to_string(&frame)?)
}

/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
pub fn auth_response(password: &str, challenge: &AuthChallenge) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{}{}", password, challenge.salt)));
    STANDARD.encode(Sha256::digest(format!("{}{}", secret, challenge.challenge)))
}
