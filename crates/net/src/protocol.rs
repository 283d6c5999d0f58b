//! Network protocol message types
//!
//! Requests are an `{id, type, message}` envelope; responses are arbitrary
//! JSON objects whose shape depends on the command.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Commands understood by the game server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Handshake,
    Move,
    PlayerCreate,
    PlayerEndTurn,
    PartyEnterScene,
    GameJoin,
    WorldRead,
    PartyRead,
    PlayerRead,
    SceneRead,
    SpriteSheetRead,
    Peek,
    GetFrames,
}

impl Command {
    /// Wire name of the command
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Handshake => "handshake",
            Command::Move => "move",
            Command::PlayerCreate => "player:create",
            Command::PlayerEndTurn => "player:end_turn",
            Command::PartyEnterScene => "party:enter_scene",
            Command::GameJoin => "game:join",
            Command::WorldRead => "world:read",
            Command::PartyRead => "party:read",
            Command::PlayerRead => "player:read",
            Command::SceneRead => "scene:read",
            Command::SpriteSheetRead => "sprite_sheet:read",
            Command::Peek => "peek",
            Command::GetFrames => "get_frames",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request envelope written to the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Value,
}

impl Request {
    /// Build a request with a fresh id
    pub fn new(command: Command, message: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: command.as_str().to_string(),
            message,
        }
    }

    /// Serialize request to JSON bytes
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize request from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Credentials presented by the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub node: String,
    pub password: String,
}

/// `peek` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeekReply {
    pub frame_no: u64,
}

/// `get_frames` request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FramesQuery {
    pub frame_no: u64,
}

/// `get_frames` response; each entry is a `[frame_no, record]` pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "F: DeserializeOwned"))]
pub struct FramesReply<F> {
    #[serde(default = "Vec::new")]
    pub frames: Vec<(u64, F)>,
}

/// Decode a response object into a typed reply
pub fn parse_reply<T: DeserializeOwned>(command: Command, response: Value) -> Result<T> {
    serde_json::from_value(response)
        .map_err(|e| Error::Protocol(format!("Malformed {} response: {}", command, e)))
}

/// Server-reported error carried inside an otherwise ordinary response
pub fn response_error(response: &Value) -> Option<&str> {
    response.get("error").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_shape() {
        let req = Request::new(Command::Move, json!({ "direction": 2 }));
        let value: Value = serde_json::from_slice(&req.to_bytes().unwrap()).unwrap();

        assert_eq!(value["type"], "move");
        assert_eq!(value["message"]["direction"], 2);
        assert!(Uuid::parse_str(value["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::new(Command::Peek, Value::Null);
        let b = Request::new(Command::Peek, Value::Null);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_frames_reply_pairs() {
        let reply: FramesReply<Value> = parse_reply(
            Command::GetFrames,
            json!({ "frames": [[11, { "actor": "party" }], [12, {}]] }),
        )
        .unwrap();

        assert_eq!(reply.frames.len(), 2);
        assert_eq!(reply.frames[0].0, 11);
        assert_eq!(reply.frames[1].0, 12);
    }

    #[test]
    fn test_malformed_peek_is_protocol_error() {
        let result: Result<PeekReply> = parse_reply(Command::Peek, json!({ "frame": "x" }));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_response_error_field() {
        assert_eq!(response_error(&json!({ "error": "bad password" })), Some("bad password"));
        assert_eq!(response_error(&json!({ "ok": true })), None);
    }
}
