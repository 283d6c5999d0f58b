//! Authoritative frame records
//!
//! A frame is one numbered delta committed by the server. Frames are never
//! modified after they are received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::turn::PlayerId;
use crate::world::{ActionPoints, Position, SceneChanges};

/// Who acted in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Party,
    Player,
    #[serde(other)]
    Other,
}

/// What happened in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Move,
    EnterScene,
    LeaveScene,
    EndTurn,
    #[serde(other)]
    Other,
}

/// A frame record as sent by `get_frames` (the number travels alongside)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub actor: Actor,
    pub action: Action,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub scene_changes: Option<SceneChanges>,
}

/// A numbered frame held by the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame_no: u64,
    pub actor: Actor,
    pub action: Action,
    pub data: Map<String, Value>,
    pub scene_changes: Option<SceneChanges>,
}

impl Frame {
    pub fn new(frame_no: u64, record: FrameRecord) -> Self {
        Self {
            frame_no,
            actor: record.actor,
            action: record.action,
            data: record.data,
            scene_changes: record.scene_changes,
        }
    }

    /// Position the actor ended up at
    pub fn position(&self) -> Option<Position> {
        self.field("position")
    }

    /// Player the frame is about, when the server names one
    pub fn player(&self) -> Option<PlayerId> {
        self.field("player")
    }

    /// Player whose turn it is after this frame
    pub fn active_player(&self) -> Option<PlayerId> {
        self.field("active_player")
    }

    /// Party leader after this frame: `None` when the frame says nothing,
    /// `Some(None)` when it clears the leader.
    pub fn leader(&self) -> Option<Option<PlayerId>> {
        self.field("leader")
    }

    pub fn action_points(&self) -> Option<ActionPoints> {
        self.field("action_points")
    }

    /// Typed view of one `data` field; malformed values read as absent
    fn field<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.data.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(frame_no = self.frame_no, field = key, error = %e, "Ignoring malformed frame field");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Tile;
    use serde_json::json;

    #[test]
    fn test_decode_move_frame() {
        let record: FrameRecord = serde_json::from_value(json!({
            "actor": "party",
            "action": "move",
            "data": { "position": [4, 7] },
            "scene_changes": { "12": [2, -1] }
        }))
        .unwrap();
        let frame = Frame::new(11, record);

        assert_eq!(frame.actor, Actor::Party);
        assert_eq!(frame.action, Action::Move);
        assert_eq!(frame.position(), Some(Position::new(4, 7)));
        let changes = frame.scene_changes.unwrap();
        assert_eq!(changes.get(&12), Some(&Tile::new(2, -1)));
    }

    #[test]
    fn test_leader_field() {
        let frame = |data| {
            let record: FrameRecord = serde_json::from_value(json!({
                "actor": "party",
                "action": "leader",
                "data": data
            }))
            .unwrap();
            Frame::new(3, record)
        };

        assert_eq!(frame(json!({ "leader": "ada" })).leader(), Some(Some(PlayerId::new("ada"))));
        assert_eq!(frame(json!({ "leader": 7 })).leader(), Some(Some(PlayerId::new("7"))));
        assert_eq!(frame(json!({ "leader": null })).leader(), Some(None));
        assert_eq!(frame(json!({})).leader(), None);
        // Neither an id nor a clear: treated as saying nothing
        assert_eq!(frame(json!({ "leader": [1, 2] })).leader(), None);
    }

    #[test]
    fn test_unknown_action_and_actor() {
        let record: FrameRecord = serde_json::from_value(json!({
            "actor": "goblin",
            "action": "attack"
        }))
        .unwrap();

        assert_eq!(record.actor, Actor::Other);
        assert_eq!(record.action, Action::Other);
        assert!(record.data.is_empty());
        assert!(record.scene_changes.is_none());
    }

    #[test]
    fn test_turn_fields() {
        let record: FrameRecord = serde_json::from_value(json!({
            "actor": "player",
            "action": "end_turn",
            "data": { "active_player": 42, "action_points": [3, 5], "leader": "bob" }
        }))
        .unwrap();
        let frame = Frame::new(2, record);

        assert_eq!(frame.active_player(), Some(PlayerId::new("42")));
        assert_eq!(frame.action_points(), Some(ActionPoints::new(3, 5)));
        assert_eq!(frame.leader(), Some(Some(PlayerId::new("bob"))));
        assert_eq!(frame.player(), None);
    }

    #[test]
    fn test_malformed_field_reads_as_absent() {
        let record: FrameRecord = serde_json::from_value(json!({
            "actor": "party",
            "action": "move",
            "data": { "position": "north-ish" }
        }))
        .unwrap();

        assert_eq!(Frame::new(1, record).position(), None);
    }
}
