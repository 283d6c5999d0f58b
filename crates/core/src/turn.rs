//! Turn and leadership arbitration
//!
//! Decides whether the local player may author moves in the current
//! context. The fields consulted here only ever change from data the server
//! sent; nothing is guessed locally.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::frame::Frame;

/// Player identity as used on the wire.
///
/// Servers send ids either as strings or as integers; both normalise to
/// the same string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PlayerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = PlayerId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a player id string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PlayerId, E> {
                Ok(PlayerId::new(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PlayerId, E> {
                Ok(PlayerId::new(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PlayerId, E> {
                Ok(PlayerId::new(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Who may author moves right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnContext {
    /// Overworld: the party leader moves the whole party
    Party { leader: Option<PlayerId> },
    /// Inside a scene: exactly one player acts at a time
    Scene { active_player: PlayerId },
}

impl TurnContext {
    pub fn party(leader: Option<PlayerId>) -> Self {
        TurnContext::Party { leader }
    }

    pub fn scene(active_player: PlayerId) -> Self {
        TurnContext::Scene { active_player }
    }

    /// Current holder of the turn, if any
    pub fn holder(&self) -> Option<&PlayerId> {
        match self {
            TurnContext::Party { leader } => leader.as_ref(),
            TurnContext::Scene { active_player } => Some(active_player),
        }
    }

    /// Whether `me` may author moves in this context
    pub fn is_authoritative(&self, me: &PlayerId) -> bool {
        self.holder() == Some(me)
    }

    /// Update from an authoritative frame. Returns true if the holder changed.
    pub fn observe(&mut self, frame: &Frame) -> bool {
        match self {
            TurnContext::Party { leader } => {
                let Some(next) = frame.leader() else {
                    return false;
                };
                if *leader == next {
                    return false;
                }
                tracing::debug!(frame_no = frame.frame_no, leader = ?next, "Party leader changed");
                *leader = next;
                true
            }
            TurnContext::Scene { active_player } => match frame.active_player() {
                Some(next) if next != *active_player => {
                    tracing::debug!(frame_no = frame.frame_no, active_player = %next, "Turn passed");
                    *active_player = next;
                    true
                }
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameRecord;
    use serde_json::json;

    fn frame(no: u64, record: serde_json::Value) -> Frame {
        let record: FrameRecord = serde_json::from_value(record).unwrap();
        Frame::new(no, record)
    }

    #[test]
    fn test_player_id_from_string_or_number() {
        let a: PlayerId = serde_json::from_value(json!("abc")).unwrap();
        let b: PlayerId = serde_json::from_value(json!(123456789012_u64)).unwrap();
        assert_eq!(a.as_str(), "abc");
        assert_eq!(b, PlayerId::new("123456789012"));
    }

    #[test]
    fn test_party_leader_authority() {
        let me = PlayerId::new("me");
        let ctx = TurnContext::party(Some(me.clone()));
        assert!(ctx.is_authoritative(&me));
        assert!(!ctx.is_authoritative(&PlayerId::new("other")));

        let leaderless = TurnContext::party(None);
        assert!(!leaderless.is_authoritative(&me));
    }

    #[test]
    fn test_scene_turn_follows_frames() {
        let me = PlayerId::new("me");
        let mut ctx = TurnContext::scene(PlayerId::new("other"));
        assert!(!ctx.is_authoritative(&me));

        let changed = ctx.observe(&frame(
            3,
            json!({ "actor": "player", "action": "end_turn", "data": { "active_player": "me" } }),
        ));
        assert!(changed);
        assert!(ctx.is_authoritative(&me));

        // Frames without turn data leave it alone
        let changed = ctx.observe(&frame(4, json!({ "actor": "player", "action": "move" })));
        assert!(!changed);
        assert!(ctx.is_authoritative(&me));
    }

    #[test]
    fn test_party_leader_cleared_by_frame() {
        let me = PlayerId::new("me");
        let mut ctx = TurnContext::party(Some(me.clone()));

        ctx.observe(&frame(
            9,
            json!({ "actor": "party", "action": "enter_scene", "data": { "leader": null } }),
        ));
        assert!(!ctx.is_authoritative(&me));
        assert_eq!(ctx.holder(), None);
    }
}
