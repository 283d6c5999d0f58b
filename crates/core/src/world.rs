//! World entities and the effect of frames on them
//!
//! The overworld and scenes are both tile grids; each keeps the entities
//! the client tracks and knows how to apply a frame to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::frame::{Action, Actor, Frame};
use crate::turn::{PlayerId, TurnContext};

/// Grid position; `[x, y]` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Position> for (i32, i32) {
    fn from(p: Position) -> Self {
        (p.x, p.y)
    }
}

/// Movement direction; the wire value is the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// `[current, max]` action points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct ActionPoints {
    pub current: i32,
    pub max: i32,
}

impl ActionPoints {
    pub fn new(current: i32, max: i32) -> Self {
        Self { current, max }
    }
}

impl From<(i32, i32)> for ActionPoints {
    fn from((current, max): (i32, i32)) -> Self {
        Self { current, max }
    }
}

impl From<ActionPoints> for (i32, i32) {
    fn from(ap: ActionPoints) -> Self {
        (ap.current, ap.max)
    }
}

/// One map cell: indices into the map's base and feature palettes, `-1`
/// meaning none. `[base, feature]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Tile {
    pub base: i32,
    pub feature: i32,
}

impl Tile {
    pub const EMPTY: Tile = Tile {
        base: -1,
        feature: -1,
    };

    pub fn new(base: i32, feature: i32) -> Self {
        Self { base, feature }
    }
}

impl From<(i32, i32)> for Tile {
    fn from((base, feature): (i32, i32)) -> Self {
        Self { base, feature }
    }
}

impl From<Tile> for (i32, i32) {
    fn from(t: Tile) -> Self {
        (t.base, t.feature)
    }
}

/// Replacement tiles keyed by row-major tile index
pub type SceneChanges = BTreeMap<usize, Tile>;

#[derive(Deserialize)]
struct RawTileMap {
    size: (usize, usize),
    #[serde(default)]
    tiles: Vec<Tile>,
    #[serde(default, alias = "terrains", alias = "biomes")]
    base_names: Vec<String>,
    #[serde(default, alias = "landmarks")]
    feature_names: Vec<String>,
}

/// Largest map accepted from the server
const MAX_TILES: usize = 1 << 20;

/// A rectangular tile grid as described by `world:read` or `scene:read`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTileMap")]
pub struct TileMap {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    base_names: Vec<String>,
    feature_names: Vec<String>,
}

impl TryFrom<RawTileMap> for TileMap {
    type Error = String;

    fn try_from(raw: RawTileMap) -> std::result::Result<Self, Self::Error> {
        let (width, height) = raw.size;
        let count = width
            .checked_mul(height)
            .filter(|&count| count <= MAX_TILES)
            .ok_or_else(|| format!("map size {}x{} is too large", width, height))?;
        let mut tiles = raw.tiles;
        if tiles.is_empty() {
            tiles = vec![Tile::EMPTY; count];
        }
        if tiles.len() != count {
            return Err(format!(
                "map is {}x{} but carries {} tiles",
                width,
                height,
                tiles.len()
            ));
        }

        Ok(Self {
            width,
            height,
            tiles,
            base_names: raw.base_names,
            feature_names: raw.feature_names,
        })
    }
}

impl TileMap {
    /// Decode a map from a read response
    pub fn from_response(response: Value) -> Result<Self> {
        serde_json::from_value(response).map_err(|e| Error::decode("tile map", e))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    pub fn get(&self, pos: Position) -> Option<Tile> {
        if !self.contains(pos) {
            return None;
        }
        self.tiles
            .get(pos.y as usize * self.width + pos.x as usize)
            .copied()
    }

    /// Name of the tile's feature, else its base
    pub fn describe(&self, tile: Tile) -> Option<&str> {
        palette_name(&self.feature_names, tile.feature)
            .or_else(|| palette_name(&self.base_names, tile.base))
    }

    /// Replace tiles by index; returns how many were applied
    pub fn apply_scene_changes(&mut self, changes: &SceneChanges) -> usize {
        let mut applied = 0;
        for (&index, &tile) in changes {
            match self.tiles.get_mut(index) {
                Some(slot) => {
                    *slot = tile;
                    applied += 1;
                }
                None => {
                    tracing::warn!(index = index, tiles = self.tiles.len(), "Scene change outside map");
                }
            }
        }
        applied
    }
}

fn palette_name(names: &[String], index: i32) -> Option<&str> {
    usize::try_from(index)
        .ok()
        .and_then(|i| names.get(i))
        .map(String::as_str)
}

/// The party as seen in the overworld
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Party {
    pub position: Position,
    #[serde(default)]
    pub leader: Option<PlayerId>,
}

impl Party {
    pub fn from_response(response: Value) -> Result<Self> {
        serde_json::from_value(response).map_err(|e| Error::decode("party", e))
    }
}

/// The local player's character
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub id: Option<PlayerId>,
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub profession: String,
    #[serde(default)]
    pub action_points: ActionPoints,
    pub position: Position,
}

impl Player {
    pub fn from_response(response: Value) -> Result<Self> {
        serde_json::from_value(response).map_err(|e| Error::decode("player", e))
    }
}

/// Reply to a `move` command
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MoveOutcome {
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub scene_changes: Option<SceneChanges>,
}

impl MoveOutcome {
    pub fn from_response(response: Value) -> Result<Self> {
        serde_json::from_value(response).map_err(|e| Error::decode("move reply", e))
    }

    /// A reply without a position means the server refused the move
    pub fn accepted(&self) -> bool {
        self.position.is_some()
    }
}

/// Something a frame asks the state machine to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEffect {
    None,
    /// The party entered a scene; `active_player` acts first
    EnterScene { active_player: PlayerId },
    /// The party left the scene for the overworld
    LeaveScene,
}

/// Overworld map, party and leadership
#[derive(Debug, Clone)]
pub struct OverworldModel {
    pub map: TileMap,
    pub party: Party,
    pub turn: TurnContext,
}

impl OverworldModel {
    pub fn new(map: TileMap, party: Party) -> Self {
        let turn = TurnContext::party(party.leader.clone());
        Self { map, party, turn }
    }

    pub fn is_leader(&self, me: &PlayerId) -> bool {
        self.turn.is_authoritative(me)
    }

    /// Apply the confirmed reply to our own move
    pub fn apply_move(&mut self, outcome: &MoveOutcome) {
        if let Some(position) = outcome.position {
            self.party.position = position;
        }
        if let Some(changes) = &outcome.scene_changes {
            self.map.apply_scene_changes(changes);
        }
    }

    /// Replay one frame: position, map changes, leadership and any
    /// transition it signals
    pub fn apply_frame(&mut self, frame: &Frame) -> FrameEffect {
        if let Some(changes) = &frame.scene_changes {
            self.map.apply_scene_changes(changes);
        }

        if frame.actor == Actor::Party && frame.action == Action::Move {
            if let Some(position) = frame.position() {
                self.party.position = position;
            }
        }

        self.sync_context(frame)
    }

    /// Take only leadership and transitions from a frame that is not being
    /// replayed
    pub fn sync_context(&mut self, frame: &Frame) -> FrameEffect {
        if self.turn.observe(frame) {
            self.party.leader = self.turn.holder().cloned();
        }

        if frame.action != Action::EnterScene {
            return FrameEffect::None;
        }
        match frame.active_player() {
            Some(active_player) => FrameEffect::EnterScene { active_player },
            None => {
                tracing::warn!(frame_no = frame.frame_no, "Scene entry without an active player");
                FrameEffect::None
            }
        }
    }
}

/// Scene map, the local player, other players and the turn
#[derive(Debug, Clone)]
pub struct SceneModel {
    pub map: TileMap,
    pub player: Player,
    pub others: BTreeMap<PlayerId, Position>,
    pub turn: TurnContext,
}

impl SceneModel {
    pub fn new(map: TileMap, player: Player, active_player: PlayerId) -> Self {
        Self {
            map,
            player,
            others: BTreeMap::new(),
            turn: TurnContext::scene(active_player),
        }
    }

    pub fn is_my_turn(&self, me: &PlayerId) -> bool {
        self.turn.is_authoritative(me)
    }

    pub fn active_player(&self) -> Option<&PlayerId> {
        self.turn.holder()
    }

    /// Apply the confirmed reply to our own move
    pub fn apply_move(&mut self, outcome: &MoveOutcome) {
        if let Some(position) = outcome.position {
            self.player.position = position;
        }
        if let Some(changes) = &outcome.scene_changes {
            self.map.apply_scene_changes(changes);
        }
    }

    pub fn apply_frame(&mut self, frame: &Frame, me: &PlayerId) -> FrameEffect {
        // A frame names its player explicitly, or concerns whoever held the
        // turn when it was committed.
        let subject = frame.player().or_else(|| self.turn.holder().cloned());

        if frame.actor == Actor::Player && frame.action == Action::Move {
            if let (Some(position), Some(subject)) = (frame.position(), subject.as_ref()) {
                if subject == me {
                    self.player.position = position;
                } else {
                    self.others.insert(subject.clone(), position);
                }
            }
        }

        if let Some(changes) = &frame.scene_changes {
            self.map.apply_scene_changes(changes);
        }

        self.sync_context(frame, me)
    }

    /// Take only turn data, our action points and transitions from a frame
    /// that is not being replayed
    pub fn sync_context(&mut self, frame: &Frame, me: &PlayerId) -> FrameEffect {
        let subject = frame.player().or_else(|| self.turn.holder().cloned());
        if subject.as_ref() == Some(me) {
            if let Some(points) = frame.action_points() {
                self.player.action_points = points;
            }
        }

        self.turn.observe(frame);

        match frame.action {
            Action::LeaveScene => FrameEffect::LeaveScene,
            _ => FrameEffect::None,
        }
    }
}
