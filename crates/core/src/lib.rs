//! RateLimit Core Library
//!
//! Frame model, ledger and catch-up, turn arbitration, world entities,
//! settings and the generic state machine for the RateLimit client.

pub mod catchup;
pub mod error;
pub mod frame;
pub mod input;
pub mod invariants;
pub mod ledger;
pub mod settings;
pub mod state;
pub mod turn;
pub mod world;

pub use catchup::{ReplayCursor, Step};
pub use error::{Error, Result, StateError};
pub use frame::{Action, Actor, Frame, FrameRecord};
pub use input::{Key, KeyBinding};
pub use ledger::{Absorb, FrameLedger};
pub use settings::{Controls, DEFAULT_PORT, GameSettings, NetSettings, ServerSettings, Settings};
pub use state::{GameState, Machine, StateId, StateManager, StateRegistry, Status, Transition};
pub use turn::{PlayerId, TurnContext};
pub use world::{
    ActionPoints, Direction, FrameEffect, MoveOutcome, OverworldModel, Party, Player, Position,
    SceneChanges, SceneModel, Tile, TileMap,
};
