//! Concrete game states

mod bootstrap;
mod create_character;
mod fatal_error;
mod in_game;
mod join_game;
mod overworld;
mod scene;

use std::time::Duration;

use ratelimit_core::{
    Direction, Frame, FrameEffect, Key, Machine, MoveOutcome, OverworldModel, PlayerId,
    ReplayCursor, SceneModel, StateId, StateRegistry, Step, Transition,
};
use ratelimit_net::Command;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::game::Game;
use crate::screen::Screen;

pub use bootstrap::Bootstrap;
pub use create_character::CreateCharacter;
pub use fatal_error::{FatalError, FatalInfo};
pub use in_game::InGame;
pub use join_game::JoinGame;
pub use overworld::Overworld;
pub use scene::Scene;

pub const BOOTSTRAP: StateId = "bootstrap";
pub const JOIN_GAME: StateId = "join_game";
pub const CREATE_CHARACTER: StateId = "create_character";
pub const IN_GAME: StateId = "in_game";
pub const OVERWORLD: StateId = "overworld";
pub const SCENE: StateId = "scene";
pub const FATAL_ERROR: StateId = "fatal_error";

/// The client's state machine types
pub struct AppMachine;

impl Machine for AppMachine {
    type Context = Game;
    type Args = Args;
    type Event = Key;
    type Canvas = Screen;
}

pub type AppTransition = Transition<Args>;

/// Work a bootstrap state runs against the game context
pub struct Task {
    pub message: String,
    pub run: Box<dyn FnOnce(&mut Game) -> Result<Args>>,
}

/// Payload passed between states
#[derive(Default)]
pub enum Args {
    #[default]
    None,
    Bootstrap(Task),
    Fatal(FatalInfo),
    /// Both transports are up
    Connected,
    /// Raw response to a bootstrapped command
    Response(Value),
    Overworld(OverworldModel),
    Scene(SceneModel),
    /// The party entered a scene
    EnterScene { active_player: PlayerId },
    /// The party is back in the overworld
    LeftScene,
}

/// Show `message` while `run` executes, then hand its result back on resume
pub fn bootstrap<F>(message: impl Into<String>, run: F) -> AppTransition
where
    F: FnOnce(&mut Game) -> Result<Args> + 'static,
{
    Transition::Push(
        BOOTSTRAP,
        Args::Bootstrap(Task {
            message: message.into(),
            run: Box::new(run),
        }),
    )
}

/// Abandon the current session for the fatal error screen
pub fn fatal(error: &AppError) -> AppTransition {
    Transition::Collapse(FATAL_ERROR, Args::Fatal(FatalInfo::from_error(error)))
}

/// Direction bound to `key`, if any
pub fn direction_for(game: &Game, key: Key) -> Option<Direction> {
    let dirs = &game.settings.controls.directions;
    let bindings = [&dirs.north, &dirs.east, &dirs.south, &dirs.west];
    Direction::ALL
        .into_iter()
        .zip(bindings)
        .find(|(_, binding)| binding.matches(key))
        .map(|(direction, _)| direction)
}

/// Every state the client can enter
pub fn registry() -> StateRegistry<AppMachine> {
    let mut registry = StateRegistry::new();
    registry
        .register(BOOTSTRAP, Bootstrap::new)
        .register(JOIN_GAME, JoinGame::new)
        .register(CREATE_CHARACTER, CreateCharacter::new)
        .register(IN_GAME, InGame::new)
        .register(OVERWORLD, Overworld::new)
        .register(SCENE, Scene::new)
        .register(FATAL_ERROR, FatalError::new);
    registry
}

/// Log a failed command and turn it into the fatal transition
fn or_fatal<T>(result: Result<T>) -> std::result::Result<T, AppTransition> {
    result.map_err(|e| {
        tracing::error!(error = %e, "Command failed");
        fatal(&e)
    })
}

/// Send a move and decode the reply
fn send_move(game: &mut Game, direction: Direction) -> Result<MoveOutcome> {
    let response = game.send(Command::Move, json!({ "direction": direction.wire() }))?;
    Ok(MoveOutcome::from_response(response)?)
}

/// A model the per-tick catch-up can drive
trait Replay {
    fn authoritative(&self, me: &PlayerId) -> bool;
    fn apply(&mut self, frame: &Frame, me: &PlayerId) -> FrameEffect;
    fn sync(&mut self, frame: &Frame, me: &PlayerId) -> FrameEffect;
}

impl Replay for OverworldModel {
    fn authoritative(&self, me: &PlayerId) -> bool {
        self.is_leader(me)
    }

    fn apply(&mut self, frame: &Frame, _me: &PlayerId) -> FrameEffect {
        self.apply_frame(frame)
    }

    fn sync(&mut self, frame: &Frame, _me: &PlayerId) -> FrameEffect {
        self.sync_context(frame)
    }
}

impl Replay for SceneModel {
    fn authoritative(&self, me: &PlayerId) -> bool {
        self.is_my_turn(me)
    }

    fn apply(&mut self, frame: &Frame, me: &PlayerId) -> FrameEffect {
        self.apply_frame(frame, me)
    }

    fn sync(&mut self, frame: &Frame, me: &PlayerId) -> FrameEffect {
        self.sync_context(frame, me)
    }
}

/// Move `cursor` one tick toward the ledger and apply what it passes.
///
/// Frames skipped by a snap or clamp still contribute turn data and
/// transitions. Returns the first transition any frame asked for.
fn catch_up<R: Replay>(
    cursor: &mut ReplayCursor,
    model: &mut R,
    game: &mut Game,
    dt: Duration,
) -> FrameEffect {
    game.hold_frames();
    if !game.ledger.is_synced() {
        return FrameEffect::None;
    }

    let step = cursor.catch_up(
        game.ledger.client_frame_no(),
        model.authoritative(&game.me),
        dt.as_secs_f64(),
        &game.settings.game,
    );

    let effect = match step {
        Step::Idle | Step::Started => FrameEffect::None,
        Step::Snapped { from, to } | Step::Clamped { from, to } => game
            .ledger
            .range(from, to)
            .map(|frame| model.sync(frame, &game.me))
            .find(|effect| *effect != FrameEffect::None)
            .unwrap_or(FrameEffect::None),
        Step::Replay(frame_no) => match game.ledger.get(frame_no) {
            Some(frame) => model.apply(frame, &game.me),
            None => {
                tracing::warn!(frame_no = frame_no, "Frame missing from ledger, skipped");
                FrameEffect::None
            }
        },
    };

    game.ledger.prune_through(cursor.local());
    effect
}
