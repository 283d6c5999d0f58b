//! Hub between the overworld and scenes

use ratelimit_core::{GameState, StateId, Transition};

use super::{AppMachine, AppTransition, Args, IN_GAME, OVERWORLD, SCENE};
use crate::game::Game;

#[derive(Default)]
pub struct InGame;

impl InGame {
    pub fn new() -> Self {
        Self
    }
}

impl GameState<AppMachine> for InGame {
    fn id(&self) -> StateId {
        IN_GAME
    }

    fn enter(&mut self, _game: &mut Game, _args: Args) -> AppTransition {
        Transition::push(OVERWORLD)
    }

    fn resume(&mut self, _game: &mut Game, args: Args) -> AppTransition {
        match args {
            Args::EnterScene { active_player } => {
                tracing::info!(active_player = %active_player, "Entering scene");
                Transition::Push(SCENE, Args::EnterScene { active_player })
            }
            Args::LeftScene => {
                tracing::info!("Back to the overworld");
                Transition::push(OVERWORLD)
            }
            _ => Transition::push(OVERWORLD),
        }
    }
}
