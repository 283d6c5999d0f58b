//! The party on the world map
//!
//! Only the party leader moves the party or leads it into a scene; everyone
//! else follows the leader's moves as they replay from the frame stream.

use std::time::Duration;

use ratelimit_core::{
    FrameEffect, GameState, Key, OverworldModel, Party, ReplayCursor, StateId, TileMap, Transition,
};
use ratelimit_net::protocol::response_error;
use ratelimit_net::Command;
use serde_json::Value;

use super::{
    bootstrap, catch_up, direction_for, or_fatal, send_move, AppMachine, AppTransition, Args,
    OVERWORLD,
};
use crate::game::Game;
use crate::screen::{Rect, Screen};

#[derive(Default)]
pub struct Overworld {
    model: Option<OverworldModel>,
    cursor: ReplayCursor,
}

impl Overworld {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameState<AppMachine> for Overworld {
    fn id(&self) -> StateId {
        OVERWORLD
    }

    fn enter(&mut self, _game: &mut Game, _args: Args) -> AppTransition {
        bootstrap("Fetching overworld...", |game| {
            let map = TileMap::from_response(game.send(Command::WorldRead, Value::Null)?)?;
            let party = Party::from_response(game.send(Command::PartyRead, Value::Null)?)?;
            Ok(Args::Overworld(OverworldModel::new(map, party)))
        })
    }

    fn resume(&mut self, game: &mut Game, args: Args) -> AppTransition {
        if let Args::Overworld(model) = args {
            tracing::info!(
                position = ?model.party.position,
                leader = model.is_leader(&game.me),
                "Overworld loaded"
            );
            self.model = Some(model);
        }
        Transition::None
    }

    fn input(&mut self, game: &mut Game, key: &Key) -> AppTransition {
        let Some(model) = self.model.as_mut() else {
            return Transition::None;
        };
        if !model.is_leader(&game.me) {
            return Transition::None;
        }

        if game.settings.controls.enter_scene.matches(*key) {
            let response = match or_fatal(game.send(Command::PartyEnterScene, Value::Null)) {
                Ok(response) => response,
                Err(transition) => return transition,
            };
            // The scene itself starts when its frame arrives
            if let Some(error) = response_error(&response) {
                tracing::info!(error = %error, "Scene entry refused");
            }
            return Transition::None;
        }

        let Some(direction) = direction_for(game, *key) else {
            return Transition::None;
        };
        match or_fatal(send_move(game, direction)) {
            Ok(outcome) if outcome.accepted() => model.apply_move(&outcome),
            Ok(_) => tracing::debug!(direction = ?direction, "Move refused"),
            Err(transition) => return transition,
        }
        Transition::None
    }

    fn update(&mut self, game: &mut Game, dt: Duration) -> AppTransition {
        let Some(model) = self.model.as_mut() else {
            return Transition::None;
        };

        match catch_up(&mut self.cursor, model, game, dt) {
            FrameEffect::EnterScene { active_player } => {
                Transition::Pop(Args::EnterScene { active_player })
            }
            _ => Transition::None,
        }
    }

    fn render(&self, game: &Game, screen: &mut Screen) {
        let Some(model) = &self.model else {
            return;
        };

        let status_row = screen.height().saturating_sub(1);
        let rect = Rect {
            x: 0,
            y: 0,
            width: screen.width(),
            height: status_row,
        };
        let position = model.party.position;
        screen.map(rect, &model.map, position, &[(position, '@')]);

        let status = match &model.party.leader {
            _ if model.is_leader(&game.me) => "You lead the party".to_string(),
            Some(leader) => format!("Following {}", leader),
            None => "The party has no leader".to_string(),
        };
        screen.text(1, status_row, &status);

        if let Some(place) = model.map.get(position).and_then(|t| model.map.describe(t)) {
            screen.text_right(status_row, place);
        }
    }
}
