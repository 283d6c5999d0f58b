//! Turn-based play inside a scene

use std::time::Duration;

use ratelimit_core::{
    FrameEffect, GameState, Key, Player, PlayerId, ReplayCursor, SceneModel, StateId, TileMap,
    Transition,
};
use ratelimit_net::protocol::response_error;
use ratelimit_net::Command;
use serde_json::Value;

use super::{
    bootstrap, catch_up, direction_for, or_fatal, send_move, AppMachine, AppTransition, Args,
    SCENE,
};
use crate::game::Game;
use crate::screen::{Rect, Screen};

#[derive(Default)]
pub struct Scene {
    model: Option<SceneModel>,
    cursor: ReplayCursor,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(active_player: PlayerId) -> AppTransition {
        bootstrap("Entering scene...", move |game| {
            let map = TileMap::from_response(game.send(Command::SceneRead, Value::Null)?)?;
            let player = Player::from_response(game.send(Command::PlayerRead, Value::Null)?)?;
            Ok(Args::Scene(SceneModel::new(map, player, active_player)))
        })
    }
}

impl GameState<AppMachine> for Scene {
    fn id(&self) -> StateId {
        SCENE
    }

    fn enter(&mut self, _game: &mut Game, args: Args) -> AppTransition {
        match args {
            Args::EnterScene { active_player } => Self::load(active_player),
            _ => {
                tracing::warn!("Scene entered without an active player");
                Transition::Pop(Args::LeftScene)
            }
        }
    }

    fn resume(&mut self, game: &mut Game, args: Args) -> AppTransition {
        if let Args::Scene(model) = args {
            tracing::info!(
                player = %model.player.name,
                my_turn = model.is_my_turn(&game.me),
                "Scene loaded"
            );
            self.model = Some(model);
        }
        Transition::None
    }

    fn input(&mut self, game: &mut Game, key: &Key) -> AppTransition {
        let Some(model) = self.model.as_mut() else {
            return Transition::None;
        };
        if !model.is_my_turn(&game.me) {
            return Transition::None;
        }

        if game.settings.controls.end_turn.matches(*key) {
            match or_fatal(game.send(Command::PlayerEndTurn, Value::Null)) {
                Ok(response) => {
                    if let Some(error) = response_error(&response) {
                        tracing::info!(error = %error, "End turn refused");
                    }
                }
                Err(transition) => return transition,
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
            FrameEffect::LeaveScene => Transition::Pop(Args::LeftScene),
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
        let mut markers: Vec<_> = model.others.values().map(|&pos| (pos, 'o')).collect();
        markers.push((model.player.position, '@'));
        screen.map(rect, &model.map, model.player.position, &markers);

        let turn = match model.active_player() {
            _ if model.is_my_turn(&game.me) => "My turn".to_string(),
            Some(active) => format!("Waiting for {}", active),
            None => "Waiting".to_string(),
        };
        let points = model.player.action_points;
        screen.text(
            1,
            status_row,
            &format!("{}  AP {}/{}  {}", model.player.name, points.current, points.max, turn),
        );
    }
}
