//! Character creation for players the server does not know yet

use ratelimit_core::{GameState, Key, StateId, Transition};
use ratelimit_net::protocol::response_error;
use ratelimit_net::Command;
use serde_json::json;

use super::{bootstrap, AppMachine, AppTransition, Args, CREATE_CHARACTER, JOIN_GAME};
use crate::game::Game;
use crate::screen::Screen;

const MAX_NAME_LEN: usize = 24;

#[derive(Default)]
pub struct CreateCharacter {
    name: String,
    error: Option<String>,
}

impl CreateCharacter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameState<AppMachine> for CreateCharacter {
    fn id(&self) -> StateId {
        CREATE_CHARACTER
    }

    fn resume(&mut self, _game: &mut Game, args: Args) -> AppTransition {
        let Args::Response(response) = args else {
            return Transition::None;
        };

        match response_error(&response) {
            Some(error) => {
                tracing::info!(error = %error, "Character rejected");
                self.error = Some(error.to_string());
                Transition::None
            }
            None => {
                tracing::info!(name = %self.name, "Character created");
                Transition::collapse(JOIN_GAME)
            }
        }
    }

    fn input(&mut self, game: &mut Game, key: &Key) -> AppTransition {
        if game.settings.controls.confirm.matches(*key) {
            let name = self.name.trim().to_string();
            if name.is_empty() {
                return Transition::None;
            }
            self.error = None;
            return bootstrap("Creating character...", move |game| {
                let response = game.send(Command::PlayerCreate, json!({ "name": name }))?;
                Ok(Args::Response(response))
            });
        }

        match *key {
            Key::Backspace => {
                self.name.pop();
            }
            Key::Char(c) if !c.is_control() && self.name.chars().count() < MAX_NAME_LEN => {
                self.name.push(c);
            }
            _ => {}
        }
        Transition::None
    }

    fn render(&self, _game: &Game, screen: &mut Screen) {
        screen.text(1, 1, "Create your character");
        screen.text(1, 3, &format!("Name: {}_", self.name));
        if let Some(error) = &self.error {
            screen.text(1, 5, error);
        }
    }
}
