//! Connects and joins the running game

use std::time::Duration;

use ratelimit_core::{GameState, StateId, Transition};
use ratelimit_net::Command;
use serde::Deserialize;
use serde_json::Value;

use super::{bootstrap, AppMachine, AppTransition, Args, CREATE_CHARACTER, IN_GAME, JOIN_GAME};
use crate::game::Game;
use crate::screen::Screen;

const JOIN_INTERVAL: Duration = Duration::from_secs(1);

const NOT_REGISTERED: &str = "player_not_registered";
const PARTY_AWAY: &str = "party_not_in_overworld";

/// `game:join` reply
#[derive(Debug, Deserialize)]
struct JoinReply {
    #[serde(default)]
    joined: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub struct JoinGame {
    status: String,
    connected: bool,
    /// Time left before the next join attempt
    wait: Duration,
}

impl JoinGame {
    pub fn new() -> Self {
        Self {
            status: "Attempting to join game...".to_string(),
            connected: false,
            wait: Duration::ZERO,
        }
    }

    fn handle_reply(&mut self, response: Value) -> AppTransition {
        let reply: JoinReply = match serde_json::from_value(response) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed join reply");
                return Transition::None;
            }
        };

        if reply.joined {
            tracing::info!("Joined game");
            return Transition::collapse(IN_GAME);
        }

        match reply.reason.as_deref() {
            Some(NOT_REGISTERED) => Transition::collapse(CREATE_CHARACTER),
            Some(PARTY_AWAY) => {
                self.status = "Waiting for party to return to overworld...".to_string();
                Transition::None
            }
            other => {
                tracing::warn!(reason = ?other, "Join refused");
                self.status = format!("Unable to join ({}), retrying...", other.unwrap_or("no reason given"));
                Transition::None
            }
        }
    }
}

impl GameState<AppMachine> for JoinGame {
    fn id(&self) -> StateId {
        JOIN_GAME
    }

    fn enter(&mut self, game: &mut Game, _args: Args) -> AppTransition {
        if game.is_connected() {
            self.connected = true;
            return Transition::None;
        }
        bootstrap("Connecting to server...", |game| {
            game.connect()?;
            Ok(Args::Connected)
        })
    }

    fn resume(&mut self, _game: &mut Game, args: Args) -> AppTransition {
        match args {
            Args::Connected => {
                self.connected = true;
                Transition::None
            }
            Args::Response(response) => self.handle_reply(response),
            _ => Transition::None,
        }
    }

    fn update(&mut self, _game: &mut Game, dt: Duration) -> AppTransition {
        if !self.connected {
            return Transition::None;
        }

        self.wait = self.wait.saturating_sub(dt);
        if !self.wait.is_zero() {
            return Transition::None;
        }
        self.wait = JOIN_INTERVAL;

        bootstrap(self.status.clone(), |game| {
            Ok(Args::Response(game.send(Command::GameJoin, Value::Null)?))
        })
    }

    fn render(&self, _game: &Game, screen: &mut Screen) {
        screen.text(1, 1, &self.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::game;
    use crate::states::{registry, AppMachine, FATAL_ERROR, OVERWORLD};
    use ratelimit_core::StateManager;
    use serde_json::json;

    fn run(
        sm: &mut StateManager<AppMachine>,
        game: &mut Game,
        ticks: usize,
        dt: Duration,
    ) {
        let mut screen = Screen::new(80, 24);
        for _ in 0..ticks {
            if sm.is_finished() {
                break;
            }
            sm.tick(game, None, dt, &mut screen).unwrap();
        }
    }

    #[test]
    fn test_connect_then_join() {
        let (mut game, script) = game("me");
        script
            .borrow_mut()
            .replies
            .push_back(Ok(json!({ "joined": true })));
        let mut sm = StateManager::new(registry());

        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        run(&mut sm, &mut game, 5, Duration::from_millis(100));

        assert_eq!(script.borrow().connects, 1);
        assert_eq!(script.borrow().count(Command::GameJoin), 1);
        // Joined: in game, which went straight on to the overworld
        assert_eq!(sm.statuses().first().map(|(id, _)| *id), Some(IN_GAME));
        assert!(sm.statuses().iter().any(|(id, _)| *id == OVERWORLD));
    }

    #[test]
    fn test_unregistered_player_creates_character() {
        let (mut game, script) = game("me");
        script
            .borrow_mut()
            .replies
            .push_back(Ok(json!({ "joined": false, "reason": "player_not_registered" })));
        let mut sm = StateManager::new(registry());

        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        run(&mut sm, &mut game, 5, Duration::from_millis(100));

        assert_eq!(sm.active(), Some(CREATE_CHARACTER));
        assert_eq!(sm.statuses().len(), 1);
    }

    #[test]
    fn test_waits_for_party_and_retries_once_per_second() {
        let (mut game, script) = game("me");
        for _ in 0..5 {
            script
                .borrow_mut()
                .replies
                .push_back(Ok(json!({ "joined": false, "reason": "party_not_in_overworld" })));
        }
        let mut sm = StateManager::new(registry());

        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        // Connect bootstrap (2 ticks), join scheduled (1), join bootstrap (2)
        run(&mut sm, &mut game, 5, Duration::from_millis(100));
        assert_eq!(script.borrow().count(Command::GameJoin), 1);
        assert_eq!(sm.active(), Some(JOIN_GAME));

        let mut screen = Screen::new(80, 24);
        sm.render(&game, &mut screen).unwrap();
        assert!(screen
            .lines()
            .any(|l| l.contains("Waiting for party to return to overworld...")));

        // Under a second later: no new attempt
        run(&mut sm, &mut game, 5, Duration::from_millis(100));
        assert_eq!(script.borrow().count(Command::GameJoin), 1);

        run(&mut sm, &mut game, 10, Duration::from_millis(100));
        assert_eq!(script.borrow().count(Command::GameJoin), 2);
    }

    #[test]
    fn test_handshake_failure_is_fatal_once() {
        let (mut game, script) = game("me");
        script.borrow_mut().connect_error = Some(|| {
            ratelimit_net::Error::HandshakeFailed(Box::new(ratelimit_net::Error::RequestTimeout))
        });
        let mut sm = StateManager::new(registry());

        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        let mut fatal_ticks = 0;
        let mut screen = Screen::new(80, 24);
        for _ in 0..10 {
            let before = sm.active();
            sm.tick(&mut game, None, Duration::from_millis(100), &mut screen).unwrap();
            if before != Some(FATAL_ERROR) && sm.active() == Some(FATAL_ERROR) {
                fatal_ticks += 1;
            }
        }

        assert_eq!(fatal_ticks, 1);
        assert_eq!(sm.statuses(), vec![(FATAL_ERROR, ratelimit_core::Status::Active)]);
        assert_eq!(script.borrow().connects, 1);
        assert!(script.borrow().sent.is_empty());
    }
}
