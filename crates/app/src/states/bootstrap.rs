//! Runs one blocking task behind a message
//!
//! The message is rendered for a frame before the task runs so the player
//! sees why the game has paused.

use std::time::Duration;

use ratelimit_core::{GameState, StateId, Transition};

use super::{fatal, AppMachine, AppTransition, Args, Task, BOOTSTRAP};
use crate::game::Game;
use crate::screen::Screen;

#[derive(Default)]
pub struct Bootstrap {
    message: String,
    task: Option<Task>,
    updates: u32,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameState<AppMachine> for Bootstrap {
    fn id(&self) -> StateId {
        BOOTSTRAP
    }

    fn enter(&mut self, _game: &mut Game, args: Args) -> AppTransition {
        match args {
            Args::Bootstrap(task) => {
                self.message = task.message.clone();
                self.task = Some(task);
            }
            _ => tracing::warn!("Bootstrap entered without a task"),
        }
        Transition::None
    }

    fn update(&mut self, game: &mut Game, _dt: Duration) -> AppTransition {
        self.updates += 1;
        if self.updates < 2 {
            return Transition::None;
        }

        let Some(task) = self.task.take() else {
            return Transition::pop();
        };

        tracing::debug!(message = %task.message, "Running bootstrap task");
        match (task.run)(game) {
            Ok(result) => Transition::Pop(result),
            Err(e) => {
                tracing::error!(error = %e, task = %task.message, "Bootstrap task failed");
                fatal(&e)
            }
        }
    }

    fn render(&self, _game: &Game, screen: &mut Screen) {
        screen.text(1, 1, &self.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::game;
    use crate::states::{bootstrap, FATAL_ERROR};
    use ratelimit_core::StateManager;
    use ratelimit_core::StateRegistry;
    use serde_json::json;

    /// Records what it was resumed with
    #[derive(Default)]
    struct Caller;

    impl GameState<AppMachine> for Caller {
        fn id(&self) -> StateId {
            "caller"
        }

        fn enter(&mut self, _game: &mut Game, _args: Args) -> AppTransition {
            bootstrap("Working...", |_| Ok(Args::Response(json!({ "ok": true }))))
        }

        fn resume(&mut self, game: &mut Game, args: Args) -> AppTransition {
            if let Args::Response(value) = args {
                game.settings.server.host = value.to_string();
            }
            Transition::None
        }
    }

    fn registry() -> StateRegistry<AppMachine> {
        let mut registry = crate::states::registry();
        registry.register("caller", Caller::default);
        registry
    }

    #[test]
    fn test_runs_on_second_update_and_pops_result() {
        let (mut game, _) = game("me");
        let mut sm = StateManager::new(registry());
        let mut screen = Screen::new(40, 5);

        sm.push(&mut game, "caller", Args::None).unwrap();
        assert_eq!(sm.active(), Some(BOOTSTRAP));

        sm.tick(&mut game, None, Duration::ZERO, &mut screen).unwrap();
        assert_eq!(sm.active(), Some(BOOTSTRAP));
        assert!(screen.lines().nth(1).unwrap().contains("Working..."));

        sm.tick(&mut game, None, Duration::ZERO, &mut screen).unwrap();
        assert_eq!(sm.active(), Some("caller"));
        assert_eq!(game.settings.server.host, r#"{"ok":true}"#);
    }

    #[test]
    fn test_task_error_collapses_to_fatal() {
        let (mut game, script) = game("me");
        let mut sm = StateManager::new(registry());

        sm.push(&mut game, "caller", Args::None).unwrap();
        sm.apply(
            &mut game,
            bootstrap("Reading party...", |game| {
                game.send(ratelimit_net::Command::PartyRead, serde_json::Value::Null)?;
                Ok(Args::None)
            }),
        )
        .unwrap();

        sm.update(&mut game, Duration::ZERO).unwrap();
        sm.update(&mut game, Duration::ZERO).unwrap();

        assert_eq!(sm.statuses().len(), 1);
        assert_eq!(sm.active(), Some(FATAL_ERROR));
        assert!(script.borrow().sent.is_empty());
    }
}
