//! The driving loop
//!
//! One tick per iteration: wait briefly for a key, fold in any finished
//! poll, then let the state stack handle input, update and render.

use std::time::{Duration, Instant};

use ratelimit_core::StateManager;

use crate::error::Result;
use crate::game::Game;
use crate::screen::Screen;
use crate::states::{fatal, AppMachine};
use crate::terminal::{Frontend, Input};

/// Longest wait for input before ticking anyway
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// Run until the stack empties, a state quits or the player leaves
pub fn run<F: Frontend>(
    manager: &mut StateManager<AppMachine>,
    game: &mut Game,
    frontend: &mut F,
) -> Result<()> {
    let mut screen = Screen::new(0, 0);
    let mut last_tick = Instant::now();

    while !manager.is_finished() {
        let key = match frontend.poll_key(IDLE_POLL)? {
            Some(Input::Interrupt) => {
                tracing::info!("Interrupted");
                break;
            }
            Some(Input::Key(key)) if game.settings.controls.quit.matches(key) => {
                tracing::info!("Quit key pressed");
                break;
            }
            Some(Input::Key(key)) => Some(key),
            None => None,
        };

        let now = Instant::now();
        let dt = now.duration_since(last_tick);
        last_tick = now;

        if let Err(e) = game.pump_poll(dt) {
            tracing::error!(error = %e, "Frame polling failed");
            manager.apply(game, fatal(&e))?;
        }

        let (width, height) = frontend.size()?;
        screen.reset(width, height);
        manager.tick(game, key.as_ref(), dt, &mut screen)?;
        if manager.is_finished() {
            break;
        }
        frontend.draw(&screen)?;
    }

    tracing::info!("Game loop finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::game;
    use crate::error::AppError;
    use crate::states::{registry, Args, FATAL_ERROR, JOIN_GAME};
    use ratelimit_core::Key;
    use std::collections::VecDeque;
    use std::io;

    /// Plays back keys, then interrupts
    struct Scripted {
        keys: VecDeque<Option<Input>>,
        draws: usize,
        last: Vec<String>,
    }

    impl Scripted {
        fn new(keys: impl IntoIterator<Item = Option<Input>>) -> Self {
            Self {
                keys: keys.into_iter().collect(),
                draws: 0,
                last: Vec::new(),
            }
        }

        fn shows(&self, text: &str) -> bool {
            self.last.iter().any(|l| l.contains(text))
        }
    }

    impl Frontend for Scripted {
        fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<Input>> {
            Ok(self.keys.pop_front().unwrap_or(Some(Input::Interrupt)))
        }

        fn size(&self) -> io::Result<(usize, usize)> {
            Ok((80, 24))
        }

        fn draw(&mut self, screen: &Screen) -> io::Result<()> {
            self.draws += 1;
            self.last = screen.lines().collect();
            Ok(())
        }
    }

    #[test]
    fn test_quit_key_stops_before_ticking() {
        let (mut game, script) = game("me");
        let mut sm = StateManager::new(registry());
        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        let mut frontend = Scripted::new([Some(Input::Key(Key::Esc))]);

        run(&mut sm, &mut game, &mut frontend).unwrap();

        assert_eq!(frontend.draws, 0);
        assert_eq!(script.borrow().connects, 0);
    }

    #[test]
    fn test_unreachable_server_then_quit() {
        let (mut game, script) = game("me");
        script.borrow_mut().connect_error =
            Some(|| ratelimit_net::Error::ConnectRefused("127.0.0.1:7654".to_string()));
        let mut sm = StateManager::new(registry());
        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        let mut frontend = Scripted::new([None, None, None, Some(Input::Key(Key::Char('n')))]);

        run(&mut sm, &mut game, &mut frontend).unwrap();

        assert!(sm.quit_requested());
        assert_eq!(frontend.draws, 3);
        assert!(frontend.shows("Server is hiding..."));
        assert_eq!(script.borrow().connects, 1);
    }

    #[test]
    fn test_repeated_poll_failures_are_fatal() {
        let (mut game, script) = game("me");
        game.settings.game.peek_interval_ms = 0;
        game.connect().unwrap();
        for _ in 0..3 {
            script
                .borrow_mut()
                .polls
                .push_back(Err(ratelimit_net::Error::ConnectRefused("127.0.0.1:7654".to_string())));
        }
        let mut sm = StateManager::new(registry());
        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        let mut frontend = Scripted::new([None, None, None, None, None]);

        run(&mut sm, &mut game, &mut frontend).unwrap();

        assert_eq!(sm.active(), Some(FATAL_ERROR));
        assert!(frontend.shows("Server is hiding..."));
        assert!(!game.is_connected());
        assert_eq!(script.borrow().poll_starts.len(), 3);
    }

    #[test]
    fn test_command_failure_ends_polling() {
        let (mut game, script) = game("me");
        game.settings.game.peek_interval_ms = 0;
        game.connect().unwrap();
        let mut sm = StateManager::new(registry());
        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();

        let failure = AppError::Net(ratelimit_net::Error::Protocol("Unexpected reply".to_string()));
        sm.apply(&mut game, fatal(&failure)).unwrap();
        for _ in 0..3 {
            script
                .borrow_mut()
                .polls
                .push_back(Err(ratelimit_net::Error::ConnectRefused("127.0.0.1:7654".to_string())));
        }
        let mut frontend = Scripted::new([None, None, None, None, None, None]);

        run(&mut sm, &mut game, &mut frontend).unwrap();

        assert_eq!(sm.active(), Some(FATAL_ERROR));
        assert!(!game.is_connected());
        assert!(script.borrow().poll_starts.is_empty());
        assert!(frontend.shows("Great fudge! You borked it..."));
        assert!(!frontend.shows("Server is hiding..."));
    }

    #[test]
    fn test_undecodable_frames_are_fatal() {
        let (mut game, script) = game("me");
        game.settings.game.peek_interval_ms = 0;
        game.connect().unwrap();
        script
            .borrow_mut()
            .polls
            .push_back(Err(ratelimit_net::Error::Protocol("Malformed frames response".to_string())));
        let mut sm = StateManager::new(registry());
        sm.push(&mut game, JOIN_GAME, Args::None).unwrap();
        let mut frontend = Scripted::new([None, None, None]);

        run(&mut sm, &mut game, &mut frontend).unwrap();

        assert_eq!(sm.active(), Some(FATAL_ERROR));
        assert!(!game.is_connected());
        assert_eq!(script.borrow().poll_starts.len(), 1);
        assert!(frontend.shows("Great fudge! You borked it..."));
    }
}
