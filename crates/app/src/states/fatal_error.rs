//! Terminal error screen
//!
//! Explains what went wrong and, when the failure looks like ours, offers to
//! write a crash report. Any other key quits; nothing restarts from here.

use ratelimit_core::{GameState, Key, StateId, Transition};

use super::{AppMachine, AppTransition, Args, FATAL_ERROR};
use crate::error::AppError;
use crate::game::Game;
use crate::report::CrashReport;
use crate::screen::{Rect, Screen};

/// What the error screen shows
#[derive(Debug, Clone)]
pub struct FatalInfo {
    pub title: String,
    pub summary: String,
    pub detail: Option<String>,
    pub allow_report: bool,
}

impl FatalInfo {
    pub fn from_error(error: &AppError) -> Self {
        if error.is_connect_failure() {
            return Self {
                title: "Server is hiding...".to_string(),
                summary: "Unable to connect to the game server. If you are running it locally \
                          check it is running; if you are connecting to a remote host check \
                          the host, port and password in your settings file."
                    .to_string(),
                detail: Some(error.to_string()),
                allow_report: false,
            };
        }

        Self {
            title: "Great fudge! You borked it...".to_string(),
            summary: "You can help us figure this out by sending us the error details. \
                      If you are happy to help, choose to send the report below."
                .to_string(),
            detail: Some(error.to_string()),
            allow_report: true,
        }
    }
}

impl Default for FatalInfo {
    fn default() -> Self {
        Self {
            title: "Something went wrong".to_string(),
            summary: String::new(),
            detail: None,
            allow_report: false,
        }
    }
}

#[derive(Default)]
pub struct FatalError {
    info: FatalInfo,
    report_written: Option<String>,
}

impl FatalError {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameState<AppMachine> for FatalError {
    fn id(&self) -> StateId {
        FATAL_ERROR
    }

    fn enter(&mut self, game: &mut Game, args: Args) -> AppTransition {
        if let Args::Fatal(info) = args {
            self.info = info;
        }
        // The session is over; stop polling a server we gave up on
        game.disconnect();
        tracing::error!(
            title = %self.info.title,
            detail = ?self.info.detail,
            "Fatal error"
        );
        Transition::None
    }

    fn input(&mut self, game: &mut Game, key: &Key) -> AppTransition {
        let can_report = self.info.allow_report && self.report_written.is_none();
        if !can_report || !game.settings.controls.report.matches(*key) {
            return Transition::Quit;
        }

        let report = CrashReport::new(
            game.me.as_str(),
            &self.info.title,
            &self.info.summary,
            self.info.detail.as_deref(),
        );
        match report.write(game.reports_dir()) {
            Ok(path) => self.report_written = Some(path.display().to_string()),
            Err(e) => {
                // Nothing more to do about a report that cannot be written
                tracing::error!(error = %e, "Failed to write crash report");
                return Transition::Quit;
            }
        }
        Transition::None
    }

    fn render(&self, game: &Game, screen: &mut Screen) {
        screen.border(Rect {
            x: 2,
            y: 1,
            width: screen.width().saturating_sub(4),
            height: screen.height().saturating_sub(2),
        });
        let width = screen.width().saturating_sub(10);
        screen.text(5, 2, &self.info.title);
        let mut row = 4 + screen.paragraph(5, 4, width, &self.info.summary);

        if let Some(detail) = &self.info.detail {
            row += 1;
            row += screen.paragraph(5, row, width, detail);
        }
        row += 1;

        let quit = "Press any key to quit.";
        match &self.report_written {
            Some(path) => {
                screen.paragraph(5, row, width, &format!("Report saved to {}", path));
                screen.text(5, row + 2, quit);
            }
            None if self.info.allow_report => {
                let key = game
                    .settings
                    .controls
                    .report
                    .primary()
                    .map(|k| k.to_string())
                    .unwrap_or_default();
                screen.text(5, row, &format!("[{}] Sure thing! Send the report", key));
                screen.text(5, row + 1, "[any other key] No thanks, quit");
            }
            None => screen.text(5, row, quit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::{game, game_in};
    use ratelimit_net::Error as NetError;
    use tempfile::TempDir;

    fn entered(info: FatalInfo) -> (FatalError, Game) {
        let (mut game, _) = game("me");
        let mut state = FatalError::new();
        state.enter(&mut game, Args::Fatal(info));
        (state, game)
    }

    #[test]
    fn test_connect_failures_offer_no_report() {
        let info = FatalInfo::from_error(&AppError::Net(NetError::ConnectRefused(
            "127.0.0.1:7654".to_string(),
        )));
        assert!(!info.allow_report);
        assert_eq!(info.title, "Server is hiding...");

        let handshake = FatalInfo::from_error(&AppError::Net(NetError::HandshakeFailed(
            Box::new(NetError::RequestTimeout),
        )));
        assert!(!handshake.allow_report);

        let (mut state, mut game) = entered(info);
        assert!(matches!(state.input(&mut game, &Key::Char('y')), Transition::Quit));
    }

    #[test]
    fn test_report_then_quit() {
        let temp = TempDir::new().unwrap();
        let info = FatalInfo::from_error(&AppError::Net(NetError::Protocol("bad".to_string())));
        assert!(info.allow_report);

        let (mut state, _) = entered(info);
        let (mut game, _) = game_in("me", temp.path().join("reports"));

        assert!(state.input(&mut game, &Key::Char('y')).is_none());
        let written: Vec<_> = std::fs::read_dir(temp.path().join("reports"))
            .unwrap()
            .collect();
        assert_eq!(written.len(), 1);

        // Reporting twice is not offered
        assert!(matches!(state.input(&mut game, &Key::Char('y')), Transition::Quit));
    }

    #[test]
    fn test_enter_drops_connection() {
        let (mut game, _) = game("me");
        game.connect().unwrap();
        let info = FatalInfo::from_error(&AppError::Net(NetError::Protocol("bad".to_string())));

        FatalError::new().enter(&mut game, Args::Fatal(info));

        assert!(!game.is_connected());
    }

    #[test]
    fn test_other_key_quits() {
        let info = FatalInfo::from_error(&AppError::Net(NetError::Protocol("bad".to_string())));
        let (mut state, mut game) = entered(info);
        assert!(matches!(state.input(&mut game, &Key::Char('n')), Transition::Quit));
    }

    #[test]
    fn test_render_mentions_title() {
        let info = FatalInfo::from_error(&AppError::Net(NetError::Protocol("bad".to_string())));
        let (state, game) = entered(info);
        let mut screen = Screen::new(60, 20);
        state.render(&game, &mut screen);
        assert!(screen.lines().any(|l| l.contains("Great fudge")));
        assert!(screen.lines().any(|l| l.contains("[y] Sure thing!")));
    }
}
