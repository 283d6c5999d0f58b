//! Catch-up and replay
//!
//! Each gameplay state keeps its own cursor into the frame stream and moves
//! it toward the server's frame number once per tick. Observers replay at a
//! fixed rate and never fall more than `max_frame_lag` frames behind; the
//! authoritative actor already sees its own moves and simply snaps forward.

use crate::settings::GameSettings;

/// What one catch-up call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing to do this tick
    Idle,
    /// Authoritative actor jumped straight to the server frame
    Snapped { from: u64, to: u64 },
    /// First call for this cursor; history skipped
    Started,
    /// Fell too far behind; the frames in between are dropped unapplied
    Clamped { from: u64, to: u64 },
    /// Advanced by one; the caller applies this frame
    Replay(u64),
}

#[derive(Debug, Clone, Default)]
pub struct ReplayCursor {
    local_frame_no: u64,
    started: bool,
    accumulator: f64,
}

impl ReplayCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last frame reflected by the owning state
    pub fn local(&self) -> u64 {
        self.local_frame_no
    }

    /// Move the cursor toward `server_frame_no`.
    ///
    /// `dt` is the tick length in seconds. Frames passed over by a snap or a
    /// clamp are not replayed; the caller decides whether any of their
    /// fields still matter.
    pub fn catch_up(
        &mut self,
        server_frame_no: u64,
        authoritative: bool,
        dt: f64,
        settings: &GameSettings,
    ) -> Step {
        if authoritative {
            self.started = true;
            self.accumulator = 0.0;
            if self.local_frame_no >= server_frame_no {
                return Step::Idle;
            }
            let from = self.local_frame_no;
            self.local_frame_no = server_frame_no;
            return Step::Snapped {
                from,
                to: server_frame_no,
            };
        }

        if !self.started {
            self.started = true;
            self.local_frame_no = server_frame_no;
            self.accumulator = 0.0;
            return Step::Started;
        }

        let floor = server_frame_no.saturating_sub(settings.max_frame_lag);
        if self.local_frame_no < floor {
            let from = self.local_frame_no;
            self.local_frame_no = floor;
            self.accumulator = 0.0;
            tracing::debug!(from = from, to = floor, "Replay clamped to lag limit");
            return Step::Clamped { from, to: floor };
        }

        if self.local_frame_no >= server_frame_no {
            self.accumulator = 0.0;
            return Step::Idle;
        }

        if dt <= 0.0 || settings.replay_frame_rate <= 0.0 {
            return Step::Idle;
        }

        self.accumulator += dt;
        if self.accumulator > 1.0 / settings.replay_frame_rate {
            self.accumulator = 0.0;
            self.local_frame_no += 1;
            return Step::Replay(self.local_frame_no);
        }

        Step::Idle
    }
}
