//! Frame ledger
//!
//! Sparse table of authoritative frames plus the two counters that track how
//! far the client has seen the stream. Only the poll-merge step writes here.

use std::collections::BTreeMap;

use crate::frame::{Frame, FrameRecord};
use crate::invariants::assert_ledger_invariants;

/// What a poll result did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorb {
    /// First result of the session; counters recorded, history not fetched
    Synced,
    /// New frames merged and counters moved forward
    Advanced { from: u64, to: u64 },
    /// Nothing new upstream
    Unchanged,
    /// Older than what is already recorded; discarded
    Stale,
}

#[derive(Debug, Default)]
pub struct FrameLedger {
    client_frame_no: u64,
    server_frame_no: u64,
    frames: BTreeMap<u64, Frame>,
    synced: bool,
}

impl FrameLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_frame_no(&self) -> u64 {
        self.client_frame_no
    }

    pub fn server_frame_no(&self) -> u64 {
        self.server_frame_no
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Last frame number the next poll should fetch after, or `None` before
    /// the first sync
    pub fn known(&self) -> Option<u64> {
        self.synced.then_some(self.server_frame_no)
    }

    pub fn get(&self, frame_no: u64) -> Option<&Frame> {
        self.frames.get(&frame_no)
    }

    /// Held frames numbered `after + 1 ..= through`, in order
    pub fn range(&self, after: u64, through: u64) -> impl Iterator<Item = &Frame> + '_ {
        let start = after.saturating_add(1);
        let frames = (start <= through).then(|| self.frames.range(start..=through));
        frames.into_iter().flatten().map(|(_, frame)| frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Merge one poll result.
    ///
    /// `server_frame_no` is what `peek` reported; `frames` are whatever
    /// `get_frames` returned for the missing range (possibly nothing).
    pub fn absorb(
        &mut self,
        server_frame_no: u64,
        frames: impl IntoIterator<Item = (u64, FrameRecord)>,
    ) -> Absorb {
        if !self.synced {
            self.synced = true;
            self.server_frame_no = server_frame_no;
            self.client_frame_no = server_frame_no;
            tracing::info!(frame_no = server_frame_no, "Frame ledger synced");
            assert_ledger_invariants(self);
            return Absorb::Synced;
        }

        if server_frame_no < self.server_frame_no {
            tracing::debug!(
                reported = server_frame_no,
                recorded = self.server_frame_no,
                "Discarding stale poll result"
            );
            return Absorb::Stale;
        }

        if server_frame_no == self.server_frame_no {
            return Absorb::Unchanged;
        }

        let from = self.server_frame_no;
        let mut merged = 0usize;
        for (frame_no, record) in frames {
            if frame_no <= from || frame_no > server_frame_no {
                tracing::warn!(frame_no = frame_no, from = from, to = server_frame_no, "Frame outside requested range");
                continue;
            }
            self.frames.insert(frame_no, Frame::new(frame_no, record));
            merged += 1;
        }

        self.server_frame_no = server_frame_no;
        self.client_frame_no = server_frame_no;
        tracing::debug!(from = from, to = server_frame_no, merged = merged, "Frames merged");
        assert_ledger_invariants(self);
        Absorb::Advanced {
            from,
            to: server_frame_no,
        }
    }

    /// Drop frames every consumer has already replayed
    pub fn prune_through(&mut self, frame_no: u64) {
        self.frames = self.frames.split_off(&frame_no.saturating_add(1));
    }
}
