// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Delayed state polls after a shade movement.

use actix::SpawnHandle;

/// Outstanding poll of a shade entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPoll<H> {
    Idle,
    /// Poll at the estimated end of a movement.
    Transition(H),
    /// Second poll some time after the transition poll.
    Resync(H),
}

/// Transition poll timer owned by a shade entity.
///
/// At most one poll is pending. Arming a new poll returns the handle of the replaced poll which
/// must be cancelled by the caller.
#[derive(Debug)]
pub struct TransitionTimer<H = SpawnHandle> {
    pending: PendingPoll<H>,
}

impl<H: Copy> TransitionTimer<H> {
    pub fn new() -> Self {
        Self {
            pending: PendingPoll::Idle,
        }
    }

    pub fn pending(&self) -> PendingPoll<H> {
        self.pending
    }

    /// Reset to idle. Returns the handle of the pending poll, if any. Calling it again is a no-op.
    pub fn cancel(&mut self) -> Option<H> {
        match std::mem::replace(&mut self.pending, PendingPoll::Idle) {
            PendingPoll::Idle => None,
            PendingPoll::Transition(h) | PendingPoll::Resync(h) => Some(h),
        }
    }

    /// Arm the transition poll, replacing any pending poll.
    pub fn arm_transition(&mut self, handle: H) -> Option<H> {
        let previous = self.cancel();
        self.pending = PendingPoll::Transition(handle);
        previous
    }

    /// Arm the resync poll, replacing any pending poll.
    pub fn arm_resync(&mut self, handle: H) -> Option<H> {
        let previous = self.cancel();
        self.pending = PendingPoll::Resync(handle);
        previous
    }

    /// The transition poll fired. Returns false if it was already replaced or cancelled.
    pub fn transition_fired(&mut self) -> bool {
        if matches!(self.pending, PendingPoll::Transition(_)) {
            self.pending = PendingPoll::Idle;
            true
        } else {
            false
        }
    }

    /// The resync poll fired. Returns false if it was already replaced or cancelled.
    pub fn resync_fired(&mut self) -> bool {
        if matches!(self.pending, PendingPoll::Resync(_)) {
            self.pending = PendingPoll::Idle;
            true
        } else {
            false
        }
    }

    /// A transition or resync poll is outstanding.
    pub fn in_progress(&self) -> bool {
        !self.is_idle()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.pending, PendingPoll::Idle)
    }
}

impl<H: Copy> Default for TransitionTimer<H> {
    fn default() -> Self {
        Self::new()
    }
}
