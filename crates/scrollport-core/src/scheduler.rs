#![forbid(unsafe_code)]

//! Coalescing of deferred reconciliation passes.
//!
//! Scroll and content-change notifications can arrive many times between two
//! host ticks. Each deferred operation is a tiny `idle -> scheduled -> idle`
//! state machine ([`Deferred`]): only the first request after a flush arms a
//! host callback, and every later request folds into the pending one.
//!
//! # Usage
//!
//! ```
//! use scrollport_core::scheduler::{PassKind, RedrawScheduler};
//!
//! let mut scheduler = RedrawScheduler::new();
//! assert!(scheduler.schedule_redraw()); // arm one callback
//! assert!(!scheduler.schedule_redraw()); // coalesced
//! assert!(!scheduler.schedule_redraw()); // coalesced
//!
//! // The host callback fires.
//! assert_eq!(scheduler.run_pending(), Some(PassKind::Redraw));
//! assert!(scheduler.begin_pass());
//! scheduler.finish_pass();
//! assert_eq!(scheduler.run_pending(), None);
//! assert_eq!(scheduler.passes_run(), 1);
//! assert_eq!(scheduler.requests_coalesced(), 2);
//! ```

use tracing::{debug, trace};

/// The host's way of arranging for a callback after the current handler.
///
/// Called once per idle -> scheduled transition.
pub trait TickRequester {
    fn request_tick(&mut self);
}

impl<F: FnMut()> TickRequester for F {
    fn request_tick(&mut self) {
        self();
    }
}

/// One deferred operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deferred {
    scheduled: bool,
}

impl Deferred {
    #[must_use]
    pub const fn new() -> Self {
        Self { scheduled: false }
    }

    /// Request the operation. Returns `true` only on the idle -> scheduled
    /// transition, i.e. when the caller must arm a callback.
    pub fn schedule(&mut self) -> bool {
        let armed = !self.scheduled;
        self.scheduled = true;
        armed
    }

    /// Consume a pending request. Returns whether one was pending.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.scheduled)
    }

    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.scheduled
    }
}

/// Which pass a flush should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Reconcile against the current scroll position.
    Redraw,
    /// Drop the window, then reconcile (implies a redraw).
    Invalidate,
}

/// Redraw and invalidate deferrals plus the single-pass guard.
#[derive(Debug, Clone, Default)]
pub struct RedrawScheduler {
    redraw: Deferred,
    invalidate: Deferred,
    in_flight: bool,
    passes_run: u64,
    requests_coalesced: u64,
}

impl RedrawScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when a host callback must be armed: only when nothing
    /// at all was pending, since one flush serves both deferrals.
    pub fn schedule_redraw(&mut self) -> bool {
        let idle = !self.is_pending();
        Self::request(&mut self.redraw, &mut self.requests_coalesced, PassKind::Redraw) && idle
    }

    /// Returns `true` when a host callback must be armed. See
    /// [`Self::schedule_redraw`].
    pub fn schedule_invalidate(&mut self) -> bool {
        let idle = !self.is_pending();
        Self::request(&mut self.invalidate, &mut self.requests_coalesced, PassKind::Invalidate)
            && idle
    }

    fn request(deferred: &mut Deferred, coalesced: &mut u64, kind: PassKind) -> bool {
        let transitioned = deferred.schedule();
        if transitioned {
            trace!(target: "scrollport::scheduler", kind = ?kind, "scheduled");
        } else {
            *coalesced += 1;
            trace!(target: "scrollport::scheduler", kind = ?kind, "coalesced");
        }
        transitioned
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.redraw.is_scheduled() || self.invalidate.is_scheduled()
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Consume the pending requests and report which pass to run.
    ///
    /// Returns `None` when nothing is pending or a pass is already in flight;
    /// in the latter case the requests stay pending for the next flush.
    pub fn run_pending(&mut self) -> Option<PassKind> {
        if self.in_flight {
            debug!(target: "scrollport::scheduler", "flush deferred: pass in flight");
            return None;
        }
        if self.invalidate.take() {
            self.redraw.take();
            return Some(PassKind::Invalidate);
        }
        self.redraw.take().then_some(PassKind::Redraw)
    }

    /// Claim the window for a pass. Refuses while another pass runs.
    pub fn begin_pass(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn finish_pass(&mut self) {
        if self.in_flight {
            self.in_flight = false;
            self.passes_run += 1;
        }
    }

    #[must_use]
    pub fn passes_run(&self) -> u64 {
        self.passes_run
    }

    #[must_use]
    pub fn requests_coalesced(&self) -> u64 {
        self.requests_coalesced
    }
}
