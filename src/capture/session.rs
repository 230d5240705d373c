//! Capture session lifecycle and event assembly.
//!
//! A session owns one sampler sequencer, one reset monitor and one ring
//! buffer for the duration of a single diagnostic run. At most one session
//! may be active system-wide; the claim lives in a [`SessionSlot`] so the
//! invariant is visible in the type system instead of a global flag buried
//! in a singleton.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::capture::types::{AddressFilter, CapturedEvent, ResetKind, TimelineEntry};

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Idle,
    Armed,
    Running,
    Draining,
}

/// System-wide claim for the capture hardware. A second claim while one
/// guard is live is a programming error; callers escalate it to a fatal
/// halt rather than recovering.
pub struct SessionSlot {
    active: AtomicBool,
}

impl SessionSlot {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    /// Claim the slot. Returns `None` if a session is already active.
    pub fn claim(&self) -> Option<SessionGuard<'_>> {
        if self.active.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(SessionGuard { slot: self })
    }

    /// Whether a guard is currently live. Used by `stop()` to wait for the
    /// running loop to wind down.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII claim over the sampler hardware. Released on every exit path,
/// including unwinding out of a fatal condition on the host.
pub struct SessionGuard<'a> {
    slot: &'a SessionSlot,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::Release);
    }
}

/// Cooperative cancellation flag, observed once per loop iteration by the
/// running session. Cross-context atomic with acquire/release semantics;
/// never a blocking lock, so it stays safe next to interrupt code.
pub struct QuitFlag {
    flag: AtomicBool,
}

impl QuitFlag {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Default for QuitFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// State carried across one `start…stop` cycle: the address filter, the
/// reference point for relative timestamps, and the lifecycle stage.
pub struct CaptureSession {
    state: SessionState,
    filter: AddressFilter,
    last_reset_us: u64,
    render_hint: bool,
}

impl CaptureSession {
    pub fn new(filter: AddressFilter) -> Self {
        Self {
            state: SessionState::Idle,
            filter,
            last_reset_us: 0,
            // Bus dumps flood the display; echo them on serial only.
            render_hint: filter != AddressFilter::All,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn filter(&self) -> AddressFilter {
        self.filter
    }

    /// Hardware is claimed and programmed, not yet sampling.
    pub fn arm(&mut self) {
        debug_assert_eq!(self.state, SessionState::Idle);
        self.state = SessionState::Armed;
    }

    /// Enter the running loop. `now_us` becomes the timestamp reference
    /// until the first reset is observed.
    pub fn begin(&mut self, now_us: u64) {
        debug_assert_eq!(self.state, SessionState::Armed);
        self.last_reset_us = now_us;
        self.state = SessionState::Running;
    }

    /// The quit flag was observed; the loop is winding down.
    pub fn drain(&mut self) {
        self.state = SessionState::Draining;
    }

    /// Hardware released; back to idle.
    pub fn finish(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Turn one ring-buffer entry into a cross-context event.
    ///
    /// `Reset(Active)` re-bases the timestamp reference; `Reset(Cleared)`
    /// does not touch it a second time, so a full reset pulse yields
    /// `[ResetActive @ 0, …, ResetCleared @ pulse-width]`.
    pub fn process(&mut self, entry: TimelineEntry, now_us: u64) -> CapturedEvent {
        match entry {
            TimelineEntry::Data(sample) => {
                CapturedEvent::data(now_us - self.last_reset_us, sample, self.render_hint)
            }
            TimelineEntry::Reset(ResetKind::Active) => {
                self.last_reset_us = now_us;
                CapturedEvent::reset(ResetKind::Active, 0)
            }
            TimelineEntry::Reset(ResetKind::Cleared) => {
                CapturedEvent::reset(ResetKind::Cleared, now_us - self.last_reset_us)
            }
        }
    }
}
