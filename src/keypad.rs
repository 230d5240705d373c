//! Keypad debouncing.
//!
//! The keypad sits behind an I²C GPIO expander that latches which inputs
//! fired an interrupt. Rather than polling through the bounce interval,
//! the debouncer takes one capture when the IRQ line asserts, waits a
//! fixed settle window, then takes a single live readout: bits set in both
//! reads are genuine presses, anything else was bounce. A misfire simply
//! never reaches `PendingEvent`; it is not an error.

use crate::config;

/// Logical key bitmask, after translation from expander pin positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Keys(u8);

impl Keys {
    pub const NONE: Keys = Keys(0x00);
    pub const UP: Keys = Keys(0x01);
    pub const DOWN: Keys = Keys(0x02);
    pub const SELECT: Keys = Keys(0x04);
    pub const BACK: Keys = Keys(0x08);

    pub fn contains(self, key: Keys) -> bool {
        self.0 & key.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, key: Keys) {
        self.0 |= key.0;
    }
}

// Expander pin positions on the rev6 remote.
pub const PIN_KEY_UP: u8 = 0;
pub const PIN_KEY_DOWN: u8 = 1;
pub const PIN_KEY_SELECT: u8 = 2;
pub const PIN_KEY_BACK: u8 = 3;

/// Map a raw expander bitmask to the logical key set.
pub fn keys_from_mask(mask: u8) -> Keys {
    let mut keys = Keys::NONE;
    if mask & (1 << PIN_KEY_UP) != 0 {
        keys.insert(Keys::UP);
    }
    if mask & (1 << PIN_KEY_DOWN) != 0 {
        keys.insert(Keys::DOWN);
    }
    if mask & (1 << PIN_KEY_SELECT) != 0 {
        keys.insert(Keys::SELECT);
    }
    if mask & (1 << PIN_KEY_BACK) != 0 {
        keys.insert(Keys::BACK);
    }
    keys
}

/// Collaborator owning the expander's register protocol.
pub trait KeypadPort {
    type Error;

    /// Read the latched interrupt-flag register: which inputs triggered.
    fn interrupt_capture(&mut self) -> Result<u8, Self::Error>;

    /// Read the live pin state. On the expander this read also clears the
    /// hardware interrupt latch; the debouncer relies on that side effect.
    fn read_all(&mut self) -> Result<u8, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebounceStage {
    /// Checking the IRQ line at a fixed interval.
    Poll,
    /// IRQ seen and capture taken; waiting out the settle window.
    FirstTrigger,
    /// Confirmed keys waiting to be consumed exactly once.
    PendingEvent,
}

/// Three-state debounce machine reconciling raw interrupt activity into
/// confirmed key presses.
pub struct KeypadDebouncer {
    stage: DebounceStage,
    irq_capture: u8,
    previous: u8,
    next_poll_us: u64,
    settle_deadline_us: u64,
    current: Keys,
}

impl KeypadDebouncer {
    pub fn new() -> Self {
        Self {
            stage: DebounceStage::Poll,
            irq_capture: 0,
            previous: 0,
            next_poll_us: 0,
            settle_deadline_us: 0,
            current: Keys::NONE,
        }
    }

    pub fn stage(&self) -> DebounceStage {
        self.stage
    }

    /// Advance the machine. `irq_asserted` is the (already inverted) level
    /// of the expander's interrupt line.
    pub fn poll<P: KeypadPort>(
        &mut self,
        port: &mut P,
        irq_asserted: bool,
        now_us: u64,
    ) -> Result<(), P::Error> {
        match self.stage {
            DebounceStage::Poll => {
                if now_us >= self.next_poll_us {
                    if irq_asserted {
                        self.irq_capture = port.interrupt_capture()?;
                        self.settle_deadline_us = now_us + config::KEY_SETTLE_US;
                        self.stage = DebounceStage::FirstTrigger;
                    }
                    self.next_poll_us = now_us + config::KEY_POLL_US;
                }
            }

            DebounceStage::FirstTrigger => {
                if now_us >= self.settle_deadline_us {
                    // Clears the expander's interrupt latch as a side effect.
                    let live = port.read_all()?;
                    let persistent = self.irq_capture & live;
                    self.stage = DebounceStage::Poll;
                    if persistent != self.previous {
                        let keys = keys_from_mask(persistent);
                        if !keys.is_empty() {
                            self.current = keys;
                            self.stage = DebounceStage::PendingEvent;
                        }
                    }
                    self.previous = persistent;
                    self.irq_capture = 0;
                    self.settle_deadline_us = 0;
                }
            }

            DebounceStage::PendingEvent => {
                // Held until the owning controller consumes the keys.
            }
        }
        Ok(())
    }

    /// Consume the confirmed key set. Returns `None` unless the machine is
    /// in `PendingEvent`; consuming resets it to `Poll`.
    pub fn take(&mut self) -> Option<Keys> {
        if self.stage != DebounceStage::PendingEvent {
            return None;
        }
        let keys = self.current;
        self.current = Keys::NONE;
        self.stage = DebounceStage::Poll;
        Some(keys)
    }
}

impl Default for KeypadDebouncer {
    fn default() -> Self {
        Self::new()
    }
}
