//! Unified error type for postprobe.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Fatal conditions map to a blink signature instead of a display message,
//! since the display itself may be the peripheral that is missing.

/// Recoverable peripheral errors. Everything that cannot be recovered
/// goes straight to [`FatalError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An expander register transaction failed after all retries.
    KeypadIo,

    /// I²C transaction to the display failed.
    Display,
}

/// Unrecoverable boot/runtime faults. Each maps to a distinct repeating
/// blink signature (N blinks of 250 ms, then a 1250 ms gap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalError {
    /// No usable combination of keypad/display was found at boot.
    InvalidHwConfig,
    /// The keypad GPIO expander did not respond on I²C.
    MissingKeypad,
    /// The OLED controller did not respond on I²C.
    MissingDisplay,
    /// A second capture session was started while one was running.
    SessionReentry,
}

impl FatalError {
    /// Number of blinks in this fault's repeating signature.
    pub fn blink_count(self) -> u32 {
        match self {
            FatalError::InvalidHwConfig => 1,
            FatalError::MissingKeypad => 2,
            FatalError::MissingDisplay => 3,
            FatalError::SessionReentry => 4,
        }
    }
}
