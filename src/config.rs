//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and capture
//! tuning knobs live here so they can be adjusted in one place.

// Capture pipeline

/// Depth of the interrupt-to-poll-loop ring buffer. Must be a power of two.
pub const RING_DEPTH: usize = 512;

/// Depth of the cross-core event queue. Serial output is slow, but the
/// consumer should empty this faster than a host can fill it with POST codes.
pub const EVENT_QUEUE_DEPTH: usize = 256;

/// PIO clock divider for the bus sampler. At 125 MHz system clock this
/// leaves room for at least 4 samples per ISA I/O transaction (the bus
/// itself strobes reads at ~8 MHz).
pub const SAMPLER_CLKDIV: f32 = 1.8;

/// Settle window applied to bus-reset edges (µs). Tunable: field units have
/// shown both clean edges and ringing, so this is not hardcoded as zero.
pub const RESET_SETTLE_US: u64 = 0;

// Voltage monitor

/// Delay between analog rail sweeps (µs). Telemetry drops on a full
/// queue, so this only bounds the refresh rate.
pub const VOLTS_PERIOD_US: u64 = 100_000;

// Keypad

/// Keypad poll interval (µs).
pub const KEY_POLL_US: u64 = 50_000;

/// Debounce settle window (µs). A single re-read after this window rejects
/// contact bounce without polling through the bounce interval.
/// See https://www.eejournal.com/article/ultimate-guide-to-switch-debounce-part-4/
pub const KEY_SETTLE_US: u64 = 20_000;

/// Retries for expander register transactions before escalating to fatal.
pub const KEYPAD_IO_RETRIES: usize = 3;

// Standby / screensaver

/// Idle time before the display starts dimming (µs).
pub const STANDBY_TIMEOUT_US: u64 = 30_000_000;

/// Brightness range and per-tick dimming step.
pub const MAX_BRIGHTNESS: u8 = 0xFF;
pub const MIN_BRIGHTNESS: u8 = 0x10;
pub const BRIGHTNESS_STEP: u8 = 0x05;

/// Screensaver frame period (µs).
pub const SCREENSAVER_FRAME_US: u64 = 250_000;

/// Frames in the screensaver sprite cycle.
pub const SCREENSAVER_FRAMES: u8 = 10;

// Info screen

/// Credits line scrolled through the Info footer.
pub const CREDITS_LINE: &str =
    "Powered by The Retro Web | HW, fireTwoOneNine | SW, TheRealZago ";

/// Width of the scroll window (characters).
pub const CREDITS_WINDOW: usize = 20;

/// Scroll step period, and the longer pause at the wrap boundary (µs).
pub const CREDITS_STEP_US: u64 = 250_000;
pub const CREDITS_WRAP_PAUSE_US: u64 = 1_000_000;

// GPIO pin assignments (rev6 PCB defaults)
//
// These are logical names; actual `embassy_rp::peripherals::*` types are
// selected in `main.rs`.  Adjust for your own PCB revision.
//
//   ISA D0..D7       → GPIO 0..7   (PIO input base)
//   ISA A0..A7       → GPIO 8..15
//   ISA read strobe  → GPIO 16
//   Address bank sel → GPIO 17     (PIO side-set)
//   ISA RESET        → GPIO 18
//   Keypad IRQ       → GPIO 19
//   I²C0 SDA / SCL   → GPIO 20 / 21 (shared: expander + OLED)
//   Status LED       → GPIO 25
//   5V / 12V / -12V  → GPIO 26 / 27 / 28 (ADC 0 / 1 / 2)

/// I²C address of the keypad GPIO expander.
pub const KEYPAD_I2C_ADDR: u8 = 0x20;

/// I²C address of the OLED controller.
pub const OLED_I2C_ADDR: u8 = 0x3C;
