//! User-facing output subsystem.
//!
//! The core drives everything through the [`Renderer`] trait and never
//! touches pixels, fonts or line formatting; the embedded implementation
//! in [`display`] owns the OLED and the serial echo. Host tests substitute
//! a recording renderer.

pub mod scroll;

#[cfg(feature = "embedded")]
pub mod display;

use crate::capture::types::CapturedEvent;

/// Everything the application core needs from the display/serial side.
///
/// Layout decisions that depend on the panel geometry (128×32 vs 128×64)
/// stay inside the implementation; the core never branches on display
/// height.
pub trait Renderer {
    fn clear_screen(&mut self);
    fn draw_header(&mut self, text: &str);
    fn draw_footer(&mut self, text: &str);
    /// Draw the main menu with the highlight on `index`.
    fn draw_menu(&mut self, index: usize);
    /// Render a batch of captured events (display history + serial echo).
    fn new_data(&mut self, events: &[CapturedEvent]);
    fn set_brightness(&mut self, level: u8);
    /// Full-screen project bitmap shown at the top of the Info screen.
    fn draw_splash(&mut self);
    fn draw_screensaver(&mut self, frame: u8);
}
