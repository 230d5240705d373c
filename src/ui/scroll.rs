//! Credits ticker for the Info screen.
//!
//! Scrolls a fixed string through a fixed-width window one character per
//! step, with a longer pause each time the text wraps around.

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScrollStage {
    /// Full-screen bitmap is up; ticker idle until the user scrolls down.
    DrawBitmap,
    /// Bitmap drawn, waiting.
    BitmapShown,
    /// Redraw the header, reset the ticker.
    DrawHeader,
    /// Emit the next window of text.
    DrawBlock,
    /// Waiting out the step timer.
    Wait,
}

/// Sub-stage loop of the Info screen: `DrawBitmap → DrawHeader → DrawBlock
/// → Wait → DrawBlock → …`.
pub struct TextScroller {
    stage: ScrollStage,
    source_idx: usize,
    next_step_us: u64,
}

impl TextScroller {
    pub fn new() -> Self {
        Self {
            stage: ScrollStage::DrawBitmap,
            source_idx: 0,
            next_step_us: 0,
        }
    }

    pub fn stage(&self) -> ScrollStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: ScrollStage) {
        self.stage = stage;
    }

    /// Mark the bitmap as rendered.
    pub fn bitmap_done(&mut self) {
        self.stage = ScrollStage::BitmapShown;
    }

    /// Begin (or restart) the ticker from the start of the credits line.
    pub fn start_text(&mut self) {
        self.source_idx = 0;
        self.stage = ScrollStage::DrawBlock;
    }

    /// Advance the ticker. Returns the window to draw when a step is due.
    pub fn step(&mut self, now_us: u64) -> Option<Window> {
        match self.stage {
            ScrollStage::DrawBlock => {
                let window = Window {
                    start: self.source_idx,
                };
                self.source_idx = (self.source_idx + 1) % config::CREDITS_LINE.len();
                // A wrap earns the reader a longer look at the seam.
                self.next_step_us = if self.source_idx == 0 {
                    now_us + config::CREDITS_WRAP_PAUSE_US
                } else {
                    now_us + config::CREDITS_STEP_US
                };
                self.stage = ScrollStage::Wait;
                Some(window)
            }
            ScrollStage::Wait => {
                if now_us >= self.next_step_us {
                    self.stage = ScrollStage::DrawBlock;
                }
                None
            }
            _ => None,
        }
    }
}

impl Default for TextScroller {
    fn default() -> Self {
        Self::new()
    }
}

/// A window into the credits line, resolved lazily so no text is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: usize,
}

impl Window {
    /// The visible slice, truncated at the end of the line (the pause at
    /// the wrap boundary covers the shrinking tail).
    pub fn text(&self) -> &'static str {
        let line = config::CREDITS_LINE;
        let end = (self.start + config::CREDITS_WINDOW).min(line.len());
        &line[self.start..end]
    }
}
