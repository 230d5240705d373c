//! Display standby and screensaver state machine.
//!
//! Everything is driven by elapsed idle time since the last recorded
//! activity. Any activity-driven exit from a dimmed stage restores full
//! brightness in the same tick as the stage change, so the user never sees
//! a stale dim frame.

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StandbyStage {
    Active,
    Dimming,
    Standby,
    Screensaver,
}

/// What the owning controller has to act on after a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// New brightness to push to the renderer, if it changed.
    pub brightness: Option<u8>,
    /// Stage left Dimming/Standby/Screensaver due to activity; the current
    /// screen needs a full redraw.
    pub woke: bool,
    /// Screensaver frame to draw.
    pub frame: Option<u8>,
}

pub struct StandbyController {
    stage: StandbyStage,
    brightness: u8,
    last_activity_us: u64,
    frame: u8,
    next_frame_us: u64,
}

impl StandbyController {
    pub fn new(now_us: u64) -> Self {
        Self {
            stage: StandbyStage::Active,
            brightness: config::MAX_BRIGHTNESS,
            last_activity_us: now_us,
            frame: 0,
            next_frame_us: 0,
        }
    }

    /// Record user activity (a confirmed key press, or fresh capture data
    /// worth lighting the display for).
    pub fn touch(&mut self, now_us: u64) {
        self.last_activity_us = now_us;
    }

    pub fn stage(&self) -> StandbyStage {
        self.stage
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Advance the machine. `in_main_menu` gates the screensaver: it only
    /// runs over the menu, never over live capture output.
    pub fn tick(&mut self, now_us: u64, in_main_menu: bool) -> TickOutcome {
        let idle = now_us.saturating_sub(self.last_activity_us);
        let mut outcome = TickOutcome::default();
        let mut new_brightness = self.brightness;

        match self.stage {
            StandbyStage::Active => {
                if idle > config::STANDBY_TIMEOUT_US {
                    self.stage = StandbyStage::Dimming;
                }
            }

            StandbyStage::Dimming => {
                if idle <= config::STANDBY_TIMEOUT_US {
                    new_brightness = config::MAX_BRIGHTNESS;
                    self.stage = StandbyStage::Active;
                    outcome.woke = true;
                } else {
                    new_brightness = self.brightness.saturating_sub(config::BRIGHTNESS_STEP);
                    if new_brightness <= config::MIN_BRIGHTNESS {
                        new_brightness = config::MIN_BRIGHTNESS;
                        self.stage = StandbyStage::Standby;
                    }
                }
            }

            StandbyStage::Standby => {
                if in_main_menu && idle > config::STANDBY_TIMEOUT_US * 2 {
                    self.frame = 0;
                    self.next_frame_us = now_us;
                    self.stage = StandbyStage::Screensaver;
                } else if idle <= config::STANDBY_TIMEOUT_US {
                    new_brightness = config::MAX_BRIGHTNESS;
                    self.stage = StandbyStage::Active;
                    outcome.woke = true;
                }
            }

            StandbyStage::Screensaver => {
                if idle <= config::STANDBY_TIMEOUT_US {
                    new_brightness = config::MAX_BRIGHTNESS;
                    self.stage = StandbyStage::Active;
                    outcome.woke = true;
                } else if now_us >= self.next_frame_us {
                    outcome.frame = Some(self.frame);
                    self.frame = (self.frame + 1) % config::SCREENSAVER_FRAMES;
                    self.next_frame_us = now_us + config::SCREENSAVER_FRAME_US;
                }
            }
        }

        if new_brightness != self.brightness {
            self.brightness = new_brightness;
            outcome.brightness = Some(new_brightness);
        }

        outcome
    }
}
