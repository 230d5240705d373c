//! SSD1306 OLED renderer plus serial echo.
//!
//! Implements [`Renderer`] over an ssd1306 buffered-graphics driver,
//! generic over the I²C implementation so callers pass in their HAL's bus
//! handle. The serial side is one defmt statement per event.

use core::fmt::Write as _;

use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_9X18_BOLD};
use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

use crate::app::MENU;
use crate::capture::types::{CapturedEvent, EventKind};
use crate::config;
use crate::error::Error;
use crate::io_expander::BoardProfile;
use crate::ui::Renderer;

/// Type alias for the concrete display driver.
pub type Display<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// How many past data bytes stay visible in the history strip.
const HISTORY: usize = 5;

pub struct OledRenderer<I2C> {
    display: Display<I2C>,
    /// Most recent first. `None` renders as a blank slot.
    history: [Option<HistoryCell>; HISTORY],
}

#[derive(Clone, Copy)]
enum HistoryCell {
    Code(u8),
    Reset,
}

/// Initialise the display and clear the screen. Fails if the controller
/// does not answer, which the caller escalates to a fatal blink.
pub fn init<I2C>(i2c: I2C, profile: &BoardProfile) -> Result<OledRenderer<I2C>, Error>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new_custom_address(i2c, config::OLED_I2C_ADDR);
    let rotation = if profile.flipped {
        DisplayRotation::Rotate180
    } else {
        DisplayRotation::Rotate0
    };
    let mut display = Ssd1306::new(interface, DisplaySize128x64, rotation)
        .into_buffered_graphics_mode();
    display.init().map_err(|_| Error::Display)?;
    display.clear_buffer();
    let _ = display.flush();
    Ok(OledRenderer {
        display,
        history: [None; HISTORY],
    })
}

fn small() -> embedded_graphics::mono_font::MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

fn large() -> embedded_graphics::mono_font::MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_9X18_BOLD)
        .text_color(BinaryColor::On)
        .build()
}

impl<I2C> OledRenderer<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    fn clear_band(&mut self, y: i32, height: u32) {
        let _ = Rectangle::new(Point::new(0, y), Size::new(128, height))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
            .draw(&mut self.display);
    }

    fn shift_history(&mut self, cell: HistoryCell) {
        self.history.rotate_right(1);
        self.history[0] = Some(cell);
    }

    fn draw_history(&mut self) {
        self.clear_band(18, 46);

        for (slot, cell) in self.history.iter().enumerate() {
            let Some(cell) = *cell else { continue };
            let mut text: heapless::String<4> = heapless::String::new();
            match cell {
                HistoryCell::Code(code) => {
                    let _ = write!(text, "{:02X}", code);
                }
                HistoryCell::Reset => {
                    let _ = text.push_str("R!");
                }
            }
            if slot == 0 {
                let _ = Text::new(text.as_str(), Point::new(96, 36), large())
                    .draw(&mut self.display);
            } else {
                let x = 96 - 24 * slot as i32;
                let _ =
                    Text::new(text.as_str(), Point::new(x, 32), small()).draw(&mut self.display);
            }
        }

        let _ = self.display.flush();
    }

    fn echo_serial(event: &CapturedEvent) {
        let millis = event.timestamp_micros / 1000;
        match event.kind {
            EventKind::Data => defmt::info!(
                "{}.{} | {:02x} @ {:04x}h",
                millis,
                event.timestamp_micros % 1000,
                event.data,
                event.address
            ),
            EventKind::ResetActive => defmt::info!("Reset asserted"),
            EventKind::ResetCleared => defmt::info!("Reset cleared"),
            EventKind::Volts => defmt::info!(
                "{}.{} | 5 V @ {} | 12 V @ {} | -12 V @ {}",
                millis,
                event.timestamp_micros % 1000,
                event.volts5,
                event.volts12,
                event.volts_n12
            ),
        }
    }
}

impl<I2C> Renderer for OledRenderer<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    fn clear_screen(&mut self) {
        self.display.clear_buffer();
        self.history = [None; HISTORY];
        let _ = self.display.flush();
    }

    fn draw_header(&mut self, text: &str) {
        self.clear_band(0, 12);
        let _ = Text::new(text, Point::new(1, 8), small()).draw(&mut self.display);
        let _ = Line::new(Point::new(0, 11), Point::new(90, 11))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut self.display);
        let _ = self.display.flush();
    }

    fn draw_footer(&mut self, text: &str) {
        self.clear_band(52, 12);
        let _ = Text::new(text, Point::new(1, 61), small()).draw(&mut self.display);
        let _ = self.display.flush();
    }

    fn draw_menu(&mut self, index: usize) {
        self.display.clear_buffer();

        // Previous, highlighted, next: a three-row window onto the menu.
        if index > 0 {
            let _ = Text::new(MENU[index - 1].1, Point::new(2, 18), small())
                .draw(&mut self.display);
        }
        let _ = Text::new(MENU[index].1, Point::new(2, 34), small()).draw(&mut self.display);
        let _ = Rectangle::new(Point::new(0, 24), Size::new(116, 14))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut self.display);
        if index < MENU.len() - 1 {
            let _ = Text::new(MENU[index + 1].1, Point::new(2, 50), small())
                .draw(&mut self.display);
        }

        let _ = self.display.flush();
    }

    fn new_data(&mut self, events: &[CapturedEvent]) {
        for event in events {
            Self::echo_serial(event);

            if !event.render_hint {
                continue;
            }
            match event.kind {
                EventKind::Data => {
                    self.shift_history(HistoryCell::Code(event.data));
                    self.draw_history();
                }
                EventKind::ResetActive => {
                    self.shift_history(HistoryCell::Reset);
                    self.draw_history();
                }
                EventKind::ResetCleared => {}
                EventKind::Volts => {
                    self.clear_band(18, 34);
                    let mut line: heapless::String<24> = heapless::String::new();
                    let _ = write!(line, "{:.2}V  {:.2}V", event.volts5, event.volts12);
                    let _ =
                        Text::new(line.as_str(), Point::new(5, 32), small()).draw(&mut self.display);
                    let mut neg: heapless::String<12> = heapless::String::new();
                    let _ = write!(neg, "{:.2}V", event.volts_n12);
                    let _ =
                        Text::new(neg.as_str(), Point::new(5, 46), small()).draw(&mut self.display);
                    let _ = self.display.flush();
                }
            }
        }
    }

    fn set_brightness(&mut self, level: u8) {
        let brightness = match level {
            0x00..=0x2F => Brightness::DIMMEST,
            0x30..=0x6F => Brightness::DIM,
            0x70..=0xAF => Brightness::NORMAL,
            0xB0..=0xDF => Brightness::BRIGHT,
            _ => Brightness::BRIGHTEST,
        };
        let _ = self.display.set_brightness(brightness);
    }

    fn draw_splash(&mut self) {
        self.display.clear_buffer();
        let _ = Text::new("postprobe", Point::new(18, 28), large()).draw(&mut self.display);
        let _ = Line::new(Point::new(0, 36), Point::new(128, 36))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut self.display);
        let _ = Text::new(
            concat!("v", env!("CARGO_PKG_VERSION")),
            Point::new(80, 50),
            small(),
        )
        .draw(&mut self.display);
        let _ = self.display.flush();
    }

    fn draw_screensaver(&mut self, frame: u8) {
        self.display.clear_buffer();
        // A box bouncing along the diagonal; one step per frame.
        let x = 8 + i32::from(frame) * 10;
        let y = 8 + i32::from(frame % 5) * 8;
        let _ = Rectangle::new(Point::new(x, y), Size::new(16, 12))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut self.display);
        let _ = self.display.flush();
    }
}
