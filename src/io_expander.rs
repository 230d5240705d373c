//! Keypad GPIO expander (MCP23009-class part on the remote PCB).
//!
//! Only the thin slice of the register protocol the keypad needs lives
//! here: input/pull-up/interrupt setup, the latched interrupt-flag
//! register, and the live pin readout (which doubles as the latch clear).
//! Every transaction is retried a fixed number of times with a short
//! backoff before the failure escalates.

use embassy_time::{block_for, Duration};
use embedded_hal::i2c::I2c;

use crate::config;
use crate::error::Error;
use crate::keypad::KeypadPort;
use crate::retry::with_retry;

// Register map (BANK=0 addressing).
const REG_IODIR: u8 = 0x00;
const REG_IPOL: u8 = 0x01;
const REG_GPINTEN: u8 = 0x02;
const REG_DEFVAL: u8 = 0x03;
const REG_INTCON: u8 = 0x04;
const REG_GPPU: u8 = 0x06;
const REG_INTF: u8 = 0x07;
const REG_GPIO: u8 = 0x09;

// Pins 0..3 are the keys; 4..6 are board-revision straps, of which only
// the rotation strap is populated on this revision.
const MASK_KEYS: u8 = 0x0F;
const BIT_DISP_ROT: u8 = 6;

/// Read-only hardware configuration resolved once at startup from the
/// expander's strap inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardProfile {
    /// Panel mounted upside down.
    pub flipped: bool,
}

pub struct KeypadExpander<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> KeypadExpander<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            addr: config::KEYPAD_I2C_ADDR,
        }
    }

    fn backoff() {
        block_for(Duration::from_millis(1));
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        with_retry(config::KEYPAD_IO_RETRIES, Self::backoff, || {
            self.i2c.write(self.addr, &[reg, value])
        })
        .map_err(|_| Error::KeypadIo)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Error> {
        with_retry(config::KEYPAD_IO_RETRIES, Self::backoff, || {
            let mut buf = [0u8];
            self.i2c.write_read(self.addr, &[reg], &mut buf)?;
            Ok::<u8, I2C::Error>(buf[0])
        })
        .map_err(|_| Error::KeypadIo)
    }

    /// Check the part answers at all.
    pub fn probe(&mut self) -> Result<(), Error> {
        self.read_reg(REG_IODIR).map(|_| ())
    }

    /// All pins inputs with pull-ups; key pins raise the interrupt line on
    /// any change from the released state.
    pub fn configure(&mut self) -> Result<(), Error> {
        self.write_reg(REG_IODIR, 0xFF)?;
        self.write_reg(REG_IPOL, MASK_KEYS)?;
        self.write_reg(REG_GPPU, 0xFF)?;
        self.write_reg(REG_DEFVAL, 0x00)?;
        self.write_reg(REG_INTCON, MASK_KEYS)?;
        self.write_reg(REG_GPINTEN, MASK_KEYS)?;
        // Flush any latch left over from power-up.
        let _ = self.read_reg(REG_GPIO)?;
        Ok(())
    }

    /// Resolve the board-revision straps.
    pub fn read_profile(&mut self) -> Result<BoardProfile, Error> {
        let pins = self.read_reg(REG_GPIO)?;
        Ok(BoardProfile {
            flipped: pins & (1 << BIT_DISP_ROT) != 0,
        })
    }
}

impl<I2C: I2c> KeypadPort for KeypadExpander<I2C> {
    type Error = Error;

    fn interrupt_capture(&mut self) -> Result<u8, Error> {
        Ok(self.read_reg(REG_INTF)? & MASK_KEYS)
    }

    fn read_all(&mut self) -> Result<u8, Error> {
        // Reading GPIO clears the interrupt latch; the debouncer depends
        // on this.
        Ok(self.read_reg(REG_GPIO)? & MASK_KEYS)
    }
}
