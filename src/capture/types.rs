//! Capture pipeline data model.
//!
//! `BusSample` is reconstructed from one 32-bit sampler FIFO word with an
//! explicit unpack instead of reinterpreting memory layout, so the decode
//! stays portable and the wire format is documented in exactly one place.

/// One hardware-latched snapshot of the ISA address and data lines, taken at
/// a host I/O read strobe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusSample {
    pub address_high: u8,
    pub address_low: u8,
    pub data: u8,
    /// Second data-bus readout taken while the address bank was switched.
    /// Kept for diagnostics; not part of the decoded address.
    pub raw_echo: u8,
}

impl BusSample {
    /// Unpack one sampler FIFO word.
    ///
    /// Bit layout, MSB first:
    ///
    /// ```text
    /// | 31..24  | 23..16 | 15..8  | 7..0   |
    /// | A[15:8] | echo   | A[7:0] | D[7:0] |
    /// ```
    pub fn from_fifo_word(raw: u32) -> Self {
        Self {
            address_high: (raw >> 24) as u8,
            raw_echo: (raw >> 16) as u8,
            address_low: (raw >> 8) as u8,
            data: raw as u8,
        }
    }

    /// Full 16-bit I/O port address.
    pub fn address(&self) -> u16 {
        u16::from(self.address_high) << 8 | u16::from(self.address_low)
    }
}

/// Direction of a bus-reset transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetKind {
    Active,
    Cleared,
}

/// Raw event as it crosses from interrupt context into the capture poll
/// loop. Produced only by the bus sampler and reset monitor; consumed only
/// by the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimelineEntry {
    Data(BusSample),
    Reset(ResetKind),
}

/// Optional I/O port filter applied before a sample enters the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressFilter {
    /// Forward every sample (bus dump mode).
    All,
    /// Forward only samples whose decoded address equals the target port.
    Only(u16),
}

impl AddressFilter {
    pub fn matches(&self, address: u16) -> bool {
        match *self {
            AddressFilter::All => true,
            AddressFilter::Only(target) => address == target,
        }
    }
}

/// A program the capture core can be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureProgram {
    Reader(AddressFilter),
    VoltageMonitor,
}

/// What a [`CapturedEvent`] is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    Data,
    ResetActive,
    ResetCleared,
    Volts,
}

/// Finished event, crossing from the capture core to the UI core.
///
/// Timestamps are microseconds relative to the last observed bus reset.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapturedEvent {
    pub kind: EventKind,
    pub timestamp_micros: u64,
    pub address: u16,
    pub data: u8,
    pub volts5: f32,
    pub volts12: f32,
    pub volts_n12: f32,
    /// Whether the renderer should echo this event on the display, or only
    /// on the serial line (bus dumps would overwhelm the OLED).
    pub render_hint: bool,
}

impl CapturedEvent {
    pub fn data(timestamp_micros: u64, sample: BusSample, render_hint: bool) -> Self {
        Self {
            kind: EventKind::Data,
            timestamp_micros,
            address: sample.address(),
            data: sample.data,
            volts5: 0.0,
            volts12: 0.0,
            volts_n12: 0.0,
            render_hint,
        }
    }

    pub fn reset(kind: ResetKind, timestamp_micros: u64) -> Self {
        Self {
            kind: match kind {
                ResetKind::Active => EventKind::ResetActive,
                ResetKind::Cleared => EventKind::ResetCleared,
            },
            timestamp_micros,
            address: 0,
            data: 0,
            volts5: 0.0,
            volts12: 0.0,
            volts_n12: 0.0,
            render_hint: true,
        }
    }

    pub fn volts(timestamp_micros: u64, volts5: f32, volts12: f32, volts_n12: f32) -> Self {
        Self {
            kind: EventKind::Volts,
            timestamp_micros,
            address: 0,
            data: 0,
            volts5,
            volts12,
            volts_n12,
            render_hint: true,
        }
    }
}
