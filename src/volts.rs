//! Analog rail telemetry.
//!
//! Runs beside the capture session on the same core, at a fixed ~100 ms
//! cadence. Voltage events are enqueued non-blocking and dropped on a full
//! queue: the next sweep replaces them anyway, so telemetry never applies
//! backpressure to the UI core.

use crate::capture::types::CapturedEvent;
use crate::config;

/// One sweep of the monitored supply rails, already calibrated to volts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RailVolts {
    pub volts5: f32,
    pub volts12: f32,
    pub volts_n12: f32,
}

/// Fixed-cadence pacing for the sampling loop.
pub struct VoltageSampler {
    next_due_us: u64,
}

impl VoltageSampler {
    pub fn new(now_us: u64) -> Self {
        Self { next_due_us: now_us }
    }

    /// True once per [`config::VOLTS_PERIOD_US`] window. Advances the
    /// deadline from "now" rather than the previous deadline, so a stalled
    /// loop does not burst to catch up.
    pub fn due(&mut self, now_us: u64) -> bool {
        if now_us < self.next_due_us {
            return false;
        }
        self.next_due_us = now_us + config::VOLTS_PERIOD_US;
        true
    }

    pub fn event(reading: RailVolts, timestamp_micros: u64) -> CapturedEvent {
        CapturedEvent::volts(
            timestamp_micros,
            reading.volts5,
            reading.volts12,
            reading.volts_n12,
        )
    }
}

#[cfg(feature = "embedded")]
pub use hw::AdcRails;

#[cfg(feature = "embedded")]
mod hw {
    use embassy_rp::adc::{Adc, Async, Channel, Error as AdcError};

    use super::RailVolts;

    // Divider ratios for the monitoring inputs, referenced to the 3.3 V
    // ADC full scale over 12 bits.
    const LSB_VOLTS: f32 = 3.3 / 4096.0;
    const FACTOR_5V: f32 = 2.0;
    const FACTOR_12V: f32 = 4.7;
    const FACTOR_N12V: f32 = -4.7;

    /// The three monitored rails behind the on-chip ADC.
    pub struct AdcRails<'d> {
        adc: Adc<'d, Async>,
        ch_5v: Channel<'d>,
        ch_12v: Channel<'d>,
        ch_n12v: Channel<'d>,
    }

    impl<'d> AdcRails<'d> {
        pub fn new(
            adc: Adc<'d, Async>,
            ch_5v: Channel<'d>,
            ch_12v: Channel<'d>,
            ch_n12v: Channel<'d>,
        ) -> Self {
            Self {
                adc,
                ch_5v,
                ch_12v,
                ch_n12v,
            }
        }

        pub async fn sweep(&mut self) -> Result<RailVolts, AdcError> {
            let raw5 = self.adc.read(&mut self.ch_5v).await?;
            let raw12 = self.adc.read(&mut self.ch_12v).await?;
            let raw_n12 = self.adc.read(&mut self.ch_n12v).await?;
            Ok(RailVolts {
                volts5: f32::from(raw5) * LSB_VOLTS * FACTOR_5V,
                volts12: f32::from(raw12) * LSB_VOLTS * FACTOR_12V,
                volts_n12: f32::from(raw_n12) * LSB_VOLTS * FACTOR_N12V,
            })
        }
    }

}
