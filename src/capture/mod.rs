//! Real-time bus capture pipeline.
//!
//! Samples flow from the PIO sequencer's FIFO (interrupt context) through
//! the SPSC ring into the session poll loop, which timestamps them and
//! forwards finished events across the core boundary.

pub mod session;
pub mod types;

#[cfg(feature = "embedded")]
pub mod run;
#[cfg(feature = "embedded")]
pub mod source;

use crate::ring::Producer;
use types::{AddressFilter, BusSample, TimelineEntry};

/// Decode one sampler FIFO word and, if it passes the address filter, push
/// it into the ring. Called from interrupt context: no blocking, no
/// allocation, no logging; a full ring drops the sample.
///
/// Returns `true` if the sample was queued.
pub fn ingest_fifo_word<const N: usize>(
    producer: &mut Producer<'_, TimelineEntry, N>,
    filter: AddressFilter,
    raw: u32,
) -> bool {
    let sample = BusSample::from_fifo_word(raw);
    if !filter.matches(sample.address()) {
        return false;
    }
    producer.push(TimelineEntry::Data(sample))
}
