//! Fatal-condition halt with blink signatures.
//!
//! Fatal faults present only as a repeating LED pattern: the display may
//! be the very peripheral that went missing, so it cannot be trusted for
//! error reporting.

use core::cell::RefCell;

use embassy_rp::gpio::Output;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{block_for, Duration};

use crate::error::FatalError;

static LED: Mutex<CriticalSectionRawMutex, RefCell<Option<Output<'static>>>> =
    Mutex::new(RefCell::new(None));

/// Hand over the status LED at boot so a later fault can blink it.
pub fn register_led(led: Output<'static>) {
    LED.lock(|cell| cell.replace(Some(led)));
}

/// Halt forever, blinking the fault signature: N blinks of 250 ms, then a
/// 1250 ms gap. Never returns, never recovers.
pub fn halt(fault: FatalError) -> ! {
    defmt::error!("fatal: {} ({} blinks)", fault, fault.blink_count());

    let led = LED.lock(|cell| cell.take());
    let Some(mut led) = led else {
        // Fault before the LED was registered; park the core.
        loop {
            cortex_m::asm::wfe();
        }
    };

    loop {
        for _ in 0..fault.blink_count() {
            led.set_high();
            block_for(Duration::from_millis(250));
            led.set_low();
            block_for(Duration::from_millis(250));
        }
        block_for(Duration::from_millis(1250));
    }
}
