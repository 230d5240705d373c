//! Hardware side of the capture pipeline: the PIO bus sampler and the
//! reset edge monitor.
//!
//! One PIO state machine waits for the ISA read strobe, then latches the
//! data bus plus both address banks into a single 32-bit RX-FIFO word.
//! The sampling itself is fast enough that the bus could be read four
//! times within one host transaction, so the strobe edge always finds
//! stable lines.
//!
//! The producer task is the only writer into the event ring. It drains the
//! RX FIFO completely on every wakeup to avoid re-triggering storms, and
//! merges reset edges through a `select` so both sources funnel through a
//! single push point.

use embassy_futures::select::{select3, Either3};
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{
    Common, Config, Direction, FifoJoin, Pio, PioPin, ShiftDirection, StateMachine,
};
use embassy_time::{Duration, Timer};
use fixed::traits::ToFixed;

use crate::capture::ingest_fifo_word;
use crate::capture::session::QuitFlag;
use crate::capture::types::{AddressFilter, ResetKind, TimelineEntry};
use crate::config;
use crate::ring::Producer;

/// A configured, disabled bus sampler. Enabling it starts latching one
/// FIFO word per read strobe.
pub struct BusEventSource<'d> {
    sm: StateMachine<'d, PIO0, 0>,
}

impl<'d> BusEventSource<'d> {
    /// Load the sampler program and wire up the bus pins. See module docs
    /// for the captured word layout:
    /// `| A[15:8] | echo | A[7:0] | D[7:0] |`, shifted in LSB-first.
    pub fn configure(
        common: &mut Common<'d, PIO0>,
        mut sm: StateMachine<'d, PIO0, 0>,
        d0: impl PioPin,
        d1: impl PioPin,
        d2: impl PioPin,
        d3: impl PioPin,
        d4: impl PioPin,
        d5: impl PioPin,
        d6: impl PioPin,
        d7: impl PioPin,
        a0: impl PioPin,
        a1: impl PioPin,
        a2: impl PioPin,
        a3: impl PioPin,
        a4: impl PioPin,
        a5: impl PioPin,
        a6: impl PioPin,
        a7: impl PioPin,
        strobe: impl PioPin,
        bank: impl PioPin,
    ) -> Self {
        let prg = pio_proc::pio_asm!(
            ".side_set 1",
            ".wrap_target",
            // Wait out the previous transaction, then catch the rising
            // edge of the ISA read strobe with the low bank selected.
            "wait 0 pin 16      side 0",
            "wait 1 pin 16      side 0",
            // D[7:0] + A[7:0], then flip the bank mux for the high byte.
            "in pins, 16        side 1",
            // One spare cycle for the mux to settle.
            "nop                side 1 [1]",
            // D echo + A[15:8]; autopush fires at 32 bits.
            "in pins, 16        side 0",
            ".wrap",
        );

        let loaded = common.load_program(&prg.program);

        let d0 = common.make_pio_pin(d0);
        let d1 = common.make_pio_pin(d1);
        let d2 = common.make_pio_pin(d2);
        let d3 = common.make_pio_pin(d3);
        let d4 = common.make_pio_pin(d4);
        let d5 = common.make_pio_pin(d5);
        let d6 = common.make_pio_pin(d6);
        let d7 = common.make_pio_pin(d7);
        let a0 = common.make_pio_pin(a0);
        let a1 = common.make_pio_pin(a1);
        let a2 = common.make_pio_pin(a2);
        let a3 = common.make_pio_pin(a3);
        let a4 = common.make_pio_pin(a4);
        let a5 = common.make_pio_pin(a5);
        let a6 = common.make_pio_pin(a6);
        let a7 = common.make_pio_pin(a7);
        let strobe = common.make_pio_pin(strobe);
        let bank = common.make_pio_pin(bank);

        let mut cfg = Config::default();
        cfg.use_program(&loaded, &[&bank]);
        cfg.set_in_pins(&[
            &d0, &d1, &d2, &d3, &d4, &d5, &d6, &d7, &a0, &a1, &a2, &a3, &a4, &a5, &a6, &a7,
            &strobe,
        ]);
        cfg.shift_in.auto_fill = true;
        cfg.shift_in.threshold = 32;
        cfg.shift_in.direction = ShiftDirection::Right;
        cfg.fifo_join = FifoJoin::RxOnly;
        cfg.clock_divider = config::SAMPLER_CLKDIV.to_fixed();
        sm.set_config(&cfg);

        sm.set_pin_dirs(Direction::Out, &[&bank]);
        sm.set_pin_dirs(
            Direction::In,
            &[
                &d0, &d1, &d2, &d3, &d4, &d5, &d6, &d7, &a0, &a1, &a2, &a3, &a4, &a5, &a6, &a7,
                &strobe,
            ],
        );

        Self { sm }
    }

    fn enable(&mut self) {
        self.sm.clear_fifos();
        self.sm.restart();
        self.sm.set_enable(true);
    }

    fn disable(&mut self) {
        self.sm.set_enable(false);
        self.sm.clear_fifos();
    }
}

/// Sole producer into the event ring. Runs on the high-priority interrupt
/// executor so it preempts the session's poll loop on its own core.
///
/// Idles until `arm` delivers a filter, samples until the quit flag is
/// raised, then disables the sequencer and goes back to idle.
#[embassy_executor::task]
pub async fn producer_task(
    pio: Pio<'static, PIO0>,
    pins: SamplerPins,
    reset_pin: Input<'static>,
    mut producer: Producer<'static, TimelineEntry, { config::RING_DEPTH }>,
    arm: &'static embassy_sync::signal::Signal<
        embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex,
        AddressFilter,
    >,
    quit: &'static QuitFlag,
) -> ! {
    let Pio { mut common, sm0, .. } = pio;
    let mut source = BusEventSource::configure(
        &mut common,
        sm0,
        pins.d0,
        pins.d1,
        pins.d2,
        pins.d3,
        pins.d4,
        pins.d5,
        pins.d6,
        pins.d7,
        pins.a0,
        pins.a1,
        pins.a2,
        pins.a3,
        pins.a4,
        pins.a5,
        pins.a6,
        pins.a7,
        pins.strobe,
        pins.bank,
    );
    let mut reset = ResetEdgeMonitor::new(reset_pin);

    loop {
        let filter = arm.wait().await;
        source.enable();

        while !quit.is_set() {
            let outcome = select3(
                source.sm.rx().wait_pull(),
                reset.wait_edge(),
                // Bounded nap so the quit flag is observed even on a
                // silent bus.
                Timer::after(Duration::from_millis(5)),
            )
            .await;
            match outcome {
                Either3::First(word) => {
                    ingest_fifo_word(&mut producer, filter, word);
                    // Drain completely before yielding, or a busy bus
                    // re-wakes us once per word.
                    while let Some(word) = source.sm.rx().try_pull() {
                        ingest_fifo_word(&mut producer, filter, word);
                    }
                }
                Either3::Second(kind) => {
                    // Full ring drops the transition; the session will
                    // re-base on the next one.
                    let _ = producer.push(TimelineEntry::Reset(kind));
                }
                Either3::Third(()) => {}
            }
        }

        source.disable();
    }
}

/// The sixteen data/address inputs plus strobe and bank-select, bundled so
/// the task signature stays readable.
pub struct SamplerPins {
    pub d0: embassy_rp::peripherals::PIN_0,
    pub d1: embassy_rp::peripherals::PIN_1,
    pub d2: embassy_rp::peripherals::PIN_2,
    pub d3: embassy_rp::peripherals::PIN_3,
    pub d4: embassy_rp::peripherals::PIN_4,
    pub d5: embassy_rp::peripherals::PIN_5,
    pub d6: embassy_rp::peripherals::PIN_6,
    pub d7: embassy_rp::peripherals::PIN_7,
    pub a0: embassy_rp::peripherals::PIN_8,
    pub a1: embassy_rp::peripherals::PIN_9,
    pub a2: embassy_rp::peripherals::PIN_10,
    pub a3: embassy_rp::peripherals::PIN_11,
    pub a4: embassy_rp::peripherals::PIN_12,
    pub a5: embassy_rp::peripherals::PIN_13,
    pub a6: embassy_rp::peripherals::PIN_14,
    pub a7: embassy_rp::peripherals::PIN_15,
    pub strobe: embassy_rp::peripherals::PIN_16,
    pub bank: embassy_rp::peripherals::PIN_17,
}

/// Watches the shared bus-reset line for both edges. Transitions are taken
/// at face value; `RESET_SETTLE_US` optionally requires the level to hold
/// before the event is reported.
pub struct ResetEdgeMonitor<'d> {
    pin: Input<'d>,
}

impl<'d> ResetEdgeMonitor<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self { pin }
    }

    /// Reset line idles high through the pull-up; the host pulls it low
    /// while resetting.
    pub fn configure(pin: embassy_rp::gpio::AnyPin) -> Self {
        Self {
            pin: Input::new(pin, Pull::Up),
        }
    }

    /// Wait for the next stable transition and classify it.
    pub async fn wait_edge(&mut self) -> ResetKind {
        loop {
            self.pin.wait_for_any_edge().await;
            let level_low = self.pin.is_low();

            if config::RESET_SETTLE_US > 0 {
                Timer::after(Duration::from_micros(config::RESET_SETTLE_US)).await;
                if self.pin.is_low() != level_low {
                    // Glitch: level did not hold through the settle window.
                    continue;
                }
            }

            return if level_low {
                ResetKind::Active
            } else {
                ResetKind::Cleared
            };
        }
    }
}
