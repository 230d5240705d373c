//! Embedded entry point.
//!
//! Core 1 runs the capture side: the bus-sampler producer on a
//! high-priority interrupt executor, and the session/voltage controller on
//! the thread executor below it. Core 0 runs the UI side: keypad
//! debouncing, standby management and the application controller, fed by
//! the cross-core event channel. The two cores share exactly one
//! structure, that channel; everything else is owned by one side.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::info;
use defmt_rtt as _;
use panic_probe as _;

use embassy_executor::{Executor, InterruptExecutor};
use embassy_rp::adc::{self, Adc, Channel as AdcChannel};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::{I2C0, PIO0};
use embassy_rp::pio::Pio;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal_bus::i2c::CriticalSectionDevice;
use static_cell::StaticCell;

use postprobe::app::{App, AppRequest};
use postprobe::capture::run::{capture_controller, stop_session, ArmSignal};
use postprobe::capture::session::{QuitFlag, SessionSlot};
use postprobe::capture::source::{producer_task, SamplerPins};
use postprobe::capture::types::{CaptureProgram, CapturedEvent, TimelineEntry};
use postprobe::config;
use postprobe::error::FatalError;
use postprobe::fatal;
use postprobe::io_expander::KeypadExpander;
use postprobe::keypad::KeypadDebouncer;
use postprobe::ring::EventRing;
use postprobe::standby::{StandbyController, StandbyStage};
use postprobe::ui::display::{self, OledRenderer};
use postprobe::ui::Renderer;
use postprobe::volts::AdcRails;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => embassy_rp::pio::InterruptHandler<PIO0>;
    ADC_IRQ_FIFO => embassy_rp::adc::InterruptHandler;
});

/// Interrupt-to-poll-loop bridge, owned by core 1.
static RING: EventRing<TimelineEntry, { config::RING_DEPTH }> = EventRing::new();

/// The only structure shared between the two cores.
static EVENTS: Channel<CriticalSectionRawMutex, CapturedEvent, { config::EVENT_QUEUE_DEPTH }> =
    Channel::new();

/// Program requests from the UI core to the capture core.
static PROGRAMS: Channel<CriticalSectionRawMutex, CaptureProgram, 2> = Channel::new();

static ARM: ArmSignal = Signal::new();
static QUIT: QuitFlag = QuitFlag::new();
static SLOT: SessionSlot = SessionSlot::new();

static mut CORE1_STACK: Stack<8192> = Stack::new();
static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1_HIGH: InterruptExecutor = InterruptExecutor::new();

type BlockingI2c = I2c<'static, I2C0, i2c::Blocking>;
type SharedI2c = CriticalSectionDevice<'static, BlockingI2c>;

static I2C_BUS: StaticCell<critical_section::Mutex<RefCell<BlockingI2c>>> = StaticCell::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR1_HIGH.on_interrupt()
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    info!("postprobe {} boot", env!("CARGO_PKG_VERSION"));

    // LED stays off until init completes; fatal paths blink it.
    fatal::register_led(Output::new(p.PIN_25, Level::Low));

    let Some((producer, consumer)) = RING.split() else {
        fatal::halt(FatalError::InvalidHwConfig);
    };

    // Shared I²C bus: keypad expander + OLED.
    let i2c = I2c::new_blocking(p.I2C0, p.PIN_21, p.PIN_20, i2c::Config::default());
    let bus = I2C_BUS.init(critical_section::Mutex::new(RefCell::new(i2c)));

    // Probe the expander first: its rotation strap decides the display
    // orientation.
    let mut keypad = KeypadExpander::new(CriticalSectionDevice::new(bus));
    if keypad.probe().is_err() || keypad.configure().is_err() {
        fatal::halt(FatalError::MissingKeypad);
    }
    let profile = match keypad.read_profile() {
        Ok(profile) => profile,
        Err(_) => fatal::halt(FatalError::MissingKeypad),
    };
    info!("board profile: {}", profile);

    let renderer = match display::init(CriticalSectionDevice::new(bus), &profile) {
        Ok(renderer) => renderer,
        Err(_) => fatal::halt(FatalError::MissingDisplay),
    };

    let adc = Adc::new(p.ADC, Irqs, adc::Config::default());
    let rails = AdcRails::new(
        adc,
        AdcChannel::new_pin(p.PIN_26, Pull::None),
        AdcChannel::new_pin(p.PIN_27, Pull::None),
        AdcChannel::new_pin(p.PIN_28, Pull::None),
    );

    let pio = Pio::new(p.PIO0, Irqs);
    let pins = SamplerPins {
        d0: p.PIN_0,
        d1: p.PIN_1,
        d2: p.PIN_2,
        d3: p.PIN_3,
        d4: p.PIN_4,
        d5: p.PIN_5,
        d6: p.PIN_6,
        d7: p.PIN_7,
        a0: p.PIN_8,
        a1: p.PIN_9,
        a2: p.PIN_10,
        a3: p.PIN_11,
        a4: p.PIN_12,
        a5: p.PIN_13,
        a6: p.PIN_14,
        a7: p.PIN_15,
        strobe: p.PIN_16,
        bank: p.PIN_17,
    };
    let reset_line = Input::new(p.PIN_18, Pull::Up);
    let key_irq = Input::new(p.PIN_19, Pull::Up);

    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            // Producer preempts the session loop on this core, standing in
            // for the FIFO/edge interrupt handlers it models.
            interrupt::SWI_IRQ_1.set_priority(Priority::P2);
            let high = EXECUTOR1_HIGH.start(interrupt::SWI_IRQ_1);
            high.spawn(producer_task(pio, pins, reset_line, producer, &ARM, &QUIT))
                .unwrap();

            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| {
                spawner
                    .spawn(capture_controller(
                        consumer,
                        EVENTS.sender(),
                        PROGRAMS.receiver(),
                        &ARM,
                        &QUIT,
                        &SLOT,
                        rails,
                    ))
                    .unwrap();
            });
        },
    );

    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(|spawner| {
        spawner.spawn(ui_task(renderer, keypad, key_irq)).unwrap();
    })
}

#[embassy_executor::task]
async fn ui_task(
    mut renderer: OledRenderer<SharedI2c>,
    mut keypad: KeypadExpander<SharedI2c>,
    key_irq: Input<'static>,
) -> ! {
    let mut app = App::new();
    let mut debouncer = KeypadDebouncer::new();
    let mut standby = StandbyController::new(Instant::now().as_micros());
    renderer.set_brightness(standby.brightness());

    loop {
        let now = Instant::now().as_micros();

        if debouncer.poll(&mut keypad, key_irq.is_low(), now).is_err() {
            // Retries are exhausted inside the port; the remote is gone.
            fatal::halt(FatalError::MissingKeypad);
        }

        if let Some(keys) = debouncer.take() {
            standby.touch(now);
            // During the screensaver a key only wakes the display; it is
            // consumed, not acted on.
            if standby.stage() != StandbyStage::Screensaver {
                if let Some(request) = app.handle_key(keys) {
                    perform(request).await;
                }
            }
        }

        while let Ok(event) = EVENTS.try_receive() {
            standby.touch(now);
            app.handle_event(&mut renderer, &event);
        }

        if let Some(request) = app.render(&mut renderer, now) {
            perform(request).await;
        }

        let outcome = standby.tick(now, app.in_main_menu());
        if outcome.woke {
            app.force_redraw();
        }
        if let Some(level) = outcome.brightness {
            renderer.set_brightness(level);
        }
        if let Some(frame) = outcome.frame {
            renderer.draw_screensaver(frame);
        }

        Timer::after(Duration::from_millis(5)).await;
    }
}

async fn perform(request: AppRequest) {
    match request {
        AppRequest::Start(program) => {
            // The requester owns the quit flag: clear it here, never in
            // the session loops, so a stop raised while the request is
            // still queued cannot be erased by the controller.
            QUIT.clear();
            PROGRAMS.send(program).await;
        }
        AppRequest::StopAndDrain => {
            // A not-yet-received request would start a session right
            // after the stop returned.
            while PROGRAMS.try_receive().is_ok() {}
            stop_session(&QUIT, &SLOT).await;
            // Residual events belong to the stopped session.
            while EVENTS.try_receive().is_ok() {}
        }
        AppRequest::EnterBootloader => {
            info!("handing over to the ROM USB bootloader");
            Timer::after(Duration::from_millis(100)).await;
            embassy_rp::rom_data::reset_to_usb_boot(0, 0);
            loop {
                cortex_m::asm::wfe();
            }
        }
    }
}
