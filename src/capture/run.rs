//! Capture-core controller.
//!
//! Runs on the second core's thread executor, below the producer's
//! interrupt executor. Waits for a program request from the UI core,
//! claims the session slot, and runs either the port reader loop or the
//! voltage monitor until the quit flag is raised.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

use crate::capture::session::{CaptureSession, QuitFlag, SessionSlot};
use crate::capture::types::{AddressFilter, CaptureProgram, CapturedEvent, TimelineEntry};
use crate::config;
use crate::error::FatalError;
use crate::fatal;
use crate::ring::Consumer;
use crate::volts::{AdcRails, VoltageSampler};

pub type EventSender =
    Sender<'static, CriticalSectionRawMutex, CapturedEvent, { config::EVENT_QUEUE_DEPTH }>;
pub type ProgramReceiver = Receiver<'static, CriticalSectionRawMutex, CaptureProgram, 2>;
pub type ArmSignal = Signal<CriticalSectionRawMutex, AddressFilter>;

#[embassy_executor::task]
pub async fn capture_controller(
    mut consumer: Consumer<'static, TimelineEntry, { config::RING_DEPTH }>,
    events: EventSender,
    programs: ProgramReceiver,
    arm: &'static ArmSignal,
    quit: &'static QuitFlag,
    slot: &'static SessionSlot,
    mut rails: AdcRails<'static>,
) -> ! {
    loop {
        match programs.receive().await {
            CaptureProgram::Reader(filter) => {
                run_reader(&mut consumer, &events, arm, quit, slot, filter).await;
            }
            CaptureProgram::VoltageMonitor => {
                run_volts(&events, quit, slot, &mut rails).await;
            }
        }
        // Grace period before the next program can start.
        Timer::after(Duration::from_millis(150)).await;
    }
}

async fn run_reader(
    consumer: &mut Consumer<'static, TimelineEntry, { config::RING_DEPTH }>,
    events: &EventSender,
    arm: &'static ArmSignal,
    quit: &'static QuitFlag,
    slot: &'static SessionSlot,
    filter: AddressFilter,
) {
    let Some(guard) = slot.claim() else {
        fatal::halt(FatalError::SessionReentry);
    };

    let mut session = CaptureSession::new(filter);
    session.arm();

    // The quit flag is owned by the requester: cleared before the program
    // was enqueued, never here. A stop raised between the request and this
    // claim must survive to cancel the run below.

    // The previous run's producer can outlive its stop by one nap; whatever
    // it pushed in that window belongs to the old session.
    while consumer.pop().is_some() {}

    // Producer arms the sequencer and starts pushing into the ring.
    arm.signal(filter);
    session.begin(Instant::now().as_micros());

    while !quit.is_set() {
        while let Some(entry) = consumer.pop() {
            let event = session.process(entry, Instant::now().as_micros());
            // Blocking enqueue: if the UI core lags, this loop stalls and
            // the ring absorbs (or drops) the backlog. Accepted
            // backpressure point.
            events.send(event).await;
        }
        Timer::after(Duration::from_micros(500)).await;
    }

    session.drain();
    // Entries still in flight belong to the cancelled run.
    while consumer.pop().is_some() {}
    session.finish();
    drop(guard);
}

async fn run_volts(
    events: &EventSender,
    quit: &'static QuitFlag,
    slot: &'static SessionSlot,
    rails: &mut AdcRails<'static>,
) {
    let Some(guard) = slot.claim() else {
        fatal::halt(FatalError::SessionReentry);
    };

    let started = Instant::now();
    let mut sampler = VoltageSampler::new(started.as_micros());

    while !quit.is_set() {
        let now = Instant::now();
        if sampler.due(now.as_micros()) {
            if let Ok(reading) = rails.sweep().await {
                let event = VoltageSampler::event(reading, now.as_micros() - started.as_micros());
                // Telemetry is lossy: drop on a full queue, the next sweep
                // supersedes it.
                let _ = events.try_send(event);
            }
        }
        Timer::after(Duration::from_millis(5)).await;
    }

    drop(guard);
}

/// Cooperative stop, callable from the UI core. Sets the quit flag and
/// waits for the running loop to release its claim. Idempotent: a stop on
/// an idle slot returns after one flag write.
///
/// The flag stays set until the next program request clears it, so a stop
/// that lands before the controller has claimed the slot still cancels
/// that pending run. Callers must flush the program channel first, or the
/// queued request will start a session after this returns.
pub async fn stop_session(quit: &QuitFlag, slot: &SessionSlot) {
    quit.set();
    while slot.is_active() {
        Timer::after(Duration::from_millis(1)).await;
    }
}
