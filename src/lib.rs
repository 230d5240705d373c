//! postprobe - ISA POST-code probe firmware for the RP2040.
//!
//! The probe sits passively on an ISA slot and latches every host I/O
//! write it can see: a PIO state machine samples the data and address
//! lines on the read strobe, an SPSC ring buffer carries the raw words
//! out of interrupt context, and a bounded cross-core queue delivers
//! finished events to the OLED/keypad front end.
//!
//! Everything that does not touch a peripheral lives in this library and
//! is tested on the host; the `embedded` feature pulls in the Embassy
//! stack and the hardware-facing halves.

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod keypad;
pub mod retry;
pub mod ring;
pub mod standby;
pub mod ui;
pub mod volts;

#[cfg(feature = "embedded")]
pub mod fatal;
#[cfg(feature = "embedded")]
pub mod io_expander;

#[cfg(test)]
mod tests {
    use crate::app::{App, AppRequest, ProgramSelect, MENU};
    use crate::capture::ingest_fifo_word;
    use crate::capture::session::{CaptureSession, QuitFlag, SessionSlot, SessionState};
    use crate::capture::types::{
        AddressFilter, BusSample, CaptureProgram, CapturedEvent, EventKind, ResetKind,
        TimelineEntry,
    };
    use crate::config;
    use crate::error::FatalError;
    use crate::keypad::{keys_from_mask, DebounceStage, KeypadDebouncer, KeypadPort, Keys};
    use crate::retry::with_retry;
    use crate::ring::EventRing;
    use crate::standby::{StandbyController, StandbyStage};
    use crate::ui::scroll::{ScrollStage, TextScroller};
    use crate::ui::Renderer;
    use crate::volts::{RailVolts, VoltageSampler};

    /// Build a sampler FIFO word for the given port and data byte, with
    /// the echo slot carrying a copy of the data bus.
    fn fifo_word(address: u16, data: u8) -> u32 {
        u32::from(address >> 8) << 24
            | u32::from(data) << 16
            | u32::from(address & 0xFF) << 8
            | u32::from(data)
    }

    // --- ring buffer ---

    #[test]
    fn ring_splits_exactly_once() {
        let ring: EventRing<u32, 8> = EventRing::new();
        assert!(ring.split().is_some());
        assert!(ring.split().is_none());
    }

    #[test]
    fn ring_preserves_fifo_order() {
        let ring: EventRing<u32, 8> = EventRing::new();
        let (mut tx, mut rx) = ring.split().unwrap();
        for n in 0..5 {
            assert!(tx.push(n));
        }
        for n in 0..5 {
            assert_eq!(rx.pop(), Some(n));
        }
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn ring_drops_push_when_full() {
        let ring: EventRing<u32, 8> = EventRing::new();
        let (mut tx, mut rx) = ring.split().unwrap();
        for n in 0..8 {
            assert!(tx.push(n));
        }
        // Ninth push is dropped; the stored sequence is untouched.
        assert!(!tx.push(99));
        for n in 0..8 {
            assert_eq!(rx.pop(), Some(n));
        }
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn ring_recovers_after_full() {
        let ring: EventRing<u32, 4> = EventRing::new();
        let (mut tx, mut rx) = ring.split().unwrap();
        for n in 0..4 {
            assert!(tx.push(n));
        }
        assert!(!tx.push(4));
        assert_eq!(rx.pop(), Some(0));
        assert!(tx.push(4));
        for n in 1..5 {
            assert_eq!(rx.pop(), Some(n));
        }
    }

    #[test]
    fn ring_wraps_around_indefinitely() {
        let ring: EventRing<u32, 4> = EventRing::new();
        let (mut tx, mut rx) = ring.split().unwrap();
        for n in 0..40 {
            assert!(tx.push(n));
            assert_eq!(rx.pop(), Some(n));
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn ring_refill_right_after_drain_loses_nothing() {
        // The producer can preempt the consumer at any instruction and
        // refill the ring the moment the last slot is released. Accepted
        // pushes must all come back out, at every head alignment.
        let ring: EventRing<u32, 4> = EventRing::new();
        let (mut tx, mut rx) = ring.split().unwrap();

        let mut next = 0;
        for _ in 0..10 {
            assert!(tx.push(next));
            assert_eq!(rx.pop(), Some(next));
            next += 1;

            // Ring drained; producer bursts it back to full.
            let burst = next..next + 4;
            for n in burst.clone() {
                assert!(tx.push(n));
            }
            assert!(!tx.push(u32::MAX));
            next += 4;

            for n in burst {
                assert_eq!(rx.pop(), Some(n));
            }
            assert_eq!(rx.pop(), None);
        }
    }

    // --- FIFO word decode and filtering ---

    #[test]
    fn fifo_word_unpacks_documented_layout() {
        let sample = BusSample::from_fifo_word(0x12AB_34CD);
        assert_eq!(sample.address_high, 0x12);
        assert_eq!(sample.raw_echo, 0xAB);
        assert_eq!(sample.address_low, 0x34);
        assert_eq!(sample.data, 0xCD);
        assert_eq!(sample.address(), 0x1234);
    }

    #[test]
    fn post_code_word_decodes_to_port_80() {
        // A POST code 4Fh written to port 80h arrives as this raw word.
        let sample = BusSample::from_fifo_word(0x0000_804F);
        assert_eq!(sample.address(), 0x0080);
        assert_eq!(sample.data, 0x4F);
    }

    #[test]
    fn address_filter_requires_exact_match() {
        let filter = AddressFilter::Only(0x0080);
        assert!(filter.matches(0x0080));
        assert!(!filter.matches(0x0081));
        assert!(!filter.matches(0x0180));
        assert!(AddressFilter::All.matches(0x0081));
    }

    #[test]
    fn ingest_discards_filtered_words_before_the_ring() {
        let ring: EventRing<TimelineEntry, 8> = EventRing::new();
        let (mut tx, mut rx) = ring.split().unwrap();
        let filter = AddressFilter::Only(0x0080);

        assert!(!ingest_fifo_word(&mut tx, filter, fifo_word(0x0081, 0x4F)));
        assert!(rx.is_empty());

        assert!(ingest_fifo_word(&mut tx, filter, fifo_word(0x0080, 0x4F)));
        let Some(TimelineEntry::Data(sample)) = rx.pop() else {
            panic!("expected a data entry");
        };
        assert_eq!(sample.address(), 0x0080);
        assert_eq!(sample.data, 0x4F);
    }

    // --- session lifecycle ---

    #[test]
    fn session_slot_is_exclusive() {
        let slot = SessionSlot::new();
        let guard = slot.claim().unwrap();
        assert!(slot.is_active());
        assert!(slot.claim().is_none());
        drop(guard);
        assert!(!slot.is_active());
        assert!(slot.claim().is_some());
    }

    #[test]
    fn quit_flag_round_trip() {
        let quit = QuitFlag::new();
        assert!(!quit.is_set());
        quit.set();
        quit.set();
        assert!(quit.is_set());
        quit.clear();
        assert!(!quit.is_set());
    }

    #[test]
    fn stop_raised_before_the_claim_still_cancels() {
        // Back can land while the program request is still queued. The
        // requester cleared the flag before enqueueing; the session side
        // must never clear it again, so the early stop survives to cancel
        // the run before it processes anything.
        let slot = SessionSlot::new();
        let quit = QuitFlag::new();

        quit.clear();
        quit.set();

        let guard = slot.claim().expect("slot was free");
        let mut session = CaptureSession::new(AddressFilter::Only(0x0080));
        session.arm();
        session.begin(0);

        let mut processed = 0;
        while !quit.is_set() {
            processed += 1;
        }
        assert_eq!(processed, 0);

        session.drain();
        session.finish();
        drop(guard);
        assert!(!slot.is_active());
    }

    #[test]
    fn leftover_entries_never_reach_a_new_session() {
        // The producer outlives a stop by up to one nap; whatever it
        // pushed then is still in the ring when the next program starts.
        let ring: EventRing<TimelineEntry, 8> = EventRing::new();
        let (mut tx, mut rx) = ring.split().unwrap();

        let stale = BusSample::from_fifo_word(fifo_word(0x0080, 0xEE));
        assert!(tx.push(TimelineEntry::Data(stale)));
        assert!(tx.push(TimelineEntry::Reset(ResetKind::Cleared)));

        // Session start discards the backlog before arming the producer.
        while rx.pop().is_some() {}
        let mut session = CaptureSession::new(AddressFilter::Only(0x0084));
        session.arm();
        session.begin(5_000);

        let fresh = BusSample::from_fifo_word(fifo_word(0x0084, 0x01));
        assert!(tx.push(TimelineEntry::Data(fresh)));

        let entry = rx.pop().expect("only the fresh entry remains");
        let event = session.process(entry, 5_400);
        assert_eq!(event.address, 0x0084);
        assert_eq!(event.data, 0x01);
        assert_eq!(event.timestamp_micros, 400);
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn session_walks_its_lifecycle() {
        let mut session = CaptureSession::new(AddressFilter::Only(0x0080));
        assert_eq!(session.state(), SessionState::Idle);
        session.arm();
        assert_eq!(session.state(), SessionState::Armed);
        session.begin(1_000);
        assert_eq!(session.state(), SessionState::Running);
        session.drain();
        assert_eq!(session.state(), SessionState::Draining);
        session.finish();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn data_timestamps_are_relative_to_session_start() {
        let mut session = CaptureSession::new(AddressFilter::Only(0x0080));
        session.arm();
        session.begin(1_000);

        let sample = BusSample::from_fifo_word(fifo_word(0x0080, 0x4F));
        let event = session.process(TimelineEntry::Data(sample), 1_500);
        assert_eq!(event.kind, EventKind::Data);
        assert_eq!(event.timestamp_micros, 500);
        assert_eq!(event.address, 0x0080);
        assert_eq!(event.data, 0x4F);
        assert!(event.render_hint);
    }

    #[test]
    fn bus_dump_events_skip_the_display() {
        let mut session = CaptureSession::new(AddressFilter::All);
        session.arm();
        session.begin(0);
        let sample = BusSample::from_fifo_word(fifo_word(0x03F8, 0xAA));
        let event = session.process(TimelineEntry::Data(sample), 10);
        assert!(!event.render_hint);
    }

    #[test]
    fn reset_pulse_rebases_the_timeline_once() {
        let mut session = CaptureSession::new(AddressFilter::Only(0x0080));
        session.arm();
        session.begin(1_000);

        let active = session.process(TimelineEntry::Reset(ResetKind::Active), 2_000);
        assert_eq!(active.kind, EventKind::ResetActive);
        assert_eq!(active.timestamp_micros, 0);

        let sample = BusSample::from_fifo_word(fifo_word(0x0080, 0x01));
        let data = session.process(TimelineEntry::Data(sample), 52_000);
        assert_eq!(data.timestamp_micros, 50_000);

        // Clearing reports the pulse width without moving the reference.
        let cleared = session.process(TimelineEntry::Reset(ResetKind::Cleared), 60_000);
        assert_eq!(cleared.kind, EventKind::ResetCleared);
        assert_eq!(cleared.timestamp_micros, 58_000);

        let sample = BusSample::from_fifo_word(fifo_word(0x0080, 0x02));
        let data = session.process(TimelineEntry::Data(sample), 62_000);
        assert_eq!(data.timestamp_micros, 60_000);
    }

    // --- keypad debouncing ---

    struct ScriptedPort {
        intf: u8,
        live: u8,
        fail: bool,
    }

    impl ScriptedPort {
        fn new(intf: u8, live: u8) -> Self {
            Self {
                intf,
                live,
                fail: false,
            }
        }
    }

    impl KeypadPort for ScriptedPort {
        type Error = ();

        fn interrupt_capture(&mut self) -> Result<u8, ()> {
            if self.fail {
                return Err(());
            }
            Ok(self.intf)
        }

        fn read_all(&mut self) -> Result<u8, ()> {
            if self.fail {
                return Err(());
            }
            Ok(self.live)
        }
    }

    #[test]
    fn keys_translate_from_expander_pins() {
        assert_eq!(keys_from_mask(0b0000), Keys::NONE);
        assert_eq!(keys_from_mask(0b0001), Keys::UP);
        assert_eq!(keys_from_mask(0b0100), Keys::SELECT);
        let mut both = Keys::NONE;
        both.insert(Keys::DOWN);
        both.insert(Keys::BACK);
        assert_eq!(keys_from_mask(0b1010), both);
    }

    #[test]
    fn debouncer_polls_at_fixed_interval() {
        let mut port = ScriptedPort::new(0b0001, 0b0001);
        let mut deb = KeypadDebouncer::new();

        deb.poll(&mut port, false, 0).unwrap();
        // IRQ asserts between polls; nothing happens until the next slot.
        deb.poll(&mut port, true, 10_000).unwrap();
        assert_eq!(deb.stage(), DebounceStage::Poll);

        deb.poll(&mut port, true, config::KEY_POLL_US).unwrap();
        assert_eq!(deb.stage(), DebounceStage::FirstTrigger);
    }

    #[test]
    fn transient_pulse_never_becomes_an_event() {
        // Bounce fires the interrupt latch but the contact is open again
        // by the time the settle window ends.
        let mut port = ScriptedPort::new(0b0001, 0b0000);
        let mut deb = KeypadDebouncer::new();

        deb.poll(&mut port, true, 0).unwrap();
        assert_eq!(deb.stage(), DebounceStage::FirstTrigger);

        deb.poll(&mut port, false, config::KEY_SETTLE_US).unwrap();
        assert_eq!(deb.stage(), DebounceStage::Poll);
        assert_eq!(deb.take(), None);
    }

    #[test]
    fn held_key_reports_exactly_once() {
        let mut port = ScriptedPort::new(0b0001, 0b0001);
        let mut deb = KeypadDebouncer::new();

        deb.poll(&mut port, true, 0).unwrap();
        deb.poll(&mut port, true, config::KEY_SETTLE_US).unwrap();
        assert_eq!(deb.stage(), DebounceStage::PendingEvent);
        assert_eq!(deb.take(), Some(Keys::UP));
        assert_eq!(deb.take(), None);

        // The key is still down, so the latch re-fires; the unchanged
        // persistent mask must not produce a second event.
        let t = config::KEY_POLL_US * 2;
        deb.poll(&mut port, true, t).unwrap();
        deb.poll(&mut port, true, t + config::KEY_SETTLE_US).unwrap();
        assert_eq!(deb.take(), None);
    }

    #[test]
    fn release_and_repress_reports_again() {
        let mut port = ScriptedPort::new(0b0001, 0b0001);
        let mut deb = KeypadDebouncer::new();

        deb.poll(&mut port, true, 0).unwrap();
        deb.poll(&mut port, true, config::KEY_SETTLE_US).unwrap();
        assert_eq!(deb.take(), Some(Keys::UP));

        // Release: latch fires on the change, live read comes back empty.
        port.live = 0b0000;
        let t = config::KEY_POLL_US * 2;
        deb.poll(&mut port, true, t).unwrap();
        deb.poll(&mut port, true, t + config::KEY_SETTLE_US).unwrap();
        assert_eq!(deb.take(), None);

        // Second press is a fresh edge against an empty previous mask.
        port.live = 0b0001;
        let t = config::KEY_POLL_US * 4;
        deb.poll(&mut port, true, t).unwrap();
        deb.poll(&mut port, true, t + config::KEY_SETTLE_US).unwrap();
        assert_eq!(deb.take(), Some(Keys::UP));
    }

    #[test]
    fn port_errors_bubble_out_of_the_debouncer() {
        let mut port = ScriptedPort::new(0b0001, 0b0001);
        port.fail = true;
        let mut deb = KeypadDebouncer::new();
        assert_eq!(deb.poll(&mut port, true, 0), Err(()));
    }

    // --- standby / screensaver ---

    const T: u64 = config::STANDBY_TIMEOUT_US;

    #[test]
    fn display_stays_active_within_the_timeout() {
        let mut standby = StandbyController::new(0);
        let outcome = standby.tick(T, false);
        assert_eq!(standby.stage(), StandbyStage::Active);
        assert_eq!(outcome.brightness, None);
    }

    #[test]
    fn brightness_ramps_down_to_standby() {
        let mut standby = StandbyController::new(0);
        standby.tick(T + 1, false);
        assert_eq!(standby.stage(), StandbyStage::Dimming);

        let mut previous = config::MAX_BRIGHTNESS;
        let mut ticks = 0;
        while standby.stage() != StandbyStage::Standby {
            let outcome = standby.tick(T + 1, false);
            let level = outcome.brightness.expect("each dim tick steps down");
            assert!(level < previous);
            previous = level;
            ticks += 1;
            assert!(ticks < 100, "dimming never settled");
        }
        assert_eq!(standby.brightness(), config::MIN_BRIGHTNESS);
    }

    #[test]
    fn activity_restores_brightness_in_one_tick() {
        let mut standby = StandbyController::new(0);
        standby.tick(T + 1, false);
        standby.tick(T + 1, false);
        assert_eq!(standby.stage(), StandbyStage::Dimming);

        standby.touch(T + 2);
        let outcome = standby.tick(T + 2, false);
        assert_eq!(standby.stage(), StandbyStage::Active);
        assert_eq!(outcome.brightness, Some(config::MAX_BRIGHTNESS));
        assert!(outcome.woke);
    }

    fn run_to_standby(standby: &mut StandbyController) {
        while standby.stage() != StandbyStage::Standby {
            standby.tick(T + 1, false);
        }
    }

    #[test]
    fn screensaver_requires_the_main_menu() {
        let mut standby = StandbyController::new(0);
        run_to_standby(&mut standby);

        // Twice the timeout, but over a capture screen: stay dark.
        standby.tick(2 * T + 1, false);
        assert_eq!(standby.stage(), StandbyStage::Standby);

        standby.tick(2 * T + 1, true);
        assert_eq!(standby.stage(), StandbyStage::Screensaver);
    }

    #[test]
    fn screensaver_frames_advance_and_wrap() {
        let mut standby = StandbyController::new(0);
        run_to_standby(&mut standby);
        let start = 2 * T + 1;
        standby.tick(start, true);

        let mut now = start;
        for expected in 0..config::SCREENSAVER_FRAMES {
            let outcome = standby.tick(now, true);
            assert_eq!(outcome.frame, Some(expected));
            now += config::SCREENSAVER_FRAME_US;
        }
        assert_eq!(standby.tick(now, true).frame, Some(0));
    }

    #[test]
    fn screensaver_wakes_on_activity() {
        let mut standby = StandbyController::new(0);
        run_to_standby(&mut standby);
        standby.tick(2 * T + 1, true);
        assert_eq!(standby.stage(), StandbyStage::Screensaver);

        standby.touch(2 * T + 2);
        let outcome = standby.tick(2 * T + 2, true);
        assert_eq!(standby.stage(), StandbyStage::Active);
        assert_eq!(outcome.brightness, Some(config::MAX_BRIGHTNESS));
        assert!(outcome.woke);
    }

    // --- credits ticker ---

    #[test]
    fn ticker_emits_then_waits_out_the_step() {
        let mut scroller = TextScroller::new();
        scroller.start_text();

        let window = scroller.step(0).expect("first window is immediate");
        assert_eq!(window.text(), &config::CREDITS_LINE[..config::CREDITS_WINDOW]);
        assert_eq!(scroller.stage(), ScrollStage::Wait);

        assert!(scroller.step(config::CREDITS_STEP_US / 2).is_none());
        // Deadline reached: one call to flip stages, the next emits.
        assert!(scroller.step(config::CREDITS_STEP_US).is_none());
        let window = scroller.step(config::CREDITS_STEP_US).expect("second window");
        assert_eq!(
            window.text(),
            &config::CREDITS_LINE[1..config::CREDITS_WINDOW + 1]
        );
    }

    #[test]
    fn ticker_walks_the_line_and_pauses_at_the_wrap() {
        let line = config::CREDITS_LINE;
        let mut scroller = TextScroller::new();
        scroller.start_text();

        let mut now = 0;
        for start in 0..line.len() {
            if start > 0 {
                now += config::CREDITS_STEP_US;
                assert!(scroller.step(now).is_none());
            }
            let window = scroller.step(now).expect("one window per step");
            let end = (start + config::CREDITS_WINDOW).min(line.len());
            assert_eq!(window.text(), &line[start..end]);
        }

        // Wrapped: the ordinary step period is not enough.
        assert!(scroller.step(now + config::CREDITS_STEP_US).is_none());
        assert_eq!(scroller.stage(), ScrollStage::Wait);
        assert!(scroller.step(now + config::CREDITS_WRAP_PAUSE_US).is_none());
        let window = scroller.step(now + config::CREDITS_WRAP_PAUSE_US).unwrap();
        assert_eq!(window.text(), &line[..config::CREDITS_WINDOW]);
    }

    // --- application controller ---

    #[derive(Debug, PartialEq)]
    enum Op {
        Clear,
        Header(String),
        Footer(String),
        Menu(usize),
        Data(EventKind),
        Splash,
    }

    #[derive(Default)]
    struct RecordingRenderer {
        ops: Vec<Op>,
    }

    impl Renderer for RecordingRenderer {
        fn clear_screen(&mut self) {
            self.ops.push(Op::Clear);
        }
        fn draw_header(&mut self, text: &str) {
            self.ops.push(Op::Header(text.into()));
        }
        fn draw_footer(&mut self, text: &str) {
            self.ops.push(Op::Footer(text.into()));
        }
        fn draw_menu(&mut self, index: usize) {
            self.ops.push(Op::Menu(index));
        }
        fn new_data(&mut self, events: &[CapturedEvent]) {
            for event in events {
                self.ops.push(Op::Data(event.kind));
            }
        }
        fn set_brightness(&mut self, _level: u8) {}
        fn draw_splash(&mut self) {
            self.ops.push(Op::Splash);
        }
        fn draw_screensaver(&mut self, _frame: u8) {}
    }

    /// Press a key and run the follow-up render pass, like the UI loop.
    fn press(app: &mut App, renderer: &mut RecordingRenderer, keys: Keys) -> Option<AppRequest> {
        let request = app.handle_key(keys);
        let render_request = app.render(renderer, 0);
        request.or(render_request)
    }

    #[test]
    fn menu_draws_once_until_the_cursor_moves() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();

        assert_eq!(app.render(&mut renderer, 0), None);
        assert_eq!(renderer.ops, vec![Op::Menu(0)]);

        // Nothing changed; no redraw.
        assert_eq!(app.render(&mut renderer, 0), None);
        assert_eq!(renderer.ops.len(), 1);

        press(&mut app, &mut renderer, Keys::DOWN);
        assert_eq!(renderer.ops.last(), Some(&Op::Menu(1)));
    }

    #[test]
    fn menu_cursor_stops_at_both_ends() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();
        app.render(&mut renderer, 0);

        press(&mut app, &mut renderer, Keys::UP);
        assert_eq!(app.menu_index(), 0);

        for _ in 0..MENU.len() + 3 {
            press(&mut app, &mut renderer, Keys::DOWN);
        }
        assert_eq!(app.menu_index(), MENU.len() - 1);
    }

    #[test]
    fn selecting_a_port_reader_starts_its_program() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();
        app.render(&mut renderer, 0);

        let request = press(&mut app, &mut renderer, Keys::SELECT);
        assert_eq!(
            request,
            Some(AppRequest::Start(CaptureProgram::Reader(
                AddressFilter::Only(0x0080)
            )))
        );
        assert_eq!(app.current(), ProgramSelect::Port80Reader);
        // The mode switch clears the panel and titles it.
        assert!(renderer.ops.contains(&Op::Clear));
        assert_eq!(renderer.ops.last(), Some(&Op::Header("Port 80h".into())));
    }

    #[test]
    fn every_reader_mode_maps_to_its_port() {
        let cases = [
            (ProgramSelect::Port80Reader, 0x0080),
            (ProgramSelect::Port90Reader, 0x0090),
            (ProgramSelect::Port84Reader, 0x0084),
            (ProgramSelect::Port300Reader, 0x0300),
            (ProgramSelect::Port378Reader, 0x0378),
        ];
        for (select, port) in cases {
            assert_eq!(
                select.capture_program(),
                Some(CaptureProgram::Reader(AddressFilter::Only(port)))
            );
        }
        assert_eq!(
            ProgramSelect::BusDump.capture_program(),
            Some(CaptureProgram::Reader(AddressFilter::All))
        );
        assert_eq!(
            ProgramSelect::VoltageMonitor.capture_program(),
            Some(CaptureProgram::VoltageMonitor)
        );
        assert_eq!(ProgramSelect::Info.capture_program(), None);
    }

    #[test]
    fn back_stops_the_session_and_restores_the_cursor() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();
        app.render(&mut renderer, 0);

        press(&mut app, &mut renderer, Keys::DOWN);
        press(&mut app, &mut renderer, Keys::DOWN);
        press(&mut app, &mut renderer, Keys::SELECT);
        assert_eq!(app.current(), ProgramSelect::Port84Reader);

        let request = press(&mut app, &mut renderer, Keys::BACK);
        assert_eq!(request, Some(AppRequest::StopAndDrain));
        assert_eq!(app.current(), ProgramSelect::MainMenu);
        assert_eq!(renderer.ops.last(), Some(&Op::Menu(2)));
    }

    #[test]
    fn info_screen_walks_splash_header_ticker() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();
        app.render(&mut renderer, 0);

        for _ in 0..7 {
            press(&mut app, &mut renderer, Keys::DOWN);
        }
        assert_eq!(press(&mut app, &mut renderer, Keys::SELECT), None);
        assert_eq!(app.current(), ProgramSelect::Info);
        assert_eq!(renderer.ops.last(), Some(&Op::Splash));

        // Scrolling down swaps the bitmap for the header and the ticker.
        press(&mut app, &mut renderer, Keys::DOWN);
        let Some(Op::Header(header)) = renderer.ops.last() else {
            panic!("expected the version header");
        };
        assert!(header.starts_with("postprobe"));

        app.render(&mut renderer, 0);
        assert_eq!(
            renderer.ops.last(),
            Some(&Op::Footer(
                config::CREDITS_LINE[..config::CREDITS_WINDOW].into()
            ))
        );
    }

    #[test]
    fn firmware_update_hands_over_to_the_bootloader() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();
        app.render(&mut renderer, 0);

        for _ in 0..MENU.len() - 1 {
            press(&mut app, &mut renderer, Keys::DOWN);
        }
        let request = press(&mut app, &mut renderer, Keys::SELECT);
        assert_eq!(request, Some(AppRequest::EnterBootloader));
        assert!(renderer
            .ops
            .contains(&Op::Footer("Connect to PC".into())));
    }

    #[test]
    fn captured_events_reach_the_renderer() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();
        let sample = BusSample::from_fifo_word(fifo_word(0x0080, 0x4F));
        app.handle_event(&mut renderer, &CapturedEvent::data(100, sample, true));
        assert_eq!(renderer.ops, vec![Op::Data(EventKind::Data)]);
    }

    #[test]
    fn waking_forces_a_menu_redraw() {
        let mut app = App::new();
        let mut renderer = RecordingRenderer::default();
        app.render(&mut renderer, 0);
        assert_eq!(renderer.ops.len(), 1);

        app.force_redraw();
        app.render(&mut renderer, 0);
        assert_eq!(renderer.ops, vec![Op::Menu(0), Op::Menu(0)]);
    }

    // --- retry helper ---

    #[test]
    fn retry_returns_the_first_success() {
        let mut calls = 0;
        let result: Result<u8, ()> = with_retry(3, || panic!("no backoff needed"), || {
            calls += 1;
            Ok(7)
        });
        assert_eq!(result, Ok(7));
        assert_eq!(calls, 1);
    }

    #[test]
    fn retry_recovers_within_the_budget() {
        let mut calls = 0;
        let mut backoffs = 0;
        let result: Result<u8, ()> = with_retry(
            3,
            || backoffs += 1,
            || {
                calls += 1;
                if calls < 3 {
                    Err(())
                } else {
                    Ok(9)
                }
            },
        );
        assert_eq!(result, Ok(9));
        assert_eq!(calls, 3);
        assert_eq!(backoffs, 2);
    }

    #[test]
    fn retry_gives_up_after_the_last_attempt() {
        let mut calls = 0;
        let result: Result<u8, u8> = with_retry(3, || {}, || {
            calls += 1;
            Err(calls)
        });
        assert_eq!(result, Err(3));
    }

    // --- voltage sampler ---

    #[test]
    fn sampler_fires_once_per_period() {
        let mut sampler = VoltageSampler::new(0);
        assert!(sampler.due(0));
        assert!(!sampler.due(1));
        assert!(!sampler.due(config::VOLTS_PERIOD_US - 1));
        assert!(sampler.due(config::VOLTS_PERIOD_US));
        assert!(!sampler.due(config::VOLTS_PERIOD_US + 1));
    }

    #[test]
    fn sampler_does_not_burst_after_a_stall() {
        let mut sampler = VoltageSampler::new(0);
        assert!(sampler.due(0));
        // The loop stalled for ten periods; exactly one sweep fires.
        assert!(sampler.due(config::VOLTS_PERIOD_US * 10));
        assert!(!sampler.due(config::VOLTS_PERIOD_US * 10 + 1));
    }

    #[test]
    fn rail_sweep_becomes_a_volts_event() {
        let reading = RailVolts {
            volts5: 5.02,
            volts12: 11.87,
            volts_n12: -11.93,
        };
        let event = VoltageSampler::event(reading, 1_234);
        assert_eq!(event.kind, EventKind::Volts);
        assert_eq!(event.timestamp_micros, 1_234);
        assert_eq!(event.volts5, 5.02);
        assert_eq!(event.volts_n12, -11.93);
        assert!(event.render_hint);
    }

    // --- fatal signatures ---

    #[test]
    fn blink_signatures_are_distinct() {
        let faults = [
            FatalError::InvalidHwConfig,
            FatalError::MissingKeypad,
            FatalError::MissingDisplay,
            FatalError::SessionReentry,
        ];
        let mut seen = std::collections::HashSet::new();
        for fault in faults {
            let count = fault.blink_count();
            assert!(count >= 1);
            assert!(seen.insert(count), "duplicate signature: {count}");
        }
    }
}
