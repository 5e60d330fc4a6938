//! Gesture decomposition and logical-state behavior of `HidController`.
//!
//! The mock transport ACKs every frame it receives, so these tests assert
//! on the exact wire traffic each gesture produces.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use ch9329_hid::{HidController, HidError, MouseButton, Timing};
use ch9329_transport::protocol::cmd;
use ch9329_transport::{Ch9329Client, Clock, Transport, TransportError};

struct NoopClock;

impl Clock for NoopClock {
    fn sleep(&self, _duration: Duration) {}
}

fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn build_ack(command: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x57, 0xAB, 0x00, command, payload.len() as u8];
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    frame
}

type WriteLog = Rc<RefCell<Vec<Vec<u8>>>>;

/// Transport that ACKs every written frame with a success status, unless
/// `mute` is set (device never answers).
struct AckingTransport {
    writes: WriteLog,
    pending: VecDeque<Vec<u8>>,
    mute: bool,
}

impl AckingTransport {
    fn new() -> Self {
        Self {
            writes: Rc::new(RefCell::new(Vec::new())),
            pending: VecDeque::new(),
            mute: false,
        }
    }

    fn write_log(&self) -> WriteLog {
        Rc::clone(&self.writes)
    }
}

impl Transport for AckingTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writes.borrow_mut().push(data.to_vec());
        if !self.mute {
            let command = data[3];
            self.pending.push_back(build_ack(command | 0x80, &[0x00]));
        }
        Ok(())
    }

    fn read(&mut self, _max_len: usize) -> Result<Vec<u8>, TransportError> {
        Ok(self.pending.pop_front().unwrap_or_default())
    }

    fn read_all(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(std::mem::take(&mut self.pending)
            .into_iter()
            .flatten()
            .collect())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn close(&mut self) {}
}

/// (command, payload) of one written frame.
fn parse_frame(frame: &[u8]) -> (u8, Vec<u8>) {
    assert_eq!(&frame[..2], &[0x57, 0xAB], "frame head");
    let len = frame[4] as usize;
    (frame[3], frame[5..5 + len].to_vec())
}

fn controller(width: u32, height: u32) -> (HidController, WriteLog) {
    let transport = AckingTransport::new();
    let log = transport.write_log();
    let client = Ch9329Client::with_clock(Box::new(transport), Box::new(NoopClock));
    let mut hid = HidController::with_clock(client, width, height, Box::new(NoopClock));
    hid.set_timing(Timing {
        dwell: Duration::ZERO,
        hold: Duration::ZERO,
        multi_click_gap: Duration::ZERO,
        move_step: Duration::from_millis(40),
        scroll_multiplier: 3,
        max_scroll_steps: 150,
    });
    (hid, log)
}

fn keyboard_reports(log: &WriteLog) -> Vec<(u8, Vec<u8>)> {
    log.borrow()
        .iter()
        .map(|f| parse_frame(f))
        .filter(|(c, _)| *c == cmd::SEND_KB_GENERAL_DATA)
        .collect()
}

/// Non-zero keycodes from a keyboard report payload.
fn report_codes(payload: &[u8]) -> Vec<u8> {
    payload[2..]
        .iter()
        .copied()
        .filter(|&c| c != 0)
        .collect()
}

// ============================================================================
// Keyboard
// ============================================================================

#[test]
fn key_down_sends_code_without_persistent_modifier() {
    let (mut hid, log) = controller(1920, 1080);
    hid.key_down("a").unwrap();

    let reports = keyboard_reports(&log);
    assert_eq!(reports.len(), 1);
    let (_, payload) = &reports[0];
    assert_eq!(payload[0], 0x00, "no modifier for lowercase");
    assert_eq!(payload[1], 0x00, "reserved byte");
    assert_eq!(report_codes(payload), vec![0x04]);
    assert_eq!(hid.pressed_keys(), &[0x04]);
    assert_eq!(hid.held_modifiers(), 0);
}

#[test]
fn uppercase_carries_transient_shift_only() {
    let (mut hid, log) = controller(1920, 1080);
    hid.key_down("A").unwrap();

    let reports = keyboard_reports(&log);
    assert_eq!(reports[0].1[0], 0x02, "Shift in the report");
    assert_eq!(hid.held_modifiers(), 0, "Shift not persisted");

    hid.key_up("A").unwrap();
    let reports = keyboard_reports(&log);
    assert_eq!(reports[1].1[0], 0x00, "release report drops the transient");
    assert!(hid.pressed_keys().is_empty());
}

#[test]
fn modifier_keys_toggle_persistent_state() {
    let (mut hid, log) = controller(1920, 1080);
    hid.key_down("ctrl").unwrap();
    assert_eq!(hid.held_modifiers(), 0x01);

    hid.key_down("b").unwrap();
    let reports = keyboard_reports(&log);
    assert_eq!(reports[1].1[0], 0x01, "persistent ctrl carried along");
    assert_eq!(report_codes(&reports[1].1), vec![0x05]);

    hid.key_up("ctrl").unwrap();
    assert_eq!(hid.held_modifiers(), 0x00);
    let reports = keyboard_reports(&log);
    assert_eq!(reports[2].1[0], 0x00);
    assert_eq!(report_codes(&reports[2].1), vec![0x05], "b still held");
}

#[test]
fn seventh_key_evicts_oldest_in_report() {
    let (mut hid, log) = controller(1920, 1080);
    for key in ["a", "b", "c", "d", "e", "f", "g"] {
        hid.key_down(key).unwrap();
    }

    let reports = keyboard_reports(&log);
    let last = &reports[6].1;
    // a (0x04) evicted; b..g remain in press order
    assert_eq!(
        report_codes(last),
        vec![0x05, 0x06, 0x07, 0x08, 0x09, 0x0A]
    );
    assert_eq!(hid.pressed_keys().len(), 6);
}

#[test]
fn release_all_keys_zeroes_the_report() {
    let (mut hid, log) = controller(1920, 1080);
    hid.key_down("ctrl").unwrap();
    hid.key_down("x").unwrap();
    hid.release_all_keys().unwrap();

    let reports = keyboard_reports(&log);
    let (_, payload) = reports.last().unwrap();
    assert_eq!(payload, &vec![0u8; 8]);
    assert_eq!(hid.held_modifiers(), 0);
    assert!(hid.pressed_keys().is_empty());
}

#[test]
fn press_is_down_then_up() {
    let (mut hid, log) = controller(1920, 1080);
    hid.press("x").unwrap();

    let reports = keyboard_reports(&log);
    assert_eq!(reports.len(), 2);
    assert_eq!(report_codes(&reports[0].1), vec![0x1B]);
    assert!(report_codes(&reports[1].1).is_empty());
}

#[test]
fn type_text_handles_case_and_symbols() {
    let (mut hid, log) = controller(1920, 1080);
    hid.type_text("Hi!").unwrap();

    let reports = keyboard_reports(&log);
    assert_eq!(reports.len(), 6, "three press/release pairs");
    assert_eq!(reports[0].1[0], 0x02, "H needs Shift");
    assert_eq!(report_codes(&reports[0].1), vec![0x0B]);
    assert_eq!(reports[2].1[0], 0x00, "i unshifted");
    assert_eq!(report_codes(&reports[2].1), vec![0x0C]);
    assert_eq!(reports[4].1[0], 0x02, "! is Shift+1");
    assert_eq!(report_codes(&reports[4].1), vec![0x1E]);
}

#[test]
fn hotkey_ignores_and_restores_persistent_state() {
    let (mut hid, log) = controller(1920, 1080);
    // Persistent state: Alt held plus one ordinary key
    hid.key_down("alt").unwrap();
    hid.key_down("x").unwrap();
    let before = keyboard_reports(&log).len();

    hid.hotkey(&["ctrl", "c"]).unwrap();

    let reports = keyboard_reports(&log);
    let chord = &reports[before..];
    assert_eq!(chord.len(), 3);
    assert_eq!(chord[0].1[0], 0x01, "chord modifier is ctrl alone, not alt");
    assert!(report_codes(&chord[0].1).is_empty(), "modifiers land first");
    assert_eq!(chord[1].1[0], 0x01);
    assert_eq!(report_codes(&chord[1].1), vec![0x06]);
    assert_eq!(chord[2].1[0], 0x04, "persistent alt restored");
    assert_eq!(report_codes(&chord[2].1), vec![0x1B], "held x restored");

    assert_eq!(hid.held_modifiers(), 0x04);
    assert_eq!(hid.pressed_keys(), &[0x1B]);
}

#[test]
fn hotkey_collects_transient_modifiers_and_dedupes() {
    let (mut hid, log) = controller(1920, 1080);
    hid.hotkey(&["cmd", "A", "a"]).unwrap();

    let reports = keyboard_reports(&log);
    // cmd | shift (from uppercase A), single 0x04 keycode
    assert_eq!(reports[0].1[0], 0x08 | 0x02);
    assert_eq!(report_codes(&reports[1].1), vec![0x04]);
}

#[test]
fn hotkey_with_no_resolvable_keys_is_a_noop() {
    let (mut hid, log) = controller(1920, 1080);
    hid.hotkey(&[]).unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn hotkey_rejects_oversized_chord_before_io() {
    let (mut hid, log) = controller(1920, 1080);
    let err = hid
        .hotkey(&["a", "b", "c", "d", "e", "f", "g"])
        .unwrap_err();
    assert!(matches!(err, HidError::Protocol(_)));
    assert!(log.borrow().is_empty());
}

#[test]
fn unknown_key_is_rejected() {
    let (mut hid, log) = controller(1920, 1080);
    assert!(matches!(
        hid.key_down("nosuchkey"),
        Err(HidError::UnknownKey(_))
    ));
    assert!(log.borrow().is_empty());
}

#[test]
fn numpad_press_routes_through_numpad_codes() {
    let (mut hid, log) = controller(1920, 1080);
    hid.numpad_press("7").unwrap();
    let reports = keyboard_reports(&log);
    assert_eq!(report_codes(&reports[0].1), vec![0x5F]);

    assert!(matches!(
        hid.numpad_press("x"),
        Err(HidError::UnknownKey(_))
    ));
}

// ============================================================================
// Mouse
// ============================================================================

fn abs_report(payload: &[u8]) -> (u8, u16, u16) {
    assert_eq!(payload[0], 0x02, "absolute mode marker");
    (
        payload[1],
        u16::from_le_bytes([payload[2], payload[3]]),
        u16::from_le_bytes([payload[4], payload[5]]),
    )
}

fn rel_report(payload: &[u8]) -> (u8, i8, i8, i8) {
    assert_eq!(payload[0], 0x01, "relative mode marker");
    (
        payload[1],
        payload[2] as i8,
        payload[3] as i8,
        payload[4] as i8,
    )
}

#[test]
fn mouse_buttons_commit_absolute_reports() {
    let (mut hid, log) = controller(1920, 1080);
    hid.mouse_down(MouseButton::Right).unwrap();
    hid.mouse_up(MouseButton::Right).unwrap();

    let frames = log.borrow();
    let (c0, p0) = parse_frame(&frames[0]);
    let (c1, p1) = parse_frame(&frames[1]);
    assert_eq!(c0, cmd::SEND_MS_ABS_DATA);
    assert_eq!(c1, cmd::SEND_MS_ABS_DATA);
    assert_eq!(abs_report(&p0).0, 0x02, "right button down");
    assert_eq!(abs_report(&p1).0, 0x00, "released");
}

#[test]
fn move_to_clamps_to_screen_and_maps_range() {
    let (mut hid, log) = controller(1920, 1080);
    hid.move_to(5000.0, -100.0, Duration::ZERO).unwrap();

    assert_eq!(hid.position(), (1919.0, 0.0));
    let frames = log.borrow();
    let (_, payload) = parse_frame(&frames[0]);
    let (_, ax, ay) = abs_report(&payload);
    assert_eq!(ax, 4095, "right edge maps to full range");
    assert!(ay <= 2, "top edge maps to the start of the range");
}

#[test]
fn interpolated_move_lands_exactly_on_target() {
    let (mut hid, log) = controller(1920, 1080);
    hid.move_to(100.0, 100.0, Duration::ZERO).unwrap();
    let before = log.borrow().len();

    // 210ms at 40ms per step: 4 eased steps plus the landing report
    hid.move_to(500.0, 300.0, Duration::from_millis(210)).unwrap();

    let frames = log.borrow();
    let steps: Vec<_> = frames[before..]
        .iter()
        .map(|f| abs_report(&parse_frame(f).1))
        .collect();
    assert_eq!(steps.len(), 5);

    // x strictly increases toward the target
    for pair in steps.windows(2) {
        assert!(pair[1].1 > pair[0].1, "monotonic approach: {steps:?}");
    }

    assert_eq!(hid.position(), (500.0, 300.0));
    let (_, final_x, _) = *steps.last().unwrap();
    let expected_x = ((500.0 + 0.5) * 4095.0 / 1919.0) as u16;
    assert_eq!(final_x, expected_x, "landing report uses the exact target");
}

#[test]
fn short_interpolated_move_is_skipped() {
    let (mut hid, log) = controller(1920, 1080);
    hid.move_to(100.0, 100.0, Duration::ZERO).unwrap();
    let before = log.borrow().len();

    hid.move_to(100.05, 100.0, Duration::from_millis(200)).unwrap();
    assert_eq!(log.borrow().len(), before, "sub-epsilon move sends nothing");
}

#[test]
fn drag_deltas_sum_exactly_to_request() {
    for (dx, dy) in [(10.0, -17.0), (153.0, 41.0), (-260.0, -1.0), (0.0, 9.0)] {
        let (mut hid, log) = controller(1920, 1080);
        hid.move_to(800.0, 500.0, Duration::ZERO).unwrap();
        let before = log.borrow().len();

        hid.drag_rel(dx, dy).unwrap();

        let frames = log.borrow();
        let mut sum = (0i64, 0i64);
        let mut abs_frames = Vec::new();
        for frame in &frames[before..] {
            let (command, payload) = parse_frame(frame);
            match command {
                cmd::SEND_MS_REL_DATA => {
                    let (buttons, sx, sy, _) = rel_report(&payload);
                    assert_eq!(buttons, 0x01, "left button held during drag");
                    sum.0 += i64::from(sx);
                    sum.1 += i64::from(sy);
                }
                cmd::SEND_MS_ABS_DATA => abs_frames.push(abs_report(&payload)),
                other => panic!("unexpected command 0x{other:02X}"),
            }
        }

        assert_eq!(sum, (dx as i64, dy as i64), "no drift for ({dx}, {dy})");
        assert_eq!(abs_frames.len(), 2, "press and release brackets");
        assert_eq!(abs_frames[0].0, 0x01);
        assert_eq!(abs_frames[1].0, 0x00);
        assert_eq!(hid.position(), (800.0 + dx, 500.0 + dy));
    }
}

#[test]
fn drag_to_reaches_target_position() {
    let (mut hid, _log) = controller(1920, 1080);
    hid.move_to(100.0, 100.0, Duration::ZERO).unwrap();
    hid.drag_to(350.5, 40.0).unwrap();
    // logical position advances by the full requested delta
    assert_eq!(hid.position(), (350.5, 40.0));
}

#[test]
fn scroll_emits_multiplied_single_detents() {
    let (mut hid, log) = controller(1920, 1080);
    hid.scroll(2).unwrap();

    let frames = log.borrow();
    assert_eq!(frames.len(), 6, "2 clicks x multiplier 3");
    for frame in frames.iter() {
        let (command, payload) = parse_frame(frame);
        assert_eq!(command, cmd::SEND_MS_REL_DATA);
        let (_, sx, sy, wheel) = rel_report(&payload);
        assert_eq!((sx, sy), (0, 0));
        assert_eq!(wheel, 1, "scroll up");
    }
}

#[test]
fn scroll_down_and_cap() {
    let (mut hid, log) = controller(1920, 1080);
    let mut timing = hid.timing().clone();
    timing.max_scroll_steps = 10;
    hid.set_timing(timing);

    hid.scroll(-100).unwrap();
    let frames = log.borrow();
    assert_eq!(frames.len(), 10, "capped");
    let (_, payload) = parse_frame(&frames[0]);
    assert_eq!(rel_report(&payload).3, -1, "scroll down");
}

#[test]
fn hscroll_brackets_with_shift() {
    let (mut hid, log) = controller(1920, 1080);
    hid.hscroll(1).unwrap();

    let frames = log.borrow();
    let parsed: Vec<_> = frames.iter().map(|f| parse_frame(f)).collect();
    assert_eq!(parsed[0].0, cmd::SEND_KB_GENERAL_DATA);
    assert_eq!(parsed[0].1[0], 0x02, "Shift pressed first");
    let wheels = parsed[1..parsed.len() - 1]
        .iter()
        .filter(|(c, _)| *c == cmd::SEND_MS_REL_DATA)
        .count();
    assert_eq!(wheels, 3);
    let last = parsed.last().unwrap();
    assert_eq!(last.0, cmd::SEND_KB_GENERAL_DATA);
    assert_eq!(last.1[0], 0x00, "Shift released");
    assert_eq!(hid.held_modifiers(), 0);
}

#[test]
fn zero_scroll_is_a_noop() {
    let (mut hid, log) = controller(1920, 1080);
    hid.scroll(0).unwrap();
    hid.hscroll(0).unwrap();
    assert!(log.borrow().is_empty());
}

// ============================================================================
// Recovery and failure semantics
// ============================================================================

#[test]
fn reset_pins_cursor_and_clears_state() {
    let (mut hid, log) = controller(1920, 1080);
    hid.key_down("ctrl").unwrap();
    hid.mouse_down(MouseButton::Left).unwrap();
    let before = log.borrow().len();

    hid.reset().unwrap();

    let frames = log.borrow();
    let parsed: Vec<_> = frames[before..].iter().map(|f| parse_frame(f)).collect();

    // 1920/100 + 10 pushes, each maximum-magnitude up-left
    let pushes: Vec<_> = parsed
        .iter()
        .take_while(|(c, _)| *c == cmd::SEND_MS_REL_DATA)
        .collect();
    assert_eq!(pushes.len(), 29);
    for (_, payload) in &pushes {
        let (buttons, sx, sy, _) = rel_report(payload);
        assert_eq!(buttons, 0, "pushes carry no button state");
        assert_eq!((sx, sy), (-127, -127));
    }

    // then a zeroed keyboard report and a buttonless absolute report
    let tail = &parsed[pushes.len()..];
    assert_eq!(tail[0].0, cmd::SEND_KB_GENERAL_DATA);
    assert_eq!(tail[0].1, vec![0u8; 8]);
    assert_eq!(tail[1].0, cmd::SEND_MS_ABS_DATA);
    assert_eq!(abs_report(&tail[1].1).0, 0x00);

    assert_eq!(hid.position(), (0.0, 0.0));
    assert_eq!(hid.held_modifiers(), 0);
    assert!(hid.pressed_keys().is_empty());
}

#[test]
fn logical_state_survives_commit_failure() {
    // Device never answers: the protocol layer exhausts its retries, but
    // the logical view keeps the caller's intended state.
    let mut transport = AckingTransport::new();
    transport.mute = true;
    let log = transport.write_log();
    let client = Ch9329Client::with_clock(Box::new(transport), Box::new(NoopClock));
    let mut hid = HidController::with_clock(client, 1920, 1080, Box::new(NoopClock));

    let err = hid.key_down("a").unwrap_err();
    assert!(matches!(err, HidError::Protocol(_)));
    assert_eq!(log.borrow().len(), 3, "full retry budget spent");
    assert_eq!(hid.pressed_keys(), &[0x04], "intended state retained");
}
