//! Gesture-level HID controller
//!
//! `HidController` keeps the logical keyboard/mouse state authoritative and
//! decomposes gestures (press, hotkey, move, drag, scroll) into protocol
//! calls. Every mouse mutation is committed as a single absolute
//! position-plus-buttons report, so the hardware's view of the button mask
//! and cursor can never disagree with the logical one after a successful
//! commit. Relative reports are reserved for pure displacement: drags and
//! the scroll wheel.
//!
//! Logical state is not rolled back when a commit fails: it reflects the
//! caller's *intended* state, and the next successful commit reconciles the
//! hardware. Callers that need certainty check the returned results.

use std::time::Duration;

use tracing::debug;

use ch9329_transport::{Ch9329Client, ChipInfo, Clock, SystemClock};

use crate::error::HidError;
use crate::keyboard::KeyboardState;
use crate::keymap;
use crate::mouse::{map_to_absolute, MouseButton, MouseState};

/// Logical drag step length, in pixels. Small enough that each relative
/// report stays well inside the signed-byte range after truncation.
const DRAG_STEP: f64 = 4.62;

/// Movement shorter than this is treated as already at the target.
const MOVE_EPSILON: f64 = 0.1;

/// Pacing and sensitivity knobs for gesture synthesis.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Pause after every committed report, to pace slow links. Zero skips
    /// the sleep entirely.
    pub dwell: Duration,
    /// How long `press`/`click` hold before releasing.
    pub hold: Duration,
    /// Gap between consecutive clicks of a multi-click.
    pub multi_click_gap: Duration,
    /// Interval between interpolated movement steps.
    pub move_step: Duration,
    /// Wheel detents emitted per logical scroll click.
    pub scroll_multiplier: u32,
    /// Upper bound on wheel reports per scroll call, bounding worst-case
    /// latency at low baud rates.
    pub max_scroll_steps: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            dwell: Duration::ZERO,
            hold: Duration::from_millis(50),
            multi_click_gap: Duration::from_millis(80),
            move_step: Duration::from_millis(40),
            scroll_multiplier: 3,
            max_scroll_steps: 150,
        }
    }
}

/// High-level keyboard/mouse controller over one CH9329 client.
///
/// One instance per physical device; all methods take `&mut self` and the
/// relative ordering of the wire commands they issue is semantically
/// significant (press before release), so sharing an instance across
/// threads requires external serialization.
pub struct HidController {
    client: Ch9329Client,
    width: u32,
    height: u32,
    timing: Timing,
    clock: Box<dyn Clock>,
    keyboard: KeyboardState,
    mouse: MouseState,
}

impl HidController {
    /// Wrap a protocol client for a display of `width` x `height` logical
    /// pixels.
    ///
    /// Performs no wire traffic; call [`reset`](Self::reset) once at
    /// startup to anchor the physical cursor to a known position.
    pub fn new(client: Ch9329Client, width: u32, height: u32) -> Self {
        Self::with_clock(client, width, height, Box::new(SystemClock))
    }

    /// As [`new`](Self::new) with an explicit sleep source.
    pub fn with_clock(
        client: Ch9329Client,
        width: u32,
        height: u32,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            client,
            width,
            height,
            timing: Timing::default(),
            clock,
            keyboard: KeyboardState::default(),
            mouse: MouseState::default(),
        }
    }

    /// Current pacing configuration.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Replace the pacing configuration.
    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Access the owned protocol client.
    pub fn client(&mut self) -> &mut Ch9329Client {
        &mut self.client
    }

    /// Logical cursor position.
    pub fn position(&self) -> (f64, f64) {
        (self.mouse.x, self.mouse.y)
    }

    /// Persistent modifier mask currently held.
    pub fn held_modifiers(&self) -> u8 {
        self.keyboard.modifiers
    }

    /// Scancodes currently held, in press order.
    pub fn pressed_keys(&self) -> &[u8] {
        self.keyboard.pressed.as_slice()
    }

    /// Query chip version, USB attachment, and lock-LED state.
    pub fn device_info(&mut self) -> Result<ChipInfo, HidError> {
        Ok(self.client.get_info()?)
    }

    fn dwell(&self) {
        self.clock.sleep(self.timing.dwell);
    }

    // ========================================================================
    // Keyboard gestures
    // ========================================================================

    /// Send the full current keyboard state, OR-ing in a transient modifier
    /// that is not part of persistent state (Shift for an uppercase letter).
    fn commit_keyboard_state(&mut self, transient_modifier: u8) -> Result<(), HidError> {
        self.client.send_keyboard(
            self.keyboard.modifiers | transient_modifier,
            self.keyboard.pressed.as_slice(),
        )?;
        Ok(())
    }

    /// Press and hold a key.
    ///
    /// Named modifier keys ("ctrl", "cmd", ...) toggle the persistent
    /// modifier mask; everything else resolves through the keymap and joins
    /// the held-key set (oldest held key is evicted past six).
    pub fn key_down(&mut self, key: &str) -> Result<(), HidError> {
        if let Some(bit) = keymap::modifier_from_name(key) {
            self.keyboard.modifiers |= bit;
            self.commit_keyboard_state(0)?;
        } else {
            let (transient, code) = self.resolve_key(key)?;
            self.keyboard.pressed.push(code);
            self.commit_keyboard_state(transient)?;
        }
        self.dwell();
        Ok(())
    }

    /// Release one key, leaving everything else held.
    pub fn key_up(&mut self, key: &str) -> Result<(), HidError> {
        if let Some(bit) = keymap::modifier_from_name(key) {
            self.keyboard.modifiers &= !bit;
        } else {
            let (_, code) = self.resolve_key(key)?;
            self.keyboard.pressed.remove(code);
        }
        // Whatever was released, sync the accurate persistent state.
        self.commit_keyboard_state(0)?;
        self.dwell();
        Ok(())
    }

    /// Release every key and modifier.
    pub fn release_all_keys(&mut self) -> Result<(), HidError> {
        self.keyboard.clear();
        self.client.send_keyboard(0x00, &[])?;
        self.dwell();
        Ok(())
    }

    /// Full key press: down, hold, up.
    pub fn press(&mut self, key: &str) -> Result<(), HidError> {
        self.key_down(key)?;
        self.clock.sleep(self.timing.hold);
        self.key_up(key)
    }

    /// Type a string character by character.
    pub fn type_text(&mut self, text: &str) -> Result<(), HidError> {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.press(ch.encode_utf8(&mut buf))?;
        }
        Ok(())
    }

    /// Press a key combination (e.g. `["ctrl", "c"]`) as one transient
    /// chord.
    ///
    /// The chord is computed from the arguments alone: persistent modifier
    /// state is neither merged into the chord nor altered by it, and the
    /// previous keyboard state is restored verbatim afterwards.
    pub fn hotkey(&mut self, keys: &[&str]) -> Result<(), HidError> {
        let mut chord_modifier = 0u8;
        let mut chord_codes: Vec<u8> = Vec::new();

        for key in keys {
            if let Some(bit) = keymap::modifier_from_name(key) {
                chord_modifier |= bit;
            } else {
                let (transient, code) = self.resolve_key(key)?;
                chord_modifier |= transient;
                if !chord_codes.contains(&code) {
                    chord_codes.push(code);
                }
            }
        }

        if chord_modifier == 0 && chord_codes.is_empty() {
            return Ok(());
        }

        // Modifiers land first; some hosts drop the chord if modifier and
        // key arrive in the same report transition.
        if chord_modifier != 0 {
            self.client.send_keyboard(chord_modifier, &[])?;
            self.dwell();
        }
        self.client.send_keyboard(chord_modifier, &chord_codes)?;
        self.clock.sleep(self.timing.hold);

        self.commit_keyboard_state(0)?;
        self.dwell();
        Ok(())
    }

    /// Press a numpad key by its printable name: `numpad_press("7")` is
    /// `press("num7")`.
    pub fn numpad_press(&mut self, key: &str) -> Result<(), HidError> {
        let name = format!("num{key}");
        if keymap::numpad_key(&name).is_none() {
            return Err(HidError::UnknownKey(name));
        }
        self.press(&name)
    }

    /// Type a string through the numpad keys.
    pub fn numpad_text(&mut self, text: &str) -> Result<(), HidError> {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.numpad_press(ch.encode_utf8(&mut buf))?;
        }
        Ok(())
    }

    fn resolve_key(&self, key: &str) -> Result<(u8, u8), HidError> {
        keymap::lookup(key).ok_or_else(|| HidError::UnknownKey(key.to_string()))
    }

    // ========================================================================
    // Mouse gestures
    // ========================================================================

    /// Commit logical x/y and button mask to the hardware as one absolute
    /// report. This is the synchronization primitive for all button and
    /// position changes.
    fn commit_mouse_state(&mut self) -> Result<(), HidError> {
        let (ax, ay) = map_to_absolute(self.mouse.x, self.mouse.y, self.width, self.height);
        self.client.send_mouse_abs(ax, ay, self.mouse.buttons, 0)?;
        Ok(())
    }

    /// Press and hold a mouse button at the current position.
    pub fn mouse_down(&mut self, button: MouseButton) -> Result<(), HidError> {
        self.mouse.buttons |= button.bit();
        self.commit_mouse_state()?;
        self.dwell();
        Ok(())
    }

    /// Release a mouse button.
    pub fn mouse_up(&mut self, button: MouseButton) -> Result<(), HidError> {
        self.mouse.buttons &= !button.bit();
        self.commit_mouse_state()?;
        self.dwell();
        Ok(())
    }

    /// Release every mouse button.
    pub fn release_mouse_buttons(&mut self) -> Result<(), HidError> {
        self.mouse.buttons = 0;
        self.commit_mouse_state()?;
        self.dwell();
        Ok(())
    }

    /// Click a button `clicks` times at the current position.
    pub fn click(&mut self, button: MouseButton, clicks: u32) -> Result<(), HidError> {
        for i in 0..clicks {
            self.mouse_down(button)?;
            self.clock.sleep(self.timing.hold);
            self.mouse_up(button)?;
            if i + 1 < clicks {
                self.clock.sleep(self.timing.multi_click_gap);
            }
        }
        Ok(())
    }

    /// Move to `(x, y)` instantly, then click.
    pub fn click_at(
        &mut self,
        x: f64,
        y: f64,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), HidError> {
        self.move_to(x, y, Duration::ZERO)?;
        self.click(button, clicks)
    }

    fn clamp_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(0.0, (self.width.saturating_sub(1)) as f64),
            y.clamp(0.0, (self.height.saturating_sub(1)) as f64),
        )
    }

    /// Move the cursor to absolute logical coordinates.
    ///
    /// Zero duration jumps instantly. Otherwise movement is interpolated
    /// with an ease-out curve (`t' = 1 - (1-t)^2`) so perceived motion
    /// decelerates into the target; some OS input stacks drop or misread
    /// instantaneous absolute jumps. The final step always lands exactly on
    /// the clamped target.
    pub fn move_to(&mut self, x: f64, y: f64, duration: Duration) -> Result<(), HidError> {
        let (start_x, start_y) = (self.mouse.x, self.mouse.y);
        let (target_x, target_y) = self.clamp_to_screen(x, y);

        if duration.is_zero() {
            self.mouse.x = target_x;
            self.mouse.y = target_y;
            self.commit_mouse_state()?;
            self.dwell();
            return Ok(());
        }

        let dist_x = target_x - start_x;
        let dist_y = target_y - start_y;
        if dist_x.abs() < MOVE_EPSILON && dist_y.abs() < MOVE_EPSILON {
            return Ok(());
        }

        let steps = ((duration.as_secs_f64() / self.timing.move_step.as_secs_f64()) as usize)
            .max(1);
        for i in 1..steps {
            let t = i as f64 / steps as f64;
            let eased = 1.0 - (1.0 - t) * (1.0 - t);
            self.mouse.x = start_x + dist_x * eased;
            self.mouse.y = start_y + dist_y * eased;
            self.commit_mouse_state()?;
            self.clock.sleep(self.timing.move_step);
        }

        // Precision landing: no residual float error at the target.
        self.mouse.x = target_x;
        self.mouse.y = target_y;
        self.commit_mouse_state()?;
        self.dwell();
        Ok(())
    }

    /// Move the cursor by a displacement.
    ///
    /// Implemented over [`move_to`](Self::move_to): relative wire reports
    /// are not 1:1 with logical pixels on every host (pointer acceleration),
    /// so displacement is resolved against the logical position instead.
    pub fn move_rel(&mut self, dx: f64, dy: f64, duration: Duration) -> Result<(), HidError> {
        self.move_to(self.mouse.x + dx, self.mouse.y + dy, duration)
    }

    /// Vertical scroll: positive is up, negative is down.
    ///
    /// Emits `|clicks| * scroll_multiplier` single-detent wheel reports,
    /// capped at `max_scroll_steps` per call.
    pub fn scroll(&mut self, clicks: i32) -> Result<(), HidError> {
        if clicks == 0 {
            return Ok(());
        }

        let requested = clicks.unsigned_abs() * self.timing.scroll_multiplier;
        let steps = requested.min(self.timing.max_scroll_steps);
        if steps < requested {
            debug!("scroll capped at {steps} of {requested} wheel reports");
        }
        let direction = if clicks > 0 { 1 } else { -1 };

        for _ in 0..steps {
            self.client
                .send_mouse_rel(0, 0, self.mouse.buttons, direction)?;
            self.dwell();
        }
        Ok(())
    }

    /// Horizontal scroll synthesized as Shift + vertical scroll.
    ///
    /// The relative report has no horizontal wheel field; hosts interpret
    /// Shift-wheel as horizontal. Positive scrolls right.
    pub fn hscroll(&mut self, clicks: i32) -> Result<(), HidError> {
        if clicks == 0 {
            return Ok(());
        }
        self.key_down("shift")?;
        let result = self.scroll(clicks);
        // Always try to release Shift, even when scrolling failed midway.
        let released = self.key_up("shift");
        result?;
        released
    }

    /// Drag to absolute coordinates with the left button held.
    pub fn drag_to(&mut self, x: f64, y: f64) -> Result<(), HidError> {
        self.drag_rel(x - self.mouse.x, y - self.mouse.y)
    }

    /// Drag by a displacement with the left button held.
    ///
    /// The path is decomposed into ~[`DRAG_STEP`]-pixel relative reports.
    /// Fractional per-step displacement is accumulated and carried between
    /// steps, and the final step emits the rounded remainder, so the
    /// emitted deltas sum to the requested displacement with no
    /// truncation drift.
    pub fn drag_rel(&mut self, dx: f64, dy: f64) -> Result<(), HidError> {
        let distance = dx.hypot(dy);
        if distance == 0.0 {
            return Ok(());
        }

        let steps = (distance / DRAG_STEP).ceil().max(1.0) as usize;
        let step_x = dx / steps as f64;
        let step_y = dy / steps as f64;

        self.mouse_down(MouseButton::Left)?;

        let mut accum_x = 0.0f64;
        let mut accum_y = 0.0f64;
        let mut emitted_x = 0i64;
        let mut emitted_y = 0i64;

        for i in 0..steps {
            let (send_x, send_y) = if i + 1 == steps {
                (
                    (dx - emitted_x as f64).round() as i32,
                    (dy - emitted_y as f64).round() as i32,
                )
            } else {
                accum_x += step_x;
                accum_y += step_y;
                let sx = accum_x.trunc() as i32;
                let sy = accum_y.trunc() as i32;
                accum_x -= sx as f64;
                accum_y -= sy as f64;
                (sx, sy)
            };

            emitted_x += i64::from(send_x);
            emitted_y += i64::from(send_y);
            if send_x != 0 || send_y != 0 {
                self.client
                    .send_mouse_rel(send_x, send_y, self.mouse.buttons, 0)?;
            }
        }

        self.mouse_up(MouseButton::Left)?;

        let (nx, ny) = self.clamp_to_screen(self.mouse.x + dx, self.mouse.y + dy);
        self.mouse.x = nx;
        self.mouse.y = ny;
        Ok(())
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Anchor the physical cursor to the top-left corner and clear all
    /// logical state.
    ///
    /// The chip cannot query the host's actual cursor position, so this
    /// pushes far enough up-left with maximum-magnitude relative reports
    /// that the cursor is pinned at (0,0) regardless of where it was, then
    /// resets the logical view to match and releases every key and button.
    pub fn reset(&mut self) -> Result<(), HidError> {
        let iters = (self.width.max(self.height) / 100 + 10) as usize;
        for _ in 0..iters {
            self.client.send_mouse_rel(-127, -127, 0, 0)?;
            self.dwell();
        }

        debug!("cursor anchored to origin after {iters} relative pushes");
        self.mouse.x = 0.0;
        self.mouse.y = 0.0;
        self.release_all_keys()?;
        self.release_mouse_buttons()?;
        Ok(())
    }
}
