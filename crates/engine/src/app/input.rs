use std::collections::HashMap;

use glam::{Affine2, Vec2};

pub const DEFAULT_CLICK_DISTANCE_PX: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Space,
    Tab,
    Backspace,
    Delete,
    Shift,
    Control,
    Alt,
    Meta,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    /// Printable key, lowercased.
    Char(char),
}

impl Key {
    pub fn char(ch: char) -> Self {
        Key::Char(ch.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

const BUTTON_COUNT: usize = 3;

impl PointerButton {
    pub const ALL: [PointerButton; BUTTON_COUNT] =
        [PointerButton::Left, PointerButton::Middle, PointerButton::Right];

    const fn index(self) -> usize {
        match self {
            PointerButton::Left => 0,
            PointerButton::Middle => 1,
            PointerButton::Right => 2,
        }
    }
}

/// Device event as delivered by the host, queued until the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    KeyDown(Key),
    KeyUp(Key),
    /// Screen pixels, origin top-left.
    PointerMoved(Vec2),
    PointerLeft,
    PointerDown(PointerButton),
    PointerUp(PointerButton),
    /// Wheel steps; positive zooms in.
    Scroll(f32),
    FocusLost,
}

/// Per-tick state of one key or button.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ButtonState {
    pub down: bool,
    pub pressed: bool,
    pub released: bool,
    /// Seconds held; kept on the release tick.
    pub down_time: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerButtonState {
    pub state: ButtonState,
    /// Released within the click distance of where it was pressed.
    pub clicked: bool,
    pub press_position: Option<Vec2>,
}

impl PointerButtonState {
    pub fn down(&self) -> bool {
        self.state.down
    }

    pub fn pressed(&self) -> bool {
        self.state.pressed
    }

    pub fn released(&self) -> bool {
        self.state.released
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tracker {
    raw_down: bool,
    saw_down: bool,
    saw_up: bool,
    state: ButtonState,
}

impl Tracker {
    fn on_down(&mut self) {
        self.raw_down = true;
        self.saw_down = true;
    }

    fn on_up(&mut self) {
        self.raw_down = false;
        self.saw_up = true;
    }

    fn sample(&mut self, dt_seconds: f32) {
        let previous = self.state;
        // A held key released and pressed again inside one tick reports both edges.
        let pressed = if previous.down {
            self.saw_up && self.raw_down
        } else {
            self.raw_down || self.saw_down
        };
        let released = (previous.down || self.saw_down) && self.saw_up;
        let down_time = if self.raw_down {
            if pressed {
                0.0
            } else {
                previous.down_time + dt_seconds
            }
        } else if released {
            previous.down_time
        } else {
            0.0
        };
        self.state = ButtonState {
            down: self.raw_down,
            pressed,
            released,
            down_time,
        };
        self.saw_down = false;
        self.saw_up = false;
    }

    fn is_idle(&self) -> bool {
        !self.raw_down && self.state == ButtonState::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PointerTracker {
    tracker: Tracker,
    press_position: Option<Vec2>,
    release_position: Option<Vec2>,
    clicked: bool,
}

/// Folds queued [`RawInput`] into per-tick key, button and pointer state.
#[derive(Debug, Clone)]
pub struct InputSystem {
    queue: Vec<RawInput>,
    keys: HashMap<Key, Tracker>,
    buttons: [PointerTracker; BUTTON_COUNT],
    pointer_screen: Option<Vec2>,
    pointer_world: Option<Vec2>,
    raw_scroll: f32,
    scroll: f32,
    click_distance_px: f32,
}

impl Default for InputSystem {
    fn default() -> Self {
        Self::new(DEFAULT_CLICK_DISTANCE_PX)
    }
}

impl InputSystem {
    pub fn new(click_distance_px: f32) -> Self {
        Self {
            queue: Vec::new(),
            keys: HashMap::new(),
            buttons: [PointerTracker::default(); BUTTON_COUNT],
            pointer_screen: None,
            pointer_world: None,
            raw_scroll: 0.0,
            scroll: 0.0,
            click_distance_px,
        }
    }

    pub fn push(&mut self, event: RawInput) {
        self.queue.push(event);
    }

    /// Applies queued events and computes this tick's edges.
    pub fn sample(&mut self, dt_seconds: f32, screen_to_world: Affine2) {
        for event in std::mem::take(&mut self.queue) {
            match event {
                RawInput::KeyDown(key) => self.keys.entry(key).or_default().on_down(),
                RawInput::KeyUp(key) => self.keys.entry(key).or_default().on_up(),
                RawInput::PointerMoved(position) => self.pointer_screen = Some(position),
                RawInput::PointerLeft => self.pointer_screen = None,
                RawInput::PointerDown(button) => {
                    let pointer = self.pointer_screen;
                    let tracker = &mut self.buttons[button.index()];
                    tracker.tracker.on_down();
                    tracker.press_position = pointer;
                }
                RawInput::PointerUp(button) => {
                    let pointer = self.pointer_screen;
                    let tracker = &mut self.buttons[button.index()];
                    tracker.tracker.on_up();
                    tracker.release_position = pointer;
                }
                RawInput::Scroll(delta) => self.raw_scroll += delta,
                RawInput::FocusLost => {
                    for tracker in self.keys.values_mut() {
                        tracker.on_up();
                    }
                    for button in &mut self.buttons {
                        button.tracker.on_up();
                        button.release_position = None;
                    }
                }
            }
        }

        for tracker in self.keys.values_mut() {
            tracker.sample(dt_seconds);
        }
        self.keys.retain(|_, tracker| !tracker.is_idle());

        let click_distance = self.click_distance_px;
        for button in &mut self.buttons {
            button.tracker.sample(dt_seconds);
            button.clicked = button.tracker.state.released
                && match (button.press_position, button.release_position) {
                    (Some(press), Some(release)) => press.distance(release) < click_distance,
                    _ => false,
                };
        }

        self.scroll = std::mem::take(&mut self.raw_scroll);
        self.pointer_world = self
            .pointer_screen
            .map(|screen| screen_to_world.transform_point2(screen));
    }

    pub fn key(&self, key: Key) -> ButtonState {
        self.keys
            .get(&key)
            .map(|tracker| tracker.state)
            .unwrap_or_default()
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.key(key).down
    }

    pub fn key_pressed(&self, key: Key) -> bool {
        self.key(key).pressed
    }

    pub fn shift_down(&self) -> bool {
        self.is_key_down(Key::Shift)
    }

    /// Control or Meta, so shortcuts work with either modifier.
    pub fn command_down(&self) -> bool {
        self.is_key_down(Key::Control) || self.is_key_down(Key::Meta)
    }

    pub fn button(&self, button: PointerButton) -> PointerButtonState {
        let tracker = &self.buttons[button.index()];
        PointerButtonState {
            state: tracker.tracker.state,
            clicked: tracker.clicked,
            press_position: tracker.press_position,
        }
    }

    /// Consumes this tick's click so later handlers do not see it again.
    pub fn capture_click(&mut self, button: PointerButton) -> bool {
        std::mem::take(&mut self.buttons[button.index()].clicked)
    }

    pub fn pointer_screen(&self) -> Option<Vec2> {
        self.pointer_screen
    }

    pub fn pointer_world(&self) -> Option<Vec2> {
        self.pointer_world
    }

    /// Scroll steps of this tick; the first caller consumes them.
    pub fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll)
    }

    pub fn click_distance_px(&self) -> f32 {
        self.click_distance_px
    }
}
