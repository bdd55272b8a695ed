use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use pixels::{Error as PixelsError, Pixels, SurfaceTexture};
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use super::engine::Engine;
use super::input::{Key, PointerButton, RawInput};
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::rendering::{PixelSurface, Viewport};

/// Pixel-delta wheel events are converted to line steps at this rate.
const PIXELS_PER_SCROLL_STEP: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub max_frame_delta: Duration,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Level Editor".to_string(),
            window_width: 1280,
            window_height: 720,
            max_frame_delta: Duration::from_millis(250),
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize pixel surface: {0}")]
    CreateSurface(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, engine: Engine) -> Result<(), AppError> {
    run_app_with_metrics(config, engine, MetricsHandle::default())
}

/// Opens a window and drives `engine` once per redraw until the window closes.
pub fn run_app_with_metrics(
    config: LoopConfig,
    mut engine: Engine,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let size = window.inner_size();
    let mut pixels = build_pixels(Arc::clone(&window), size.width, size.height)
        .map_err(AppError::CreateSurface)?;
    let mut viewport = Viewport::new(size.width, size.height);
    engine.set_viewport(viewport);

    event_loop.set_control_flow(ControlFlow::Poll);

    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    info!(
        width = viewport.width,
        height = viewport.height,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if new_size.width == 0 || new_size.height == 0 {
                        return;
                    }
                    match build_pixels(Arc::clone(&window), new_size.width, new_size.height) {
                        Ok(rebuilt) => {
                            pixels = rebuilt;
                            viewport = Viewport::new(new_size.width, new_size.height);
                            engine.set_viewport(viewport);
                        }
                        Err(error) => {
                            warn!(error = %error, "surface_resize_failed");
                            window_target.exit();
                        }
                    }
                }
                WindowEvent::Focused(false) => engine.push_input(RawInput::FocusLost),
                WindowEvent::CursorMoved { position, .. } => engine.push_input(
                    RawInput::PointerMoved(Vec2::new(position.x as f32, position.y as f32)),
                ),
                WindowEvent::CursorLeft { .. } => engine.push_input(RawInput::PointerLeft),
                WindowEvent::MouseInput { state, button, .. } => {
                    if let Some(button) = map_mouse_button(button) {
                        engine.push_input(match state {
                            ElementState::Pressed => RawInput::PointerDown(button),
                            ElementState::Released => RawInput::PointerUp(button),
                        });
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let steps = scroll_steps(delta);
                    if steps != 0.0 {
                        engine.push_input(RawInput::Scroll(steps));
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.repeat {
                        return;
                    }
                    if let Some(key) = map_key(event.physical_key) {
                        engine.push_input(match event.state {
                            ElementState::Pressed => RawInput::KeyDown(key),
                            ElementState::Released => RawInput::KeyUp(key),
                        });
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    let frame_dt = raw_frame_dt.min(max_frame_delta);

                    let report = {
                        let mut surface =
                            PixelSurface::new(pixels.frame_mut(), viewport.width, viewport.height);
                        engine.tick(frame_dt.as_secs_f32(), &mut surface)
                    };
                    if report.rendered {
                        if let Err(error) = pixels.render() {
                            warn!(error = %error, "surface_present_failed");
                            window_target.exit();
                        }
                    }
                    metrics_accumulator.record_tick(raw_frame_dt, report.rendered);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            render_fps = snapshot.render_fps,
                            frame_time_ms = snapshot.frame_time_ms,
                            skipped_frames = snapshot.skipped_frames,
                            commands = engine.stats().last_command_count,
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => {
                engine.shutdown();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn build_pixels(window: Arc<Window>, width: u32, height: u32) -> Result<Pixels<'static>, PixelsError> {
    let surface = SurfaceTexture::new(width, height, window);
    Pixels::new(width, height, surface)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn map_mouse_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Left),
        MouseButton::Middle => Some(PointerButton::Middle),
        MouseButton::Right => Some(PointerButton::Right),
        _ => None,
    }
}

fn scroll_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => (position.y / PIXELS_PER_SCROLL_STEP) as f32,
    }
}

fn map_key(key: PhysicalKey) -> Option<Key> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let key = match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter | KeyCode::NumpadEnter => Key::Enter,
        KeyCode::Space => Key::Space,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,
        KeyCode::SuperLeft | KeyCode::SuperRight => Key::Meta,
        KeyCode::ArrowUp => Key::ArrowUp,
        KeyCode::ArrowDown => Key::ArrowDown,
        KeyCode::ArrowLeft => Key::ArrowLeft,
        KeyCode::ArrowRight => Key::ArrowRight,
        other => return letter_or_digit(other).map(Key::Char),
    };
    Some(key)
}

fn letter_or_digit(code: KeyCode) -> Option<char> {
    const LETTERS: [(KeyCode, char); 26] = [
        (KeyCode::KeyA, 'a'),
        (KeyCode::KeyB, 'b'),
        (KeyCode::KeyC, 'c'),
        (KeyCode::KeyD, 'd'),
        (KeyCode::KeyE, 'e'),
        (KeyCode::KeyF, 'f'),
        (KeyCode::KeyG, 'g'),
        (KeyCode::KeyH, 'h'),
        (KeyCode::KeyI, 'i'),
        (KeyCode::KeyJ, 'j'),
        (KeyCode::KeyK, 'k'),
        (KeyCode::KeyL, 'l'),
        (KeyCode::KeyM, 'm'),
        (KeyCode::KeyN, 'n'),
        (KeyCode::KeyO, 'o'),
        (KeyCode::KeyP, 'p'),
        (KeyCode::KeyQ, 'q'),
        (KeyCode::KeyR, 'r'),
        (KeyCode::KeyS, 's'),
        (KeyCode::KeyT, 't'),
        (KeyCode::KeyU, 'u'),
        (KeyCode::KeyV, 'v'),
        (KeyCode::KeyW, 'w'),
        (KeyCode::KeyX, 'x'),
        (KeyCode::KeyY, 'y'),
        (KeyCode::KeyZ, 'z'),
    ];
    const DIGITS: [(KeyCode, char); 10] = [
        (KeyCode::Digit0, '0'),
        (KeyCode::Digit1, '1'),
        (KeyCode::Digit2, '2'),
        (KeyCode::Digit3, '3'),
        (KeyCode::Digit4, '4'),
        (KeyCode::Digit5, '5'),
        (KeyCode::Digit6, '6'),
        (KeyCode::Digit7, '7'),
        (KeyCode::Digit8, '8'),
        (KeyCode::Digit9, '9'),
    ];
    LETTERS
        .iter()
        .chain(DIGITS.iter())
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, ch)| *ch)
}
