mod commands;
mod renderer;
mod surface;
mod transform;

pub use commands::{Color, DrawStyle, Rect, RenderCommand, RenderQueue, Style, DEFAULT_STYLE};
pub use renderer::{compile_scene, execute, ExecuteReport};
pub use surface::{DrawCall, DrawSurface, PixelSurface, RecordingSurface};
pub use transform::{effective_scale, screen_width_to_local, Viewport};
