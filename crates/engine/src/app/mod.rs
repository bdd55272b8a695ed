mod camera;
mod component;
mod engine;
mod entity;
mod images;
mod input;
mod loop_runner;
mod metrics;
mod pointer;
mod rendering;
mod scene;
mod transform;

pub use camera::{
    Camera, CameraTarget, CAMERA_SCROLL_ZOOM_BASE, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX,
    CAMERA_ZOOM_MIN, DEFAULT_PIXELS_PER_UNIT,
};
pub use component::{Component, ComponentId, FrameInfo, RenderContext, UpdateContext};
pub use engine::{Engine, EngineConfig, FrameReport};
pub use entity::{Entity, EntityId, SceneGraph};
pub use images::{
    image_path, load_bitmap, validate_image_name, Bitmap, ImageLoadError, ImageNameError,
    ImageResolver, ImageStore,
};
pub use input::{
    ButtonState, InputSystem, Key, PointerButton, PointerButtonState, RawInput,
    DEFAULT_CLICK_DISTANCE_PX,
};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig};
pub use metrics::{FrameStats, LoopMetricsSnapshot, MetricsHandle};
pub use pointer::{hit_test, update_hover, HoverOutcome, PointerTarget};
pub use rendering::{
    compile_scene, effective_scale, execute, screen_width_to_local, Color, DrawCall, DrawStyle,
    DrawSurface, ExecuteReport, PixelSurface, Rect, RecordingSurface, RenderCommand, RenderQueue,
    Style, Viewport, DEFAULT_STYLE,
};
pub use scene::{Scene, SceneContext, SceneSpace};
pub use transform::Transform;
