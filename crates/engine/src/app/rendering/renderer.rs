use glam::Affine2;

use super::commands::{Color, DrawStyle, RenderCommand, RenderQueue};
use super::surface::DrawSurface;
use super::transform::{screen_width_to_local, Viewport};
use crate::app::camera::Camera;
use crate::app::entity::SceneGraph;
use crate::app::images::ImageResolver;
use crate::app::scene::SceneSpace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    pub draw_calls: usize,
    /// Image names that had no bitmap; drawn as nothing.
    pub missing_images: Vec<String>,
    /// Pops without a matching push, ignored.
    pub unbalanced_pops: usize,
}

/// Appends one scene's commands, wrapped in the camera matrix for world
/// scenes. The graph must have had `sort_pending` applied.
pub fn compile_scene(
    graph: &SceneGraph,
    space: SceneSpace,
    camera: &Camera,
    viewport: Viewport,
    queue: &mut RenderQueue,
) {
    let base = match space {
        SceneSpace::World => camera.world_to_screen_matrix(viewport),
        SceneSpace::Screen => Affine2::IDENTITY,
    };
    queue.push_transform(base);
    graph.queue_render_commands(camera, viewport, queue);
    queue.pop_transform();
}

/// Replays a compiled stream against `surface`.
pub fn execute(
    commands: &[RenderCommand],
    surface: &mut dyn DrawSurface,
    images: &dyn ImageResolver,
    clear_color: Color,
) -> ExecuteReport {
    let mut report = ExecuteReport::default();
    let mut depth = 0usize;
    surface.clear(clear_color);

    for command in commands {
        match command {
            RenderCommand::PushTransform(matrix) => {
                surface.save();
                surface.transform(*matrix);
                depth += 1;
            }
            RenderCommand::PopTransform => {
                if depth == 0 {
                    report.unbalanced_pops += 1;
                    continue;
                }
                surface.restore();
                depth -= 1;
            }
            RenderCommand::Rect { rect, style } => {
                if let Some(fill) = paint(style.fill, style) {
                    surface.fill_rect(*rect, fill);
                    report.draw_calls += 1;
                }
                if let Some((stroke, width)) = stroke(style, surface) {
                    surface.stroke_rect(*rect, stroke, width);
                    report.draw_calls += 1;
                }
            }
            RenderCommand::Ellipse { rect, style } => {
                if let Some(fill) = paint(style.fill, style) {
                    surface.fill_ellipse(*rect, fill);
                    report.draw_calls += 1;
                }
                if let Some((stroke, width)) = stroke(style, surface) {
                    surface.stroke_ellipse(*rect, stroke, width);
                    report.draw_calls += 1;
                }
            }
            RenderCommand::Line { from, to, style } => {
                if let Some((stroke, width)) = stroke(style, surface) {
                    surface.line(*from, *to, stroke, width);
                    report.draw_calls += 1;
                }
            }
            RenderCommand::Image { name, rect, style } => match images.resolve(name) {
                Some(bitmap) => {
                    if style.opacity > 0.0 {
                        surface.draw_image(bitmap, *rect, style.opacity);
                        report.draw_calls += 1;
                    }
                }
                None => {
                    if !report.missing_images.iter().any(|missing| missing == name) {
                        report.missing_images.push(name.clone());
                    }
                }
            },
        }
    }

    while depth > 0 {
        surface.restore();
        depth -= 1;
    }
    report
}

fn paint(color: Option<Color>, style: &DrawStyle) -> Option<Color> {
    let color = color?;
    let alpha = (color.a as f32 * style.opacity).round() as u8;
    (alpha > 0).then(|| color.with_alpha(alpha))
}

fn stroke(style: &DrawStyle, surface: &dyn DrawSurface) -> Option<(Color, f32)> {
    if style.line_width <= 0.0 {
        return None;
    }
    let color = paint(style.stroke, style)?;
    let width = screen_width_to_local(style.line_width, &surface.current_transform());
    Some((color, width))
}
