use glam::{Affine2, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// Axis-aligned rectangle in the local space of the emitting entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centered(center: Vec2, size: Vec2) -> Self {
        Self::new(
            center.x - size.x * 0.5,
            center.y - size.y * 0.5,
            size.x,
            size.y,
        )
    }

    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Half-open on the max side.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

/// Partial style as written by components; unset fields fall back to
/// [`DEFAULT_STYLE`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub line_width: Option<f32>,
    pub opacity: Option<f32>,
}

impl Style {
    /// Fill only; the stroke is made transparent instead of defaulting.
    pub fn fill(color: Color) -> Self {
        Self {
            fill: Some(color),
            stroke: Some(Color::TRANSPARENT),
            ..Self::default()
        }
    }

    pub fn stroke(color: Color, line_width: f32) -> Self {
        Self {
            stroke: Some(color),
            line_width: Some(line_width),
            ..Self::default()
        }
    }

    pub fn with_fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn with_stroke(mut self, color: Color) -> Self {
        self.stroke = Some(color);
        self
    }

    pub fn with_line_width(mut self, line_width: f32) -> Self {
        self.line_width = Some(line_width);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn resolve(self) -> DrawStyle {
        DrawStyle {
            fill: self.fill.or(DEFAULT_STYLE.fill),
            stroke: self.stroke.or(DEFAULT_STYLE.stroke),
            line_width: self.line_width.unwrap_or(DEFAULT_STYLE.line_width),
            opacity: self
                .opacity
                .unwrap_or(DEFAULT_STYLE.opacity)
                .clamp(0.0, 1.0),
        }
    }
}

/// Fully resolved style carried by every draw command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawStyle {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    /// Screen pixels.
    pub line_width: f32,
    pub opacity: f32,
}

pub const DEFAULT_STYLE: DrawStyle = DrawStyle {
    fill: None,
    stroke: Some(Color::BLACK),
    line_width: 1.0,
    opacity: 1.0,
};

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    PushTransform(Affine2),
    PopTransform,
    Rect { rect: Rect, style: DrawStyle },
    Ellipse { rect: Rect, style: DrawStyle },
    Line { from: Vec2, to: Vec2, style: DrawStyle },
    Image { name: String, rect: Rect, style: DrawStyle },
}

impl RenderCommand {
    pub fn is_draw(&self) -> bool {
        !matches!(
            self,
            RenderCommand::PushTransform(_) | RenderCommand::PopTransform
        )
    }
}

/// Flat command stream compiled from the scene graphs once per rendered frame.
#[derive(Debug, Default)]
pub struct RenderQueue {
    commands: Vec<RenderCommand>,
}

impl RenderQueue {
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn push_transform(&mut self, matrix: Affine2) {
        self.commands.push(RenderCommand::PushTransform(matrix));
    }

    pub fn pop_transform(&mut self) {
        self.commands.push(RenderCommand::PopTransform);
    }

    pub fn rect(&mut self, rect: Rect, style: Style) {
        self.commands.push(RenderCommand::Rect {
            rect,
            style: style.resolve(),
        });
    }

    pub fn ellipse(&mut self, rect: Rect, style: Style) {
        self.commands.push(RenderCommand::Ellipse {
            rect,
            style: style.resolve(),
        });
    }

    pub fn line(&mut self, from: Vec2, to: Vec2, style: Style) {
        self.commands.push(RenderCommand::Line {
            from,
            to,
            style: style.resolve(),
        });
    }

    pub fn image(&mut self, name: impl Into<String>, rect: Rect, style: Style) {
        self.commands.push(RenderCommand::Image {
            name: name.into(),
            rect,
            style: style.resolve(),
        });
    }

    /// Names of every image referenced by the current stream.
    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            RenderCommand::Image { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}
