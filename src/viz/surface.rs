//! Drawing surface boundary and a recording implementation

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0, 0, 0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0.0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let byte = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, 1.0)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)? as f32 / 255.0)),
            _ => None,
        }
    }

    /// Hue in degrees, saturation and lightness in 0-1
    pub fn hsla(hue: f32, saturation: f32, lightness: f32, alpha: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 360.0;
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let channel = |t: f32| {
            let t = t.rem_euclid(1.0);
            let v = if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            };
            (v * 255.0).round().clamp(0.0, 255.0) as u8
        };
        Self::rgba(
            channel(h + 1.0 / 3.0),
            channel(h),
            channel(h - 1.0 / 3.0),
            alpha.clamp(0.0, 1.0),
        )
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: alpha.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Linear blend towards `other`
    pub fn mix(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self::rgba(
            lerp(self.r, other.r),
            lerp(self.g, other.g),
            lerp(self.b, other.b),
            self.a + (other.a - self.a) * t,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Point at `radius` from `self` in direction `angle` (radians)
    pub fn polar(self, radius: f32, angle: f32) -> Self {
        Self::new(self.x + angle.cos() * radius, self.y + angle.sin() * radius)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
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
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Paint {
    Solid(Color),
    /// Colour stops along the segment `from` to `to`
    Linear {
        from: Point,
        to: Point,
        stops: Vec<(f32, Color)>,
    },
    /// Colour stops from `center` out to `radius`
    Radial {
        center: Point,
        radius: f32,
        stops: Vec<(f32, Color)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
    /// Blur radius of the glow around the line, 0 for none
    pub glow: f32,
}

impl Stroke {
    pub const fn new(color: Color, width: f32) -> Self {
        Self {
            color,
            width,
            glow: 0.0,
        }
    }

    pub fn glow(mut self, glow: f32) -> Self {
        self.glow = glow;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Blend {
    #[default]
    Normal,
    /// Additive, used for glowing layers
    Lighter,
}

/// Rendering surface. Coordinates are logical pixels; the resolution scale
/// only affects the backing store.
pub trait Surface {
    /// Logical width and height
    fn size(&self) -> (f32, f32);
    fn set_resolution_scale(&mut self, scale: f32);
    fn set_blend(&mut self, blend: Blend);
    fn fill_rect(&mut self, rect: Rect, paint: &Paint);
    fn fill_circle(&mut self, center: Point, radius: f32, paint: &Paint);
    fn stroke_circle(&mut self, center: Point, radius: f32, stroke: Stroke);
    fn stroke_line(&mut self, from: Point, to: Point, stroke: Stroke);
    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke);
    fn fill_polygon(&mut self, points: &[Point], paint: &Paint);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawCommand {
    Blend(Blend),
    FillRect(Rect, Paint),
    FillCircle(Point, f32, Paint),
    StrokeCircle(Point, f32, Stroke),
    Line(Point, Point, Stroke),
    Polyline(Vec<Point>, Stroke),
    Polygon(Vec<Point>, Paint),
}

/// Records draw calls in order
#[derive(Debug, Clone)]
pub struct DrawList {
    width: f32,
    height: f32,
    resolution_scale: f32,
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            resolution_scale: 1.0,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn resolution_scale(&self) -> f32 {
        self.resolution_scale
    }

    /// Backing-store size in device pixels
    pub fn backing_size(&self) -> (u32, u32) {
        (
            (self.width * self.resolution_scale).round() as u32,
            (self.height * self.resolution_scale).round() as u32,
        )
    }
}

impl Surface for DrawList {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn set_resolution_scale(&mut self, scale: f32) {
        self.resolution_scale = scale;
    }

    fn set_blend(&mut self, blend: Blend) {
        self.commands.push(DrawCommand::Blend(blend));
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        self.commands.push(DrawCommand::FillRect(rect, paint.clone()));
    }

    fn fill_circle(&mut self, center: Point, radius: f32, paint: &Paint) {
        self.commands
            .push(DrawCommand::FillCircle(center, radius, paint.clone()));
    }

    fn stroke_circle(&mut self, center: Point, radius: f32, stroke: Stroke) {
        self.commands
            .push(DrawCommand::StrokeCircle(center, radius, stroke));
    }

    fn stroke_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        self.commands.push(DrawCommand::Line(from, to, stroke));
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke) {
        self.commands
            .push(DrawCommand::Polyline(points.to_vec(), stroke));
    }

    fn fill_polygon(&mut self, points: &[Point], paint: &Paint) {
        self.commands
            .push(DrawCommand::Polygon(points.to_vec(), paint.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_parse_with_and_without_alpha() {
        assert_eq!(Color::from_hex("#ff6ec7"), Some(Color::rgba(255, 110, 199, 1.0)));
        assert_eq!(Color::from_hex("00f6ff80").map(|c| c.b), Some(255));
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn hsla_primary_hues() {
        assert_eq!(Color::hsla(0.0, 1.0, 0.5, 1.0), Color::rgba(255, 0, 0, 1.0));
        assert_eq!(Color::hsla(120.0, 1.0, 0.5, 1.0), Color::rgba(0, 255, 0, 1.0));
        assert_eq!(Color::hsla(600.0, 1.0, 0.5, 1.0), Color::rgba(0, 0, 255, 1.0));
    }

    #[test]
    fn backing_size_follows_scale() {
        let mut list = DrawList::new(800.0, 600.0);
        list.set_resolution_scale(1.5);
        assert_eq!(list.backing_size(), (1200, 900));
    }
}
