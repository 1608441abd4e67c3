//! Text runs and the page-space geometry that describes them.
//!
//! All coordinates are PDF user space: bottom-left origin, Y increasing
//! upward, one unit per point at the default CTM.

/// Bounding box in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Convert to array format [x0, y0, x1, y1]
    pub const fn as_array(self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    /// Smallest box containing all `points`
    pub fn enclosing(points: &[Point]) -> Self {
        let mut bbox = Self::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for p in points {
            bbox.x0 = bbox.x0.min(p.x);
            bbox.y0 = bbox.y0.min(p.y);
            bbox.x1 = bbox.x1.max(p.x);
            bbox.y1 = bbox.y1.max(p.y);
        }
        if points.is_empty() {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }
        bbox
    }

    /// Whether `other` lies inside this box, allowing `tolerance` on each edge
    pub fn contains(&self, other: &Self, tolerance: f32) -> bool {
        other.x0 >= self.x0 - tolerance
            && other.y0 >= self.y0 - tolerance
            && other.x1 <= self.x1 + tolerance
            && other.y1 <= self.y1 + tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Fill colour with components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn gray(level: f32) -> Self {
        let v = level.clamp(0.0, 1.0);
        Self::new(v, v, v)
    }

    /// Naive CMYK conversion, adequate for identifying a colour
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        let k = k.clamp(0.0, 1.0);
        Self::new(
            (1.0 - c.clamp(0.0, 1.0)) * (1.0 - k),
            (1.0 - m.clamp(0.0, 1.0)) * (1.0 - k),
            (1.0 - y.clamp(0.0, 1.0)) * (1.0 - k),
        )
    }

    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.r - other.r).abs() < 1e-3 && (self.g - other.g).abs() < 1e-3 && (self.b - other.b).abs() < 1e-3
    }
}

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> Point {
        Point::new(
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed unit vertical vector
    pub fn vertical_scale(&self) -> f32 {
        self.c.hypot(self.d)
    }
}

/// One positioned string and its rendering attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Decoded text, not normalized
    pub text: String,
    pub bbox: BoundingBox,
    /// Base font name of the source font, subset prefix removed
    pub font_name: String,
    /// Effective font size in user space
    pub font_size: f32,
    pub color: RgbColor,
    /// Baseline start point
    pub baseline_origin: Point,
}
