//! Page geometry and font description types.
//!
//! Coordinates are PDF user units (points, 72/inch). Bounding boxes use a
//! top-left origin as reported by the OCR service; the reconstructor
//! converts to the bottom-left origin its PDF backend expects.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page coordinates, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Minimal rectangle enclosing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Center point, used by the layout-hash grid.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Clamp degenerate extents up to `min` points.
    pub fn with_min_extent(mut self, min: f64) -> Self {
        if self.width < min {
            self.width = min;
        }
        if self.height < min {
            self.height = min;
        }
        self
    }
}

/// RGB color with 0–255 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components as 0.0–1.0 floats for PDF `rg` operators.
    pub fn to_unit(&self) -> (f64, f64, f64) {
        (
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        )
    }
}

impl Default for RgbColor {
    fn default() -> Self {
        Self::BLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Font description attached to a text block.
///
/// `family` is whatever the OCR service reported; resolution onto one of
/// the standard 14 fonts happens at reconstruction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    pub family: String,
    /// Size in points.
    pub size: f64,
    #[serde(default)]
    pub weight: FontWeight,
    #[serde(default)]
    pub style: FontStyle,
    #[serde(default)]
    pub color: RgbColor,
}

impl FontInfo {
    pub const DEFAULT_FAMILY: &'static str = "Helvetica";

    pub fn new(family: impl Into<String>, size: f64) -> Self {
        Self {
            family: family.into(),
            size,
            weight: FontWeight::Normal,
            style: FontStyle::Normal,
            color: RgbColor::BLACK,
        }
    }

    /// Copy of this font at a scaled size.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            size: self.size * factor,
            ..self.clone()
        }
    }
}

impl Default for FontInfo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FAMILY, 12.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_union() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 10.0, 10.0);
        let u = a.union(&b);
        assert_eq!(u, BoundingBox::new(0.0, 0.0, 15.0, 15.0));
    }

    #[test]
    fn test_bbox_union_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(100.0, 200.0, 20.0, 5.0);
        let u = a.union(&b);
        assert_eq!(u.x, 0.0);
        assert_eq!(u.y, 0.0);
        assert_eq!(u.width, 120.0);
        assert_eq!(u.height, 205.0);
    }

    #[test]
    fn test_bbox_min_extent_clamp() {
        let b = BoundingBox::new(10.0, 10.0, 0.0, -3.0).with_min_extent(1.0);
        assert_eq!(b.width, 1.0);
        assert_eq!(b.height, 1.0);
    }

    #[test]
    fn test_color_to_unit() {
        let (r, g, b) = RgbColor::new(255, 0, 51).to_unit();
        assert!((r - 1.0).abs() < 1e-9);
        assert!(g.abs() < 1e-9);
        assert!((b - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_font_scaled_preserves_family() {
        let font = FontInfo::new("Times-Roman", 12.0);
        let scaled = font.scaled(0.75);
        assert_eq!(scaled.family, "Times-Roman");
        assert!((scaled.size - 9.0).abs() < 1e-9);
    }
}
