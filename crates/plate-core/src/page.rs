//! Rendered plate page as handed over by the PDF collaborator.
//!
//! A [`Page`] carries the raw vector primitives and positioned text runs of a
//! single plate. It is never mutated by the analyzer; every later stage
//! refers back to it by index so extracted values keep their provenance.

use crate::geometry::{BBox, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a page, e.g. the plate file name plus page number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub String);

impl PageId {
    #[inline]
    #[must_use = "returns a new PageId"]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use = "returns the identifier as a string slice"]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Orientation of a line segment relative to the page axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Horizontal,
    Vertical,
    Diagonal,
}

/// A straight stroked segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePrimitive {
    pub start: Point,
    pub end: Point,
    /// Stroke width in page units
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
}

const fn default_stroke_width() -> f64 {
    1.0
}

impl LinePrimitive {
    #[inline]
    #[must_use = "returns a new LinePrimitive"]
    pub const fn new(start: Point, end: Point, stroke_width: f64) -> Self {
        Self {
            start,
            end,
            stroke_width,
        }
    }

    /// Convenience constructor from raw coordinates with a hairline stroke.
    #[inline]
    #[must_use = "returns a new LinePrimitive"]
    pub const fn from_coords(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(Point::new(x0, y0), Point::new(x1, y1), 0.5)
    }

    #[inline]
    #[must_use = "returns the segment length"]
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    /// Zero-length segments carry no geometry and are dropped by extraction.
    #[inline]
    #[must_use = "returns whether the segment is degenerate"]
    pub fn is_degenerate(&self) -> bool {
        self.length() <= f64::EPSILON
    }

    /// Orientation, treating deviations up to `tolerance` as axis-aligned.
    #[must_use = "returns the orientation"]
    pub fn orientation(&self, tolerance: f64) -> Orientation {
        let dx = (self.end.x - self.start.x).abs();
        let dy = (self.end.y - self.start.y).abs();
        if dy <= tolerance && dx > dy {
            Orientation::Horizontal
        } else if dx <= tolerance && dy > dx {
            Orientation::Vertical
        } else {
            Orientation::Diagonal
        }
    }

    #[inline]
    #[must_use = "returns the bounding box"]
    pub fn bbox(&self) -> BBox {
        BBox::from_corners(self.start, self.end)
    }
}

/// How a rectangle is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintStyle {
    #[default]
    Stroke,
    Fill,
    FillStroke,
}

impl PaintStyle {
    #[inline]
    #[must_use = "returns whether the rectangle is filled"]
    pub const fn is_filled(self) -> bool {
        matches!(self, Self::Fill | Self::FillStroke)
    }

    /// Combined style when two coincident rectangles are merged
    #[must_use = "returns the merged paint style"]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Stroke, Self::Stroke) => Self::Stroke,
            (Self::Fill, Self::Fill) => Self::Fill,
            _ => Self::FillStroke,
        }
    }
}

/// A rectangle drawn on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectPrimitive {
    /// Top-left corner
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub style: PaintStyle,
}

impl RectPrimitive {
    #[inline]
    #[must_use = "returns a new RectPrimitive"]
    pub const fn new(origin: Point, width: f64, height: f64, style: PaintStyle) -> Self {
        Self {
            origin,
            width,
            height,
            style,
        }
    }

    /// Stroked rectangle spanning the given box
    #[inline]
    #[must_use = "returns a new RectPrimitive"]
    pub fn stroked(bbox: BBox) -> Self {
        Self::new(
            Point::new(bbox.l, bbox.t),
            bbox.width(),
            bbox.height(),
            PaintStyle::Stroke,
        )
    }

    /// Rectangle with non-negative extents covering the same area.
    ///
    /// PDF content streams may describe a rectangle from any corner, which
    /// shows up as a negative width or height.
    #[must_use = "returns the normalized rectangle"]
    pub fn normalized(&self) -> Self {
        let bbox = BBox::from_corners(
            self.origin,
            Point::new(self.origin.x + self.width, self.origin.y + self.height),
        );
        Self::new(
            Point::new(bbox.l, bbox.t),
            bbox.width(),
            bbox.height(),
            self.style,
        )
    }

    #[inline]
    #[must_use = "returns whether the rectangle has no area"]
    pub fn is_degenerate(&self) -> bool {
        self.width.abs() <= f64::EPSILON || self.height.abs() <= f64::EPSILON
    }

    #[inline]
    #[must_use = "returns the bounding box"]
    pub fn bbox(&self) -> BBox {
        let normalized = self.normalized();
        BBox::new(
            normalized.origin.x,
            normalized.origin.y,
            normalized.origin.x + normalized.width,
            normalized.origin.y + normalized.height,
        )
    }
}

/// Where a text token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// Machine text from the PDF content stream
    #[default]
    Page,
    /// Text returned by the OCR collaborator
    Recognized,
}

/// A positioned run of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    pub bbox: BBox,
    /// 1.0 for machine text, below 1.0 for recognized text
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: TokenSource,
}

const fn default_confidence() -> f64 {
    1.0
}

impl TextToken {
    /// Machine text token with full confidence
    #[inline]
    #[must_use = "returns a new TextToken"]
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: 1.0,
            source: TokenSource::Page,
        }
    }

    /// Token returned by the OCR collaborator
    #[inline]
    #[must_use = "returns a new TextToken"]
    pub fn recognized(text: impl Into<String>, bbox: BBox, confidence: f64) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            source: TokenSource::Recognized,
        }
    }

    #[inline]
    #[must_use = "returns whether the token holds only whitespace"]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One rendered plate page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub lines: Vec<LinePrimitive>,
    #[serde(default)]
    pub rects: Vec<RectPrimitive>,
    #[serde(default)]
    pub tokens: Vec<TextToken>,
}

impl Page {
    /// Empty page of the given size
    #[must_use = "returns a new Page"]
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: PageId::new(id),
            width,
            height,
            lines: Vec::new(),
            rects: Vec::new(),
            tokens: Vec::new(),
        }
    }

    #[must_use = "returns the page with the line appended"]
    pub fn with_line(mut self, line: LinePrimitive) -> Self {
        self.lines.push(line);
        self
    }

    #[must_use = "returns the page with the rectangle appended"]
    pub fn with_rect(mut self, rect: RectPrimitive) -> Self {
        self.rects.push(rect);
        self
    }

    #[must_use = "returns the page with the token appended"]
    pub fn with_token(mut self, token: TextToken) -> Self {
        self.tokens.push(token);
        self
    }

    #[inline]
    #[must_use = "returns the page bounding box"]
    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }

    #[inline]
    #[must_use = "returns the page area"]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Parse a page from the JSON form produced by the rendering collaborator.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let page: Self = serde_json::from_str(json).map_err(|e| {
            crate::PlateError::InvalidPage {
                reason: format!("malformed page JSON: {e}"),
            }
        })?;
        page.validate()?;
        Ok(page)
    }

    /// Reject pages whose dimensions make every relative measure meaningless.
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(crate::PlateError::InvalidPage {
                reason: format!(
                    "page {} has invalid dimensions {}x{}",
                    self.id, self.width, self.height
                ),
            });
        }
        Ok(())
    }
}
