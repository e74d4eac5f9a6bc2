//! Page-local geometry.
//!
//! All coordinates are in page units with the origin at the top-left corner
//! of the page and `y` growing downward, which is the orientation the PDF
//! collaborator hands pages over in.

use serde::{Deserialize, Serialize};

/// A point in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    #[must_use = "returns a new Point instance"]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use = "returns the distance between the points"]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// True when both coordinates are within `tolerance` of `other`.
    #[inline]
    #[must_use = "returns whether the points coincide"]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// Axis-aligned bounding box with left, top, right, bottom coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub l: f64, // left (x_min)
    pub t: f64, // top (y_min)
    pub r: f64, // right (x_max)
    pub b: f64, // bottom (y_max)
}

impl BBox {
    /// Create a new bounding box
    #[inline]
    #[must_use = "returns a new BBox instance"]
    pub const fn new(l: f64, t: f64, r: f64, b: f64) -> Self {
        Self { l, t, r, b }
    }

    /// Create a bounding box from two corner points in any order
    #[inline]
    #[must_use = "returns a new BBox instance"]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            l: a.x.min(b.x),
            t: a.y.min(b.y),
            r: a.x.max(b.x),
            b: a.y.max(b.y),
        }
    }

    #[inline]
    #[must_use = "returns the bounding box width"]
    pub fn width(&self) -> f64 {
        (self.r - self.l).abs()
    }

    #[inline]
    #[must_use = "returns the bounding box height"]
    pub fn height(&self) -> f64 {
        (self.b - self.t).abs()
    }

    /// Calculate area of the bounding box
    #[inline]
    #[must_use = "returns the bounding box area"]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Width over height. Zero-height boxes report `f64::INFINITY`.
    #[inline]
    #[must_use = "returns the aspect ratio"]
    pub fn aspect_ratio(&self) -> f64 {
        let height = self.height();
        if height > 0.0 {
            self.width() / height
        } else {
            f64::INFINITY
        }
    }

    #[inline]
    #[must_use = "returns the center point"]
    pub fn center(&self) -> Point {
        Point::new((self.l + self.r) / 2.0, (self.t + self.b) / 2.0)
    }

    /// Smallest box containing both boxes
    #[inline]
    #[must_use = "returns the union bounding box"]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            l: self.l.min(other.l),
            t: self.t.min(other.t),
            r: self.r.max(other.r),
            b: self.b.max(other.b),
        }
    }

    /// Calculate intersection area with another bbox
    #[inline]
    #[must_use = "returns the intersection area"]
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let x_left = self.l.max(other.l);
        let y_top = self.t.max(other.t);
        let x_right = self.r.min(other.r);
        let y_bottom = self.b.min(other.b);

        let width = (x_right - x_left).max(0.0);
        let height = (y_bottom - y_top).max(0.0);

        width * height
    }

    /// Intersection area divided by this box's own area (NOT `IoU`).
    ///
    /// Used when assigning text tokens to zones: a token belongs to a zone
    /// when most of the token lies inside it.
    #[inline]
    #[must_use = "returns the intersection-over-self ratio"]
    pub fn intersection_over_self(&self, other: &Self) -> f64 {
        let intersection = self.intersection_area(other);
        let self_area = self.area();

        if self_area > 0.0 {
            intersection / self_area
        } else {
            0.0
        }
    }

    /// Calculate Intersection over Union (`IoU`) with another bbox
    #[inline]
    #[must_use = "returns the Intersection over Union value"]
    pub fn iou(&self, other: &Self) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// True when the interiors overlap by a positive area
    #[inline]
    #[must_use = "returns whether the boxes overlap"]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.intersection_area(other) > 0.0
    }

    /// True when `point` lies inside the box grown by `tolerance`
    #[inline]
    #[must_use = "returns whether the point is contained"]
    pub fn contains_point(&self, point: &Point, tolerance: f64) -> bool {
        point.x >= self.l - tolerance
            && point.x <= self.r + tolerance
            && point.y >= self.t - tolerance
            && point.y <= self.b + tolerance
    }

    /// True when `other` lies inside the box grown by `tolerance`
    #[inline]
    #[must_use = "returns whether the box is contained"]
    pub fn contains(&self, other: &Self, tolerance: f64) -> bool {
        other.l >= self.l - tolerance
            && other.r <= self.r + tolerance
            && other.t >= self.t - tolerance
            && other.b <= self.b + tolerance
    }

    /// True when every edge is within `tolerance` of the matching edge of `other`
    #[inline]
    #[must_use = "returns whether the boxes coincide"]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.l - other.l).abs() <= tolerance
            && (self.t - other.t).abs() <= tolerance
            && (self.r - other.r).abs() <= tolerance
            && (self.b - other.b).abs() <= tolerance
    }

    /// Union of an iterator of boxes, `None` when empty
    #[must_use = "returns the union of all boxes"]
    pub fn enclosing<'a, I>(boxes: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        boxes.into_iter().fold(None, |acc, bbox| match acc {
            None => Some(*bbox),
            Some(current) => Some(current.union(bbox)),
        })
    }
}
