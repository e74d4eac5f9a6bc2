//! Primitive extraction: cleaned-up line and rectangle sets for one page.
//!
//! PDF content streams draw the same rule several times (once per table
//! cell, once more for the outer frame) and split long rules into short
//! dashes. Downstream geometry wants one segment per logical rule, so
//! this stage merges collinear overlapping segments, drops duplicates and
//! degenerate shapes, and remembers which source primitives each kept
//! primitive stands for.

use ordered_float::OrderedFloat;
use plate_core::{
    BBox, Diagnostic, LinePrimitive, Orientation, Page, PrimitiveRef, Point, RectPrimitive,
};

/// A kept line and the page line indices it replaces
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedLine {
    pub line: LinePrimitive,
    pub sources: Vec<usize>,
}

impl ExtractedLine {
    #[inline]
    #[must_use = "returns the line orientation"]
    pub fn orientation(&self, tolerance: f64) -> Orientation {
        self.line.orientation(tolerance)
    }
}

/// A kept rectangle and the page rectangle indices it replaces
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRect {
    pub rect: RectPrimitive,
    pub sources: Vec<usize>,
}

/// Deduplicated primitives of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitiveSet {
    pub lines: Vec<ExtractedLine>,
    pub rects: Vec<ExtractedRect>,
}

impl PrimitiveSet {
    #[inline]
    #[must_use = "returns whether the set has no primitives"]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.rects.is_empty()
    }

    #[inline]
    #[must_use = "returns the number of kept primitives"]
    pub fn len(&self) -> usize {
        self.lines.len() + self.rects.len()
    }

    /// `NoVectorContent` when the page carried nothing usable
    #[must_use = "returns the diagnostic for an empty set, if any"]
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        self.is_empty().then_some(Diagnostic::NoVectorContent)
    }

    /// Source primitives whose geometry lies inside `bbox` (grown by `tolerance`)
    #[must_use = "returns the primitive references inside the box"]
    pub fn sources_within(&self, bbox: &BBox, tolerance: f64) -> Vec<PrimitiveRef> {
        let lines = self
            .lines
            .iter()
            .filter(|l| bbox.contains(&l.line.bbox(), tolerance))
            .flat_map(|l| l.sources.iter().map(|&i| PrimitiveRef::Line(i)));
        let rects = self
            .rects
            .iter()
            .filter(|r| bbox.contains(&r.rect.bbox(), tolerance))
            .flat_map(|r| r.sources.iter().map(|&i| PrimitiveRef::Rect(i)));
        let mut refs: Vec<PrimitiveRef> = lines.chain(rects).collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }
}

/// Cleans a page's vector content
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveExtractor {
    tolerance: f64,
}

impl Default for PrimitiveExtractor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl PrimitiveExtractor {
    /// `tolerance` is the merge distance in page units
    #[inline]
    #[must_use = "returns a new PrimitiveExtractor"]
    pub const fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Extract the deduplicated primitive set of `page`.
    ///
    /// Pure function of the page; never fails. An empty result means the
    /// page is a raster scan (see [`PrimitiveSet::diagnostic`]).
    #[must_use = "returns the extracted primitives"]
    pub fn extract(&self, page: &Page) -> PrimitiveSet {
        let mut horizontal = Vec::new();
        let mut vertical = Vec::new();
        let mut diagonal: Vec<ExtractedLine> = Vec::new();
        let mut degenerate = 0usize;

        for (index, line) in page.lines.iter().enumerate() {
            if line.is_degenerate() || !line.length().is_finite() {
                degenerate += 1;
                continue;
            }
            match line.orientation(self.tolerance) {
                Orientation::Horizontal => horizontal.push(Span::horizontal(line, index)),
                Orientation::Vertical => vertical.push(Span::vertical(line, index)),
                Orientation::Diagonal => {
                    if let Some(existing) = diagonal
                        .iter_mut()
                        .find(|d| same_segment(&d.line, line, self.tolerance))
                    {
                        existing.sources.push(index);
                        existing.line.stroke_width = existing.line.stroke_width.max(line.stroke_width);
                    } else {
                        diagonal.push(ExtractedLine {
                            line: *line,
                            sources: vec![index],
                        });
                    }
                }
            }
        }

        let mut lines = merge_spans(horizontal, self.tolerance, Axis::Horizontal);
        lines.extend(merge_spans(vertical, self.tolerance, Axis::Vertical));
        lines.extend(diagonal);

        let mut rects: Vec<ExtractedRect> = Vec::new();
        for (index, rect) in page.rects.iter().enumerate() {
            let rect = rect.normalized();
            if rect.is_degenerate() || !rect.bbox().area().is_finite() {
                degenerate += 1;
                continue;
            }
            if let Some(existing) = rects
                .iter_mut()
                .find(|r| r.rect.bbox().approx_eq(&rect.bbox(), self.tolerance))
            {
                existing.rect.style = existing.rect.style.merge(rect.style);
                existing.sources.push(index);
            } else {
                rects.push(ExtractedRect {
                    rect,
                    sources: vec![index],
                });
            }
        }
        rects.sort_by_key(|r| (OrderedFloat(r.rect.origin.y), OrderedFloat(r.rect.origin.x)));

        log::debug!(
            "Primitive extraction for {}: {} lines -> {}, {} rects -> {}, {} degenerate dropped",
            page.id,
            page.lines.len(),
            lines.len(),
            page.rects.len(),
            rects.len(),
            degenerate
        );

        PrimitiveSet { lines, rects }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// An axis-aligned segment as (fixed coordinate, start, end)
#[derive(Debug, Clone)]
struct Span {
    at: f64,
    from: f64,
    to: f64,
    stroke_width: f64,
    sources: Vec<usize>,
}

impl Span {
    fn horizontal(line: &LinePrimitive, index: usize) -> Self {
        Self {
            at: (line.start.y + line.end.y) / 2.0,
            from: line.start.x.min(line.end.x),
            to: line.start.x.max(line.end.x),
            stroke_width: line.stroke_width,
            sources: vec![index],
        }
    }

    fn vertical(line: &LinePrimitive, index: usize) -> Self {
        Self {
            at: (line.start.x + line.end.x) / 2.0,
            from: line.start.y.min(line.end.y),
            to: line.start.y.max(line.end.y),
            stroke_width: line.stroke_width,
            sources: vec![index],
        }
    }

    fn into_line(self, axis: Axis) -> ExtractedLine {
        let (start, end) = match axis {
            Axis::Horizontal => (Point::new(self.from, self.at), Point::new(self.to, self.at)),
            Axis::Vertical => (Point::new(self.at, self.from), Point::new(self.at, self.to)),
        };
        let mut sources = self.sources;
        sources.sort_unstable();
        ExtractedLine {
            line: LinePrimitive::new(start, end, self.stroke_width),
            sources,
        }
    }
}

/// Merge collinear spans that overlap or nearly touch
fn merge_spans(mut spans: Vec<Span>, tolerance: f64, axis: Axis) -> Vec<ExtractedLine> {
    spans.sort_by_key(|s| (OrderedFloat(s.at), OrderedFloat(s.from)));

    // Cluster by fixed coordinate first
    let mut clusters: Vec<Vec<Span>> = Vec::new();
    for span in spans {
        match clusters.last_mut() {
            Some(cluster) if (span.at - cluster[0].at).abs() <= tolerance => cluster.push(span),
            _ => clusters.push(vec![span]),
        }
    }

    let mut merged = Vec::new();
    for mut cluster in clusters {
        cluster.sort_by_key(|s| OrderedFloat(s.from));
        let mut current: Option<(Span, usize)> = None;
        for span in cluster {
            current = match current {
                Some((mut acc, count)) if span.from <= acc.to + tolerance => {
                    acc.to = acc.to.max(span.to);
                    acc.at = (acc.at * count as f64 + span.at) / (count + 1) as f64;
                    acc.stroke_width = acc.stroke_width.max(span.stroke_width);
                    acc.sources.extend(span.sources);
                    Some((acc, count + 1))
                }
                Some((acc, _)) => {
                    merged.push(acc.into_line(axis));
                    Some((span, 1))
                }
                None => Some((span, 1)),
            };
        }
        if let Some((acc, _)) = current {
            merged.push(acc.into_line(axis));
        }
    }
    merged
}

fn same_segment(a: &LinePrimitive, b: &LinePrimitive, tolerance: f64) -> bool {
    (a.start.approx_eq(&b.start, tolerance) && a.end.approx_eq(&b.end, tolerance))
        || (a.start.approx_eq(&b.end, tolerance) && a.end.approx_eq(&b.start, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::PaintStyle;

    fn page() -> Page {
        Page::new("t", 200.0, 200.0)
    }

    #[test]
    fn test_empty_page_signals_no_vector_content() {
        let set = PrimitiveExtractor::default().extract(&page());
        assert!(set.is_empty());
        assert_eq!(set.diagnostic(), Some(Diagnostic::NoVectorContent));
    }

    #[test]
    fn test_degenerate_primitives_dropped() {
        let page = page()
            .with_line(LinePrimitive::from_coords(5.0, 5.0, 5.0, 5.0))
            .with_rect(RectPrimitive::new(Point::new(1.0, 1.0), 0.0, 10.0, PaintStyle::Fill));
        let set = PrimitiveExtractor::default().extract(&page);
        assert!(set.is_empty());
    }

    #[test]
    fn test_collinear_segments_merge() {
        let page = page()
            .with_line(LinePrimitive::from_coords(0.0, 10.0, 50.0, 10.0))
            .with_line(LinePrimitive::from_coords(49.8, 10.2, 100.0, 10.2))
            .with_line(LinePrimitive::from_coords(120.0, 10.0, 150.0, 10.0));
        let set = PrimitiveExtractor::new(0.5).extract(&page);
        assert_eq!(set.lines.len(), 2);
        let first = &set.lines[0];
        assert_eq!(first.sources, vec![0, 1]);
        assert_eq!(first.line.start.x, 0.0);
        assert_eq!(first.line.end.x, 100.0);
        assert!((first.line.start.y - 10.1).abs() < 1e-9);
        assert_eq!(set.lines[1].sources, vec![2]);
    }

    #[test]
    fn test_reversed_vertical_segments_merge() {
        let page = page()
            .with_line(LinePrimitive::from_coords(30.0, 80.0, 30.0, 0.0))
            .with_line(LinePrimitive::from_coords(30.0, 0.0, 30.0, 80.0));
        let set = PrimitiveExtractor::default().extract(&page);
        assert_eq!(set.lines.len(), 1);
        assert_eq!(set.lines[0].orientation(0.5), Orientation::Vertical);
        assert_eq!(set.lines[0].line.start.y, 0.0);
    }

    #[test]
    fn test_duplicate_diagonals_and_rects() {
        let page = page()
            .with_line(LinePrimitive::from_coords(0.0, 0.0, 40.0, 30.0))
            .with_line(LinePrimitive::from_coords(40.0, 30.0, 0.0, 0.0))
            .with_rect(RectPrimitive::stroked(BBox::new(10.0, 10.0, 60.0, 40.0)))
            .with_rect(RectPrimitive::new(Point::new(10.2, 10.0), 50.0, 30.0, PaintStyle::Fill));
        let set = PrimitiveExtractor::default().extract(&page);
        assert_eq!(set.lines.len(), 1);
        assert_eq!(set.lines[0].sources, vec![0, 1]);
        assert_eq!(set.rects.len(), 1);
        assert_eq!(set.rects[0].rect.style, PaintStyle::FillStroke);
        assert_eq!(set.rects[0].sources, vec![0, 1]);
    }

    #[test]
    fn test_sources_within() {
        let page = page()
            .with_line(LinePrimitive::from_coords(0.0, 0.0, 100.0, 0.0))
            .with_line(LinePrimitive::from_coords(0.0, 150.0, 100.0, 150.0))
            .with_rect(RectPrimitive::stroked(BBox::new(10.0, 10.0, 20.0, 20.0)));
        let set = PrimitiveExtractor::default().extract(&page);
        let refs = set.sources_within(&BBox::new(0.0, 0.0, 100.0, 100.0), 0.5);
        assert_eq!(refs, vec![PrimitiveRef::Line(0), PrimitiveRef::Rect(0)]);
    }
}
