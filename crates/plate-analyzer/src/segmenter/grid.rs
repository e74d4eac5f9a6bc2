//! Grid lines and the partition mesh.
//!
//! Every drawn separator becomes part of a horizontal or vertical grid line.
//! The distinct grid coordinates cut the page into mesh cells; adjacent cells
//! with no drawn divider between them are merged into regions.

use super::UnionFind;
use crate::primitives::PrimitiveSet;
use ordered_float::OrderedFloat;
use plate_core::{BBox, BoundarySupport, Orientation};

/// Coverage at or above which a mesh edge counts as a drawn divider
const DIVIDER_COVERAGE: f64 = 0.9;

/// One logical grid line: a fixed coordinate and the merged spans drawn along it
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    pub at: f64,
    /// Disjoint covered intervals, sorted
    pub spans: Vec<(f64, f64)>,
}

impl GridLine {
    /// Fraction of `[from, to]` covered by drawn spans
    #[must_use = "returns the covered fraction"]
    pub fn coverage(&self, from: f64, to: f64, tolerance: f64) -> f64 {
        let length = to - from;
        if length <= 0.0 {
            return 0.0;
        }
        let covered: f64 = self
            .spans
            .iter()
            .map(|&(a, b)| ((b + tolerance).min(to) - (a - tolerance).max(from)).max(0.0))
            .sum();
        (covered / length).min(1.0)
    }
}

/// Horizontal and vertical grid lines of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub horizontals: Vec<GridLine>,
    pub verticals: Vec<GridLine>,
    tolerance: f64,
}

/// A connected group of mesh cells
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRegion {
    pub bbox: BBox,
    pub cells: Vec<BBox>,
    /// Cell area over bounding box area; below 1 for non-rectangular merges
    pub fill_ratio: f64,
}

impl Grid {
    /// Build grid lines from the primitive set.
    ///
    /// Strokes wider than `max_stroke` are skipped, rectangles contribute
    /// their edges (or a center line when filled and thinner than
    /// `max_stroke`), diagonals are ignored.
    #[must_use = "returns the grid"]
    pub fn build(set: &PrimitiveSet, tolerance: f64, max_stroke: f64) -> Self {
        let mut horizontal: Vec<(f64, f64, f64)> = Vec::new();
        let mut vertical: Vec<(f64, f64, f64)> = Vec::new();
        let mut skipped = 0usize;

        for extracted in &set.lines {
            let line = &extracted.line;
            if line.stroke_width > max_stroke {
                skipped += 1;
                continue;
            }
            let bbox = line.bbox();
            match line.orientation(tolerance) {
                Orientation::Horizontal => horizontal.push((bbox.center().y, bbox.l, bbox.r)),
                Orientation::Vertical => vertical.push((bbox.center().x, bbox.t, bbox.b)),
                Orientation::Diagonal => {}
            }
        }

        for extracted in &set.rects {
            let bbox = extracted.rect.bbox();
            let thin = bbox.width().min(bbox.height()) <= max_stroke;
            if extracted.rect.style.is_filled() && thin {
                if bbox.width() >= bbox.height() {
                    horizontal.push((bbox.center().y, bbox.l, bbox.r));
                } else {
                    vertical.push((bbox.center().x, bbox.t, bbox.b));
                }
                continue;
            }
            horizontal.push((bbox.t, bbox.l, bbox.r));
            horizontal.push((bbox.b, bbox.l, bbox.r));
            vertical.push((bbox.l, bbox.t, bbox.b));
            vertical.push((bbox.r, bbox.t, bbox.b));
        }

        let grid = Self {
            horizontals: snap(horizontal, tolerance),
            verticals: snap(vertical, tolerance),
            tolerance,
        };
        log::trace!(
            "Grid: {} horizontal, {} vertical lines ({} thick strokes skipped)",
            grid.horizontals.len(),
            grid.verticals.len(),
            skipped
        );
        grid
    }

    #[inline]
    #[must_use = "returns whether the grid can form any cell"]
    pub fn is_empty(&self) -> bool {
        self.horizontals.len() < 2 || self.verticals.len() < 2
    }

    fn line_near(lines: &[GridLine], at: f64, tolerance: f64) -> Option<&GridLine> {
        let index = lines.partition_point(|l| l.at < at - tolerance);
        lines.get(index).filter(|l| (l.at - at).abs() <= tolerance)
    }

    /// Coverage of the horizontal segment `y`, `[from, to]`
    #[must_use = "returns the covered fraction"]
    pub fn horizontal_coverage(&self, y: f64, from: f64, to: f64) -> f64 {
        Self::line_near(&self.horizontals, y, self.tolerance)
            .map_or(0.0, |l| l.coverage(from, to, self.tolerance))
    }

    /// Coverage of the vertical segment `x`, `[from, to]`
    #[must_use = "returns the covered fraction"]
    pub fn vertical_coverage(&self, x: f64, from: f64, to: f64) -> f64 {
        Self::line_near(&self.verticals, x, self.tolerance)
            .map_or(0.0, |l| l.coverage(from, to, self.tolerance))
    }

    /// How much of each side of `bbox` is drawn
    #[must_use = "returns the boundary support"]
    pub fn boundary_support(&self, bbox: &BBox) -> BoundarySupport {
        BoundarySupport::new(
            self.horizontal_coverage(bbox.t, bbox.l, bbox.r),
            self.horizontal_coverage(bbox.b, bbox.l, bbox.r),
            self.vertical_coverage(bbox.l, bbox.t, bbox.b),
            self.vertical_coverage(bbox.r, bbox.t, bbox.b),
        )
    }

    /// Partition the mesh and merge cells that share no drawn divider
    #[must_use = "returns the mesh regions"]
    pub fn regions(&self) -> Vec<MeshRegion> {
        if self.is_empty() {
            return Vec::new();
        }
        let xs: Vec<f64> = self.verticals.iter().map(|l| l.at).collect();
        let ys: Vec<f64> = self.horizontals.iter().map(|l| l.at).collect();
        let cols = xs.len() - 1;
        let rows = ys.len() - 1;
        let cell_id = |row: usize, col: usize| row * cols + col;
        let cell_box = |row: usize, col: usize| BBox::new(xs[col], ys[row], xs[col + 1], ys[row + 1]);

        let ids: Vec<usize> = (0..rows * cols).collect();
        let mut uf = UnionFind::new(&ids);
        for row in 0..rows {
            for col in 0..cols {
                if col + 1 < cols
                    && self.vertical_coverage(xs[col + 1], ys[row], ys[row + 1]) < DIVIDER_COVERAGE
                {
                    uf.union(cell_id(row, col), cell_id(row, col + 1));
                }
                if row + 1 < rows
                    && self.horizontal_coverage(ys[row + 1], xs[col], xs[col + 1])
                        < DIVIDER_COVERAGE
                {
                    uf.union(cell_id(row, col), cell_id(row + 1, col));
                }
            }
        }

        let regions: Vec<MeshRegion> = uf
            .groups()
            .into_iter()
            .filter_map(|group| {
                let cells: Vec<BBox> = group
                    .iter()
                    .map(|&id| cell_box(id / cols, id % cols))
                    .collect();
                let bbox = BBox::enclosing(cells.iter())?;
                let cell_area: f64 = cells.iter().map(BBox::area).sum();
                let fill_ratio = if bbox.area() > 0.0 {
                    (cell_area / bbox.area()).min(1.0)
                } else {
                    0.0
                };
                Some(MeshRegion {
                    bbox,
                    cells,
                    fill_ratio,
                })
            })
            .collect();
        log::trace!(
            "Mesh {}x{} cells merged into {} regions",
            cols,
            rows,
            regions.len()
        );
        regions
    }
}

/// Snap near-collinear segments into grid lines and merge their spans
fn snap(mut segments: Vec<(f64, f64, f64)>, tolerance: f64) -> Vec<GridLine> {
    segments.sort_by_key(|&(at, from, _)| (OrderedFloat(at), OrderedFloat(from)));

    let mut groups: Vec<Vec<(f64, f64, f64)>> = Vec::new();
    for segment in segments {
        match groups.last_mut() {
            Some(group) if segment.0 - group[0].0 <= tolerance => group.push(segment),
            _ => groups.push(vec![segment]),
        }
    }

    groups
        .into_iter()
        .map(|mut group| {
            let at = group.iter().map(|s| s.0).sum::<f64>() / group.len() as f64;
            group.sort_by_key(|&(_, from, _)| OrderedFloat(from));
            let mut spans: Vec<(f64, f64)> = Vec::new();
            for (_, from, to) in group {
                match spans.last_mut() {
                    Some(last) if from <= last.1 + tolerance => last.1 = last.1.max(to),
                    _ => spans.push((from, to)),
                }
            }
            GridLine { at, spans }
        })
        .collect()
}
