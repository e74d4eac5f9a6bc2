//! Candidate regions: support scoring, cell collapse, noise filtering and
//! overlap resolution.

use super::grid::{Grid, MeshRegion};
use super::{SegmenterConfig, UnionFind};
use ordered_float::OrderedFloat;
use plate_core::zone::snap_coordinates;
use plate_core::{BBox, BoundarySupport, Diagnostic, SubGrid};

/// Fill ratio at or above which a merged region counts as rectangular
const RECTANGULAR_FILL: f64 = 0.999;

/// Side coverage at which a side counts as at least partially drawn
const PARTIAL_SIDE: f64 = 0.5;

/// Cell area over group area at or above which cells tile their bounding box
const TILING_FILL: f64 = 0.98;

/// Minimum unclaimed share for a larger overlapping region to survive
const MIN_UNCLAIMED: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub bbox: BBox,
    pub boundary: BoundarySupport,
    pub confidence: f64,
    pub fill_ratio: f64,
    pub sub_grid: Option<SubGrid>,
}

impl Candidate {
    #[inline]
    pub fn is_fully_bounded(&self) -> bool {
        self.boundary.is_fully_bounded() && self.fill_ratio >= RECTANGULAR_FILL
    }

    /// Candidate with no drawn boundary, built from a text block
    pub fn from_text_block(bbox: BBox, confidence: f64) -> Self {
        Self {
            bbox,
            boundary: BoundarySupport::default(),
            confidence,
            fill_ratio: 1.0,
            sub_grid: None,
        }
    }
}

/// Score mesh regions by how cleanly their boundary is drawn.
///
/// Regions with fewer than three partially drawn sides are open page area
/// (the gap between two boxes) rather than zones, and are dropped.
pub fn from_mesh(
    grid: &Grid,
    regions: Vec<MeshRegion>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Candidate> {
    let mut open = 0usize;
    let candidates: Vec<Candidate> = regions
        .into_iter()
        .filter_map(|region| {
            let boundary = grid.boundary_support(&region.bbox);
            let partial_sides = [boundary.top, boundary.bottom, boundary.left, boundary.right]
                .iter()
                .filter(|&&c| c >= PARTIAL_SIDE)
                .count();
            if partial_sides < 3 {
                open += 1;
                return None;
            }
            if region.fill_ratio < RECTANGULAR_FILL {
                diagnostics.push(Diagnostic::SegmentationAmbiguous {
                    bbox: region.bbox,
                    reason: format!(
                        "non-rectangular merge of {} cells (fill {:.2})",
                        region.cells.len(),
                        region.fill_ratio
                    ),
                });
            }
            Some(Candidate {
                bbox: region.bbox,
                boundary,
                confidence: boundary.mean() * region.fill_ratio,
                fill_ratio: region.fill_ratio,
                sub_grid: None,
            })
        })
        .collect();
    log::trace!("{} candidate regions, {} open areas dropped", candidates.len(), open);
    candidates
}

/// Drop noise and regions no zone template can have
pub fn filter(candidates: Vec<Candidate>, config: &SegmenterConfig) -> (Vec<Candidate>, usize) {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            let short = c.bbox.width().min(c.bbox.height());
            let long = c.bbox.width().max(c.bbox.height());
            let keep = c.bbox.area() >= config.min_zone_area
                && short >= config.min_zone_side
                && long / short <= config.max_aspect_ratio;
            if !keep {
                log::trace!(
                    "Dropping region {:.1}x{:.1} at ({:.1}, {:.1})",
                    c.bbox.width(),
                    c.bbox.height(),
                    c.bbox.l,
                    c.bbox.t
                );
            }
            keep
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Collapse groups of small, fully bounded, edge-sharing cells into sub-grid zones.
///
/// A group is first cut into horizontal bands wherever the column structure
/// above and below a full-width rule has nothing in common, so a table does
/// not swallow the differently ruled strip it touches.
pub fn collapse(
    candidates: Vec<Candidate>,
    grid: &Grid,
    page_area: f64,
    config: &SegmenterConfig,
) -> Vec<Candidate> {
    if config.cell_collapse_area <= 0.0 || page_area <= 0.0 {
        return candidates;
    }
    let tolerance = config.line_merge_tolerance;
    let small: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_fully_bounded() && c.bbox.area() / page_area < config.cell_collapse_area)
        .map(|(i, _)| i)
        .collect();
    if small.len() < 2 {
        return candidates;
    }

    let mut uf = UnionFind::new(&small);
    for (n, &i) in small.iter().enumerate() {
        for &j in &small[n + 1..] {
            if share_edge(&candidates[i].bbox, &candidates[j].bbox, tolerance) {
                uf.union(i, j);
            }
        }
    }

    let mut consumed = vec![false; candidates.len()];
    let mut collapsed = Vec::new();
    for group in uf.groups() {
        if group.len() < 2 {
            continue;
        }
        let cells: Vec<(usize, BBox)> = group.iter().map(|&i| (i, candidates[i].bbox)).collect();
        for band in split_bands(cells, tolerance) {
            if band.len() < 2 {
                continue;
            }
            let boxes: Vec<BBox> = band.iter().map(|(_, b)| *b).collect();
            let Some(bbox) = BBox::enclosing(boxes.iter()) else {
                continue;
            };
            let cell_area: f64 = boxes.iter().map(BBox::area).sum();
            if cell_area < TILING_FILL * bbox.area() {
                continue;
            }
            for (i, _) in &band {
                consumed[*i] = true;
            }
            let boundary = grid.boundary_support(&bbox);
            collapsed.push(Candidate {
                bbox,
                boundary,
                confidence: boundary.mean(),
                fill_ratio: 1.0,
                sub_grid: Some(SubGrid::from_cells(boxes, tolerance)),
            });
        }
    }
    log::trace!(
        "Collapsed {} cells into {} sub-grid regions",
        consumed.iter().filter(|&&c| c).count(),
        collapsed.len()
    );

    candidates
        .into_iter()
        .zip(consumed)
        .filter_map(|(c, used)| (!used).then_some(c))
        .chain(collapsed)
        .collect()
}

fn share_edge(a: &BBox, b: &BBox, tolerance: f64) -> bool {
    let vertical_overlap = a.b.min(b.b) - a.t.max(b.t);
    let horizontal_overlap = a.r.min(b.r) - a.l.max(b.l);
    let side_by_side = ((a.r - b.l).abs() <= tolerance || (b.r - a.l).abs() <= tolerance)
        && vertical_overlap > tolerance;
    let stacked = ((a.b - b.t).abs() <= tolerance || (b.b - a.t).abs() <= tolerance)
        && horizontal_overlap > tolerance;
    side_by_side || stacked
}

/// Cut a cell group at full-width rules that separate unrelated column layouts
fn split_bands(cells: Vec<(usize, BBox)>, tolerance: f64) -> Vec<Vec<(usize, BBox)>> {
    let Some(group) = BBox::enclosing(cells.iter().map(|(_, b)| b)) else {
        return Vec::new();
    };
    let rows = snap_coordinates(cells.iter().flat_map(|(_, c)| [c.t, c.b]), tolerance);
    let interior_columns = |selected: &[&BBox]| -> Vec<f64> {
        selected
            .iter()
            .map(|c| c.r)
            .filter(|&r| r < group.r - tolerance)
            .collect()
    };

    let mut cuts = Vec::new();
    for &y in rows.iter().filter(|&&y| y > group.t + tolerance && y < group.b - tolerance) {
        let straddles = cells
            .iter()
            .any(|(_, c)| c.t < y - tolerance && c.b > y + tolerance);
        if straddles {
            continue;
        }
        let above: Vec<&BBox> = cells
            .iter()
            .map(|(_, c)| c)
            .filter(|c| (c.b - y).abs() <= tolerance)
            .collect();
        let below: Vec<&BBox> = cells
            .iter()
            .map(|(_, c)| c)
            .filter(|c| (c.t - y).abs() <= tolerance)
            .collect();
        let above_columns = interior_columns(&above);
        let below_columns = interior_columns(&below);
        let shared = above_columns
            .iter()
            .any(|a| below_columns.iter().any(|b| (a - b).abs() <= tolerance));
        if !shared {
            cuts.push(y);
        }
    }

    let mut bands: Vec<Vec<(usize, BBox)>> = vec![Vec::new(); cuts.len() + 1];
    for cell in cells {
        let center = cell.1.center().y;
        let band = cuts.partition_point(|&cut| cut < center);
        bands[band].push(cell);
    }
    bands.retain(|b| !b.is_empty());
    bands
}

/// Resolve overlapping candidates, preferring smaller, fully bounded regions.
///
/// A larger region survives only if most of its area is still unclaimed.
/// Equal-scored overlapping alternatives keep the first and record a
/// `SegmentationAmbiguous` diagnostic.
pub fn resolve_overlaps(
    mut candidates: Vec<Candidate>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Candidate> {
    candidates.sort_by_key(|c| {
        (
            !c.is_fully_bounded(),
            OrderedFloat(c.bbox.area()),
            std::cmp::Reverse(OrderedFloat(c.confidence)),
            OrderedFloat(c.bbox.t),
            OrderedFloat(c.bbox.l),
        )
    });

    let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlapping: Vec<&Candidate> = accepted
            .iter()
            .filter(|a| a.bbox.overlaps(&candidate.bbox))
            .collect();
        if overlapping.is_empty() {
            accepted.push(candidate);
            continue;
        }

        let tie = overlapping.iter().any(|a| {
            a.is_fully_bounded() == candidate.is_fully_bounded()
                && (a.bbox.area() - candidate.bbox.area()).abs()
                    <= 0.01 * a.bbox.area().max(candidate.bbox.area())
                && (a.confidence - candidate.confidence).abs() < 1e-6
        });
        if tie {
            diagnostics.push(Diagnostic::SegmentationAmbiguous {
                bbox: candidate.bbox,
                reason: "equal-scored overlapping alternative".to_string(),
            });
            continue;
        }

        let area = candidate.bbox.area();
        let claimed: f64 = overlapping
            .iter()
            .map(|a| a.bbox.intersection_area(&candidate.bbox))
            .sum::<f64>()
            .min(area);
        if area > 0.0 && (area - claimed) / area >= MIN_UNCLAIMED {
            accepted.push(candidate);
        } else {
            log::trace!(
                "Region at ({:.1}, {:.1}) mostly claimed by smaller regions",
                candidate.bbox.l,
                candidate.bbox.t
            );
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(l: f64, t: f64, r: f64, b: f64) -> Candidate {
        Candidate {
            bbox: BBox::new(l, t, r, b),
            boundary: BoundarySupport::full(),
            confidence: 1.0,
            fill_ratio: 1.0,
            sub_grid: None,
        }
    }

    #[test]
    fn test_filter_drops_noise_and_slivers() {
        let config = SegmenterConfig::default();
        let (kept, dropped) = filter(
            vec![
                cell(0.0, 0.0, 100.0, 100.0),
                cell(0.0, 0.0, 10.0, 10.0),
                cell(0.0, 0.0, 500.0, 3.0),
                cell(0.0, 0.0, 1000.0, 20.0),
            ],
            &config,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 3);
    }

    #[test]
    fn test_share_edge() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(share_edge(&a, &BBox::new(10.0, 0.0, 20.0, 10.0), 0.5));
        assert!(share_edge(&a, &BBox::new(0.0, 10.2, 5.0, 20.0), 0.5));
        // Corner contact only
        assert!(!share_edge(&a, &BBox::new(10.0, 10.0, 20.0, 20.0), 0.5));
    }

    #[test]
    fn test_split_bands_keeps_aligned_table() {
        // Header row with three columns, value row whose cells span the same rules
        let cells = vec![
            (0, BBox::new(0.0, 0.0, 40.0, 10.0)),
            (1, BBox::new(40.0, 0.0, 80.0, 10.0)),
            (2, BBox::new(80.0, 0.0, 120.0, 10.0)),
            (3, BBox::new(0.0, 10.0, 40.0, 20.0)),
            (4, BBox::new(40.0, 10.0, 120.0, 20.0)),
        ];
        assert_eq!(split_bands(cells, 0.5).len(), 1);
    }

    #[test]
    fn test_split_bands_cuts_unrelated_strips() {
        let cells = vec![
            (0, BBox::new(0.0, 0.0, 60.0, 10.0)),
            (1, BBox::new(60.0, 0.0, 120.0, 10.0)),
            (2, BBox::new(0.0, 10.0, 30.0, 20.0)),
            (3, BBox::new(30.0, 10.0, 90.0, 20.0)),
            (4, BBox::new(90.0, 10.0, 120.0, 20.0)),
        ];
        let bands = split_bands(cells, 0.5);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].len(), 2);
        assert_eq!(bands[1].len(), 3);
    }

    #[test]
    fn test_resolve_prefers_smaller_bounded_region() {
        let mut diagnostics = Vec::new();
        let mut ring = cell(0.0, 0.0, 100.0, 100.0);
        ring.fill_ratio = 0.9;
        let inset = cell(0.0, 0.0, 30.0, 30.0);
        let kept = resolve_overlaps(vec![ring.clone(), inset.clone()], &mut diagnostics);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], inset);

        let big_inset = cell(0.0, 0.0, 80.0, 80.0);
        let kept = resolve_overlaps(vec![ring, big_inset.clone()], &mut diagnostics);
        assert_eq!(kept, vec![big_inset]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_resolve_flags_equal_alternatives() {
        let mut diagnostics = Vec::new();
        let kept = resolve_overlaps(
            vec![cell(0.0, 0.0, 50.0, 50.0), cell(10.0, 10.0, 60.0, 60.0)],
            &mut diagnostics,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].bbox, BBox::new(0.0, 0.0, 50.0, 50.0));
        assert!(matches!(
            diagnostics.as_slice(),
            [Diagnostic::SegmentationAmbiguous { .. }]
        ));
    }
}
