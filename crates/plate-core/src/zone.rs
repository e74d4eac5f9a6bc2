//! Zones: labeled page regions produced by segmentation.

use crate::geometry::BBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic part of an 8260-style plate layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// Top-down chart of the procedure (largest, central).
    PlanView,
    /// Side view of the final approach path.
    ProfileView,
    /// Category by approach-line table of altitudes and visibilities.
    MinimumsTable,
    /// Communication facilities and frequencies.
    CommBox,
    /// Approach course, elevations, missed approach summary.
    BriefingStrip,
    /// Free text remarks.
    Notes,
    /// Nothing scored above the classification floor.
    #[default]
    Unknown,
}

impl ZoneKind {
    /// Kinds the classifier scores, in declaration order.
    pub const CLASSIFIED: [Self; 6] = [
        Self::PlanView,
        Self::ProfileView,
        Self::MinimumsTable,
        Self::CommBox,
        Self::BriefingStrip,
        Self::Notes,
    ];

    /// Rank by typical on-page area; lower is more specific.
    ///
    /// Used to break classification ties in favour of the smaller kind.
    #[inline]
    #[must_use = "returns the specificity rank"]
    pub const fn specificity_rank(self) -> u8 {
        match self {
            Self::CommBox => 0,
            Self::BriefingStrip => 1,
            Self::Notes => 2,
            Self::MinimumsTable => 3,
            Self::ProfileView => 4,
            Self::PlanView => 5,
            Self::Unknown => 6,
        }
    }

    /// Prefix used for field names produced from this kind of zone.
    #[inline]
    #[must_use = "returns the field name prefix"]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::PlanView => "plan-view",
            Self::ProfileView => "profile-view",
            Self::MinimumsTable => "minimums",
            Self::CommBox => "comm",
            Self::BriefingStrip => "briefing",
            Self::Notes => "notes",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PlanView => "plan_view",
            Self::ProfileView => "profile_view",
            Self::MinimumsTable => "minimums_table",
            Self::CommBox => "comm_box",
            Self::BriefingStrip => "briefing_strip",
            Self::Notes => "notes",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ZoneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "plan_view" | "plan" => Ok(Self::PlanView),
            "profile_view" | "profile" => Ok(Self::ProfileView),
            "minimums_table" | "minimums" => Ok(Self::MinimumsTable),
            "comm_box" | "comm" | "communications" => Ok(Self::CommBox),
            "briefing_strip" | "briefing" => Ok(Self::BriefingStrip),
            "notes" => Ok(Self::Notes),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!(
                "Unknown zone kind '{s}'. Expected: plan_view, profile_view, minimums_table, \
                 comm_box, briefing_strip, notes, unknown"
            )),
        }
    }
}

/// Index of a zone within one page run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub usize);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone-{}", self.0)
    }
}

/// Index into the page-run token arena.
///
/// Ids below the page's token count refer to `Page::tokens` directly; higher
/// ids refer to tokens returned by the OCR collaborator, which the record
/// keeps alongside its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub usize);

/// Reference to a source primitive on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum PrimitiveRef {
    Line(usize),
    Rect(usize),
}

/// Fraction of each zone side that is covered by a detected line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundarySupport {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl BoundarySupport {
    /// Coverage at or above which a side counts as drawn
    pub const DRAWN_SIDE: f64 = 0.98;

    #[inline]
    #[must_use = "returns a new BoundarySupport"]
    pub const fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// All four sides drawn
    #[inline]
    #[must_use = "returns a fully supported boundary"]
    pub const fn full() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    #[inline]
    #[must_use = "returns the mean side coverage"]
    pub fn mean(&self) -> f64 {
        (self.top + self.bottom + self.left + self.right) / 4.0
    }

    #[inline]
    #[must_use = "returns the number of drawn sides"]
    pub fn drawn_sides(&self) -> usize {
        [self.top, self.bottom, self.left, self.right]
            .iter()
            .filter(|&&c| c >= Self::DRAWN_SIDE)
            .count()
    }

    #[inline]
    #[must_use = "returns whether all four sides are drawn"]
    pub fn is_fully_bounded(&self) -> bool {
        self.drawn_sides() == 4
    }
}

/// Internal table structure of a zone built by collapsing adjacent cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubGrid {
    /// Distinct column boundaries, left to right (outer edges included)
    pub columns: Vec<f64>,
    /// Distinct row boundaries, top to bottom (outer edges included)
    pub rows: Vec<f64>,
    /// Cell boxes in reading order
    pub cells: Vec<BBox>,
}

impl SubGrid {
    /// Build from cell boxes, snapping boundaries closer than `tolerance`.
    #[must_use = "returns the constructed sub-grid"]
    pub fn from_cells(mut cells: Vec<BBox>, tolerance: f64) -> Self {
        cells.sort_by(|a, b| a.t.total_cmp(&b.t).then(a.l.total_cmp(&b.l)));
        let columns = snap_coordinates(cells.iter().flat_map(|c| [c.l, c.r]), tolerance);
        let rows = snap_coordinates(cells.iter().flat_map(|c| [c.t, c.b]), tolerance);
        Self {
            columns,
            rows,
            cells,
        }
    }

    #[inline]
    #[must_use = "returns the number of columns"]
    pub fn column_count(&self) -> usize {
        self.columns.len().saturating_sub(1)
    }

    #[inline]
    #[must_use = "returns the number of rows"]
    pub fn row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// Sort coordinates and merge runs that lie within `tolerance` of each other.
#[must_use = "returns the snapped coordinates"]
pub fn snap_coordinates<I>(values: I, tolerance: f64) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    values.sort_by(f64::total_cmp);
    let mut snapped: Vec<f64> = Vec::with_capacity(values.len());
    for value in values {
        match snapped.last() {
            Some(&last) if value - last <= tolerance => {}
            _ => snapped.push(value),
        }
    }
    snapped
}

/// A region of the page and everything found inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub bbox: BBox,
    pub kind: ZoneKind,
    /// Score of the assigned label (0 until classified)
    pub kind_confidence: f64,
    /// How cleanly the zone boundary was detected
    pub segmentation_confidence: f64,
    pub boundary: BoundarySupport,
    pub sub_grid: Option<SubGrid>,
    /// Source primitives lying inside the zone
    pub primitives: Vec<PrimitiveRef>,
    /// Tokens assigned to the zone
    pub token_ids: Vec<TokenId>,
    /// The OCR collaborator failed or timed out for this zone
    pub text_degraded: bool,
    /// Catch-all zone holding content no candidate region claimed
    pub is_remainder: bool,
}

impl Zone {
    /// Unlabeled candidate zone
    #[must_use = "returns a new Zone"]
    pub fn candidate(id: ZoneId, bbox: BBox, boundary: BoundarySupport, confidence: f64) -> Self {
        Self {
            id,
            bbox,
            kind: ZoneKind::Unknown,
            kind_confidence: 0.0,
            segmentation_confidence: confidence.clamp(0.0, 1.0),
            boundary,
            sub_grid: None,
            primitives: Vec::new(),
            token_ids: Vec::new(),
            text_degraded: false,
            is_remainder: false,
        }
    }

    #[inline]
    #[must_use = "returns whether the zone carries a sub-grid"]
    pub fn has_sub_grid(&self) -> bool {
        self.sub_grid.as_ref().is_some_and(|g| g.cells.len() > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_kind_round_trip_names() {
        for kind in ZoneKind::CLASSIFIED {
            let parsed: ZoneKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert_eq!("comm-box".parse::<ZoneKind>().unwrap(), ZoneKind::CommBox);
        assert!("legend".parse::<ZoneKind>().is_err());
    }

    #[test]
    fn test_specificity_prefers_small_kinds() {
        assert!(ZoneKind::CommBox.specificity_rank() < ZoneKind::PlanView.specificity_rank());
        assert!(
            ZoneKind::MinimumsTable.specificity_rank() < ZoneKind::ProfileView.specificity_rank()
        );
    }

    #[test]
    fn test_boundary_support() {
        let partial = BoundarySupport::new(1.0, 1.0, 0.5, 0.99);
        assert_eq!(partial.drawn_sides(), 3);
        assert!(!partial.is_fully_bounded());
        assert!(BoundarySupport::full().is_fully_bounded());
    }

    #[test]
    fn test_sub_grid_from_cells() {
        let cells = vec![
            BBox::new(50.0, 0.0, 100.0, 20.0),
            BBox::new(0.0, 0.0, 50.0, 20.0),
            BBox::new(0.0, 20.0, 100.1, 40.0),
        ];
        let grid = SubGrid::from_cells(cells, 0.5);
        assert_eq!(grid.column_count(), 2);
        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.cells[0].l, 0.0);
    }

    #[test]
    fn test_snap_coordinates() {
        let snapped = snap_coordinates([10.0, 0.0, 10.3, 20.0, 0.1], 0.5);
        assert_eq!(snapped, vec![0.0, 10.0, 20.0]);
    }
}
