//! Spatial segmentation of a page into candidate zones.
//!
//! # Algorithm
//!
//! 1. Snap drawn separators into horizontal and vertical grid lines
//! 2. Cut the page into a mesh at every grid coordinate and merge adjacent
//!    cells that have no drawn divider between them (union-find)
//! 3. Score each merged region by boundary support, drop open page area
//! 4. Collapse small, fully bounded table cells into sub-grid zones
//! 5. Drop noise and regions no zone template can have
//! 6. Resolve overlaps, smaller fully bounded regions first
//! 7. Order zones top-to-bottom, left-to-right, assign tokens, and gather
//!    unclaimed content into one remainder zone
//!
//! Raster scans (no vector content) are segmented into text blocks instead.

mod grid;
mod regions;

pub use grid::{Grid, GridLine, MeshRegion};

use crate::primitives::PrimitiveSet;
use ordered_float::OrderedFloat;
use plate_core::{
    AnalyzerConfig, BBox, Diagnostic, Page, PlateError, PrimitiveRef, Result, TokenId, Zone,
    ZoneId,
};
use regions::Candidate;
use rustc_hash::FxHashMap;

/// Token share that must lie inside a zone for the token to belong to it
const TOKEN_ASSIGNMENT_OVERLAP: f64 = 0.5;

/// Segmentation confidence of text-block zones
const TEXT_BLOCK_CONFIDENCE: f64 = 0.3;

/// Segmentation confidence of the remainder zone
const REMAINDER_CONFIDENCE: f64 = 0.2;

/// Segmentation confidence of the whole-page zone of an empty page
const EMPTY_PAGE_CONFIDENCE: f64 = 0.1;

/// Union-find over element ids
#[derive(Debug)]
pub(crate) struct UnionFind {
    parent: FxHashMap<usize, usize>,
    rank: FxHashMap<usize, usize>,
}

impl UnionFind {
    /// Initialize with a collection of element IDs
    pub(crate) fn new(elements: &[usize]) -> Self {
        let parent = elements.iter().map(|&e| (e, e)).collect();
        let rank = elements.iter().map(|&e| (e, 0)).collect();
        Self { parent, rank }
    }

    /// Find root of element with path compression
    pub(crate) fn find(&mut self, x: usize) -> usize {
        let parent = self.parent.get(&x).copied().unwrap_or(x);
        if parent == x {
            return x;
        }
        let root = self.find(parent);
        self.parent.insert(x, root);
        root
    }

    /// Union two elements by rank
    pub(crate) fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return;
        }

        let rank_x = self.rank.get(&root_x).copied().unwrap_or(0);
        let rank_y = self.rank.get(&root_y).copied().unwrap_or(0);
        match rank_x.cmp(&rank_y) {
            std::cmp::Ordering::Greater => {
                self.parent.insert(root_y, root_x);
            }
            std::cmp::Ordering::Less => {
                self.parent.insert(root_x, root_y);
            }
            std::cmp::Ordering::Equal => {
                self.parent.insert(root_y, root_x);
                self.rank.insert(root_x, rank_x + 1);
            }
        }
    }

    /// Groups of connected elements, each sorted, ordered by smallest member
    pub(crate) fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut elements: Vec<usize> = self.parent.keys().copied().collect();
        elements.sort_unstable();
        let mut by_root: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for element in elements {
            let root = self.find(element);
            by_root.entry(root).or_default().push(element);
        }
        let mut groups: Vec<Vec<usize>> = by_root.into_values().collect();
        groups.sort_unstable_by_key(|g| g[0]);
        groups
    }
}

/// Segmenter thresholds, taken from [`AnalyzerConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    pub min_zone_area: f64,
    pub line_merge_tolerance: f64,
    pub max_separator_stroke: f64,
    pub max_aspect_ratio: f64,
    pub min_zone_side: f64,
    pub cell_collapse_area: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::from(&AnalyzerConfig::default())
    }
}

impl From<&AnalyzerConfig> for SegmenterConfig {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            min_zone_area: config.min_zone_area,
            line_merge_tolerance: config.line_merge_tolerance,
            max_separator_stroke: config.max_separator_stroke,
            max_aspect_ratio: config.max_aspect_ratio,
            min_zone_side: config.min_zone_side,
            cell_collapse_area: config.cell_collapse_area,
        }
    }
}

/// Output of segmentation: ordered candidate zones plus the remainder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    /// Candidate zones, top-to-bottom then left-to-right, labels unset
    pub zones: Vec<Zone>,
    /// Unclaimed content, always labeled unknown
    pub remainder: Option<Zone>,
    pub diagnostics: Vec<Diagnostic>,
    /// Zones were built from text blocks because the page has no usable vector content
    pub text_only: bool,
}

impl Segmentation {
    /// Candidate zones followed by the remainder
    pub fn all_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().chain(self.remainder.iter())
    }

    pub fn all_zones_mut(&mut self) -> impl Iterator<Item = &mut Zone> {
        self.zones.iter_mut().chain(self.remainder.iter_mut())
    }

    #[inline]
    #[must_use = "returns the number of zones including the remainder"]
    pub fn zone_count(&self) -> usize {
        self.zones.len() + usize::from(self.remainder.is_some())
    }
}

/// Partitions a page's primitives into candidate zones
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    #[inline]
    #[must_use = "returns a new Segmenter"]
    pub const fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use = "returns the segmenter configuration"]
    pub const fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment `page` using its extracted primitives.
    ///
    /// # Errors
    ///
    /// [`PlateError::SegmentationFailed`] when the page has vector content
    /// forming regions but none of them survives thresholding.
    pub fn segment(&self, page: &Page, primitives: &PrimitiveSet) -> Result<Segmentation> {
        let mut diagnostics = Vec::new();
        let tolerance = self.config.line_merge_tolerance;

        let grid = if primitives.is_empty() {
            None
        } else {
            let grid = Grid::build(primitives, tolerance, self.config.max_separator_stroke);
            if grid.is_empty() {
                log::debug!(
                    "Page {}: {} primitives form no closed cell, segmenting text blocks",
                    page.id,
                    primitives.len()
                );
                None
            } else {
                Some(grid)
            }
        };

        let text_only = grid.is_none();
        let candidates = match grid {
            Some(grid) => {
                let mesh = grid.regions();
                let mesh_count = mesh.len();
                let candidates = regions::from_mesh(&grid, mesh, &mut diagnostics);
                let candidates =
                    regions::collapse(candidates, &grid, page.area(), &self.config);
                let (candidates, dropped) = regions::filter(candidates, &self.config);
                let candidates = regions::resolve_overlaps(candidates, &mut diagnostics);
                if candidates.is_empty() {
                    return Err(PlateError::SegmentationFailed {
                        page_id: page.id.clone(),
                        reason: format!(
                            "{mesh_count} mesh regions, {dropped} dropped by area/shape thresholds, none survived"
                        ),
                    });
                }
                candidates
            }
            None => {
                let blocks = text_blocks(page);
                if blocks.is_empty() {
                    log::debug!("Page {}: no vector content and no text", page.id);
                    let mut whole = Zone::candidate(
                        ZoneId(0),
                        page.bbox(),
                        plate_core::BoundarySupport::default(),
                        EMPTY_PAGE_CONFIDENCE,
                    );
                    whole.is_remainder = true;
                    return Ok(Segmentation {
                        zones: Vec::new(),
                        remainder: Some(whole),
                        diagnostics,
                        text_only: true,
                    });
                }
                blocks
                    .into_iter()
                    .map(|bbox| Candidate::from_text_block(bbox, TEXT_BLOCK_CONFIDENCE))
                    .collect()
            }
        };

        let segmentation = self.build_zones(page, primitives, candidates, diagnostics, text_only);
        log::debug!(
            "Page {}: {} zones{}{}",
            page.id,
            segmentation.zones.len(),
            if segmentation.remainder.is_some() { " + remainder" } else { "" },
            if text_only { " (text blocks)" } else { "" }
        );
        Ok(segmentation)
    }

    fn build_zones(
        &self,
        page: &Page,
        primitives: &PrimitiveSet,
        mut candidates: Vec<Candidate>,
        diagnostics: Vec<Diagnostic>,
        text_only: bool,
    ) -> Segmentation {
        let tolerance = self.config.line_merge_tolerance;
        candidates.sort_by_key(|c| (OrderedFloat(c.bbox.t), OrderedFloat(c.bbox.l)));

        let mut zones: Vec<Zone> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let mut zone = Zone::candidate(ZoneId(i), c.bbox, c.boundary, c.confidence);
                zone.sub_grid = c.sub_grid;
                zone.primitives = primitives.sources_within(&c.bbox, tolerance);
                zone
            })
            .collect();

        let mut unassigned = Vec::new();
        for (index, token) in page.tokens.iter().enumerate() {
            if token.is_blank() {
                continue;
            }
            match owning_zone(&zones, &token.bbox) {
                Some(z) => zones[z].token_ids.push(TokenId(index)),
                None => unassigned.push(index),
            }
        }

        let stray = stray_primitives(primitives, &zones, tolerance);
        let remainder = remainder_zone(page, &unassigned, &stray, primitives, zones.len());

        Segmentation {
            zones,
            remainder,
            diagnostics,
            text_only,
        }
    }
}

/// Smallest zone holding most of `bbox`
pub(crate) fn owning_zone(zones: &[Zone], bbox: &BBox) -> Option<usize> {
    zones
        .iter()
        .enumerate()
        .filter(|(_, z)| bbox.intersection_over_self(&z.bbox) >= TOKEN_ASSIGNMENT_OVERLAP)
        .min_by_key(|(_, z)| OrderedFloat(z.bbox.area()))
        .map(|(i, _)| i)
}

/// Kept primitives lying inside no zone: (is line, index into the set)
fn stray_primitives(primitives: &PrimitiveSet, zones: &[Zone], tolerance: f64) -> Vec<(bool, usize)> {
    let inside_any = |bbox: &BBox| zones.iter().any(|z| z.bbox.contains(bbox, tolerance));
    let lines = primitives
        .lines
        .iter()
        .enumerate()
        .filter(|(_, l)| !inside_any(&l.line.bbox()))
        .map(|(i, _)| (true, i));
    let rects = primitives
        .rects
        .iter()
        .enumerate()
        .filter(|(_, r)| !inside_any(&r.rect.bbox()))
        .map(|(i, _)| (false, i));
    lines.chain(rects).collect()
}

fn remainder_zone(
    page: &Page,
    tokens: &[usize],
    stray: &[(bool, usize)],
    primitives: &PrimitiveSet,
    id: usize,
) -> Option<Zone> {
    let mut boxes: Vec<BBox> = tokens.iter().map(|&i| page.tokens[i].bbox).collect();
    let mut refs = Vec::new();
    for &(is_line, i) in stray {
        if is_line {
            let line = &primitives.lines[i];
            boxes.push(line.line.bbox());
            refs.extend(line.sources.iter().map(|&s| PrimitiveRef::Line(s)));
        } else {
            let rect = &primitives.rects[i];
            boxes.push(rect.rect.bbox());
            refs.extend(rect.sources.iter().map(|&s| PrimitiveRef::Rect(s)));
        }
    }
    let bbox = BBox::enclosing(boxes.iter())?;
    refs.sort_unstable();

    let mut zone = Zone::candidate(
        ZoneId(id),
        bbox,
        plate_core::BoundarySupport::default(),
        REMAINDER_CONFIDENCE,
    );
    zone.is_remainder = true;
    zone.primitives = refs;
    zone.token_ids = tokens.iter().map(|&i| TokenId(i)).collect();
    Some(zone)
}

/// Group page text into blocks separated by whitespace gaps
fn text_blocks(page: &Page) -> Vec<BBox> {
    let tokens: Vec<(usize, &BBox)> = page
        .tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_blank() && t.bbox.area() > 0.0)
        .map(|(i, t)| (i, &t.bbox))
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut heights: Vec<f64> = tokens.iter().map(|(_, b)| b.height()).collect();
    heights.sort_by(f64::total_cmp);
    let line_height = heights[heights.len() / 2];

    let ids: Vec<usize> = (0..tokens.len()).collect();
    let mut uf = UnionFind::new(&ids);
    for a in 0..tokens.len() {
        for b in a + 1..tokens.len() {
            let (_, x) = tokens[a];
            let (_, y) = tokens[b];
            let horizontal_gap = (x.l.max(y.l) - x.r.min(y.r)).max(0.0);
            let vertical_gap = (x.t.max(y.t) - x.b.min(y.b)).max(0.0);
            if horizontal_gap <= 2.0 * line_height && vertical_gap <= line_height {
                uf.union(a, b);
            }
        }
    }

    uf.groups()
        .into_iter()
        .filter_map(|group| BBox::enclosing(group.iter().map(|&i| tokens[i].1)))
        .collect()
}
