//! Zone classification by weighted geometric and textual features.
//!
//! Every candidate zone is scored against each [`ZoneKind`] with the
//! [`ScoringTable`]. The best kind wins if it clears the classification
//! floor; ties go to the more specific (smaller) kind. Zones that clear no
//! floor stay [`ZoneKind::Unknown`] and produce a diagnostic. The remainder
//! zone is never classified.

pub mod features;
pub mod scoring;

pub use features::{Feature, FeatureContext, FeatureVector};
pub use scoring::ScoringTable;

use crate::segmenter::Segmentation;
use crate::text_locator::TokenArena;
use plate_core::{AnalyzerConfig, Diagnostic, Page, ZoneKind};

/// Scores closer than this are treated as tied
const TIE_EPSILON: f64 = 1e-9;

/// Assigns a [`ZoneKind`] and confidence to each zone
#[derive(Debug, Clone)]
pub struct ZoneClassifier {
    table: ScoringTable,
    floor: f64,
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self::new(ScoringTable::default(), 0.35)
    }
}

impl ZoneClassifier {
    #[must_use = "returns a new ZoneClassifier"]
    pub fn new(table: ScoringTable, floor: f64) -> Self {
        Self { table, floor }
    }

    /// Classifier with the default table plus the config's weight overrides
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, String> {
        let table = ScoringTable::with_overrides(&config.scoring)?;
        Ok(Self::new(table, config.classification_floor))
    }

    #[inline]
    #[must_use = "returns the scoring table"]
    pub fn table(&self) -> &ScoringTable {
        &self.table
    }

    /// Pick the winning kind from per-kind scores.
    ///
    /// Returns the best kind and score, or `Unknown` with the best score
    /// when nothing clears the floor.
    #[must_use = "returns the chosen kind and its score"]
    pub fn decide(&self, scores: &[(ZoneKind, f64)]) -> (ZoneKind, f64, ZoneKind) {
        let mut best = (ZoneKind::Unknown, 0.0);
        for &(kind, score) in scores {
            let better = score > best.1 + TIE_EPSILON
                || ((score - best.1).abs() <= TIE_EPSILON
                    && kind.specificity_rank() < best.0.specificity_rank());
            if better {
                best = (kind, score);
            }
        }
        if best.1 >= self.floor && best.0 != ZoneKind::Unknown {
            (best.0, best.1, best.0)
        } else {
            (ZoneKind::Unknown, best.1, best.0)
        }
    }

    /// Classify every candidate zone in place.
    ///
    /// Returns a [`Diagnostic::ClassificationLowConfidence`] per zone left
    /// unknown.
    pub fn classify(
        &self,
        page: &Page,
        segmentation: &mut Segmentation,
        arena: &TokenArena<'_>,
    ) -> Vec<Diagnostic> {
        let text_only = segmentation.text_only;
        let decisions: Vec<_> = {
            let ctx = FeatureContext::new(page, arena, &segmentation.zones);
            segmentation
                .zones
                .iter()
                .map(|zone| {
                    let features = features::compute(zone, &ctx);
                    self.decide(&self.table.score_all(&features, text_only))
                })
                .collect()
        };

        let mut diagnostics = Vec::new();
        for (zone, (kind, score, best_kind)) in segmentation.zones.iter_mut().zip(decisions) {
            zone.kind = kind;
            zone.kind_confidence = score;
            if kind == ZoneKind::Unknown {
                log::debug!(
                    "{} on page {} unclassified: best {} at {:.2}",
                    zone.id,
                    page.id,
                    best_kind,
                    score
                );
                diagnostics.push(Diagnostic::ClassificationLowConfidence {
                    zone: zone.id,
                    best_kind,
                    best_score: score,
                });
            } else {
                log::trace!("{} on page {}: {} ({:.2})", zone.id, page.id, kind, score);
            }
        }
        if let Some(remainder) = segmentation.remainder.as_mut() {
            remainder.kind = ZoneKind::Unknown;
            remainder.kind_confidence = 0.0;
        }
        diagnostics
    }
}
