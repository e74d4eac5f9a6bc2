//! Per-kind feature weights.
//!
//! A zone's score for a kind is the weighted feature sum normalized by the
//! sum of that kind's positive weights, clamped to `[0, 1]`. Negative weights
//! penalize without raising the attainable maximum.

use super::features::{Feature, FeatureVector};
use plate_core::ZoneKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Non-cue weights are scaled by this on pages without vector content
const TEXT_ONLY_GEOMETRY_SCALE: f64 = 0.25;

/// Weight table keyed by zone kind, then by feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringTable {
    weights: BTreeMap<ZoneKind, BTreeMap<Feature, f64>>,
}

impl Default for ScoringTable {
    fn default() -> Self {
        use Feature::*;
        let table: [(ZoneKind, &[(Feature, f64)]); 6] = [
            (
                ZoneKind::PlanView,
                &[
                    (LargestZone, 2.0),
                    (RelativeArea, 1.5),
                    (CentralColumn, 1.0),
                    (MiddleBand, 1.0),
                    (SquareAspect, 0.5),
                    (DiagonalLines, 1.0),
                    (PlanCues, 2.0),
                    (SubGridPresent, -2.0),
                    (MinimumsCues, -1.0),
                    (CommCues, -1.0),
                ],
            ),
            (
                ZoneKind::ProfileView,
                &[
                    (SecondLargestZone, 1.0),
                    (RelativeArea, 0.5),
                    (WideAspect, 1.0),
                    (MiddleBand, 0.5),
                    (DiagonalLines, 1.5),
                    (ProfileCues, 3.0),
                    (SubGridPresent, -2.0),
                    (MinimumsCues, -0.5),
                    (LargestZone, -1.0),
                ],
            ),
            (
                ZoneKind::MinimumsTable,
                &[
                    (SubGridPresent, 1.0),
                    (SubGridColumns, 1.0),
                    (SubGridRows, 0.5),
                    (FullyBounded, 0.5),
                    (BottomBand, 0.5),
                    (WideAspect, 0.5),
                    (MinimumsCues, 3.0),
                    (LargestZone, -1.0),
                    (CommCues, -1.0),
                    (PlanCues, -0.5),
                ],
            ),
            (
                ZoneKind::CommBox,
                &[
                    (CommCues, 3.0),
                    (TopBand, 0.5),
                    (WideAspect, 0.5),
                    (FullyBounded, 0.5),
                    (SubGridPresent, 0.5),
                    (MinimumsCues, -1.0),
                    (LargestZone, -1.0),
                ],
            ),
            (
                ZoneKind::BriefingStrip,
                &[
                    (BriefingCues, 3.0),
                    (TopBand, 1.0),
                    (WideAspect, 1.0),
                    (FullyBounded, 0.5),
                    (SubGridPresent, 0.5),
                    (MinimumsCues, -0.5),
                    (CommCues, -0.5),
                    (LargestZone, -1.0),
                ],
            ),
            (
                ZoneKind::Notes,
                &[
                    (NotesCues, 3.0),
                    (FullyBounded, 0.5),
                    (SubGridPresent, -0.5),
                    (MinimumsCues, -0.5),
                    (CommCues, -0.5),
                    (LargestZone, -1.0),
                ],
            ),
        ];
        Self {
            weights: table
                .into_iter()
                .map(|(kind, weights)| (kind, weights.iter().copied().collect()))
                .collect(),
        }
    }
}

impl ScoringTable {
    /// Default table with `overrides[kind][feature]` replacing single weights
    pub fn with_overrides(
        overrides: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Result<Self, String> {
        let mut table = Self::default();
        for (kind, features) in overrides {
            let kind: ZoneKind = kind.parse()?;
            if kind == ZoneKind::Unknown {
                return Err("Zone kind 'unknown' cannot be scored".to_string());
            }
            for (feature, weight) in features {
                table.set_weight(kind, feature.parse()?, *weight);
            }
        }
        Ok(table)
    }

    /// Load a table from JSON of the form `{"minimums_table": {"sub_grid_present": 1.0}}`
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn set_weight(&mut self, kind: ZoneKind, feature: Feature, weight: f64) {
        self.weights.entry(kind).or_default().insert(feature, weight);
    }

    #[must_use = "returns the weight"]
    pub fn weight(&self, kind: ZoneKind, feature: Feature) -> f64 {
        self.weights
            .get(&kind)
            .and_then(|w| w.get(&feature))
            .copied()
            .unwrap_or(0.0)
    }

    /// Score of `features` for `kind` in `[0, 1]`.
    ///
    /// With `text_only` set, geometric weights are damped so keyword cues
    /// dominate.
    #[must_use = "returns the score"]
    pub fn score(&self, kind: ZoneKind, features: &FeatureVector, text_only: bool) -> f64 {
        let Some(weights) = self.weights.get(&kind) else {
            return 0.0;
        };
        let mut total = 0.0;
        let mut attainable = 0.0;
        for (&feature, &weight) in weights {
            let weight = if text_only && !feature.is_text_cue() {
                weight * TEXT_ONLY_GEOMETRY_SCALE
            } else {
                weight
            };
            total += weight * features.get(feature);
            if weight > 0.0 {
                attainable += weight;
            }
        }
        if attainable <= 0.0 {
            return 0.0;
        }
        (total / attainable).clamp(0.0, 1.0)
    }

    /// Scores for every classified kind, in [`ZoneKind::CLASSIFIED`] order
    #[must_use = "returns the scores"]
    pub fn score_all(&self, features: &FeatureVector, text_only: bool) -> Vec<(ZoneKind, f64)> {
        ZoneKind::CLASSIFIED
            .into_iter()
            .map(|kind| (kind, self.score(kind, features, text_only)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[(Feature, f64)]) -> FeatureVector {
        let mut v = FeatureVector::default();
        for &(f, x) in values {
            v.set(f, x);
        }
        v
    }

    #[test]
    fn test_default_covers_classified_kinds() {
        let table = ScoringTable::default();
        for kind in ZoneKind::CLASSIFIED {
            assert!(table.weights.contains_key(&kind), "{kind} has no weights");
        }
        assert_eq!(table.score(ZoneKind::Unknown, &FeatureVector::default(), false), 0.0);
    }

    #[test]
    fn test_score_normalized_and_clamped() {
        let table = ScoringTable::default();
        let perfect = vector(&[
            (Feature::SubGridPresent, 1.0),
            (Feature::SubGridColumns, 1.0),
            (Feature::SubGridRows, 1.0),
            (Feature::FullyBounded, 1.0),
            (Feature::BottomBand, 1.0),
            (Feature::WideAspect, 1.0),
            (Feature::MinimumsCues, 1.0),
        ]);
        assert!((table.score(ZoneKind::MinimumsTable, &perfect, false) - 1.0).abs() < 1e-9);
        let penalized = vector(&[(Feature::LargestZone, 1.0), (Feature::CommCues, 1.0)]);
        assert_eq!(table.score(ZoneKind::MinimumsTable, &penalized, false), 0.0);
    }

    #[test]
    fn test_text_only_emphasizes_cues() {
        let table = ScoringTable::default();
        let cues_only = vector(&[(Feature::CommCues, 0.75)]);
        let normal = table.score(ZoneKind::CommBox, &cues_only, false);
        let text_only = table.score(ZoneKind::CommBox, &cues_only, true);
        assert!(text_only > normal);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "notes".to_string(),
            BTreeMap::from([("top_band".to_string(), 4.0)]),
        );
        let table = ScoringTable::with_overrides(&overrides).unwrap();
        assert_eq!(table.weight(ZoneKind::Notes, Feature::TopBand), 4.0);
        assert_eq!(table.weight(ZoneKind::Notes, Feature::NotesCues), 3.0);

        overrides.insert(
            "notes".to_string(),
            BTreeMap::from([("sparkle".to_string(), 1.0)]),
        );
        assert!(ScoringTable::with_overrides(&overrides).is_err());
        let bad_kind = BTreeMap::from([("legend".to_string(), BTreeMap::new())]);
        assert!(ScoringTable::with_overrides(&bad_kind).is_err());
    }

    #[test]
    fn test_json_table() {
        let table = ScoringTable::from_json(r#"{"comm_box": {"comm_cues": 1.0}}"#).unwrap();
        let v = vector(&[(Feature::CommCues, 0.5)]);
        assert!((table.score(ZoneKind::CommBox, &v, false) - 0.5).abs() < 1e-9);
        assert_eq!(table.score(ZoneKind::Notes, &v, false), 0.0);
    }
}
