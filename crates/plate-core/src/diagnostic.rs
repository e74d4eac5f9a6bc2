//! Non-fatal conditions recorded on an assembled record.

use crate::geometry::BBox;
use crate::zone::{ZoneId, ZoneKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A condition that degraded extraction without stopping it.
///
/// Each variant carries a confidence penalty that the record assembler
/// multiplies into the overall record confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The page carries no line or rectangle primitives (raster scan)
    NoVectorContent,
    /// Segmentation could not decide between alternatives
    SegmentationAmbiguous { bbox: BBox, reason: String },
    /// No zone kind scored above the classification floor
    ClassificationLowConfidence {
        zone: ZoneId,
        best_kind: ZoneKind,
        best_score: f64,
    },
    /// A field the procedure template expects was not produced
    MissingField { name: String },
    /// Two zones produced different values for the same field
    ConflictingField {
        name: String,
        kept: String,
        discarded: String,
    },
    /// The OCR collaborator did not answer within its timeout
    CollaboratorTimeout { zone: ZoneId },
    /// The OCR collaborator returned an error
    CollaboratorFailed { zone: ZoneId, reason: String },
}

impl Diagnostic {
    /// Multiplicative confidence penalty in (0, 1]
    #[inline]
    #[must_use = "returns the confidence penalty factor"]
    pub const fn penalty(&self) -> f64 {
        match self {
            Self::NoVectorContent => 0.8,
            Self::SegmentationAmbiguous { .. } => 0.95,
            Self::ClassificationLowConfidence { .. } => 0.98,
            Self::MissingField { .. } => 0.97,
            Self::ConflictingField { .. } => 0.95,
            Self::CollaboratorTimeout { .. } => 0.9,
            Self::CollaboratorFailed { .. } => 0.92,
        }
    }

    #[inline]
    #[must_use = "returns whether this is a missing field marker"]
    pub const fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoVectorContent => write!(f, "page has no vector content"),
            Self::SegmentationAmbiguous { bbox, reason } => write!(
                f,
                "ambiguous segmentation at ({:.1}, {:.1}, {:.1}, {:.1}): {reason}",
                bbox.l, bbox.t, bbox.r, bbox.b
            ),
            Self::ClassificationLowConfidence {
                zone,
                best_kind,
                best_score,
            } => write!(
                f,
                "{zone} left unknown (best {best_kind} scored {best_score:.2})"
            ),
            Self::MissingField { name } => write!(f, "missing field {name}"),
            Self::ConflictingField {
                name,
                kept,
                discarded,
            } => write!(f, "conflicting {name}: kept {kept}, discarded {discarded}"),
            Self::CollaboratorTimeout { zone } => write!(f, "OCR timed out for {zone}"),
            Self::CollaboratorFailed { zone, reason } => {
                write!(f, "OCR failed for {zone}: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalties_are_in_range() {
        let all = [
            Diagnostic::NoVectorContent,
            Diagnostic::SegmentationAmbiguous {
                bbox: BBox::default(),
                reason: String::new(),
            },
            Diagnostic::ClassificationLowConfidence {
                zone: ZoneId(0),
                best_kind: ZoneKind::Notes,
                best_score: 0.1,
            },
            Diagnostic::MissingField {
                name: "airport-elevation".to_string(),
            },
            Diagnostic::CollaboratorTimeout { zone: ZoneId(1) },
        ];
        for diagnostic in all {
            let p = diagnostic.penalty();
            assert!(p > 0.0 && p <= 1.0, "{diagnostic}: {p}");
        }
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_string(&Diagnostic::MissingField {
            name: "tdze".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"missing_field","name":"tdze"}"#);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::CollaboratorTimeout { zone: ZoneId(3) };
        assert_eq!(d.to_string(), "OCR timed out for zone-3");
    }
}
