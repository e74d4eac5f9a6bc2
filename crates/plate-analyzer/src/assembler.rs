//! Record assembly: merge per-zone fields into one [`ApproachProcedure`].
//!
//! Fields with the same name are reconciled: equal values keep the more
//! confident copy, different values keep the more confident one (the earlier
//! zone on ties) and the loser is recorded as an [`AuditNote`] plus a
//! [`Diagnostic::ConflictingField`]. Nothing is dropped silently.

use plate_core::{
    matches_pattern, AnalyzerConfig, ApproachProcedure, AuditNote, Diagnostic, ExtractedField,
    PageId, RecordParts,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Merges extracted fields and scores the result
#[derive(Debug, Clone, Copy)]
pub struct RecordAssembler {
    min_field_confidence: f64,
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Fields after conflict resolution
#[derive(Debug, Default)]
pub struct Merged {
    pub fields: BTreeMap<String, ExtractedField>,
    pub audit_notes: Vec<AuditNote>,
    pub diagnostics: Vec<Diagnostic>,
}

/// `Greater` when `a` should be kept over `b`
fn precedence(a: &ExtractedField, b: &ExtractedField) -> Ordering {
    a.confidence
        .total_cmp(&b.confidence)
        .then_with(|| b.provenance.zone.id.cmp(&a.provenance.zone.id))
}

impl RecordAssembler {
    #[must_use = "returns a new RecordAssembler"]
    pub const fn new(min_field_confidence: f64) -> Self {
        Self {
            min_field_confidence,
        }
    }

    #[must_use = "returns a new RecordAssembler"]
    pub const fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.min_field_confidence)
    }

    /// Reconcile fields sharing a name
    #[must_use = "returns the merged fields"]
    pub fn merge(&self, fields: Vec<ExtractedField>) -> Merged {
        let mut merged = Merged::default();
        for mut field in fields {
            let Some(kept) = merged.fields.get_mut(&field.name) else {
                merged.fields.insert(field.name.clone(), field);
                continue;
            };
            if precedence(&field, kept) == Ordering::Greater {
                std::mem::swap(kept, &mut field);
            }
            let discarded = field;
            if kept.value == discarded.value {
                continue;
            }
            log::debug!(
                "Conflict on {}: kept {} ({:.2}, {}), discarded {} ({:.2}, {})",
                kept.name,
                kept.value,
                kept.confidence,
                kept.provenance.zone.id,
                discarded.value,
                discarded.confidence,
                discarded.provenance.zone.id
            );
            merged.diagnostics.push(Diagnostic::ConflictingField {
                name: kept.name.clone(),
                kept: kept.value.to_string(),
                discarded: discarded.value.to_string(),
            });
            merged.audit_notes.push(AuditNote {
                field: kept.name.clone(),
                kept_zone: kept.provenance.zone.id,
                kept_confidence: kept.confidence,
                discarded,
            });
        }
        merged
    }

    /// Build the record from `parts` (page metadata and diagnostics so far),
    /// the extracted fields and the expected template patterns.
    #[must_use = "returns the assembled record"]
    pub fn assemble(
        &self,
        page_id: &PageId,
        mut parts: RecordParts,
        fields: Vec<ExtractedField>,
        template: &[String],
    ) -> ApproachProcedure {
        let merged = self.merge(fields);
        parts.fields = merged.fields;
        parts.audit_notes = merged.audit_notes;
        parts.diagnostics.extend(merged.diagnostics);

        let mut satisfied = 0usize;
        for pattern in template {
            let mut matching = parts
                .fields
                .values()
                .filter(|f| matches_pattern(pattern, &f.name))
                .peekable();
            if matching.peek().is_none() {
                parts.missing_fields.push(pattern.clone());
                parts.diagnostics.push(Diagnostic::MissingField {
                    name: pattern.clone(),
                });
                continue;
            }
            if matching.any(|f| f.confidence >= self.min_field_confidence) {
                satisfied += 1;
            }
        }
        parts.completeness = if template.is_empty() {
            1.0
        } else {
            satisfied as f64 / template.len() as f64
        };

        parts.low_confidence_fields = parts
            .fields
            .values()
            .filter(|f| f.confidence < self.min_field_confidence)
            .map(|f| f.name.clone())
            .collect();

        let mean = if parts.fields.is_empty() {
            0.0
        } else {
            parts.fields.values().map(|f| f.confidence).sum::<f64>() / parts.fields.len() as f64
        };
        let penalty: f64 = parts.diagnostics.iter().map(Diagnostic::penalty).product();
        parts.confidence = mean * penalty;

        log::debug!(
            "Page {}: {} fields, {} missing, {} conflicts, completeness {:.2}, confidence {:.2}",
            page_id,
            parts.fields.len(),
            parts.missing_fields.len(),
            parts.audit_notes.len(),
            parts.completeness,
            parts.confidence
        );
        ApproachProcedure::from_parts(page_id.clone(), parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::{
        BBox, BoundarySupport, FieldValue, ProcedureType, Provenance, TokenId, Unit, Zone, ZoneId,
    };

    fn field(name: &str, value: f64, confidence: f64, zone: usize) -> ExtractedField {
        let zone = Zone::candidate(
            ZoneId(zone),
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BoundarySupport::full(),
            1.0,
        );
        ExtractedField::new(
            name,
            FieldValue::quantity(value, Unit::Feet),
            confidence,
            Provenance::from_tokens(&zone, vec![TokenId(zone.id.0)], zone.bbox),
        )
    }

    #[test]
    fn test_conflict_keeps_higher_confidence_and_audits() {
        let merged = RecordAssembler::default().merge(vec![
            field("ceiling", 250.0, 0.6, 0),
            field("ceiling", 200.0, 0.9, 1),
        ]);
        let kept = &merged.fields["ceiling"];
        assert_eq!(kept.value.as_f64(), Some(200.0));
        assert_eq!(merged.audit_notes.len(), 1);
        assert_eq!(merged.audit_notes[0].discarded.value.as_f64(), Some(250.0));
        assert_eq!(merged.audit_notes[0].kept_zone, ZoneId(1));
        assert!(matches!(
            &merged.diagnostics[..],
            [Diagnostic::ConflictingField { name, .. }] if name == "ceiling"
        ));
    }

    #[test]
    fn test_tie_keeps_earlier_zone() {
        let merged = RecordAssembler::default().merge(vec![
            field("tdze", 1007.0, 0.8, 3),
            field("tdze", 1010.0, 0.8, 1),
        ]);
        assert_eq!(merged.fields["tdze"].value.as_f64(), Some(1010.0));
        assert_eq!(merged.audit_notes[0].discarded.value.as_f64(), Some(1007.0));
    }

    #[test]
    fn test_equal_values_keep_more_confident_copy_silently() {
        let merged = RecordAssembler::default().merge(vec![
            field("tdze", 1007.0, 0.5, 0),
            field("tdze", 1007.0, 0.9, 2),
        ]);
        assert_eq!(merged.fields["tdze"].confidence, 0.9);
        assert!(merged.audit_notes.is_empty());
        assert!(merged.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_field_and_completeness() {
        let template = vec![
            "airport-elevation".to_string(),
            "touchdown-zone-elevation".to_string(),
            "minimums.*".to_string(),
            "approach-course".to_string(),
        ];
        let fields = vec![
            field("touchdown-zone-elevation", 1007.0, 0.9, 0),
            field("minimums.lpv.cat-a", 1212.0, 0.9, 1),
            field("approach-course", 97.0, 0.2, 0),
        ];
        let page = PageId::new("p");
        let record =
            RecordAssembler::new(0.5).assemble(&page, RecordParts::default(), fields, &template);
        assert_eq!(record.missing_fields(), ["airport-elevation".to_string()]);
        assert!(record.value("airport-elevation").is_none());
        assert!(record
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::MissingField { name } if name == "airport-elevation")));
        assert!((record.completeness() - 0.5).abs() < 1e-9);
        assert_eq!(record.low_confidence_fields(), ["approach-course".to_string()]);
        let mean = (0.9 + 0.9 + 0.2) / 3.0;
        assert!((record.confidence() - mean * 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_empty_template_is_complete() {
        let page = PageId::new("p");
        let record =
            RecordAssembler::default().assemble(&page, RecordParts::default(), Vec::new(), &[]);
        assert_eq!(record.completeness(), 1.0);
        assert_eq!(record.confidence(), 0.0);
        assert_eq!(record.procedure_type(), ProcedureType::Other);
    }
}
