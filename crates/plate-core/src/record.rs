//! The assembled, immutable approach-procedure record.

use crate::diagnostic::Diagnostic;
use crate::field::{ExtractedField, FieldValue, MinimumsLine};
use crate::page::{Page, PageId, TextToken};
use crate::template::ProcedureType;
use crate::zone::{TokenId, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value that lost a conflict, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditNote {
    pub field: String,
    pub kept_zone: ZoneId,
    pub kept_confidence: f64,
    pub discarded: ExtractedField,
}

/// Everything the assembler hands over to build a record
#[derive(Debug, Clone, Default)]
pub struct RecordParts {
    pub page_id: Option<PageId>,
    pub procedure_type: ProcedureType,
    pub fields: BTreeMap<String, ExtractedField>,
    pub audit_notes: Vec<AuditNote>,
    pub missing_fields: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub low_confidence_fields: Vec<String>,
    pub page_token_count: usize,
    pub recognized_tokens: Vec<TextToken>,
    pub completeness: f64,
    pub confidence: f64,
}

/// Structured result for one plate page.
///
/// Read-only once built; fields are ordered by name so two runs over the same
/// page serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachProcedure {
    page_id: PageId,
    procedure_type: ProcedureType,
    fields: BTreeMap<String, ExtractedField>,
    audit_notes: Vec<AuditNote>,
    missing_fields: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    low_confidence_fields: Vec<String>,
    page_token_count: usize,
    recognized_tokens: Vec<TextToken>,
    completeness: f64,
    confidence: f64,
}

impl ApproachProcedure {
    #[must_use = "returns the built record"]
    pub fn from_parts(page_id: PageId, parts: RecordParts) -> Self {
        Self {
            page_id: parts.page_id.unwrap_or(page_id),
            procedure_type: parts.procedure_type,
            fields: parts.fields,
            audit_notes: parts.audit_notes,
            missing_fields: parts.missing_fields,
            diagnostics: parts.diagnostics,
            low_confidence_fields: parts.low_confidence_fields,
            page_token_count: parts.page_token_count,
            recognized_tokens: parts.recognized_tokens,
            completeness: parts.completeness.clamp(0.0, 1.0),
            confidence: parts.confidence.clamp(0.0, 1.0),
        }
    }

    #[inline]
    #[must_use]
    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    #[inline]
    #[must_use]
    pub const fn procedure_type(&self) -> ProcedureType {
        self.procedure_type
    }

    #[inline]
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, ExtractedField> {
        &self.fields
    }

    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.get(name)
    }

    #[inline]
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(|f| &f.value)
    }

    /// All minimums cells, ordered by field name
    pub fn minimums(&self) -> impl Iterator<Item = &MinimumsLine> {
        self.fields.values().filter_map(|f| match &f.value {
            FieldValue::Minimums(m) => Some(m),
            _ => None,
        })
    }

    #[inline]
    #[must_use]
    pub fn audit_notes(&self) -> &[AuditNote] {
        &self.audit_notes
    }

    /// Template fields no zone produced
    #[inline]
    #[must_use]
    pub fn missing_fields(&self) -> &[String] {
        &self.missing_fields
    }

    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Kept fields below the minimum field confidence
    #[inline]
    #[must_use]
    pub fn low_confidence_fields(&self) -> &[String] {
        &self.low_confidence_fields
    }

    #[inline]
    #[must_use]
    pub fn recognized_tokens(&self) -> &[TextToken] {
        &self.recognized_tokens
    }

    /// Resolve a provenance token id against the source page
    #[must_use]
    pub fn token<'a>(&'a self, page: &'a Page, id: TokenId) -> Option<&'a TextToken> {
        if id.0 < self.page_token_count {
            page.tokens.get(id.0)
        } else {
            self.recognized_tokens.get(id.0 - self.page_token_count)
        }
    }

    /// Fraction of expected template fields populated with enough confidence
    #[inline]
    #[must_use]
    pub const fn completeness(&self) -> f64 {
        self.completeness
    }

    #[inline]
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Provenance, Unit};
    use crate::geometry::BBox;
    use crate::zone::{BoundarySupport, Zone};

    fn record() -> ApproachProcedure {
        let zone = Zone::candidate(
            ZoneId(0),
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BoundarySupport::full(),
            1.0,
        );
        let field = ExtractedField::new(
            "airport-elevation",
            FieldValue::quantity(1_013.0, Unit::Feet),
            0.9,
            Provenance::from_tokens(&zone, vec![TokenId(1)], BBox::new(1.0, 1.0, 5.0, 3.0)),
        );
        let mut fields = BTreeMap::new();
        fields.insert(field.name.clone(), field);
        ApproachProcedure::from_parts(
            PageId::new("p"),
            RecordParts {
                fields,
                page_token_count: 1,
                recognized_tokens: vec![TextToken::recognized(
                    "1013",
                    BBox::new(1.0, 1.0, 5.0, 3.0),
                    0.8,
                )],
                completeness: 1.5,
                confidence: 0.9,
                ..RecordParts::default()
            },
        )
    }

    #[test]
    fn test_accessors() {
        let rec = record();
        assert_eq!(rec.page_id().as_str(), "p");
        assert_eq!(rec.completeness(), 1.0);
        assert_eq!(
            rec.value("airport-elevation").and_then(FieldValue::as_f64),
            Some(1_013.0)
        );
        assert_eq!(rec.minimums().count(), 0);
    }

    #[test]
    fn test_recognized_token_resolution() {
        let rec = record();
        let page =
            Page::new("p", 100.0, 100.0).with_token(TextToken::new("TDZE", BBox::default()));
        let text = |id| rec.token(&page, TokenId(id)).map(|t| t.text.as_str());
        assert_eq!(text(0), Some("TDZE"));
        assert_eq!(text(1), Some("1013"));
        assert!(rec.token(&page, TokenId(2)).is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let rec = record();
        let json = rec.to_json().unwrap();
        let back: ApproachProcedure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
