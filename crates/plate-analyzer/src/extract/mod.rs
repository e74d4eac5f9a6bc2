//! Per-zone field extraction.
//!
//! Each zone kind has one [`ExtractZone`] variant; [`FieldExtractor`]
//! dispatches on the zone's label. Variants never fabricate values: a field
//! is emitted only when page text or geometry supports it, and every field
//! carries provenance back to the tokens and primitives it came from.
//!
//! Field confidence is `text_weight * mean token confidence +
//! geometry_weight * zone segmentation confidence`, scaled by a per-variant
//! factor and damped further for zones whose OCR call was degraded.

pub mod briefing;
pub mod comms;
pub mod minimums;
pub mod notes;
pub mod text;
pub mod views;

pub use briefing::BriefingExtractor;
pub use comms::CommExtractor;
pub use minimums::MinimumsExtractor;
pub use notes::{NotesExtractor, Passthrough};
pub use views::{PlanViewExtractor, ProfileViewExtractor};

use crate::segmenter::Segmentation;
use crate::text_locator::TokenArena;
use plate_core::{
    AnalyzerConfig, BBox, ExtractedField, FieldValue, Page, PrimitiveRef, Provenance, TextToken,
    TokenId, Zone, ZoneKind,
};
use text::TextLine;

/// Extra factor for zones whose text could not be recognized in time
const DEGRADED_FACTOR: f64 = 0.8;

/// One extraction variant
pub trait ExtractZone: Send + Sync {
    /// Extract every field this variant can read from `zone`
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField>;
}

/// Read-only page state the extractors share
#[derive(Debug)]
pub struct ExtractContext<'a> {
    pub page: &'a Page,
    pub arena: &'a TokenArena<'a>,
    pub text_weight: f64,
    pub geometry_weight: f64,
}

impl<'a> ExtractContext<'a> {
    #[must_use = "returns a new ExtractContext"]
    pub fn new(page: &'a Page, arena: &'a TokenArena<'a>, config: &AnalyzerConfig) -> Self {
        Self {
            page,
            arena,
            text_weight: config.text_weight,
            geometry_weight: config.geometry_weight,
        }
    }

    /// Tokens of the zone with their ids
    pub fn tokens(&self, zone: &'a Zone) -> impl Iterator<Item = (TokenId, &'a TextToken)> + 'a {
        self.arena.zone_tokens(zone)
    }

    /// Zone tokens grouped into reading-order lines
    #[must_use = "returns the text lines"]
    pub fn lines(&self, zone: &'a Zone) -> Vec<TextLine<'a>> {
        text::group_lines(self.tokens(zone))
    }

    /// Confidence of a field read from `token_ids` of `zone`
    #[must_use = "returns the field confidence"]
    pub fn confidence(&self, zone: &Zone, token_ids: &[TokenId], factor: f64) -> f64 {
        let text = text::mean_confidence(token_ids.iter().filter_map(|&id| self.arena.get(id)));
        let mut confidence =
            self.text_weight * text + self.geometry_weight * zone.segmentation_confidence;
        if zone.text_degraded {
            confidence *= DEGRADED_FACTOR;
        }
        (confidence * factor).clamp(0.0, 1.0)
    }

    /// Build a field grounded on `token_ids`
    #[must_use = "returns the extracted field"]
    pub fn field(
        &self,
        zone: &Zone,
        name: impl Into<String>,
        value: FieldValue,
        token_ids: Vec<TokenId>,
        factor: f64,
    ) -> ExtractedField {
        self.field_with_primitives(zone, name, value, token_ids, Vec::new(), factor)
    }

    /// Build a field grounded on tokens and primitives
    #[must_use = "returns the extracted field"]
    pub fn field_with_primitives(
        &self,
        zone: &Zone,
        name: impl Into<String>,
        value: FieldValue,
        token_ids: Vec<TokenId>,
        primitives: Vec<PrimitiveRef>,
        factor: f64,
    ) -> ExtractedField {
        let confidence = self.confidence(zone, &token_ids, factor);
        let token_boxes: Vec<BBox> = token_ids
            .iter()
            .filter_map(|&id| self.arena.get(id).map(|t| t.bbox))
            .chain(primitives.iter().filter_map(|p| self.primitive_bbox(*p)))
            .collect();
        let bbox = BBox::enclosing(&token_boxes).unwrap_or(zone.bbox);
        let provenance = Provenance::from_tokens(zone, token_ids, bbox).with_primitives(primitives);
        ExtractedField::new(name, value, confidence, provenance)
    }

    fn primitive_bbox(&self, primitive: PrimitiveRef) -> Option<BBox> {
        match primitive {
            PrimitiveRef::Line(i) => self.page.lines.get(i).map(|l| l.bbox()),
            PrimitiveRef::Rect(i) => self.page.rects.get(i).map(|r| r.bbox()),
        }
    }
}

/// Dispatches each zone to the variant for its kind
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldExtractor;

static MINIMUMS: MinimumsExtractor = MinimumsExtractor;
static COMMS: CommExtractor = CommExtractor;
static BRIEFING: BriefingExtractor = BriefingExtractor;
static PLAN_VIEW: PlanViewExtractor = PlanViewExtractor;
static PROFILE_VIEW: ProfileViewExtractor = ProfileViewExtractor;
static NOTES: NotesExtractor = NotesExtractor;
static PASSTHROUGH: Passthrough = Passthrough;

impl FieldExtractor {
    /// Variant that handles `kind`
    #[must_use = "returns the extraction variant"]
    pub fn variant(kind: ZoneKind) -> &'static dyn ExtractZone {
        match kind {
            ZoneKind::MinimumsTable => &MINIMUMS,
            ZoneKind::CommBox => &COMMS,
            ZoneKind::BriefingStrip => &BRIEFING,
            ZoneKind::PlanView => &PLAN_VIEW,
            ZoneKind::ProfileView => &PROFILE_VIEW,
            ZoneKind::Notes => &NOTES,
            ZoneKind::Unknown => &PASSTHROUGH,
        }
    }

    /// Fields of one zone
    #[must_use = "returns the extracted fields"]
    pub fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        Self::variant(zone.kind).extract(zone, ctx)
    }

    /// Fields of every zone, remainder last
    #[must_use = "returns the extracted fields"]
    pub fn extract_all(&self, segmentation: &Segmentation, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let mut fields = Vec::new();
        for zone in segmentation.all_zones() {
            let before = fields.len();
            fields.extend(self.extract(zone, ctx));
            log::trace!(
                "{} ({}) on page {}: {} fields",
                zone.id,
                zone.kind,
                ctx.page.id,
                fields.len() - before
            );
        }
        fields
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use plate_core::{BoundarySupport, ZoneId};

    /// Zone covering `bbox` that owns every page token
    pub fn zone_over(page: &Page, kind: ZoneKind, bbox: BBox) -> Zone {
        let mut zone = Zone::candidate(ZoneId(0), bbox, BoundarySupport::full(), 1.0);
        zone.kind = kind;
        zone.token_ids = (0..page.tokens.len()).map(TokenId).collect();
        zone
    }

    pub fn config() -> AnalyzerConfig {
        AnalyzerConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::zone_over;
    use super::*;

    #[test]
    fn test_confidence_blends_text_and_geometry() {
        let page = Page::new("p", 100.0, 100.0)
            .with_token(TextToken::recognized("x", BBox::new(0.0, 0.0, 10.0, 10.0), 0.5));
        let arena = TokenArena::new(&page);
        let config = AnalyzerConfig::default();
        let ctx = ExtractContext::new(&page, &arena, &config);
        let mut zone = zone_over(&page, ZoneKind::Notes, page.bbox());
        let expected = 0.7 * 0.5 + 0.3 * 1.0;
        assert!((ctx.confidence(&zone, &[TokenId(0)], 1.0) - expected).abs() < 1e-9);
        assert!((ctx.confidence(&zone, &[TokenId(0)], 0.5) - expected * 0.5).abs() < 1e-9);
        zone.text_degraded = true;
        assert!((ctx.confidence(&zone, &[TokenId(0)], 1.0) - expected * 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_field_provenance_bbox_covers_tokens() {
        let page = Page::new("p", 100.0, 100.0)
            .with_token(TextToken::new("TDZE", BBox::new(10.0, 10.0, 30.0, 20.0)))
            .with_token(TextToken::new("1007", BBox::new(35.0, 10.0, 55.0, 20.0)));
        let arena = TokenArena::new(&page);
        let config = AnalyzerConfig::default();
        let ctx = ExtractContext::new(&page, &arena, &config);
        let zone = zone_over(&page, ZoneKind::BriefingStrip, page.bbox());
        let field = ctx.field(
            &zone,
            "touchdown-zone-elevation",
            FieldValue::quantity(1007.0, plate_core::Unit::Feet),
            vec![TokenId(0), TokenId(1)],
            1.0,
        );
        assert_eq!(field.provenance.bbox, BBox::new(10.0, 10.0, 55.0, 20.0));
        assert!(field.provenance.is_grounded());
        assert!((field.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_zone_dispatches_to_passthrough() {
        let page = Page::new("p", 100.0, 100.0)
            .with_token(TextToken::new("hello", BBox::new(10.0, 10.0, 30.0, 20.0)));
        let arena = TokenArena::new(&page);
        let config = AnalyzerConfig::default();
        let ctx = ExtractContext::new(&page, &arena, &config);
        let zone = zone_over(&page, ZoneKind::Unknown, page.bbox());
        let fields = FieldExtractor.extract(&zone, &ctx);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "unknown.zone-0");
        assert!(fields[0].confidence < 0.5);
    }
}
