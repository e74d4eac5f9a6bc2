//! Per-page orchestration.
//!
//! [`PlateAnalyzer`] runs the stages for one page strictly in sequence:
//!
//! ```text
//! Page -> PrimitiveExtractor -> Segmenter -> TextLocator -> ZoneClassifier
//!      -> FieldExtractor -> RecordAssembler -> ApproachProcedure
//! ```
//!
//! All intermediate state (primitives, token arena, zones, diagnostics)
//! lives in a [`PageRun`] owned by the call and dropped when the record is
//! returned. Batches run pages in parallel with no shared mutable state.

use crate::assembler::RecordAssembler;
use crate::classifier::ZoneClassifier;
use crate::extract::text::{self, TextLine};
use crate::extract::{ExtractContext, FieldExtractor};
use crate::primitives::{PrimitiveExtractor, PrimitiveSet};
use crate::segmenter::{Segmentation, Segmenter, SegmenterConfig};
use crate::text_locator::{NoOcr, TextCollaborator, TextLocator, TokenArena};
use plate_core::{
    find_title, AnalyzerConfig, ApproachProcedure, Diagnostic, ExtractedField, FieldValue, Page,
    PlateError, ProcedureType, RecordParts, Result, TextToken, TokenId, Zone,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Confidence factor of fields read from the plate title
const TITLE_FACTOR: f64 = 0.9;
/// Largest gap between the title and the airport line, in title line heights
const AIRPORT_LINE_GAP: f64 = 2.0;

/// Shared flag a caller sets to stop one page between stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use = "returns a new CancelToken"]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use = "returns whether cancellation was requested"]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Analysis stage, for logging and cancellation checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Primitives,
    Segmentation,
    Text,
    Classification,
    Extraction,
    Assembly,
}

/// Page-local state of one analysis
struct PageRun<'p> {
    page: &'p Page,
    cancel: Option<&'p CancelToken>,
    primitives: PrimitiveSet,
    arena: TokenArena<'p>,
    segmentation: Segmentation,
    diagnostics: Vec<Diagnostic>,
}

impl PageRun<'_> {
    fn checkpoint(&self, stage: Stage) -> Result<()> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            log::debug!("Page {}: cancelled before {:?}", self.page.id, stage);
            return Err(PlateError::Cancelled {
                page_id: self.page.id.clone(),
            });
        }
        Ok(())
    }
}

/// Runs the full pipeline over pages
#[derive(Debug, Clone)]
pub struct PlateAnalyzer {
    config: AnalyzerConfig,
    primitives: PrimitiveExtractor,
    segmenter: Segmenter,
    locator: TextLocator,
    classifier: ZoneClassifier,
    extractor: FieldExtractor,
    assembler: RecordAssembler,
}

impl PlateAnalyzer {
    /// Build an analyzer without an OCR collaborator.
    ///
    /// # Errors
    ///
    /// [`PlateError::ConfigError`] when the configuration fails validation
    /// or names unknown classifier kinds/features.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let classifier = ZoneClassifier::from_config(&config)
            .map_err(|reason| PlateError::ConfigError { reason })?;
        Ok(Self {
            primitives: PrimitiveExtractor::new(config.line_merge_tolerance),
            segmenter: Segmenter::new(SegmenterConfig::from(&config)),
            locator: TextLocator::new(Arc::new(NoOcr), config.ocr_policy, config.ocr_timeout()),
            classifier,
            extractor: FieldExtractor,
            assembler: RecordAssembler::from_config(&config),
            config,
        })
    }

    /// Use `collaborator` for text recognition
    #[must_use = "returns the analyzer with the collaborator attached"]
    pub fn with_collaborator(mut self, collaborator: Arc<dyn TextCollaborator>) -> Self {
        self.locator = TextLocator::new(
            collaborator,
            self.config.ocr_policy,
            self.config.ocr_timeout(),
        );
        self
    }

    #[inline]
    #[must_use = "returns the analyzer configuration"]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze one page.
    ///
    /// # Errors
    ///
    /// [`PlateError::InvalidPage`] for unusable page dimensions and
    /// [`PlateError::SegmentationFailed`] when no zone survives.
    pub fn analyze(&self, page: &Page) -> Result<ApproachProcedure> {
        self.run(page, None)
    }

    /// Analyze one page, checking `cancel` between stages.
    ///
    /// # Errors
    ///
    /// As [`analyze`](Self::analyze), plus [`PlateError::Cancelled`].
    pub fn analyze_with_cancel(&self, page: &Page, cancel: &CancelToken) -> Result<ApproachProcedure> {
        self.run(page, Some(cancel))
    }

    /// Analyze pages in parallel; one outcome per page, in input order
    pub fn analyze_batch(&self, pages: &[Page]) -> Vec<Result<ApproachProcedure>> {
        log::debug!("Analyzing batch of {} pages", pages.len());
        pages.par_iter().map(|page| self.analyze(page)).collect()
    }

    fn run<'p>(&self, page: &'p Page, cancel: Option<&'p CancelToken>) -> Result<ApproachProcedure> {
        page.validate()?;

        let mut run = PageRun {
            page,
            cancel,
            primitives: PrimitiveSet::default(),
            arena: TokenArena::new(page),
            segmentation: Segmentation::default(),
            diagnostics: Vec::new(),
        };

        run.checkpoint(Stage::Primitives)?;
        run.primitives = self.primitives.extract(page);
        run.diagnostics.extend(run.primitives.diagnostic());
        log::debug!("Page {}: {} primitives", page.id, run.primitives.len());

        run.checkpoint(Stage::Segmentation)?;
        run.segmentation = self.segmenter.segment(page, &run.primitives)?;
        run.diagnostics.append(&mut run.segmentation.diagnostics);

        run.checkpoint(Stage::Text)?;
        let located = self.locator.locate(page, &mut run.segmentation, &mut run.arena);
        run.diagnostics.extend(located);

        run.checkpoint(Stage::Classification)?;
        let classified = self.classifier.classify(page, &mut run.segmentation, &run.arena);
        run.diagnostics.extend(classified);

        run.checkpoint(Stage::Extraction)?;
        let (procedure_type, fields) = {
            let ctx = ExtractContext::new(page, &run.arena, &self.config);
            let (procedure_type, mut fields) = title_fields(&run.segmentation, &ctx);
            fields.extend(self.extractor.extract_all(&run.segmentation, &ctx));
            (procedure_type, fields)
        };
        log::debug!(
            "Page {}: {} procedure, {} fields from {} zones",
            page.id,
            procedure_type,
            fields.len(),
            run.segmentation.zone_count()
        );

        run.checkpoint(Stage::Assembly)?;
        let template = self.config.template(procedure_type);
        let PageRun {
            arena, diagnostics, ..
        } = run;
        let parts = RecordParts {
            page_id: Some(page.id.clone()),
            procedure_type,
            diagnostics,
            page_token_count: arena.page_len(),
            recognized_tokens: arena.into_recognized(),
            ..RecordParts::default()
        };
        Ok(self.assembler.assemble(&page.id, parts, fields, &template))
    }
}

/// The airport line under the title: the next line of the same zone that
/// starts within two title heights, restricted to tokens under the title.
fn airport_line<'a>(title: &TextLine<'a>, below: &[(&Zone, TextLine<'a>)], zone: &Zone) -> Option<(String, Vec<TokenId>)> {
    let max_gap = AIRPORT_LINE_GAP * title.height();
    let (_, line) = below
        .iter()
        .take_while(|(z, _)| z.id == zone.id)
        .find(|(_, line)| line.bbox.t - title.bbox.b <= max_gap)?;
    let tokens: Vec<&(TokenId, &TextToken)> = line
        .tokens
        .iter()
        .filter(|(_, t)| t.bbox.r > title.bbox.l && t.bbox.l < title.bbox.r)
        .collect();
    if tokens.is_empty() {
        return None;
    }
    let name = text::join_tokens(tokens.iter().map(|(_, t)| *t));
    Some((name, tokens.iter().map(|(id, _)| *id).collect()))
}

/// Procedure type, runway, approach name and airport name from the plate
/// title, with provenance.
///
/// Lines are searched zone by zone in reading order so the title's tokens
/// stay attached to the zone that holds them.
fn title_fields(segmentation: &Segmentation, ctx: &ExtractContext<'_>) -> (ProcedureType, Vec<ExtractedField>) {
    let lines: Vec<(&Zone, TextLine<'_>)> = segmentation
        .all_zones()
        .flat_map(|zone| {
            text::group_lines(ctx.arena.zone_tokens(zone))
                .into_iter()
                .map(move |line| (zone, line))
        })
        .collect();
    let texts: Vec<String> = lines.iter().map(|(_, line)| line.text()).collect();
    let Some((index, info)) = find_title(texts.iter().map(String::as_str)) else {
        log::debug!("Page {}: no procedure title found", ctx.page.id);
        return (ProcedureType::Other, Vec::new());
    };
    let (zone, line) = &lines[index];
    let ids: Vec<TokenId> = line.token_ids();
    let procedure_type = info.primary();
    let mut fields = vec![
        ctx.field(
            zone,
            "procedure-type",
            FieldValue::text(procedure_type.to_string()),
            ids.clone(),
            TITLE_FACTOR,
        ),
        ctx.field(zone, "approach-name", FieldValue::text(&texts[index]), ids.clone(), TITLE_FACTOR),
    ];
    if let Some((airport, airport_ids)) = airport_line(line, &lines[index + 1..], zone) {
        fields.push(ctx.field(zone, "airport-name", FieldValue::text(airport), airport_ids, TITLE_FACTOR));
    }
    if let Some(runway) = info.runway {
        let runway_ids: Vec<TokenId> = line
            .tokens
            .iter()
            .filter(|(_, t)| {
                let upper = t.text.to_ascii_uppercase();
                upper.contains("RWY") || upper.contains(runway.as_str())
            })
            .map(|(id, _)| *id)
            .collect();
        let runway_ids = if runway_ids.is_empty() { ids } else { runway_ids };
        fields.push(ctx.field(zone, "runway", FieldValue::text(runway), runway_ids, TITLE_FACTOR));
    }
    (procedure_type, fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::{BBox, RectPrimitive};

    fn boxed_page() -> Page {
        Page::new("p", 600.0, 800.0)
            .with_rect(RectPrimitive::stroked(BBox::new(10.0, 10.0, 590.0, 60.0)))
            .with_rect(RectPrimitive::stroked(BBox::new(10.0, 70.0, 590.0, 790.0)))
            .with_token(TextToken::new("ILS OR LOC RWY 19L", BBox::new(200.0, 20.0, 400.0, 32.0)))
    }

    #[test]
    fn test_title_sets_procedure_type() {
        let analyzer = PlateAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let record = analyzer.analyze(&boxed_page()).unwrap();
        assert_eq!(record.procedure_type(), ProcedureType::Ils);
        assert_eq!(record.value("runway"), Some(&FieldValue::text("19L")));
        let title = record.field("procedure-type").unwrap();
        assert_eq!(title.provenance.token_ids, vec![TokenId(0)]);
        assert!(record.missing_fields().contains(&"airport-elevation".to_string()));
    }

    #[test]
    fn test_title_reads_approach_and_airport_names() {
        let page = boxed_page()
            .with_token(TextToken::new("APP CRS 207°", BBox::new(20.0, 36.0, 90.0, 46.0)))
            .with_token(TextToken::new("PEACHTREE DEKALB (PDK)", BBox::new(210.0, 36.0, 390.0, 46.0)));
        let record = PlateAnalyzer::new(AnalyzerConfig::default())
            .unwrap()
            .analyze(&page)
            .unwrap();
        assert_eq!(
            record.value("approach-name"),
            Some(&FieldValue::text("ILS OR LOC RWY 19L"))
        );
        let airport = record.field("airport-name").unwrap();
        assert_eq!(airport.value, FieldValue::text("PEACHTREE DEKALB (PDK)"));
        assert_eq!(airport.provenance.token_ids, vec![TokenId(2)]);
    }

    #[test]
    fn test_title_without_airport_line() {
        let record = PlateAnalyzer::new(AnalyzerConfig::default())
            .unwrap()
            .analyze(&boxed_page())
            .unwrap();
        assert!(record.field("approach-name").is_some());
        assert!(record.field("airport-name").is_none());
    }

    #[test]
    fn test_cancelled_before_start() {
        let analyzer = PlateAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = analyzer.analyze_with_cancel(&boxed_page(), &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.page_id().map(|p| p.as_str()), Some("p"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalyzerConfig {
            text_weight: 2.0,
            ..AnalyzerConfig::default()
        };
        assert!(PlateAnalyzer::new(config).unwrap_err().is_config_error());
    }

    #[test]
    fn test_unknown_scoring_feature_rejected() {
        let mut config = AnalyzerConfig::default();
        config
            .scoring
            .entry("notes".to_string())
            .or_default()
            .insert("font_size".to_string(), 1.0);
        assert!(PlateAnalyzer::new(config).unwrap_err().is_config_error());
    }

    #[test]
    fn test_invalid_page_rejected() {
        let analyzer = PlateAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let err = analyzer.analyze(&Page::new("bad", 0.0, 800.0)).unwrap_err();
        assert!(matches!(err, PlateError::InvalidPage { .. }));
    }
}
