//! Briefing strip: labeled values and missed-approach instructions.
//!
//! A value is the token right of its label on the same line, or the first
//! token below the label; with a sub-grid both must sit in the same cell.

use super::text::{self, TextLine};
use super::{ExtractContext, ExtractZone};
use once_cell::sync::Lazy;
use plate_core::{BBox, ExtractedField, FieldValue, TextToken, TokenId, Unit, Zone};
use regex::Regex;

static APP_CRS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bAPP\s*CRS\b").expect("Invalid approach course regex"));
static APT_ELEV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bApt\.?\s*Elev\b").expect("Invalid airport elevation regex"));
static TDZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bTDZE\b").expect("Invalid TDZE regex"));
static RWY_LDG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bRwy\s*[lI]dg\b").expect("Invalid landing distance regex"));
static MISSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bMISSED\s+APPROACH\b:?").expect("Invalid missed approach regex"));

type Tok<'a> = (TokenId, &'a TextToken);

/// How a labeled value is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    /// Degrees magnetic, or text when not numeric (DME arcs, NA)
    Course,
    Feet,
}

fn labels() -> [(&'static Regex, &'static str, ValueKind); 4] {
    [
        (&*APP_CRS, "approach-course", ValueKind::Course),
        (&*APT_ELEV, "airport-elevation", ValueKind::Feet),
        (&*TDZE, "touchdown-zone-elevation", ValueKind::Feet),
        (&*RWY_LDG, "runway-landing-distance", ValueKind::Feet),
    ]
}

/// A label match on one line
#[derive(Debug)]
struct LabelHit<'a> {
    line: usize,
    /// Index of the last token touched by the label
    last: usize,
    tokens: Vec<Tok<'a>>,
    /// Text of the last label token after the label itself
    remainder: String,
    bbox: BBox,
}

fn find_label<'a>(lines: &[TextLine<'a>], pattern: &Regex) -> Option<LabelHit<'a>> {
    for (index, line) in lines.iter().enumerate() {
        let mut joined = String::new();
        let mut spans = Vec::with_capacity(line.tokens.len());
        for (_, token) in &line.tokens {
            if !joined.is_empty() {
                joined.push(' ');
            }
            let start = joined.len();
            joined.push_str(token.text.trim());
            spans.push((start, joined.len()));
        }
        let Some(m) = pattern.find(&joined) else {
            continue;
        };
        let touched: Vec<usize> = spans
            .iter()
            .enumerate()
            .filter(|(_, (s, e))| *s < m.end() && *e > m.start())
            .map(|(i, _)| i)
            .collect();
        let (&first, &last) = (touched.first()?, touched.last()?);
        let tokens: Vec<Tok<'a>> = line.tokens[first..=last].to_vec();
        let bbox = BBox::enclosing(tokens.iter().map(|(_, t)| &t.bbox))?;
        let remainder = joined[m.end()..spans[last].1].trim().to_string();
        return Some(LabelHit {
            line: index,
            last,
            tokens,
            remainder,
            bbox,
        });
    }
    None
}

/// Sub-grid cell index of a box center, if the zone has one
fn cell_of(zone: &Zone, bbox: &BBox) -> Option<usize> {
    let grid = zone.sub_grid.as_ref()?;
    let center = bbox.center();
    grid.cells.iter().position(|c| c.contains_point(&center, 0.5))
}

/// Value tokens for a label hit: right on the same line, else directly below
fn value_tokens<'a>(zone: &Zone, lines: &[TextLine<'a>], hit: &LabelHit<'a>, whole_line: bool) -> Vec<Tok<'a>> {
    let cell = cell_of(zone, &hit.bbox);
    let same_cell = |t: &TextToken| cell_of(zone, &t.bbox) == cell;

    let line = &lines[hit.line];
    let right: Vec<Tok<'a>> = line.tokens[hit.last + 1..]
        .iter()
        .copied()
        .take_while(|(_, t)| same_cell(*t))
        .collect();
    if let Some(first) = right.first() {
        return if whole_line { right } else { vec![*first] };
    }

    let reach = 2.0 * line.height().max(1.0);
    lines[hit.line + 1..]
        .iter()
        .take_while(|l| l.bbox.t - hit.bbox.b <= reach)
        .flat_map(|l| l.tokens.iter().copied())
        .find(|(_, t)| {
            same_cell(*t) && t.bbox.l < hit.bbox.r && t.bbox.r > hit.bbox.l
        })
        .map(|tok| vec![tok])
        .unwrap_or_default()
}

fn labeled_field(
    zone: &Zone,
    ctx: &ExtractContext<'_>,
    lines: &[TextLine<'_>],
    pattern: &Regex,
    name: &str,
    kind: ValueKind,
) -> Option<ExtractedField> {
    let hit = find_label(lines, pattern)?;
    let (value_text, value_tokens) = if hit.remainder.is_empty() {
        let tokens = value_tokens(zone, lines, &hit, kind == ValueKind::Course);
        let text = text::join_tokens(tokens.iter().map(|(_, t)| *t));
        (text, tokens)
    } else {
        (hit.remainder.clone(), Vec::new())
    };
    if value_text.is_empty() {
        return None;
    }
    let value = match (kind, text::leading_number(&value_text)) {
        (ValueKind::Course, Some(deg)) => FieldValue::quantity(deg, Unit::DegreesMagnetic),
        (ValueKind::Course, None) => FieldValue::text(value_text),
        (ValueKind::Feet, Some(ft)) => FieldValue::quantity(ft, Unit::Feet),
        (ValueKind::Feet, None) => return None,
    };
    let token_ids = hit
        .tokens
        .iter()
        .chain(&value_tokens)
        .map(|(id, _)| *id)
        .collect();
    Some(ctx.field(zone, name, value, token_ids, 1.0))
}

/// Missed-approach instructions: the marker's line remainder and the lines
/// after it, within the marker's cell or column
pub(crate) fn missed_approach<'a>(zone: &Zone, lines: &[TextLine<'a>]) -> Option<(String, Vec<TokenId>)> {
    let hit = find_label(lines, &MISSED)?;
    let cell = cell_of(zone, &hit.bbox);
    let in_scope = |t: &TextToken| match cell {
        Some(_) => cell_of(zone, &t.bbox) == cell,
        None => t.bbox.l >= hit.bbox.l - 2.0,
    };

    let mut parts: Vec<&str> = Vec::new();
    let mut ids: Vec<TokenId> = hit.tokens.iter().map(|(id, _)| *id).collect();
    if !hit.remainder.is_empty() {
        parts.push(&hit.remainder);
    }
    let following = lines[hit.line].tokens[hit.last + 1..]
        .iter()
        .chain(lines[hit.line + 1..].iter().flat_map(|l| l.tokens.iter()));
    for (id, token) in following {
        if in_scope(*token) {
            parts.push(token.text.trim());
            ids.push(*id);
        }
    }
    let text = parts.join(" ").trim().to_string();
    (!text.is_empty()).then_some((text, ids))
}

/// Reads the briefing strip
#[derive(Debug, Default, Clone, Copy)]
pub struct BriefingExtractor;

impl ExtractZone for BriefingExtractor {
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let lines = ctx.lines(zone);
        let mut fields: Vec<ExtractedField> = labels()
            .iter()
            .filter_map(|(pattern, name, kind)| labeled_field(zone, ctx, &lines, pattern, name, *kind))
            .collect();
        if let Some((text, ids)) = missed_approach(zone, &lines) {
            fields.push(ctx.field(zone, "missed-approach", FieldValue::text(text), ids, 1.0));
        }
        log::debug!("{} on page {}: {} briefing fields", zone.id, ctx.page.id, fields.len());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{config, zone_over};
    use super::*;
    use crate::text_locator::TokenArena;
    use plate_core::{Page, SubGrid, ZoneKind};

    fn strip() -> Page {
        // | APP CRS | Rwy Idg 7502 | MISSED APPROACH: Climb |
        // |  097°   | TDZE 1007    | to 3000 direct LIMBE   |
        // |         | Apt Elev 1013|                        |
        Page::new("p", 600.0, 800.0)
            .with_token(TextToken::new("APP", BBox::new(10.0, 10.0, 30.0, 20.0)))
            .with_token(TextToken::new("CRS", BBox::new(32.0, 10.0, 52.0, 20.0)))
            .with_token(TextToken::new("097°", BBox::new(15.0, 24.0, 45.0, 34.0)))
            .with_token(TextToken::new("Rwy", BBox::new(110.0, 10.0, 130.0, 20.0)))
            .with_token(TextToken::new("Idg", BBox::new(132.0, 10.0, 150.0, 20.0)))
            .with_token(TextToken::new("7502", BBox::new(155.0, 10.0, 180.0, 20.0)))
            .with_token(TextToken::new("TDZE", BBox::new(110.0, 24.0, 135.0, 34.0)))
            .with_token(TextToken::new("1007", BBox::new(155.0, 24.0, 180.0, 34.0)))
            .with_token(TextToken::new("Apt Elev", BBox::new(110.0, 38.0, 150.0, 48.0)))
            .with_token(TextToken::new("1013", BBox::new(155.0, 38.0, 180.0, 48.0)))
            .with_token(TextToken::new("MISSED APPROACH:", BBox::new(210.0, 10.0, 290.0, 20.0)))
            .with_token(TextToken::new("Climb", BBox::new(292.0, 10.0, 320.0, 20.0)))
            .with_token(TextToken::new("to 3000 direct LIMBE", BBox::new(210.0, 24.0, 320.0, 34.0)))
    }

    fn cells() -> SubGrid {
        SubGrid::from_cells(
            vec![
                BBox::new(0.0, 0.0, 100.0, 50.0),
                BBox::new(100.0, 0.0, 200.0, 50.0),
                BBox::new(200.0, 0.0, 400.0, 50.0),
            ],
            0.5,
        )
    }

    #[test]
    fn test_labeled_values_in_cells() {
        let page = strip();
        let arena = TokenArena::new(&page);
        let config = config();
        let ctx = ExtractContext::new(&page, &arena, &config);
        let mut zone = zone_over(&page, ZoneKind::BriefingStrip, BBox::new(0.0, 0.0, 400.0, 50.0));
        zone.sub_grid = Some(cells());
        let fields = BriefingExtractor.extract(&zone, &ctx);
        let get = |name: &str| fields.iter().find(|f| f.name == name).map(|f| f.value.clone());

        assert_eq!(get("approach-course"), Some(FieldValue::quantity(97.0, Unit::DegreesMagnetic)));
        assert_eq!(get("runway-landing-distance"), Some(FieldValue::quantity(7502.0, Unit::Feet)));
        assert_eq!(get("touchdown-zone-elevation"), Some(FieldValue::quantity(1007.0, Unit::Feet)));
        assert_eq!(get("airport-elevation"), Some(FieldValue::quantity(1013.0, Unit::Feet)));
        assert_eq!(
            get("missed-approach"),
            Some(FieldValue::text("Climb to 3000 direct LIMBE"))
        );
    }

    #[test]
    fn test_non_numeric_course_is_text() {
        let page = Page::new("p", 600.0, 800.0)
            .with_token(TextToken::new("APP CRS", BBox::new(10.0, 10.0, 50.0, 20.0)))
            .with_token(TextToken::new("DME", BBox::new(55.0, 10.0, 75.0, 20.0)))
            .with_token(TextToken::new("ARC", BBox::new(78.0, 10.0, 95.0, 20.0)));
        let arena = TokenArena::new(&page);
        let config = config();
        let ctx = ExtractContext::new(&page, &arena, &config);
        let zone = zone_over(&page, ZoneKind::BriefingStrip, page.bbox());
        let fields = BriefingExtractor.extract(&zone, &ctx);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].value, FieldValue::text("DME ARC"));
        assert_eq!(fields[0].provenance.token_ids.len(), 3);
    }

    #[test]
    fn test_value_inside_label_token() {
        let page = Page::new("p", 600.0, 800.0)
            .with_token(TextToken::new("TDZE 1007", BBox::new(10.0, 10.0, 60.0, 20.0)));
        let arena = TokenArena::new(&page);
        let config = config();
        let ctx = ExtractContext::new(&page, &arena, &config);
        let zone = zone_over(&page, ZoneKind::BriefingStrip, page.bbox());
        let fields = BriefingExtractor.extract(&zone, &ctx);
        assert_eq!(fields[0].name, "touchdown-zone-elevation");
        assert_eq!(fields[0].value, FieldValue::quantity(1007.0, Unit::Feet));
    }

    #[test]
    fn test_label_without_value_is_not_fabricated() {
        let page = Page::new("p", 600.0, 800.0)
            .with_token(TextToken::new("Apt Elev", BBox::new(10.0, 10.0, 50.0, 20.0)));
        let arena = TokenArena::new(&page);
        let config = config();
        let ctx = ExtractContext::new(&page, &arena, &config);
        let zone = zone_over(&page, ZoneKind::BriefingStrip, page.bbox());
        assert!(BriefingExtractor.extract(&zone, &ctx).is_empty());
    }
}
