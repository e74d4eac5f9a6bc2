//! Notes and unclassified zones: raw text with low confidence.
//!
//! Notes additionally carry the non-standard takeoff (`T`) and alternate
//! (`A`) minimums icons in their left margin, required-equipment
//! statements and sometimes the missed-approach instructions. An icon flag
//! is only emitted when the icon is present; boxes without it stay silent
//! so several notes boxes never disagree about it.

use super::briefing::missed_approach;
use super::text::{self, TextLine};
use super::{ExtractContext, ExtractZone};
use once_cell::sync::Lazy;
use plate_core::{ExtractedField, FieldValue, TextToken, TokenId, Zone};
use regex::Regex;

/// Width of the icon margin at the left edge of a notes box
const LEFT_MARGIN: f64 = 12.0;
const BODY_FACTOR: f64 = 0.6;
const FLAG_FACTOR: f64 = 0.7;
const PASSTHROUGH_FACTOR: f64 = 0.3;

static EQUIPMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\brequired\b|\bRNP\s+APCH\b").expect("Invalid required equipment regex")
});

fn lines_text(lines: &[TextLine<'_>]) -> String {
    lines
        .iter()
        .map(TextLine::text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sentences naming required equipment, and the tokens they came from
fn equipment_statements(lines: &[TextLine<'_>]) -> Option<(String, Vec<TokenId>)> {
    let body = lines_text(lines);
    let statements: Vec<&str> = body
        .split('.')
        .map(str::trim)
        .filter(|s| EQUIPMENT.is_match(s))
        .collect();
    if statements.is_empty() {
        return None;
    }
    let text = format!("{}.", statements.join(". "));
    let ids = lines
        .iter()
        .flat_map(|l| l.tokens.iter())
        .filter(|(_, t)| {
            let word = t.text.trim().trim_end_matches('.');
            !word.is_empty() && statements.iter().any(|s| s.contains(word))
        })
        .map(|(id, _)| *id)
        .collect();
    Some((text, ids))
}

/// Reads notes boxes
#[derive(Debug, Default, Clone, Copy)]
pub struct NotesExtractor;

impl ExtractZone for NotesExtractor {
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let (margin, body): (Vec<(TokenId, &TextToken)>, Vec<(TokenId, &TextToken)>) = ctx
            .tokens(zone)
            .partition(|(_, t)| t.bbox.r <= zone.bbox.l + LEFT_MARGIN);
        let icon = |letter: &str| -> Vec<TokenId> {
            margin
                .iter()
                .filter(|(_, t)| t.text.trim() == letter)
                .map(|(id, _)| *id)
                .collect()
        };

        let mut fields = Vec::new();
        for (name, letter) in [
            ("nonstandard-takeoff-minimums", "T"),
            ("nonstandard-alternate-minimums", "A"),
        ] {
            let ids = icon(letter);
            if !ids.is_empty() {
                fields.push(ctx.field(zone, name, FieldValue::flag(true), ids, FLAG_FACTOR));
            }
        }

        let lines = text::group_lines(body);
        if let Some((text, ids)) = equipment_statements(&lines) {
            fields.push(ctx.field(zone, "required-equipment", FieldValue::text(text), ids, BODY_FACTOR));
        }
        if let Some((text, ids)) = missed_approach(zone, &lines) {
            fields.push(ctx.field(zone, "missed-approach", FieldValue::text(text), ids, BODY_FACTOR));
        }
        let body_text = lines_text(&lines);
        if !body_text.is_empty() {
            let ids = lines.iter().flat_map(TextLine::token_ids).collect();
            fields.push(ctx.field(
                zone,
                format!("notes.{}", zone.id),
                FieldValue::text(body_text),
                ids,
                BODY_FACTOR,
            ));
        }
        fields
    }
}

/// Surfaces the text of zones no other variant claims
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl ExtractZone for Passthrough {
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let lines = ctx.lines(zone);
        let body = lines_text(&lines);
        if body.is_empty() {
            return Vec::new();
        }
        let ids = lines.iter().flat_map(TextLine::token_ids).collect();
        vec![ctx.field(
            zone,
            format!("unknown.{}", zone.id),
            FieldValue::text(body),
            ids,
            PASSTHROUGH_FACTOR,
        )]
    }
}
