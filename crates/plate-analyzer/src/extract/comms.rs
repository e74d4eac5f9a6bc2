//! Communications box: facility names paired with VHF/UHF frequencies.

use super::text::{self, TextLine};
use super::{ExtractContext, ExtractZone};
use once_cell::sync::Lazy;
use plate_core::{ExtractedField, FieldValue, TextToken, TokenId, Zone};
use regex::Regex;
use rustc_hash::FxHashMap;

static FREQUENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:1[0-3]\d\.\d{1,3}|[23]\d{2}\.\d{1,2})$").expect("Invalid frequency regex")
});

const VHF: std::ops::RangeInclusive<f64> = 108.0..=137.0;
const UHF: std::ops::RangeInclusive<f64> = 225.0..=400.0;

type Tok<'a> = (TokenId, &'a TextToken);

/// Frequency in MHz if the token reads as one
#[must_use = "returns the frequency, if any"]
pub fn parse_frequency(text: &str) -> Option<f64> {
    let text = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(|c: char| !c.is_ascii_digit());
    if !FREQUENCY.is_match(text) {
        return None;
    }
    let mhz: f64 = text.parse().ok()?;
    (VHF.contains(&mhz) || UHF.contains(&mhz)).then_some(mhz)
}

fn facility_name(tokens: &[Tok<'_>]) -> String {
    text::join_tokens(tokens.iter().map(|(_, t)| *t))
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// (name tokens, frequency token, MHz) in reading order
fn pair_lines<'a>(lines: Vec<TextLine<'a>>) -> Vec<(Vec<Tok<'a>>, Tok<'a>, f64)> {
    let mut pairs = Vec::new();
    let mut pending: Vec<Tok<'a>> = Vec::new();
    for line in lines {
        let mut name: Vec<Tok<'a>> = Vec::new();
        let mut last_name: Vec<Tok<'a>> = Vec::new();
        let mut found = false;
        for tok in line.tokens {
            let Some(mhz) = parse_frequency(&tok.1.text) else {
                name.push(tok);
                continue;
            };
            let owner = if !name.is_empty() {
                std::mem::take(&mut name)
            } else if !last_name.is_empty() {
                last_name.clone()
            } else {
                pending.clone()
            };
            if !owner.is_empty() {
                pairs.push((owner.clone(), tok, mhz));
            }
            last_name = owner;
            found = true;
        }
        if found {
            pending = name;
        } else {
            pending.extend(name);
        }
    }
    pairs
}

/// Reads communication frequencies
#[derive(Debug, Default, Clone, Copy)]
pub struct CommExtractor;

impl ExtractZone for CommExtractor {
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let tokens: Vec<Tok<'_>> = ctx.tokens(zone).collect();
        let groups: Vec<Vec<Tok<'_>>> = match zone.sub_grid.as_ref().filter(|_| zone.has_sub_grid()) {
            Some(grid) => grid
                .cells
                .iter()
                .map(|cell| {
                    tokens
                        .iter()
                        .copied()
                        .filter(|(_, t)| cell.contains_point(&t.bbox.center(), 0.5))
                        .collect()
                })
                .collect(),
            None => vec![tokens],
        };

        let mut seen: FxHashMap<String, usize> = FxHashMap::default();
        let mut fields = Vec::new();
        for group in groups {
            for (name_tokens, freq, mhz) in pair_lines(text::group_lines(group)) {
                let facility = facility_name(&name_tokens);
                let slug = text::slugify(&facility);
                if slug.is_empty() {
                    continue;
                }
                let count = seen.entry(slug.clone()).or_insert(0);
                *count += 1;
                let name = if *count == 1 {
                    format!("comm.{slug}")
                } else {
                    format!("comm.{slug}.{count}")
                };
                let mut token_ids: Vec<TokenId> = name_tokens.iter().map(|(id, _)| *id).collect();
                token_ids.push(freq.0);
                fields.push(ctx.field(zone, name, FieldValue::Frequency { facility, mhz }, token_ids, 1.0));
            }
        }
        log::debug!("{} on page {}: {} frequencies", zone.id, ctx.page.id, fields.len());
        fields
    }
}
