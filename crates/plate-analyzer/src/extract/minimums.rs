//! Minimums table: one value per (approach line, aircraft category).
//!
//! With a sub-grid the table is read cell by cell: the row holding the
//! CATEGORY header fixes the A–E columns, every later row pairs its label
//! cell with the value cells, and a value cell spreads over each category
//! column whose center it spans. Without a sub-grid the same is done on
//! text lines, with value runs assigned to the nearest category column.

use super::text::{self, SMALL_GLYPH_RATIO};
use super::{ExtractContext, ExtractZone};
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use plate_core::{BBox, ExtractedField, FieldValue, MinimumsLine, SubGrid, TextToken, TokenId, Visibility, Zone};
use regex::Regex;

/// Cells whose tops differ by less than this share a row
const ROW_TOLERANCE: f64 = 1.0;

static VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<alt>\d{3,5})\s*
        (?:
            -\s*(?P<vis>\d+\s+\d+/\d+ | \d*\s*[½¼¾⅛⅜⅝⅞⅓⅔] | \d+/\d+ | \d+)
            | /\s*(?P<rvr>\d{2,4})
        )?
        (?:\s+(?P<hat>\d{2,4}))?",
    )
    .expect("Invalid minimums value regex")
});

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("Invalid parenthetical regex"));

type Tok<'a> = (TokenId, &'a TextToken);

/// Parsed value cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimumsValue {
    pub altitude: Option<f64>,
    pub visibility: Option<Visibility>,
    pub height_above: Option<f64>,
    pub authorized: bool,
}

/// Parse `1212-1 261`, `1212/24 250`, `1560-1½ 571` or `NA`
#[must_use = "returns the parsed value, if any"]
pub fn parse_value(text: &str) -> Option<MinimumsValue> {
    let text = text.trim();
    if text.split_whitespace().next().is_some_and(|w| w.eq_ignore_ascii_case("NA")) {
        return Some(MinimumsValue {
            altitude: None,
            visibility: None,
            height_above: None,
            authorized: false,
        });
    }
    let caps = VALUE.captures(text)?;
    let altitude = caps.name("alt").and_then(|m| m.as_str().parse::<f64>().ok());
    let visibility = if let Some(vis) = caps.name("vis") {
        text::parse_fraction(vis.as_str()).map(Visibility::StatuteMiles)
    } else if let Some(rvr) = caps.name("rvr") {
        rvr.as_str()
            .parse::<u32>()
            .ok()
            .map(|hundreds| if hundreds < 100 { hundreds * 100 } else { hundreds })
            .map(Visibility::RvrFeet)
    } else {
        None
    };
    let height_above = caps.name("hat").and_then(|m| m.as_str().parse::<f64>().ok());
    Some(MinimumsValue {
        altitude,
        visibility,
        height_above,
        authorized: true,
    })
}

/// Approach line label of a table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLabel {
    pub line: String,
    pub condition: Option<String>,
    pub expanded_radius: bool,
}

impl LineLabel {
    /// Field name stem, e.g. `minimums.lnav-vnav`
    #[must_use = "returns the field name stem"]
    pub fn field_stem(&self) -> String {
        let mut stem = format!("minimums.{}", text::slugify(&self.line));
        if self.expanded_radius {
            stem.push_str("-expanded");
        }
        if let Some(condition) = &self.condition {
            let slug = text::slugify(condition);
            if !slug.is_empty() {
                stem.push('.');
                stem.push_str(&slug);
            }
        }
        stem
    }
}

/// Normalize a row label: drop the DA/MDA suffix, rejoin LNAV/VNAV, detect
/// the circling expanded-radius marker and lift a parenthetical condition.
#[must_use = "returns the parsed label, if any"]
pub fn parse_label(text: &str) -> Option<LineLabel> {
    let condition = PARENTHETICAL
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|c| !c.is_empty());
    let bare = PARENTHETICAL.replace_all(text, " ").to_uppercase();
    let words: Vec<&str> = bare
        .split_whitespace()
        .filter(|w| !matches!(*w, "DA" | "MDA" | "DA/MDA"))
        .collect();
    if words.is_empty() || words.iter().any(|w| *w == "CATEGORY") {
        return None;
    }
    let joined = words.join(" ");
    let (line, expanded_radius) = if joined.contains("LNAV") && joined.contains("VNAV") {
        ("LNAV/VNAV".to_string(), false)
    } else if joined.contains("CIRCLING") {
        let marker = words.iter().any(|w| *w == "C");
        ("CIRCLING".to_string(), marker)
    } else {
        (joined.trim_matches('/').trim().to_string(), false)
    };
    if line.is_empty() {
        return None;
    }
    Some(LineLabel {
        line,
        condition,
        expanded_radius,
    })
}

/// Value text of a cell, rewriting superscript-sized digit pairs as `n/d`
fn value_text(tokens: &[Tok<'_>]) -> String {
    let reference = tokens.iter().map(|(_, t)| t.bbox.height()).fold(0.0, f64::max);
    let mut parts: Vec<String> = Vec::new();
    let mut small: Vec<&str> = Vec::new();
    for (_, token) in tokens {
        let text = token.text.trim();
        let is_small = token.bbox.height() < SMALL_GLYPH_RATIO * reference
            && !text.is_empty()
            && text.chars().all(|c| c.is_ascii_digit() || c == '/');
        if is_small && !text.contains('/') {
            small.push(text);
            if let [n, d] = small.as_slice() {
                parts.push(format!("{n}/{d}"));
                small.clear();
            }
            continue;
        }
        parts.extend(small.drain(..).map(str::to_string));
        parts.push(text.to_string());
    }
    parts.extend(small.into_iter().map(str::to_string));
    parts.join(" ")
}

fn reading_order<'a>(tokens: impl IntoIterator<Item = Tok<'a>>) -> Vec<Tok<'a>> {
    text::group_lines(tokens)
        .into_iter()
        .flat_map(|line| line.tokens)
        .collect()
}

fn cell_text(tokens: &[Tok<'_>]) -> String {
    text::join_tokens(reading_order(tokens.iter().copied()).iter().map(|(_, t)| *t))
}

fn single_category(text: &str) -> Option<char> {
    let mut chars = text.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c @ 'A'..='E'), None) => Some(c),
        _ => None,
    }
}

/// One table row: label tokens, value runs and the run read for each category
#[derive(Debug, Default)]
struct Row<'a> {
    label: Vec<Tok<'a>>,
    runs: Vec<Vec<Tok<'a>>>,
    by_category: Vec<Option<usize>>,
}

/// Category letters with the horizontal span of their header
#[derive(Debug)]
struct Columns {
    letters: Vec<char>,
    spans: Vec<(f64, f64)>,
}

impl Columns {
    fn centers(&self) -> impl Iterator<Item = f64> + '_ {
        self.spans.iter().map(|(l, r)| (l + r) / 2.0)
    }

    fn left(&self) -> f64 {
        self.spans.first().map_or(0.0, |s| s.0)
    }
}

fn read_sub_grid<'a>(grid: &SubGrid, tokens: &[Tok<'a>]) -> Option<(Columns, Vec<Row<'a>>)> {
    let mut cells: Vec<(BBox, Vec<Tok<'a>>)> = grid.cells.iter().map(|c| (*c, Vec::new())).collect();
    for &(id, token) in tokens {
        let center = token.bbox.center();
        if let Some(cell) = cells.iter_mut().find(|(b, _)| b.contains_point(&center, 0.5)) {
            cell.1.push((id, token));
        }
    }

    let mut rows: Vec<Vec<(BBox, Vec<Tok<'a>>)>> = Vec::new();
    for (bbox, toks) in cells {
        match rows.last_mut() {
            Some(row) if row.first().is_some_and(|(b, _)| (b.t - bbox.t).abs() < ROW_TOLERANCE) => {
                row.push((bbox, toks));
            }
            _ => rows.push(vec![(bbox, toks)]),
        }
    }

    let header = rows.iter().position(|row| {
        let texts: Vec<String> = row.iter().map(|(_, t)| cell_text(t)).collect();
        texts.iter().any(|t| t.to_uppercase().contains("CATEGORY"))
            || texts.iter().filter(|t| single_category(t).is_some()).count() >= 2
    })?;

    let mut columns = Columns {
        letters: Vec::new(),
        spans: Vec::new(),
    };
    for (bbox, toks) in &rows[header] {
        if let Some(letter) = single_category(&cell_text(toks)) {
            columns.letters.push(letter);
            columns.spans.push((bbox.l, bbox.r));
        }
    }
    if columns.letters.is_empty() {
        return None;
    }

    let mut out: Vec<Row<'a>> = Vec::new();
    for row in rows.into_iter().skip(header + 1) {
        let mut label = Vec::new();
        let mut runs = Vec::new();
        let mut by_category = vec![None; columns.letters.len()];
        for (bbox, toks) in row {
            if bbox.r <= columns.left() + ROW_TOLERANCE {
                label.extend(toks);
                continue;
            }
            let covered: Vec<usize> = columns
                .centers()
                .enumerate()
                .filter(|(_, c)| *c >= bbox.l && *c <= bbox.r)
                .map(|(i, _)| i)
                .collect();
            if covered.is_empty() || toks.is_empty() {
                continue;
            }
            for i in covered {
                by_category[i] = Some(runs.len());
            }
            runs.push(toks);
        }
        if label.is_empty() {
            // Continuation row: extra value lines of the row above
            if let Some(prev) = out.last_mut() {
                for (i, run) in by_category.iter().enumerate() {
                    if let (Some(run), Some(Some(target))) = (run, prev.by_category.get(i)) {
                        let extra = runs[*run].clone();
                        prev.runs[*target].extend(extra);
                    }
                }
            }
            continue;
        }
        out.push(Row {
            label,
            runs,
            by_category,
        });
    }
    Some((columns, out))
}

fn read_text_lines<'a>(tokens: &[Tok<'a>]) -> Option<(Columns, Vec<Row<'a>>)> {
    let lines = text::group_lines(tokens.iter().copied());
    let header = lines.iter().position(|line| {
        line.tokens
            .iter()
            .any(|(_, t)| t.text.to_uppercase().contains("CATEGORY"))
    })?;
    let mut columns = Columns {
        letters: Vec::new(),
        spans: Vec::new(),
    };
    for (_, token) in &lines[header].tokens {
        if let Some(letter) = single_category(&token.text) {
            columns.letters.push(letter);
            columns.spans.push((token.bbox.l, token.bbox.r));
        }
    }
    if columns.letters.is_empty() {
        return None;
    }
    let centers: Vec<f64> = columns.centers().collect();
    let spacing = match centers.as_slice() {
        [first, .., last] => (last - first) / (centers.len() - 1) as f64,
        _ => lines[header].height() * 3.0,
    };
    let boundary = centers[0] - spacing / 2.0;

    let mut out: Vec<Row<'a>> = Vec::new();
    let mut pending_label: Vec<Tok<'a>> = Vec::new();
    for line in lines.into_iter().skip(header + 1) {
        let gap = line.height();
        let (label, values): (Vec<Tok<'a>>, Vec<Tok<'a>>) = line
            .tokens
            .into_iter()
            .partition(|(_, t)| t.bbox.center().x < boundary);
        if values.is_empty() {
            pending_label.extend(label);
            continue;
        }
        if label.is_empty() && pending_label.is_empty() {
            if let Some(prev) = out.last_mut() {
                for value in values {
                    let x = value.1.bbox.center().x;
                    let nearest = prev
                        .runs
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, run)| OrderedFloat((run_center(run) - x).abs()))
                        .map(|(i, _)| i);
                    if let Some(i) = nearest {
                        prev.runs[i].push(value);
                    }
                }
            }
            continue;
        }

        let mut runs: Vec<Vec<Tok<'a>>> = Vec::new();
        for value in values {
            match runs.last_mut() {
                Some(run) if run.last().is_some_and(|(_, t)| value.1.bbox.l - t.bbox.r <= gap) => {
                    run.push(value);
                }
                _ => runs.push(vec![value]),
            }
        }
        let by_category = centers
            .iter()
            .map(|c| {
                runs.iter()
                    .enumerate()
                    .min_by_key(|(_, run)| OrderedFloat((run_center(run) - c).abs()))
                    .map(|(i, _)| i)
            })
            .collect();
        let mut full_label = std::mem::take(&mut pending_label);
        full_label.extend(label);
        out.push(Row {
            label: full_label,
            runs,
            by_category,
        });
    }
    Some((columns, out))
}

fn run_center(run: &[Tok<'_>]) -> f64 {
    BBox::enclosing(run.iter().map(|(_, t)| &t.bbox)).map_or(0.0, |b| b.center().x)
}

/// Reads approach minimums from table zones
#[derive(Debug, Default, Clone, Copy)]
pub struct MinimumsExtractor;

impl ExtractZone for MinimumsExtractor {
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let tokens: Vec<Tok<'_>> = ctx.tokens(zone).collect();
        let read = zone
            .sub_grid
            .as_ref()
            .filter(|_| zone.has_sub_grid())
            .and_then(|grid| read_sub_grid(grid, &tokens))
            .or_else(|| read_text_lines(&tokens));
        let Some((columns, rows)) = read else {
            log::debug!("{} on page {}: no CATEGORY header found", zone.id, ctx.page.id);
            return Vec::new();
        };

        let mut fields = Vec::new();
        for row in rows {
            let label_tokens = reading_order(row.label.iter().copied());
            let label_text = text::join_tokens(label_tokens.iter().map(|(_, t)| *t));
            let Some(label) = parse_label(&label_text) else {
                continue;
            };
            let stem = label.field_stem();
            for (letter, run) in columns.letters.iter().zip(&row.by_category) {
                let Some(run) = run.and_then(|i| row.runs.get(i)) else {
                    continue;
                };
                let run = reading_order(run.iter().copied());
                let Some(value) = parse_value(&value_text(&run)) else {
                    continue;
                };
                let token_ids: Vec<TokenId> =
                    label_tokens.iter().chain(&run).map(|(id, _)| *id).collect();
                let line = MinimumsLine {
                    line: label.line.clone(),
                    category: *letter,
                    altitude: value.altitude,
                    visibility: value.visibility,
                    height_above: value.height_above,
                    condition: label.condition.clone(),
                    authorized: value.authorized,
                    expanded_radius: label.expanded_radius,
                };
                let name = format!("{stem}.cat-{}", letter.to_ascii_lowercase());
                fields.push(ctx.field(zone, name, FieldValue::Minimums(line), token_ids, 1.0));
            }
        }
        log::debug!(
            "{} on page {}: {} minimums across {} categories",
            zone.id,
            ctx.page.id,
            fields.len(),
            columns.letters.len()
        );
        fields
    }
}
