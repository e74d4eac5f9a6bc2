//! Reading-order text lines and number parsing shared by the extractors.

use ordered_float::OrderedFloat;
use plate_core::{BBox, TextToken, TokenId};

/// Glyphs shorter than this share of the reference height are superscript-sized
pub const SMALL_GLYPH_RATIO: f64 = 0.8;

/// Tokens on one baseline, left to right
#[derive(Debug, Clone)]
pub struct TextLine<'a> {
    pub tokens: Vec<(TokenId, &'a TextToken)>,
    pub bbox: BBox,
}

impl<'a> TextLine<'a> {
    fn start(id: TokenId, token: &'a TextToken) -> Self {
        Self {
            tokens: vec![(id, token)],
            bbox: token.bbox,
        }
    }

    /// Token texts joined with single spaces
    #[must_use = "returns the line text"]
    pub fn text(&self) -> String {
        join_tokens(self.tokens.iter().map(|(_, t)| *t))
    }

    #[must_use = "returns the token ids"]
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.tokens.iter().map(|(id, _)| *id).collect()
    }

    #[inline]
    #[must_use = "returns the line height"]
    pub fn height(&self) -> f64 {
        self.bbox.height()
    }

    fn accepts(&self, token: &TextToken) -> bool {
        let overlap = (self.bbox.b.min(token.bbox.b) - self.bbox.t.max(token.bbox.t)).max(0.0);
        let shorter = self.bbox.height().min(token.bbox.height());
        shorter > 0.0 && overlap >= 0.5 * shorter
    }
}

/// Group tokens into lines by vertical overlap, in reading order
pub fn group_lines<'a, I>(tokens: I) -> Vec<TextLine<'a>>
where
    I: IntoIterator<Item = (TokenId, &'a TextToken)>,
{
    let mut tokens: Vec<(TokenId, &'a TextToken)> =
        tokens.into_iter().filter(|(_, t)| !t.is_blank()).collect();
    tokens.sort_by_key(|(_, t)| (OrderedFloat(t.bbox.center().y), OrderedFloat(t.bbox.l)));

    let mut lines: Vec<TextLine<'a>> = Vec::new();
    for (id, token) in tokens {
        match lines.last_mut() {
            Some(line) if line.accepts(token) => {
                line.tokens.push((id, token));
                line.bbox = line.bbox.union(&token.bbox);
            }
            _ => lines.push(TextLine::start(id, token)),
        }
    }
    for line in &mut lines {
        line.tokens.sort_by_key(|(_, t)| OrderedFloat(t.bbox.l));
    }
    lines
}

/// Join token texts with single spaces
pub fn join_tokens<'a, I>(tokens: I) -> String
where
    I: IntoIterator<Item = &'a TextToken>,
{
    tokens
        .into_iter()
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mean confidence of the tokens, 0 when there are none
pub fn mean_confidence<'a, I>(tokens: I) -> f64
where
    I: IntoIterator<Item = &'a TextToken>,
{
    let (sum, count) = tokens
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), t| (sum + t.confidence, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Leading decimal number of `text`, ignoring thousands separators.
///
/// `"1,013'"` gives 1013, `"097°"` gives 97.
#[must_use = "returns the parsed number, if any"]
pub fn leading_number(text: &str) -> Option<f64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let digits = digits.trim_end_matches('.');
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn unicode_fraction(c: char) -> Option<f64> {
    Some(match c {
        '½' => 0.5,
        '¼' => 0.25,
        '¾' => 0.75,
        '⅛' => 0.125,
        '⅜' => 0.375,
        '⅝' => 0.625,
        '⅞' => 0.875,
        '⅓' => 1.0 / 3.0,
        '⅔' => 2.0 / 3.0,
        _ => return None,
    })
}

/// Parse a visibility figure: `1`, `3/4`, `1 1/2`, `½`, `1¼`
#[must_use = "returns the parsed value, if any"]
pub fn parse_fraction(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(last) = text.chars().last() {
        if let Some(frac) = unicode_fraction(last) {
            let whole = text[..text.len() - last.len_utf8()].trim();
            return if whole.is_empty() {
                Some(frac)
            } else {
                whole.parse::<u32>().ok().map(|w| f64::from(w) + frac)
            };
        }
    }
    let mut parts = text.split_whitespace();
    let first = parts.next()?;
    let value = match (first.split_once('/'), parts.next()) {
        (Some((n, d)), None) => ratio(n, d)?,
        (None, None) => f64::from(first.parse::<u32>().ok()?),
        (None, Some(rest)) => {
            let (n, d) = rest.split_once('/')?;
            f64::from(first.parse::<u32>().ok()?) + ratio(n, d)?
        }
        (Some(_), Some(_)) => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(value)
}

fn ratio(numerator: &str, denominator: &str) -> Option<f64> {
    let n: u32 = numerator.parse().ok()?;
    let d: u32 = denominator.parse().ok()?;
    (d > 0).then(|| f64::from(n) / f64::from(d))
}

/// Lowercase, dash-separated form of a label
#[must_use = "returns the slug"]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, l: f64, t: f64, r: f64, b: f64) -> TextToken {
        TextToken::new(text, BBox::new(l, t, r, b))
    }

    #[test]
    fn test_group_lines_reading_order() {
        let tokens = [
            token("VNAV", 40.0, 21.0, 70.0, 31.0),
            token("LNAV/", 0.0, 20.0, 35.0, 30.0),
            token("DA", 0.0, 35.0, 15.0, 45.0),
        ];
        let lines = group_lines(tokens.iter().enumerate().map(|(i, t)| (TokenId(i), t)));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "LNAV/ VNAV");
        assert_eq!(lines[0].token_ids(), vec![TokenId(1), TokenId(0)]);
        assert_eq!(lines[1].text(), "DA");
    }

    #[test]
    fn test_small_glyph_joins_line() {
        let tokens = [
            token("1560-1", 0.0, 10.0, 40.0, 20.0),
            token("1", 41.0, 10.0, 44.0, 15.0),
        ];
        let lines = group_lines(tokens.iter().enumerate().map(|(i, t)| (TokenId(i), t)));
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("097°"), Some(97.0));
        assert_eq!(leading_number("1,013"), Some(1013.0));
        assert_eq!(leading_number("119.25"), Some(119.25));
        assert_eq!(leading_number("DME"), None);
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("1"), Some(1.0));
        assert_eq!(parse_fraction("3/4"), Some(0.75));
        assert_eq!(parse_fraction("1 1/2"), Some(1.5));
        assert_eq!(parse_fraction("½"), Some(0.5));
        assert_eq!(parse_fraction("1¼"), Some(1.25));
        assert_eq!(parse_fraction("1/0"), None);
        assert_eq!(parse_fraction("x"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("LNAV/VNAV"), "lnav-vnav");
        assert_eq!(slugify("S-ILS 28"), "s-ils-28");
        assert_eq!(slugify("  APP CON "), "app-con");
    }
}
