//! Procedure types and the fields each is expected to yield.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument approach procedure type named in the plate title
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureType {
    Ils,
    Loc,
    Rnav,
    Gps,
    Vor,
    Ndb,
    Lda,
    #[default]
    Other,
}

impl ProcedureType {
    pub const ALL: [Self; 8] = [
        Self::Ils,
        Self::Loc,
        Self::Rnav,
        Self::Gps,
        Self::Vor,
        Self::Ndb,
        Self::Lda,
        Self::Other,
    ];

    /// Map one title word (`ILS`, `HI-ILS`, `VOR/DME`, `VOR-B`) to a type
    #[must_use = "returns the procedure type for the word, if any"]
    pub fn from_title_word(word: &str) -> Option<Self> {
        let upper = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '/');
        let upper = upper.to_ascii_uppercase();
        let upper = upper.strip_prefix("HI-").unwrap_or(&upper);
        let stem = upper.split(['-', '/']).next().unwrap_or_default();
        match stem {
            "ILS" => Some(Self::Ils),
            "LOC" => Some(Self::Loc),
            "RNAV" => Some(Self::Rnav),
            "GPS" => Some(Self::Gps),
            "VOR" => Some(Self::Vor),
            "NDB" => Some(Self::Ndb),
            "LDA" => Some(Self::Lda),
            _ => None,
        }
    }

    /// Default expected fields for this procedure type
    #[must_use = "returns the default template field patterns"]
    pub fn default_template(self) -> Vec<String> {
        let mut fields: Vec<&str> = vec![
            "approach-course",
            "airport-elevation",
            "touchdown-zone-elevation",
            "missed-approach",
            "minimums.*",
            "comm.*",
        ];
        match self {
            Self::Rnav | Self::Gps => fields.push("required-equipment"),
            Self::Ils | Self::Loc | Self::Lda => fields.push("runway"),
            Self::Vor | Self::Ndb | Self::Other => {}
        }
        fields.into_iter().map(str::to_string).collect()
    }
}

impl fmt::Display for ProcedureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ils => "ILS",
            Self::Loc => "LOC",
            Self::Rnav => "RNAV",
            Self::Gps => "GPS",
            Self::Vor => "VOR",
            Self::Ndb => "NDB",
            Self::Lda => "LDA",
            Self::Other => "OTHER",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ProcedureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("other") {
            return Ok(Self::Other);
        }
        Self::from_title_word(s).ok_or_else(|| {
            format!("Unknown procedure type '{s}'. Expected: ils, loc, rnav, gps, vor, ndb, lda, other")
        })
    }
}

/// What a plate title says about the procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleInfo {
    /// Types in title order (`ILS OR LOC` yields both)
    pub types: Vec<ProcedureType>,
    pub runway: Option<String>,
}

impl TitleInfo {
    /// Type that selects the template
    #[inline]
    #[must_use = "returns the primary procedure type"]
    pub fn primary(&self) -> ProcedureType {
        self.types.first().copied().unwrap_or_default()
    }
}

/// Parse a title such as `ILS OR LOC RWY 19L` or `VOR-B`.
///
/// Returns `None` when no procedure keyword appears.
#[must_use = "returns the parsed title, if any"]
pub fn parse_title(title: &str) -> Option<TitleInfo> {
    let words: Vec<&str> = title.split_whitespace().collect();
    let mut types = Vec::new();
    let mut runway = None;
    for (i, word) in words.iter().enumerate() {
        if word.eq_ignore_ascii_case("RWY") {
            runway = words.get(i + 1).map(|r| r.trim_end_matches(',').to_string());
            continue;
        }
        if let Some(kind) = ProcedureType::from_title_word(word) {
            if !types.contains(&kind) {
                types.push(kind);
            }
        }
    }
    if types.is_empty() {
        None
    } else {
        Some(TitleInfo { types, runway })
    }
}

/// Find the title among page texts.
///
/// Texts naming a runway win over bare keyword mentions (notes often say
/// "GPS" or "VOR" in passing). Returns the index of the chosen text.
#[must_use = "returns the title match, if any"]
pub fn find_title<'a, I>(texts: I) -> Option<(usize, TitleInfo)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut fallback = None;
    for (index, text) in texts.into_iter().enumerate() {
        let Some(info) = parse_title(text) else {
            continue;
        };
        if info.runway.is_some() {
            return Some((index, info));
        }
        if fallback.is_none() {
            fallback = Some((index, info));
        }
    }
    fallback
}

/// True when `name` is covered by `pattern` (exact, or `prefix.*`)
#[inline]
#[must_use = "returns whether the field name matches"]
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix(".*") {
        Some(prefix) => name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => pattern == name,
    }
}
