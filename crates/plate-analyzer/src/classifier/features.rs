//! Zone features in `[0, 1]` for weighted scoring.

use crate::text_locator::TokenArena;
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use plate_core::{Orientation, Page, PrimitiveRef, Zone, ZoneId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lines closer to axis-aligned than this count as separators, not paths
const DIAGONAL_TOLERANCE: f64 = 0.5;

static MINIMUMS_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(?:CATEGORY|CAT|RVR|DA|MDA|LPV|LNAV|VNAV|CIRCLING|S-ILS|S-LOC|HAT|HAA)\b
        | \b\d{3,5}\s*[-/]\s*\d",
    )
    .expect("Invalid minimums cue regex")
});

static COMM_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(?:ATIS|ASOS|AWOS|TWR|TOWER|CTAF|GND|UNICOM|CLNC|DEL|RADIO|CENTER)\b
        | \bAPP\s+CON\b | \bDEP\s+CON\b
        | \b1[1-3]\d\.\d{1,3}\b",
    )
    .expect("Invalid comm cue regex")
});

static BRIEFING_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?xi)
        \bAPP\s+CRS\b | \bApt\s+Elev\b | \bTDZE\b | \bRwy\s+Idg\b
        | \bMISSED\s+APPROACH\b | \bLOC/DME\b | \bWAAS\b",
    )
    .expect("Invalid briefing cue regex")
});

static NOTES_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?xi)
        \brequired\b | \binoperative\b | \bnot\s+authorized\b | \bprocedure\s+NA\b
        | \bNA\s+(?:at|when)\b | \bwhen\s+local\b | \buse\b | \bNOTE\b",
    )
    .expect("Invalid notes cue regex")
});

static PLAN_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:IAF|IF|FAF|MSA|NoPT|HOLD|IAP)\b")
        .expect("Invalid plan cue regex")
});

static FIX_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{5}$").expect("Invalid fix regex"));

static PROFILE_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(?:GS|GP|TCH|VDP|MAP)\b
        | \b\d{1,2}(?:\.\d)?\s*NM\b
        | \b\d\.\d{2}°",
    )
    .expect("Invalid profile cue regex")
});

/// One scoring feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Always 1
    Bias,
    /// Share of page area, doubled and clamped
    RelativeArea,
    LargestZone,
    SecondLargestZone,
    TopBand,
    MiddleBand,
    BottomBand,
    /// Spans the page's horizontal center and most of its width
    CentralColumn,
    WideAspect,
    SquareAspect,
    SubGridPresent,
    SubGridColumns,
    SubGridRows,
    FullyBounded,
    DiagonalLines,
    MinimumsCues,
    CommCues,
    BriefingCues,
    NotesCues,
    PlanCues,
    ProfileCues,
}

impl Feature {
    pub const COUNT: usize = 21;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Bias,
        Self::RelativeArea,
        Self::LargestZone,
        Self::SecondLargestZone,
        Self::TopBand,
        Self::MiddleBand,
        Self::BottomBand,
        Self::CentralColumn,
        Self::WideAspect,
        Self::SquareAspect,
        Self::SubGridPresent,
        Self::SubGridColumns,
        Self::SubGridRows,
        Self::FullyBounded,
        Self::DiagonalLines,
        Self::MinimumsCues,
        Self::CommCues,
        Self::BriefingCues,
        Self::NotesCues,
        Self::PlanCues,
        Self::ProfileCues,
    ];

    /// Keyword features, emphasized on text-only pages
    #[inline]
    #[must_use = "returns whether the feature is a text cue"]
    pub const fn is_text_cue(self) -> bool {
        matches!(
            self,
            Self::MinimumsCues
                | Self::CommCues
                | Self::BriefingCues
                | Self::NotesCues
                | Self::PlanCues
                | Self::ProfileCues
        )
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    /// Snake-case name, as used in weight tables
    #[must_use = "returns the feature name"]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bias => "bias",
            Self::RelativeArea => "relative_area",
            Self::LargestZone => "largest_zone",
            Self::SecondLargestZone => "second_largest_zone",
            Self::TopBand => "top_band",
            Self::MiddleBand => "middle_band",
            Self::BottomBand => "bottom_band",
            Self::CentralColumn => "central_column",
            Self::WideAspect => "wide_aspect",
            Self::SquareAspect => "square_aspect",
            Self::SubGridPresent => "sub_grid_present",
            Self::SubGridColumns => "sub_grid_columns",
            Self::SubGridRows => "sub_grid_rows",
            Self::FullyBounded => "fully_bounded",
            Self::DiagonalLines => "diagonal_lines",
            Self::MinimumsCues => "minimums_cues",
            Self::CommCues => "comm_cues",
            Self::BriefingCues => "briefing_cues",
            Self::NotesCues => "notes_cues",
            Self::PlanCues => "plan_cues",
            Self::ProfileCues => "profile_cues",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("Unknown classifier feature '{s}'"))
    }
}

/// Feature values of one zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; Feature::COUNT]);

impl Default for FeatureVector {
    fn default() -> Self {
        let mut values = [0.0; Feature::COUNT];
        values[Feature::Bias.index()] = 1.0;
        Self(values)
    }
}

impl FeatureVector {
    #[inline]
    #[must_use = "returns the feature value"]
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    #[inline]
    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0[feature.index()] = value.clamp(0.0, 1.0);
    }
}

/// Page-level facts the features of one zone depend on
#[derive(Debug)]
pub struct FeatureContext<'a> {
    pub page: &'a Page,
    pub arena: &'a TokenArena<'a>,
    pub largest: Option<ZoneId>,
    pub second_largest: Option<ZoneId>,
}

impl<'a> FeatureContext<'a> {
    /// Rank candidate zones by area
    #[must_use = "returns the feature context"]
    pub fn new(page: &'a Page, arena: &'a TokenArena<'a>, zones: &[Zone]) -> Self {
        let mut by_area: Vec<&Zone> = zones.iter().filter(|z| !z.is_remainder).collect();
        by_area.sort_by_key(|z| std::cmp::Reverse(OrderedFloat(z.bbox.area())));
        Self {
            page,
            arena,
            largest: by_area.first().map(|z| z.id),
            second_largest: by_area.get(1).map(|z| z.id),
        }
    }

    /// Zone text in token order, joined with spaces
    #[must_use = "returns the zone text"]
    pub fn zone_text(&self, zone: &Zone) -> String {
        self.arena
            .zone_tokens(zone)
            .map(|(_, t)| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 1 - 0.5^count: one hit gives 0.5, more hits approach 1
#[inline]
fn saturate(count: usize) -> f64 {
    1.0 - 0.5_f64.powi(i32::try_from(count).unwrap_or(i32::MAX))
}

/// Compute the feature vector of `zone`
#[must_use = "returns the feature vector"]
pub fn compute(zone: &Zone, ctx: &FeatureContext<'_>) -> FeatureVector {
    let mut features = FeatureVector::default();
    let page = ctx.page;
    let bbox = zone.bbox;

    let area_share = if page.area() > 0.0 {
        bbox.area() / page.area()
    } else {
        0.0
    };
    features.set(Feature::RelativeArea, area_share * 2.0);
    features.set(Feature::LargestZone, f64::from(u8::from(ctx.largest == Some(zone.id))));
    features.set(
        Feature::SecondLargestZone,
        f64::from(u8::from(ctx.second_largest == Some(zone.id))),
    );

    let center = bbox.center();
    let band = center.y / page.height;
    let band_feature = if band < 1.0 / 3.0 {
        Feature::TopBand
    } else if band < 2.0 / 3.0 {
        Feature::MiddleBand
    } else {
        Feature::BottomBand
    };
    features.set(band_feature, 1.0);
    let mid_x = page.width / 2.0;
    if bbox.l < mid_x && bbox.r > mid_x && bbox.width() > 0.5 * page.width {
        features.set(Feature::CentralColumn, 1.0);
    }

    let aspect = bbox.aspect_ratio();
    if aspect.is_finite() && aspect > 0.0 {
        features.set(Feature::WideAspect, (aspect - 1.0) / 2.0);
        features.set(Feature::SquareAspect, 1.0 - aspect.ln().abs() / 3.0_f64.ln());
    } else {
        features.set(Feature::WideAspect, 1.0);
    }

    if let Some(grid) = zone.sub_grid.as_ref().filter(|g| g.cells.len() > 1) {
        features.set(Feature::SubGridPresent, 1.0);
        features.set(Feature::SubGridColumns, grid.column_count().min(6) as f64 / 6.0);
        features.set(Feature::SubGridRows, grid.row_count().min(6) as f64 / 6.0);
    }
    if zone.boundary.is_fully_bounded() {
        features.set(Feature::FullyBounded, 1.0);
    }

    let diagonals = zone
        .primitives
        .iter()
        .filter_map(|p| match p {
            PrimitiveRef::Line(i) => page.lines.get(*i),
            PrimitiveRef::Rect(_) => None,
        })
        .filter(|l| l.orientation(DIAGONAL_TOLERANCE) == Orientation::Diagonal)
        .count();
    features.set(Feature::DiagonalLines, diagonals as f64 / 3.0);

    let text = ctx.zone_text(zone);
    features.set(Feature::MinimumsCues, saturate(MINIMUMS_CUES.find_iter(&text).count()));
    features.set(Feature::CommCues, saturate(COMM_CUES.find_iter(&text).count()));
    features.set(Feature::BriefingCues, saturate(BRIEFING_CUES.find_iter(&text).count()));
    features.set(Feature::NotesCues, saturate(NOTES_CUES.find_iter(&text).count()));
    let fixes = ctx
        .arena
        .zone_tokens(zone)
        .filter(|(_, t)| FIX_NAME.is_match(t.text.trim()))
        .count();
    features.set(Feature::PlanCues, saturate(PLAN_CUES.find_iter(&text).count() + fixes));
    features.set(Feature::ProfileCues, saturate(PROFILE_CUES.find_iter(&text).count()));

    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::{BBox, BoundarySupport, SubGrid, TextToken, TokenId};

    #[test]
    fn test_feature_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>().unwrap(), feature);
        }
        assert!("colour".parse::<Feature>().is_err());
        assert_eq!(Feature::ALL[Feature::COUNT - 1], Feature::ProfileCues);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(saturate(0), 0.0);
        assert_eq!(saturate(1), 0.5);
        assert_eq!(saturate(2), 0.75);
    }

    #[test]
    fn test_cue_patterns() {
        assert_eq!(MINIMUMS_CUES.find_iter("CAT A RVR 1212-1").count(), 3);
        assert_eq!(COMM_CUES.find_iter("ATIS 127.65 APP CON 119.2").count(), 4);
        assert!(BRIEFING_CUES.is_match("Apt Elev 1013"));
        assert!(PROFILE_CUES.is_match("3.00° TCH 54"));
        assert!(!MINIMUMS_CUES.is_match("DATA"));
    }

    #[test]
    fn test_table_zone_features() {
        let page = Page::new("p", 600.0, 800.0)
            .with_token(TextToken::new("CAT A", BBox::new(110.0, 610.0, 150.0, 620.0)))
            .with_token(TextToken::new("RVR", BBox::new(160.0, 610.0, 190.0, 620.0)));
        let arena = TokenArena::new(&page);
        let cells = vec![
            BBox::new(100.0, 600.0, 200.0, 650.0),
            BBox::new(200.0, 600.0, 300.0, 650.0),
            BBox::new(300.0, 600.0, 400.0, 650.0),
        ];
        let mut zone = Zone::candidate(
            ZoneId(0),
            BBox::new(100.0, 600.0, 400.0, 650.0),
            BoundarySupport::full(),
            1.0,
        );
        zone.sub_grid = Some(SubGrid::from_cells(cells, 0.5));
        zone.token_ids = vec![TokenId(0), TokenId(1)];
        let zones = vec![zone];
        let ctx = FeatureContext::new(&page, &arena, &zones);
        let features = compute(&zones[0], &ctx);
        assert_eq!(features.get(Feature::Bias), 1.0);
        assert_eq!(features.get(Feature::SubGridPresent), 1.0);
        assert_eq!(features.get(Feature::SubGridColumns), 0.5);
        assert_eq!(features.get(Feature::BottomBand), 1.0);
        assert_eq!(features.get(Feature::MinimumsCues), 0.75);
        assert_eq!(features.get(Feature::LargestZone), 1.0);
        assert_eq!(features.get(Feature::WideAspect), 1.0);
    }
}
