//! Typed values extracted from zones, with provenance.

use crate::geometry::{BBox, Point};
use crate::zone::{PrimitiveRef, TokenId, Zone, ZoneId, ZoneKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit attached to a numeric quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Feet,
    StatuteMiles,
    RvrFeet,
    Megahertz,
    DegreesMagnetic,
}

impl Unit {
    #[inline]
    #[must_use = "returns the unit suffix"]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Feet => "ft",
            Self::StatuteMiles => "SM",
            Self::RvrFeet => "ft RVR",
            Self::Megahertz => "MHz",
            Self::DegreesMagnetic => "°",
        }
    }
}

/// Minimum visibility, either prevailing (statute miles) or runway visual range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Visibility {
    StatuteMiles(f64),
    RvrFeet(u32),
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatuteMiles(sm) => write!(f, "{sm} SM"),
            Self::RvrFeet(ft) => write!(f, "RVR {ft}"),
        }
    }
}

/// One (approach line, aircraft category) cell of a minimums table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimumsLine {
    /// Approach line label with DA/MDA suffix removed, e.g. `LNAV/VNAV`
    pub line: String,
    /// Aircraft approach category, `A` through `E`
    pub category: char,
    /// Decision altitude or minimum descent altitude in feet MSL
    pub altitude: Option<f64>,
    pub visibility: Option<Visibility>,
    /// Height above touchdown zone or airport in feet
    pub height_above: Option<f64>,
    /// Parenthesized qualifier from the line label, e.g. `Baro-VNAV`
    pub condition: Option<String>,
    /// False when the cell reads `NA`
    pub authorized: bool,
    /// Circling line drawn with the expanded-radius marker
    #[serde(default)]
    pub expanded_radius: bool,
}

/// Text surfaced without interpretation, with its position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    pub bbox: BBox,
}

/// Value of an extracted field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldValue {
    Quantity { value: f64, unit: Unit },
    Text { text: String },
    Flag { set: bool },
    Minimums(MinimumsLine),
    Frequency { facility: String, mhz: f64 },
    /// A point of interest and its position relative to the zone (0..1 per axis)
    Marker { position: Point, relative: Point },
    Annotations { items: Vec<Annotation> },
}

impl FieldValue {
    #[inline]
    #[must_use = "returns a new quantity value"]
    pub const fn quantity(value: f64, unit: Unit) -> Self {
        Self::Quantity { value, unit }
    }

    #[inline]
    #[must_use = "returns a new text value"]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[inline]
    #[must_use = "returns a new flag value"]
    pub const fn flag(set: bool) -> Self {
        Self::Flag { set }
    }

    /// Numeric payload for quantities
    #[must_use = "returns the numeric value, if any"]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Quantity { value, .. } => Some(*value),
            Self::Frequency { mhz, .. } => Some(*mhz),
            _ => None,
        }
    }

    /// Text payload for text values
    #[must_use = "returns the text, if any"]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantity { value, unit } => write!(f, "{value} {}", unit.suffix()),
            Self::Text { text } => f.write_str(text),
            Self::Flag { set } => write!(f, "{set}"),
            Self::Minimums(m) => {
                if !m.authorized {
                    return write!(f, "{} CAT {}: NA", m.line, m.category);
                }
                write!(f, "{} CAT {}:", m.line, m.category)?;
                if let Some(alt) = m.altitude {
                    write!(f, " {alt}")?;
                }
                if let Some(vis) = m.visibility {
                    write!(f, " {vis}")?;
                }
                if let Some(hat) = m.height_above {
                    write!(f, " ({hat})")?;
                }
                Ok(())
            }
            Self::Frequency { facility, mhz } => write!(f, "{facility} {mhz:.3}"),
            Self::Marker { position, .. } => write!(f, "({:.1}, {:.1})", position.x, position.y),
            Self::Annotations { items } => write!(f, "{} annotations", items.len()),
        }
    }
}

/// The zone a field came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRef {
    pub id: ZoneId,
    pub kind: ZoneKind,
    pub bbox: BBox,
}

impl From<&Zone> for ZoneRef {
    fn from(zone: &Zone) -> Self {
        Self {
            id: zone.id,
            kind: zone.kind,
            bbox: zone.bbox,
        }
    }
}

/// Link from a field back to the page material that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub zone: ZoneRef,
    pub token_ids: Vec<TokenId>,
    pub primitives: Vec<PrimitiveRef>,
    /// Bounding box of the contributing tokens and primitives
    pub bbox: BBox,
}

impl Provenance {
    /// Provenance covering `token_ids`, bounded by `bbox`
    #[must_use = "returns a new Provenance"]
    pub fn from_tokens(zone: &Zone, token_ids: Vec<TokenId>, bbox: BBox) -> Self {
        Self {
            zone: ZoneRef::from(zone),
            token_ids,
            primitives: Vec::new(),
            bbox,
        }
    }

    #[must_use = "returns the provenance with primitives attached"]
    pub fn with_primitives(mut self, primitives: Vec<PrimitiveRef>) -> Self {
        self.primitives = primitives;
        self
    }

    /// True when the provenance points at any page material
    #[inline]
    #[must_use = "returns whether the provenance is non-empty"]
    pub fn is_grounded(&self) -> bool {
        !self.token_ids.is_empty() || !self.primitives.is_empty()
    }
}

/// A named, typed value with confidence and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub name: String,
    pub value: FieldValue,
    pub confidence: f64,
    pub provenance: Provenance,
}

impl ExtractedField {
    #[must_use = "returns a new ExtractedField"]
    pub fn new(
        name: impl Into<String>,
        value: FieldValue,
        confidence: f64,
        provenance: Provenance,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            confidence: confidence.clamp(0.0, 1.0),
            provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::BoundarySupport;

    fn zone() -> Zone {
        Zone::candidate(
            ZoneId(2),
            BBox::new(0.0, 0.0, 100.0, 50.0),
            BoundarySupport::full(),
            0.9,
        )
    }

    #[test]
    fn test_confidence_is_clamped() {
        let prov = Provenance::from_tokens(&zone(), vec![TokenId(0)], BBox::default());
        let field = ExtractedField::new("x", FieldValue::flag(true), 1.4, prov);
        assert_eq!(field.confidence, 1.0);
        assert!(field.provenance.is_grounded());
    }

    #[test]
    fn test_minimums_display() {
        let value = FieldValue::Minimums(MinimumsLine {
            line: "LPV".to_string(),
            category: 'A',
            altitude: Some(1_212.0),
            visibility: Some(Visibility::RvrFeet(2_400)),
            height_above: Some(250.0),
            condition: None,
            authorized: true,
            expanded_radius: false,
        });
        assert_eq!(value.to_string(), "LPV CAT A: 1212 RVR 2400 (250)");
    }

    #[test]
    fn test_value_serialization_is_tagged() {
        let json = serde_json::to_string(&FieldValue::quantity(274.0, Unit::DegreesMagnetic))
            .unwrap();
        assert_eq!(
            json,
            r#"{"type":"quantity","value":274.0,"unit":"degrees_magnetic"}"#
        );
    }
}
