//! Plan and profile views: coarse geometry plus raw positioned text.

use super::{ExtractContext, ExtractZone};
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use plate_core::{
    Annotation, ExtractedField, FieldValue, Orientation, Point, PrimitiveRef, TextToken, TokenId,
    Zone,
};
use regex::Regex;

/// Lines within this of axis-aligned are not descent paths
const AXIS_TOLERANCE: f64 = 0.5;
/// Glyph distances for an `A r c` cluster laid out along a curved arc label
const ARC_R_DISTANCE: f64 = 8.0;
const ARC_C_DISTANCE: f64 = 13.0;

static ARC_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bARC\b").expect("Invalid arc regex"));
static MAP_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bMAP\b").expect("Invalid MAP regex"));

fn annotations(zone: &Zone, ctx: &ExtractContext<'_>, name: String) -> Option<ExtractedField> {
    let (ids, items): (Vec<TokenId>, Vec<Annotation>) = ctx
        .tokens(zone)
        .filter(|(_, t)| !t.is_blank())
        .map(|(id, t)| {
            (
                id,
                Annotation {
                    text: t.text.trim().to_string(),
                    bbox: t.bbox,
                },
            )
        })
        .unzip();
    if items.is_empty() {
        return None;
    }
    Some(ctx.field(zone, name, FieldValue::Annotations { items }, ids, 0.5))
}

/// Tokens spelling a DME arc label, either as a word or as scattered glyphs
fn arc_evidence(tokens: &[(TokenId, &TextToken)]) -> Vec<TokenId> {
    if let Some((id, _)) = tokens.iter().find(|(_, t)| ARC_WORD.is_match(&t.text)) {
        return vec![*id];
    }
    let origin = |t: &TextToken| Point::new(t.bbox.l, t.bbox.b);
    let glyphs = |c: &str| -> Vec<(TokenId, Point)> {
        tokens
            .iter()
            .filter(|(_, t)| t.text.trim() == c)
            .map(|(id, t)| (*id, origin(t)))
            .collect()
    };
    let (a, r, c) = (glyphs("A"), glyphs("r"), glyphs("c"));
    let nearest = |p: Point, set: &[(TokenId, Point)]| {
        set.iter()
            .min_by_key(|(_, q)| OrderedFloat(q.distance_to(&p)))
            .map(|(id, q)| (*id, q.distance_to(&p)))
    };
    for (a_id, a_at) in a {
        let (Some((r_id, r_dist)), Some((c_id, c_dist))) = (nearest(a_at, &r), nearest(a_at, &c)) else {
            continue;
        };
        if r_dist <= ARC_R_DISTANCE && c_dist <= ARC_C_DISTANCE {
            return vec![a_id, r_id, c_id];
        }
    }
    Vec::new()
}

/// Reads the plan view
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanViewExtractor;

impl ExtractZone for PlanViewExtractor {
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let tokens: Vec<(TokenId, &TextToken)> = ctx.tokens(zone).collect();
        let mut fields = Vec::new();
        let evidence = arc_evidence(&tokens);
        let found = !evidence.is_empty();
        if found {
            fields.push(ctx.field(zone, "plan-view.dme-arc", FieldValue::flag(true), evidence, 0.8));
        }
        fields.extend(annotations(zone, ctx, "plan-view.annotations".to_string()));
        log::debug!(
            "{} on page {}: plan view with {} tokens, DME arc {}",
            zone.id,
            ctx.page.id,
            tokens.len(),
            found
        );
        fields
    }
}

/// Reads the profile view
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileViewExtractor;

impl ProfileViewExtractor {
    /// Longest diagonal line in the zone and its lower endpoint
    fn descent_end(zone: &Zone, ctx: &ExtractContext<'_>) -> Option<(usize, Point)> {
        zone.primitives
            .iter()
            .filter_map(|p| match p {
                PrimitiveRef::Line(i) => ctx.page.lines.get(*i).map(|l| (*i, l)),
                PrimitiveRef::Rect(_) => None,
            })
            .filter(|(_, l)| l.orientation(AXIS_TOLERANCE) == Orientation::Diagonal)
            .max_by_key(|(_, l)| OrderedFloat(l.length()))
            .map(|(i, l)| {
                let low = if l.end.y >= l.start.y { l.end } else { l.start };
                (i, low)
            })
    }
}

impl ExtractZone for ProfileViewExtractor {
    fn extract(&self, zone: &Zone, ctx: &ExtractContext<'_>) -> Vec<ExtractedField> {
        let mut fields = Vec::new();
        if let Some((line, position)) = Self::descent_end(zone, ctx) {
            let map_token = ctx
                .tokens(zone)
                .filter(|(_, t)| MAP_WORD.is_match(&t.text))
                .min_by_key(|(_, t)| OrderedFloat(t.bbox.center().distance_to(&position)))
                .map(|(id, _)| id);
            let factor = if map_token.is_some() { 0.9 } else { 0.5 };
            let relative = Point::new(
                ((position.x - zone.bbox.l) / zone.bbox.width().max(f64::EPSILON)).clamp(0.0, 1.0),
                ((position.y - zone.bbox.t) / zone.bbox.height().max(f64::EPSILON)).clamp(0.0, 1.0),
            );
            fields.push(ctx.field_with_primitives(
                zone,
                "profile-view.missed-approach-point",
                FieldValue::Marker { position, relative },
                map_token.into_iter().collect(),
                vec![PrimitiveRef::Line(line)],
                factor,
            ));
        }
        fields.extend(annotations(zone, ctx, "profile-view.annotations".to_string()));
        fields
    }
}
