//! Analyzer configuration.
//!
//! Every threshold the pipeline uses lives here. Configs deserialize from
//! TOML with per-field defaults, so a file only needs the keys it changes:
//!
//! ```toml
//! min_zone_area = 600.0
//! ocr_policy = "always"
//!
//! [templates]
//! ils = ["approach-course", "minimums.*", "comm.*"]
//!
//! [scoring.minimums_table]
//! sub_grid_columns = 2.0
//! ```

use crate::error::{PlateError, Result};
use crate::template::ProcedureType;
use crate::zone::ZoneKind;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// When to ask the OCR collaborator for text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrPolicy {
    /// Page text only
    Never,
    /// Only for zones that received no page text
    #[default]
    WhenNoText,
    /// Every zone, appended to page text
    Always,
}

impl std::str::FromStr for OcrPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "never" | "off" => Ok(Self::Never),
            "when_no_text" | "auto" => Ok(Self::WhenNoText),
            "always" => Ok(Self::Always),
            _ => Err(format!(
                "Unknown OCR policy '{s}'. Expected: never, when_no_text, always"
            )),
        }
    }
}

/// Thresholds and weights for one analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Regions smaller than this (page units squared) are noise
    pub min_zone_area: f64,
    /// Grid lines closer than this snap together (ε)
    pub line_merge_tolerance: f64,
    /// Strokes thicker than this are arrows, not separators
    pub max_separator_stroke: f64,
    /// Long side over short side above which a region is discarded
    pub max_aspect_ratio: f64,
    /// Regions with a side shorter than this are discarded
    pub min_zone_side: f64,
    /// Relative area under which fully bounded cells collapse into a sub-grid (0 disables)
    pub cell_collapse_area: f64,
    /// Minimum winning score for a zone label
    pub classification_floor: f64,
    pub ocr_timeout_ms: u64,
    pub ocr_policy: OcrPolicy,
    /// Expected field patterns per procedure type name
    pub templates: BTreeMap<String, Vec<String>>,
    /// Weight of mean token confidence in field confidence
    pub text_weight: f64,
    /// Weight of zone segmentation confidence in field confidence
    pub geometry_weight: f64,
    /// Fields below this are reported as low confidence and do not count toward completeness
    pub min_field_confidence: f64,
    /// Classifier weight overrides: zone kind name -> feature name -> weight
    pub scoring: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_zone_area: 400.0,
            line_merge_tolerance: 0.5,
            max_separator_stroke: 2.0,
            max_aspect_ratio: 40.0,
            min_zone_side: 4.0,
            cell_collapse_area: 0.015,
            classification_floor: 0.35,
            ocr_timeout_ms: 2_000,
            ocr_policy: OcrPolicy::WhenNoText,
            templates: ProcedureType::ALL
                .iter()
                .map(|t| (template_key(*t), t.default_template()))
                .collect(),
            text_weight: 0.7,
            geometry_weight: 0.3,
            min_field_confidence: 0.5,
            scoring: BTreeMap::new(),
        }
    }
}

fn template_key(procedure: ProcedureType) -> String {
    procedure.to_string().to_lowercase()
}

impl AnalyzerConfig {
    #[inline]
    #[must_use = "returns the OCR timeout"]
    pub const fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    /// Expected field patterns for a procedure type.
    ///
    /// Falls back to the `other` template, then to the built-in default.
    #[must_use = "returns the template field patterns"]
    pub fn template(&self, procedure: ProcedureType) -> Vec<String> {
        self.templates
            .get(&template_key(procedure))
            .or_else(|| self.templates.get(&template_key(ProcedureType::Other)))
            .cloned()
            .unwrap_or_else(|| procedure.default_template())
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside their meaningful range
    pub fn validate(&self) -> Result<()> {
        fn unit_range(name: &str, value: f64) -> Result<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(PlateError::ConfigError {
                    reason: format!("{name} must be in [0, 1], got {value}"),
                })
            }
        }
        fn non_negative(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(PlateError::ConfigError {
                    reason: format!("{name} must be a non-negative number, got {value}"),
                })
            }
        }

        non_negative("min_zone_area", self.min_zone_area)?;
        non_negative("line_merge_tolerance", self.line_merge_tolerance)?;
        non_negative("min_zone_side", self.min_zone_side)?;
        if !(self.max_separator_stroke > 0.0) {
            return Err(PlateError::ConfigError {
                reason: format!(
                    "max_separator_stroke must be positive, got {}",
                    self.max_separator_stroke
                ),
            });
        }
        if !(self.max_aspect_ratio >= 1.0) {
            return Err(PlateError::ConfigError {
                reason: format!(
                    "max_aspect_ratio must be at least 1, got {}",
                    self.max_aspect_ratio
                ),
            });
        }
        unit_range("cell_collapse_area", self.cell_collapse_area)?;
        unit_range("classification_floor", self.classification_floor)?;
        unit_range("text_weight", self.text_weight)?;
        unit_range("geometry_weight", self.geometry_weight)?;
        unit_range("min_field_confidence", self.min_field_confidence)?;
        if self.text_weight + self.geometry_weight <= 0.0 {
            return Err(PlateError::ConfigError {
                reason: "text_weight and geometry_weight cannot both be zero".to_string(),
            });
        }
        if self.ocr_timeout_ms == 0 {
            return Err(PlateError::ConfigError {
                reason: "ocr_timeout_ms must be positive".to_string(),
            });
        }
        for key in self.templates.keys() {
            key.parse::<ProcedureType>()
                .map_err(|reason| PlateError::ConfigError { reason })?;
        }
        for (kind, weights) in &self.scoring {
            kind.parse::<ZoneKind>()
                .map_err(|reason| PlateError::ConfigError { reason })?;
            if let Some((feature, weight)) = weights.iter().find(|(_, w)| !w.is_finite()) {
                return Err(PlateError::ConfigError {
                    reason: format!("scoring weight {kind}.{feature} is not finite: {weight}"),
                });
            }
        }
        Ok(())
    }
}

/// Load a config file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> anyhow::Result<AnalyzerConfig> {
    if !path.exists() {
        log::debug!("No analyzer config at {}, using defaults", path.display());
        return Ok(AnalyzerConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = AnalyzerConfig::from_toml_str(&contents)
        .with_context(|| format!("Invalid analyzer config: {}", path.display()))?;
    Ok(config)
}

/// Consuming builder for [`AnalyzerConfig`]
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    /// Builder starting from the defaults
    #[inline]
    #[must_use = "returns a new builder with default settings"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Page text only, no sub-grid collapse
    ///
    /// Every fully bounded cell stays its own zone, which is what table-level
    /// debugging wants.
    #[must_use = "returns a builder without OCR or cell collapse"]
    pub fn minimal() -> Self {
        Self::new().ocr_policy(OcrPolicy::Never).cell_collapse_area(0.0)
    }

    /// Settings for scanned plates with little or no vector content
    #[must_use = "returns a builder tuned for scanned plates"]
    pub fn scanned() -> Self {
        Self::new()
            .ocr_policy(OcrPolicy::Always)
            .ocr_timeout(Duration::from_secs(10))
            .text_weight(0.5)
            .geometry_weight(0.5)
    }

    #[inline]
    #[must_use = "returns the builder with min_zone_area configured"]
    pub const fn min_zone_area(mut self, area: f64) -> Self {
        self.config.min_zone_area = area;
        self
    }

    #[inline]
    #[must_use = "returns the builder with line_merge_tolerance configured"]
    pub const fn line_merge_tolerance(mut self, tolerance: f64) -> Self {
        self.config.line_merge_tolerance = tolerance;
        self
    }

    #[inline]
    #[must_use = "returns the builder with max_separator_stroke configured"]
    pub const fn max_separator_stroke(mut self, width: f64) -> Self {
        self.config.max_separator_stroke = width;
        self
    }

    #[inline]
    #[must_use = "returns the builder with max_aspect_ratio configured"]
    pub const fn max_aspect_ratio(mut self, ratio: f64) -> Self {
        self.config.max_aspect_ratio = ratio;
        self
    }

    #[inline]
    #[must_use = "returns the builder with min_zone_side configured"]
    pub const fn min_zone_side(mut self, side: f64) -> Self {
        self.config.min_zone_side = side;
        self
    }

    /// Relative area threshold for sub-grid collapse; 0 disables collapsing
    #[inline]
    #[must_use = "returns the builder with cell_collapse_area configured"]
    pub const fn cell_collapse_area(mut self, relative_area: f64) -> Self {
        self.config.cell_collapse_area = relative_area;
        self
    }

    #[inline]
    #[must_use = "returns the builder with classification_floor configured"]
    pub const fn classification_floor(mut self, floor: f64) -> Self {
        self.config.classification_floor = floor;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the OCR timeout configured"]
    pub fn ocr_timeout(mut self, timeout: Duration) -> Self {
        self.config.ocr_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use = "returns the builder with ocr_policy configured"]
    pub const fn ocr_policy(mut self, policy: OcrPolicy) -> Self {
        self.config.ocr_policy = policy;
        self
    }

    /// Replace the expected field patterns for one procedure type
    #[must_use = "returns the builder with the template configured"]
    pub fn template<I, S>(mut self, procedure: ProcedureType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.templates.insert(
            template_key(procedure),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }

    #[inline]
    #[must_use = "returns the builder with text_weight configured"]
    pub const fn text_weight(mut self, weight: f64) -> Self {
        self.config.text_weight = weight;
        self
    }

    #[inline]
    #[must_use = "returns the builder with geometry_weight configured"]
    pub const fn geometry_weight(mut self, weight: f64) -> Self {
        self.config.geometry_weight = weight;
        self
    }

    #[inline]
    #[must_use = "returns the builder with min_field_confidence configured"]
    pub const fn min_field_confidence(mut self, confidence: f64) -> Self {
        self.config.min_field_confidence = confidence;
        self
    }

    /// Override one classifier weight
    #[must_use = "returns the builder with the scoring weight configured"]
    pub fn scoring_weight(mut self, kind: ZoneKind, feature: &str, weight: f64) -> Self {
        self.config
            .scoring
            .entry(kind.to_string())
            .or_default()
            .insert(feature.to_string(), weight);
        self
    }

    /// Validate and return the config
    pub fn build(self) -> Result<AnalyzerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ocr_timeout(), Duration::from_secs(2));
        assert!(config
            .template(ProcedureType::Ils)
            .contains(&"airport-elevation".to_string()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
            min_zone_area = 600.0
            ocr_policy = "always"

            [templates]
            loc = ["airport-elevation"]

            [scoring.minimums_table]
            sub_grid_columns = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.min_zone_area, 600.0);
        assert_eq!(config.ocr_policy, OcrPolicy::Always);
        assert_eq!(config.line_merge_tolerance, 0.5);
        assert_eq!(config.template(ProcedureType::Loc), vec!["airport-elevation"]);
        assert_eq!(config.scoring["minimums_table"]["sub_grid_columns"], 2.0);
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let err = AnalyzerConfigBuilder::new()
            .classification_floor(1.5)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("classification_floor"));

        let err = AnalyzerConfigBuilder::new()
            .text_weight(0.0)
            .geometry_weight(0.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("both be zero"));

        let err = AnalyzerConfigBuilder::new()
            .scoring_weight(ZoneKind::Notes, "bias", f64::NAN)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not finite"));
    }

    #[test]
    fn test_unknown_template_key_rejected() {
        let err = AnalyzerConfig::from_toml_str("[templates]\ntacan = []\n").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = AnalyzerConfig::from_toml_str("min_zone_area = \"big\"").unwrap_err();
        assert!(matches!(err, PlateError::TomlError(_)));
    }

    #[test]
    fn test_presets() {
        let minimal = AnalyzerConfigBuilder::minimal().build().unwrap();
        assert_eq!(minimal.cell_collapse_area, 0.0);
        assert_eq!(minimal.ocr_policy, OcrPolicy::Never);

        let scanned = AnalyzerConfigBuilder::scanned().build().unwrap();
        assert_eq!(scanned.ocr_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/plate-analyzer.toml")).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[test]
    fn test_load_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "classification_floor = 7.0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate-analyzer.toml");
        std::fs::write(&path, "ocr_timeout_ms = 250\ntext_weight = 0.6\ngeometry_weight = 0.4\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.ocr_timeout(), Duration::from_millis(250));
        assert_eq!(config.text_weight, 0.6);
    }
}
