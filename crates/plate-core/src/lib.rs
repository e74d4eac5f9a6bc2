//! Data model for FAA instrument approach plate analysis.
//!
//! This crate holds everything the analysis stages exchange: page geometry
//! and text as handed over by the PDF collaborator, zones, extracted fields
//! with provenance, diagnostics, the assembled [`ApproachProcedure`] record,
//! procedure templates and the [`AnalyzerConfig`]. It carries no pipeline
//! logic; see the `plate-analyzer` crate for that.

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod field;
pub mod geometry;
pub mod page;
pub mod record;
pub mod template;
pub mod zone;

pub use config::{load_config, AnalyzerConfig, AnalyzerConfigBuilder, OcrPolicy};
pub use diagnostic::Diagnostic;
pub use error::{PlateError, Result};
pub use field::{
    Annotation, ExtractedField, FieldValue, MinimumsLine, Provenance, Unit, Visibility, ZoneRef,
};
pub use geometry::{BBox, Point};
pub use page::{
    LinePrimitive, Orientation, Page, PageId, PaintStyle, RectPrimitive, TextToken, TokenSource,
};
pub use record::{ApproachProcedure, AuditNote, RecordParts};
pub use template::{find_title, matches_pattern, parse_title, ProcedureType, TitleInfo};
pub use zone::{BoundarySupport, PrimitiveRef, SubGrid, TokenId, Zone, ZoneId, ZoneKind};
