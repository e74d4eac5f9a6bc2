//! Segmentation, zone classification and field extraction for FAA
//! instrument approach plates.
//!
//! # Pipeline
//!
//! 1. [`PrimitiveExtractor`]: deduplicated lines and rectangles
//! 2. [`Segmenter`]: candidate zones from the drawn layout
//! 3. [`TextLocator`]: OCR for zones without page text, under a timeout
//! 4. [`ZoneClassifier`]: weighted feature scoring per zone kind
//! 5. [`FieldExtractor`]: typed fields with provenance per zone
//! 6. [`RecordAssembler`]: conflict resolution and completeness
//!
//! [`PlateAnalyzer`] runs them in order for one page, or for a batch of
//! pages in parallel.
//!
//! ```no_run
//! use plate_analyzer::PlateAnalyzer;
//! use plate_core::{AnalyzerConfig, Page};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let page = Page::from_json(&std::fs::read_to_string("plate.json")?)?;
//! let analyzer = PlateAnalyzer::new(AnalyzerConfig::default())?;
//! let record = analyzer.analyze(&page)?;
//! println!("{}", record.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod classifier;
pub mod extract;
pub mod pipeline;
pub mod primitives;
pub mod segmenter;
pub mod text_locator;

pub use assembler::RecordAssembler;
pub use classifier::{Feature, ScoringTable, ZoneClassifier};
pub use extract::{ExtractContext, ExtractZone, FieldExtractor};
pub use pipeline::{CancelToken, PlateAnalyzer};
pub use primitives::{PrimitiveExtractor, PrimitiveSet};
pub use segmenter::{Segmentation, Segmenter, SegmenterConfig};
pub use text_locator::{CollaboratorError, NoOcr, TextCollaborator, TextLocator, TokenArena};
