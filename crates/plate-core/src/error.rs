//! Error types for approach plate analysis
//!
//! Only conditions that prevent a page from producing a record are errors.
//! Everything else (ambiguous segmentation, OCR timeouts, missing fields) is
//! a [`Diagnostic`](crate::Diagnostic) recorded on the record itself.
//!
//! ```
//! use plate_core::{Page, PlateError};
//!
//! match Page::from_json(r#"{"id": "x", "width": -1.0, "height": 10.0}"#) {
//!     Err(PlateError::InvalidPage { reason }) => assert!(reason.contains("dimensions")),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::page::PageId;
use thiserror::Error;

/// Fatal per-page and configuration errors
#[derive(Error, Debug)]
pub enum PlateError {
    /// Vector content exists but no candidate region survived thresholding
    ///
    /// The page yields no record. Common causes:
    /// - Minimum zone area larger than every drawn box
    /// - Aspect ratio limits tighter than the plate's table cells
    #[error("Segmentation failed for page {page_id}: {reason}")]
    SegmentationFailed {
        /// Page that failed
        page_id: PageId,
        /// What the segmenter saw before giving up
        reason: String,
    },

    /// The caller cancelled this page between stages
    #[error("Analysis of page {page_id} was cancelled")]
    Cancelled {
        /// Page that was cancelled
        page_id: PageId,
    },

    /// Page input is malformed or has unusable dimensions
    #[error("Invalid page: {reason}")]
    InvalidPage {
        /// Description of what is wrong with the page
        reason: String,
    },

    /// Analyzer configuration is out of range
    #[error("Invalid configuration: {reason}")]
    ConfigError {
        /// Description of what is invalid in the configuration
        reason: String,
    },

    /// IO error while reading a configuration or page file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration file is not valid TOML for [`AnalyzerConfig`](crate::AnalyzerConfig)
    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl PlateError {
    /// Page that this error belongs to, when it is page-scoped
    #[inline]
    #[must_use = "returns the page identity, if any"]
    pub const fn page_id(&self) -> Option<&PageId> {
        match self {
            Self::SegmentationFailed { page_id, .. } | Self::Cancelled { page_id } => {
                Some(page_id)
            }
            _ => None,
        }
    }

    /// Returns true if this error is a configuration error (user-fixable)
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. } | Self::TomlError(_))
    }

    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_segmentation_failure(&self) -> bool {
        matches!(self, Self::SegmentationFailed { .. })
    }

    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true if this is an I/O error
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::IoError(_))
    }
}

/// Type alias for Result with [`PlateError`]
pub type Result<T> = std::result::Result<T, PlateError>;
