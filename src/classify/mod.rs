//! Structure classification: fragments in, typed blocks out.
//!
//! Classification is a pure function of `(fragments, font statistics,
//! config)`. The document-wide font statistics are collected in a separate
//! read-only pass before any page is classified, so heading levels stay
//! consistent across pages.

mod classifier;
mod font_stats;
mod table_detector;

pub use classifier::{fallback_page_dump, StructureClassifier};
pub use font_stats::FontStatistics;
pub use table_detector::{TableRegion, TableRegionDetector};
