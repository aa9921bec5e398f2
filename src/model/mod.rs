//! Document model types.
//!
//! This module defines the intermediate representation that bridges the
//! external page reader and Markdown rendering: positioned text fragments
//! on the input side, a flat tree of typed blocks on the output side.

mod block;
mod fragment;
mod metadata;

pub use block::{DocumentBlock, DocumentTree};
pub use fragment::{BoundingBox, ImageAnchor, PageInput, TextFragment};
pub use metadata::DocMetadata;
