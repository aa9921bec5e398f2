//! Rendering of the classified document tree to Markdown.

mod markdown;

pub use markdown::{render, MarkdownSynthesizer};
