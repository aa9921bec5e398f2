//! Input-side types: positioned text fragments with font metadata.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page coordinates (points, bottom-up Y).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x0: f32,
    /// Bottom edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal center.
    pub fn x_center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center.
    pub fn y_center(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Whether all four coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

/// A single positioned span of text with font metadata.
///
/// Fragments are produced once per page by the external reader and are the
/// smallest unit of input to classification. They are immutable; the
/// classifier consumes them and discards them once blocks are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    /// The text content
    pub text: String,

    /// Font size in points
    pub font_size: f32,

    /// Font name as reported by the reader (e.g., "Helvetica-Bold")
    pub font_name: String,

    /// Whether the font is bold
    #[serde(default)]
    pub is_bold: bool,

    /// Whether the font is italic
    #[serde(default)]
    pub is_italic: bool,

    /// Bounding box on the page
    pub bbox: BoundingBox,

    /// Page number (0-indexed)
    pub page_index: u32,

    /// Position in the reader's reading order for the page
    pub reading_order: u32,
}

impl TextFragment {
    /// Create a fragment, inferring bold/italic flags from the font name
    /// when the reader did not report them explicitly.
    pub fn new(
        text: impl Into<String>,
        font_size: f32,
        font_name: impl Into<String>,
        bbox: BoundingBox,
        page_index: u32,
        reading_order: u32,
    ) -> Self {
        let font_name = font_name.into();
        let lower = font_name.to_lowercase();
        let is_bold =
            lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
        let is_italic = lower.contains("italic") || lower.contains("oblique");

        Self {
            text: text.into(),
            font_size,
            font_name,
            is_bold,
            is_italic,
            bbox,
            page_index,
            reading_order,
        }
    }

    /// Vertical center of the fragment, used for row clustering.
    pub fn y_center(&self) -> f32 {
        self.bbox.y_center()
    }

    /// Left edge, used for indentation and column assignment.
    pub fn x(&self) -> f32 {
        self.bbox.x0
    }

    /// Check geometry and font size for values classification can't handle.
    pub fn is_well_formed(&self) -> bool {
        self.bbox.is_finite() && self.font_size.is_finite() && self.font_size > 0.0
    }
}

/// An image the extraction collaborator has already saved to disk.
///
/// The core never touches image bytes; it only places a reference at the
/// block position closest to the image's original vertical anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnchor {
    /// Externally assigned asset identifier
    pub asset_id: String,

    /// Alternative text for the Markdown image reference
    #[serde(default)]
    pub alt_text: String,

    /// Relative path the synthesizer emits in `![alt](path)`
    pub path: String,

    /// Page number (0-indexed)
    pub page_index: u32,

    /// Vertical anchor position on the page
    pub y: f32,
}

/// One page as delivered by the `PageSource` collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInput {
    /// Page number (0-indexed)
    pub index: u32,

    /// Page width in points
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Text fragments in reading order
    pub fragments: Vec<TextFragment>,

    /// Extracted images anchored to this page
    #[serde(default)]
    pub images: Vec<ImageAnchor>,

    /// Cell-boundary candidates (x positions of ruled lines or consistently
    /// aligned column starts) supplied by the low-level parser
    #[serde(default)]
    pub column_hints: Vec<f32>,
}

impl PageInput {
    /// Create an empty page with the given dimensions.
    pub fn new(index: u32, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            fragments: Vec::new(),
            images: Vec::new(),
            column_hints: Vec::new(),
        }
    }

    /// Whether the page carries neither fragments nor images.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.images.is_empty()
    }
}
