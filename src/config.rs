//! Conversion and rendering configuration.
//!
//! A [`ConfigProfile`] is built once at pipeline start from defaults merged
//! with an optional user override, validated, and then shared read-only by
//! the classifier and the synthesizer. There is no global configuration
//! state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The immutable set of resolved options governing one conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigProfile {
    /// Classification thresholds
    pub conversion: ConversionOptions,

    /// Markdown rendering style
    pub markdown: MarkdownOptions,

    /// Output serialization
    pub output: OutputOptions,
}

/// Options controlling structure classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Minimum font-size ratio over body size to qualify as a heading
    pub title_font_threshold: f32,

    /// Merge adjacent same-style lines into one paragraph
    pub merge_paragraphs: bool,

    /// Enable table region detection
    pub table_detection: bool,

    /// Candidates longer than this are demoted from heading to paragraph
    pub max_heading_length: usize,

    /// Points of left indentation per list nesting level
    pub indent_unit: f32,

    /// Vertical gaps beyond this multiple of the median line gap break
    /// paragraph merging
    pub line_spacing_factor: f32,

    /// Minimum fraction of non-empty cells for a region to qualify as a
    /// table
    pub min_cell_occupancy: f32,

    /// Vertical tolerance for row clustering; derived from the median line
    /// height when unset
    pub row_tolerance: Option<f32>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            title_font_threshold: 1.2,
            merge_paragraphs: false,
            table_detection: true,
            max_heading_length: 200,
            indent_unit: 20.0,
            line_spacing_factor: 1.5,
            min_cell_occupancy: 0.5,
            row_tolerance: None,
        }
    }
}

/// Markdown style options, grouped per block kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    /// Heading rendering
    pub heading: HeadingOptions,

    /// Paragraph rendering
    pub paragraph: ParagraphOptions,

    /// List rendering
    pub list: ListOptions,

    /// Table rendering
    pub table: TableOptions,

    /// Image post-processing hints
    pub image: ImageOptions,
}

/// Heading rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingOptions {
    /// Deepest heading level emitted; deeper levels are clamped (1-6)
    pub max_level: u8,

    /// Emit a table of contents and stable `{#slug}` anchors
    pub add_toc: bool,
}

impl Default for HeadingOptions {
    fn default() -> Self {
        Self {
            max_level: 6,
            add_toc: false,
        }
    }
}

/// Paragraph rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphOptions {
    /// Wrap paragraph lines at this width; 0 disables wrapping
    pub max_line_length: usize,
}

impl Default for ParagraphOptions {
    fn default() -> Self {
        Self { max_line_length: 0 }
    }
}

/// List rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// Marker character for unordered items (-, * or +)
    pub bullet_marker: char,

    /// Spaces of indentation per nesting level
    pub indent_size: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            bullet_marker: '-',
            indent_size: 2,
        }
    }
}

/// Table rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Pad columns to the widest cell so pipes align
    pub align_columns: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            align_columns: true,
        }
    }
}

/// Hints forwarded to downstream image post-processing. Validated here,
/// never consumed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Maximum width in pixels
    pub max_width: Option<u32>,

    /// JPEG quality, 1-100
    pub quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_width: None,
            quality: 85,
        }
    }
}

/// Output serialization options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Output text encoding
    pub encoding: Encoding,

    /// Newline style
    pub line_ending: LineEnding,

    /// Guarantee exactly one trailing newline
    pub add_final_newline: bool,

    /// Emit a YAML metadata preamble before the first block
    pub include_metadata: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            line_ending: LineEnding::Lf,
            add_final_newline: true,
            include_metadata: false,
        }
    }
}

/// Supported output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// UTF-8 (default)
    #[default]
    Utf8,
}

/// Newline style for the serialized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n` (default)
    #[default]
    Lf,
    /// `\r\n`
    Crlf,
}

impl LineEnding {
    /// The literal newline sequence.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }
}

impl ConfigProfile {
    /// Create a profile with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a profile from a JSON file, merging the file's keys onto the
    /// defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidConfig(format!("config parse error: {}", e)))?;
        Self::from_json_value(value)
    }

    /// Build a profile from a JSON override merged onto the defaults.
    ///
    /// Unknown keys are rejected rather than silently ignored.
    pub fn from_json_value(overrides: serde_json::Value) -> Result<Self> {
        let mut base = serde_json::to_value(Self::default())
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        merge_json(&mut base, &overrides)?;
        let profile: Self = serde_json::from_value(base)
            .map_err(|e| Error::InvalidConfig(format!("invalid option value: {}", e)))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Profile matching GitHub-flavored Markdown conventions.
    pub fn github_flavored() -> Self {
        let mut config = Self::default();
        config.markdown.heading.add_toc = true;
        config.markdown.list.bullet_marker = '-';
        config.output.line_ending = LineEnding::Lf;
        config
    }

    /// Bare-bones profile: no preamble, no anchors, no wrapping.
    pub fn minimal() -> Self {
        let mut config = Self::default();
        config.output.include_metadata = false;
        config.markdown.heading.add_toc = false;
        config.markdown.table.align_columns = false;
        config
    }

    /// Profile for hand-edited documentation output.
    pub fn documentation() -> Self {
        let mut config = Self::default();
        config.markdown.heading.add_toc = true;
        config.markdown.paragraph.max_line_length = 100;
        config.output.include_metadata = true;
        config
    }

    /// Profile for publishing pipelines: wrapped prose, merged paragraphs.
    pub fn publishing() -> Self {
        let mut config = Self::default();
        config.conversion.merge_paragraphs = true;
        config.markdown.paragraph.max_line_length = 80;
        config.markdown.image.max_width = Some(800);
        config.markdown.image.quality = 90;
        config
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "default" => Ok(Self::default()),
            "github" | "github-flavored" => Ok(Self::github_flavored()),
            "minimal" => Ok(Self::minimal()),
            "documentation" => Ok(Self::documentation()),
            "publishing" => Ok(Self::publishing()),
            other => Err(Error::InvalidConfig(format!("unknown preset: {}", other))),
        }
    }

    /// Validate all option values, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        let c = &self.conversion;
        if !c.title_font_threshold.is_finite() || c.title_font_threshold <= 0.0 {
            return Err(Error::InvalidConfig(
                "conversion.title_font_threshold must be positive".into(),
            ));
        }
        if !c.indent_unit.is_finite() || c.indent_unit <= 0.0 {
            return Err(Error::InvalidConfig(
                "conversion.indent_unit must be positive".into(),
            ));
        }
        if !c.line_spacing_factor.is_finite() || c.line_spacing_factor <= 0.0 {
            return Err(Error::InvalidConfig(
                "conversion.line_spacing_factor must be positive".into(),
            ));
        }
        if !c.min_cell_occupancy.is_finite()
            || c.min_cell_occupancy <= 0.0
            || c.min_cell_occupancy > 1.0
        {
            return Err(Error::InvalidConfig(
                "conversion.min_cell_occupancy must be in (0, 1]".into(),
            ));
        }
        if let Some(tol) = c.row_tolerance {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(Error::InvalidConfig(
                    "conversion.row_tolerance must be positive".into(),
                ));
            }
        }

        let h = &self.markdown.heading;
        if h.max_level == 0 || h.max_level > 6 {
            return Err(Error::InvalidConfig(
                "markdown.heading.max_level must be in 1..=6".into(),
            ));
        }

        let p = &self.markdown.paragraph;
        if p.max_line_length > 0 && p.max_line_length < 20 {
            return Err(Error::InvalidConfig(
                "markdown.paragraph.max_line_length must be 0 or at least 20".into(),
            ));
        }

        let l = &self.markdown.list;
        if !matches!(l.bullet_marker, '-' | '*' | '+') {
            return Err(Error::InvalidConfig(format!(
                "markdown.list.bullet_marker must be one of '-', '*', '+', got {:?}",
                l.bullet_marker
            )));
        }
        if l.indent_size == 0 {
            return Err(Error::InvalidConfig(
                "markdown.list.indent_size must be at least 1".into(),
            ));
        }

        let i = &self.markdown.image;
        if i.quality == 0 || i.quality > 100 {
            return Err(Error::InvalidConfig(
                "markdown.image.quality must be in 1..=100".into(),
            ));
        }

        Ok(())
    }
}

/// Recursively merge `overrides` onto `base`. Objects merge key by key;
/// scalars and arrays replace. Keys absent from `base` are unrecognized
/// options and rejected.
fn merge_json(base: &mut serde_json::Value, overrides: &serde_json::Value) -> Result<()> {
    match (base, overrides) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(over_map)) => {
            for (key, over_value) in over_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_json(base_value, over_value)?,
                    None => {
                        return Err(Error::InvalidConfig(format!(
                            "unrecognized option: {}",
                            key
                        )))
                    }
                }
            }
            Ok(())
        }
        (base_slot, over_value) => {
            *base_slot = over_value.clone();
            Ok(())
        }
    }
}
