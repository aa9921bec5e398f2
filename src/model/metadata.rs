//! Document-level metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata carried from the source document into the output preamble.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Document subject
    pub subject: Option<String>,

    /// Source filename, as reported by the reader
    pub source_file: Option<String>,

    /// Total number of pages
    #[serde(default)]
    pub page_count: u32,

    /// Creation date of the source document
    pub created: Option<DateTime<Utc>>,

    /// When this conversion ran. Stamped once by the pipeline so rendering
    /// stays a pure function of (tree, config).
    pub generated: Option<DateTime<Utc>>,
}

impl DocMetadata {
    /// Convert metadata to a YAML frontmatter block (including the closing
    /// `---` line and a trailing blank line).
    pub fn to_yaml_frontmatter(&self) -> String {
        let mut lines = vec!["---".to_string()];

        if let Some(ref title) = self.title {
            lines.push(format!("title: \"{}\"", escape_yaml(title)));
        }
        if let Some(ref author) = self.author {
            lines.push(format!("author: \"{}\"", escape_yaml(author)));
        }
        if let Some(ref subject) = self.subject {
            lines.push(format!("subject: \"{}\"", escape_yaml(subject)));
        }
        if let Some(ref source) = self.source_file {
            lines.push(format!("source: \"{}\"", escape_yaml(source)));
        }
        if let Some(ref generated) = self.generated {
            lines.push(format!("generated: {}", generated.to_rfc3339()));
        }
        lines.push(format!("pages: {}", self.page_count));

        lines.push("---".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Escape special characters for YAML strings.
fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontmatter() {
        let meta = DocMetadata {
            title: Some("Test Document".to_string()),
            author: Some("Jane Doe".to_string()),
            source_file: Some("input.pdf".to_string()),
            page_count: 10,
            ..Default::default()
        };

        let yaml = meta.to_yaml_frontmatter();
        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("title: \"Test Document\""));
        assert!(yaml.contains("author: \"Jane Doe\""));
        assert!(yaml.contains("source: \"input.pdf\""));
        assert!(yaml.contains("pages: 10"));
    }

    #[test]
    fn test_yaml_escaping() {
        let meta = DocMetadata {
            title: Some("Quote \" and \\ slash".to_string()),
            ..Default::default()
        };
        let yaml = meta.to_yaml_frontmatter();
        assert!(yaml.contains("Quote \\\" and \\\\ slash"));
    }
}
