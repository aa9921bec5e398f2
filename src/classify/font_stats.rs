//! Document-wide font statistics for heading detection.

use std::collections::HashMap;

use crate::model::PageInput;

/// Width of the size buckets distinct heading ranks are built from. Sizes
/// closer than half a point share a rank; a size exactly on a boundary
/// rounds up into the larger bucket.
const HEADING_BUCKET: f32 = 0.5;

/// Histogram of observed font sizes and the derived heading-size ranking.
///
/// Fed once during the document pre-scan, then fixed: `analyze` computes the
/// body size (the statistical mode) and the descending list of distinct
/// heading-candidate buckets used to assign levels 1 through 6.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Observed sizes, keyed at 0.1pt precision
    size_histogram: HashMap<i32, usize>,
    /// Most frequent font size in the document
    body_size: f32,
    /// Distinct candidate buckets, largest first
    heading_buckets: Vec<f32>,
    /// Minimum size ratio for a heading candidate
    threshold: f32,
}

impl FontStatistics {
    /// Record one font size observation.
    pub fn observe(&mut self, size: f32) {
        if !size.is_finite() || size <= 0.0 {
            return;
        }
        let key = (size * 10.0).round() as i32;
        *self.size_histogram.entry(key).or_insert(0) += 1;
    }

    /// Record every fragment of a page.
    pub fn observe_page(&mut self, page: &PageInput) {
        for fragment in &page.fragments {
            self.observe(fragment.font_size);
        }
    }

    /// Total number of observations.
    pub fn sample_count(&self) -> usize {
        self.size_histogram.values().sum()
    }

    /// Fix the body size and the heading-size ranking.
    ///
    /// Mode ties resolve to the smaller size, which keeps the result
    /// deterministic and biases larger text toward heading status.
    pub fn analyze(&mut self, title_font_threshold: f32) {
        self.threshold = title_font_threshold;

        if self.size_histogram.is_empty() {
            self.body_size = 12.0;
            self.heading_buckets.clear();
            return;
        }

        let (body_key, _) = self
            .size_histogram
            .iter()
            .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
            .expect("histogram is non-empty");
        self.body_size = *body_key as f32 / 10.0;

        let min_candidate = self.candidate_floor();
        let mut buckets: Vec<f32> = self
            .size_histogram
            .keys()
            .map(|k| *k as f32 / 10.0)
            .filter(|size| *size + 1e-3 >= min_candidate)
            .map(bucket_of)
            .collect();
        buckets.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        buckets.dedup();
        self.heading_buckets = buckets;

        log::debug!(
            "font statistics: body={:.1}pt, {} heading buckets {:?}",
            self.body_size,
            self.heading_buckets.len(),
            self.heading_buckets
        );
    }

    /// The document's body font size.
    pub fn body_size(&self) -> f32 {
        self.body_size
    }

    /// Smallest size that still qualifies as a heading candidate.
    fn candidate_floor(&self) -> f32 {
        self.body_size * self.threshold
    }

    /// Heading level for a font size: rank of its bucket among the distinct
    /// candidate buckets, largest bucket first. Ranks past the sixth
    /// collapse to level 6. Sub-candidate sizes yield `None`.
    pub fn heading_level(&self, size: f32) -> Option<u8> {
        if self.heading_buckets.is_empty() || size + 1e-3 < self.candidate_floor() {
            return None;
        }

        let bucket = bucket_of(size);
        let rank = self
            .heading_buckets
            .iter()
            .filter(|b| **b > bucket + 1e-3)
            .count();
        Some((rank + 1).min(6) as u8)
    }
}

/// Round a size into its half-point bucket (half-up).
fn bucket_of(size: f32) -> f32 {
    (size / HEADING_BUCKET).round() * HEADING_BUCKET
}
