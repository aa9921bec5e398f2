//! Table region detection from text position analysis.
//!
//! Detects rectangular table regions by clustering fragments into rows and
//! columns, preferring the geometric hints supplied by the low-level parser
//! and falling back to left-edge alignment voting. The detector never
//! errors: on ambiguous geometry it returns no table and lets the fragments
//! fall through to paragraph and list classification, because a wrongly
//! split table is harder to recover from downstream than one rendered as
//! plain text.

use crate::config::ConversionOptions;
use crate::model::{BoundingBox, DocumentBlock, TextFragment};

/// X positions within one bucket vote for the same column edge.
const EDGE_BUCKET: f32 = 5.0;

/// Column edges closer than this merge into one.
const MIN_COLUMN_GAP: f32 = 15.0;

/// Fraction of multi-fragment rows a voted edge must appear in.
const MIN_EDGE_RATIO: f32 = 0.3;

/// More voted boundaries than this means word-level fragment splitting,
/// not a table. Hinted boundaries (ruled lines) are exempt.
const MAX_VOTED_COLUMNS: usize = 6;

/// A detected table region with its content.
#[derive(Debug, Clone)]
pub struct TableRegion {
    /// Bounding box of the whole region
    pub bbox: BoundingBox,
    /// Rows of cells; each cell holds its x-sorted fragments
    pub rows: Vec<Vec<Vec<TextFragment>>>,
}

impl TableRegion {
    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Collapse the region into a table block, joining cell fragments in
    /// x order with single spaces.
    pub fn to_block(&self) -> DocumentBlock {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        cell.iter()
                            .map(|f| f.text.trim())
                            .filter(|t| !t.is_empty())
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect()
            })
            .collect();
        DocumentBlock::Table { rows }
    }
}

/// Detects table regions on one page of fragments.
pub struct TableRegionDetector {
    options: ConversionOptions,
}

impl TableRegionDetector {
    /// Create a detector from the conversion options.
    pub fn new(options: &ConversionOptions) -> Self {
        Self {
            options: options.clone(),
        }
    }

    /// Partition `fragments` into table regions and the complementary
    /// stream of fragments left for paragraph/list classification.
    ///
    /// `column_hints` are cell-boundary candidates (ruled-line x positions)
    /// from the external parser; when fewer than two are given, boundaries
    /// are recovered from left-edge alignment across rows.
    pub fn detect(
        &self,
        fragments: Vec<TextFragment>,
        column_hints: &[f32],
    ) -> (Vec<TableRegion>, Vec<TextFragment>) {
        if fragments.len() < 4 {
            return (vec![], fragments);
        }

        let rows = self.cluster_rows(&fragments);
        if rows.len() < 2 {
            log::debug!("table detector: only {} row(s), no table", rows.len());
            return (vec![], fragments);
        }

        let columns = self.column_boundaries(&fragments, &rows, column_hints);
        if columns.len() < 2 {
            log::debug!(
                "table detector: {} column boundary(ies), no table",
                columns.len()
            );
            return (vec![], fragments);
        }

        // A row is tabular when it occupies at least two distinct columns.
        let tabular: Vec<bool> = rows
            .iter()
            .map(|row| self.occupied_columns(row, &fragments, &columns) >= 2)
            .collect();

        let mut regions = Vec::new();
        let mut used: Vec<bool> = vec![false; fragments.len()];

        let mut i = 0;
        while i < rows.len() {
            if !tabular[i] {
                i += 1;
                continue;
            }
            let start = i;
            while i < rows.len() && tabular[i] {
                i += 1;
            }
            let run = &rows[start..i];
            if run.len() < 2 {
                continue;
            }

            if let Some(region) = self.build_region(run, &fragments, &columns) {
                for row in run {
                    for &idx in &row.members {
                        used[idx] = true;
                    }
                }
                regions.push(region);
            }
        }

        let leftover: Vec<TextFragment> = fragments
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !used[*idx])
            .map(|(_, f)| f)
            .collect();

        (regions, leftover)
    }

    /// Cluster fragments into rows by vertical center.
    ///
    /// Cluster centers are formed greedily top-to-bottom, then every
    /// fragment is assigned to the nearest center by absolute distance;
    /// an exact midpoint tie goes to the upper row.
    fn cluster_rows(&self, fragments: &[TextFragment]) -> Vec<RowCluster> {
        let tolerance = self.row_tolerance(fragments);

        let mut order: Vec<usize> = (0..fragments.len()).collect();
        order.sort_by(|a, b| {
            fragments[*b]
                .y_center()
                .partial_cmp(&fragments[*a].y_center())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Greedy center formation, top to bottom.
        let mut centers: Vec<f32> = Vec::new();
        let mut sum = 0.0_f32;
        let mut count = 0usize;
        for &idx in &order {
            let y = fragments[idx].y_center();
            if count > 0 && (sum / count as f32 - y).abs() > tolerance {
                centers.push(sum / count as f32);
                sum = 0.0;
                count = 0;
            }
            sum += y;
            count += 1;
        }
        if count > 0 {
            centers.push(sum / count as f32);
        }

        // Nearest-center assignment; ties break to the upper (larger-y,
        // earlier) center, which greedy formation lists first.
        let mut clusters: Vec<RowCluster> = centers
            .iter()
            .map(|&y| RowCluster {
                y,
                members: Vec::new(),
            })
            .collect();
        for &idx in &order {
            let y = fragments[idx].y_center();
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for (c, center) in centers.iter().enumerate() {
                let dist = (y - center).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            clusters[best].members.push(idx);
        }

        clusters.retain(|c| !c.members.is_empty());
        clusters.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));
        for cluster in &mut clusters {
            cluster.members.sort_by(|a, b| {
                fragments[*a]
                    .x()
                    .partial_cmp(&fragments[*b].x())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        clusters
    }

    /// Row clustering tolerance: the configured override, or half the
    /// median fragment height.
    fn row_tolerance(&self, fragments: &[TextFragment]) -> f32 {
        if let Some(tol) = self.options.row_tolerance {
            return tol;
        }
        let mut heights: Vec<f32> = fragments
            .iter()
            .map(|f| f.bbox.height().abs().max(f.font_size))
            .collect();
        heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = heights[heights.len() / 2];
        (median * 0.5).max(1.0)
    }

    /// Column boundaries: supplied hints when the parser found ruled lines,
    /// otherwise left-edge alignment voting across multi-fragment rows.
    fn column_boundaries(
        &self,
        fragments: &[TextFragment],
        rows: &[RowCluster],
        hints: &[f32],
    ) -> Vec<f32> {
        let hinted = hints.len() >= 2;
        let mut edges: Vec<f32> = if hinted {
            hints.iter().copied().filter(|h| h.is_finite()).collect()
        } else {
            self.vote_edges(fragments, rows)
        };

        edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(last) if edge - last < MIN_COLUMN_GAP => {}
                _ => merged.push(edge),
            }
        }

        if !hinted && merged.len() > MAX_VOTED_COLUMNS {
            log::debug!(
                "table detector: {} voted boundaries looks like word-level \
                 splitting, no table",
                merged.len()
            );
            return vec![];
        }

        log::debug!("table detector: column boundaries {:?}", merged);
        merged
    }

    /// Bucket the left edges of fragments and keep buckets that repeat
    /// across enough multi-fragment rows.
    fn vote_edges(&self, fragments: &[TextFragment], rows: &[RowCluster]) -> Vec<f32> {
        let multi: Vec<&RowCluster> = rows.iter().filter(|r| r.members.len() >= 2).collect();
        if multi.len() < 2 {
            return vec![];
        }

        let mut counts: std::collections::HashMap<i32, usize> = std::collections::HashMap::new();
        for row in &multi {
            let mut seen: std::collections::HashSet<i32> = std::collections::HashSet::new();
            for &idx in &row.members {
                seen.insert((fragments[idx].x() / EDGE_BUCKET).round() as i32);
            }
            for bucket in seen {
                *counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences = ((multi.len() as f32 * MIN_EDGE_RATIO) as usize).max(2);
        counts
            .into_iter()
            .filter(|(_, count)| *count >= min_occurrences)
            .map(|(bucket, _)| bucket as f32 * EDGE_BUCKET)
            .collect()
    }

    /// Number of distinct columns a row occupies.
    fn occupied_columns(
        &self,
        row: &RowCluster,
        fragments: &[TextFragment],
        columns: &[f32],
    ) -> usize {
        let mut seen: std::collections::HashSet<usize> = std::collections::HashSet::new();
        for &idx in &row.members {
            seen.insert(column_for(fragments[idx].x(), columns));
        }
        seen.len()
    }

    /// Materialize a contiguous run of tabular rows into a region, or
    /// reject it on shape, occupancy, or list-pattern grounds.
    fn build_region(
        &self,
        run: &[RowCluster],
        fragments: &[TextFragment],
        columns: &[f32],
    ) -> Option<TableRegion> {
        let cols = columns.len();
        let mut grid: Vec<Vec<Vec<TextFragment>>> = Vec::with_capacity(run.len());
        let mut bbox: Option<BoundingBox> = None;

        for row in run {
            let mut cells: Vec<Vec<TextFragment>> = vec![Vec::new(); cols];
            for &idx in &row.members {
                let fragment = &fragments[idx];
                bbox = Some(match bbox {
                    Some(b) => b.union(&fragment.bbox),
                    None => fragment.bbox,
                });
                cells[column_for(fragment.x(), columns)].push(fragment.clone());
            }
            grid.push(cells);
        }

        let total_cells = run.len() * cols;
        let filled = grid
            .iter()
            .flat_map(|r| r.iter())
            .filter(|c| !c.is_empty())
            .count();
        let occupancy = filled as f32 / total_cells as f32;
        if occupancy < self.options.min_cell_occupancy {
            log::debug!(
                "table detector: occupancy {:.2} below {:.2}, degrading to text",
                occupancy,
                self.options.min_cell_occupancy
            );
            return None;
        }

        if self.is_list_pattern(&grid) {
            log::debug!("table detector: list pattern, degrading to text");
            return None;
        }

        Some(TableRegion {
            bbox: bbox?,
            rows: grid,
        })
    }

    /// A bulleted or numbered list whose markers landed in their own
    /// column looks like a two-column table; catch that false positive.
    fn is_list_pattern(&self, grid: &[Vec<Vec<TextFragment>>]) -> bool {
        let mut bullets = 0usize;
        let mut numbers = 0usize;

        for row in grid {
            let first_text = row
                .iter()
                .flat_map(|cell| cell.iter())
                .next()
                .map(|f| f.text.trim());
            match first_text {
                Some(t) if is_bullet_marker(t) => bullets += 1,
                Some(t) if is_number_marker(t) => numbers += 1,
                _ => {}
            }
        }

        let rows = grid.len().max(1);
        let bullet_ratio = bullets as f32 / rows as f32;
        let marker_ratio = (bullets + numbers) as f32 / rows as f32;

        // Bullet glyphs are almost never real table data; bare numbers can
        // be, so only reject two-column layouts for those.
        bullet_ratio >= 0.5
            || (grid.first().map(|r| r.len()) == Some(2) && marker_ratio >= 0.5)
    }
}

/// A row cluster: center y plus member fragment indices, x-sorted.
#[derive(Debug, Clone)]
struct RowCluster {
    y: f32,
    members: Vec<usize>,
}

/// Column index for an x position: the rightmost boundary at or left of it
/// (with a small tolerance), else the nearest boundary.
fn column_for(x: f32, columns: &[f32]) -> usize {
    for (i, &start) in columns.iter().enumerate() {
        let end = columns.get(i + 1).copied().unwrap_or(f32::MAX);
        if x >= start - 10.0 && x < end - 10.0 {
            return i;
        }
    }

    let mut best = 0usize;
    let mut best_dist = f32::MAX;
    for (i, &start) in columns.iter().enumerate() {
        let dist = (x - start).abs();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Check if text is a bullet glyph.
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text,
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "‣" | "▸" | "►" | "■" | "●"
    )
}

/// Check if text is a number-style list marker ("1.", "12)", "a.", bare "3").
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let prefix = &cleaned[..pos];
        let suffix = &cleaned[pos..];
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}
