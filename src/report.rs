use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use itertools::Itertools;
use tracing::info;

use crate::classify::{Category, Region};
use crate::error::RejectReason;
use crate::partition::Partitions;
use crate::reader::LoadStatus;

/// Counters for one run. This is the only user-visible failure report:
/// skipped sources and rejected records show up here and nowhere else.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generated_at: DateTime<Local>,
    pub sources_total: usize,
    pub sources_loaded: usize,
    pub sources_repaired: usize,
    pub sources_missing: usize,
    pub sources_skipped: usize,
    /// One line per skipped source: path and reason.
    pub skipped: Vec<String>,
    pub records_read: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub duplicates: usize,
    pub enriched: usize,
    pub unique: usize,
    pub by_category: Vec<(Category, usize)>,
    pub by_region: Vec<(Region, usize)>,
    pub remote: usize,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            generated_at: Local::now(),
            sources_total: 0,
            sources_loaded: 0,
            sources_repaired: 0,
            sources_missing: 0,
            sources_skipped: 0,
            skipped: Vec::new(),
            records_read: 0,
            rejected: BTreeMap::new(),
            duplicates: 0,
            enriched: 0,
            unique: 0,
            by_category: Vec::new(),
            by_region: Vec::new(),
            remote: 0,
        }
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_source(&mut self, status: &LoadStatus, records: usize) {
        self.sources_total += 1;
        self.records_read += records;
        match status {
            LoadStatus::Loaded { repaired } => {
                self.sources_loaded += 1;
                if *repaired {
                    self.sources_repaired += 1;
                }
            }
            LoadStatus::Missing => self.sources_missing += 1,
            LoadStatus::Skipped(err) => {
                self.sources_skipped += 1;
                self.skipped.push(err.to_string());
            }
        }
    }

    pub fn record_reject(&mut self, reason: RejectReason) {
        *self.rejected.entry(reason).or_insert(0) += 1;
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn record_partitions(&mut self, parts: &Partitions) {
        self.unique = parts.len();
        self.by_category = parts.category_counts();
        self.by_region = parts.region_counts();
        self.remote = parts.remote_count();
    }

    pub fn category_count(&self, category: Category) -> usize {
        self.by_category
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn region_count(&self, region: Region) -> usize {
        self.by_region
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn log(&self) {
        info!(
            sources = self.sources_total,
            skipped = self.sources_skipped,
            missing = self.sources_missing,
            repaired = self.sources_repaired,
            records = self.records_read,
            rejected = self.rejected_total(),
            duplicates = self.duplicates,
            unique = self.unique,
            "Run complete"
        );
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Job Aggregation Summary\n");
        out.push_str(&format!(
            "- Generated: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!(
            "- Sources: {} ({} loaded, {} repaired, {} missing, {} skipped)\n",
            self.sources_total,
            self.sources_loaded,
            self.sources_repaired,
            self.sources_missing,
            self.sources_skipped
        ));
        for line in &self.skipped {
            out.push_str(&format!("  - {}\n", line));
        }
        out.push_str(&format!(
            "- Records: {} read, {} rejected, {} duplicates ({} enriched)\n",
            self.records_read,
            self.rejected_total(),
            self.duplicates,
            self.enriched
        ));
        if !self.rejected.is_empty() {
            out.push_str(&format!(
                "- Rejected by reason: {}\n",
                self.rejected
                    .iter()
                    .map(|(reason, n)| format!("{reason}={n}"))
                    .join(", ")
            ));
        }
        out.push_str(&format!(
            "- Unique jobs: {} ({} remote-capable, {:.1}%)\n",
            self.unique,
            self.remote,
            percent(self.remote, self.unique)
        ));

        out.push_str("\n### By category\n");
        for (category, count) in &self.by_category {
            out.push_str(&format!(
                "- {} {}: {}\n",
                category.icon(),
                category.slug().to_uppercase(),
                count
            ));
        }

        out.push_str("\n### By region\n");
        for (region, count) in &self.by_region {
            out.push_str(&format!(
                "- {} {}: {}\n",
                region.icon(),
                region.slug().to_uppercase(),
                count
            ));
        }
        out
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::path::PathBuf;

    #[test]
    fn counts_source_outcomes() {
        let mut summary = RunSummary::new();
        summary.record_source(&LoadStatus::Loaded { repaired: true }, 3);
        summary.record_source(&LoadStatus::Missing, 0);
        summary.record_source(
            &LoadStatus::Skipped(PipelineError::MalformedJson {
                path: PathBuf::from("x.json"),
                reason: "eof".into(),
            }),
            0,
        );
        assert_eq!(summary.sources_total, 3);
        assert_eq!(summary.sources_loaded, 1);
        assert_eq!(summary.sources_repaired, 1);
        assert_eq!(summary.sources_missing, 1);
        assert_eq!(summary.sources_skipped, 1);
        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.skipped.len(), 1);
        assert!(summary.render_markdown().contains("x.json"));
    }

    #[test]
    fn markdown_lists_every_partition() {
        let mut summary = RunSummary::new();
        summary.record_reject(RejectReason::MissingUrl);
        summary.record_reject(RejectReason::MissingUrl);
        summary.record_partitions(&Partitions::new(Vec::new()));
        let md = summary.render_markdown();
        assert!(md.contains("missing_url=2"));
        for category in Category::ALL {
            assert!(md.contains(&category.slug().to_uppercase()));
        }
        for region in Region::ALL {
            assert!(md.contains(&region.slug().to_uppercase()));
        }
        assert_eq!(summary.category_count(Category::Remote), 0);
    }

    #[test]
    fn percent_handles_zero() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
