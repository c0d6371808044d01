//! Reader → Normalizer → Deduplicator → Classifier → Partitioner.
//!
//! Reading and normalizing fan out per source (rayon, when enabled);
//! deduplication is a single-threaded fold over the results in source order,
//! so first-seen is the same on every run.

use std::path::PathBuf;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{debug, info};
#[cfg(feature = "rayon")]
use tracing::warn;

use crate::classify::{ClassifiedPosting, Classifier};
use crate::config::Settings;
use crate::dedup::Deduplicator;
use crate::error::{PipelineError, RejectReason};
use crate::normalize::{CanonicalPosting, Normalizer};
use crate::output::OutputLayout;
use crate::partition::Partitions;
use crate::reader::{self, LoadStatus, SourceLoad, SourceUnit};
use crate::report::RunSummary;

pub struct Pipeline {
    sources: Vec<PathBuf>,
    layout: OutputLayout,
    workers: Option<usize>,
    normalizer: Normalizer,
    classifier: Classifier,
}

pub struct RunOutput {
    pub partitions: Partitions,
    pub summary: RunSummary,
}

/// One source after read + normalize, before it joins the fold.
struct Ingested {
    unit: SourceUnit,
    status: LoadStatus,
    records: usize,
    postings: Vec<CanonicalPosting>,
    rejects: Vec<RejectReason>,
}

impl Pipeline {
    /// Fails only when the keyword configuration does not compile.
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        Ok(Self {
            sources: settings.sources.clone(),
            layout: OutputLayout::new(settings.output_dir.clone()),
            workers: settings.workers,
            normalizer: Normalizer::new(&settings.tracking_params),
            classifier: Classifier::new(&settings.keywords)?,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Source units in declared priority order, minus our own outputs.
    pub fn discover(&self) -> Vec<SourceUnit> {
        reader::discover_sources(&self.sources, &self.layout.owned_paths())
    }

    /// Full run over files. Never fails: bad sources and records are counted
    /// in the summary.
    pub fn run(&self, units: &[SourceUnit]) -> RunOutput {
        info!(sources = units.len(), "Reading sources");
        let ingested = self.ingest_all(units);
        self.finish(ingested)
    }

    /// Run over sources that were already loaded, e.g. from byte streams.
    pub fn process_loads(&self, loads: impl IntoIterator<Item = SourceLoad>) -> RunOutput {
        let ingested: Vec<Ingested> = loads.into_iter().map(|l| self.normalize_load(l)).collect();
        self.finish(ingested)
    }

    #[cfg(feature = "rayon")]
    fn ingest_all(&self, units: &[SourceUnit]) -> Vec<Ingested> {
        let work = || -> Vec<Ingested> {
            units
                .par_iter()
                .map(|u| self.normalize_load(reader::read_source(u)))
                .collect()
        };
        match self.workers {
            Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    warn!(error = %e, "Could not build reader pool, using global pool");
                    work()
                }
            },
            None => work(),
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn ingest_all(&self, units: &[SourceUnit]) -> Vec<Ingested> {
        reader::read_sources(units)
            .map(|load| self.normalize_load(load))
            .collect()
    }

    fn normalize_load(&self, load: SourceLoad) -> Ingested {
        let SourceLoad {
            unit,
            status,
            records,
            non_objects,
        } = load;
        let name = unit.name();
        let total = records.len() + non_objects;

        let mut postings = Vec::with_capacity(records.len());
        let mut rejects = vec![RejectReason::NotAnObject; non_objects];
        for raw in records {
            match self.normalizer.normalize(raw, &name) {
                Ok(p) => postings.push(p),
                Err(reason) => {
                    debug!(source = %unit.path.display(), %reason, "Rejected record");
                    rejects.push(reason);
                }
            }
        }

        Ingested {
            unit,
            status,
            records: total,
            postings,
            rejects,
        }
    }

    fn finish(&self, ingested: Vec<Ingested>) -> RunOutput {
        let mut summary = RunSummary::new();
        let mut dedup = Deduplicator::new();

        for source in ingested {
            if matches!(source.status, LoadStatus::Loaded { .. }) {
                info!(
                    source = %source.unit.path.display(),
                    records = source.records,
                    kept = source.postings.len(),
                    rejected = source.rejects.len(),
                    "Loaded source"
                );
            }
            summary.record_source(&source.status, source.records);
            for reason in source.rejects {
                summary.record_reject(reason);
            }
            dedup.extend(source.postings);
        }
        summary.duplicates = dedup.duplicates();
        summary.enriched = dedup.enriched();

        let tagged = self.tag_all(dedup.into_postings());
        let partitions = Partitions::new(tagged);
        summary.record_partitions(&partitions);

        RunOutput {
            partitions,
            summary,
        }
    }

    #[cfg(feature = "rayon")]
    fn tag_all(&self, postings: Vec<CanonicalPosting>) -> Vec<ClassifiedPosting> {
        postings
            .into_par_iter()
            .map(|p| self.classifier.tag(p))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn tag_all(&self, postings: Vec<CanonicalPosting>) -> Vec<ClassifiedPosting> {
        postings.into_iter().map(|p| self.classifier.tag(p)).collect()
    }
}
