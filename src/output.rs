use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::classify::{Category, Region};
use crate::partition::Partitions;

const COMBINED_FILE: &str = "all_jobs_categorized.json";

/// Where each partition lands under the output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_path(&self, category: Category) -> PathBuf {
        self.root
            .join("by_category")
            .join(format!("{}_jobs.json", category.slug()))
    }

    pub fn region_path(&self, region: Region) -> PathBuf {
        self.root
            .join("by_region")
            .join(format!("{}_jobs.json", region.slug()))
    }

    pub fn combined_path(&self) -> PathBuf {
        self.root.join(COMBINED_FILE)
    }

    /// Paths the pipeline itself writes; never read back as sources.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        vec![
            self.root.join("by_category"),
            self.root.join("by_region"),
            self.combined_path(),
        ]
    }

    /// Write every partition, empty ones included, plus the combined set.
    /// Returns the number of files written.
    pub fn write(&self, parts: &Partitions) -> Result<usize> {
        let mut written = 0;
        for category in Category::ALL {
            save_json(&self.category_path(category), &parts.category(category))?;
            written += 1;
        }
        for region in Region::ALL {
            save_json(&self.region_path(region), &parts.region(region))?;
            written += 1;
        }
        save_json(&self.combined_path(), parts.combined())?;
        written += 1;
        info!(files = written, dir = %self.root.display(), "Wrote partitions");
        Ok(written)
    }
}

fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .with_context(|| format!("Failed to serialize {:?}", path))?;
    writer.write_all(b"\n")?;
    writer.flush().with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
