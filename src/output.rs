use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{CategoryPath, CATEGORY_TABLE};
use crate::checkpoint::atomic_write;

pub const MAX_SOURCES_PER_CHANNEL: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedChannel {
    pub name: String,
    pub sources: Vec<String>,
}

type CategoryMap = BTreeMap<String, BTreeMap<String, Vec<MatchedChannel>>>;

/// Cumulative collection of matched channels, mirroring the catalog's
/// category shape. Appends are the only mutation.
#[derive(Debug)]
pub struct OutputStore {
    path: PathBuf,
    categories: CategoryMap,
    dirty: bool,
}

fn empty_skeleton() -> CategoryMap {
    let mut categories = CategoryMap::new();
    for path in CATEGORY_TABLE {
        categories
            .entry(path.section.to_string())
            .or_default()
            .entry(path.leaf.to_string())
            .or_default();
    }
    categories
}

impl OutputStore {
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        let mut categories = empty_skeleton();
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read output store {}", path.display()))?;
            let existing: CategoryMap = serde_json::from_str(&raw)
                .with_context(|| format!("output store {} is not valid JSON", path.display()))?;
            for (section, leaves) in existing {
                for (leaf, channels) in leaves {
                    categories.entry(section.clone()).or_default().insert(leaf, channels);
                }
            }
        }
        Ok(Self { path: path.to_path_buf(), categories, dirty: false })
    }

    /// Linear scan over every category; the dedup contract is global.
    pub fn contains(&self, canonical: &str) -> bool {
        self.categories
            .values()
            .flat_map(|leaves| leaves.values())
            .flatten()
            .any(|channel| channel.name == canonical)
    }

    pub fn append(&mut self, category: &CategoryPath, channel: MatchedChannel) {
        self.categories
            .entry(category.section.to_string())
            .or_default()
            .entry(category.leaf.to_string())
            .or_default()
            .push(channel);
        self.dirty = true;
    }

    pub fn channel_count(&self) -> usize {
        self.categories
            .values()
            .flat_map(|leaves| leaves.values())
            .map(Vec::len)
            .sum()
    }

    /// Rewrites the whole document, but only after an append.
    pub fn save_if_dirty(&mut self) -> anyhow::Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(&self.categories)?;
        atomic_write(&self.path, json.as_bytes())
            .with_context(|| format!("failed to write output store {}", self.path.display()))?;
        info!("Wrote output store {} ({} channels)", self.path.display(), self.channel_count());
        self.dirty = false;
        Ok(true)
    }
}

/// Order-preserving dedup, capped at the per-channel source limit.
pub fn dedup_sources(urls: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        if out.len() >= MAX_SOURCES_PER_CHANNEL {
            break;
        }
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}
