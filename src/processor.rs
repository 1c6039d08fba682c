use std::path::Path;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::checkpoint::{CheckpointEntry, CheckpointStore, CHECKPOINT_FILE};
use crate::matcher::{exact_match, expanded_names};
use crate::output::{dedup_sources, MatchedChannel, OutputStore};
use crate::playlist;

/// Channels claimed per pass.
pub const BATCH_SIZE: usize = 5;

/// Collects every matching source URL for one channel across its pending
/// files. Unreadable files are logged and skipped.
async fn collect_sources(channel: &CheckpointEntry) -> Vec<String> {
    let aliases = channel.name.aliases();
    let expanded = expanded_names(&aliases);
    let mut sources = Vec::new();

    for file in &channel.pending_files {
        let content = match tokio::fs::read_to_string(file).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Skipping unreadable file {} for {}: {}",
                    file.display(),
                    channel.name.canonical(),
                    e
                );
                continue;
            }
        };

        let map = playlist::parse(&content, &file.display().to_string());
        for (raw_name, urls) in &map {
            if exact_match(raw_name, &expanded) {
                sources.extend(urls.iter().cloned());
            }
        }
    }

    dedup_sources(sources)
}

/// Claims up to `BATCH_SIZE` pending channels in catalog order, resolves
/// each, and removes every claimed channel from the checkpoint regardless of
/// outcome. Returns `true` once nothing remains pending.
pub async fn process_batch(
    catalog: &Catalog,
    work_dir: &Path,
    output_path: &Path,
) -> anyhow::Result<bool> {
    let checkpoint_path = work_dir.join(CHECKPOINT_FILE);
    let mut checkpoint = CheckpointStore::load_required(&checkpoint_path)?;

    let pending = checkpoint.pending_in_order(catalog);
    if pending.is_empty() {
        return Ok(true);
    }

    let claimed: Vec<String> = pending.iter().take(BATCH_SIZE).cloned().collect();
    info!(
        "Processing batch of {} channels ({} pending): {}",
        claimed.len(),
        pending.len(),
        claimed.join(", ")
    );

    let mut output = OutputStore::load_or_default(output_path)?;
    let mut appended = 0usize;

    for canonical in &claimed {
        let Some(entry) = checkpoint.get(canonical).cloned() else {
            continue;
        };

        let sources = collect_sources(&entry).await;
        if sources.is_empty() {
            info!("No sources matched for {}", canonical);
        } else {
            match catalog.category_of(canonical) {
                None => warn!("No catalog category found for {}, skipping", canonical),
                Some(category) => {
                    if output.contains(canonical) {
                        info!("{} already present in output, skipping", canonical);
                    } else {
                        info!("Matched {} sources for {} ({})", sources.len(), canonical, category);
                        output.append(
                            category,
                            MatchedChannel { name: canonical.clone(), sources },
                        );
                        appended += 1;
                    }
                }
            }
        }

        // Claimed-and-evaluated is terminal; never retried this run.
        checkpoint.remove(canonical);
    }

    checkpoint.save()?;
    if appended > 0 {
        output.save_if_dirty()?;
    }

    let remaining = checkpoint.pending_count();
    info!("Batch done: {} appended, {} channels remaining", appended, remaining);
    Ok(remaining == 0)
}

pub async fn drain(catalog: &Catalog, work_dir: &Path, output_path: &Path) -> anyhow::Result<()> {
    loop {
        if process_batch(catalog, work_dir, output_path).await? {
            return Ok(());
        }
    }
}
