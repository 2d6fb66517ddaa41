//! Runs Reader -> Classifier -> Aggregator -> Scorer end to end, emitting
//! progress and assembling the JSON result document (spec.md §4.5, §6).

pub mod hashing;
pub mod session;
pub mod writer;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::aggregator::{aggregate, Region};
#[cfg(not(feature = "parallel"))]
use crate::classifier::classify_block;
use crate::classifier::BlockResult;
use crate::config::ScannerConfig;
use crate::scorer::{compute_score, ScanStats};
use crate::{reader::BlockReader, ScanError, ScanResult};

/// Cooperative cancellation flag, checked between blocks (spec.md §5). A
/// thin `Arc<AtomicBool>` wrapper rather than a channel: the orchestrator
/// only ever needs to poll it, never await on it.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Invoked with `(blocks_done, total_blocks)` at most every
/// `progress_interval_blocks` blocks, per spec.md §4.5.
pub type ProgressCallback<'a> = dyn FnMut(u64, u64) + 'a;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSummary {
    pub id: usize,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub wipe_type: String,
    pub entropy: f64,
    pub confidence: f64,
    pub block_count: usize,
}

impl From<&Region> for RegionSummary {
    fn from(r: &Region) -> Self {
        RegionSummary {
            id: r.id,
            start: r.start_offset,
            end: r.end_offset,
            size: r.size,
            wipe_type: r.wipe_type.to_string(),
            entropy: round3(r.avg_entropy),
            confidence: r.confidence,
            block_count: r.block_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    pub id: u64,
    #[serde(rename = "type")]
    pub wipe_type: String,
    pub entropy: f64,
}

impl From<&BlockResult> for BlockSummary {
    fn from(b: &BlockResult) -> Self {
        BlockSummary {
            id: b.block_id,
            wipe_type: b.wipe_type.to_string(),
            entropy: b.entropy,
        }
    }
}

/// The full JSON result document (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDocument {
    pub session_id: String,
    pub filename: String,
    pub sha256: Option<String>,
    pub size_bytes: u64,
    pub size_human: String,
    pub scanned_at: String,
    pub stats: ScanStats,
    pub regions: Vec<RegionSummary>,
    pub blocks: Vec<BlockSummary>,
}

/// Raw pipeline output, ahead of result-document assembly — the piece
/// [`run_scan`] actually computes.
pub struct ScanOutcome {
    pub blocks: Vec<BlockResult>,
    pub regions: Vec<Region>,
    pub stats: ScanStats,
}

/// Run the full pipeline over `image_path`. Checks `cancel` between every
/// block and discards partial state on cancellation (spec.md §5).
#[instrument(skip(config, progress, cancel), fields(image = %image_path.as_ref().display()))]
pub fn run_scan(
    image_path: impl AsRef<Path>,
    config: &ScannerConfig,
    mut progress: impl FnMut(u64, u64),
    cancel: &CancellationToken,
) -> ScanResult<ScanOutcome> {
    let image_path = image_path.as_ref();
    let reader = BlockReader::new(image_path, config)?;
    let total_blocks = reader.total_blocks;
    info!(total_blocks, "starting scan");

    #[cfg(feature = "parallel")]
    let blocks = {
        // Classification is embarrassingly parallel per block (spec.md §5);
        // buffer the stream first so rayon can fan the classify step out
        // across a worker pool instead of classifying one block per read.
        let mut raw = Vec::with_capacity(total_blocks as usize);
        let mut last_reported = 0u64;

        reader.for_each_block(|block| {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            if block.id - last_reported >= config.progress_interval_blocks || block.id + 1 == total_blocks {
                progress(block.id + 1, total_blocks);
                last_reported = block.id;
            }
            raw.push(block);
            Ok(())
        })?;

        crate::classifier::classify_blocks_parallel(&raw, config)
    };

    #[cfg(not(feature = "parallel"))]
    let blocks = {
        let mut blocks = Vec::with_capacity(total_blocks as usize);
        let mut last_reported = 0u64;

        reader.for_each_block(|block| {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let result = classify_block(block.id, block.offset, &block.data, config);
            blocks.push(result);

            if block.id - last_reported >= config.progress_interval_blocks || block.id + 1 == total_blocks {
                progress(block.id + 1, total_blocks);
                last_reported = block.id;
            }
            Ok(())
        })?;

        blocks
    };

    debug_assert!(blocks.windows(2).all(|w| w[0].block_id < w[1].block_id));

    debug!(classified = blocks.len(), "classification complete, aggregating");
    let regions = aggregate(&blocks, config);
    let stats = compute_score(&blocks, &regions);
    info!(verdict = %stats.verdict, intent_score = stats.intent_score, regions = regions.len(), "scan complete");

    Ok(ScanOutcome { blocks, regions, stats })
}

/// Assemble the JSON result document from a completed [`ScanOutcome`].
pub fn build_result_document(
    session_id: impl Into<String>,
    filename: impl Into<String>,
    sha256: Option<String>,
    size_bytes: u64,
    outcome: ScanOutcome,
) -> ResultDocument {
    ResultDocument {
        session_id: session_id.into(),
        filename: filename.into(),
        sha256,
        size_bytes,
        size_human: writer::size_human(size_bytes),
        scanned_at: Utc::now().to_rfc3339(),
        stats: outcome.stats,
        regions: outcome.regions.iter().map(RegionSummary::from).collect(),
        blocks: outcome.blocks.iter().map(BlockSummary::from).collect(),
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
