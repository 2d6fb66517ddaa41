//! Converts the ordered classification stream into merged, filtered,
//! de-noised, multi-pass-aware regions with per-region confidence
//! (spec.md §4.3).
//!
//! Six stages, applied in order, each consuming the previous stage's
//! output:
//!
//! 1. Merge consecutive same-type suspicious blocks into raw regions.
//! 2. Absorb noise: fuse same-type neighbours separated by a small gap.
//! 3. Size filter: drop regions smaller than `min_region_blocks`.
//! 4. Multi-pass detection: fold alternating strong-wipe bands into one
//!    `MULTI_PASS` region.
//! 5. False-positive suppression: drop `PARTIAL` regions with no `STRONG`
//!    corroboration nearby.
//! 6. Confidence: refine each surviving region's score from region-level
//!    context.
//!
//! This is the richer variant spec.md §9 calls out as the intended design,
//! as opposed to the simpler merge/size/multi-pass/score pipeline found
//! standalone in the retrieved Python reference (which lacks stages 2 and
//! 5 below). Those two stages are implemented fresh from the spec's prose.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::classifier::{BlockResult, WipeType};
use crate::config::ScannerConfig;

/// A contiguous forensic region assembled from one or more member blocks
/// (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: usize,
    pub start_offset: u64,
    pub end_offset: u64,
    pub size: u64,
    pub wipe_type: WipeType,
    pub block_count: usize,
    pub avg_entropy: f64,
    pub confidence: f64,
    pub blocks: Vec<u64>,
}

impl Region {
    fn from_run(run: &[&BlockResult], block_size: u64) -> Self {
        let start_offset = run[0].block_id * block_size;
        let end_offset = run.last().unwrap().block_id * block_size + block_size - 1;
        let avg_entropy = run.iter().map(|b| b.entropy).sum::<f64>() / run.len() as f64;

        Region {
            id: 0,
            start_offset,
            end_offset,
            size: end_offset - start_offset + 1,
            wipe_type: run[0].wipe_type,
            block_count: run.len(),
            avg_entropy,
            confidence: 0.0,
            blocks: run.iter().map(|b| b.block_id).collect(),
        }
    }
}

/// Run the full six-stage aggregation pipeline.
pub fn aggregate(results: &[BlockResult], config: &ScannerConfig) -> Vec<Region> {
    if results.is_empty() {
        return Vec::new();
    }

    let merged = merge_consecutive(results, config.block_size);
    let absorbed = absorb_noise(merged, results, config);
    let sized = filter_by_size(absorbed, config.min_region_blocks);
    let with_multi = detect_multi_pass(sized, results, config);
    let suppressed = suppress_false_positives(with_multi, config);
    let mut finalised = compute_confidence(suppressed, results);

    finalised.sort_by_key(|r| r.start_offset);
    for (i, r) in finalised.iter_mut().enumerate() {
        r.id = i + 1;
    }
    finalised
}

/// Stage 1: merge consecutive suspicious blocks of identical `wipe_type`
/// into raw regions. A non-suspicious block, or a type change, terminates
/// the current run.
fn merge_consecutive(results: &[BlockResult], block_size: u64) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut i = 0;
    while i < results.len() {
        if !results[i].is_suspicious {
            i += 1;
            continue;
        }
        let wipe_type = results[i].wipe_type;
        let mut j = i + 1;
        while j < results.len() && results[j].is_suspicious && results[j].wipe_type == wipe_type {
            j += 1;
        }
        let run: Vec<&BlockResult> = results[i..j].iter().collect();
        regions.push(Region::from_run(&run, block_size));
        i = j;
    }
    regions
}

/// Stage 2: fuse same-type neighbouring regions separated by a gap of at
/// most `max_normal_gap` blocks, absorbing the intervening (non-suspicious,
/// or differently-typed) blocks as noise. Real wipe tools skip filesystem
/// metadata, leaving small gaps inside an otherwise-continuous wipe.
fn absorb_noise(regions: Vec<Region>, all_blocks: &[BlockResult], config: &ScannerConfig) -> Vec<Region> {
    if regions.is_empty() {
        return regions;
    }

    let mut out: Vec<Region> = Vec::with_capacity(regions.len());
    for region in regions {
        let fuse = out.last().is_some_and(|prev: &Region| {
            prev.wipe_type == region.wipe_type
                && gap_in_blocks(prev, &region, config.block_size) <= config.max_normal_gap
        });

        if fuse {
            let prev = out.last_mut().unwrap();
            let last_member = *prev.blocks.last().unwrap();
            let first_member = region.blocks[0];

            let mut fused_blocks = prev.blocks.clone();
            fused_blocks.extend((last_member + 1)..first_member);
            fused_blocks.extend(region.blocks.iter().copied());

            let avg_entropy = fused_blocks
                .iter()
                .filter_map(|&id| all_blocks.get(id as usize))
                .map(|b| b.entropy)
                .sum::<f64>()
                / fused_blocks.len().max(1) as f64;

            prev.end_offset = region.end_offset;
            prev.size = prev.end_offset - prev.start_offset + 1;
            prev.block_count = fused_blocks.len();
            prev.avg_entropy = avg_entropy;
            prev.blocks = fused_blocks;
        } else {
            out.push(region);
        }
    }
    out
}

fn gap_in_blocks(prev: &Region, next: &Region, block_size: u64) -> u64 {
    let prev_last_block = *prev.blocks.last().unwrap();
    let next_first_block = next.blocks[0];
    debug_assert_eq!(next.start_offset, next_first_block * block_size);
    next_first_block.saturating_sub(prev_last_block + 1)
}

/// Stage 3: drop regions smaller than `min_region_blocks`. Isolated blocks
/// are noise, not evidence.
fn filter_by_size(regions: Vec<Region>, min_region_blocks: usize) -> Vec<Region> {
    regions
        .into_iter()
        .filter(|r| r.block_count >= min_region_blocks)
        .collect()
}

/// Stage 4: greedily fold runs of `multi_pass_min_bands` or more adjacent,
/// alternating `STRONG`-type regions into one `MULTI_PASS` region — the
/// signature of Gutmann/DoD overwrite passes.
fn detect_multi_pass(regions: Vec<Region>, all_blocks: &[BlockResult], config: &ScannerConfig) -> Vec<Region> {
    if regions.len() < config.multi_pass_min_bands {
        return regions;
    }

    let max_gap_bytes = config.multi_pass_gap_blocks * config.block_size;
    let mut merged = Vec::new();
    let mut i = 0;
    while i < regions.len() {
        let mut band_group = vec![&regions[i]];
        let mut j = i + 1;

        while j < regions.len() {
            let prev = *band_group.last().unwrap();
            let curr = &regions[j];

            let gap = curr.start_offset.saturating_sub(prev.end_offset + 1);
            let is_adjacent = gap <= max_gap_bytes;
            let is_alternating = curr.wipe_type != prev.wipe_type
                && curr.wipe_type.is_strong()
                && prev.wipe_type.is_strong();

            if is_adjacent && is_alternating {
                band_group.push(curr);
                j += 1;
            } else {
                break;
            }
        }

        if band_group.len() >= config.multi_pass_min_bands {
            let all_block_ids: Vec<u64> = band_group.iter().flat_map(|r| r.blocks.clone()).collect();
            let entropies: Vec<f64> = all_block_ids
                .iter()
                .filter_map(|&id| all_blocks.get(id as usize))
                .map(|b| b.entropy)
                .collect();
            let avg_entropy = if entropies.is_empty() {
                0.0
            } else {
                entropies.iter().sum::<f64>() / entropies.len() as f64
            };

            let start_offset = band_group[0].start_offset;
            let end_offset = band_group.last().unwrap().end_offset;
            merged.push(Region {
                id: 0,
                start_offset,
                end_offset,
                size: end_offset - start_offset + 1,
                wipe_type: WipeType::MultiPass,
                block_count: band_group.iter().map(|r| r.block_count).sum(),
                avg_entropy,
                confidence: 0.0,
                blocks: all_block_ids,
            });
            i = j;
        } else {
            merged.push(regions[i].clone());
            i += 1;
        }
    }
    merged
}

/// Stage 5: drop `PARTIAL` regions with no `STRONG` block within
/// `isolation_window` blocks of their member range. `STRONG` regions pass
/// through unchanged.
fn suppress_false_positives(regions: Vec<Region>, config: &ScannerConfig) -> Vec<Region> {
    let mut strong_block_ids: Vec<i64> = regions
        .iter()
        .filter(|r| r.wipe_type.is_strong())
        .flat_map(|r| r.blocks.iter().map(|&b| b as i64))
        .collect();
    strong_block_ids.sort_unstable();

    regions
        .into_iter()
        .filter(|r| {
            if !r.wipe_type.is_partial() {
                return true;
            }
            let lo = *r.blocks.first().unwrap() as i64 - config.isolation_window;
            let hi = *r.blocks.last().unwrap() as i64 + config.isolation_window;
            strong_block_ids.iter().any(|&b| b >= lo && b <= hi)
        })
        .collect()
}

/// Stage 6: refine confidence from region-level context — size, internal
/// density of suspicious blocks, and a per-type adjustment.
fn compute_confidence(regions: Vec<Region>, all_blocks: &[BlockResult]) -> Vec<Region> {
    regions
        .into_iter()
        .map(|mut r| {
            let member_blocks: Vec<&BlockResult> = r
                .blocks
                .iter()
                .filter_map(|&id| all_blocks.get(id as usize))
                .collect();

            let avg_conf = if member_blocks.is_empty() {
                0.5
            } else {
                member_blocks.iter().map(|b| b.confidence).sum::<f64>() / member_blocks.len() as f64
            };

            let size_bonus = (r.block_count as f64 / 512.0).min(1.0) * 0.10;

            let density_ratio = if member_blocks.is_empty() {
                0.0
            } else {
                member_blocks.iter().filter(|b| b.is_suspicious).count() as f64
                    / member_blocks.len() as f64
            };
            let density_bonus = (density_ratio - 0.5) * 0.10;

            let type_adj = match r.wipe_type {
                WipeType::ZeroWipe => 0.0,
                WipeType::FfWipe => -0.02,
                WipeType::RandomWipe => -0.04,
                WipeType::MultiPass => -0.08,
                WipeType::LikelyZeroWipe | WipeType::LikelyFfWipe => -0.12,
                WipeType::LowEntropySuspect => -0.15,
                WipeType::Unallocated | WipeType::Normal => 0.0,
            };

            r.confidence = round3((avg_conf + size_bonus + density_bonus + type_adj).clamp(0.0, 1.0));
            r
        })
        .collect()
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
