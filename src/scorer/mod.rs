//! Reduces the block and region streams to summary statistics, a 0-100
//! intent score, and a verdict (spec.md §4.4).
//!
//! Hybrid design: a density fast-path sets a verdict *floor*, then a
//! weighted evidence score is computed independently; the final verdict is
//! whichever is higher. Density alone can never be talked down by a low
//! evidence score, and a low-density image with strong regional evidence
//! can still clear HIGH.


use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregator::Region;
use crate::classifier::{BlockResult, WipeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verdict {
    Negligible,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Negligible => "NEGLIGIBLE",
            Verdict::Low => "LOW",
            Verdict::Medium => "MEDIUM",
            Verdict::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Summary statistics for an entire scan (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_blocks: u64,
    pub suspicious_blocks: u64,
    pub suspicious_pct: f64,
    pub wipe_density: f64,
    pub regions_count: usize,
    pub avg_entropy_flagged: f64,
    pub intent_score: u32,
    pub verdict: Verdict,
    pub wipe_type_counts: BTreeMap<String, u64>,
}

/// `compute_score(blocks, regions) -> ScanStats`. Pure, O(N).
pub fn compute_score(blocks: &[BlockResult], regions: &[Region]) -> ScanStats {
    let total_blocks = blocks.len() as u64;

    if total_blocks == 0 {
        return ScanStats {
            total_blocks: 0,
            suspicious_blocks: 0,
            suspicious_pct: 0.0,
            wipe_density: 0.0,
            regions_count: 0,
            avg_entropy_flagged: 0.0,
            intent_score: 0,
            verdict: Verdict::Negligible,
            wipe_type_counts: seeded_wipe_type_counts(),
        };
    }

    let suspicious_blocks = blocks.iter().filter(|b| b.is_suspicious).count() as u64;
    let suspicious_pct = round2(suspicious_blocks as f64 / total_blocks as f64 * 100.0);
    let wipe_density = round4(suspicious_blocks as f64 / total_blocks as f64);

    let avg_entropy_flagged = {
        let flagged: Vec<f64> = blocks.iter().filter(|b| b.is_suspicious).map(|b| b.entropy).collect();
        if flagged.is_empty() {
            0.0
        } else {
            round3(flagged.iter().sum::<f64>() / flagged.len() as f64)
        }
    };

    // Only the 7 suspicious labels are counted, always present with zero
    // defaults; NORMAL and UNALLOCATED are never keys here.
    let mut wipe_type_counts = seeded_wipe_type_counts();
    for b in blocks.iter().filter(|b| b.is_suspicious) {
        if let Some(count) = wipe_type_counts.get_mut(&b.wipe_type.to_string()) {
            *count += 1;
        }
    }

    let density_verdict = density_floor(wipe_density, suspicious_blocks);

    let strong_blocks = blocks.iter().filter(|b| b.wipe_type.is_strong()).count();
    let partial_blocks = blocks.iter().filter(|b| b.wipe_type.is_partial()).count();

    let random_regions = regions.iter().filter(|r| r.wipe_type == WipeType::RandomWipe).count();
    let multi_pass_regions = regions.iter().filter(|r| r.wipe_type == WipeType::MultiPass).count();

    let coverage = (suspicious_pct / 10.0).min(1.0) * 40.0;
    let regions_component = (regions.len() as f64 / 10.0).min(1.0) * 20.0;
    let random_component = (random_regions as f64 / 3.0).min(1.0) * 25.0;
    let multi_pass_component = (multi_pass_regions as f64 / 2.0).min(1.0) * 15.0;

    let mut raw = coverage + regions_component + random_component + multi_pass_component;

    if partial_blocks > strong_blocks && strong_blocks < 10 {
        raw -= 10.0;
    }
    if !regions.is_empty() {
        let mean_conf = regions.iter().map(|r| r.confidence).sum::<f64>() / regions.len() as f64;
        if mean_conf < 0.55 {
            raw -= 5.0;
        }
    }

    let intent_score = raw.round().clamp(0.0, 100.0) as u32;
    let score_verdict = score_to_verdict(intent_score);

    let verdict = density_verdict.max(score_verdict);

    ScanStats {
        total_blocks,
        suspicious_blocks,
        suspicious_pct,
        wipe_density,
        regions_count: regions.len(),
        avg_entropy_flagged,
        intent_score,
        verdict,
        wipe_type_counts,
    }
}

/// The 7 suspicious labels (`WipeType::STRONG` + `WipeType::PARTIAL`), each
/// seeded at 0 — `NORMAL`/`UNALLOCATED` never appear as keys, matching the
/// original reference's fixed `type_counts` dict.
fn seeded_wipe_type_counts() -> BTreeMap<String, u64> {
    WipeType::STRONG
        .iter()
        .chain(WipeType::PARTIAL.iter())
        .map(|t| (t.to_string(), 0u64))
        .collect()
}

fn density_floor(wipe_density: f64, suspicious_blocks: u64) -> Verdict {
    if wipe_density > 0.30 {
        Verdict::High
    } else if wipe_density > 0.10 {
        Verdict::Medium
    } else if wipe_density > 0.02 {
        Verdict::Low
    } else if suspicious_blocks >= 2 {
        Verdict::Low
    } else {
        Verdict::Negligible
    }
}

fn score_to_verdict(score: u32) -> Verdict {
    if score >= 70 {
        Verdict::High
    } else if score >= 35 {
        Verdict::Medium
    } else if score >= 10 {
        Verdict::Low
    } else {
        Verdict::Negligible
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}
