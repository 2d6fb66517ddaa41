//! Per-block wipe-pattern classifier.
//!
//! Ported from the retrieved Python reference's `engine/classifier.py`:
//! pure, stateless, single block in → one [`BlockResult`] out. No
//! cross-block context; region logic and scoring live in [`crate::aggregator`]
//! and [`crate::scorer`].
//!
//! False-positive suppression rationale (kept from the Python reference,
//! since it explains thresholds a reader could otherwise mistake for
//! arbitrary):
//!
//! - High entropy != random wipe. ZIP/PNG/MP4/encrypted volumes all reach
//!   entropy >= 7.5; the distinguishing signal is distribution *flatness*.
//!   CSPRNG wipe output is flat; compressed/encrypted data has structural
//!   byte-range bias.
//! - Low entropy != zero wipe. NTFS MFT entries, FAT tables, sparse file
//!   tails, and null-padded strings are all low-entropy, 0x00-dominant
//!   blocks. The distinguishing signal is dominance threshold plus the
//!   entropy of the *non-zero* bytes: sparse/structural blocks have
//!   patterned non-zero bytes, wiped blocks have random scatter.
//! - Mid entropy != multi-pass. Executables, DB records, and log files sit
//!   in the 3.5-6.5 entropy range too. A single block can only ever be a
//!   *candidate*; [`crate::aggregator`] confirms by detecting alternating
//!   entropy bands across consecutive blocks.


use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ScannerConfig;

/// Known signature bytes for compressed/encrypted/executable containers,
/// used by [`has_legitimate_structure`] to veto a RANDOM_WIPE call on real
/// high-entropy data. Union of ZIP, GZIP, JPEG, PNG, PDF, ELF, PE, RAR, XZ,
/// BZ2 magic bytes.
const COMPRESSED_MAGIC: [u8; 28] = [
    0x50, 0x4B, // ZIP (PK)
    0x1F, 0x8B, // GZIP
    0xFF, 0xD8, // JPEG
    0x89, 0x50, 0x4E, 0x47, // PNG
    0x25, 0x50, 0x44, 0x46, // PDF
    0x7F, 0x45, 0x4C, 0x46, // ELF
    0x4D, 0x5A, // PE/MZ
    0x52, 0x61, 0x72, 0x21, // RAR
    0xFD, 0x37, 0x7A, 0x58, // XZ
    0x42, 0x5A, 0x68, // BZ2
];

/// Closed set of classification labels (spec.md §3). An exhaustive match,
/// not a string, per the Re-architecture guidance in spec.md §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum WipeType {
    ZeroWipe,
    FfWipe,
    RandomWipe,
    MultiPass,
    LikelyZeroWipe,
    LikelyFfWipe,
    LowEntropySuspect,
    Unallocated,
    Normal,
}

impl WipeType {
    /// Strong wipe evidence (spec.md Glossary): cannot occur naturally.
    pub const STRONG: [WipeType; 4] = [
        WipeType::ZeroWipe,
        WipeType::FfWipe,
        WipeType::RandomWipe,
        WipeType::MultiPass,
    ];

    /// Partial wipe evidence (spec.md Glossary): needs corroboration.
    pub const PARTIAL: [WipeType; 3] = [
        WipeType::LikelyZeroWipe,
        WipeType::LikelyFfWipe,
        WipeType::LowEntropySuspect,
    ];

    pub fn is_strong(self) -> bool {
        Self::STRONG.contains(&self)
    }

    pub fn is_partial(self) -> bool {
        Self::PARTIAL.contains(&self)
    }
}

impl fmt::Display for WipeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WipeType::ZeroWipe => "ZERO_WIPE",
            WipeType::FfWipe => "FF_WIPE",
            WipeType::RandomWipe => "RANDOM_WIPE",
            WipeType::MultiPass => "MULTI_PASS",
            WipeType::LikelyZeroWipe => "LIKELY_ZERO_WIPE",
            WipeType::LikelyFfWipe => "LIKELY_FF_WIPE",
            WipeType::LowEntropySuspect => "LOW_ENTROPY_SUSPECT",
            WipeType::Unallocated => "UNALLOCATED",
            WipeType::Normal => "NORMAL",
        };
        f.write_str(s)
    }
}

/// Per-block classification output (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockResult {
    pub block_id: u64,
    pub offset: u64,
    pub wipe_type: WipeType,
    pub entropy: f64,
    pub confidence: f64,
    pub dominant_byte: u8,
    pub dominant_pct: f64,
    pub zero_ratio: f64,
    pub ff_ratio: f64,
    pub is_suspicious: bool,
}

/// Single-pass statistics computed once per block and shared across every
/// decision-tree rule, mirroring the Python reference's `_stats_from_data`
/// (avoids repeated passes over `data`).
struct BlockStats {
    entropy: f64,
    freq: [f64; 256],
    zero_ratio: f64,
    ff_ratio: f64,
    dominant_byte: u8,
    dominant_pct: f64,
}

fn block_stats(data: &[u8]) -> BlockStats {
    let len = data.len() as f64;
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }

    let mut entropy = 0.0;
    let mut freq = [0.0f64; 256];
    for (i, &c) in counts.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let p = c as f64 / len;
        freq[i] = p;
        entropy -= p * p.log2();
    }

    let dominant_byte = counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, &c)| c)
        .map(|(i, _)| i as u8)
        .unwrap_or(0);
    let dominant_pct = freq[dominant_byte as usize];

    BlockStats {
        entropy,
        freq,
        zero_ratio: counts[0x00] as f64 / len,
        ff_ratio: counts[0xFF] as f64 / len,
        dominant_byte,
        dominant_pct,
    }
}

/// Shannon entropy in bits/byte, 0.0 (pure fill) to 8.0 (perfect random).
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let len = data.len() as f64;
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let mut h = 0.0;
    for &c in counts.iter() {
        if c == 0 {
            continue;
        }
        let p = c as f64 / len;
        h -= p * p.log2();
    }
    h
}

/// Standard deviation of the byte-frequency histogram about `1/256`. Lower
/// means flatter, more consistent with CSPRNG output.
fn distribution_uniformity(freq: &[f64; 256]) -> f64 {
    let mean = 1.0 / 256.0;
    let variance: f64 = freq.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / 256.0;
    variance.sqrt()
}

/// Heuristic guard against RANDOM_WIPE false positives on real
/// compressed/encrypted data (spec.md §4.2). Any one of three checks firing
/// means "treat as legitimate". The Python reference's unreachable 4th
/// check (top-8-byte-frequency sum, dead code after an unconditional early
/// return) is intentionally not reproduced — spec.md §9 treats the explicit
/// three checks as the observable contract.
pub fn has_legitimate_structure(data: &[u8], freq: &[f64; 256]) -> bool {
    // 1. Format magic bytes in the first 16 bytes of the block.
    if data[..data.len().min(16)]
        .iter()
        .any(|b| COMPRESSED_MAGIC.contains(b))
    {
        return true;
    }

    // 2. Byte-range clustering: 8 buckets of 32 values each; legit
    // compressed data over-represents some bucket beyond 2.8x uniform share.
    let expected_per_bucket = 32.0 / 256.0;
    for bucket in 0..8 {
        let sum: f64 = freq[bucket * 32..(bucket + 1) * 32].iter().sum();
        if sum > expected_per_bucket * 2.8 {
            return true;
        }
    }

    // 3. A run of >= 64 consecutive printable-ASCII bytes.
    let mut run = 0;
    for &b in data {
        if (0x20..=0x7E).contains(&b) {
            run += 1;
            if run >= 64 {
                return true;
            }
        } else {
            run = 0;
        }
    }

    false
}

/// Classify a single block. Pure: depends only on `data` (plus `block_id`
/// and `offset`, passed through unchanged). Decision tree evaluated in
/// strict priority order (spec.md §4.2 table); first match wins.
pub fn classify_block(
    block_id: u64,
    offset: u64,
    data: &[u8],
    config: &ScannerConfig,
) -> BlockResult {
    if data.is_empty() {
        return BlockResult {
            block_id,
            offset,
            wipe_type: WipeType::Normal,
            entropy: 0.0,
            confidence: 1.0,
            dominant_byte: 0,
            dominant_pct: 1.0,
            zero_ratio: 0.0,
            ff_ratio: 0.0,
            is_suspicious: false,
        };
    }

    let stats = block_stats(data);
    let mk = |wipe_type: WipeType, confidence: f64, is_suspicious: bool| BlockResult {
        block_id,
        offset,
        wipe_type,
        entropy: round3(stats.entropy),
        confidence: round3(confidence.clamp(0.0, 1.0)),
        dominant_byte: stats.dominant_byte,
        dominant_pct: stats.dominant_pct,
        zero_ratio: stats.zero_ratio,
        ff_ratio: stats.ff_ratio,
        is_suspicious,
    };

    // 1. Strong zero fill.
    if stats.zero_ratio >= config.zero_ff_strong_min && stats.entropy <= config.entropy_fill_max {
        let conf = fill_confidence(stats.zero_ratio, stats.entropy, config);
        return mk(WipeType::ZeroWipe, conf, true);
    }

    // 2. Strong FF fill (penalised slightly: appears in legit flash/BIOS
    // erase-state regions).
    if stats.ff_ratio >= config.zero_ff_strong_min && stats.entropy <= config.entropy_fill_max {
        let conf = fill_confidence(stats.ff_ratio, stats.entropy, config) * 0.96;
        return mk(WipeType::FfWipe, conf, true);
    }

    // 3. Partial zero.
    if (config.zero_ff_partial_min..config.zero_ff_strong_min).contains(&stats.zero_ratio) {
        let non_zero: Vec<u8> = data.iter().copied().filter(|&b| b != 0x00).collect();
        if !non_zero.is_empty() && shannon_entropy(&non_zero) > 3.5 {
            let conf = partial_confidence(stats.zero_ratio, config);
            return mk(WipeType::LikelyZeroWipe, conf, true);
        }
        return mk(WipeType::Normal, 0.82, false);
    }

    // 4. Partial FF.
    if (config.zero_ff_partial_min..config.zero_ff_strong_min).contains(&stats.ff_ratio) {
        let non_ff: Vec<u8> = data.iter().copied().filter(|&b| b != 0xFF).collect();
        if !non_ff.is_empty() && shannon_entropy(&non_ff) > 3.5 {
            let conf = partial_confidence(stats.ff_ratio, config);
            return mk(WipeType::LikelyFfWipe, conf, true);
        }
        return mk(WipeType::Normal, 0.82, false);
    }

    // 5. Random wipe candidate: high entropy.
    if stats.entropy >= config.entropy_random_min {
        let uniformity = distribution_uniformity(&stats.freq);
        if uniformity <= config.uniformity_wipe_max {
            if has_legitimate_structure(data, &stats.freq) {
                return mk(WipeType::Normal, 0.72, false);
            }
            let conf = random_confidence(stats.entropy, uniformity, config);
            return mk(WipeType::RandomWipe, conf, true);
        }
        return mk(WipeType::Normal, 0.87, false);
    }

    // 6. Low-entropy suspect (pattern-wipe candidate).
    if stats.entropy > config.entropy_low_min && stats.entropy <= config.entropy_low_max {
        if stats.dominant_pct <= config.suspect_dominant_max {
            let uniformity = distribution_uniformity(&stats.freq);
            if uniformity < 0.020 {
                return mk(WipeType::LowEntropySuspect, 0.52, true);
            }
        }
        return mk(WipeType::Normal, 0.82, false);
    }

    // 7. Multi-pass candidate: mid entropy, anomalously flat.
    if (config.multi_pass_lo..=config.multi_pass_hi).contains(&stats.entropy) {
        let uniformity = distribution_uniformity(&stats.freq);
        if uniformity < config.multi_pass_unif_max {
            return mk(WipeType::MultiPass, 0.52, true);
        }
    }

    // 8. Genuine unallocated space.
    if stats.dominant_byte == 0x00 && (0.70..config.zero_ff_strong_min).contains(&stats.dominant_pct) {
        return mk(WipeType::Unallocated, 0.48, false);
    }

    // 9. Fallthrough: legitimate data.
    mk(WipeType::Normal, 0.90, false)
}

fn fill_confidence(dominant_ratio: f64, entropy: f64, config: &ScannerConfig) -> f64 {
    let dom_score = (dominant_ratio - config.zero_ff_strong_min) / (1.0 - config.zero_ff_strong_min);
    let ent_score = 1.0 - (entropy / 0.5).min(1.0);
    (0.55 + dom_score * 0.28 + ent_score * 0.17).min(1.0)
}

fn partial_confidence(dominant_ratio: f64, config: &ScannerConfig) -> f64 {
    let scaled = (dominant_ratio - config.zero_ff_partial_min)
        / (config.zero_ff_strong_min - config.zero_ff_partial_min);
    0.40 + scaled * 0.32
}

fn random_confidence(entropy: f64, uniformity: f64, config: &ScannerConfig) -> f64 {
    let ent_score = (entropy - config.entropy_random_min) / (8.0 - config.entropy_random_min);
    let unif_score = 1.0 - (uniformity / config.uniformity_wipe_max).min(1.0);
    (0.58 + ent_score * 0.22 + unif_score * 0.12).min(0.92)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Data-parallel classification over an already-buffered block slice
/// (spec.md §5: "Classification is trivially data-parallel... MAY
/// parallelize Phase 1 over a worker pool"). Gated behind the `parallel`
/// feature; the orchestrator falls back to sequential classification
/// without it.
#[cfg(feature = "parallel")]
pub fn classify_blocks_parallel(blocks: &[crate::reader::Block], config: &ScannerConfig) -> Vec<BlockResult> {
    use rayon::prelude::*;
    blocks
        .par_iter()
        .map(|b| classify_block(b.id, b.offset, &b.data, config))
        .collect()
}
