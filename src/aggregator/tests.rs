use super::*;
use crate::classifier::classify_block;
use proptest::prelude::*;

fn cfg() -> ScannerConfig {
    ScannerConfig::default()
}

/// Build a synthetic `BlockResult` stream by classifying `n` blocks of
/// `fill` bytes each, with `block_size` taken from `cfg()`.
fn fill_blocks(n: u64, fill: u8, config: &ScannerConfig) -> Vec<BlockResult> {
    (0..n)
        .map(|id| {
            let data = vec![fill; config.block_size as usize];
            classify_block(id, id * config.block_size, &data, config)
        })
        .collect()
}

/// Classify a stream of `n` structured (non-suspicious) blocks, used as
/// filler around regions under test.
fn normal_blocks(n: u64, config: &ScannerConfig) -> Vec<BlockResult> {
    let text = b"the quick brown fox jumps over the lazy dog. ".repeat(128);
    (0..n)
        .map(|id| {
            let data = &text[..config.block_size as usize];
            classify_block(id, id * config.block_size, data, config)
        })
        .collect()
}

fn lcg_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut x = seed;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        x = x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        out.push((x >> 8) as u8);
    }
    out
}

#[test]
fn empty_stream_yields_no_regions() {
    assert!(aggregate(&[], &cfg()).is_empty());
}

#[test]
fn below_min_region_blocks_is_dropped() {
    let config = cfg();
    let results = fill_blocks(config.min_region_blocks as u64 - 1, 0x00, &config);
    assert!(aggregate(&results, &config).is_empty());
}

#[test]
fn exactly_min_region_blocks_survives() {
    let config = cfg();
    let results = fill_blocks(config.min_region_blocks as u64, 0x00, &config);
    let regions = aggregate(&results, &config);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].block_count, config.min_region_blocks);
    assert_eq!(regions[0].wipe_type, WipeType::ZeroWipe);
    assert_eq!(regions[0].id, 1);
}

#[test]
fn noise_gap_within_tolerance_is_absorbed_into_one_region() {
    let config = cfg();
    let mut results = fill_blocks(20, 0x00, &config);
    let gap_start = results.len() as u64;
    results.extend(normal_blocks(config.max_normal_gap as u64, &config).into_iter().map(|mut b| {
        b.block_id += gap_start;
        b.offset = b.block_id * config.block_size;
        b
    }));
    let tail_start = results.len() as u64;
    results.extend(fill_blocks(20, 0x00, &config).into_iter().map(|mut b| {
        b.block_id += tail_start;
        b.offset = b.block_id * config.block_size;
        b
    }));

    let regions = aggregate(&results, &config);
    assert_eq!(regions.len(), 1, "small same-type gap should fuse into one region");
    assert_eq!(regions[0].block_count, 40 + config.max_normal_gap);
}

#[test]
fn noise_gap_beyond_tolerance_stays_two_regions() {
    let config = cfg();
    let mut results = fill_blocks(20, 0x00, &config);
    let gap_start = results.len() as u64;
    let gap_len = config.max_normal_gap as u64 + 5;
    results.extend(normal_blocks(gap_len, &config).into_iter().map(|mut b| {
        b.block_id += gap_start;
        b.offset = b.block_id * config.block_size;
        b
    }));
    let tail_start = results.len() as u64;
    results.extend(fill_blocks(20, 0x00, &config).into_iter().map(|mut b| {
        b.block_id += tail_start;
        b.offset = b.block_id * config.block_size;
        b
    }));

    let regions = aggregate(&results, &config);
    assert_eq!(regions.len(), 2, "gap exceeding tolerance should not fuse");
}

#[test]
fn alternating_strong_bands_become_one_multi_pass_region() {
    let config = cfg();
    let mut results = Vec::new();
    let mut next_id = 0u64;
    let band_len = (config.min_region_blocks as u64) + 4;

    for round in 0..6u8 {
        let fill = if round % 2 == 0 { 0x00 } else { 0xFF };
        for b in fill_blocks(band_len, fill, &config) {
            let mut b = b;
            b.block_id = next_id;
            b.offset = next_id * config.block_size;
            next_id += 1;
            results.push(b);
        }
    }

    let regions = aggregate(&results, &config);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].wipe_type, WipeType::MultiPass);
    assert_eq!(regions[0].block_count, band_len as usize * 6);
}

#[test]
fn isolated_partial_region_with_no_strong_corroboration_is_suppressed() {
    let config = cfg();
    let mut data = vec![0u8; config.block_size as usize];
    let filler = lcg_bytes((config.block_size as f64 * 0.78) as usize, 17);
    data[..filler.len()].copy_from_slice(&filler);

    let likely_zero_block = |id: u64| {
        let mut r = classify_block(id, id * config.block_size, &data, &config);
        r.block_id = id;
        r
    };

    let mut results = normal_blocks(100, &config);
    let start = results.len() as u64;
    for i in 0..40u64 {
        let id = start + i;
        let mut b = likely_zero_block(id);
        b.offset = id * config.block_size;
        results.push(b);
    }
    let tail_start = results.len() as u64;
    results.extend(normal_blocks(100, &config).into_iter().map(|mut b| {
        b.block_id += tail_start;
        b.offset = b.block_id * config.block_size;
        b
    }));

    assert!(
        results[start as usize].wipe_type.is_partial(),
        "fixture must actually produce a PARTIAL-category block"
    );

    let regions = aggregate(&results, &config);
    assert!(
        regions.iter().all(|r| r.wipe_type != WipeType::LikelyZeroWipe),
        "an isolated PARTIAL region with no nearby STRONG evidence must be suppressed"
    );
}

#[test]
fn partial_region_corroborated_by_nearby_strong_block_survives() {
    let config = cfg();
    let mut data = vec![0u8; config.block_size as usize];
    let filler = lcg_bytes((config.block_size as f64 * 0.78) as usize, 17);
    data[..filler.len()].copy_from_slice(&filler);

    let mut results = Vec::new();
    let mut next_id = 0u64;

    for b in fill_blocks(config.min_region_blocks as u64, 0x00, &config) {
        let mut b = b;
        b.block_id = next_id;
        b.offset = next_id * config.block_size;
        next_id += 1;
        results.push(b);
    }

    for _ in 0..(config.min_region_blocks as u64) {
        let mut r = classify_block(next_id, next_id * config.block_size, &data, &config);
        r.block_id = next_id;
        next_id += 1;
        results.push(r);
    }

    let regions = aggregate(&results, &config);
    assert!(
        regions.iter().any(|r| r.wipe_type == WipeType::LikelyZeroWipe),
        "a PARTIAL region adjacent to STRONG evidence should survive suppression"
    );
}

#[test]
fn region_ids_are_sequential_by_start_offset() {
    let config = cfg();
    let mut results = fill_blocks(20, 0x00, &config);
    let gap_start = results.len() as u64;
    results.extend(normal_blocks(200, &config).into_iter().map(|mut b| {
        b.block_id += gap_start;
        b.offset = b.block_id * config.block_size;
        b
    }));
    let tail_start = results.len() as u64;
    results.extend(fill_blocks(20, 0xFF, &config).into_iter().map(|mut b| {
        b.block_id += tail_start;
        b.offset = b.block_id * config.block_size;
        b
    }));

    let regions = aggregate(&results, &config);
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].id, 1);
    assert_eq!(regions[1].id, 2);
    assert!(regions[0].start_offset < regions[1].start_offset);
}

#[test]
fn aggregation_is_idempotent_on_block_stream() {
    let config = cfg();
    let results = fill_blocks(30, 0x00, &config);
    let a = aggregate(&results, &config);
    let b = aggregate(&results, &config);
    assert_eq!(a, b);
}

#[test]
fn confidence_values_stay_within_bounds() {
    let config = cfg();
    let results = fill_blocks(64, 0xFF, &config);
    let regions = aggregate(&results, &config);
    assert_eq!(regions.len(), 1);
    assert!((0.0..=1.0).contains(&regions[0].confidence));
}

proptest! {
    /// Surviving regions must stay ordered, non-overlapping, and no smaller
    /// than `min_region_blocks` (spec.md §8) for any mix of uniform-fill
    /// block runs.
    #[test]
    fn regions_stay_ordered_non_overlapping_and_above_min_size(
        run_lens in proptest::collection::vec(1u64..40, 0..12),
        fills in proptest::collection::vec(any::<u8>(), 0..12),
    ) {
        let config = cfg();
        let mut results = Vec::new();
        let mut id = 0u64;
        for (&len, &fill) in run_lens.iter().zip(fills.iter()) {
            for _ in 0..len {
                let data = vec![fill; config.block_size as usize];
                results.push(classify_block(id, id * config.block_size, &data, &config));
                id += 1;
            }
        }

        let regions = aggregate(&results, &config);

        for r in &regions {
            prop_assert!(r.block_count >= config.min_region_blocks);
            prop_assert!(r.start_offset <= r.end_offset);
        }
        for pair in regions.windows(2) {
            prop_assert!(pair[0].end_offset < pair[1].start_offset);
        }
    }
}
