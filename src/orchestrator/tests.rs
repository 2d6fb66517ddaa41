use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_image(bytes: &[u8]) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(bytes).unwrap();
    f
}

#[test]
fn run_scan_on_all_zero_image_reports_high_verdict() {
    let config = ScannerConfig {
        block_size: 4096,
        progress_interval_blocks: 16,
        ..Default::default()
    };
    let image = write_image(&vec![0u8; 4096 * 64]);

    let mut progress_calls = Vec::new();
    let cancel = CancellationToken::new();
    let outcome = run_scan(image.path(), &config, |done, total| progress_calls.push((done, total)), &cancel).unwrap();

    assert_eq!(outcome.stats.total_blocks, 64);
    assert_eq!(outcome.stats.verdict, crate::scorer::Verdict::High);
    assert!(!progress_calls.is_empty());
    assert_eq!(progress_calls.last().unwrap(), &(64, 64));
}

#[test]
fn run_scan_on_empty_image_is_negligible_with_no_blocks() {
    let config = ScannerConfig::default();
    let image = write_image(&[]);
    let cancel = CancellationToken::new();

    let outcome = run_scan(image.path(), &config, |_, _| {}, &cancel).unwrap();
    assert_eq!(outcome.stats.total_blocks, 0);
    assert_eq!(outcome.stats.verdict, crate::scorer::Verdict::Negligible);
    assert!(outcome.regions.is_empty());
}

#[test]
fn cancellation_aborts_mid_scan() {
    let config = ScannerConfig {
        block_size: 4096,
        read_chunk_blocks: 1,
        ..Default::default()
    };
    let image = write_image(&vec![0u8; 4096 * 1000]);
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    let mut seen = 0u64;
    let result = run_scan(
        image.path(),
        &config,
        |done, _| {
            seen = done;
            if done >= 5 {
                cancel_clone.cancel();
            }
        },
        &cancel,
    );

    assert!(matches!(result, Err(ScanError::Cancelled)));
    assert!(seen >= 5);
}

#[test]
fn build_result_document_round_trips_through_json() {
    let config = ScannerConfig::default();
    let image = write_image(&vec![0xFFu8; 4096 * 32]);
    let cancel = CancellationToken::new();
    let outcome = run_scan(image.path(), &config, |_, _| {}, &cancel).unwrap();

    let doc = build_result_document("SID-ABCD1234", "image.dd", Some("deadbeef".into()), 4096 * 32, outcome);
    let json = serde_json::to_string(&doc).unwrap();
    let reparsed: ResultDocument = serde_json::from_str(&json).unwrap();

    assert_eq!(reparsed.session_id, doc.session_id);
    assert_eq!(reparsed.stats.verdict, doc.stats.verdict);
    assert_eq!(reparsed.blocks.len(), doc.blocks.len());
    assert_eq!(reparsed.regions.len(), doc.regions.len());
}

#[test]
fn non_multiple_of_block_size_image_does_not_crash() {
    let config = ScannerConfig {
        block_size: 4096,
        ..Default::default()
    };
    let image = write_image(&vec![0xABu8; 4096 * 3 + 17]);
    let cancel = CancellationToken::new();

    let outcome = run_scan(image.path(), &config, |_, _| {}, &cancel).unwrap();
    assert_eq!(outcome.stats.total_blocks, 4);
    assert_eq!(outcome.blocks.last().unwrap().block_id, 3);
}
