//! Cross-component tuning constants, collected into one struct passed by
//! reference through the pipeline (spec.md §9: "Cross-component constants
//! ... belong in a single configuration object passed by reference; never
//! as module globals duplicated per component").
//!
//! [`ScannerConfig::load`] layers built-in defaults under an optional TOML
//! file under `WIPETRACE_*` environment overrides, using the `config`
//! crate. Most callers just want [`ScannerConfig::default`].

use serde::{Deserialize, Serialize};

use crate::ScanError;

/// One NTFS/ext4 cluster. Mixing block sizes across components sharing a
/// single `ScannerConfig` is a configuration error by construction — there
/// is exactly one field here, not one per component.
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// 16 blocks == 64 KiB at the default block size.
pub const DEFAULT_MIN_REGION_BLOCKS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Bytes per block. Fixed per scan; never mixed across components.
    pub block_size: u64,

    /// How many blocks to read per syscall in sequential iteration.
    pub read_chunk_blocks: usize,

    /// How often (in blocks) the orchestrator invokes the progress callback.
    pub progress_interval_blocks: u64,

    // -- Aggregator tuning (spec.md §4.3) --
    pub min_region_blocks: usize,
    pub max_normal_gap: u64,
    pub multi_pass_gap_blocks: u64,
    pub multi_pass_min_bands: usize,
    pub isolation_window: i64,

    // -- Classifier thresholds (spec.md §4.2) --
    pub zero_ff_strong_min: f64,
    pub zero_ff_partial_min: f64,
    pub entropy_fill_max: f64,
    pub entropy_random_min: f64,
    pub uniformity_wipe_max: f64,
    pub entropy_low_min: f64,
    pub entropy_low_max: f64,
    pub suspect_dominant_max: f64,
    pub multi_pass_lo: f64,
    pub multi_pass_hi: f64,
    pub multi_pass_unif_max: f64,

    // -- Upload / session limits (spec.md §6) --
    pub max_upload_bytes: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            read_chunk_blocks: 1024,
            progress_interval_blocks: 1024,

            min_region_blocks: DEFAULT_MIN_REGION_BLOCKS,
            max_normal_gap: 8,
            multi_pass_gap_blocks: 4,
            multi_pass_min_bands: 3,
            isolation_window: 50,

            zero_ff_strong_min: 0.90,
            zero_ff_partial_min: 0.60,
            entropy_fill_max: 0.20,
            entropy_random_min: 7.60,
            uniformity_wipe_max: 0.0140,
            entropy_low_min: 0.21,
            entropy_low_max: 1.50,
            suspect_dominant_max: 0.85,
            multi_pass_lo: 3.5,
            multi_pass_hi: 6.5,
            multi_pass_unif_max: 0.0080,

            max_upload_bytes: 8 * 1024 * 1024 * 1024,
        }
    }
}

impl ScannerConfig {
    /// Load defaults, then an optional TOML file, then `WIPETRACE_*` env
    /// overrides (e.g. `WIPETRACE_BLOCK_SIZE=512`).
    pub fn load(path: Option<&str>) -> Result<Self, ScanError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&ScannerConfig::default()).map_err(|e| {
                ScanError::Internal(format!("default config serialization failed: {e}"))
            })?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WIPETRACE")
                .separator("_")
                .try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| ScanError::Input(format!("invalid scanner configuration: {e}")))?;

        built
            .try_deserialize()
            .map_err(|e| ScanError::Input(format!("invalid scanner configuration: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = ScannerConfig::default();
        assert_eq!(cfg.block_size, 4096);
        assert_eq!(cfg.min_region_blocks, 16);
        assert_eq!(cfg.multi_pass_min_bands, 3);
        assert_eq!(cfg.isolation_window, 50);
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let cfg = ScannerConfig::load(None).expect("defaults must always load");
        assert_eq!(cfg, ScannerConfig::default());
    }

    #[test]
    fn env_override_changes_block_size() {
        std::env::set_var("WIPETRACE_BLOCK_SIZE", "512");
        let cfg = ScannerConfig::load(None).expect("env override must parse");
        std::env::remove_var("WIPETRACE_BLOCK_SIZE");
        assert_eq!(cfg.block_size, 512);
    }
}
