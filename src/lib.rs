//! Forensic wipe-detection pipeline for raw disk images.
//!
//! Five components, pipelined strictly leaves-to-root:
//!
//! ```text
//! Reader -> Classifier -> Aggregator -> Scorer -> Orchestrator
//! ```
//!
//! [`reader`] streams fixed-size [`reader::Block`]s from an image file.
//! [`classifier`] turns one block into a [`classifier::BlockResult`] — a
//! pure function of the block's bytes. [`aggregator`] merges the ordered
//! classification stream into [`aggregator::Region`]s. [`scorer`] reduces
//! blocks and regions to a 0-100 intent score and verdict. [`orchestrator`]
//! wires the four together and assembles the result document.
#![allow(clippy::upper_case_acronyms)]

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod orchestrator;
pub mod reader;
pub mod scorer;
pub mod ui;

pub use aggregator::Region;
pub use classifier::{BlockResult, WipeType};
pub use config::ScannerConfig;
pub use orchestrator::{run_scan, ResultDocument};
pub use reader::{Block, BlockReader};
pub use scorer::ScanStats;

use thiserror::Error;

/// Crate-wide error taxonomy (spec.md §7): input validation, transient I/O,
/// caller-protocol misuse, and internal invariant violations each get a
/// distinct variant so callers can decide which are retryable.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("input error: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error (http {status}): {message}")]
    Protocol { status: u16, message: String },

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("scan cancelled")]
    Cancelled,
}

// std::io::Error doesn't implement Clone, so this follows the teacher's
// hand-written Clone impl for DriveError rather than deriving it.
impl Clone for ScanError {
    fn clone(&self) -> Self {
        match self {
            ScanError::Input(s) => ScanError::Input(s.clone()),
            ScanError::Io(e) => ScanError::Io(std::io::Error::new(e.kind(), e.to_string())),
            ScanError::Protocol { status, message } => ScanError::Protocol {
                status: *status,
                message: message.clone(),
            },
            ScanError::Internal(s) => ScanError::Internal(s.clone()),
            ScanError::Cancelled => ScanError::Cancelled,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod lib_tests;
