//! Streams a raw disk image in fixed-size blocks.
//!
//! Mirrors the retrieved Python reference's `BlockReader`: a lazy sequential
//! iterator plus a random-access `read_block`. Reads batch
//! `read_chunk_blocks` blocks per syscall (spec.md §4.1) rather than issuing
//! one syscall per block.

#[cfg(feature = "mmap-reader")]
pub mod mmap;


use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::config::ScannerConfig;
use crate::ScanError;

/// One fixed-size slice of the image. Only the final block of an image may
/// be shorter than `block_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: u64,
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Sequential + random-access reader over a raw image file.
pub struct BlockReader {
    path: PathBuf,
    block_size: u64,
    start_block: u64,
    end_block: Option<u64>,
    read_chunk_blocks: usize,
    pub image_size: u64,
    pub total_blocks: u64,
}

impl BlockReader {
    /// Open `path` for streaming at `config.block_size`, covering the whole
    /// image.
    pub fn new(path: impl AsRef<Path>, config: &ScannerConfig) -> Result<Self, ScanError> {
        Self::with_range(path, config, 0, None)
    }

    /// As [`BlockReader::new`], but restricted to `[start_block, end_block]`
    /// (inclusive), matching the optional `(start_block, end_block)` bounds
    /// in spec.md §4.1.
    pub fn with_range(
        path: impl AsRef<Path>,
        config: &ScannerConfig,
        start_block: u64,
        end_block: Option<u64>,
    ) -> Result<Self, ScanError> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::Input(format!("image not found: {}", path.display()))
            } else {
                ScanError::Io(e)
            }
        })?;

        let block_size = config.block_size;
        let image_size = metadata.len();
        let total_blocks = image_size.div_ceil(block_size);

        Ok(Self {
            path,
            block_size,
            start_block,
            end_block,
            read_chunk_blocks: config.read_chunk_blocks,
            image_size,
            total_blocks,
        })
    }

    /// Random-access read of a single block by id, independent of any
    /// sequential iteration in progress.
    pub fn read_block(&self, block_id: u64) -> Result<Block, ScanError> {
        let offset = block_id
            .checked_mul(self.block_size)
            .ok_or_else(|| ScanError::Input("block id overflows offset".into()))?;
        if offset >= self.image_size {
            return Err(ScanError::Input(format!(
                "block {block_id} out of range (image has {} blocks)",
                self.total_blocks
            )));
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let to_read = self.block_size.min(self.image_size - offset) as usize;
        let mut data = vec![0u8; to_read];
        file.read_exact(&mut data)?;

        Ok(Block {
            id: block_id,
            offset,
            data,
        })
    }

    /// Iterate sequentially over every block in `[start_block, end_block]`,
    /// invoking `f` for each. Reads `read_chunk_blocks * block_size` bytes
    /// per syscall; the final chunk (and final block) may be short.
    pub fn for_each_block(
        &self,
        mut f: impl FnMut(Block) -> Result<(), ScanError>,
    ) -> Result<(), ScanError> {
        let mut file = File::open(&self.path)?;
        let byte_offset = self.start_block * self.block_size;
        if byte_offset > 0 {
            file.seek(SeekFrom::Start(byte_offset))?;
        }

        let chunk_bytes = self.read_chunk_blocks as u64 * self.block_size;
        let mut buf = vec![0u8; chunk_bytes as usize];
        let mut block_id = self.start_block;

        loop {
            if let Some(end) = self.end_block {
                if block_id > end {
                    break;
                }
            }

            let n = read_up_to(&mut file, &mut buf)?;
            if n == 0 {
                break;
            }

            let mut i = 0usize;
            while i < n {
                if let Some(end) = self.end_block {
                    if block_id > end {
                        break;
                    }
                }
                let end_i = (i + self.block_size as usize).min(n);
                let data = buf[i..end_i].to_vec();
                if data.is_empty() {
                    break;
                }
                f(Block {
                    id: block_id,
                    offset: block_id * self.block_size,
                    data,
                })?;
                block_id += 1;
                i = end_i;
            }
        }

        Ok(())
    }
}

/// Fill `buf` as much as possible from `r`, returning the number of bytes
/// actually read (may be less than `buf.len()` on a short final chunk).
fn read_up_to(r: &mut impl Read, buf: &mut [u8]) -> Result<usize, ScanError> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}
