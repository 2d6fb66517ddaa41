//! Memory-mapped random-access reads, for callers that repeatedly re-read
//! the same region of a large image (e.g. a hex-viewer collaborator).
//! Grounded in the teacher's `io::mmap_engine` pattern of offering a second
//! I/O strategy behind the primary buffered path.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use super::Block;
use crate::config::ScannerConfig;
use crate::ScanError;

pub struct MmapReader {
    mmap: Mmap,
    block_size: u64,
    pub image_size: u64,
    pub total_blocks: u64,
}

impl MmapReader {
    pub fn open(path: impl AsRef<Path>, config: &ScannerConfig) -> Result<Self, ScanError> {
        let path: &Path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::Input(format!("image not found: {}", path.display()))
            } else {
                ScanError::Io(e)
            }
        })?;

        // SAFETY: the backing file is not expected to be mutated concurrently
        // by another process while this reader is alive; this matches the
        // read-only forensic-image assumption that holds throughout the
        // pipeline (images are copies, not live block devices).
        let mmap = unsafe { Mmap::map(&file)? };
        let image_size = mmap.len() as u64;
        let block_size = config.block_size;

        Ok(Self {
            mmap,
            block_size,
            image_size,
            total_blocks: image_size.div_ceil(block_size),
        })
    }

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

        let end = (offset + self.block_size).min(self.image_size);
        let data = self.mmap[offset as usize..end as usize].to_vec();

        Ok(Block {
            id: block_id,
            offset,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn mmap_reader_matches_buffered_reader_for_a_block() {
        let cfg = ScannerConfig {
            block_size: 16,
            ..Default::default()
        };
        let mut f = NamedTempFile::new().unwrap();
        let mut data = Vec::new();
        for i in 0..4u8 {
            data.extend(std::iter::repeat(i).take(16));
        }
        f.write_all(&data).unwrap();

        let mmap_reader = MmapReader::open(f.path(), &cfg).unwrap();
        let buffered = super::super::BlockReader::new(f.path(), &cfg).unwrap();

        let a = mmap_reader.read_block(2).unwrap();
        let b = buffered.read_block(2).unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.offset, b.offset);
    }
}
