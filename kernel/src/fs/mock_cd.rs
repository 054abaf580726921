/// RAM-backed mock CD for testing.
///
/// Stands in for the ATAPI drive behind the `BlockDevice` trait so the
/// ISO 9660 reader and the fd layer can be exercised without hardware.
use super::block::{Block, BlockDevice, CD_BLOCK_SIZE};
use crate::drivers::atapi::AtapiError;
use alloc::boxed::Box;
use alloc::vec::Vec;

pub struct RamCd {
    data: Vec<u8>,
    read_count: u64,
}

impl RamCd {
    /// Wrap a raw image. The length is rounded up to whole blocks.
    pub fn new(mut data: Vec<u8>) -> Self {
        let rounded = data.len().div_ceil(CD_BLOCK_SIZE) * CD_BLOCK_SIZE;
        data.resize(rounded, 0);
        Self {
            data,
            read_count: 0,
        }
    }

    /// How many blocks were read (for testing release/retry behavior).
    pub fn read_count(&self) -> u64 {
        self.read_count
    }
}

impl BlockDevice for RamCd {
    fn read_block(&mut self, lba: u32) -> Result<Block, AtapiError> {
        let start = lba as usize * CD_BLOCK_SIZE;
        let end = start + CD_BLOCK_SIZE;
        if end > self.data.len() {
            return Err(AtapiError::MediaError);
        }

        self.read_count += 1;
        let mut block: Block = Box::new([0u8; CD_BLOCK_SIZE]);
        block.copy_from_slice(&self.data[start..end]);
        Ok(block)
    }
}
