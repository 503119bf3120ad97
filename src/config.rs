use static_assertions::const_assert;

use crate::error::FsError;
use crate::Result;

pub const MAGIC: u32 = 0x464C4154; // "FLAT" in ASCII

pub const BLOCK_SIZE: usize = 4096; // Default block size
pub const DISK_BLOCKS: usize = 8192; // Default number of blocks on a device
pub const MIN_BLOCK_SIZE: usize = 512;

pub const SUPERBLOCK_ID: usize = 0;
pub const FAT_BLOCK_ID: usize = 1;
pub const DIR_BLOCK_ID: usize = 2;
pub const DATA_START: usize = 3; // First block of the data region

pub const MAX_FILES: usize = 64; // Default directory capacity
pub const MAX_FDS: usize = 32; // Default descriptor table size
pub const MAX_FILE_NAME_LEN: usize = 15;
pub const NAME_FIELD_LEN: usize = MAX_FILE_NAME_LEN + 1; // NUL terminated on disk

pub const SUPERBLOCK_SIZE: usize = 32; // 8 u32 fields
pub const FAT_ENTRY_SIZE: usize = 4;
pub const DIR_ENTRY_SIZE: usize = 32; // name + size + first block + used + reserved

pub const FAT_FREE: u32 = 0;
pub const FAT_EOC: u32 = u32::MAX;
pub const NO_BLOCK: u32 = u32::MAX; // First block of an empty file

const_assert!(SUPERBLOCK_SIZE <= MIN_BLOCK_SIZE);
const_assert!(NAME_FIELD_LEN + 4 + 4 + 1 <= DIR_ENTRY_SIZE);
const_assert!(MAX_FILES * DIR_ENTRY_SIZE <= BLOCK_SIZE);
const_assert!(DISK_BLOCKS > DATA_START);

/// Geometry of a volume and the size of its per-session tables.
///
/// `block_size`, `num_blocks` and `max_files` are fixed at format time and recorded in the
/// superblock. `max_fds` only sizes the descriptor table of a mounted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub block_size: usize,
    pub num_blocks: usize,
    pub max_files: usize,
    pub max_fds: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            num_blocks: DISK_BLOCKS,
            max_files: MAX_FILES,
            max_fds: MAX_FDS,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_SIZE
            || !self.block_size.is_power_of_two()
            || self.block_size > u32::MAX as usize
        {
            return Err(FsError::InvalidConfig);
        }
        if self.num_blocks <= DATA_START || self.num_blocks > u32::MAX as usize {
            return Err(FsError::InvalidConfig);
        }
        let dir_bytes = self.max_files.checked_mul(DIR_ENTRY_SIZE);
        if self.max_files == 0 || dir_bytes.map_or(true, |n| n > self.block_size) {
            return Err(FsError::InvalidConfig);
        }
        if self.max_fds == 0 {
            return Err(FsError::InvalidConfig);
        }
        // File sizes are stored as u32.
        let capacity = self.num_data_blocks().checked_mul(self.block_size);
        if capacity.map_or(true, |n| n > u32::MAX as usize) {
            return Err(FsError::InvalidConfig);
        }
        Ok(())
    }

    /// Number of data blocks the volume can address.
    /// The allocation table occupies exactly one block, which bounds this below the raw count.
    pub fn num_data_blocks(&self) -> usize {
        self.num_blocks
            .saturating_sub(DATA_START)
            .min(self.block_size / FAT_ENTRY_SIZE)
    }

    /// Bytes of file data the volume can hold. Saturates on configs `validate` would reject.
    pub fn capacity(&self) -> usize {
        self.num_data_blocks().saturating_mul(self.block_size)
    }
}
