use crate::codec::{get_u32, put_u32};
use crate::config::*;
use crate::{BlockDevice, Error, Result};

/// Layout record kept in block 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub block_size: u32,
    pub fat_start: u32,       // Block holding the allocation table
    pub dir_start: u32,       // Block holding the directory
    pub data_start: u32,      // First block of the data region
    pub num_blocks: u32,      // Total number of blocks on the device
    pub num_data_blocks: u32, // Entries in the allocation table
    pub max_files: u32,       // Entries in the directory
}

impl SuperBlock {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            magic: MAGIC,
            block_size: config.block_size as u32,
            fat_start: FAT_BLOCK_ID as u32,
            dir_start: DIR_BLOCK_ID as u32,
            data_start: DATA_START as u32,
            num_blocks: config.num_blocks as u32,
            num_data_blocks: config.num_data_blocks() as u32,
            max_files: config.max_files as u32,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    pub fn num_data_blocks(&self) -> usize {
        self.num_data_blocks as usize
    }

    pub fn max_files(&self) -> usize {
        self.max_files as usize
    }

    /// Device block holding data block `index`.
    pub fn data_block_id(&self, index: u32) -> usize {
        self.data_start as usize + index as usize
    }

    /// Bytes of file data the volume can hold. Bounded by `u32::MAX` once validated.
    pub fn capacity(&self) -> usize {
        self.num_data_blocks() * self.block_size()
    }

    fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        let fields = [
            self.magic,
            self.block_size,
            self.fat_start,
            self.dir_start,
            self.data_start,
            self.num_blocks,
            self.num_data_blocks,
            self.max_files,
        ];
        for (i, field) in fields.into_iter().enumerate() {
            put_u32(buf, i * 4, field);
        }
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            magic: get_u32(buf, 0),
            block_size: get_u32(buf, 4),
            fat_start: get_u32(buf, 8),
            dir_start: get_u32(buf, 12),
            data_start: get_u32(buf, 16),
            num_blocks: get_u32(buf, 20),
            num_data_blocks: get_u32(buf, 24),
            max_files: get_u32(buf, 28),
        }
    }

    /// Checks that the recorded layout is the fixed one and fits `device`.
    fn validate(&self, device: &impl BlockDevice) -> Result<()> {
        if self.magic != MAGIC || self.block_size() != device.block_size() {
            return Err(Error::InvalidSuperBlock);
        }
        if self.fat_start as usize != FAT_BLOCK_ID
            || self.dir_start as usize != DIR_BLOCK_ID
            || self.data_start as usize != DATA_START
        {
            return Err(Error::InvalidSuperBlock);
        }
        let num_blocks = self.num_blocks as usize;
        if num_blocks > device.num_blocks() || num_blocks <= DATA_START {
            return Err(Error::InvalidSuperBlock);
        }
        if self.num_data_blocks() > num_blocks - DATA_START
            || self.num_data_blocks() > self.block_size() / FAT_ENTRY_SIZE
        {
            return Err(Error::InvalidSuperBlock);
        }
        let dir_bytes = self.max_files().checked_mul(DIR_ENTRY_SIZE);
        if self.max_files == 0 || dir_bytes.map_or(true, |n| n > self.block_size()) {
            return Err(Error::InvalidSuperBlock);
        }
        let capacity = self.num_data_blocks().checked_mul(self.block_size());
        if capacity.map_or(true, |n| n > u32::MAX as usize) {
            return Err(Error::InvalidSuperBlock);
        }
        Ok(())
    }
}

pub fn read_superblock<D: BlockDevice>(device: &mut D) -> Result<SuperBlock> {
    if device.block_size() < SUPERBLOCK_SIZE {
        return Err(Error::InvalidSuperBlock);
    }
    let mut buf = vec![0u8; device.block_size()];
    device.read_block(SUPERBLOCK_ID, &mut buf)?;
    let superblock = SuperBlock::decode(&buf);
    superblock.validate(device)?;
    Ok(superblock)
}

pub fn write_superblock<D: BlockDevice>(device: &mut D, superblock: &SuperBlock) -> Result<()> {
    let mut buf = vec![0u8; device.block_size()];
    superblock.encode(&mut buf);
    device.write_block(SUPERBLOCK_ID, &buf)
}
