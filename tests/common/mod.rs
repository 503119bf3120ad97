//! Common utilities for tests

#![allow(dead_code)]

use std::path::PathBuf;

use flatfat::{BlockDevice, Config, Error, Result};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

pub fn init_log() {
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::DEBUG.into());

    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_names(true)
        .compact();

    let _ = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_test_writer()
        .event_format(format)
        .with_env_filter(filter)
        .try_init();
}

/// A small volume: 512-byte blocks, 61 data blocks, 8 files, 4 descriptors.
pub fn small_config() -> Config {
    Config {
        block_size: 512,
        num_blocks: 64,
        max_files: 8,
        max_fds: 4,
    }
}

/// A fresh image path under the system temp directory, unique per test.
pub fn image_path(test: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("flatfat-{}-{test}.img", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

/// In-memory block device.
/// Writes can be made to fail after a budget is spent, to exercise I/O error paths.
#[derive(Debug)]
pub struct RamDisk {
    data: Vec<u8>,
    block_size: usize,
    num_blocks: usize,
    writes_left: Option<usize>,
}

impl RamDisk {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        RamDisk {
            data: vec![0u8; block_size * num_blocks],
            block_size,
            num_blocks,
            writes_left: None,
        }
    }

    /// Allows `writes` more block writes, then fails every following one.
    pub fn fail_after(&mut self, writes: usize) {
        self.writes_left = Some(writes);
    }

    pub fn block(&self, block_id: usize) -> &[u8] {
        let start = block_id * self.block_size;
        &self.data[start..start + self.block_size]
    }

    fn range(&self, block_id: usize, len: usize) -> Result<core::ops::Range<usize>> {
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        if len != self.block_size {
            return Err(Error::BadBufferSize);
        }
        let start = block_id * self.block_size;
        Ok(start..start + self.block_size)
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_block(&mut self, block_id: usize, buf: &[u8]) -> Result<()> {
        let range = self.range(block_id, buf.len())?;
        match self.writes_left {
            Some(0) => return Err(Error::ShortIo),
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Writes land in `data` directly.
        Ok(())
    }
}
