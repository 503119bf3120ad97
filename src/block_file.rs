//! A block device backed by a regular host file.
//!
//! Every block transfer seeks and reads or writes the file directly; there is no caching.
//! A backing file may be held open by at most one [`BlockFile`] in the process at a time.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use spin::Mutex;
use tracing::{debug, info, trace};

use crate::{BlockDevice, Error, Result};

lazy_static! {
    /// Canonical paths of backing files currently held open.
    static ref OPEN_DEVICES: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());
}

#[derive(Debug)]
pub struct BlockFile {
    path: PathBuf,
    file: Option<File>,
    block_size: usize,
    num_blocks: usize,
}

impl BlockFile {
    /// Creates (or truncates) `path` and fills it with `num_blocks` zeroed blocks.
    pub fn format(path: impl AsRef<Path>, block_size: usize, num_blocks: usize) -> Result<()> {
        let path = path.as_ref();
        if block_size == 0 || num_blocks == 0 {
            return Err(Error::InvalidConfig);
        }
        if let Ok(canonical) = path.canonicalize() {
            if OPEN_DEVICES.lock().contains(&canonical) {
                return Err(Error::DeviceBusy);
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let zero = vec![0u8; block_size];
        for _ in 0..num_blocks {
            file.write_all(&zero)?;
        }
        file.sync_all()?;

        info!(path = %path.display(), block_size, num_blocks, "device formatted");
        Ok(())
    }

    /// Opens an existing backing file. The block count is taken from the file length.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig);
        }
        let path = path.as_ref().canonicalize()?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        if len == 0 || len % block_size as u64 != 0 {
            return Err(Error::InvalidConfig);
        }
        let num_blocks = (len / block_size as u64) as usize;

        if !OPEN_DEVICES.lock().insert(path.clone()) {
            return Err(Error::DeviceBusy);
        }

        debug!(path = %path.display(), num_blocks, "device opened");
        Ok(Self {
            path,
            file: Some(file),
            block_size,
            num_blocks,
        })
    }

    /// Releases the backing file. Fails if it was already closed.
    pub fn close(&mut self) -> Result<()> {
        let file = self.file.take().ok_or(Error::DeviceNotOpen)?;
        OPEN_DEVICES.lock().remove(&self.path);
        file.sync_all()?;
        debug!(path = %self.path.display(), "device closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_block(&mut self, block_id: usize, len: usize) -> Result<&mut File> {
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        if len != self.block_size {
            return Err(Error::BadBufferSize);
        }
        let offset = (block_id * self.block_size) as u64;
        let file = self.file.as_mut().ok_or(Error::DeviceNotOpen)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(file)
    }
}

impl BlockDevice for BlockFile {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        self.seek_block(block_id, buf.len())?.read_exact(buf)?;
        trace!(block_id, "block read");
        Ok(())
    }

    fn write_block(&mut self, block_id: usize, buf: &[u8]) -> Result<()> {
        self.seek_block(block_id, buf.len())?.write_all(buf)?;
        trace!(block_id, "block written");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::DeviceNotOpen)?;
        file.flush()?;
        Ok(())
    }
}

impl Drop for BlockFile {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            OPEN_DEVICES.lock().remove(&self.path);
        }
    }
}
