use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::*;
use crate::descriptor::{Fd, FdTable};
use crate::directory::Directory;
use crate::fat::AllocTable;
use crate::file::{fread, fwrite};
use crate::superblock::{read_superblock, write_superblock};
use crate::{BlockDevice, BlockFile, Error, Result, SuperBlock};

/// Summary of one file, as returned by [`FileSystem::list`] and [`FileSystem::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
    /// Blocks currently held by the file's chain.
    pub blocks: usize,
}

/// A mounted volume.
///
/// Metadata lives in memory for the whole session and is written back by [`sync`] and
/// [`unmount`]. Block data is read and written through to the device on every call.
/// A session is single-threaded; wrap it in a lock to share it.
///
/// [`sync`]: FileSystem::sync
/// [`unmount`]: FileSystem::unmount
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: D,
    superblock: SuperBlock,
    fat: AllocTable,
    directory: Directory,
    fds: FdTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Writes an empty volume onto `device`: superblock, a free allocation table, an empty
    /// directory.
    pub fn format(device: &mut D, config: &Config) -> Result<()> {
        config.validate()?;
        if config.block_size != device.block_size() || config.num_blocks > device.num_blocks() {
            return Err(Error::InvalidConfig);
        }
        let superblock = SuperBlock::new(config)?;
        write_metadata(
            device,
            &superblock,
            &AllocTable::new(superblock.num_data_blocks()),
            &Directory::new(superblock.max_files()),
        )?;
        device.flush()?;
        info!(
            num_blocks = superblock.num_blocks,
            data_blocks = superblock.num_data_blocks,
            max_files = superblock.max_files,
            "volume formatted"
        );
        Ok(())
    }

    /// Loads the volume's metadata from `device` and starts a session with an empty
    /// descriptor table of `config.max_fds` slots. The geometry comes from the superblock.
    pub fn mount(mut device: D, config: &Config) -> Result<Self> {
        if config.max_fds == 0 {
            return Err(Error::InvalidConfig);
        }
        let superblock = read_superblock(&mut device)?;
        let mut buf = vec![0u8; superblock.block_size()];

        device.read_block(superblock.fat_start as usize, &mut buf)?;
        let fat = AllocTable::decode(&buf, superblock.num_data_blocks())?;
        device.read_block(superblock.dir_start as usize, &mut buf)?;
        let directory = Directory::decode(
            &buf,
            superblock.max_files(),
            superblock.num_data_blocks(),
        )?;
        check_ownership(&fat, &directory, superblock.block_size())?;

        info!(files = directory.len(), free_blocks = fat.free_count(), "volume mounted");
        Ok(Self {
            device,
            superblock,
            fat,
            directory,
            fds: FdTable::new(config.max_fds),
        })
    }

    /// Closes every descriptor still open, writes the metadata back and hands the device
    /// back to the caller.
    pub fn unmount(mut self) -> Result<D> {
        for fd in self.fds.close_all() {
            warn!(%fd, "descriptor still open at unmount, closing");
        }
        self.sync()?;
        info!("volume unmounted");
        Ok(self.device)
    }

    /// Writes the superblock, allocation table and directory to their blocks.
    pub fn sync(&mut self) -> Result<()> {
        write_metadata(&mut self.device, &self.superblock, &self.fat, &self.directory)?;
        self.device.flush()
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        self.directory.create(name)?;
        Ok(())
    }

    /// Removes a file and frees its whole chain. Open files cannot be deleted.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let index = self.directory.find(name).ok_or(Error::NotFound)?;
        if self.fds.is_referenced(index) {
            return Err(Error::FileBusy);
        }
        let entry = self.directory.remove(index)?;
        let freed = entry.first_block.map_or(0, |b| self.fat.free_chain(b));
        debug!(%name, freed, "file deleted");
        Ok(())
    }

    pub fn open(&mut self, name: &str) -> Result<Fd> {
        let index = self.directory.find(name).ok_or(Error::NotFound)?;
        let fd = self.fds.open(index)?;
        debug!(%name, %fd, "file opened");
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.fds.close(fd)?;
        debug!(%fd, "file closed");
        Ok(())
    }

    /// Size in bytes of the file behind `fd`.
    pub fn size(&self, fd: Fd) -> Result<usize> {
        let open = self.fds.get(fd)?;
        Ok(self.entry_size(open.dir_index))
    }

    /// Current offset of `fd`.
    pub fn tell(&self, fd: Fd) -> Result<usize> {
        Ok(self.fds.get(fd)?.offset)
    }

    /// Moves `fd` to `offset`. Seeking past the end of the file is an error.
    pub fn seek(&mut self, fd: Fd, offset: usize) -> Result<()> {
        let dir_index = self.fds.get(fd)?.dir_index;
        if offset > self.entry_size(dir_index) {
            return Err(Error::OutOfBounds);
        }
        self.fds.get_mut(fd)?.offset = offset;
        Ok(())
    }

    /// Shrinks the file behind `fd` to `length` bytes. Growing is an error.
    ///
    /// Descriptors positioned past the new end are moved back to it. The chain keeps its
    /// blocks; later writes reuse them and [`delete`](FileSystem::delete) frees them.
    pub fn truncate(&mut self, fd: Fd, length: usize) -> Result<()> {
        let dir_index = self.fds.get(fd)?.dir_index;
        let entry = self
            .directory
            .get_mut(dir_index)
            .ok_or(Error::CorruptMetadata)?;
        if length > entry.size as usize {
            return Err(Error::OutOfBounds);
        }
        entry.size = length as u32;
        self.fds.clamp_offsets(dir_index, length);
        debug!(%fd, length, "file truncated");
        Ok(())
    }

    /// Reads up to `buf.len()` bytes at the descriptor's offset and advances it.
    /// Returns 0 at end of file.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let open = *self.fds.get(fd)?;
        let entry = self
            .directory
            .get(open.dir_index)
            .ok_or(Error::CorruptMetadata)?;
        let bytes_read = fread(
            &mut self.device,
            &self.superblock,
            &self.fat,
            entry,
            open.offset,
            buf,
        )?;
        self.fds.get_mut(fd)?.offset += bytes_read;
        Ok(bytes_read)
    }

    /// Writes `buf` at the descriptor's offset and advances it.
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let open = *self.fds.get(fd)?;
        let entry = self
            .directory
            .get_mut(open.dir_index)
            .ok_or(Error::CorruptMetadata)?;
        let bytes_written = fwrite(
            &mut self.device,
            &self.superblock,
            &mut self.fat,
            entry,
            open.offset,
            buf,
        )?;
        self.fds.get_mut(fd)?.offset += bytes_written;
        Ok(bytes_written)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.directory.find(name).is_some()
    }

    pub fn stat(&self, name: &str) -> Result<FileInfo> {
        let index = self.directory.find(name).ok_or(Error::NotFound)?;
        self.info(index).ok_or(Error::NotFound)
    }

    /// Every file on the volume, in directory order.
    pub fn list(&self) -> Vec<FileInfo> {
        self.directory
            .iter()
            .filter_map(|(i, _)| self.info(i))
            .collect()
    }

    pub fn free_blocks(&self) -> usize {
        self.fat.free_count()
    }

    /// Bytes of file data the volume can hold.
    pub fn capacity(&self) -> usize {
        self.superblock.capacity()
    }

    pub fn open_count(&self) -> usize {
        self.fds.open_count()
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn entry_size(&self, dir_index: usize) -> usize {
        self.directory
            .get(dir_index)
            .map_or(0, |entry| entry.size as usize)
    }

    fn info(&self, dir_index: usize) -> Option<FileInfo> {
        let entry = self.directory.get(dir_index)?;
        Some(FileInfo {
            name: entry.name().to_string(),
            size: entry.size as usize,
            blocks: entry.first_block.map_or(0, |b| self.fat.chain_len(b)),
        })
    }
}

/// Every file's chain is well formed and long enough for its size, and no data block
/// belongs to two files.
fn check_ownership(fat: &AllocTable, directory: &Directory, block_size: usize) -> Result<()> {
    let mut owned = vec![false; fat.len()];
    for (_, entry) in directory.iter() {
        let blocks = match entry.first_block {
            Some(start) => fat.claim_chain(start, &mut owned).inspect_err(|_| {
                warn!(name = entry.name(), start, "broken block chain");
            })?,
            None => 0,
        };
        if entry.size as usize > blocks * block_size {
            warn!(name = entry.name(), size = entry.size, blocks, "chain shorter than file");
            return Err(Error::CorruptMetadata);
        }
    }
    Ok(())
}

fn write_metadata<D: BlockDevice>(
    device: &mut D,
    superblock: &SuperBlock,
    fat: &AllocTable,
    directory: &Directory,
) -> Result<()> {
    write_superblock(device, superblock)?;
    let mut buf = vec![0u8; superblock.block_size()];
    fat.encode(&mut buf);
    device.write_block(superblock.fat_start as usize, &buf)?;
    directory.encode(&mut buf);
    device.write_block(superblock.dir_start as usize, &buf)?;
    Ok(())
}

/// Creates the backing file at `path` and formats an empty volume on it.
pub fn make_fs(path: impl AsRef<Path>, config: &Config) -> Result<()> {
    config.validate()?;
    let path = path.as_ref();
    BlockFile::format(path, config.block_size, config.num_blocks)?;
    let mut device = BlockFile::open(path, config.block_size)?;
    FileSystem::format(&mut device, config)?;
    device.close()
}

/// Opens the backing file at `path` and mounts the volume on it.
/// Fails with [`Error::DeviceBusy`] while another session holds the same file.
pub fn mount_fs(path: impl AsRef<Path>, config: &Config) -> Result<FileSystem<BlockFile>> {
    let device = BlockFile::open(path, config.block_size)?;
    FileSystem::mount(device, config)
}

/// Unmounts a file-backed volume and releases its backing file.
pub fn umount_fs(fs: FileSystem<BlockFile>) -> Result<()> {
    let mut device = fs.unmount()?;
    device.close()
}
