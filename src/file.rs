//! Byte-range access to a file's block chain.

use tracing::warn;

use crate::directory::DirEntry;
use crate::fat::AllocTable;
use crate::{BlockDevice, Error, Result, SuperBlock};

/// Reads from a file into the provided buffer, starting at `offset`.
/// Reads stop at the end of the file; reading at or past it returns 0.
/// Returns the number of bytes read.
pub fn fread(
    device: &mut impl BlockDevice,
    superblock: &SuperBlock,
    fat: &AllocTable,
    entry: &DirEntry,
    offset: usize,
    buffer: &mut [u8],
) -> Result<usize> {
    let size = entry.size as usize;
    if offset >= size || buffer.is_empty() {
        return Ok(0);
    }
    let len = buffer.len().min(size - offset);
    let first_block = entry.first_block.ok_or(Error::CorruptMetadata)?;

    let block_size = superblock.block_size();
    let mut block = fat.nth(first_block, offset / block_size);
    let mut block_offset = offset % block_size;
    let mut block_buf = vec![0u8; block_size];
    let mut bytes_read = 0;

    while bytes_read < len {
        let Some(current_block) = block else {
            warn!(file = entry.name(), size, bytes_read, "block chain shorter than file size");
            break;
        };
        device.read_block(superblock.data_block_id(current_block), &mut block_buf)?;

        let to_copy = (block_size - block_offset).min(len - bytes_read);
        buffer[bytes_read..bytes_read + to_copy]
            .copy_from_slice(&block_buf[block_offset..block_offset + to_copy]);

        bytes_read += to_copy;
        block_offset = 0;
        block = fat.next(current_block);
    }

    Ok(bytes_read)
}

/// Writes the buffer into a file at `offset`, extending its chain as needed.
/// Each touched block is read, patched and written back, so bytes around the written range
/// survive. The file size grows to cover the write and never shrinks.
/// Returns the number of bytes written.
///
/// Capacity and free space are checked before anything changes. An I/O failure partway
/// leaves already linked blocks in the chain and the size untouched.
pub fn fwrite(
    device: &mut impl BlockDevice,
    superblock: &SuperBlock,
    fat: &mut AllocTable,
    entry: &mut DirEntry,
    offset: usize,
    buffer: &[u8],
) -> Result<usize> {
    if buffer.is_empty() {
        return Ok(0);
    }
    let end = offset.checked_add(buffer.len()).ok_or(Error::FileTooLarge)?;
    if end > superblock.capacity() {
        return Err(Error::FileTooLarge);
    }

    let block_size = superblock.block_size();
    let have = entry.first_block.map_or(0, |b| fat.chain_len(b));
    let need = end.div_ceil(block_size);
    if need > have && need - have > fat.free_count() {
        return Err(Error::OutOfSpace);
    }

    let mut current_block = match entry.first_block {
        Some(b) => b,
        None => {
            let b = fat.allocate()?;
            entry.first_block = Some(b);
            b
        }
    };
    for _ in 0..offset / block_size {
        current_block = fat.next_or_grow(current_block)?;
    }

    let mut block_offset = offset % block_size;
    let mut block_buf = vec![0u8; block_size];
    let mut bytes_written = 0;

    loop {
        let block_id = superblock.data_block_id(current_block);
        device.read_block(block_id, &mut block_buf)?;
        let to_copy = (block_size - block_offset).min(buffer.len() - bytes_written);
        block_buf[block_offset..block_offset + to_copy]
            .copy_from_slice(&buffer[bytes_written..bytes_written + to_copy]);
        device.write_block(block_id, &block_buf)?;

        bytes_written += to_copy;
        block_offset = 0;
        if bytes_written == buffer.len() {
            break;
        }
        current_block = fat.next_or_grow(current_block)?;
    }

    if end > entry.size as usize {
        entry.size = end as u32;
    }

    Ok(bytes_written)
}
