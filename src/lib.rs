//! Flatfat is a minimal FAT-style file system over a flat, block-addressed backing file.
//! For simplicity, there are no directories, permissions, timestamps, caching or journaling.
//!
//! Flatfat's linear layout:
//! - Block 0: Superblock
//! - Block 1: Allocation table (one entry per data block)
//! - Block 2: Directory
//! - Block 3..: Data blocks
//!
//! Flatfat's layers (from bottom to top):
//! 1. Block Device: fixed-size block I/O. `BlockFile` backs it with a host file.
//! 2. Metadata: superblock, allocation table and directory, held in memory while mounted.
//! 3. File: byte offsets translated to block chains, read-modify-write of partial blocks.
//! 4. FileSystem: the mounted session with its descriptor table.

mod block_dev;
mod block_file;
mod codec;
mod config;
mod descriptor;
mod directory;
mod error;
mod fat;
mod file;
mod fs;
mod superblock;

pub use block_dev::BlockDevice;
pub use block_file::BlockFile;
pub use config::*;
pub use descriptor::{Fd, FdTable, OpenFile};
pub use directory::{validate_name, DirEntry, Directory};
pub use error::ErrorKind;
pub use error::FsError as Error;
pub use error::Result;
pub use fat::{AllocTable, FatEntry};
pub use fs::*;
pub use superblock::*;
