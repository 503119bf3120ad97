//! The allocation table: one entry per data block, linking each file's blocks into a chain.
//!
//! On disk an entry is a u32: `FAT_FREE`, `FAT_EOC`, or the index of the next block plus one.
//! The offset keeps a link to data block 0 distinct from a free entry.

use tracing::debug;

use crate::codec::{get_u32, put_u32};
use crate::config::*;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    /// In use, last block of its chain.
    EndOfChain,
    /// In use, followed by the given data block.
    Next(u32),
}

impl FatEntry {
    fn decode(raw: u32) -> Self {
        match raw {
            FAT_FREE => FatEntry::Free,
            FAT_EOC => FatEntry::EndOfChain,
            n => FatEntry::Next(n - 1),
        }
    }

    fn encode(self) -> u32 {
        match self {
            FatEntry::Free => FAT_FREE,
            FatEntry::EndOfChain => FAT_EOC,
            FatEntry::Next(n) => n + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocTable {
    entries: Vec<FatEntry>,
}

impl AllocTable {
    /// A table of `num_data_blocks` free entries.
    pub fn new(num_data_blocks: usize) -> Self {
        Self {
            entries: vec![FatEntry::Free; num_data_blocks],
        }
    }

    pub fn decode(buf: &[u8], num_data_blocks: usize) -> Result<Self> {
        let entries = (0..num_data_blocks)
            .map(|i| FatEntry::decode(get_u32(buf, i * FAT_ENTRY_SIZE)))
            .collect::<Vec<_>>();
        let dangling = entries
            .iter()
            .any(|e| matches!(e, FatEntry::Next(n) if *n as usize >= num_data_blocks));
        if dangling {
            return Err(Error::CorruptMetadata);
        }
        Ok(Self { entries })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        for (i, entry) in self.entries.iter().enumerate() {
            put_u32(buf, i * FAT_ENTRY_SIZE, entry.encode());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, block: u32) -> Option<FatEntry> {
        self.entries.get(block as usize).copied()
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|e| **e == FatEntry::Free).count()
    }

    /// Claims the first free entry as a one-block chain.
    pub fn allocate(&mut self) -> Result<u32> {
        let index = self
            .entries
            .iter()
            .position(|e| *e == FatEntry::Free)
            .ok_or(Error::OutOfSpace)?;
        self.entries[index] = FatEntry::EndOfChain;
        debug!(block = index, "data block allocated");
        Ok(index as u32)
    }

    /// The block after `block` in its chain, if any.
    pub fn next(&self, block: u32) -> Option<u32> {
        match self.get(block) {
            Some(FatEntry::Next(n)) => Some(n),
            _ => None,
        }
    }

    /// Follows `skip` links from `start`. `None` if the chain ends first.
    pub fn nth(&self, start: u32, skip: usize) -> Option<u32> {
        let mut block = start;
        for _ in 0..skip {
            block = self.next(block)?;
        }
        Some(block)
    }

    /// The block after `block`, allocating and linking a new tail if `block` ends the chain.
    pub fn next_or_grow(&mut self, block: u32) -> Result<u32> {
        match self.get(block) {
            Some(FatEntry::Next(n)) => Ok(n),
            Some(FatEntry::EndOfChain) => {
                let tail = self.allocate()?;
                self.entries[block as usize] = FatEntry::Next(tail);
                Ok(tail)
            }
            Some(FatEntry::Free) | None => Err(Error::CorruptMetadata),
        }
    }

    /// Number of blocks in the chain starting at `start`.
    pub fn chain_len(&self, start: u32) -> usize {
        let mut len = 0;
        let mut block = Some(start);
        // Bounded by the table size so a looping chain cannot hang us.
        while let Some(b) = block {
            if len >= self.entries.len() || self.get(b).is_none() {
                break;
            }
            len += 1;
            block = self.next(b);
        }
        len
    }

    /// Walks the chain starting at `start` and marks its blocks in `owned`, one flag per data
    /// block. A chain that reaches a free entry or a block already marked is corrupt, which
    /// also rules out loops. Returns the chain length.
    pub fn claim_chain(&self, start: u32, owned: &mut [bool]) -> Result<usize> {
        let mut len = 0;
        let mut block = start;
        loop {
            let seen = owned
                .get_mut(block as usize)
                .ok_or(Error::CorruptMetadata)?;
            if *seen {
                return Err(Error::CorruptMetadata);
            }
            *seen = true;
            len += 1;
            match self.get(block) {
                Some(FatEntry::Next(n)) => block = n,
                Some(FatEntry::EndOfChain) => return Ok(len),
                Some(FatEntry::Free) | None => return Err(Error::CorruptMetadata),
            }
        }
    }

    /// Returns every block of the chain starting at `start` to the free pool.
    /// Returns the number of blocks freed.
    pub fn free_chain(&mut self, start: u32) -> usize {
        let mut freed = 0;
        let mut block = Some(start);
        while let Some(b) = block {
            let Some(entry) = self.entries.get_mut(b as usize) else {
                break;
            };
            if *entry == FatEntry::Free {
                break;
            }
            block = match *entry {
                FatEntry::Next(n) => Some(n),
                _ => None,
            };
            *entry = FatEntry::Free;
            freed += 1;
        }
        debug!(start, freed, "chain freed");
        freed
    }
}
