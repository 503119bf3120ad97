//! The flat directory: a fixed number of slots, each either unused or naming one file.

use tracing::debug;

use crate::codec::{get_u32, put_u32};
use crate::config::*;
use crate::{Error, Result};

const SIZE_OFFSET: usize = NAME_FIELD_LEN;
const FIRST_BLOCK_OFFSET: usize = SIZE_OFFSET + 4;
const USED_OFFSET: usize = FIRST_BLOCK_OFFSET + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: String,
    /// File length in bytes.
    pub size: u32,
    /// Head of the block chain; `None` until the first write.
    pub first_block: Option<u32>,
}

impl DirEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: 0,
            first_block: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        buf[..self.name.len()].copy_from_slice(self.name.as_bytes());
        put_u32(buf, SIZE_OFFSET, self.size);
        put_u32(buf, FIRST_BLOCK_OFFSET, self.first_block.unwrap_or(NO_BLOCK));
        buf[USED_OFFSET] = 1;
    }

    fn decode(buf: &[u8], num_data_blocks: usize) -> Result<Option<Self>> {
        if buf[USED_OFFSET] == 0 {
            return Ok(None);
        }
        let name = &buf[..NAME_FIELD_LEN];
        let len = name.iter().position(|&c| c == 0).unwrap_or(NAME_FIELD_LEN);
        let name = core::str::from_utf8(&name[..len]).map_err(|_| Error::CorruptMetadata)?;
        validate_name(name).map_err(|_| Error::CorruptMetadata)?;

        let first_block = match get_u32(buf, FIRST_BLOCK_OFFSET) {
            NO_BLOCK => None,
            b if (b as usize) < num_data_blocks => Some(b),
            _ => return Err(Error::CorruptMetadata),
        };
        Ok(Some(Self {
            name: name.to_string(),
            size: get_u32(buf, SIZE_OFFSET),
            first_block,
        }))
    }
}

/// Checks a file name: non-empty, no NUL bytes, at most `MAX_FILE_NAME_LEN` bytes.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(Error::InvalidFileName);
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    slots: Vec<Option<DirEntry>>,
}

impl Directory {
    pub fn new(max_files: usize) -> Self {
        Self {
            slots: vec![None; max_files],
        }
    }

    pub fn decode(buf: &[u8], max_files: usize, num_data_blocks: usize) -> Result<Self> {
        let slots = buf
            .chunks_exact(DIR_ENTRY_SIZE)
            .take(max_files)
            .map(|raw| DirEntry::decode(raw, num_data_blocks))
            .collect::<Result<Vec<_>>>()?;
        let dir = Self { slots };
        // Names are unique among used entries.
        for (i, entry) in dir.iter() {
            if dir.find(entry.name()) != Some(i) {
                return Err(Error::CorruptMetadata);
            }
        }
        Ok(dir)
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        for (slot, raw) in self.slots.iter().zip(buf.chunks_exact_mut(DIR_ENTRY_SIZE)) {
            if let Some(entry) = slot {
                entry.encode(raw);
            }
        }
    }

    /// Slot of the used entry named exactly `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.iter().find(|(_, e)| e.name == name).map(|(i, _)| i)
    }

    /// Claims the first unused slot for an empty file called `name`.
    pub fn create(&mut self, name: &str) -> Result<usize> {
        validate_name(name)?;
        if self.find(name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::DirectoryFull)?;
        self.slots[index] = Some(DirEntry::new(name));
        debug!(%name, slot = index, "directory entry created");
        Ok(index)
    }

    /// Clears slot `index`, returning the entry it held.
    pub fn remove(&mut self, index: usize) -> Result<DirEntry> {
        self.slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(Error::NotFound)
    }

    pub fn get(&self, index: usize) -> Option<&DirEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DirEntry> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Used entries with their slot indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (i, e)))
    }

    /// Number of used entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_find_remove() {
        let mut dir = Directory::new(4);
        assert_eq!(dir.create("a").unwrap(), 0);
        assert_eq!(dir.create("b").unwrap(), 1);
        assert_eq!(dir.create("a"), Err(Error::AlreadyExists));
        assert_eq!(dir.find("b"), Some(1));
        assert_eq!(dir.find("B"), None);

        dir.remove(0).unwrap();
        assert_eq!(dir.find("a"), None);
        assert_eq!(dir.remove(0), Err(Error::NotFound));
        // The freed slot is reused first.
        assert_eq!(dir.create("c").unwrap(), 0);
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn names_are_checked() {
        let mut dir = Directory::new(4);
        assert_eq!(dir.create(""), Err(Error::InvalidFileName));
        assert_eq!(dir.create("a\0b"), Err(Error::InvalidFileName));
        assert_eq!(dir.create("sixteen-bytes-xx"), Err(Error::NameTooLong));
        dir.create("fifteen-bytes-x").unwrap();
        assert!(!dir.is_empty());
    }

    #[test]
    fn full_directory() {
        let mut dir = Directory::new(2);
        dir.create("a").unwrap();
        dir.create("b").unwrap();
        assert_eq!(dir.create("c"), Err(Error::DirectoryFull));
    }

    #[test]
    fn decode_keeps_slot_positions() {
        let mut dir = Directory::new(4);
        dir.create("a").unwrap();
        dir.create("b").unwrap();
        dir.remove(0).unwrap();
        let entry = dir.get_mut(1).unwrap();
        entry.size = 100;
        entry.first_block = Some(0);

        let mut buf = vec![0u8; 512];
        dir.encode(&mut buf);
        let decoded = Directory::decode(&buf, 4, 8).unwrap();
        assert_eq!(decoded, dir);
        assert_eq!(decoded.get(1).unwrap().first_block, Some(0));
        assert!(decoded.get(0).is_none());
    }

    #[test]
    fn decode_rejects_dangling_first_block() {
        let mut dir = Directory::new(1);
        dir.create("a").unwrap();
        dir.get_mut(0).unwrap().first_block = Some(7);
        let mut buf = vec![0u8; 512];
        dir.encode(&mut buf);
        assert_eq!(Directory::decode(&buf, 1, 4), Err(Error::CorruptMetadata));
    }
}
