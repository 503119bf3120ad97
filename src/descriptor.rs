use core::fmt;

use crate::{Error, Result};

/// Handle to an open file, valid from `open` until `close` or unmount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fd(usize);

impl Fd {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for Fd {
    fn from(index: usize) -> Self {
        Fd(index)
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    /// Directory slot of the file.
    pub dir_index: usize,
    /// Current byte offset, never past the file's size.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct FdTable {
    slots: Vec<Option<OpenFile>>,
}

impl FdTable {
    pub fn new(max_fds: usize) -> Self {
        Self {
            slots: vec![None; max_fds],
        }
    }

    /// Takes the lowest free slot for `dir_index`, at offset 0.
    pub fn open(&mut self, dir_index: usize) -> Result<Fd> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::TooManyOpenFiles)?;
        self.slots[index] = Some(OpenFile {
            dir_index,
            offset: 0,
        });
        Ok(Fd(index))
    }

    pub fn close(&mut self, fd: Fd) -> Result<OpenFile> {
        self.slots
            .get_mut(fd.0)
            .and_then(Option::take)
            .ok_or(Error::BadDescriptor)
    }

    pub fn get(&self, fd: Fd) -> Result<&OpenFile> {
        self.slots
            .get(fd.0)
            .and_then(Option::as_ref)
            .ok_or(Error::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.slots
            .get_mut(fd.0)
            .and_then(Option::as_mut)
            .ok_or(Error::BadDescriptor)
    }

    /// Whether any descriptor refers to directory slot `dir_index`.
    pub fn is_referenced(&self, dir_index: usize) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|open| open.dir_index == dir_index)
    }

    /// Pulls every descriptor on `dir_index` back to at most `len`.
    pub fn clamp_offsets(&mut self, dir_index: usize, len: usize) {
        for open in self.slots.iter_mut().flatten() {
            if open.dir_index == dir_index && open.offset > len {
                open.offset = len;
            }
        }
    }

    /// Closes every open descriptor and returns them.
    pub fn close_all(&mut self) -> Vec<Fd> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.take().map(|_| Fd(i)))
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_slot_first() {
        let mut table = FdTable::new(3);
        let a = table.open(5).unwrap();
        let b = table.open(5).unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        table.close(a).unwrap();
        assert_eq!(table.open(7).unwrap(), a);
        table.open(7).unwrap();
        assert_eq!(table.open(7), Err(Error::TooManyOpenFiles));
    }

    #[test]
    fn closed_descriptor_is_invalid() {
        let mut table = FdTable::new(2);
        let fd = table.open(0).unwrap();
        table.close(fd).unwrap();
        assert_eq!(table.close(fd), Err(Error::BadDescriptor));
        assert_eq!(table.get(fd), Err(Error::BadDescriptor));
        assert_eq!(table.get(Fd::from(99)), Err(Error::BadDescriptor));
        assert!(!table.is_referenced(0));
    }

    #[test]
    fn clamp_touches_only_one_file() {
        let mut table = FdTable::new(4);
        let a = table.open(0).unwrap();
        let b = table.open(1).unwrap();
        table.get_mut(a).unwrap().offset = 50;
        table.get_mut(b).unwrap().offset = 50;
        table.clamp_offsets(0, 10);
        assert_eq!(table.get(a).unwrap().offset, 10);
        assert_eq!(table.get(b).unwrap().offset, 50);
        assert_eq!(table.close_all(), vec![a, b]);
        assert_eq!(table.open_count(), 0);
    }
}
