use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, Result},
    utils::{
        text_field::{decode_fixed, encode_fixed},
        traits::Record,
    },
};

use super::{DIR_ENTRIES_PER_BLOCK, DIR_NAME_LEN, UNALLOCATED};

/// one `{name, inode}` pair inside a directory block
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; DIR_NAME_LEN],
    pub inode: i32,
}

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            name: [0u8; DIR_NAME_LEN],
            inode: UNALLOCATED,
        }
    }
}

impl DirEntry {
    pub fn new(name: &str, inode: u32) -> Result<Self> {
        if name.is_empty() {
            return Err(FsError::InvalidParameter("empty file name".into()));
        }
        let name = encode_fixed(name).map_err(|_| {
            FsError::InvalidParameter(format!(
                "file name '{name}' is longer than {DIR_NAME_LEN} bytes"
            ))
        })?;
        Ok(Self {
            name,
            inode: inode as i32,
        })
    }

    /// entries without a name or inode are free
    pub fn is_empty(&self) -> bool {
        self.inode < 0 || self.name[0] == 0
    }

    pub fn name(&self) -> String {
        decode_fixed(&self.name)
    }

    pub fn inode(&self) -> Option<u32> {
        u32::try_from(self.inode).ok()
    }
}

/// A directory block: a fixed array of entries, `.` and `..` first
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryBlock {
    pub entries: [DirEntry; DIR_ENTRIES_PER_BLOCK],
}

impl Record for DirectoryBlock {}

impl DirectoryBlock {
    /// first block of a new directory
    pub fn new_directory(own: u32, parent: u32) -> Result<Self> {
        let mut block = DirectoryBlock::default();
        block.entries[0] = DirEntry::new(".", own)?;
        block.entries[1] = DirEntry::new("..", parent)?;
        Ok(block)
    }

    /// look up `name` among the used entries
    pub fn entry<S: AsRef<str>>(&self, name: S) -> Option<u32> {
        let name = name.as_ref();
        self.entries()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, inode)| inode)
    }

    /// used entries as `(name, inode)` pairs, `.` and `..` included
    pub fn entries(&self) -> impl Iterator<Item = (String, u32)> + '_ {
        self.entries
            .iter()
            .filter(|e| !e.is_empty())
            .filter_map(|e| e.inode().map(|inode| (e.name(), inode)))
    }

    pub fn has_free_entry(&self) -> bool {
        self.entries.iter().any(DirEntry::is_empty)
    }

    /// put `name` into the first free entry
    pub fn insert(&mut self, name: &str, inode: u32) -> Result<()> {
        let entry = DirEntry::new(name, inode)?;
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.is_empty())
            .ok_or_else(|| FsError::DirectoryFull(name.to_string()))?;
        *slot = entry;
        Ok(())
    }
}
