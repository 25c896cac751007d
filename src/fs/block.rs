//! the three roles a data block can play
use serde::{Deserialize, Serialize};

use crate::utils::traits::Record;

use super::{
    directory::DirectoryBlock, inode::Inode, DIRECT_POINTERS, INDIRECT_POINTER,
    POINTERS_PER_BLOCK, UNALLOCATED,
};

/// content of an inode's single indirect pointer
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerBlock {
    pub pointers: [i32; POINTERS_PER_BLOCK],
}

impl Default for PointerBlock {
    fn default() -> Self {
        Self {
            pointers: [UNALLOCATED; POINTERS_PER_BLOCK],
        }
    }
}

impl Record for PointerBlock {}

impl PointerBlock {
    pub fn get(&self, slot: usize) -> Option<u32> {
        self.pointers
            .get(slot)
            .and_then(|pointer| u32::try_from(*pointer).ok())
    }

    pub fn set(&mut self, slot: usize, block: Option<u32>) {
        if let Some(pointer) = self.pointers.get_mut(slot) {
            *pointer = block.map_or(UNALLOCATED, |b| b as i32);
        }
    }

    pub fn allocated(&self) -> impl Iterator<Item = u32> + '_ {
        (0..POINTERS_PER_BLOCK).filter_map(|slot| self.get(slot))
    }
}

/// how a block has to be interpreted, decided by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    Directory,
    File,
    Pointer,
}

impl BlockRole {
    /// role of the block referenced by pointer `slot` of `inode`
    pub fn of(inode: &Inode, slot: usize) -> Option<Self> {
        match slot {
            INDIRECT_POINTER if inode.is_regular_file() => Some(BlockRole::Pointer),
            s if s < DIRECT_POINTERS && inode.is_dir() => Some(BlockRole::Directory),
            s if s < DIRECT_POINTERS && inode.is_regular_file() => Some(BlockRole::File),
            _ => None,
        }
    }
}

/// a block decoded according to its [BlockRole]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Directory(DirectoryBlock),
    File(Vec<u8>),
    Pointer(PointerBlock),
}
