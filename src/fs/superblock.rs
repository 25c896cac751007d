use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, Result},
    utils::{
        fs_size_calculator,
        time_util::{self, *},
        traits::{DigestInSelf, Record},
    },
};

use super::{BLOCK_SIZE, FS_MAGIC, INODE_SIZE, SUPERBLOCK_SIZE};

/// which flavour of the filesystem a partition is formatted with
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsKind {
    #[default]
    Ext2,
    /// ext2 plus a journal region after the superblock
    Ext3,
}

impl FsKind {
    pub const fn type_code(self) -> u32 {
        match self {
            FsKind::Ext2 => 2,
            FsKind::Ext3 => 3,
        }
    }

    pub const fn is_journaled(self) -> bool {
        matches!(self, FsKind::Ext3)
    }
}

impl FromStr for FsKind {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "2fs" | "ext2" => Ok(FsKind::Ext2),
            "3fs" | "ext3" => Ok(FsKind::Ext3),
            _ => Err(FsError::InvalidParameter(format!(
                "filesystem must be 2fs or 3fs, got '{s}'"
            ))),
        }
    }
}

/// The superblock of this filesystem
///
/// All `*_start` fields are absolute offsets inside the disk image.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuperBlock {
    /// 2 for ext2, 3 for ext3
    pub filesystem_type: u32,
    /// magic number
    pub magic: u32,
    pub inode_size: u32,
    /// data block size
    pub block_size: u32,
    pub inode_count: u32,
    pub free_inodes: u32,
    pub block_count: u32,
    pub free_blocks: u32,
    pub mount_count: u32,
    pub created_at: TimeDurationStruct,
    pub last_mounted_at: TimeDurationStruct,
    pub modified_at: TimeDurationStruct,
    /// zero when the filesystem has no journal
    pub journal_start: u64,
    pub inode_bitmap_start: u64,
    pub block_bitmap_start: u64,
    pub inode_table_start: u64,
    pub block_table_start: u64,
    /// allocation hints, the bitmaps stay authoritative
    pub first_free_inode: u32,
    pub first_free_block: u32,
    /// to verify the integrity of this superblock
    pub digest: [u8; 32],
}

impl SuperBlock {
    /// compute the layout of a filesystem occupying `partition_size` bytes at `partition_start`
    ///
    /// the region order is superblock, journal (ext3 only), inode bitmap,
    /// block bitmap, inode table and block table
    pub fn new(partition_start: u64, partition_size: u64, kind: FsKind) -> Result<Self> {
        let journaled = kind.is_journaled();
        let minimum = fs_size_calculator::minimum_partition_size(journaled);
        let n = fs_size_calculator::inode_count(partition_size, journaled);
        if n == 0 || partition_size < minimum {
            return Err(FsError::PartitionTooSmall {
                size: partition_size,
                minimum,
            });
        }
        let inode_count = u32::try_from(n)
            .map_err(|_| FsError::InvalidParameter(format!("{n} inodes are too many")))?;
        let block_count = u32::try_from(fs_size_calculator::block_count(n))
            .map_err(|_| FsError::InvalidParameter(format!("{n} inodes need too many blocks")))?;

        let inode_bitmap_start = partition_start + fs_size_calculator::metadata_size(journaled);
        let block_bitmap_start = inode_bitmap_start + n;
        let inode_table_start = block_bitmap_start + 3 * n;
        let block_table_start = inode_table_start + n * INODE_SIZE;
        let now = time_util::now();
        Ok(Self {
            filesystem_type: kind.type_code(),
            magic: FS_MAGIC,
            inode_size: INODE_SIZE as u32,
            block_size: BLOCK_SIZE as u32,
            inode_count,
            free_inodes: inode_count,
            block_count,
            free_blocks: block_count,
            mount_count: 0,
            created_at: now,
            last_mounted_at: TimeDurationStruct::default(),
            modified_at: now,
            journal_start: if journaled {
                partition_start + SUPERBLOCK_SIZE
            } else {
                0
            },
            inode_bitmap_start,
            block_bitmap_start,
            inode_table_start,
            block_table_start,
            first_free_inode: 0,
            first_free_block: 0,
            digest: [0u8; 32],
        })
    }

    pub fn is_valid(&self) -> bool {
        self.magic == FS_MAGIC
    }

    pub fn fs_kind(&self) -> Option<FsKind> {
        match self.filesystem_type {
            2 => Some(FsKind::Ext2),
            3 => Some(FsKind::Ext3),
            _ => None,
        }
    }

    /// absolute offset of inode `index`
    pub fn inode_offset(&self, index: u32) -> u64 {
        self.inode_table_start + index as u64 * self.inode_size as u64
    }

    /// absolute offset of block `index`
    pub fn block_offset(&self, index: u32) -> u64 {
        self.block_table_start + index as u64 * self.block_size as u64
    }
}

impl SuperBlock {
    pub fn update_last_mounted_at(&mut self) {
        self.mount_count += 1;
        self.last_mounted_at = time_util::now();
    }

    pub fn update_modified_at(&mut self) {
        self.modified_at = time_util::now();
    }
}

impl Record for SuperBlock {}

impl DigestInSelf for SuperBlock {
    fn digest_slot(&mut self) -> &mut [u8; 32] {
        &mut self.digest
    }
}
