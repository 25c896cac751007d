//! This module contains functions to calculate the size of different fs components

use crate::fs::{BLOCK_SIZE, INODE_SIZE, JOURNAL_SIZE, SUPERBLOCK_SIZE};

/// calculate how many bytes a single inode costs across the whole layout
///
/// every inode brings one byte of inode bitmap, three bytes of block bitmap,
/// its slot in the inode table and three data blocks
/// # Example
/// ```
/// use vdisk::utils::fs_size_calculator::per_inode_cost;
/// assert_eq!(per_inode_cost(), 1 + 3 + 128 + 3 * 64);
/// ```
pub const fn per_inode_cost() -> u64 {
    1 + 3 + INODE_SIZE + 3 * BLOCK_SIZE
}

/// calculate the fixed region placed before the bitmaps
/// # Arguments
/// - `journaled`: whether a journal region follows the superblock
/// # Example
/// ```
/// use vdisk::utils::fs_size_calculator::metadata_size;
/// use vdisk::fs::{JOURNAL_SIZE, SUPERBLOCK_SIZE};
/// assert_eq!(metadata_size(false), SUPERBLOCK_SIZE);
/// assert_eq!(metadata_size(true), SUPERBLOCK_SIZE + JOURNAL_SIZE);
/// ```
pub const fn metadata_size(journaled: bool) -> u64 {
    if journaled {
        SUPERBLOCK_SIZE + JOURNAL_SIZE
    } else {
        SUPERBLOCK_SIZE
    }
}

/// calculate how many inodes fit into a partition
/// # Arguments
/// - `partition_size`: the size of the partition in bytes
/// - `journaled`: whether the layout reserves a journal region
/// # Return
/// the number of inodes, zero when the partition can't even hold the metadata
/// # Example
/// ```
/// use vdisk::utils::fs_size_calculator::{inode_count, metadata_size, per_inode_cost};
/// let size = metadata_size(false) + 10 * per_inode_cost() + 5;
/// assert_eq!(inode_count(size, false), 10);
/// assert_eq!(inode_count(100, false), 0);
/// ```
pub const fn inode_count(partition_size: u64, journaled: bool) -> u64 {
    partition_size.saturating_sub(metadata_size(journaled)) / per_inode_cost()
}

/// data blocks come in a fixed ratio of three per inode
pub const fn block_count(inode_count: u64) -> u64 {
    3 * inode_count
}

/// calculate the smallest partition able to hold one inode
/// # Example
/// ```
/// use vdisk::utils::fs_size_calculator::{inode_count, minimum_partition_size};
/// let minimum = minimum_partition_size(true);
/// assert_eq!(inode_count(minimum, true), 1);
/// assert_eq!(inode_count(minimum - 1, true), 0);
/// ```
pub const fn minimum_partition_size(journaled: bool) -> u64 {
    metadata_size(journaled) + per_inode_cost()
}
