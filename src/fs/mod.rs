//! our ext2/ext3-like filesystem living inside a partition
pub mod allocator;
pub mod block;
pub mod directory;
pub mod filekind;
mod fs_api_impl;
pub mod fs_layout;
pub mod inode;
pub mod path;
pub mod superblock;
pub mod user_table;
pub use block::*;
pub use directory::*;
pub use filekind::*;
pub use fs_layout::*;
pub use inode::*;
pub use superblock::*;
pub use user_table::*;

const FS_MAGIC: u32 = 0xEF53;
pub const ROOT_INODE: u32 = 0;
/// inode of `/users.txt`
pub const USERS_INODE: u32 = 1;
pub const USERS_FILE_NAME: &str = "users.txt";
/// bytes reserved for the superblock at the partition start
pub const SUPERBLOCK_SIZE: u64 = 256;
/// bytes reserved for the ext3 journal, right after the superblock
pub const JOURNAL_SIZE: u64 = 50 * BLOCK_SIZE;
/// every inode occupies a slot of this size in the inode table
pub const INODE_SIZE: u64 = 128;
pub const BLOCK_SIZE: u64 = 64;
pub const BLOCK_POINTERS: usize = 15;
pub const DIRECT_POINTERS: usize = 12;
/// index of the single indirect pointer
pub const INDIRECT_POINTER: usize = 12;
pub const POINTERS_PER_BLOCK: usize = 16;
/// the largest file is 12 direct blocks plus a full pointer block
pub const MAX_FILE_BLOCKS: usize = DIRECT_POINTERS + POINTERS_PER_BLOCK;
pub const DIR_ENTRIES_PER_BLOCK: usize = 4;
pub const DIR_NAME_LEN: usize = 12;
pub const DEFAULT_PERMISSIONS: &str = "664";
/// pointer value of an unallocated block or entry
pub const UNALLOCATED: i32 = -1;
