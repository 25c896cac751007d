//! read-only views of the on-disk structures, for reports and debugging
use crate::{
    disk::{DiskImage, Mbr},
    error::{FsError, Result},
    fs::{Block, BlockRole, DirectoryBlock, Inode, SuperBlock, TreeNode},
    mkdisk::validate_letter,
    Context,
};

impl Context {
    /// the MBR of disk `letter`
    pub fn mbr_snapshot(&self, letter: &str) -> Result<Mbr> {
        let letter = validate_letter(letter)?;
        Mbr::read_from(&DiskImage::open(self.disk_path(&letter))?)
    }

    pub fn superblock_snapshot(&self, id: &str) -> Result<SuperBlock> {
        Ok(self.open_fs(id)?.superblock().clone())
    }

    pub fn inode_at(&self, id: &str, index: u32) -> Result<Inode> {
        self.open_fs(id)?.read_inode(index)
    }

    /// block `index` decoded as directory entries
    pub fn directory_block_at(&self, id: &str, index: u32) -> Result<DirectoryBlock> {
        self.open_fs(id)?.read_dir_block(index)
    }

    pub fn raw_block_at(&self, id: &str, index: u32) -> Result<Vec<u8>> {
        self.open_fs(id)?.read_block(index)
    }

    /// the block pointer `slot` of inode `inode` refers to, decoded by its role
    /// # Return
    /// `None` when the pointer is unallocated
    pub fn typed_block(&self, id: &str, inode: u32, slot: usize) -> Result<Option<Block>> {
        let fs = self.open_fs(id)?;
        let owner = fs.read_inode(inode)?;
        let role = BlockRole::of(&owner, slot).ok_or_else(|| {
            FsError::InvalidParameter(format!(
                "pointer {slot} of a {} has no meaning",
                owner.file_kind
            ))
        })?;
        owner
            .block(slot)
            .map(|block| fs.read_typed_block(block, role))
            .transpose()
    }

    /// one byte per inode, 1 when used
    pub fn inode_bitmap(&self, id: &str) -> Result<Vec<u8>> {
        self.open_fs(id)?.inode_bitmap()
    }

    /// one byte per block, 1 when used
    pub fn block_bitmap(&self, id: &str) -> Result<Vec<u8>> {
        self.open_fs(id)?.block_bitmap()
    }

    /// the directory tree of mount `id`, from the root
    pub fn explore(&self, id: &str) -> Result<TreeNode> {
        self.open_fs(id)?.explore()
    }
}
