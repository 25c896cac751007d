//! bitmap allocation of inodes and blocks, and mapping file content onto blocks
use log::{debug, trace};

use crate::error::{FsError, Result};

use super::{
    block::PointerBlock, fs_layout::Owner, inode::Inode, Ext2Fs, FileKind, BLOCK_SIZE,
    DIRECT_POINTERS, INDIRECT_POINTER, MAX_FILE_BLOCKS, POINTERS_PER_BLOCK,
};

const FREE: u8 = 0;
const USED: u8 = 1;

/// for inode and data block allocation
impl Ext2Fs {
    fn read_bitmap_byte(&self, bitmap_start: u64, index: u32) -> Result<u8> {
        let bytes = self.image().read_bytes(bitmap_start + index as u64, 1)?;
        Ok(bytes[0])
    }

    fn write_bitmap_byte(&mut self, bitmap_start: u64, index: u32, value: u8) -> Result<()> {
        self.image_mut()
            .write_bytes(bitmap_start + index as u64, &[value])
    }

    pub fn is_inode_used(&self, index: u32) -> Result<bool> {
        self.check_inode_index(index)?;
        let start = self.superblock().inode_bitmap_start;
        Ok(self.read_bitmap_byte(start, index)? != FREE)
    }

    pub fn is_block_used(&self, index: u32) -> Result<bool> {
        self.check_block_index(index)?;
        let start = self.superblock().block_bitmap_start;
        Ok(self.read_bitmap_byte(start, index)? != FREE)
    }

    /// allocate the first free inode, initialized for `owner`
    /// # Return
    /// the index of the inode and the inode itself, already persisted
    pub fn allocate_inode(
        &mut self,
        owner: &Owner,
        permissions: &str,
        kind: FileKind,
    ) -> Result<(u32, Inode)> {
        let inode = Inode::new(kind, owner.uid, owner.gid, permissions)?;
        let index = self
            .inode_bitmap()?
            .iter()
            .position(|b| *b == FREE)
            .ok_or(FsError::NoFreeInodes)? as u32;
        let start = self.superblock().inode_bitmap_start;
        self.write_bitmap_byte(start, index, USED)?;
        self.save_inode(index, &inode)?;

        let superblock = self.superblock_mut();
        superblock.free_inodes = superblock.free_inodes.saturating_sub(1);
        superblock.first_free_inode = index + 1;
        superblock.update_modified_at();
        self.save_superblock()?;
        trace!("allocated inode {index}");
        Ok((index, inode))
    }

    /// release inode `index`, its blocks are left alone
    pub fn free_inode(&mut self, index: u32) -> Result<()> {
        if !self.is_inode_used(index)? {
            return Ok(());
        }
        let start = self.superblock().inode_bitmap_start;
        self.write_bitmap_byte(start, index, FREE)?;
        self.save_inode(index, &Inode::default())?;

        let superblock = self.superblock_mut();
        superblock.free_inodes += 1;
        superblock.first_free_inode = superblock.first_free_inode.min(index);
        superblock.update_modified_at();
        self.save_superblock()?;
        trace!("freed inode {index}");
        Ok(())
    }

    /// allocate the first free data block
    pub fn allocate_block(&mut self) -> Result<u32> {
        let index = self
            .block_bitmap()?
            .iter()
            .position(|b| *b == FREE)
            .ok_or(FsError::NoFreeBlocks)? as u32;
        let start = self.superblock().block_bitmap_start;
        self.write_bitmap_byte(start, index, USED)?;

        let superblock = self.superblock_mut();
        superblock.free_blocks = superblock.free_blocks.saturating_sub(1);
        superblock.first_free_block = index + 1;
        superblock.update_modified_at();
        self.save_superblock()?;
        trace!("allocated block {index}");
        Ok(index)
    }

    /// mark block `index` free, its content stays as it is
    pub fn free_block(&mut self, index: u32) -> Result<()> {
        if !self.is_block_used(index)? {
            return Ok(());
        }
        let start = self.superblock().block_bitmap_start;
        self.write_bitmap_byte(start, index, FREE)?;

        let superblock = self.superblock_mut();
        superblock.free_blocks += 1;
        superblock.first_free_block = superblock.first_free_block.min(index);
        superblock.update_modified_at();
        self.save_superblock()?;
        trace!("freed block {index}");
        Ok(())
    }

    /// zero block `index` and hand it back to the allocator
    fn discard_block(&mut self, index: u32) -> Result<()> {
        self.write_block(index, &[])?;
        self.free_block(index)
    }
}

/// This block is about file content
impl Ext2Fs {
    /// data blocks of a regular file in content order
    pub fn data_blocks(&self, inode: &Inode) -> Result<Vec<u32>> {
        let mut blocks = inode.direct_blocks();
        if let Some(pointer_block) = inode.block(INDIRECT_POINTER) {
            blocks.extend(self.read_pointer_block(pointer_block)?.allocated());
        }
        Ok(blocks)
    }

    /// replace the content of inode `index` with `data`
    ///
    /// blocks are reused where already mapped, allocated where missing, and the
    /// ones the new content no longer needs are zeroed and freed
    pub fn write_file_content(&mut self, index: u32, inode: &mut Inode, data: &[u8]) -> Result<()> {
        let block_size = BLOCK_SIZE as usize;
        let required = data.len().div_ceil(block_size);
        if required > MAX_FILE_BLOCKS {
            return Err(FsError::FileTooLarge {
                required,
                max: MAX_FILE_BLOCKS,
            });
        }
        let mapped = self.map_content(inode, data);
        if mapped.is_ok() {
            inode.size = data.len() as u32;
            inode.update_modified_at();
        }
        // the pointers are saved even on failure so that no block goes missing
        self.save_inode(index, inode)?;
        mapped?;
        debug!("wrote {} bytes into {required} blocks of inode {index}", data.len());
        Ok(())
    }

    fn map_content(&mut self, inode: &mut Inode, data: &[u8]) -> Result<()> {
        let mut chunks = data.chunks(BLOCK_SIZE as usize);
        for slot in 0..DIRECT_POINTERS {
            match chunks.next() {
                Some(chunk) => {
                    let block = match inode.block(slot) {
                        Some(block) => block,
                        None => {
                            let block = self.allocate_block()?;
                            inode.set_block(slot, Some(block));
                            block
                        }
                    };
                    self.write_block(block, chunk)?;
                }
                None => {
                    if let Some(block) = inode.block(slot) {
                        self.discard_block(block)?;
                        inode.set_block(slot, None);
                    }
                }
            }
        }

        if data.len() > DIRECT_POINTERS * BLOCK_SIZE as usize {
            let (pointer_index, mut pointers) = match inode.block(INDIRECT_POINTER) {
                Some(index) => (index, self.read_pointer_block(index)?),
                None => {
                    let index = self.allocate_block()?;
                    inode.set_block(INDIRECT_POINTER, Some(index));
                    (index, PointerBlock::default())
                }
            };
            let mapped = self.map_indirect(&mut pointers, &mut chunks);
            self.write_pointer_block(pointer_index, &pointers)?;
            mapped
        } else if let Some(pointer_index) = inode.block(INDIRECT_POINTER) {
            let pointers = self.read_pointer_block(pointer_index)?;
            for block in pointers.allocated() {
                self.discard_block(block)?;
            }
            self.discard_block(pointer_index)?;
            inode.set_block(INDIRECT_POINTER, None);
            Ok(())
        } else {
            Ok(())
        }
    }

    fn map_indirect<'a>(
        &mut self,
        pointers: &mut PointerBlock,
        chunks: &mut impl Iterator<Item = &'a [u8]>,
    ) -> Result<()> {
        for slot in 0..POINTERS_PER_BLOCK {
            match chunks.next() {
                Some(chunk) => {
                    let block = match pointers.get(slot) {
                        Some(block) => block,
                        None => {
                            let block = self.allocate_block()?;
                            pointers.set(slot, Some(block));
                            block
                        }
                    };
                    self.write_block(block, chunk)?;
                }
                None => {
                    if let Some(block) = pointers.get(slot) {
                        self.discard_block(block)?;
                        pointers.set(slot, None);
                    }
                }
            }
        }
        Ok(())
    }

    /// the content of a regular file, exactly `size` bytes long
    pub fn read_file_content(&self, inode: &Inode) -> Result<Vec<u8>> {
        let size = inode.size as usize;
        let mut content = Vec::with_capacity(size);
        for block in self.data_blocks(inode)? {
            if content.len() >= size {
                break;
            }
            content.extend(self.read_block(block)?);
        }
        content.truncate(size);
        Ok(content)
    }

    /// free every block of inode `index` and then the inode itself
    pub fn release_file(&mut self, index: u32, inode: &Inode) -> Result<()> {
        for block in self.data_blocks(inode)? {
            self.free_block(block)?;
        }
        if let Some(pointer_block) = inode.block(INDIRECT_POINTER) {
            self.free_block(pointer_block)?;
        }
        self.free_inode(index)
    }
}
