//! what does our filesystem look like in the disk image

use std::collections::HashSet;

use log::debug;
use serde::Serialize;

use crate::{
    disk::DiskImage,
    error::{FsError, Result},
    utils::traits::{DigestInSelf, Record, SerializeAndDigest},
};

use super::{
    block::{Block, BlockRole, PointerBlock},
    directory::{DirEntry, DirectoryBlock},
    inode::{Access, Inode},
    path, FileKind, SuperBlock, BLOCK_SIZE, DEFAULT_PERMISSIONS, ROOT_INODE, SUPERBLOCK_SIZE,
};

/// who performs an operation: the owner of anything it creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: i32,
    pub gid: i32,
    pub is_root: bool,
}

impl Owner {
    /// the bootstrap root user of every fresh filesystem
    pub const ROOT: Owner = Owner {
        uid: 1,
        gid: 1,
        is_root: true,
    };
}

/// a node of the recursive directory listing
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub kind: FileKind,
    pub inode: u32,
    pub children: Vec<TreeNode>,
}

/// A formatted partition inside a disk image.
///
/// it has the following layout, starting at the partition start:
/// - superblock
/// - journal (ext3 only)
/// - inode bitmap
/// - block bitmap
/// - inode table
/// - block table
#[derive(Debug)]
pub struct Ext2Fs {
    /// image file handle to operate underlying image file
    image: DiskImage,
    /// the superblock of this filesystem
    superblock: SuperBlock,
    /// absolute offset of the superblock, which is the partition start
    superblock_offset: u64,
}

impl Ext2Fs {
    /// open the filesystem whose superblock sits at `partition_start`
    /// # Return
    /// [FsError::Corrupted] if the partition was never formatted or the
    /// superblock digest does not match
    pub fn open(image: DiskImage, partition_start: u64) -> Result<Self> {
        let bytes = image.read_bytes(partition_start, SUPERBLOCK_SIZE as usize)?;
        let (mut superblock, _) = SuperBlock::from_bytes(&bytes)?;
        if !superblock.is_valid() {
            return Err(FsError::Corrupted(format!(
                "no filesystem found at offset {partition_start}"
            )));
        }
        if !superblock.verify_digest()? {
            return Err(FsError::Corrupted(
                "superblock digest verification failed".into(),
            ));
        }
        Ok(Self {
            image,
            superblock,
            superblock_offset: partition_start,
        })
    }

    /// wrap a freshly laid out superblock, persisting it
    pub(crate) fn create(image: DiskImage, superblock: SuperBlock, partition_start: u64) -> Result<Self> {
        let mut fs = Self {
            image,
            superblock,
            superblock_offset: partition_start,
        };
        fs.save_superblock()?;
        Ok(fs)
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub(crate) fn superblock_mut(&mut self) -> &mut SuperBlock {
        &mut self.superblock
    }

    pub fn save_superblock(&mut self) -> Result<()> {
        let bytes = self.superblock.to_digested_bytes()?;
        self.image.write_bytes(self.superblock_offset, &bytes)
    }

    pub(crate) fn image(&self) -> &DiskImage {
        &self.image
    }

    pub(crate) fn image_mut(&mut self) -> &mut DiskImage {
        &mut self.image
    }

    pub fn flush(&self) -> Result<()> {
        self.image.flush()
    }
}

/// [Inode] and block operations
impl Ext2Fs {
    pub(crate) fn check_inode_index(&self, index: u32) -> Result<()> {
        if index >= self.superblock.inode_count {
            return Err(FsError::Corrupted(format!(
                "inode {index} is outside the inode table ({} inodes)",
                self.superblock.inode_count
            )));
        }
        Ok(())
    }

    pub(crate) fn check_block_index(&self, index: u32) -> Result<()> {
        if index >= self.superblock.block_count {
            return Err(FsError::Corrupted(format!(
                "block {index} is outside the block table ({} blocks)",
                self.superblock.block_count
            )));
        }
        Ok(())
    }

    pub fn read_inode(&self, index: u32) -> Result<Inode> {
        self.check_inode_index(index)?;
        self.image.read_record(self.superblock.inode_offset(index))
    }

    pub fn save_inode(&mut self, index: u32, inode: &Inode) -> Result<()> {
        self.check_inode_index(index)?;
        let offset = self.superblock.inode_offset(index);
        self.image.write_record(offset, inode).map(|_| ())
    }

    /// raw bytes of block `index`
    pub fn read_block(&self, index: u32) -> Result<Vec<u8>> {
        self.check_block_index(index)?;
        self.image
            .read_bytes(self.superblock.block_offset(index), BLOCK_SIZE as usize)
    }

    /// write `data` into block `index`, zero padding the rest of the block
    pub fn write_block(&mut self, index: u32, data: &[u8]) -> Result<()> {
        self.check_block_index(index)?;
        if data.len() as u64 > BLOCK_SIZE {
            return Err(FsError::InvalidParameter(format!(
                "{} bytes do not fit into a block",
                data.len()
            )));
        }
        let offset = self.superblock.block_offset(index);
        self.image.fill(offset, BLOCK_SIZE, 0)?;
        self.image.write_bytes(offset, data)
    }

    pub fn read_dir_block(&self, index: u32) -> Result<DirectoryBlock> {
        self.check_block_index(index)?;
        self.image.read_record(self.superblock.block_offset(index))
    }

    pub fn write_dir_block(&mut self, index: u32, block: &DirectoryBlock) -> Result<()> {
        self.write_block(index, &block.to_bytes()?)
    }

    pub fn read_pointer_block(&self, index: u32) -> Result<PointerBlock> {
        self.check_block_index(index)?;
        self.image.read_record(self.superblock.block_offset(index))
    }

    pub fn write_pointer_block(&mut self, index: u32, block: &PointerBlock) -> Result<()> {
        self.write_block(index, &block.to_bytes()?)
    }

    /// decode block `index` the way its owner uses it
    pub fn read_typed_block(&self, index: u32, role: BlockRole) -> Result<Block> {
        Ok(match role {
            BlockRole::Directory => Block::Directory(self.read_dir_block(index)?),
            BlockRole::File => Block::File(self.read_block(index)?),
            BlockRole::Pointer => Block::Pointer(self.read_pointer_block(index)?),
        })
    }

    pub fn inode_bitmap(&self) -> Result<Vec<u8>> {
        self.image.read_bytes(
            self.superblock.inode_bitmap_start,
            self.superblock.inode_count as usize,
        )
    }

    pub fn block_bitmap(&self) -> Result<Vec<u8>> {
        self.image.read_bytes(
            self.superblock.block_bitmap_start,
            self.superblock.block_count as usize,
        )
    }
}

/// directory and path operations
impl Ext2Fs {
    /// used entries of every allocated block of directory `dir`
    pub fn dir_entries(&self, dir: u32) -> Result<Vec<(String, u32)>> {
        let inode = self.read_inode(dir)?;
        let mut entries = Vec::new();
        for block in inode.direct_blocks() {
            entries.extend(self.read_dir_block(block)?.entries());
        }
        Ok(entries)
    }

    /// look `name` up inside directory `dir`
    pub fn lookup(&self, dir: u32, name: &str) -> Result<Option<u32>> {
        let inode = self.read_inode(dir)?;
        for block in inode.direct_blocks() {
            if let Some(found) = self.read_dir_block(block)?.entry(name) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// follow `components` from the root directory
    fn walk(&self, components: &[String]) -> Result<u32> {
        let mut current = ROOT_INODE;
        let mut breadcrumb = String::new();
        for name in components {
            if !self.read_inode(current)?.is_dir() {
                return Err(FsError::NotADirectory(display_path(&breadcrumb)));
            }
            breadcrumb.push('/');
            breadcrumb.push_str(name);
            current = self
                .lookup(current, name)?
                .ok_or_else(|| FsError::PathNotFound(breadcrumb.clone()))?;
        }
        Ok(current)
    }

    /// resolve an absolute path to its inode index
    pub fn find_inode_from_path(&self, path: &str) -> Result<u32> {
        self.walk(&path::components(path))
    }

    /// resolve the directory made of `components`, creating missing ones when
    /// `create_parents` is set
    pub fn resolve_dir(
        &mut self,
        components: &[String],
        create_parents: bool,
        owner: &Owner,
    ) -> Result<u32> {
        let mut current = ROOT_INODE;
        let mut breadcrumb = String::new();
        for name in components {
            let parent_path = display_path(&breadcrumb);
            breadcrumb.push('/');
            breadcrumb.push_str(name);
            if !self.read_inode(current)?.is_dir() {
                return Err(FsError::NotADirectory(parent_path));
            }
            current = match self.lookup(current, name)? {
                Some(found) => found,
                None if create_parents => self.create_directory(current, name, owner)?,
                None => return Err(FsError::PathNotFound(breadcrumb)),
            };
        }
        if !self.read_inode(current)?.is_dir() {
            return Err(FsError::NotADirectory(display_path(&breadcrumb)));
        }
        Ok(current)
    }

    /// fail unless `owner` may access inode `index` the requested way
    pub fn check_access(&self, index: u32, access: Access, owner: &Owner, path: &str) -> Result<Inode> {
        let inode = self.read_inode(index)?;
        if !inode.allows(access, owner.is_root) {
            let verb = match access {
                Access::Read => "read",
                Access::Write => "write",
            };
            return Err(FsError::PermissionDenied(format!("can't {verb} {path}")));
        }
        Ok(inode)
    }

    /// make sure `name` can be added to directory `dir`
    pub(crate) fn prepare_entry(&self, dir: u32, name: &str, owner: &Owner) -> Result<()> {
        // the name has to fit an entry
        DirEntry::new(name, dir)?;
        let inode = self.check_access(dir, Access::Write, owner, name)?;
        if self.lookup(dir, name)?.is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        for block in inode.direct_blocks() {
            if self.read_dir_block(block)?.has_free_entry() {
                return Ok(());
            }
        }
        Err(FsError::DirectoryFull(name.to_string()))
    }

    /// link `child` into directory `dir` under `name`
    pub fn add_entry(&mut self, dir: u32, name: &str, child: u32) -> Result<()> {
        let mut inode = self.read_inode(dir)?;
        for block_index in inode.direct_blocks() {
            let mut block = self.read_dir_block(block_index)?;
            if block.has_free_entry() {
                block.insert(name, child)?;
                self.write_dir_block(block_index, &block)?;
                inode.update_modified_at();
                return self.save_inode(dir, &inode);
            }
        }
        Err(FsError::DirectoryFull(name.to_string()))
    }

    /// create directory `name` inside `parent`, owned by `owner`
    pub fn create_directory(&mut self, parent: u32, name: &str, owner: &Owner) -> Result<u32> {
        self.prepare_entry(parent, name, owner)?;
        let (index, mut inode) = self.allocate_inode(owner, DEFAULT_PERMISSIONS, FileKind::Directory)?;
        let block = match self.allocate_block() {
            Ok(block) => block,
            Err(e) => {
                self.free_inode(index)?;
                return Err(e);
            }
        };
        self.write_dir_block(block, &DirectoryBlock::new_directory(index, parent)?)?;
        inode.set_block(0, Some(block));
        inode.size = BLOCK_SIZE as u32;
        self.save_inode(index, &inode)?;
        self.add_entry(parent, name, index)?;
        debug!("created directory {name} as inode {index} in inode {parent}");
        Ok(index)
    }

    /// walk the directory tree from the root, visiting every inode once
    pub fn explore(&self) -> Result<TreeNode> {
        let mut visited = HashSet::new();
        self.explore_from(ROOT_INODE, "/".to_string(), &mut visited)
    }

    fn explore_from(&self, index: u32, name: String, visited: &mut HashSet<u32>) -> Result<TreeNode> {
        visited.insert(index);
        let inode = self.read_inode(index)?;
        let mut children = Vec::new();
        if inode.is_dir() {
            for (child_name, child) in self.dir_entries(index)? {
                if child_name == "." || child_name == ".." || visited.contains(&child) {
                    continue;
                }
                children.push(self.explore_from(child, child_name, visited)?);
            }
        }
        Ok(TreeNode {
            name,
            kind: inode.file_kind,
            inode: index,
            children,
        })
    }
}

fn display_path(breadcrumb: &str) -> String {
    if breadcrumb.is_empty() {
        "/".to_string()
    } else {
        breadcrumb.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{FsKind, USERS_INODE},
        mkfs::make_filesystem,
        utils::init_test_environment::TestEnvironment,
    };

    fn fresh_fs(env: &TestEnvironment) -> anyhow::Result<Ext2Fs> {
        let image = DiskImage::create(env.dir().join("A.dsk"), 96 * 1024)?;
        Ok(make_filesystem(image, 1024, 64 * 1024, FsKind::Ext2)?)
    }

    #[test]
    fn test_reopen_keeps_superblock() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-reopen");
        let fs = fresh_fs(&env)?;
        let superblock = fs.superblock().clone();
        drop(fs);
        let fs = Ext2Fs::open(DiskImage::open(env.dir().join("A.dsk"))?, 1024)?;
        assert_eq!(fs.superblock(), &superblock);
        Ok(())
    }

    #[test]
    fn test_unformatted_partition_is_rejected() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-unformatted");
        let image = DiskImage::create(env.dir().join("A.dsk"), 8 * 1024)?;
        assert!(matches!(
            Ext2Fs::open(image, 512),
            Err(FsError::Corrupted(_))
        ));
        Ok(())
    }

    #[test]
    fn test_nested_directories_link_parents() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-nested");
        let mut fs = fresh_fs(&env)?;
        let a = fs.create_directory(ROOT_INODE, "a", &Owner::ROOT)?;
        let b = fs.create_directory(a, "b", &Owner::ROOT)?;
        assert_eq!(fs.find_inode_from_path("/a/b")?, b);
        assert_eq!(fs.find_inode_from_path("/a/b/..")?, a);
        assert_eq!(fs.lookup(b, ".")?, Some(b));
        assert_eq!(fs.read_inode(b)?.size as u64, BLOCK_SIZE);
        Ok(())
    }

    #[test]
    fn test_resolve_dir_creates_parents() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-parents");
        let mut fs = fresh_fs(&env)?;
        let components = vec!["x".to_string(), "y".to_string()];
        assert!(matches!(
            fs.resolve_dir(&components, false, &Owner::ROOT),
            Err(FsError::PathNotFound(p)) if p == "/x"
        ));
        let y = fs.resolve_dir(&components, true, &Owner::ROOT)?;
        assert_eq!(fs.find_inode_from_path("/x/y")?, y);
        // resolving again creates nothing new
        let free = fs.superblock().free_inodes;
        assert_eq!(fs.resolve_dir(&components, true, &Owner::ROOT)?, y);
        assert_eq!(fs.superblock().free_inodes, free);
        Ok(())
    }

    #[test]
    fn test_file_is_not_a_directory() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-notdir");
        let mut fs = fresh_fs(&env)?;
        let components = vec!["users.txt".to_string(), "x".to_string()];
        assert!(matches!(
            fs.resolve_dir(&components, true, &Owner::ROOT),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            fs.find_inode_from_path("/users.txt/x"),
            Err(FsError::NotADirectory(_))
        ));
        Ok(())
    }

    #[test]
    fn test_directory_full_and_duplicates() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-full");
        let mut fs = fresh_fs(&env)?;
        // root holds `.`, `..` and `users.txt`
        fs.create_directory(ROOT_INODE, "one", &Owner::ROOT)?;
        let free_inodes = fs.superblock().free_inodes;
        let free_blocks = fs.superblock().free_blocks;
        assert!(matches!(
            fs.create_directory(ROOT_INODE, "two", &Owner::ROOT),
            Err(FsError::DirectoryFull(_))
        ));
        assert!(matches!(
            fs.create_directory(ROOT_INODE, "one", &Owner::ROOT),
            Err(FsError::AlreadyExists(_))
        ));
        // failed attempts leak nothing
        assert_eq!(fs.superblock().free_inodes, free_inodes);
        assert_eq!(fs.superblock().free_blocks, free_blocks);
        Ok(())
    }

    #[test]
    fn test_write_permission_required() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-perm");
        let mut fs = fresh_fs(&env)?;
        let mut root = fs.read_inode(ROOT_INODE)?;
        root.permissions = *b"464";
        fs.save_inode(ROOT_INODE, &root)?;
        let user = Owner {
            uid: 2,
            gid: 2,
            is_root: false,
        };
        assert!(matches!(
            fs.create_directory(ROOT_INODE, "d", &user),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(fs.create_directory(ROOT_INODE, "d", &Owner::ROOT).is_ok());
        Ok(())
    }

    #[test]
    fn test_explore_tree() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-explore");
        let mut fs = fresh_fs(&env)?;
        let docs = fs.create_directory(ROOT_INODE, "docs", &Owner::ROOT)?;
        fs.create_directory(docs, "old", &Owner::ROOT)?;

        let tree = fs.explore()?;
        assert_eq!(tree.name, "/");
        assert_eq!(tree.kind, FileKind::Directory);
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["users.txt", "docs"]);
        assert_eq!(tree.children[0].inode, USERS_INODE);
        assert_eq!(tree.children[0].kind, FileKind::RegularFile);
        assert_eq!(tree.children[1].children[0].name, "old");
        Ok(())
    }

    #[test]
    fn test_explore_survives_cycles() -> anyhow::Result<()> {
        let env = TestEnvironment::new("layout-cycle");
        let mut fs = fresh_fs(&env)?;
        let a = fs.create_directory(ROOT_INODE, "a", &Owner::ROOT)?;
        // a hard link back to the root would loop forever without the visited set
        fs.add_entry(a, "loop", ROOT_INODE)?;
        let tree = fs.explore()?;
        assert!(tree.children[1].children.is_empty());
        Ok(())
    }
}
