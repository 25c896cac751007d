//! create our filesystem inside a mounted partition
use byte_unit::Byte;
use log::info;

use crate::{
    disk::DiskImage,
    error::{FsError, Result},
    fs::{
        DirectoryBlock, Ext2Fs, FileKind, FsKind, Inode, Owner, SuperBlock, UserTable,
        BLOCK_SIZE, DEFAULT_PERMISSIONS, ROOT_INODE, USERS_FILE_NAME, USERS_INODE,
    },
    Context,
};

/// lay a fresh filesystem over `partition_size` bytes at `partition_start`
/// # Params
/// - `image`: the disk image holding the partition
/// - `partition_start`: absolute offset of the partition
/// - `partition_size`: the size of the partition
/// - `kind`: [FsKind::Ext3] also reserves a journal region
///
/// # Return
/// the opened filesystem, seeded with the root directory and `/users.txt`
pub fn make_filesystem(
    mut image: DiskImage,
    partition_start: u64,
    partition_size: u64,
    kind: FsKind,
) -> Result<Ext2Fs> {
    let superblock = SuperBlock::new(partition_start, partition_size, kind)?;
    // bitmaps, journal and both tables start out zeroed
    image.fill(partition_start, partition_size, 0)?;
    let inode_count = superblock.inode_count;
    let mut fs = Ext2Fs::create(image, superblock, partition_start)?;
    // every pointer of a free inode is unallocated
    let free_inode = Inode::default();
    for index in 0..inode_count {
        fs.save_inode(index, &free_inode)?;
    }

    let (root, mut root_inode) =
        fs.allocate_inode(&Owner::ROOT, DEFAULT_PERMISSIONS, FileKind::Directory)?;
    let root_block = fs.allocate_block()?;
    let (users, mut users_inode) =
        fs.allocate_inode(&Owner::ROOT, DEFAULT_PERMISSIONS, FileKind::RegularFile)?;
    if root != ROOT_INODE || users != USERS_INODE {
        return Err(FsError::Corrupted(format!(
            "seeded inodes landed at {root} and {users}"
        )));
    }

    let mut directory = DirectoryBlock::new_directory(root, root)?;
    directory.insert(USERS_FILE_NAME, users)?;
    fs.write_dir_block(root_block, &directory)?;
    root_inode.set_block(0, Some(root_block));
    root_inode.size = BLOCK_SIZE as u32;
    fs.save_inode(root, &root_inode)?;

    let users_text = UserTable::bootstrap().to_text();
    fs.write_file_content(users, &mut users_inode, users_text.as_bytes())?;
    fs.flush()?;
    Ok(fs)
}

impl Context {
    /// format mounted partition `id`, wiping whatever it held
    /// # Params
    /// - `id`: the mount id
    /// - `format_type`: only `FULL` is supported
    /// - `kind`: ext2 or ext3
    pub fn format(&mut self, id: &str, format_type: &str, kind: FsKind) -> Result<SuperBlock> {
        if !format_type.eq_ignore_ascii_case("full") {
            return Err(FsError::InvalidParameter(format!(
                "format type must be FULL, got '{format_type}'"
            )));
        }
        let (image, partition) = self.mounted_partition(id)?;
        let mut fs = make_filesystem(image, partition.start, partition.size, kind)?;
        // the partition is mounted while it is formatted
        fs.superblock_mut().update_last_mounted_at();
        fs.save_superblock()?;
        fs.flush()?;

        let superblock = fs.superblock().clone();
        info!(
            "formatted {} ({}) as {kind:?}: {} inodes, {} blocks",
            partition.name,
            Byte::from_bytes(partition.size as u128).get_appropriate_unit(true),
            superblock.inode_count,
            superblock.block_count
        );
        Ok(superblock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{JOURNAL_SIZE, SUPERBLOCK_SIZE},
        utils::init_test_environment::{formatted_partition, TestEnvironment},
    };

    #[test]
    fn test_format_seeds_root_and_users() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkfs-seed");
        let (context, id) = formatted_partition(&env, FsKind::Ext2)?;
        let fs = context.open_fs(&id)?;
        let sb = fs.superblock();
        assert_eq!(sb.free_inodes + 2, sb.inode_count);
        assert_eq!(sb.free_blocks + 2, sb.block_count);
        assert_eq!(sb.block_count, 3 * sb.inode_count);
        assert_eq!(sb.mount_count, 1);
        assert!(sb.inode_bitmap_start < sb.block_bitmap_start);
        assert!(sb.block_bitmap_start < sb.inode_table_start);
        assert!(sb.inode_table_start < sb.block_table_start);

        assert_eq!(&fs.inode_bitmap()?[..3], &[1, 1, 0]);
        assert_eq!(&fs.block_bitmap()?[..3], &[1, 1, 0]);

        let root = fs.read_inode(ROOT_INODE)?;
        assert!(root.is_dir());
        assert_eq!(root.block(0), Some(0));
        let entries = fs.dir_entries(ROOT_INODE)?;
        assert_eq!(
            entries,
            vec![
                (".".to_string(), ROOT_INODE),
                ("..".to_string(), ROOT_INODE),
                (USERS_FILE_NAME.to_string(), USERS_INODE),
            ]
        );

        let users = fs.read_inode(USERS_INODE)?;
        assert!(users.is_regular_file());
        assert_eq!(users.block(0), Some(1));
        assert_eq!(
            fs.read_file_content(&users)?,
            b"1,G,root\n1,U,root,root,123\n"
        );
        // free inodes have no blocks
        assert_eq!(fs.read_inode(2)?, Inode::default());
        Ok(())
    }

    #[test]
    fn test_ext3_layout() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkfs-ext3");
        let (context, id) = formatted_partition(&env, FsKind::Ext3)?;
        let (_, partition) = context.mounted_partition(&id)?;
        let fs = context.open_fs(&id)?;
        let sb = fs.superblock();
        assert_eq!(sb.fs_kind(), Some(FsKind::Ext3));
        assert_eq!(sb.journal_start, partition.start + SUPERBLOCK_SIZE);
        assert_eq!(
            sb.inode_bitmap_start,
            partition.start + SUPERBLOCK_SIZE + JOURNAL_SIZE
        );
        assert_eq!(sb.free_inodes + 2, sb.inode_count);
        Ok(())
    }

    #[test]
    fn test_reformat_wipes_content() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkfs-reformat");
        let (mut context, id) = formatted_partition(&env, FsKind::Ext2)?;
        {
            let mut fs = context.open_fs(&id)?;
            fs.create_directory(ROOT_INODE, "old", &Owner::ROOT)?;
        }
        let superblock = context.format(&id, "full", FsKind::Ext2)?;
        assert_eq!(superblock.free_inodes + 2, superblock.inode_count);
        let fs = context.open_fs(&id)?;
        assert!(fs.lookup(ROOT_INODE, "old")?.is_none());
        Ok(())
    }

    #[test]
    fn test_format_errors() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkfs-errors");
        let (mut context, id) = formatted_partition(&env, FsKind::Ext2)?;
        assert!(matches!(
            context.format(&id, "FAST", FsKind::Ext2),
            Err(FsError::InvalidParameter(_))
        ));
        assert!(matches!(
            context.format("Z900", "FULL", FsKind::Ext2),
            Err(FsError::MountNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_partition_too_small() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkfs-small");
        let mut context = env.context();
        context.create_disk(8, crate::disk::Fit::First, crate::disk::Unit::Kilobytes)?;
        let request = crate::fdisk::PartitionRequest::Create {
            name: "tiny".into(),
            size: 500,
            unit: crate::disk::Unit::Bytes,
            kind: crate::disk::PartitionType::Primary,
            fit: crate::disk::Fit::First,
        };
        context.partition("A", request, &mut |_: &str| true)?;
        let id = context.mount("A", "tiny")?;
        assert!(matches!(
            context.format(&id, "FULL", FsKind::Ext2),
            Err(FsError::PartitionTooSmall { size: 500, .. })
        ));
        Ok(())
    }
}
