use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, Result},
    utils::{
        self,
        time_util::TimeDurationStruct,
        traits::Record,
    },
};

use super::{filekind::FileKind, BLOCK_POINTERS, UNALLOCATED};

/// what a caller wants to do with an inode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub user_id: i32,
    pub group_id: i32,
    /// content size in bytes
    pub size: u32,
    pub accessed_at: TimeDurationStruct,
    pub changed_at: TimeDurationStruct,
    pub modified_at: TimeDurationStruct,
    /// 12 direct pointers, one single indirect pointer and two unused ones
    pub blocks: [i32; BLOCK_POINTERS],
    pub file_kind: FileKind,
    /// octal digits for owner, group and others
    pub permissions: [u8; 3],
}

impl Default for Inode {
    fn default() -> Self {
        Self {
            user_id: 0,
            group_id: 0,
            size: 0,
            accessed_at: TimeDurationStruct::default(),
            changed_at: TimeDurationStruct::default(),
            modified_at: TimeDurationStruct::default(),
            blocks: [UNALLOCATED; BLOCK_POINTERS],
            file_kind: FileKind::Free,
            permissions: [b'0'; 3],
        }
    }
}

// This block is about serialization and deserialization
impl Record for Inode {}

impl Inode {
    pub fn new(file_kind: FileKind, user_id: i32, group_id: i32, permissions: &str) -> Result<Self> {
        let now = utils::time_util::now();
        Ok(Inode {
            user_id,
            group_id,
            file_kind,
            permissions: parse_permissions(permissions)?,
            accessed_at: now,
            changed_at: now,
            modified_at: now,
            ..Inode::default()
        })
    }
}

/// validate a three digit octal permission string like `664`
pub fn parse_permissions(permissions: &str) -> Result<[u8; 3]> {
    let bytes = permissions.as_bytes();
    match bytes {
        [a, b, c] if bytes.iter().all(|d| (b'0'..=b'7').contains(d)) => Ok([*a, *b, *c]),
        _ => Err(FsError::InvalidParameter(format!(
            "permissions must be three octal digits, got '{permissions}'"
        ))),
    }
}

/// This block is about file metadata operations
impl Inode {
    pub fn is_regular_file(&self) -> bool {
        self.file_kind == FileKind::RegularFile
    }

    pub fn is_dir(&self) -> bool {
        self.file_kind == FileKind::Directory
    }

    pub fn permissions(&self) -> String {
        String::from_utf8_lossy(&self.permissions).into_owned()
    }

    /// only the owner digit is consulted, root always passes
    pub fn allows(&self, access: Access, is_root: bool) -> bool {
        if is_root {
            return true;
        }
        let owner = self.permissions[0].wrapping_sub(b'0');
        match access {
            Access::Read => owner >= 4,
            Access::Write => owner % 4 >= 2,
        }
    }

    pub fn update_modified_at(&mut self) {
        let now = utils::time_util::now();
        self.changed_at = now;
        self.modified_at = now;
    }

    pub fn update_accessed_at(&mut self) {
        self.accessed_at = utils::time_util::now();
    }
}

/// This block is about block pointers
impl Inode {
    /// the block stored in pointer `slot`, if allocated
    pub fn block(&self, slot: usize) -> Option<u32> {
        self.blocks
            .get(slot)
            .and_then(|pointer| u32::try_from(*pointer).ok())
    }

    pub fn set_block(&mut self, slot: usize, block: Option<u32>) {
        if let Some(pointer) = self.blocks.get_mut(slot) {
            *pointer = block.map_or(UNALLOCATED, |b| b as i32);
        }
    }

    /// allocated direct blocks in pointer order
    pub fn direct_blocks(&self) -> Vec<u32> {
        (0..super::DIRECT_POINTERS)
            .filter_map(|slot| self.block(slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{INDIRECT_POINTER, INODE_SIZE};

    #[test]
    fn test_inode_fits_slot() -> anyhow::Result<()> {
        let inode = Inode::new(FileKind::RegularFile, 1, 1, "664")?;
        assert!(inode.encoded_len()? as u64 <= INODE_SIZE);
        Ok(())
    }

    #[test]
    fn test_new_inode_has_no_blocks() -> anyhow::Result<()> {
        let inode = Inode::new(FileKind::Directory, 2, 3, "755")?;
        assert!(inode.is_dir());
        assert_eq!(inode.blocks, [UNALLOCATED; BLOCK_POINTERS]);
        assert!(inode.direct_blocks().is_empty());
        assert_eq!(inode.permissions(), "755");
        Ok(())
    }

    #[test]
    fn test_block_pointers() -> anyhow::Result<()> {
        let mut inode = Inode::new(FileKind::RegularFile, 1, 1, "664")?;
        inode.set_block(0, Some(7));
        inode.set_block(INDIRECT_POINTER, Some(9));
        assert_eq!(inode.block(0), Some(7));
        assert_eq!(inode.block(1), None);
        assert_eq!(inode.direct_blocks(), vec![7]);
        inode.set_block(0, None);
        assert_eq!(inode.blocks[0], UNALLOCATED);
        assert_eq!(inode.block(INDIRECT_POINTER), Some(9));
        Ok(())
    }

    #[test]
    fn test_permission_checks() -> anyhow::Result<()> {
        let cases = [
            ("664", true, true),
            ("464", true, false),
            ("264", false, true),
            ("764", true, true),
            ("164", false, false),
            ("064", false, false),
        ];
        for (perm, read, write) in cases {
            let inode = Inode::new(FileKind::RegularFile, 2, 2, perm)?;
            assert_eq!(inode.allows(Access::Read, false), read, "{perm}");
            assert_eq!(inode.allows(Access::Write, false), write, "{perm}");
            assert!(inode.allows(Access::Read, true));
            assert!(inode.allows(Access::Write, true));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_permissions() {
        assert!(parse_permissions("64").is_err());
        assert!(parse_permissions("684").is_err());
        assert!(parse_permissions("6644").is_err());
    }
}
