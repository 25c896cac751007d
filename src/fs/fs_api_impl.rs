//! file and directory verbs run on behalf of the logged in user
use std::{collections::BTreeMap, io::ErrorKind, path::Path};

use log::info;

use crate::{
    error::{FsError, Result},
    Context,
};

use super::{inode::Access, path, FileKind, BLOCK_SIZE, DEFAULT_PERMISSIONS, MAX_FILE_BLOCKS};

/// pattern filling a file created with a size and no source
const FILL_PATTERN: &[u8] = b"0123456789";

/// fail with [FsError::FileTooLarge] unless `len` bytes fit in one file
fn check_file_len(len: u64) -> Result<()> {
    if len > MAX_FILE_BLOCKS as u64 * BLOCK_SIZE {
        return Err(FsError::FileTooLarge {
            required: usize::try_from(len.div_ceil(BLOCK_SIZE)).unwrap_or(usize::MAX),
            max: MAX_FILE_BLOCKS,
        });
    }
    Ok(())
}

/// what a new file starts with, never more than a file can hold
fn initial_content(size: u64, source: Option<&Path>) -> Result<Vec<u8>> {
    let not_found = |e: std::io::Error, source: &Path| match e.kind() {
        ErrorKind::NotFound => FsError::FileNotFound(source.display().to_string()),
        _ => FsError::Io(e),
    };
    match source {
        Some(source) => {
            let len = std::fs::metadata(source).map_err(|e| not_found(e, source))?.len();
            check_file_len(len)?;
            std::fs::read(source).map_err(|e| not_found(e, source))
        }
        None => {
            check_file_len(size)?;
            Ok(FILL_PATTERN
            .iter()
            .copied()
            .cycle()
            .take(size as usize)
            .collect())
        }
    }
}

impl Context {
    /// create directory `path`, and its missing parents when `create_parents` is set
    /// # Return
    /// the inode index of the new directory
    pub fn mkdir(&mut self, path: &str, create_parents: bool) -> Result<u32> {
        let (mut fs, owner) = self.session_fs()?;
        let (parents, name) = path::split_parent(path)?;
        let parent = fs.resolve_dir(&parents, create_parents, &owner)?;
        let index = fs.create_directory(parent, &name, &owner)?;
        fs.flush()?;
        info!("mkdir {} as inode {index}", path::normalize(path));
        Ok(index)
    }

    /// create regular file `path`
    ///
    /// the content is copied from `source` when given, else it is `size` bytes
    /// of `"0123456789"` repeated
    /// # Return
    /// the inode index of the new file
    pub fn mkfile(
        &mut self,
        path: &str,
        create_parents: bool,
        size: u64,
        source: Option<&Path>,
    ) -> Result<u32> {
        let (mut fs, owner) = self.session_fs()?;
        let content = initial_content(size, source)?;
        let (parents, name) = path::split_parent(path)?;
        let parent = fs.resolve_dir(&parents, create_parents, &owner)?;
        fs.prepare_entry(parent, &name, &owner)?;

        let (index, mut inode) = fs.allocate_inode(&owner, DEFAULT_PERMISSIONS, FileKind::RegularFile)?;
        if let Err(e) = fs.write_file_content(index, &mut inode, &content) {
            fs.release_file(index, &inode)?;
            return Err(e);
        }
        fs.add_entry(parent, &name, index)?;
        fs.flush()?;
        info!(
            "mkfile {} as inode {index}, {} bytes",
            path::normalize(path),
            content.len()
        );
        Ok(index)
    }

    /// print the files of `files` in ascending key order, each followed by a newline
    ///
    /// the first file that can't be read aborts the whole command
    pub fn cat(&self, files: &BTreeMap<u32, String>) -> Result<String> {
        let (mut fs, owner) = self.session_fs()?;
        let mut output = String::new();
        for file in files.values() {
            let file = path::normalize(file);
            let index = fs.find_inode_from_path(&file).map_err(|e| match e {
                // the file itself is missing, not a directory on the way
                FsError::PathNotFound(missing) if missing == file => FsError::FileNotFound(file.clone()),
                e => e,
            })?;
            let mut inode = fs.check_access(index, Access::Read, &owner, &file)?;
            if inode.is_dir() {
                return Err(FsError::IsADirectory(file));
            }
            output.push_str(&String::from_utf8_lossy(&fs.read_file_content(&inode)?));
            output.push('\n');
            inode.update_accessed_at();
            fs.save_inode(index, &inode)?;
        }
        fs.flush()?;
        Ok(output)
    }
}
