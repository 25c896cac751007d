use std::fmt;

use serde::{Deserialize, Serialize};

/// an enum to describe the type of an inode
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// the inode is not in use
    #[default]
    Free,
    /// a directory
    Directory,
    /// an regular file
    RegularFile,
}

/// the names the disk explorer shows
impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Free => "free",
            FileKind::Directory => "folder",
            FileKind::RegularFile => "file",
        };
        f.write_str(name)
    }
}
