//! typed failures of every disk, partition and filesystem operation
use thiserror::Error;

/// Errors returned by the core operations
#[derive(Debug, Error)]
pub enum FsError {
    /// malformed flag or value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("disk {0} does not exist")]
    DiskNotFound(String),
    #[error("partition {0} not found")]
    PartitionNotFound(String),
    #[error("no mounted partition with id {0}")]
    MountNotFound(String),
    #[error("path {0} does not exist")]
    PathNotFound(String),
    #[error("file {0} does not exist")]
    FileNotFound(String),
    #[error("group {0} not found")]
    GroupNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("name {0} is already in use on this disk")]
    DuplicateName(String),

    #[error("partition {0} is already mounted")]
    AlreadyMounted(String),
    #[error("no active session, login first")]
    NoActiveSession,
    #[error("user {0} is already logged in, logout first")]
    SessionConflict(String),

    #[error("insufficient space: {0}")]
    InsufficientSpace(String),
    #[error("partition too small to format: {size} bytes, at least {minimum} bytes needed")]
    PartitionTooSmall { size: u64, minimum: u64 },
    #[error("no free inodes left")]
    NoFreeInodes,
    #[error("no free blocks left")]
    NoFreeBlocks,
    #[error("directory {0} has no free entry left")]
    DirectoryFull(String),
    #[error("file needs {required} blocks, at most {max} are supported")]
    FileTooLarge { required: usize, max: usize },

    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid user or password")]
    InvalidCredentials,
    #[error("{0} is not a directory")]
    NotADirectory(String),
    #[error("{0} is a directory")]
    IsADirectory(String),

    /// on-disk structure failed validation
    #[error("corrupted structure: {0}")]
    Corrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode record: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

pub type Result<T> = std::result::Result<T, FsError>;
