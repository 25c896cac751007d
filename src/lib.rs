//! A simulated disk: MBR partitioned image files holding an ext2/ext3-like filesystem.
//!
//! Every command is a method on [Context], which owns the mount registry and the session.
pub mod cli_interface;
pub mod context;
pub mod disk;
pub mod error;
pub mod fdisk;
pub mod fs;
pub mod inspect;
pub mod mkdisk;
pub mod mkfs;
pub mod mount;
pub mod session;
pub mod users;
pub mod utils;
pub use context::{Config, Context};
pub use error::{FsError, Result};
