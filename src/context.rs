//! process state shared by every command
use std::path::PathBuf;

use crate::{
    disk::{DiskImage, Mbr, Partition},
    error::{FsError, Result},
    fs::{Ext2Fs, Owner},
    mount::{MountRegistry, MountedPartition},
    session::Session,
};

pub const DEFAULT_DISK_DIR: &str = "./disks";
pub const DEFAULT_ID_SUFFIX: &str = "00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// directory holding the `<LETTER>.dsk` image files
    pub disk_dir: PathBuf,
    /// appended to every mount id after the ordinal
    pub id_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disk_dir: PathBuf::from(DEFAULT_DISK_DIR),
            id_suffix: DEFAULT_ID_SUFFIX.to_string(),
        }
    }
}

/// Everything that lives for the duration of the process: the configuration,
/// the mount registry and the active session.
///
/// Every verb is a method on `Context`, nothing is kept in globals.
#[derive(Debug, Default)]
pub struct Context {
    config: Config,
    pub(crate) mounts: MountRegistry,
    pub(crate) session: Option<Session>,
    /// how many drive letters have been handed out
    pub(crate) letters_used: u8,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mounts(&self) -> &MountRegistry {
        &self.mounts
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// image file of disk `letter`
    pub fn disk_path(&self, letter: &str) -> PathBuf {
        self.config
            .disk_dir
            .join(format!("{}.dsk", letter.to_ascii_uppercase()))
    }

    /// look up a mount id, ignoring case
    pub(crate) fn mounted(&self, id: &str) -> Result<&MountedPartition> {
        self.mounts
            .get(id)
            .ok_or_else(|| FsError::MountNotFound(id.to_ascii_uppercase()))
    }

    /// the current MBR entry of a mounted partition, together with its disk image
    pub(crate) fn mounted_partition(&self, id: &str) -> Result<(DiskImage, Partition)> {
        let mounted = self.mounted(id)?;
        let image = DiskImage::open(&mounted.path)?;
        let mbr = Mbr::read_from(&image)?;
        let partition = mbr
            .find_by_mount_id(&mounted.id)
            .and_then(|slot| mbr.partition(slot))
            .cloned()
            .ok_or_else(|| FsError::MountNotFound(mounted.id.clone()))?;
        Ok((image, partition))
    }

    /// open the filesystem of a mounted partition
    pub(crate) fn open_fs(&self, id: &str) -> Result<Ext2Fs> {
        let mounted = self.mounted(id)?;
        Ext2Fs::open(DiskImage::open(&mounted.path)?, mounted.start)
    }

    pub(crate) fn active_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(FsError::NoActiveSession)
    }

    /// the filesystem the session works on, and who the session acts as
    pub(crate) fn session_fs(&self) -> Result<(Ext2Fs, Owner)> {
        let session = self.active_session()?;
        Ok((self.open_fs(&session.mount_id)?, session.owner()))
    }

    /// end the session if it is bound to mount `id`
    pub(crate) fn end_session_on(&mut self, id: &str) {
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.mount_id.eq_ignore_ascii_case(id))
        {
            self.session = None;
        }
    }
}
