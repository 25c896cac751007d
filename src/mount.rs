//! mount partitions into the in-process registry
use std::{collections::BTreeMap, path::PathBuf};

use log::{debug, info, warn};

use crate::{
    disk::{DiskImage, Mbr, PartitionStatus},
    error::{FsError, Result},
    fs::Ext2Fs,
    mkdisk::validate_letter,
    Context,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedPartition {
    /// `<letter><ordinal><suffix>`, upper case
    pub id: String,
    pub name: String,
    pub disk: String,
    /// the disk image holding the partition
    pub path: PathBuf,
    pub start: u64,
    pub logged_in: bool,
}

/// mounted partitions grouped by drive letter, in mount order
#[derive(Debug, Default)]
pub struct MountRegistry {
    disks: BTreeMap<String, Vec<MountedPartition>>,
}

impl MountRegistry {
    pub fn get(&self, id: &str) -> Option<&MountedPartition> {
        self.iter().find(|m| m.id.eq_ignore_ascii_case(id))
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut MountedPartition> {
        self.disks
            .values_mut()
            .flatten()
            .find(|m| m.id.eq_ignore_ascii_case(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountedPartition> {
        self.disks.values().flatten()
    }

    /// partitions of disk `letter`
    pub fn on_disk(&self, letter: &str) -> &[MountedPartition] {
        self.disks
            .get(&letter.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.values().all(Vec::is_empty)
    }

    fn insert(&mut self, mounted: MountedPartition) {
        self.disks
            .entry(mounted.disk.clone())
            .or_default()
            .push(mounted);
    }

    fn remove_where(&mut self, keep: impl Fn(&MountedPartition) -> bool) -> Vec<MountedPartition> {
        let mut removed = Vec::new();
        for list in self.disks.values_mut() {
            let (kept, dropped): (Vec<_>, Vec<_>) = list.drain(..).partition(|m| keep(m));
            *list = kept;
            removed.extend(dropped);
        }
        self.disks.retain(|_, list| !list.is_empty());
        removed
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<MountedPartition> {
        self.remove_where(|m| !m.id.eq_ignore_ascii_case(id)).pop()
    }

    pub(crate) fn remove_disk(&mut self, letter: &str) -> Vec<MountedPartition> {
        self.remove_where(|m| !m.disk.eq_ignore_ascii_case(letter))
    }

    pub(crate) fn remove_partition(&mut self, letter: &str, name: &str) -> Option<MountedPartition> {
        self.remove_where(|m| {
            !(m.disk.eq_ignore_ascii_case(letter) && m.name.eq_ignore_ascii_case(name))
        })
        .pop()
    }
}

impl Context {
    /// mount partition `name` of disk `letter`
    /// # Return
    /// the mount id, which is also written into the partition's MBR slot
    pub fn mount(&mut self, letter: &str, name: &str) -> Result<String> {
        let letter = validate_letter(letter)?;
        let name = name.to_ascii_uppercase();
        let path = self.disk_path(&letter);
        let mut image = DiskImage::open(&path)?;
        let mut mbr = Mbr::read_from(&image)?;
        let slot = mbr
            .find(&name)
            .ok_or_else(|| FsError::PartitionNotFound(name.clone()))?;
        let on_disk_id = mbr.partition(slot).and_then(|p| p.mount_id.clone());

        let id = match on_disk_id {
            Some(id) if self.mounts.get(&id).is_some() => {
                return Err(FsError::AlreadyMounted(name));
            }
            // left behind by a process that never unmounted
            Some(id) => {
                warn!("re-adopting stale mount id {id} of partition {name}");
                id
            }
            None => self.synthesize_mount_id(&letter, &mbr),
        };

        let start = match mbr.partition_mut(slot) {
            Some(partition) => {
                partition.status = PartitionStatus::Mounted;
                partition.mount_id = Some(id.clone());
                partition.start
            }
            None => return Err(FsError::PartitionNotFound(name)),
        };
        mbr.write_to(&mut image)?;

        self.mounts.insert(MountedPartition {
            id: id.clone(),
            name: name.clone(),
            disk: letter,
            path,
            start,
            logged_in: false,
        });

        // a formatted partition records the mount in its superblock
        match Ext2Fs::open(image, start) {
            Ok(mut fs) => {
                fs.superblock_mut().update_last_mounted_at();
                fs.save_superblock()?;
                fs.flush()?;
            }
            Err(e) => debug!("partition {name} has no filesystem yet: {e}"),
        }
        info!("mounted partition {name} as {id}");
        Ok(id)
    }

    /// ordinal is one more than the ids already on the disk, bumped until unique
    fn synthesize_mount_id(&self, letter: &str, mbr: &Mbr) -> String {
        let suffix = &self.config().id_suffix;
        let mut ordinal = mbr.mount_id_count() + 1;
        loop {
            let id = format!("{letter}{ordinal}{suffix}").to_ascii_uppercase();
            if mbr.find_by_mount_id(&id).is_none() && self.mounts.get(&id).is_none() {
                return id;
            }
            ordinal += 1;
        }
    }

    /// unmount `id`, clearing it from the MBR and ending a session bound to it
    pub fn unmount(&mut self, id: &str) -> Result<()> {
        let mounted = self.mounted(id)?.clone();
        match DiskImage::open(&mounted.path) {
            Ok(mut image) => {
                let mut mbr = Mbr::read_from(&image)?;
                if let Some(partition) = mbr
                    .find_by_mount_id(&mounted.id)
                    .and_then(|slot| mbr.partition_mut(slot))
                {
                    partition.status = PartitionStatus::Inactive;
                    partition.mount_id = None;
                }
                mbr.write_to(&mut image)?;
            }
            Err(FsError::DiskNotFound(path)) => warn!("disk {path} is gone, dropping {}", mounted.id),
            Err(e) => return Err(e),
        }
        self.mounts.remove(&mounted.id);
        self.end_session_on(&mounted.id);
        info!("unmounted {}", mounted.id);
        Ok(())
    }

    /// every mounted partition, grouped by disk
    pub fn list_mounted(&self) -> Vec<MountedPartition> {
        self.mounts.iter().cloned().collect()
    }
}
