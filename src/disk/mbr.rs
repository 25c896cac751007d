//! master boot record: disk metadata and the four partition slots
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, Result},
    utils::{
        text_field::{decode_fixed, encode_fixed},
        time_util::{self, TimeDurationStruct},
        traits::{DigestInSelf, Record, SerializeAndDigest},
    },
};

use super::DiskImage;

/// bytes reserved at the start of every disk for the MBR
pub const MBR_SIZE: u64 = 512;
pub const PARTITION_SLOTS: usize = 4;
pub const PARTITION_NAME_LEN: usize = 16;
pub const MOUNT_ID_LEN: usize = 8;

/// free space strategy recorded on disks and partitions
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    Best,
    #[default]
    First,
    Worst,
}

impl FromStr for Fit {
    type Err = FsError;

    /// accepts both the disk form (`BF`) and the partition form (`B`)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BF" | "B" => Ok(Fit::Best),
            "FF" | "F" => Ok(Fit::First),
            "WF" | "W" => Ok(Fit::Worst),
            _ => Err(FsError::InvalidParameter(format!(
                "fit must be one of BF, FF, WF, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Fit::Best => "BF",
            Fit::First => "FF",
            Fit::Worst => "WF",
        };
        f.write_str(code)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionType {
    #[default]
    Primary,
    Extended,
}

impl FromStr for PartitionType {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "P" => Ok(PartitionType::Primary),
            "E" => Ok(PartitionType::Extended),
            _ => Err(FsError::InvalidParameter(format!(
                "partition type must be P or E, got '{s}'"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStatus {
    #[default]
    Unused,
    Inactive,
    Mounted,
}

/// fixed-width slot as laid out inside the MBR
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
struct PartitionEntry {
    status: PartitionStatus,
    kind: PartitionType,
    fit: Fit,
    start: u64,
    size: u64,
    name: [u8; PARTITION_NAME_LEN],
    id: [u8; MOUNT_ID_LEN],
}

/// an occupied partition slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub status: PartitionStatus,
    pub kind: PartitionType,
    pub fit: Fit,
    /// byte offset from the start of the disk
    pub start: u64,
    pub size: u64,
    /// always upper case
    pub name: String,
    pub mount_id: Option<String>,
}

impl Partition {
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub fn is_mounted(&self) -> bool {
        self.mount_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PartitionSlot {
    #[default]
    Free,
    Occupied(Partition),
}

impl PartitionSlot {
    pub fn partition(&self) -> Option<&Partition> {
        match self {
            PartitionSlot::Free => None,
            PartitionSlot::Occupied(p) => Some(p),
        }
    }
}

impl PartitionEntry {
    fn to_slot(&self) -> PartitionSlot {
        // a slot is in use exactly when it has a size
        if self.size == 0 {
            return PartitionSlot::Free;
        }
        let id = decode_fixed(&self.id);
        PartitionSlot::Occupied(Partition {
            status: self.status,
            kind: self.kind,
            fit: self.fit,
            start: self.start,
            size: self.size,
            name: decode_fixed(&self.name),
            mount_id: (!id.is_empty()).then_some(id),
        })
    }

    fn from_slot(slot: &PartitionSlot) -> Result<Self> {
        match slot {
            PartitionSlot::Free => Ok(PartitionEntry::default()),
            PartitionSlot::Occupied(p) => Ok(PartitionEntry {
                status: p.status,
                kind: p.kind,
                fit: p.fit,
                start: p.start,
                size: p.size,
                name: encode_fixed(&p.name)?,
                id: encode_fixed(p.mount_id.as_deref().unwrap_or_default())?,
            }),
        }
    }
}

/// the record stored at offset 0
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct MbrRecord {
    size: u64,
    created_at: TimeDurationStruct,
    signature: u32,
    fit: Fit,
    partitions: [PartitionEntry; PARTITION_SLOTS],
    /// to verify the integrity of the partition table
    digest: [u8; 32],
}

impl Record for MbrRecord {}

impl DigestInSelf for MbrRecord {
    fn digest_slot(&mut self) -> &mut [u8; 32] {
        &mut self.digest
    }
}

/// In-memory view of a disk's MBR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mbr {
    /// total disk size in bytes
    pub size: u64,
    pub created_at: TimeDurationStruct,
    pub signature: u32,
    pub fit: Fit,
    pub slots: [PartitionSlot; PARTITION_SLOTS],
}

impl Mbr {
    pub fn new(size: u64, fit: Fit) -> Self {
        Self {
            size,
            created_at: time_util::now(),
            signature: rand::random(),
            fit,
            slots: Default::default(),
        }
    }

    pub fn read_from(image: &DiskImage) -> Result<Self> {
        let len = MBR_SIZE.min(image.len()) as usize;
        let bytes = image.read_bytes(0, len)?;
        let record = MbrRecord::from_verified_bytes(&bytes)?;
        Ok(Self {
            size: record.size,
            created_at: record.created_at,
            signature: record.signature,
            fit: record.fit,
            slots: record.partitions.each_ref().map(PartitionEntry::to_slot),
        })
    }

    pub fn write_to(&self, image: &mut DiskImage) -> Result<()> {
        let mut partitions: [PartitionEntry; PARTITION_SLOTS] = Default::default();
        for (entry, slot) in partitions.iter_mut().zip(self.slots.iter()) {
            *entry = PartitionEntry::from_slot(slot)?;
        }
        let mut record = MbrRecord {
            size: self.size,
            created_at: self.created_at,
            signature: self.signature,
            fit: self.fit,
            partitions,
            digest: [0u8; 32],
        };
        let bytes = record.to_digested_bytes()?;
        image.write_bytes(0, &bytes)?;
        image.flush()
    }
}

/// slot queries
impl Mbr {
    /// occupied slots together with their index
    pub fn partitions(&self) -> impl Iterator<Item = (usize, &Partition)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.partition().map(|p| (i, p)))
    }

    pub fn partition(&self, slot: usize) -> Option<&Partition> {
        self.slots.get(slot).and_then(PartitionSlot::partition)
    }

    pub fn partition_mut(&mut self, slot: usize) -> Option<&mut Partition> {
        match self.slots.get_mut(slot) {
            Some(PartitionSlot::Occupied(p)) => Some(p),
            _ => None,
        }
    }

    /// find a partition by name, ignoring case
    pub fn find(&self, name: &str) -> Option<usize> {
        self.partitions()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
            .map(|(i, _)| i)
    }

    pub fn find_by_mount_id(&self, id: &str) -> Option<usize> {
        self.partitions()
            .find(|(_, p)| p.mount_id.as_deref() == Some(id))
            .map(|(i, _)| i)
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, PartitionSlot::Free))
    }

    pub fn has_extended(&self) -> bool {
        self.partitions()
            .any(|(_, p)| p.kind == PartitionType::Extended)
    }

    /// where the next partition starts: right after the furthest occupied end
    pub fn next_start(&self) -> u64 {
        self.partitions()
            .map(|(_, p)| p.end())
            .fold(MBR_SIZE, u64::max)
    }

    /// how far the partition in `slot` may grow: the closest start of a later
    /// partition, or the end of the disk
    pub fn growth_limit(&self, slot: usize) -> Option<u64> {
        let start = self.partition(slot)?.start;
        Some(
            self.partitions()
                .filter(|(i, p)| *i != slot && p.start > start)
                .map(|(_, p)| p.start)
                .fold(self.size, u64::min),
        )
    }

    pub fn mount_id_count(&self) -> usize {
        self.partitions().filter(|(_, p)| p.is_mounted()).count()
    }
}
