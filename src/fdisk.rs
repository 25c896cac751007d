//! create, resize and delete partitions of a disk
use byte_unit::Byte;
use log::info;

use crate::{
    disk::{
        DiskImage, Fit, Mbr, Partition, PartitionSlot, PartitionStatus, PartitionType, Unit,
        PARTITION_NAME_LEN,
    },
    error::{FsError, Result},
    mkdisk::validate_letter,
    Context,
};

/// one of the partition sub-operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionRequest {
    Create {
        name: String,
        size: u64,
        unit: Unit,
        kind: PartitionType,
        fit: Fit,
    },
    /// grow by a positive `add`, shrink by a negative one
    Resize { name: String, add: i64, unit: Unit },
    Delete { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FdiskOutcome {
    Created(Partition),
    Resized(Partition),
    Deleted(String),
    /// deletion was not confirmed, nothing changed
    Cancelled,
}

/// asks the user before something destructive happens
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

impl Context {
    /// apply a partition `request` to disk `letter` and persist the MBR
    pub fn partition(
        &mut self,
        letter: &str,
        request: PartitionRequest,
        confirm: &mut impl Confirm,
    ) -> Result<FdiskOutcome> {
        let letter = validate_letter(letter)?;
        let mut image = DiskImage::open(self.disk_path(&letter))?;
        let mut mbr = Mbr::read_from(&image)?;
        let outcome = match request {
            PartitionRequest::Resize { name, add, unit } => resize(&mut mbr, &name, add, unit)?,
            PartitionRequest::Delete { name } => {
                let slot = mbr
                    .find(&name)
                    .ok_or_else(|| FsError::PartitionNotFound(name.to_ascii_uppercase()))?;
                let name = name.to_ascii_uppercase();
                if !confirm.confirm(&format!("delete partition {name} of disk {letter}?")) {
                    info!("deletion of partition {name} cancelled");
                    return Ok(FdiskOutcome::Cancelled);
                }
                mbr.slots[slot] = PartitionSlot::Free;
                if let Some(dropped) = self.mounts.remove_partition(&letter, &name) {
                    self.end_session_on(&dropped.id);
                }
                FdiskOutcome::Deleted(name)
            }
            PartitionRequest::Create {
                name,
                size,
                unit,
                kind,
                fit,
            } => create(&mut mbr, &name, size, unit, kind, fit)?,
        };
        mbr.write_to(&mut image)?;
        info!("disk {letter}: {outcome:?}");
        Ok(outcome)
    }
}

fn create(
    mbr: &mut Mbr,
    name: &str,
    size: u64,
    unit: Unit,
    kind: PartitionType,
    fit: Fit,
) -> Result<FdiskOutcome> {
    let name = validate_name(name)?;
    if size == 0 {
        return Err(FsError::InvalidParameter(
            "partition size must be greater than 0".into(),
        ));
    }
    if mbr.find(&name).is_some() {
        return Err(FsError::DuplicateName(name));
    }
    if kind == PartitionType::Extended && mbr.has_extended() {
        return Err(FsError::AlreadyExists("an extended partition".into()));
    }
    let slot = mbr.free_slot().ok_or_else(|| {
        FsError::InsufficientSpace("all four partition slots are in use".into())
    })?;
    let size = unit.to_bytes(size)?;
    let start = mbr.next_start();
    if start.checked_add(size).filter(|end| *end <= mbr.size).is_none() {
        return Err(FsError::InsufficientSpace(format!(
            "{} requested, {} left at the end of the disk",
            Byte::from_bytes(size as u128).get_appropriate_unit(true),
            Byte::from_bytes(mbr.size.saturating_sub(start) as u128).get_appropriate_unit(true)
        )));
    }
    let partition = Partition {
        status: PartitionStatus::Inactive,
        kind,
        fit,
        start,
        size,
        name,
        mount_id: None,
    };
    mbr.slots[slot] = PartitionSlot::Occupied(partition.clone());
    Ok(FdiskOutcome::Created(partition))
}

fn resize(mbr: &mut Mbr, name: &str, add: i64, unit: Unit) -> Result<FdiskOutcome> {
    let slot = mbr
        .find(name)
        .ok_or_else(|| FsError::PartitionNotFound(name.to_ascii_uppercase()))?;
    let delta = unit.to_bytes(add.unsigned_abs())?;
    let limit = mbr.growth_limit(slot);
    let partition = mbr
        .partition_mut(slot)
        .ok_or_else(|| FsError::PartitionNotFound(name.to_ascii_uppercase()))?;
    if add < 0 {
        if delta >= partition.size {
            return Err(FsError::InvalidParameter(format!(
                "shrinking {} by {delta} bytes leaves nothing",
                partition.name
            )));
        }
        partition.size -= delta;
    } else {
        let limit = limit.unwrap_or(partition.end());
        if partition.end().checked_add(delta).filter(|end| *end <= limit).is_none() {
            return Err(FsError::InsufficientSpace(format!(
                "only {} bytes follow partition {}",
                limit.saturating_sub(partition.end()),
                partition.name
            )));
        }
        partition.size += delta;
    }
    Ok(FdiskOutcome::Resized(partition.clone()))
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim().to_ascii_uppercase();
    if name.is_empty() || name.len() > PARTITION_NAME_LEN {
        return Err(FsError::InvalidParameter(format!(
            "partition name must have 1 to {PARTITION_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{disk::MBR_SIZE, utils::init_test_environment::TestEnvironment};

    fn create_request(name: &str, size: u64) -> PartitionRequest {
        PartitionRequest::Create {
            name: name.to_string(),
            size,
            unit: Unit::Kilobytes,
            kind: PartitionType::Primary,
            fit: Fit::Worst,
        }
    }

    fn yes(_: &str) -> bool {
        true
    }

    fn read_mbr(context: &Context) -> anyhow::Result<Mbr> {
        Ok(Mbr::read_from(&DiskImage::open(context.disk_path("A"))?)?)
    }

    fn disk(name: &str) -> anyhow::Result<(TestEnvironment, Context)> {
        let env = TestEnvironment::new(name);
        let mut context = env.context();
        context.create_disk(64, Fit::First, Unit::Kilobytes)?;
        Ok((env, context))
    }

    #[test]
    fn test_partitions_append_without_overlap() -> anyhow::Result<()> {
        let (_env, mut context) = disk("fdisk-append")?;
        context.partition("A", create_request("one", 10), &mut yes)?;
        context.partition("A", create_request("two", 5), &mut yes)?;
        context.partition("A", create_request("three", 1), &mut yes)?;

        let mbr = read_mbr(&context)?;
        let partitions: Vec<_> = mbr.partitions().map(|(_, p)| p.clone()).collect();
        assert_eq!(partitions[0].start, MBR_SIZE);
        assert_eq!(partitions[0].name, "ONE");
        for pair in partitions.windows(2) {
            assert_eq!(pair[1].start, pair[0].end());
        }
        Ok(())
    }

    #[test]
    fn test_create_rejections() -> anyhow::Result<()> {
        let (_env, mut context) = disk("fdisk-reject")?;
        context.partition("A", create_request("one", 10), &mut yes)?;
        assert!(matches!(
            context.partition("A", create_request("ONE", 1), &mut yes),
            Err(FsError::DuplicateName(_))
        ));
        assert!(matches!(
            context.partition("A", create_request("big", 64), &mut yes),
            Err(FsError::InsufficientSpace(_))
        ));
        let extended = |name: &str| PartitionRequest::Create {
            name: name.to_string(),
            size: 1,
            unit: Unit::Kilobytes,
            kind: PartitionType::Extended,
            fit: Fit::First,
        };
        context.partition("A", extended("ext1"), &mut yes)?;
        assert!(matches!(
            context.partition("A", extended("ext2"), &mut yes),
            Err(FsError::AlreadyExists(_))
        ));
        context.partition("A", create_request("three", 1), &mut yes)?;
        context.partition("A", create_request("four", 1), &mut yes)?;
        assert!(matches!(
            context.partition("A", create_request("five", 1), &mut yes),
            Err(FsError::InsufficientSpace(_))
        ));
        assert!(matches!(
            context.partition("B", create_request("x", 1), &mut yes),
            Err(FsError::DiskNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_sizes_past_the_address_space() -> anyhow::Result<()> {
        let (_env, mut context) = disk("fdisk-overflow")?;
        let huge = PartitionRequest::Create {
            name: "huge".into(),
            size: u64::MAX,
            unit: Unit::Bytes,
            kind: PartitionType::Primary,
            fit: Fit::First,
        };
        assert!(matches!(
            context.partition("A", huge, &mut yes),
            Err(FsError::InsufficientSpace(_))
        ));
        assert_eq!(read_mbr(&context)?.partitions().count(), 0);

        context.partition("A", create_request("one", 10), &mut yes)?;
        let grow = PartitionRequest::Resize {
            name: "one".into(),
            add: i64::MAX,
            unit: Unit::Bytes,
        };
        assert!(matches!(
            context.partition("A", grow, &mut yes),
            Err(FsError::InsufficientSpace(_))
        ));
        let mbr = read_mbr(&context)?;
        assert_eq!(mbr.partition(0).map(|p| p.size), Some(10 * 1024));
        Ok(())
    }

    #[test]
    fn test_resize() -> anyhow::Result<()> {
        let (_env, mut context) = disk("fdisk-resize")?;
        context.partition("A", create_request("one", 10), &mut yes)?;
        context.partition("A", create_request("two", 10), &mut yes)?;
        let shrink = PartitionRequest::Resize {
            name: "one".into(),
            add: -2,
            unit: Unit::Kilobytes,
        };
        let outcome = context.partition("A", shrink, &mut yes)?;
        assert!(matches!(outcome, FdiskOutcome::Resized(ref p) if p.size == 8 * 1024));

        // the freed 2K can be taken back, not more
        let grow = |add| PartitionRequest::Resize {
            name: "ONE".into(),
            add,
            unit: Unit::Kilobytes,
        };
        assert!(matches!(
            context.partition("A", grow(3), &mut yes),
            Err(FsError::InsufficientSpace(_))
        ));
        context.partition("A", grow(2), &mut yes)?;
        // the last partition grows up to the disk end
        let to_end = PartitionRequest::Resize {
            name: "two".into(),
            add: 64 * 1024 - (MBR_SIZE as i64 + 20 * 1024),
            unit: Unit::Bytes,
        };
        context.partition("A", to_end, &mut yes)?;
        let mbr = read_mbr(&context)?;
        assert_eq!(mbr.partitions().last().map(|(_, p)| p.end()), Some(64 * 1024));

        let too_small = PartitionRequest::Resize {
            name: "one".into(),
            add: -10,
            unit: Unit::Kilobytes,
        };
        assert!(matches!(
            context.partition("A", too_small, &mut yes),
            Err(FsError::InvalidParameter(_))
        ));
        let missing = PartitionRequest::Resize {
            name: "none".into(),
            add: 1,
            unit: Unit::Kilobytes,
        };
        assert!(matches!(
            context.partition("A", missing, &mut yes),
            Err(FsError::PartitionNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_delete_needs_confirmation() -> anyhow::Result<()> {
        let (_env, mut context) = disk("fdisk-delete")?;
        context.partition("A", create_request("one", 10), &mut yes)?;
        let delete = || PartitionRequest::Delete { name: "one".into() };

        let mut asked = Vec::new();
        let mut refuse = |prompt: &str| {
            asked.push(prompt.to_string());
            false
        };
        assert_eq!(
            context.partition("A", delete(), &mut refuse)?,
            FdiskOutcome::Cancelled
        );
        assert_eq!(asked.len(), 1);
        assert_eq!(read_mbr(&context)?.partitions().count(), 1);

        assert_eq!(
            context.partition("A", delete(), &mut yes)?,
            FdiskOutcome::Deleted("ONE".into())
        );
        let mbr = read_mbr(&context)?;
        assert_eq!(mbr.slots[0], PartitionSlot::Free);
        assert!(matches!(
            context.partition("A", delete(), &mut yes),
            Err(FsError::PartitionNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_deleting_mounted_partition_unmounts_it() -> anyhow::Result<()> {
        let (_env, mut context) = disk("fdisk-delete-mounted")?;
        context.partition("A", create_request("one", 10), &mut yes)?;
        let id = context.mount("A", "one")?;
        context.partition("A", PartitionRequest::Delete { name: "one".into() }, &mut yes)?;
        assert!(context.mounts().get(&id).is_none());
        Ok(())
    }
}
