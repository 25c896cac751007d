//! create and remove disk images
use std::path::PathBuf;

use byte_unit::Byte;
use log::{info, warn};

use crate::{
    disk::{DiskImage, Fit, Mbr, Unit, MBR_SIZE},
    error::{FsError, Result},
    Context,
};

/// result of a disk removal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RmdiskOutcome {
    /// nothing was touched, the caller has to ask again with confirmation
    ConfirmationRequired(String),
    Deleted(PathBuf),
}

impl Context {
    /// create a zero-filled disk image holding an empty MBR
    /// # Params
    /// - `size`: disk size in `unit`s, greater than zero
    /// - `fit`: the free space strategy recorded in the MBR
    /// - `unit`: [Unit::Kilobytes] or [Unit::Megabytes]
    /// # Return
    /// the drive letter of the new disk
    pub fn create_disk(&mut self, size: u64, fit: Fit, unit: Unit) -> Result<String> {
        if size == 0 {
            return Err(FsError::InvalidParameter(
                "disk size must be greater than 0".into(),
            ));
        }
        if unit == Unit::Bytes {
            return Err(FsError::InvalidParameter("disk unit must be K or M".into()));
        }
        let bytes = unit.to_bytes(size)?;
        if bytes <= MBR_SIZE {
            return Err(FsError::InvalidParameter(format!(
                "disk must be larger than its {MBR_SIZE} byte MBR"
            )));
        }
        let (used, letter) = self.next_disk_letter()?;
        let path = self.disk_path(&letter);
        let mut image = DiskImage::create(&path, bytes)?;
        Mbr::new(bytes, fit).write_to(&mut image)?;
        self.letters_used = used;
        info!(
            "created disk {letter} ({}) at {}",
            Byte::from_bytes(bytes as u128).get_appropriate_unit(true),
            path.display()
        );
        Ok(letter)
    }

    /// the next letter whose image file does not exist yet
    /// # Return
    /// how many letters are used once it is taken, and the letter
    fn next_disk_letter(&self) -> Result<(u8, String)> {
        for index in self.letters_used..26 {
            let letter = char::from(b'A' + index).to_string();
            if self.disk_path(&letter).exists() {
                warn!("disk {letter} already exists, skipping its letter");
                continue;
            }
            return Ok((index + 1, letter));
        }
        Err(FsError::InvalidParameter("all 26 drive letters are in use".into()))
    }

    /// remove the image of disk `letter`, in two phases
    ///
    /// without `confirm` only a confirmation prompt is returned and nothing
    /// is changed. Removing a disk drops its mounts and any session on them.
    pub fn delete_disk(&mut self, letter: &str, confirm: bool) -> Result<RmdiskOutcome> {
        let letter = validate_letter(letter)?;
        let path = self.disk_path(&letter);
        if !path.exists() {
            return Err(FsError::DiskNotFound(letter));
        }
        if !confirm {
            return Ok(RmdiskOutcome::ConfirmationRequired(format!(
                "CONFIRM_RMDISK: delete disk {letter} at {}?",
                path.display()
            )));
        }
        std::fs::remove_file(&path)?;
        for dropped in self.mounts.remove_disk(&letter) {
            self.end_session_on(&dropped.id);
        }
        info!("deleted disk {letter}");
        Ok(RmdiskOutcome::Deleted(path))
    }
}

pub(crate) fn validate_letter(letter: &str) -> Result<String> {
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase().to_string()),
        _ => Err(FsError::InvalidParameter(format!(
            "'{letter}' is not a drive letter"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::init_test_environment::TestEnvironment;

    #[test]
    fn test_create_disk() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkdisk-create");
        let mut context = env.context();
        let letter = context.create_disk(10, Fit::Best, Unit::Kilobytes)?;
        assert_eq!(letter, "A");
        let image = DiskImage::open(context.disk_path("A"))?;
        assert_eq!(image.len(), 10 * 1024);
        let mbr = Mbr::read_from(&image)?;
        assert_eq!(mbr.size, 10 * 1024);
        assert_eq!(mbr.fit, Fit::Best);
        assert_eq!(mbr.partitions().count(), 0);

        assert_eq!(context.create_disk(1, Fit::First, Unit::Megabytes)?, "B");
        Ok(())
    }

    #[test]
    fn test_create_disk_rejects_bad_parameters() {
        let env = TestEnvironment::new("mkdisk-invalid");
        let mut context = env.context();
        assert!(matches!(
            context.create_disk(0, Fit::First, Unit::Kilobytes),
            Err(FsError::InvalidParameter(_))
        ));
        assert!(matches!(
            context.create_disk(4096, Fit::First, Unit::Bytes),
            Err(FsError::InvalidParameter(_))
        ));
        assert!(!context.disk_path("A").exists());
    }

    #[test]
    fn test_existing_images_are_not_clobbered() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkdisk-skip");
        let mut first = env.context();
        first.create_disk(4, Fit::First, Unit::Kilobytes)?;
        // a new process starts counting from A again
        let mut second = env.context();
        assert_eq!(second.create_disk(4, Fit::First, Unit::Kilobytes)?, "B");
        Ok(())
    }

    #[test]
    fn test_failed_create_keeps_letter() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkdisk-failed-create");
        // a plain file where the disk directory should be
        let disk_dir = env.dir().join("disks");
        std::fs::write(&disk_dir, b"not a directory")?;
        let mut context = Context::new(crate::context::Config {
            disk_dir: disk_dir.clone(),
            id_suffix: "00".into(),
        });
        assert!(context.create_disk(4, Fit::First, Unit::Kilobytes).is_err());
        std::fs::remove_file(&disk_dir)?;
        assert_eq!(context.create_disk(4, Fit::First, Unit::Kilobytes)?, "A");
        Ok(())
    }

    #[test]
    fn test_two_phase_delete() -> anyhow::Result<()> {
        let env = TestEnvironment::new("mkdisk-delete");
        let mut context = env.context();
        context.create_disk(4, Fit::First, Unit::Kilobytes)?;
        let path = context.disk_path("A");

        let outcome = context.delete_disk("a", false)?;
        assert!(matches!(
            outcome,
            RmdiskOutcome::ConfirmationRequired(ref prompt) if prompt.starts_with("CONFIRM_RMDISK")
        ));
        assert!(path.exists());

        assert_eq!(context.delete_disk("A", true)?, RmdiskOutcome::Deleted(path.clone()));
        assert!(!path.exists());
        assert!(matches!(
            context.delete_disk("A", true),
            Err(FsError::DiskNotFound(_))
        ));
        assert!(matches!(
            context.mount("A", "PART1"),
            Err(FsError::DiskNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_validate_letter() {
        assert_eq!(validate_letter("c").ok(), Some("C".to_string()));
        assert!(validate_letter("AB").is_err());
        assert!(validate_letter("1").is_err());
        assert!(validate_letter("").is_err());
    }
}
