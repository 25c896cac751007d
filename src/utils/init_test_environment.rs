use std::path::{Path, PathBuf};

use crate::{
    context::{Config, DEFAULT_ID_SUFFIX},
    disk::{Fit, PartitionType, Unit},
    fdisk::PartitionRequest,
    fs::FsKind,
    Context,
};

pub const TEST_PARTITION_NAME: &str = "PART1";

/// A scratch directory for the disk images of one test, removed on drop.
///
/// Every test passes its own `name`, so tests running in parallel never share images.
pub struct TestEnvironment {
    dir: PathBuf,
}

impl TestEnvironment {
    pub fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("vdisk-test-{}-{name}", std::process::id()));
        if dir.exists() {
            std::fs::remove_dir_all(&dir).expect("Failed to clean test directory");
        }
        std::fs::create_dir_all(&dir).expect("Failed to create test directory");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// a context keeping its disks in this environment
    pub fn context(&self) -> Context {
        Context::new(Config {
            disk_dir: self.dir.clone(),
            id_suffix: DEFAULT_ID_SUFFIX.to_string(),
        })
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// disk `A` of 1 MiB with a mounted and formatted 128 KiB partition
/// # Return
/// the context and the mount id of the partition
pub fn formatted_partition(env: &TestEnvironment, kind: FsKind) -> anyhow::Result<(Context, String)> {
    let mut context = env.context();
    context.create_disk(1, Fit::First, Unit::Megabytes)?;
    let request = PartitionRequest::Create {
        name: TEST_PARTITION_NAME.to_string(),
        size: 128,
        unit: Unit::Kilobytes,
        kind: PartitionType::Primary,
        fit: Fit::First,
    };
    context.partition("A", request, &mut |_: &str| true)?;
    let id = context.mount("A", TEST_PARTITION_NAME)?;
    context.format(&id, "FULL", kind)?;
    Ok((context, id))
}

/// [formatted_partition] with root logged in
pub fn login_root(env: &TestEnvironment) -> anyhow::Result<(Context, String)> {
    let (mut context, id) = formatted_partition(env, FsKind::Ext2)?;
    context.login("root", "123", &id)?;
    Ok((context, id))
}
