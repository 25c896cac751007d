use std::{path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};

use crate::{
    context::{DEFAULT_DISK_DIR, DEFAULT_ID_SUFFIX},
    disk::{Fit, PartitionType, Unit},
    error::FsError,
    fs::FsKind,
};

/// the process arguments
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about = "a simulated disk with MBR partitions and an ext2/ext3-like filesystem")]
pub struct VdiskCli {
    /// directory holding the disk images
    #[arg(long, env = "DISK_DIR", default_value = DEFAULT_DISK_DIR)]
    pub disk_dir: PathBuf,
    /// appended to every mount id
    #[arg(long, env = "VDISK_ID_SUFFIX", default_value = DEFAULT_ID_SUFFIX)]
    pub id_suffix: String,
    /// run the commands of this file instead of reading stdin
    #[arg(short, long)]
    pub script: Option<PathBuf>,
    /// confirm destructive commands without asking
    #[arg(short, long)]
    pub yes: bool,
}

/// parse a value with its [FromStr] implementation
fn parse_with<T: FromStr<Err = FsError>>(value: &str) -> Result<T, String> {
    value.parse().map_err(|e: FsError| e.to_string())
}

/// one line of a script
#[derive(Parser, Debug, PartialEq)]
#[command(no_binary_name = true, disable_help_flag = true)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// create a new disk image
    Mkdisk {
        #[arg(long)]
        size: u64,
        #[arg(long, default_value = "FF", value_parser = parse_with::<Fit>)]
        fit: Fit,
        #[arg(long, default_value = "M", value_parser = parse_with::<Unit>)]
        unit: Unit,
    },
    /// delete a disk image, after confirmation
    Rmdisk {
        #[arg(long = "driveletter")]
        letter: String,
    },
    /// create, resize or delete a partition
    Fdisk {
        #[arg(long = "driveletter")]
        letter: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        size: Option<u64>,
        #[arg(long, default_value = "K", value_parser = parse_with::<Unit>)]
        unit: Unit,
        #[arg(long = "type", default_value = "P", value_parser = parse_with::<PartitionType>)]
        kind: PartitionType,
        #[arg(long, default_value = "WF", value_parser = parse_with::<Fit>)]
        fit: Fit,
        /// only `full` is accepted
        #[arg(long)]
        delete: Option<String>,
        /// grow, or shrink when negative, by this many units
        #[arg(long, allow_negative_numbers = true)]
        add: Option<i64>,
    },
    Mount {
        #[arg(long = "driveletter")]
        letter: String,
        #[arg(long)]
        name: String,
    },
    Unmount {
        #[arg(long)]
        id: String,
    },
    /// list the mounted partitions
    Mounted,
    /// format a mounted partition
    Mkfs {
        #[arg(long)]
        id: String,
        #[arg(long = "type", default_value = "full")]
        format_type: String,
        #[arg(long = "fs", default_value = "2fs", value_parser = parse_with::<FsKind>)]
        kind: FsKind,
    },
    Login {
        #[arg(long)]
        user: String,
        /// prompted for when missing
        #[arg(long)]
        pass: Option<String>,
        #[arg(long)]
        id: String,
    },
    Logout,
    Mkgrp {
        #[arg(long)]
        name: String,
    },
    Rmgrp {
        #[arg(long)]
        name: String,
    },
    Mkusr {
        #[arg(long)]
        user: String,
        #[arg(long)]
        pass: String,
        #[arg(long = "grp")]
        group: String,
    },
    Rmusr {
        #[arg(long)]
        user: String,
    },
    Mkdir {
        #[arg(long)]
        path: String,
        /// create missing parent directories
        #[arg(short = 'p')]
        parents: bool,
    },
    Mkfile {
        #[arg(long)]
        path: String,
        /// create missing parent directories
        #[arg(short = 'r')]
        parents: bool,
        #[arg(long, allow_negative_numbers = true)]
        size: Option<i64>,
        /// host file to copy the content from
        #[arg(long = "cont")]
        content: Option<PathBuf>,
    },
    /// print files in the given order
    Cat {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// print the MBR of a disk
    Mbr {
        #[arg(long = "driveletter")]
        letter: String,
    },
    /// print the superblock of a mounted partition
    Superblock {
        #[arg(long)]
        id: String,
    },
    /// print the directory tree of a mounted partition
    Tree {
        #[arg(long)]
        id: String,
    },
}
