//! turn script lines into calls on a [Context]
use std::{collections::BTreeMap, fmt::Write};

use anyhow::{anyhow, bail};
use byte_unit::Byte;
use clap::Parser;

use crate::{
    disk::{Mbr, PartitionSlot},
    error::FsError,
    fdisk::{Confirm, FdiskOutcome, PartitionRequest},
    fs::TreeNode,
    mkdisk::RmdiskOutcome,
    Context,
};

use super::{Command, CommandLine};

/// split `line` at whitespace, keeping double quoted runs together
pub fn split_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        tokens.push(current);
    }
    tokens
}

/// lower case the verb and flag names, and accept `-name=value` for `--name=value`
///
/// values keep their case, negative numbers and one letter flags are left alone
pub fn normalize_tokens(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .enumerate()
        .map(|(position, token)| {
            if position == 0 {
                return token.to_ascii_lowercase();
            }
            let Some(flag) = token.strip_prefix('-') else {
                return token;
            };
            if flag.starts_with(|c: char| c.is_ascii_digit()) {
                return token;
            }
            let flag = flag.trim_start_matches('-');
            let (name, value) = match flag.split_once('=') {
                Some((name, value)) => (name.to_ascii_lowercase(), Some(value)),
                None => (flag.to_ascii_lowercase(), None),
            };
            let dashes = if name.len() == 1 { "-" } else { "--" };
            match value {
                Some(value) => format!("{dashes}{name}={value}"),
                None => format!("{dashes}{name}"),
            }
        })
        .collect()
}

/// run one script line
/// # Return
/// `None` for blank lines and `#` comments, else what the command printed
pub fn run_line(
    context: &mut Context,
    line: &str,
    confirm: &mut impl Confirm,
) -> anyhow::Result<Option<String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let tokens = normalize_tokens(split_line(line));
    let command = CommandLine::try_parse_from(tokens)?.command;
    run_command(context, command, confirm).map(Some)
}

pub fn run_command(
    context: &mut Context,
    command: Command,
    confirm: &mut impl Confirm,
) -> anyhow::Result<String> {
    let output = match command {
        Command::Mkdisk { size, fit, unit } => {
            let letter = context.create_disk(size, fit, unit)?;
            format!("disk {letter} created")
        }
        Command::Rmdisk { letter } => match context.delete_disk(&letter, false)? {
            RmdiskOutcome::ConfirmationRequired(prompt) if confirm.confirm(&prompt) => {
                context.delete_disk(&letter, true)?;
                format!("disk {} deleted", letter.to_ascii_uppercase())
            }
            RmdiskOutcome::ConfirmationRequired(_) => "rmdisk cancelled".to_string(),
            RmdiskOutcome::Deleted(path) => format!("{} deleted", path.display()),
        },
        Command::Fdisk {
            letter,
            name,
            size,
            unit,
            kind,
            fit,
            delete,
            add,
        } => {
            let request = match (add, delete) {
                (Some(add), _) => PartitionRequest::Resize { name, add, unit },
                (None, Some(delete)) if delete.eq_ignore_ascii_case("full") => {
                    PartitionRequest::Delete { name }
                }
                (None, Some(delete)) => bail!(FsError::InvalidParameter(format!(
                    "delete must be 'full', got '{delete}'"
                ))),
                (None, None) => PartitionRequest::Create {
                    name,
                    size: size.ok_or_else(|| anyhow!("fdisk needs --size to create a partition"))?,
                    unit,
                    kind,
                    fit,
                },
            };
            match context.partition(&letter, request, confirm)? {
                FdiskOutcome::Created(p) => format!(
                    "partition {} created at byte {}, {}",
                    p.name,
                    p.start,
                    human_size(p.size)
                ),
                FdiskOutcome::Resized(p) => {
                    format!("partition {} resized to {}", p.name, human_size(p.size))
                }
                FdiskOutcome::Deleted(name) => format!("partition {name} deleted"),
                FdiskOutcome::Cancelled => "fdisk cancelled".to_string(),
            }
        }
        Command::Mount { letter, name } => {
            let id = context.mount(&letter, &name)?;
            format!("{} mounted as {id}", name.to_ascii_uppercase())
        }
        Command::Unmount { id } => {
            context.unmount(&id)?;
            format!("{} unmounted", id.to_ascii_uppercase())
        }
        Command::Mounted => {
            let mounted = context.list_mounted();
            if mounted.is_empty() {
                return Ok("no mounted partitions".to_string());
            }
            let mut report = String::new();
            for m in mounted {
                let session = if m.logged_in { "logged in" } else { "" };
                writeln!(report, "{}\t{}\t{}\t{session}", m.id, m.disk, m.name)?;
            }
            report.trim_end().to_string()
        }
        Command::Mkfs {
            id,
            format_type,
            kind,
        } => {
            let superblock = context.format(&id, &format_type, kind)?;
            format!(
                "{} formatted as {kind:?}: {} inodes, {} blocks",
                id.to_ascii_uppercase(),
                superblock.inode_count,
                superblock.block_count
            )
        }
        Command::Login { user, pass, id } => {
            let pass = match pass {
                Some(pass) => pass,
                None => rpassword::prompt_password(format!("password for {user}: "))?,
            };
            let session = context.login(&user, &pass, &id)?;
            format!("welcome {}", session.user)
        }
        Command::Logout => format!("goodbye {}", context.logout()?.user),
        Command::Mkgrp { name } => format!("group {name} created with id {}", context.mkgrp(&name)?),
        Command::Rmgrp { name } => {
            context.rmgrp(&name)?;
            format!("group {name} removed")
        }
        Command::Mkusr { user, pass, group } => {
            let id = context.mkusr(&user, &pass, &group)?;
            format!("user {user} created with id {id}")
        }
        Command::Rmusr { user } => {
            context.rmusr(&user)?;
            format!("user {user} removed")
        }
        Command::Mkdir { path, parents } => {
            let index = context.mkdir(&path, parents)?;
            format!("directory {path} created as inode {index}")
        }
        Command::Mkfile {
            path,
            parents,
            size,
            content,
        } => {
            let size = u64::try_from(size.unwrap_or(0)).map_err(|_| {
                FsError::InvalidParameter("file size can't be negative".to_string())
            })?;
            let index = context.mkfile(&path, parents, size, content.as_deref())?;
            format!("file {path} created as inode {index}")
        }
        Command::Cat { files } => {
            let files: BTreeMap<u32, String> = (1..).zip(files).collect();
            context.cat(&files)?.trim_end_matches('\n').to_string()
        }
        Command::Mbr { letter } => mbr_report(&letter.to_ascii_uppercase(), &context.mbr_snapshot(&letter)?),
        Command::Superblock { id } => format!("{:#?}", context.superblock_snapshot(&id)?),
        Command::Tree { id } => {
            let mut report = String::new();
            tree_report(&context.explore(&id)?, 0, &mut report);
            report.trim_end().to_string()
        }
    };
    Ok(output)
}

fn human_size(bytes: u64) -> String {
    Byte::from_bytes(bytes as u128)
        .get_appropriate_unit(true)
        .to_string()
}

fn mbr_report(letter: &str, mbr: &Mbr) -> String {
    let mut report = format!(
        "disk {letter}: {}, fit {}, signature {}, created at {}",
        human_size(mbr.size),
        mbr.fit,
        mbr.signature,
        mbr.created_at
    );
    for (slot, entry) in mbr.slots.iter().enumerate() {
        let line = match entry {
            PartitionSlot::Free => format!("\n  slot {slot}: free"),
            PartitionSlot::Occupied(p) => format!(
                "\n  slot {slot}: {} {:?} {:?} fit {} start {} size {} id {}",
                p.name,
                p.kind,
                p.status,
                p.fit,
                p.start,
                p.size,
                p.mount_id.as_deref().unwrap_or("-")
            ),
        };
        report.push_str(&line);
    }
    report
}

fn tree_report(node: &TreeNode, depth: usize, report: &mut String) {
    report.push_str(&format!(
        "{}{} ({}, inode {})\n",
        "  ".repeat(depth),
        node.name,
        node.kind,
        node.inode
    ));
    for child in &node.children {
        tree_report(child, depth + 1, report);
    }
}
