//! the user and group records kept in `/users.txt`
use std::fmt;

use crate::error::{FsError, Result};

use super::{Ext2Fs, Inode, ROOT_INODE, USERS_FILE_NAME};

/// longest user, group or password accepted
pub const MAX_FIELD_LEN: usize = 10;
pub const ROOT_NAME: &str = "root";
/// id of a soft-deleted record
const DELETED: u32 = 0;
/// ids handed out to new records start here, 1 belongs to root
const FIRST_ID: u32 = 2;

/// one line of `/users.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRecord {
    /// `id,G,name`
    Group { id: u32, name: String },
    /// `id,U,group,name,password`
    User {
        id: u32,
        group: String,
        name: String,
        password: String,
    },
}

impl UserRecord {
    pub fn id(&self) -> u32 {
        match self {
            UserRecord::Group { id, .. } | UserRecord::User { id, .. } => *id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.id() == DELETED
    }

    fn delete(&mut self) {
        match self {
            UserRecord::Group { id, .. } | UserRecord::User { id, .. } => *id = DELETED,
        }
    }

    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let id = |field: &str| {
            field
                .parse::<u32>()
                .map_err(|_| FsError::Corrupted(format!("bad id in users.txt line '{line}'")))
        };
        match fields.as_slice() {
            [record_id, "G", name] => Ok(UserRecord::Group {
                id: id(record_id)?,
                name: name.to_string(),
            }),
            [record_id, "U", group, name, password] => Ok(UserRecord::User {
                id: id(record_id)?,
                group: group.to_string(),
                name: name.to_string(),
                password: password.to_string(),
            }),
            _ => Err(FsError::Corrupted(format!(
                "unrecognized users.txt line '{line}'"
            ))),
        }
    }
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRecord::Group { id, name } => write!(f, "{id},G,{name}"),
            UserRecord::User {
                id,
                group,
                name,
                password,
            } => write!(f, "{id},U,{group},{name},{password}"),
        }
    }
}

/// who a successful login belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// the user name as stored in the table
    pub user: String,
    pub uid: u32,
    /// id of the user's group, 0 when the group has been removed
    pub gid: u32,
}

/// The in-memory form of `/users.txt`.
///
/// Records are only ever appended; removal sets the id to 0 and keeps the line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTable {
    records: Vec<UserRecord>,
}

impl UserTable {
    /// the content of a freshly formatted filesystem
    pub fn bootstrap() -> Self {
        Self {
            records: vec![
                UserRecord::Group {
                    id: 1,
                    name: ROOT_NAME.to_string(),
                },
                UserRecord::User {
                    id: 1,
                    group: ROOT_NAME.to_string(),
                    name: ROOT_NAME.to_string(),
                    password: "123".to_string(),
                },
            ],
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let records = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(UserRecord::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records })
    }

    pub fn to_text(&self) -> String {
        self.records
            .iter()
            .map(|record| format!("{record}\n"))
            .collect()
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }
}

/// lookups, always skipping deleted records
impl UserTable {
    pub fn group_id(&self, name: &str) -> Option<u32> {
        self.records.iter().find_map(|record| match record {
            UserRecord::Group { id, name: n } if *id != DELETED && n == name => Some(*id),
            _ => None,
        })
    }

    /// find a user, ignoring case
    pub fn user(&self, name: &str) -> Option<&UserRecord> {
        self.records.iter().find(|record| {
            matches!(record, UserRecord::User { id, name: n, .. }
                if *id != DELETED && n.eq_ignore_ascii_case(name))
        })
    }

    /// check a user name (any case) and password (exact)
    pub fn authenticate(&self, name: &str, password: &str) -> Option<Credentials> {
        match self.user(name)? {
            UserRecord::User {
                id,
                group,
                name,
                password: stored,
            } if stored == password => Some(Credentials {
                user: name.clone(),
                uid: *id,
                gid: self.group_id(group).unwrap_or(DELETED),
            }),
            _ => None,
        }
    }

    /// next id of a group (`groups` set) or user record
    ///
    /// counting rows as well as ids keeps new ids above every id handed out
    /// before, even once deleted records have dropped theirs to 0
    fn next_id(&self, groups: bool) -> u32 {
        let same_kind = || {
            self.records
                .iter()
                .filter(move |r| matches!(r, UserRecord::Group { .. }) == groups)
        };
        let max_id = same_kind().map(UserRecord::id).max().unwrap_or(0);
        let rows = same_kind().count() as u32;
        (max_id.max(rows) + 1).max(FIRST_ID)
    }
}

/// mutations
impl UserTable {
    pub fn add_group(&mut self, name: &str) -> Result<u32> {
        validate_field("group", name)?;
        if self.group_id(name).is_some() {
            return Err(FsError::AlreadyExists(format!("group {name}")));
        }
        let id = self.next_id(true);
        self.records.push(UserRecord::Group {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    pub fn remove_group(&mut self, name: &str) -> Result<()> {
        validate_field("group", name)?;
        if name == ROOT_NAME {
            return Err(FsError::PermissionDenied("the root group can't be removed".into()));
        }
        let record = self
            .records
            .iter_mut()
            .find(|r| matches!(r, UserRecord::Group { id, name: n } if *id != DELETED && n == name))
            .ok_or_else(|| FsError::GroupNotFound(name.to_string()))?;
        record.delete();
        Ok(())
    }

    pub fn add_user(&mut self, name: &str, password: &str, group: &str) -> Result<u32> {
        validate_field("user", name)?;
        validate_field("password", password)?;
        validate_field("group", group)?;
        if self.group_id(group).is_none() {
            return Err(FsError::GroupNotFound(group.to_string()));
        }
        if self.user(name).is_some() {
            return Err(FsError::AlreadyExists(format!("user {name}")));
        }
        let id = self.next_id(false);
        self.records.push(UserRecord::User {
            id,
            group: group.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        });
        Ok(id)
    }

    pub fn remove_user(&mut self, name: &str) -> Result<()> {
        validate_field("user", name)?;
        if name.eq_ignore_ascii_case(ROOT_NAME) {
            return Err(FsError::PermissionDenied("the root user can't be removed".into()));
        }
        let record = self
            .records
            .iter_mut()
            .find(|r| {
                matches!(r, UserRecord::User { id, name: n, .. }
                    if *id != DELETED && n.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| FsError::UserNotFound(name.to_string()))?;
        record.delete();
        Ok(())
    }
}

/// non-empty, at most [MAX_FIELD_LEN] long, and no separators
fn validate_field(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.chars().count() > MAX_FIELD_LEN {
        return Err(FsError::InvalidParameter(format!(
            "{what} must have 1 to {MAX_FIELD_LEN} characters"
        )));
    }
    if value.contains([',', '\n', '\r']) {
        return Err(FsError::InvalidParameter(format!(
            "{what} can't contain ',' or line breaks"
        )));
    }
    Ok(())
}

/// `/users.txt` on disk
impl UserTable {
    /// locate `/users.txt` in the root directory and parse it
    /// # Return
    /// the table, the inode index of the file and its inode
    pub fn load(fs: &Ext2Fs) -> Result<(Self, u32, Inode)> {
        let index = fs
            .lookup(ROOT_INODE, USERS_FILE_NAME)?
            .ok_or_else(|| FsError::FileNotFound(format!("/{USERS_FILE_NAME}")))?;
        let inode = fs.read_inode(index)?;
        let content = fs.read_file_content(&inode)?;
        let table = Self::parse(&String::from_utf8_lossy(&content))?;
        Ok((table, index, inode))
    }

    /// rewrite the whole file
    pub fn save(&self, fs: &mut Ext2Fs, index: u32, inode: &mut Inode) -> Result<()> {
        fs.write_file_content(index, inode, self.to_text().as_bytes())
    }
}
