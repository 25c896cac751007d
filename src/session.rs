//! login and logout against the users file of a mounted partition
use log::info;

use crate::{
    error::{FsError, Result},
    fs::{Owner, UserTable, ROOT_NAME},
    Context,
};

/// the single user logged in to the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: String,
    /// the partition whose users file authenticated the user
    pub mount_id: String,
    pub uid: u32,
    pub gid: u32,
}

impl Session {
    pub fn is_root(&self) -> bool {
        self.user.eq_ignore_ascii_case(ROOT_NAME)
    }

    /// who files created during the session belong to
    pub fn owner(&self) -> Owner {
        Owner {
            uid: self.uid as i32,
            gid: self.gid as i32,
            is_root: self.is_root(),
        }
    }
}

impl Context {
    /// authenticate `user` against `/users.txt` of mount `id` and start a session
    pub fn login(&mut self, user: &str, password: &str, id: &str) -> Result<&Session> {
        if let Some(session) = &self.session {
            return Err(FsError::SessionConflict(session.user.clone()));
        }
        let fs = self.open_fs(id)?;
        let (table, _, _) = UserTable::load(&fs)?;
        let credentials = table
            .authenticate(user, password)
            .ok_or(FsError::InvalidCredentials)?;

        let mounted = self
            .mounts
            .get_mut(id)
            .ok_or_else(|| FsError::MountNotFound(id.to_ascii_uppercase()))?;
        mounted.logged_in = true;
        info!("{} logged in on {}", credentials.user, mounted.id);
        let session = Session {
            user: credentials.user,
            mount_id: mounted.id.clone(),
            uid: credentials.uid,
            gid: credentials.gid,
        };
        Ok(&*self.session.insert(session))
    }

    pub fn logout(&mut self) -> Result<Session> {
        let session = self.session.take().ok_or(FsError::NoActiveSession)?;
        if let Some(mounted) = self.mounts.get_mut(&session.mount_id) {
            mounted.logged_in = false;
        }
        info!("{} logged out", session.user);
        Ok(session)
    }

    /// the session, provided root owns it
    pub(crate) fn root_session(&self) -> Result<&Session> {
        let session = self.active_session()?;
        if !session.is_root() {
            return Err(FsError::PermissionDenied(format!(
                "{} is not root",
                session.user
            )));
        }
        Ok(session)
    }
}
