//! group and user administration, reserved to root
use log::info;

use crate::{error::Result, fs::UserTable, Context};

impl Context {
    /// load the users file of the session's partition, let `change` edit it, then save it
    fn edit_user_table<T>(&mut self, change: impl FnOnce(&mut UserTable) -> Result<T>) -> Result<T> {
        let session = self.root_session()?;
        let mut fs = self.open_fs(&session.mount_id)?;
        let (mut table, index, mut inode) = UserTable::load(&fs)?;
        let outcome = change(&mut table)?;
        table.save(&mut fs, index, &mut inode)?;
        fs.flush()?;
        Ok(outcome)
    }

    /// add group `name`
    /// # Return
    /// the new group id
    pub fn mkgrp(&mut self, name: &str) -> Result<u32> {
        let id = self.edit_user_table(|table| table.add_group(name))?;
        info!("created group {name} with id {id}");
        Ok(id)
    }

    pub fn rmgrp(&mut self, name: &str) -> Result<()> {
        self.edit_user_table(|table| table.remove_group(name))?;
        info!("removed group {name}");
        Ok(())
    }

    /// add user `name` to the existing group `group`
    /// # Return
    /// the new user id
    pub fn mkusr(&mut self, name: &str, password: &str, group: &str) -> Result<u32> {
        let id = self.edit_user_table(|table| table.add_user(name, password, group))?;
        info!("created user {name} in group {group} with id {id}");
        Ok(id)
    }

    pub fn rmusr(&mut self, name: &str) -> Result<()> {
        self.edit_user_table(|table| table.remove_user(name))?;
        info!("removed user {name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::FsError,
        fs::{FsKind, UserTable},
        utils::init_test_environment::{formatted_partition, login_root, TestEnvironment},
    };

    #[test]
    fn test_groups_and_users_persist() -> anyhow::Result<()> {
        let env = TestEnvironment::new("users-persist");
        let (mut context, id) = login_root(&env)?;
        assert_eq!(context.mkgrp("devs")?, 2);
        assert_eq!(context.mkusr("ana", "pw", "devs")?, 2);
        assert!(matches!(context.mkgrp("devs"), Err(FsError::AlreadyExists(_))));
        assert!(matches!(
            context.mkusr("bob", "pw", "ops"),
            Err(FsError::GroupNotFound(_))
        ));

        let fs = context.open_fs(&id)?;
        let (table, _, _) = UserTable::load(&fs)?;
        assert_eq!(
            table.to_text(),
            "1,G,root\n1,U,root,root,123\n2,G,devs\n2,U,devs,ana,pw\n"
        );

        context.logout()?;
        let session = context.login("ana", "pw", &id)?;
        assert_eq!((session.uid, session.gid), (2, 2));
        assert!(!session.is_root());
        Ok(())
    }

    #[test]
    fn test_removed_user_cannot_login() -> anyhow::Result<()> {
        let env = TestEnvironment::new("users-remove");
        let (mut context, id) = login_root(&env)?;
        context.mkgrp("devs")?;
        context.mkusr("ana", "pw", "devs")?;
        context.rmusr("ana")?;
        assert!(matches!(context.rmusr("ana"), Err(FsError::UserNotFound(_))));
        context.rmgrp("devs")?;
        assert!(matches!(context.rmgrp("devs"), Err(FsError::GroupNotFound(_))));
        assert!(context.mkgrp("devs")? > 2);

        context.logout()?;
        assert!(matches!(
            context.login("ana", "pw", &id),
            Err(FsError::InvalidCredentials)
        ));
        Ok(())
    }

    #[test]
    fn test_administration_requires_root() -> anyhow::Result<()> {
        let env = TestEnvironment::new("users-root-only");
        let (mut context, id) = formatted_partition(&env, FsKind::Ext2)?;
        assert!(matches!(context.mkgrp("devs"), Err(FsError::NoActiveSession)));

        context.login("root", "123", &id)?;
        context.mkgrp("devs")?;
        context.mkusr("ana", "pw", "devs")?;
        context.logout()?;
        context.login("ana", "pw", &id)?;
        assert!(matches!(context.mkgrp("ops"), Err(FsError::PermissionDenied(_))));
        assert!(matches!(context.rmusr("root"), Err(FsError::PermissionDenied(_))));
        Ok(())
    }

    #[test]
    fn test_users_file_grows_past_one_block() -> anyhow::Result<()> {
        let env = TestEnvironment::new("users-grow");
        let (mut context, id) = login_root(&env)?;
        for i in 0..12 {
            context.mkgrp(&format!("group{i}"))?;
        }
        let fs = context.open_fs(&id)?;
        let (table, _, inode) = UserTable::load(&fs)?;
        assert_eq!(table.records().len(), 14);
        assert!(inode.size as u64 > crate::fs::BLOCK_SIZE);
        assert!(inode.block(1).is_some());
        Ok(())
    }
}
