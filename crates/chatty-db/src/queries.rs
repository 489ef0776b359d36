use crate::Database;
use crate::models::{GroupMemberRow, GroupRow, UserRow};
use crate::store::Store;
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};
use tracing::debug;

use chatty_types::{Group, GroupMember, User};

impl Store for Database {
    // -- Users --

    fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, password FROM users WHERE username = ?1",
                [username],
                user_row,
            )
            .optional()
            .map(|row| row.map(User::from))
        })
    }

    fn find_user_by_id(&self, id: u64) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO users (username, password) VALUES (?1, ?2)",
                    (username, password_hash),
                )
                .unique()?;
            if inserted.is_none() {
                return Ok(None);
            }

            let id = conn.last_insert_rowid() as u64;
            debug!(user_id = id, "created user {}", username);
            Ok(Some(User {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
            }))
        })
    }

    // -- Groups --

    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, owner_id, verbose FROM chat_groups WHERE verbose = ?1",
                [name],
                group_row,
            )
            .optional()
            .map(|row| row.map(Group::from))
        })
    }

    fn find_group_by_id(&self, id: u64) -> Result<Option<Group>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, owner_id, verbose FROM chat_groups WHERE id = ?1",
                [key(id)],
                group_row,
            )
            .optional()
            .map(|row| row.map(Group::from))
        })
    }

    fn update_group_owner(&self, group_id: u64, owner_id: u64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chat_groups SET owner_id = ?1 WHERE id = ?2",
                (key(owner_id), key(group_id)),
            )?;
            Ok(changed == 1)
        })
    }

    fn create_group(&self, owner: &User, name: &str) -> Result<Option<Group>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let inserted = tx
                .execute(
                    "INSERT INTO chat_groups (owner_id, verbose) VALUES (?1, ?2)",
                    (key(owner.id), name),
                )
                .unique()?;
            if inserted.is_none() {
                return Ok(None);
            }
            let group_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO group_members (group_id, user_id, username) VALUES (?1, ?2, ?3)",
                (group_id, key(owner.id), &owner.username),
            )?;
            tx.commit()?;

            debug!(group_id, owner_id = owner.id, "created group {}", name);
            Ok(Some(Group {
                id: group_id as u64,
                owner_id: owner.id,
                name: name.to_string(),
            }))
        })
    }

    // -- Memberships --

    fn list_group_members(&self, group_id: u64) -> Result<Vec<GroupMember>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, group_id, user_id, username FROM group_members
                 WHERE group_id = ?1
                 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([key(group_id)], member_row)?
                .map(|row| row.map(GroupMember::from))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn list_groups_for_user(&self, user_id: u64) -> Result<Vec<Group>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.owner_id, g.verbose
                 FROM group_members m
                 JOIN chat_groups g ON g.id = m.group_id
                 WHERE m.user_id = ?1
                 ORDER BY g.id",
            )?;
            let rows = stmt
                .query_map([key(user_id)], group_row)?
                .map(|row| row.map(Group::from))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn find_membership(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMember>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, group_id, user_id, username FROM group_members
                 WHERE group_id = ?1 AND user_id = ?2",
                [key(group_id), key(user_id)],
                member_row,
            )
            .optional()
            .map(|row| row.map(GroupMember::from))
        })
    }

    fn add_member(
        &self,
        group_id: u64,
        user_id: u64,
        username: &str,
    ) -> Result<Option<GroupMember>> {
        self.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO group_members (group_id, user_id, username) VALUES (?1, ?2, ?3)",
                    (key(group_id), key(user_id), username),
                )
                .unique()?;
            if inserted.is_none() {
                return Ok(None);
            }

            Ok(Some(GroupMember {
                id: conn.last_insert_rowid() as u64,
                group_id,
                user_id,
                username: username.to_string(),
            }))
        })
    }

    fn remove_member(&self, group_id: u64, user_id: u64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                [key(group_id), key(user_id)],
            )?;
            Ok(removed > 0)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: u64) -> Result<Option<User>> {
    let mut stmt = conn.prepare("SELECT id, username, password FROM users WHERE id = ?1")?;

    let row = stmt.query_row([key(id)], user_row).optional()?;

    Ok(row.map(User::from))
}

/// SQLite keys are i64. Ids above i64::MAX wrap negative and never match a row.
fn key(id: u64) -> i64 {
    id as i64
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
    })
}

fn group_row(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        verbose: row.get(2)?,
    })
}

fn member_row(row: &Row<'_>) -> rusqlite::Result<GroupMemberRow> {
    Ok(GroupMemberRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Maps a uniqueness violation on insert to `None`.
trait UniqueExt<T> {
    fn unique(self) -> Result<Option<T>>;
}

impl<T> UniqueExt<T> for std::result::Result<T, rusqlite::Error> {
    fn unique(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
