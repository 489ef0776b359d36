//! Database row types. These map directly to SQLite rows and convert into
//! the chatty-types models at the store boundary.

use chatty_types::{Group, GroupMember, User};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
}

pub struct GroupRow {
    pub id: i64,
    pub owner_id: i64,
    pub verbose: String,
}

pub struct GroupMemberRow {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub username: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id as u64,
            username: row.username,
            password_hash: row.password,
        }
    }
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: row.id as u64,
            owner_id: row.owner_id as u64,
            name: row.verbose,
        }
    }
}

impl From<GroupMemberRow> for GroupMember {
    fn from(row: GroupMemberRow) -> Self {
        GroupMember {
            id: row.id as u64,
            group_id: row.group_id as u64,
            user_id: row.user_id as u64,
            username: row.username,
        }
    }
}
