/// Reserved identity used as the sender of server-generated notices.
/// The row is seeded by the database migrations and can never log in.
pub const SYSTEM_USER_ID: u64 = 1;
pub const SYSTEM_USERNAME: &str = "System";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// Argon2id PHC string. Never the raw password.
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: u64,
    pub owner_id: u64,
    /// Display name, unique across groups.
    pub name: String,
}

impl Group {
    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_id == user_id
    }
}

/// Membership row. `username` is a snapshot taken when the member was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub id: u64,
    pub group_id: u64,
    pub user_id: u64,
    pub username: String,
}
