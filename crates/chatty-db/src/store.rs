use anyhow::Result;

use chatty_types::{Group, GroupMember, User};

/// Durable state behind the gateway: users, groups and memberships.
///
/// Lookups that miss return `Ok(None)`. Inserts guarded by a uniqueness
/// constraint return `Ok(None)` when the row already exists, so duplicate
/// detection does not depend on a prior lookup. Each call is atomic on its
/// own; sequences of calls are not.
pub trait Store: Send + Sync {
    fn find_user_by_name(&self, username: &str) -> Result<Option<User>>;

    fn find_user_by_id(&self, id: u64) -> Result<Option<User>>;

    /// `None` if the username is taken.
    fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<User>>;

    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>>;

    fn find_group_by_id(&self, id: u64) -> Result<Option<Group>>;

    /// Returns false if the group does not exist.
    fn update_group_owner(&self, group_id: u64, owner_id: u64) -> Result<bool>;

    /// Create a group owned by `owner` and add the owner as its first member,
    /// in one transaction. `None` if the name is taken.
    fn create_group(&self, owner: &User, name: &str) -> Result<Option<Group>>;

    /// Members in the order they were added.
    fn list_group_members(&self, group_id: u64) -> Result<Vec<GroupMember>>;

    fn list_groups_for_user(&self, user_id: u64) -> Result<Vec<Group>>;

    fn find_membership(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMember>>;

    /// `None` if the user is already a member.
    fn add_member(
        &self,
        group_id: u64,
        user_id: u64,
        username: &str,
    ) -> Result<Option<GroupMember>>;

    /// Returns false if there was no such membership.
    fn remove_member(&self, group_id: u64, user_id: u64) -> Result<bool>;
}
