//! Store integration tests
//!
//! These tests verify:
//! - User creation and lookup
//! - Group creation with the owner as first member
//! - Membership add/remove and uniqueness
//! - Owner transfer

use chatty_db::{Database, Store};
use chatty_types::{SYSTEM_USER_ID, SYSTEM_USERNAME};

fn setup() -> Database {
    Database::open_in_memory().expect("Failed to create test database")
}

#[test]
fn test_system_user_is_seeded() {
    let db = setup();
    let system = db.find_user_by_id(SYSTEM_USER_ID).unwrap().unwrap();
    assert_eq!(system.username, SYSTEM_USERNAME);

    // First real user gets the next id.
    let alice = db.create_user("alice", "hash-a").unwrap().unwrap();
    assert_eq!(alice.id, 2);
}

#[test]
fn test_user_lookups() {
    let db = setup();
    let alice = db.create_user("alice", "hash-a").unwrap().unwrap();

    assert_eq!(db.find_user_by_name("alice").unwrap(), Some(alice.clone()));
    assert_eq!(db.find_user_by_id(alice.id).unwrap(), Some(alice));
    assert_eq!(db.find_user_by_name("nobody").unwrap(), None);
    assert_eq!(db.find_user_by_id(999).unwrap(), None);
    assert_eq!(db.find_user_by_id(u64::MAX).unwrap(), None);
}

#[test]
fn test_duplicate_username_returns_none() {
    let db = setup();
    db.create_user("alice", "hash-a").unwrap().unwrap();
    assert!(db.create_user("alice", "other").unwrap().is_none());
    assert!(db.create_user(SYSTEM_USERNAME, "x").unwrap().is_none());
}

#[test]
fn test_create_group_adds_owner() {
    let db = setup();
    let alice = db.create_user("alice", "hash-a").unwrap().unwrap();

    let team = db.create_group(&alice, "Team").unwrap().unwrap();
    assert_eq!(team.id, 1);
    assert_eq!(team.owner_id, alice.id);
    assert_eq!(team.name, "Team");

    let members = db.list_group_members(team.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, alice.id);
    assert_eq!(members[0].username, "alice");

    assert_eq!(db.find_group_by_name("Team").unwrap(), Some(team.clone()));
    assert_eq!(db.find_group_by_id(team.id).unwrap(), Some(team));
    assert_eq!(db.find_group_by_id(42).unwrap(), None);
}

#[test]
fn test_duplicate_group_name_returns_none() {
    let db = setup();
    let alice = db.create_user("alice", "hash-a").unwrap().unwrap();
    let bob = db.create_user("bob", "hash-b").unwrap().unwrap();

    db.create_group(&alice, "Team").unwrap().unwrap();
    assert!(db.create_group(&bob, "Team").unwrap().is_none());

    // The failed create left no stray membership for bob.
    assert!(db.list_groups_for_user(bob.id).unwrap().is_empty());
}

#[test]
fn test_membership_lifecycle() {
    let db = setup();
    let alice = db.create_user("alice", "hash-a").unwrap().unwrap();
    let bob = db.create_user("bob", "hash-b").unwrap().unwrap();
    let team = db.create_group(&alice, "Team").unwrap().unwrap();

    assert!(db.find_membership(team.id, bob.id).unwrap().is_none());

    let member = db.add_member(team.id, bob.id, "bob").unwrap().unwrap();
    assert_eq!(member.user_id, bob.id);
    assert_eq!(db.find_membership(team.id, bob.id).unwrap(), Some(member));

    // (group, user) is unique.
    assert!(db.add_member(team.id, bob.id, "bob").unwrap().is_none());

    let roster: Vec<_> = db
        .list_group_members(team.id)
        .unwrap()
        .into_iter()
        .map(|m| m.username)
        .collect();
    assert_eq!(roster, vec!["alice", "bob"]);

    assert!(db.remove_member(team.id, bob.id).unwrap());
    assert!(!db.remove_member(team.id, bob.id).unwrap());
    assert!(db.find_membership(team.id, bob.id).unwrap().is_none());
}

#[test]
fn test_groups_for_user() {
    let db = setup();
    let alice = db.create_user("alice", "hash-a").unwrap().unwrap();
    let bob = db.create_user("bob", "hash-b").unwrap().unwrap();

    let team = db.create_group(&alice, "Team").unwrap().unwrap();
    let ops = db.create_group(&bob, "Ops").unwrap().unwrap();
    db.add_member(ops.id, alice.id, "alice").unwrap().unwrap();

    let names: Vec<_> = db
        .list_groups_for_user(alice.id)
        .unwrap()
        .into_iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(names, vec![team.id, ops.id]);
    assert_eq!(db.list_groups_for_user(bob.id).unwrap(), vec![ops]);
}

#[test]
fn test_update_group_owner() {
    let db = setup();
    let alice = db.create_user("alice", "hash-a").unwrap().unwrap();
    let bob = db.create_user("bob", "hash-b").unwrap().unwrap();
    let team = db.create_group(&alice, "Team").unwrap().unwrap();

    assert!(db.update_group_owner(team.id, bob.id).unwrap());
    let team = db.find_group_by_id(team.id).unwrap().unwrap();
    assert!(team.is_owner(bob.id));
    assert!(!team.is_owner(alice.id));

    assert!(!db.update_group_owner(77, bob.id).unwrap());
}

#[test]
fn test_open_on_disk_runs_migrations_once() {
    let dir = std::env::temp_dir().join(format!("chatty_db_test_{}", std::process::id()));
    let _ = std::fs::create_dir_all(&dir);
    let path = dir.join("chatty.db");
    let _ = std::fs::remove_file(&path);

    {
        let db = Database::open(&path).unwrap();
        db.create_user("alice", "hash-a").unwrap().unwrap();
    }

    // Reopening keeps data and does not duplicate the seed row.
    let db = Database::open(&path).unwrap();
    assert!(db.find_user_by_name("alice").unwrap().is_some());
    assert!(db.create_user("carol", "hash-c").unwrap().unwrap().id > 2);

    drop(db);
    let _ = std::fs::remove_dir_all(&dir);
}
