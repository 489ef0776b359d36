pub mod codes;
pub mod models;

pub use codes::{Opcode, Status};
pub use models::{Group, GroupMember, SYSTEM_USER_ID, SYSTEM_USERNAME, User};
