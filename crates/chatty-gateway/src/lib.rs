//! Chatty gateway: the session, presence and routing engine.
//!
//! Each accepted TCP connection authenticates as either the user's command
//! channel (requests and replies) or their push channel (server-initiated
//! messages). A user holds at most one of each at a time.
//!
//! - `gateway`: shared handle and accept loop
//! - `connection`: per-connection task, writer task and packet loop
//! - `session`: handshake state machine (Register, Login, Subscribe)
//! - `presence`: directory of live channels keyed by user ID
//! - `router`: post-handshake opcode dispatch
//! - `delivery`: direct delivery with ack wait, group broadcast, notices
//! - `commands`: in-band group commands (`/add`, `/kick`, ...)

pub mod commands;
pub mod config;
pub mod connection;
pub mod delivery;
pub mod gateway;
pub mod password;
pub mod presence;
pub mod router;
pub mod session;

pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use presence::{Presence, Role};
