//! Chatty wire protocol.
//!
//! Every frame is `[length: u16][opcode: u16][payload: length bytes]`, all
//! integers little-endian. `length` counts payload bytes only, so a payload
//! can never exceed 65535 bytes; nothing is ever fragmented.
//!
//! - `frame`: whole-frame read/write over any tokio byte stream
//! - `payload`: bounds-checked primitive reader and writer
//! - `messages`: typed request/push payloads built on the primitives

pub mod error;
pub mod frame;
pub mod messages;
pub mod payload;

pub use error::{CodecError, Result};
pub use frame::{FRAME_HEADER, Frame, MAX_PAYLOAD, read_frame, read_frame_within, write_frame};
pub use messages::{
    ChatMessage, Credentials, GroupName, PresenceQuery, PresenceReport, Recipient, decode_id,
    decode_name, encode_id, encode_name,
};
pub use payload::{PayloadReader, PayloadWriter};
