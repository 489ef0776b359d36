use bytes::Bytes;

use crate::error::{CodecError, Result};
use crate::payload::{PayloadReader, PayloadWriter};

/// Handshake credentials for Register, Login and Subscribe:
/// `[usernameLen:u8][username][passwordLen:u8][password]`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Vec<u8>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);

        let username = r.string_u8("username")?;
        if username.is_empty() {
            return Err(CodecError::EmptyField("username"));
        }
        let password = r.chunk_u8()?.to_vec();
        if password.is_empty() {
            return Err(CodecError::EmptyField("password"));
        }
        r.finish()?;

        Ok(Self { username, password })
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut w = PayloadWriter::new();
        w.string_u8(&self.username)?;
        w.chunk_u8(&self.password)?;
        Ok(w.into_bytes())
    }
}

/// Addressee of a chat message. On the wire this is the pair
/// `[directRecipient:u64][groupRecipient:u64]` with exactly one side non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    User(u64),
    Group(u64),
}

impl Recipient {
    pub fn from_wire(user_id: u64, group_id: u64) -> Result<Self> {
        match (user_id, group_id) {
            (0, 0) => Err(CodecError::InvalidRecipient),
            (user, 0) => Ok(Self::User(user)),
            (0, group) => Ok(Self::Group(group)),
            _ => Err(CodecError::InvalidRecipient),
        }
    }

    pub fn to_wire(self) -> (u64, u64) {
        match self {
            Self::User(id) => (id, 0),
            Self::Group(id) => (0, id),
        }
    }
}

/// Opcode-1 payload, used both for client sends and for server pushes:
/// `[senderID:u64][directRecipient:u64][groupRecipient:u64][textLen:u16][text]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_id: u64,
    pub recipient: Recipient,
    pub text: String,
}

impl ChatMessage {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        let sender_id = r.u64()?;
        let user_id = r.u64()?;
        let group_id = r.u64()?;
        let text = r.string_u16("text")?;
        r.finish()?;

        Ok(Self {
            sender_id,
            recipient: Recipient::from_wire(user_id, group_id)?,
            text,
        })
    }

    pub fn encode(&self) -> Result<Bytes> {
        let (user_id, group_id) = self.recipient.to_wire();
        let mut w = PayloadWriter::new();
        w.u64(self.sender_id).u64(user_id).u64(group_id);
        w.string_u16(&self.text)?;
        Ok(w.into_bytes())
    }
}

/// Opcode-2 payload: `[nameLen:u8][name]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupName {
    pub name: String,
}

impl GroupName {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        let name = r.string_u8("group name")?;
        if name.is_empty() {
            return Err(CodecError::EmptyField("group name"));
        }
        r.finish()?;
        Ok(Self { name })
    }

    pub fn encode(&self) -> Result<Bytes> {
        encode_name(&self.name)
    }
}

/// Opcode-8 request: `[count:u16]([id:u64])*count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceQuery {
    pub ids: Vec<u64>,
}

impl PresenceQuery {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        let count = r.u16()? as usize;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(r.u64()?);
        }
        r.finish()?;
        Ok(Self { ids })
    }

    pub fn encode(&self) -> Result<Bytes> {
        let count = u16::try_from(self.ids.len()).map_err(|_| CodecError::TooLarge {
            len: self.ids.len(),
            max: u16::MAX as usize,
        })?;
        let mut w = PayloadWriter::new();
        w.u16(count);
        for id in &self.ids {
            w.u64(*id);
        }
        Ok(w.into_bytes())
    }
}

/// Opcode-8 push: `[count:u16]([id:u64][online:u8])*count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceReport {
    pub entries: Vec<(u64, bool)>,
}

impl PresenceReport {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        let count = r.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let id = r.u64()?;
            let online = r.u8()? != 0;
            entries.push((id, online));
        }
        r.finish()?;
        Ok(Self { entries })
    }

    pub fn encode(&self) -> Result<Bytes> {
        let count = u16::try_from(self.entries.len()).map_err(|_| CodecError::TooLarge {
            len: self.entries.len(),
            max: u16::MAX as usize,
        })?;
        let mut w = PayloadWriter::new();
        w.u16(count);
        for (id, online) in &self.entries {
            w.u64(*id).u8(u8::from(*online));
        }
        Ok(w.into_bytes())
    }
}

/// Decode a payload that is exactly one u64 (opcodes 3 and 7).
pub fn decode_id(payload: &[u8]) -> Result<u64> {
    let mut r = PayloadReader::new(payload);
    let id = r.u64()?;
    r.finish()?;
    Ok(id)
}

pub fn encode_id(id: u64) -> Bytes {
    let mut w = PayloadWriter::new();
    w.u64(id);
    w.into_bytes()
}

/// `[len:u8][name]`, used for username and group name lookups.
pub fn encode_name(name: &str) -> Result<Bytes> {
    let mut w = PayloadWriter::new();
    w.string_u8(name)?;
    Ok(w.into_bytes())
}

/// Decode a `[len:u8][name]` payload (opcode 6).
pub fn decode_name(payload: &[u8]) -> Result<String> {
    let mut r = PayloadReader::new(payload);
    let name = r.string_u8("name")?;
    if name.is_empty() {
        return Err(CodecError::EmptyField("name"));
    }
    r.finish()?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_layout() {
        let payload = [5, b'a', b'l', b'i', b'c', b'e', 3, b'p', b'w', b'1'];
        let creds = Credentials::decode(&payload).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, b"pw1");
        assert_eq!(&creds.encode().unwrap()[..], &payload);
    }

    #[test]
    fn credentials_reject_empty_fields() {
        assert!(matches!(
            Credentials::decode(&[0, 2, b'p', b'w']).unwrap_err(),
            CodecError::EmptyField("username")
        ));
        assert!(matches!(
            Credentials::decode(&[1, b'a', 0]).unwrap_err(),
            CodecError::EmptyField("password")
        ));
        assert!(matches!(
            Credentials::decode(&[3, b'b', b'o']).unwrap_err(),
            CodecError::Truncated { .. }
        ));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "alice".into(),
            password: b"hunter2".to_vec(),
        };
        let shown = format!("{:?}", creds);
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn recipient_discriminant() {
        assert_eq!(Recipient::from_wire(5, 0).unwrap(), Recipient::User(5));
        assert_eq!(Recipient::from_wire(0, 9).unwrap(), Recipient::Group(9));
        assert!(Recipient::from_wire(0, 0).is_err());
        assert!(Recipient::from_wire(5, 9).is_err());
    }

    #[test]
    fn chat_message_wire_shape() {
        let msg = ChatMessage {
            sender_id: 2,
            recipient: Recipient::Group(1),
            text: "hi".into(),
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), 8 * 3 + 2 + 2);
        assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &0u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &1u64.to_le_bytes());
        assert_eq!(&bytes[24..26], &2u16.to_le_bytes());
        assert_eq!(ChatMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn chat_message_truncated_text() {
        let mut w = PayloadWriter::new();
        w.u64(2).u64(3).u64(0).u16(10).raw(b"short");
        assert!(matches!(
            ChatMessage::decode(&w.into_bytes()).unwrap_err(),
            CodecError::Truncated { needed: 10, remaining: 5 }
        ));
    }

    #[test]
    fn presence_report_appends_flag() {
        let query = PresenceQuery { ids: vec![2, 3] };
        assert_eq!(PresenceQuery::decode(&query.encode().unwrap()).unwrap(), query);

        let report = PresenceReport {
            entries: vec![(2, true), (3, false)],
        };
        let bytes = report.encode().unwrap();
        assert_eq!(bytes.len(), 2 + 2 * 9);
        assert_eq!(bytes[10], 1);
        assert_eq!(bytes[19], 0);
    }

    #[test]
    fn id_payload_must_be_exact() {
        assert_eq!(decode_id(&encode_id(42)).unwrap(), 42);
        assert!(decode_id(&[1, 2, 3]).is_err());
        assert!(decode_id(&[0; 9]).is_err());
    }

    #[test]
    fn name_payloads() {
        let bytes = encode_name("Team").unwrap();
        assert_eq!(&bytes[..], &[4, b'T', b'e', b'a', b'm']);
        assert_eq!(GroupName::decode(&bytes).unwrap().name, "Team");
        assert_eq!(decode_name(&bytes).unwrap(), "Team");
        assert!(GroupName::decode(&[0]).is_err());
    }
}
