use std::fmt;

/// Request opcodes a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    SendMessage = 1,
    CreateGroup = 2,
    GroupName = 3,
    Register = 4,
    Login = 5,
    UserId = 6,
    Username = 7,
    Presence = 8,
    Subscribe = 10,
}

impl Opcode {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::SendMessage,
            2 => Self::CreateGroup,
            3 => Self::GroupName,
            4 => Self::Register,
            5 => Self::Login,
            6 => Self::UserId,
            7 => Self::Username,
            8 => Self::Presence,
            10 => Self::Subscribe,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    /// Opcodes accepted on a connection that has not authenticated yet.
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Register | Self::Login | Self::Subscribe)
    }
}

/// Response codes. They travel in the opcode slot of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Status {
    Ok = 200,
    BadRequest = 400,
    Unauthorized = 401,
    NotFound = 404,
    NotAcceptable = 406,
    Conflict = 409,
    Locked = 423,
    Internal = 500,
    NotImplemented = 501,
}

impl Status {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            200 => Self::Ok,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            406 => Self::NotAcceptable,
            409 => Self::Conflict,
            423 => Self::Locked,
            500 => Self::Internal,
            501 => Self::NotImplemented,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    /// Codes a push client answers a direct delivery with.
    pub fn is_delivery_ack(self) -> bool {
        matches!(self, Self::Ok | Self::BadRequest | Self::NotFound)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
