//! Handshake state machine.
//!
//! A fresh connection may only send Register, Login or Subscribe. Any other
//! opcode gets 401 and malformed credentials get 400; both close the
//! connection. Refusals (unknown user, wrong password, already online) are
//! answered and the client may try again on the same socket.

use std::net::SocketAddr;

use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};

use chatty_protocol::{Credentials, Frame, read_frame_within};
use chatty_types::{Opcode, Status, User};

use crate::commands::send_hello;
use crate::gateway::Gateway;
use crate::password;
use crate::presence::{Outbound, PushChannel, Role};

/// An authenticated connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub role: Role,
    pub outbound: Outbound,
    /// Set on push connections; the packet loop routes acks into it.
    pub push: Option<PushChannel>,
}

impl Session {
    pub fn user_id(&self) -> u64 {
        self.user.id
    }

    pub async fn reply(&self, frame: Frame) -> bool {
        self.outbound.send(frame).await
    }
}

/// Run the handshake until it succeeds or the connection must close.
pub async fn handshake<R>(
    gateway: &Gateway,
    reader: &mut R,
    outbound: &Outbound,
    peer: SocketAddr,
) -> Option<Session>
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match read_frame_within(reader, Some(gateway.config().handshake_timeout)).await
        {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%peer, "handshake ended: {}", e);
                return None;
            }
        };

        let Some(op) = Opcode::from_u16(frame.opcode()).filter(|op| op.is_handshake()) else {
            warn!(%peer, opcode = frame.opcode(), "unauthenticated request rejected");
            outbound.send(Frame::status(Status::Unauthorized)).await;
            return None;
        };

        let creds = match Credentials::decode(frame.payload()) {
            Ok(creds) => creds,
            Err(e) => {
                warn!(%peer, "malformed credentials: {}", e);
                outbound.send(Frame::status(Status::BadRequest)).await;
                return None;
            }
        };

        let result = match op {
            Opcode::Register => register(gateway, &creds, outbound).await,
            Opcode::Login => authenticate(gateway, &creds, outbound, Role::Command).await,
            _ => authenticate(gateway, &creds, outbound, Role::Push).await,
        };

        match result {
            Ok(session) => {
                if !outbound.send(Frame::status(Status::Ok)).await {
                    return Some(session);
                }
                info!(
                    %peer,
                    user_id = session.user_id(),
                    "{} authenticated on {} connection",
                    session.user.username,
                    session.role
                );
                if session.role == Role::Push {
                    if let Err(e) = send_hello(gateway, session.user_id()).await {
                        error!(user_id = session.user_id(), "hello failed: {:#}", e);
                    }
                }
                return Some(session);
            }
            Err(status) => {
                debug!(%peer, username = %creds.username, %status, "{:?} refused", op);
                if !outbound.send(Frame::status(status)).await {
                    return None;
                }
            }
        }
    }
}

async fn register(
    gateway: &Gateway,
    creds: &Credentials,
    outbound: &Outbound,
) -> Result<Session, Status> {
    let store = gateway.store();

    if let Some(existing) = store
        .find_user_by_name(&creds.username)
        .map_err(internal)?
    {
        if gateway.presence().is_bound(existing.id, Role::Command).await {
            return Err(Status::Conflict);
        }
        return Err(Status::NotAcceptable);
    }

    let hash = password::hash_blocking(creds.password.clone())
        .await
        .map_err(internal)?;
    let user = store
        .create_user(&creds.username, &hash)
        .map_err(internal)?
        .ok_or(Status::NotAcceptable)?;
    info!(user_id = user.id, "registered {}", user.username);

    gateway
        .presence()
        .bind_command(user.id, outbound.clone())
        .await
        .map_err(|_| Status::Conflict)?;

    Ok(Session {
        user,
        role: Role::Command,
        outbound: outbound.clone(),
        push: None,
    })
}

async fn authenticate(
    gateway: &Gateway,
    creds: &Credentials,
    outbound: &Outbound,
    role: Role,
) -> Result<Session, Status> {
    let user = gateway
        .store()
        .find_user_by_name(&creds.username)
        .map_err(internal)?
        .ok_or(Status::NotFound)?;

    if gateway.presence().is_bound(user.id, role).await {
        return Err(Status::Conflict);
    }

    if !password::verify_blocking(creds.password.clone(), user.password_hash.clone()).await {
        warn!(user_id = user.id, "wrong password for {}", user.username);
        return Err(Status::Locked);
    }

    let push = match role {
        Role::Command => {
            gateway
                .presence()
                .bind_command(user.id, outbound.clone())
                .await
                .map_err(|_| Status::Conflict)?;
            None
        }
        Role::Push => {
            let channel = PushChannel::new(outbound.clone());
            gateway
                .presence()
                .bind_push(user.id, channel.clone())
                .await
                .map_err(|_| Status::Conflict)?;
            Some(channel)
        }
    };

    Ok(Session {
        user,
        role,
        outbound: outbound.clone(),
        push,
    })
}

fn internal(e: anyhow::Error) -> Status {
    error!("handshake store error: {:#}", e);
    Status::Internal
}
