//! Post-handshake request dispatch.
//!
//! Handlers return `Result<Bytes, Status>`: `Ok(payload)` is sent back as a
//! 200 frame, `Err(status)` as a bare status frame.

use bytes::Bytes;
use tracing::{debug, error, trace, warn};

use chatty_protocol::{
    ChatMessage, Frame, GroupName, PresenceQuery, PresenceReport, Recipient, decode_id,
    decode_name, encode_id, encode_name,
};
use chatty_types::{Opcode, Status};

use crate::commands::{handle_group_input, send_group_hello};
use crate::delivery::deliver_direct;
use crate::gateway::Gateway;
use crate::presence::Role;
use crate::session::Session;

/// Handle one request frame. Returns false once the connection's writer is
/// gone and the packet loop should stop.
pub async fn dispatch(gateway: &Gateway, session: &Session, frame: Frame) -> bool {
    let Some(op) = Opcode::from_u16(frame.opcode()) else {
        return match session.role {
            Role::Command => {
                debug!(
                    user_id = session.user_id(),
                    opcode = frame.opcode(),
                    "unknown opcode"
                );
                respond(session, Err(Status::BadRequest)).await
            }
            Role::Push => {
                trace!(
                    user_id = session.user_id(),
                    opcode = frame.opcode(),
                    "ignoring frame on push connection"
                );
                true
            }
        };
    };

    let payload = frame.payload();
    match op {
        Opcode::SendMessage => send_message(gateway, session, payload).await,
        Opcode::CreateGroup => {
            let result = create_group(gateway, session, payload).await;
            respond(session, result).await
        }
        Opcode::GroupName => respond(session, group_name(gateway, payload)).await,
        Opcode::UserId => respond(session, user_id(gateway, payload)).await,
        Opcode::Username => respond(session, username(gateway, payload)).await,
        Opcode::Presence => presence(gateway, session, payload).await,
        Opcode::Register | Opcode::Login | Opcode::Subscribe => {
            debug!(user_id = session.user_id(), "handshake opcode after authentication");
            respond(session, Err(Status::BadRequest)).await
        }
    }
}

async fn respond(session: &Session, result: Result<Bytes, Status>) -> bool {
    let frame = match result {
        Ok(payload) => Frame::new(Status::Ok.code(), payload)
            .unwrap_or_else(|_| Frame::status(Status::Internal)),
        Err(status) => Frame::status(status),
    };
    session.reply(frame).await
}

fn store_error(e: anyhow::Error) -> Status {
    error!("store error: {:#}", e);
    Status::Internal
}

async fn send_message(gateway: &Gateway, session: &Session, payload: &[u8]) -> bool {
    let msg = match ChatMessage::decode(payload) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(user_id = session.user_id(), "bad message payload: {}", e);
            return respond(session, Err(Status::BadRequest)).await;
        }
    };

    let sender = &session.user;
    if msg.sender_id != sender.id {
        warn!(
            user_id = sender.id,
            claimed = msg.sender_id,
            "sender id mismatch, using session user"
        );
    }

    match msg.recipient {
        Recipient::User(recipient_id) => {
            match gateway.store().find_user_by_id(recipient_id) {
                Ok(Some(_)) => {}
                Ok(None) => return respond(session, Err(Status::NotFound)).await,
                Err(e) => return respond(session, Err(store_error(e))).await,
            }
            if !respond(session, Ok(Bytes::new())).await {
                return false;
            }

            match session.role {
                // The sender's next request waits for this delivery.
                Role::Command => {
                    deliver_direct(gateway, sender.id, recipient_id, &msg.text).await;
                }
                // This reader also carries acks, so it must not block on one.
                Role::Push => {
                    let gateway = gateway.clone();
                    let sender_id = sender.id;
                    tokio::spawn(async move {
                        deliver_direct(&gateway, sender_id, recipient_id, &msg.text).await;
                    });
                }
            }
            true
        }
        Recipient::Group(group_id) => {
            let group = match gateway.store().find_group_by_id(group_id) {
                Ok(Some(group)) => group,
                Ok(None) => return respond(session, Err(Status::NotFound)).await,
                Err(e) => return respond(session, Err(store_error(e))).await,
            };
            if !respond(session, Ok(Bytes::new())).await {
                return false;
            }

            if let Err(e) = handle_group_input(gateway, sender, &group, &msg.text).await {
                error!(group_id, user_id = sender.id, "group message failed: {:#}", e);
            }
            true
        }
    }
}

async fn create_group(
    gateway: &Gateway,
    session: &Session,
    payload: &[u8],
) -> Result<Bytes, Status> {
    let name = GroupName::decode(payload)
        .map_err(|_| Status::BadRequest)?
        .name;
    let store = gateway.store();

    if store.find_group_by_name(&name).map_err(store_error)?.is_some() {
        return Err(Status::Conflict);
    }

    let owner = store
        .find_user_by_id(session.user_id())
        .map_err(store_error)?
        .ok_or(Status::Internal)?;

    let group = store
        .create_group(&owner, &name)
        .map_err(store_error)?
        .ok_or(Status::Conflict)?;
    debug!(group_id = group.id, owner_id = owner.id, "created group {}", group.name);

    if let Err(e) = send_group_hello(gateway, owner.id, &group).await {
        error!(group_id = group.id, "group hello failed: {:#}", e);
    }

    Ok(encode_id(group.id))
}

fn group_name(gateway: &Gateway, payload: &[u8]) -> Result<Bytes, Status> {
    let id = decode_id(payload).map_err(|_| Status::BadRequest)?;
    let group = gateway
        .store()
        .find_group_by_id(id)
        .map_err(store_error)?
        .ok_or(Status::NotFound)?;
    encode_name(&group.name).map_err(|_| Status::Internal)
}

fn user_id(gateway: &Gateway, payload: &[u8]) -> Result<Bytes, Status> {
    let name = decode_name(payload).map_err(|_| Status::BadRequest)?;
    let user = gateway
        .store()
        .find_user_by_name(&name)
        .map_err(store_error)?
        .ok_or(Status::NotFound)?;
    Ok(encode_id(user.id))
}

fn username(gateway: &Gateway, payload: &[u8]) -> Result<Bytes, Status> {
    let id = decode_id(payload).map_err(|_| Status::BadRequest)?;
    let user = gateway
        .store()
        .find_user_by_id(id)
        .map_err(store_error)?
        .ok_or(Status::NotFound)?;
    encode_name(&user.username).map_err(|_| Status::Internal)
}

/// Answer 200 on this connection and push the presence list to the
/// caller's push channel.
async fn presence(gateway: &Gateway, session: &Session, payload: &[u8]) -> bool {
    let query = match PresenceQuery::decode(payload) {
        Ok(query) => query,
        Err(e) => {
            debug!(user_id = session.user_id(), "bad presence query: {}", e);
            return respond(session, Err(Status::BadRequest)).await;
        }
    };

    let mut entries = Vec::with_capacity(query.ids.len());
    for id in query.ids {
        entries.push((id, gateway.presence().is_online(id).await));
    }

    let report = PresenceReport { entries }
        .encode()
        .and_then(|payload| Frame::new(Opcode::Presence.code(), payload));
    let report = match report {
        Ok(frame) => frame,
        Err(e) => {
            debug!(user_id = session.user_id(), "presence report too large: {}", e);
            return respond(session, Err(Status::BadRequest)).await;
        }
    };

    if !respond(session, Ok(Bytes::new())).await {
        return false;
    }

    match gateway.presence().push_channel(session.user_id()).await {
        Some(push) => {
            push.outbound().try_push(report);
        }
        None => debug!(user_id = session.user_id(), "presence report dropped, no push channel"),
    }
    true
}
