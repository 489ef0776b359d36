//! Outbound message paths.
//!
//! A direct message is queued on the recipient's push channel and the caller
//! waits for the client's ack. Group traffic and system notices are
//! fire-and-forget: they are queued without waiting and dropped if the
//! recipient is offline or its queue is full.

use tracing::{debug, warn};

use chatty_protocol::{ChatMessage, Frame, Recipient};
use chatty_types::{Opcode, Status, SYSTEM_USER_ID};

use crate::gateway::Gateway;
use crate::presence::DeliveryError;

/// Outcome of a direct delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The recipient's client answered with this status.
    Acknowledged(Status),
    /// No push channel is bound for the recipient.
    Offline,
    /// The ack did not arrive within the configured timeout.
    TimedOut,
    /// The push connection closed before acking.
    Dropped,
}

/// Build an opcode-1 push frame.
pub fn message_frame(sender_id: u64, recipient: Recipient, text: &str) -> Option<Frame> {
    let msg = ChatMessage {
        sender_id,
        recipient,
        text: text.to_string(),
    };
    let payload = match msg.encode() {
        Ok(payload) => payload,
        Err(e) => {
            warn!("cannot encode push for {:?}: {}", recipient, e);
            return None;
        }
    };
    match Frame::new(Opcode::SendMessage.code(), payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("cannot frame push for {:?}: {}", recipient, e);
            None
        }
    }
}

/// Push a direct message to `recipient_id` and wait for their ack.
pub async fn deliver_direct(
    gateway: &Gateway,
    sender_id: u64,
    recipient_id: u64,
    text: &str,
) -> Delivery {
    let Some(push) = gateway.presence().push_channel(recipient_id).await else {
        debug!(sender_id, recipient_id, "direct message to offline user dropped");
        return Delivery::Offline;
    };

    let Some(frame) = message_frame(sender_id, Recipient::User(recipient_id), text) else {
        return Delivery::Dropped;
    };

    let outcome = match push.deliver(frame, gateway.config().ack_timeout).await {
        Ok(status) => Delivery::Acknowledged(status),
        Err(DeliveryError::TimedOut) => Delivery::TimedOut,
        Err(DeliveryError::Closed) => Delivery::Dropped,
    };

    match outcome {
        Delivery::Acknowledged(Status::Ok) => {
            debug!(sender_id, recipient_id, len = text.len(), "direct message delivered");
        }
        Delivery::Acknowledged(status) => {
            warn!(sender_id, recipient_id, %status, "recipient rejected direct message");
        }
        Delivery::TimedOut => {
            warn!(sender_id, recipient_id, "no ack for direct message");
        }
        Delivery::Dropped | Delivery::Offline => {
            debug!(sender_id, recipient_id, "push channel closed before ack");
        }
    }
    outcome
}

/// Push `text` from `sender_id` to every current member of the group.
/// Returns how many members it was queued for.
pub async fn broadcast(
    gateway: &Gateway,
    group_id: u64,
    sender_id: u64,
    text: &str,
) -> anyhow::Result<usize> {
    let members = gateway.store().list_group_members(group_id)?;
    let Some(frame) = message_frame(sender_id, Recipient::Group(group_id), text) else {
        return Ok(0);
    };

    let mut queued = 0;
    for member in &members {
        if let Some(push) = gateway.presence().push_channel(member.user_id).await {
            if push.outbound().try_push(frame.clone()) {
                queued += 1;
            }
        }
    }

    debug!(
        group_id,
        sender_id,
        members = members.len(),
        queued,
        "group broadcast"
    );
    Ok(queued)
}

/// Send a system notice in a group's thread to one user only.
pub async fn notify(gateway: &Gateway, user_id: u64, group_id: u64, text: &str) -> bool {
    let Some(push) = gateway.presence().push_channel(user_id).await else {
        debug!(user_id, group_id, "notice for offline user dropped");
        return false;
    };
    let Some(frame) = message_frame(SYSTEM_USER_ID, Recipient::Group(group_id), text) else {
        return false;
    };
    push.outbound().try_push(frame)
}
