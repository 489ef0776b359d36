use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::{trace, warn};
use uuid::Uuid;

use chatty_protocol::Frame;
use chatty_types::Status;

/// Which half of a user's session a connection carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Command,
    Push,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Command => f.write_str("command"),
            Role::Push => f.write_str("push"),
        }
    }
}

#[derive(Debug, Error)]
#[error("user {user_id} already has a live {role} connection")]
pub struct AlreadyBound {
    pub user_id: u64,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("push connection closed")]
    Closed,
    #[error("timed out waiting for ack")]
    TimedOut,
}

/// Sending side of one connection's outbound frame queue. The connection's
/// writer task drains the queue onto the socket in order.
#[derive(Debug, Clone)]
pub struct Outbound {
    conn_id: Uuid,
    tx: mpsc::Sender<Frame>,
}

impl Outbound {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue a frame, waiting for room. Returns false once the writer is gone.
    pub async fn send(&self, frame: Frame) -> bool {
        self.tx.send(frame).await.is_ok()
    }

    /// Queue a frame without waiting. Drops the frame if the queue is full.
    pub fn try_push(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.conn_id, "outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// A user's push channel: the outbound queue plus the single-slot ack
/// rendezvous used by direct deliveries.
#[derive(Debug, Clone)]
pub struct PushChannel {
    outbound: Outbound,
    ack: Arc<AckSlot>,
}

#[derive(Debug, Default)]
struct AckSlot {
    pending: Mutex<AckState>,
    /// Held for the whole send-then-ack exchange so at most one direct
    /// delivery per recipient is waiting on an ack.
    delivery: tokio::sync::Mutex<()>,
}

#[derive(Debug, Default)]
struct AckState {
    waiter: Option<oneshot::Sender<Status>>,
    closed: bool,
}

impl PushChannel {
    pub fn new(outbound: Outbound) -> Self {
        Self {
            outbound,
            ack: Arc::new(AckSlot::default()),
        }
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn conn_id(&self) -> Uuid {
        self.outbound.conn_id()
    }

    /// Queue `frame` and wait for the client's ack on this push connection.
    ///
    /// `limit` bounds the whole exchange: waiting behind another delivery,
    /// waiting for room in a full queue, and waiting for the ack.
    pub async fn deliver(&self, frame: Frame, limit: Duration) -> Result<Status, DeliveryError> {
        let deadline = Instant::now() + limit;
        let Ok(_turn) = timeout_at(deadline, self.ack.delivery.lock()).await else {
            return Err(DeliveryError::TimedOut);
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state();
            if state.closed {
                return Err(DeliveryError::Closed);
            }
            state.waiter = Some(tx);
        }

        let exchange = async {
            if !self.outbound.send(frame).await {
                return Err(DeliveryError::Closed);
            }
            rx.await.map_err(|_| DeliveryError::Closed)
        };
        let result = timeout_at(deadline, exchange)
            .await
            .unwrap_or(Err(DeliveryError::TimedOut));

        // The turn is still held, so a leftover waiter is this delivery's.
        if result.is_err() {
            self.state().waiter.take();
        }
        result
    }

    /// Hand an ack read from the socket to the waiting delivery. Returns
    /// false if nothing was waiting.
    pub fn complete_ack(&self, status: Status) -> bool {
        let waiter = self.state().waiter.take();
        match waiter {
            Some(tx) => tx.send(status).is_ok(),
            None => {
                trace!(conn_id = %self.conn_id(), %status, "ack with no pending delivery");
                false
            }
        }
    }

    /// Fail the pending delivery and refuse new ones. Called at teardown.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        state.waiter = None;
    }

    fn state(&self) -> std::sync::MutexGuard<'_, AckState> {
        self.ack.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Both halves of one user's live session. Each half has its own lifecycle.
#[derive(Debug, Default)]
struct UserSession {
    command: Option<Outbound>,
    push: Option<PushChannel>,
}

impl UserSession {
    fn is_empty(&self) -> bool {
        self.command.is_none() && self.push.is_none()
    }
}

/// Directory of live channels keyed by user ID. Every operation takes the
/// lock once, so bind is a single check-and-insert and unbind never races a
/// newer bind for the same user.
#[derive(Clone, Default)]
pub struct Presence {
    sessions: Arc<RwLock<HashMap<u64, UserSession>>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bind_command(&self, user_id: u64, outbound: Outbound) -> Result<(), AlreadyBound> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id).or_default();
        if session.command.is_some() {
            return Err(AlreadyBound {
                user_id,
                role: Role::Command,
            });
        }
        session.command = Some(outbound);
        Ok(())
    }

    pub async fn bind_push(&self, user_id: u64, push: PushChannel) -> Result<(), AlreadyBound> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id).or_default();
        if session.push.is_some() {
            return Err(AlreadyBound {
                user_id,
                role: Role::Push,
            });
        }
        session.push = Some(push);
        Ok(())
    }

    /// Remove a binding, but only if `conn_id` still owns it.
    pub async fn unbind(&self, user_id: u64, role: Role, conn_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&user_id) else {
            return false;
        };

        let removed = match role {
            Role::Command => take_if_owned(&mut session.command, |o| o.conn_id() == conn_id),
            Role::Push => take_if_owned(&mut session.push, |p| p.conn_id() == conn_id),
        };

        if session.is_empty() {
            sessions.remove(&user_id);
        }
        removed
    }

    pub async fn push_channel(&self, user_id: u64) -> Option<PushChannel> {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .and_then(|s| s.push.clone())
    }

    /// A user is online while their push channel is bound.
    pub async fn is_online(&self, user_id: u64) -> bool {
        self.is_bound(user_id, Role::Push).await
    }

    pub async fn is_bound(&self, user_id: u64, role: Role) -> bool {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .is_some_and(|s| match role {
                Role::Command => s.command.is_some(),
                Role::Push => s.push.is_some(),
            })
    }

    /// Number of users with at least one live channel.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn take_if_owned<T>(slot: &mut Option<T>, owned: impl Fn(&T) -> bool) -> bool {
    if slot.as_ref().is_some_and(owned) {
        *slot = None;
        true
    } else {
        false
    }
}
