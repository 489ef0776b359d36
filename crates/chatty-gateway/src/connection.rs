use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use chatty_protocol::{CodecError, Frame, read_frame_within, write_frame};
use chatty_types::Status;

use crate::gateway::Gateway;
use crate::presence::Outbound;
use crate::router;
use crate::session::{self, Session};

/// Capacity of each connection's outbound frame queue.
const OUTBOUND_CAPACITY: usize = 256;

/// How long teardown waits for queued frames to reach the socket.
const WRITER_DRAIN: Duration = Duration::from_secs(5);

/// Drive one accepted connection from handshake to teardown.
pub async fn handle_connection(gateway: Gateway, stream: TcpStream, peer: SocketAddr) {
    let sock_ref = socket2::SockRef::from(&stream);
    if let Err(e) = sock_ref.set_nodelay(true) {
        warn!(%peer, "failed to set TCP_NODELAY: {}", e);
    }

    let (mut reader, mut writer) = stream.into_split();

    // Writer task: drains the queue onto the socket in order.
    let (tx, mut rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);
    let mut write_handle = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                debug!("write failed: {}", e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let outbound = Outbound::new(tx);
    debug!(%peer, conn_id = %outbound.conn_id(), "connection accepted");

    if let Some(session) = session::handshake(&gateway, &mut reader, &outbound, peer).await {
        packet_loop(&gateway, &mut reader, &session).await;
        teardown(&gateway, &session).await;
    }

    // The writer stops once every queue handle is gone.
    drop(outbound);
    if tokio::time::timeout(WRITER_DRAIN, &mut write_handle)
        .await
        .is_err()
    {
        write_handle.abort();
    }
    debug!(%peer, "connection closed");
}

async fn packet_loop<R>(gateway: &Gateway, reader: &mut R, session: &Session)
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match read_frame_within(reader, gateway.config().idle_timeout).await {
            Ok(frame) => frame,
            Err(CodecError::Timeout) => {
                info!(user_id = session.user_id(), "idle timeout");
                return;
            }
            // EOF or reset: clean disconnect
            Err(e) => {
                debug!(user_id = session.user_id(), "read ended: {}", e);
                return;
            }
        };

        if let Some(push) = &session.push {
            if let Some(status) = Status::from_u16(frame.opcode()) {
                if status.is_delivery_ack() {
                    push.complete_ack(status);
                } else {
                    trace!(user_id = session.user_id(), %status, "ignoring status on push connection");
                }
                continue;
            }
        }

        if !router::dispatch(gateway, session, frame).await {
            return;
        }
    }
}

async fn teardown(gateway: &Gateway, session: &Session) {
    let conn_id = session.outbound.conn_id();
    let removed = gateway
        .presence()
        .unbind(session.user_id(), session.role, conn_id)
        .await;

    // Fail any delivery still waiting on this push connection.
    if let Some(push) = &session.push {
        push.close();
    }

    info!(
        user_id = session.user_id(),
        %conn_id,
        removed,
        "{} disconnected from {} connection",
        session.user.username,
        session.role
    );
}
