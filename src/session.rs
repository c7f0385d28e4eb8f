//! Per-connection session: one JSON document per line in each direction.
//!
//! ```text
//!   client ──JoinRequest──► session ── World::join ──► PlayerSession
//!   client ◄──ClientEvent── sender task   ◄── QueuedClient queue ◄── tick
//!   client ──Serverbound──► receiver task ──► Inputs mailbox ──► tick
//! ```
//!
//! Whichever task ends first ends the connection; dropping the
//! `PlayerSession` then removes the player from the world. The sender also
//! ends the connection when the outbound queue overflows, since the world
//! has recorded the dropped events as delivered.

use anyhow::{bail, Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{handle_serverbound, QueuedClient};
use crate::entity::{Inputs, PlayerProfile};
use crate::protocol::{ClientEvent, JoinRequest, ServerboundEvent};
use crate::viewer::Client;
use crate::world::World;

/// How long a faulted connection is given to take its final line.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Serialise one event as a JSON line.
pub fn encode_line<T: serde::Serialize>(event: &T) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(128).writer();
    serde_json::to_writer(&mut buf, event).context("encoding event")?;
    let mut buf = buf.into_inner();
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

/// Build the profile a join request asks for. Offline mode: the name is
/// trusted, and a missing UUID is derived from it.
pub fn profile_for(request: JoinRequest) -> PlayerProfile {
    match request.uuid {
        Some(uuid) => PlayerProfile::new(request.name, uuid),
        None => PlayerProfile::offline(request.name),
    }
}

pub async fn serve(world: World, stream: TcpStream, peer: SocketAddr) -> Result<()> {
    stream.set_nodelay(true).ok();
    let (read, write) = stream.into_split();
    run(world, read, write, peer).await
}

/// Drive one connection over any byte stream pair.
pub async fn run<R, W>(world: World, read: R, write: W, peer: SocketAddr) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(read).lines();
    let first = lines
        .next_line()
        .await
        .context("reading join request")?
        .context("connection closed before join")?;
    let request: JoinRequest =
        serde_json::from_str(first.trim()).context("malformed join request")?;
    if request.name.is_empty() {
        bail!("join request from {peer} has an empty name");
    }

    let capacity = world.config().outbound_queue_capacity;
    let (client, outbound) = QueuedClient::new(&request.name, capacity);
    let sink: Arc<dyn Client> = client.clone();
    let session = world
        .join(profile_for(request), sink)
        .context("joining world")?;
    info!(%peer, viewer = %session.viewer(), name = client.name(), "session started");

    let inputs = Arc::clone(session.inputs());
    let mut sender = tokio::spawn(send_events(Arc::clone(&client), outbound, write));
    let mut receiver = tokio::spawn(async move { receive_events(&mut lines, &inputs).await });

    let outcome = tokio::select! {
        res = &mut sender => {
            receiver.abort();
            res
        }
        res = &mut receiver => {
            sender.abort();
            res
        }
    };
    drop(session);

    match outcome {
        Ok(Ok(())) => {
            info!(%peer, "session ended");
            Ok(())
        }
        Ok(Err(e)) => {
            warn!(%peer, error = %e, "session ended with error");
            Err(e)
        }
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(e).context("session task failed"),
    }
}

async fn send_events<W>(
    client: Arc<QueuedClient>,
    mut outbound: mpsc::Receiver<ClientEvent>,
    mut write: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = client.faulted() => return close_overflowed(&client, &mut write).await,
            event = outbound.recv() => event,
        };
        let Some(event) = event else { break };

        let line = encode_line(&event)?;
        let last = matches!(event, ClientEvent::Disconnect { .. });
        // Batch whatever else is already queued before flushing.
        let flush = last || outbound.is_empty();
        tokio::select! {
            biased;
            _ = client.faulted() => {
                // The peer is not reading; a half-written line cannot be
                // followed by anything useful.
                bail!("outbound queue of {} overflowed while writing", client.name());
            }
            res = write_line(&mut write, &line, flush) => res?,
        }

        if let ClientEvent::Disconnect { reason } = &event {
            debug!(%reason, "disconnect sent");
            break;
        }
    }
    write.shutdown().await.ok();
    Ok(())
}

async fn write_line<W>(write: &mut W, line: &[u8], flush: bool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write.write_all(line).await.context("writing event")?;
    if flush {
        write.flush().await.context("flushing events")?;
    }
    Ok(())
}

/// The queue overflowed between two lines. Tell the peer why it is being
/// dropped if the world had already decided to, then end the connection.
async fn close_overflowed<W>(client: &QueuedClient, write: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if let Some(reason) = client.disconnect_reason() {
        let line = encode_line(&ClientEvent::Disconnect { reason })?;
        let delivered = tokio::time::timeout(DISCONNECT_GRACE, write_line(write, &line, true)).await;
        if !matches!(delivered, Ok(Ok(()))) {
            debug!(client = client.name(), "disconnect not delivered");
        }
    }
    tokio::time::timeout(DISCONNECT_GRACE, write.shutdown()).await.ok();
    bail!(
        "outbound queue of {} overflowed ({} events dropped)",
        client.name(),
        client.dropped()
    )
}

async fn receive_events<R>(
    lines: &mut tokio::io::Lines<BufReader<R>>,
    inputs: &Inputs,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next_line().await.context("reading packet")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: ServerboundEvent = serde_json::from_str(line).context("malformed packet")?;
        handle_serverbound(inputs, event);
    }
    debug!("peer closed connection");
    Ok(())
}
