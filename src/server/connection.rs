//! Per-connection plumbing: framed stream I/O and the outbox writer task

use crate::protocol::{frame_message, serialize, ServerMessage, MAX_MESSAGE_SIZE};
use anyhow::{anyhow, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

/// Read a length-prefixed message from a stream.
///
/// Returns `None` on a clean EOF at a frame boundary (client disconnected).
pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];

    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes", len));
    }

    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer).await?;

    Ok(Some(buffer))
}

/// Write a length-prefixed message to a stream
pub async fn write_message<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let framed = frame_message(payload);
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

/// Drain a connection's outbox onto the wire.
///
/// Ends when the outbox closes or the socket refuses a write; either way
/// the reader side notices the disconnect and runs teardown.
pub async fn client_writer_task(
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = outbox.recv().await {
        match serialize(&msg) {
            Ok(payload) => {
                if let Err(e) = write_message(&mut writer, &payload).await {
                    tracing::debug!("Failed to write message to client: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
            }
        }
    }

    tracing::debug!("Client writer task finished");
}
