use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::{io::AsyncReadExt, io::AsyncWriteExt, io::BufWriter, net::TcpStream};

use super::{FrameError, Message};

const LEN_PREFIX: usize = std::mem::size_of::<u16>();

pub fn from_socket(socket: TcpStream) -> (ConnectionTx, ConnectionRx) {
    let (read_stream, write_stream) = socket.into_split();

    (
        ConnectionTx {
            write_stream: BufWriter::new(write_stream),
        },
        ConnectionRx {
            read_stream,
            buffer: BytesMut::with_capacity(64),
        },
    )
}

#[derive(Debug)]
pub struct ConnectionTx {
    write_stream: BufWriter<OwnedWriteHalf>,
}

#[derive(Debug)]
pub struct ConnectionRx {
    read_stream: OwnedReadHalf,
    buffer: BytesMut,
}

impl ConnectionTx {
    pub async fn write_frame(&mut self, frame: Message) -> Result<(), FrameError> {
        let mut bytes: Bytes = encode(&frame)?.into();
        let len = (bytes.len() as u16).to_be_bytes();
        self.write_stream.write_all(&len).await?;
        self.write_stream.write_buf(&mut bytes).await?;
        self.write_stream.flush().await?;
        Ok(())
    }
}

impl ConnectionRx {
    /// Reads the next message, or `None` once the remote closed the connection cleanly.
    pub async fn read_frame(&mut self) -> Result<Option<Message>, FrameError> {
        loop {
            if let Some(frame) = parse_frame(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            if self.read_stream.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    // Remote closed Connection
                    return Ok(None);
                } else {
                    tracing::debug!(
                        buffered = self.buffer.len(),
                        "Connection closed while still sending data"
                    );
                    return Err(FrameError::ConnectionReset);
                }
            }
        }
    }
}

fn encode(frame: &Message) -> Result<Vec<u8>, FrameError> {
    let bytes = bincode::serialize(frame)?;
    if bytes.len() > u16::MAX.into() {
        tracing::warn!(len = bytes.len(), "Refusing to send oversized frame");
        return Err(FrameError::FrameLength);
    }
    Ok(bytes)
}

/// Pulls one complete frame off the front of `buffer`, leaving any partial frame in place.
fn parse_frame(buffer: &mut BytesMut) -> Result<Option<Message>, FrameError> {
    if buffer.len() < LEN_PREFIX {
        return Ok(None);
    }

    // Use a Cursor to avoid advancing the buffer before we know the whole frame is here
    let message_len = usize::from(Cursor::new(&buffer[..]).get_u16());
    if buffer.len() < message_len + LEN_PREFIX {
        return Ok(None);
    }

    buffer.advance(LEN_PREFIX);
    let frame = buffer.split_to(message_len);
    let message = bincode::deserialize::<Message>(&frame)?;
    Ok(Some(message))
}
