//! Transport-agnostic message exchange contract.
//! 与传输无关的消息交换契约。
//!
//! An exchange is a two-phase conversation: one side writes an outgoing
//! message, then reads the reply. The initiating side drives an
//! [`ExchangeWriter`] and turns it into a reader once the message is complete;
//! the responding side is handed an [`ExchangeReader`] whose paired writer
//! carries the reply.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::Result;

/// Writing half of an exchange initiated by the local side.
/// 由本地发起的交换的写入端。
#[async_trait]
pub trait ExchangeWriter: AsyncWrite + Send + Unpin {
    /// Reader over the reply
    type Reader: AsyncRead + Send + Unpin;

    /// Finishes the outgoing message and returns a reader over the reply.
    ///
    /// Consumes the writer: once the message is sent nothing more can be
    /// written to it, and the transition cannot happen twice.
    async fn into_reader(self) -> Result<Self::Reader>;
}

/// Produces fresh writers, one per exchange attempt.
pub trait ExchangeWriterSource: Send + Sync {
    /// Writer type handed out by this source
    type Writer: ExchangeWriter;

    /// Returns a new writer bound to this source
    fn new_writer(&self) -> Result<Self::Writer>;
}

/// Reading half of an exchange initiated by the remote side.
/// 由远端发起的交换的读取端。
pub trait ExchangeReader: AsyncRead + Send + Unpin {
    /// Writer for the reply, paired with this reader
    fn writer(&mut self) -> Result<&mut (dyn AsyncWrite + Send + Unpin)>;
}

/// Consumes inbound exchanges.
///
/// Returning an error signals that the inbound message could not be read or
/// processed. Implementations should fail before writing a reply.
#[async_trait]
pub trait ExchangeResponder: Send + Sync {
    /// Processes one inbound exchange
    async fn take_reader(&self, reader: &mut dyn ExchangeReader) -> Result<()>;
}
