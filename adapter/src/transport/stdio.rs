//! Newline-delimited transport

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mcp_common::Message;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use super::{Transport, TransportError};

/// One compact JSON message per `\n`-terminated line
pub struct LineTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<Option<W>>,
    closed: AtomicBool,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
        }
    }
}

impl LineTransport<tokio::io::Stdin, tokio::io::Stdout> {
    /// Our own stdin/stdout
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl LineTransport<ChildStdout, ChildStdin> {
    /// Read from a child's stdout, write to its stdin
    pub fn for_child(stdout: ChildStdout, stdin: ChildStdin) -> Self {
        Self::new(stdout, stdin)
    }
}

#[async_trait]
impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let frame = message.to_frame().map_err(TransportError::Encode)?;

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Message, TransportError> {
        let mut reader = self.reader.lock().await;
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                return Err(TransportError::Closed);
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Message::from_frame(&line).map_err(TransportError::Decode);
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Dropping the writer closes pipe ends such as a child's stdin
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}
