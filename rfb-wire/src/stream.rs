//! Buffered wire streams for RFB traffic.
//!
//! [`WireReader`] and [`WireWriter`] wrap a tokio reader/writer with a
//! [`BytesMut`] buffer and typed accessors for the primitives the protocol
//! is built from. Reads refill the buffer on demand; writes accumulate
//! until [`WireWriter::flush`] pushes everything to the peer in one go.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const BUFFER_CAPACITY: usize = 8192;

/// Buffered reader of big-endian RFB primitives.
pub struct WireReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(BUFFER_CAPACITY),
        }
    }

    /// Refill the buffer until at least `n` bytes are available.
    ///
    /// EOF before `n` bytes surfaces as `UnexpectedEof`: the peer hung up
    /// mid-message and the session cannot continue.
    async fn fill(&mut self, n: usize) -> std::io::Result<()> {
        while self.buf.len() < n {
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("peer closed mid-message: wanted {} bytes, had {}", n, self.buf.len()),
                ));
            }
        }
        Ok(())
    }

    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        self.fill(1).await?;
        Ok(self.buf.get_u8())
    }

    pub async fn read_u16(&mut self) -> std::io::Result<u16> {
        self.fill(2).await?;
        Ok(self.buf.get_u16())
    }

    pub async fn read_u32(&mut self) -> std::io::Result<u32> {
        self.fill(4).await?;
        Ok(self.buf.get_u32())
    }

    pub async fn read_i32(&mut self) -> std::io::Result<i32> {
        self.fill(4).await?;
        Ok(self.buf.get_i32())
    }

    /// Read exactly `out.len()` bytes.
    pub async fn read_exact(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        self.fill(out.len()).await?;
        self.buf.copy_to_slice(out);
        Ok(())
    }

    /// Read `n` bytes into a fresh vector.
    pub async fn read_vec(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut out = vec![0u8; n];
        self.read_exact(&mut out).await?;
        Ok(out)
    }

    /// Discard `n` bytes (padding, unwanted message bodies).
    pub async fn skip(&mut self, n: usize) -> std::io::Result<()> {
        self.fill(n).await?;
        self.buf.advance(n);
        Ok(())
    }
}

/// Buffered writer of big-endian RFB primitives.
///
/// Nothing reaches the peer until [`flush`](Self::flush) is called; a
/// message is assembled in full and sent as one write.
pub struct WireWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(BUFFER_CAPACITY),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Send all buffered bytes and flush the underlying writer.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf).await?;
            self.buf.clear();
        }
        self.inner.flush().await
    }
}
