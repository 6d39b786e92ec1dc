//! One-way byte channels carrying a single block from a worker.
//!
//! A block travels as `4 * len` bytes, each value in little-endian IEEE-754
//! binary32. The channel carries exactly one block and is then closed, so no
//! framing is needed: the reader knows the expected size from the partition.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

use crate::error::TransferError;

/// Buffer size of an in-memory pipe, matching a default Linux pipe.
pub const PIPE_CAPACITY: usize = 64 * 1024;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Write endpoint of an in-memory pipe.
#[derive(Debug)]
pub struct Sender {
    inner: DuplexStream,
}

/// Read endpoint owned by the coordinator.
pub struct Receiver {
    inner: Box<dyn AsyncRead + Send + Unpin>,
}

/// Creates an in-memory pipe that buffers at most `capacity` bytes.
///
/// Writes beyond the capacity wait for the reader, so both sides see
/// partial transfers just like an OS pipe.
pub fn pipe(capacity: usize) -> (Sender, Receiver) {
    let (tx, rx) = tokio::io::duplex(capacity);
    (Sender { inner: tx }, Receiver::new(rx))
}

impl AsyncWrite for Sender {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Receiver {
    /// Wraps any byte stream, e.g. a child's stdout.
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    /// Reads one block of `len` values and checks the channel is then closed.
    pub async fn recv_block(mut self, len: usize) -> Result<Vec<f32>, TransferError> {
        let expected = len * F32_BYTES;
        let mut buf = vec![0u8; expected];
        read_exact_or_eof(&mut self.inner, &mut buf).await?;

        let mut probe = [0u8; 1];
        if self.inner.read(&mut probe).await? != 0 {
            return Err(TransferError::Trailing { expected });
        }

        Ok(decode_block(&buf))
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

/// Fills `buf` completely, looping over partial reads.
///
/// End of stream before `buf` is full is reported as
/// [`TransferError::Short`] with the number of bytes that did arrive.
pub async fn read_exact_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut received = 0;
    while received < buf.len() {
        let n = reader.read(&mut buf[received..]).await?;
        if n == 0 {
            return Err(TransferError::Short {
                expected: buf.len(),
                received,
            });
        }
        received += n;
    }
    Ok(())
}

/// Writes a whole block, then shuts down the write side.
pub async fn send_block<W>(writer: &mut W, block: &[f32]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&encode_block(block)).await?;
    writer.flush().await?;
    writer.shutdown().await
}

pub fn encode_block(block: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(block.len() * F32_BYTES);
    for value in block {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes little-endian `f32` values. Trailing bytes short of a full value are ignored.
pub fn decode_block(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_preserves_bits() {
        let values = [
            0.0,
            -0.0,
            1.5,
            f32::MIN_POSITIVE,
            f32::MAX,
            f32::INFINITY,
            f32::from_bits(0x7fc0_1234),
            1.0e-42,
        ];
        let decoded = decode_block(&encode_block(&values));
        let bits: Vec<u32> = decoded.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_encode_is_little_endian() {
        assert_eq!(encode_block(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[tokio::test]
    async fn test_block_larger_than_pipe() {
        let block: Vec<f32> = (0..10_000).map(|i| i as f32 * 0.25).collect();
        let (mut tx, rx) = pipe(1024);

        let expected = block.clone();
        let writer = tokio::spawn(async move { send_block(&mut tx, &block).await });

        let received = rx.recv_block(expected.len()).await.unwrap();
        writer.await.unwrap().unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_empty_block() {
        let (mut tx, rx) = pipe(16);
        send_block(&mut tx, &[]).await.unwrap();
        assert!(rx.recv_block(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_transfer() {
        let (mut tx, rx) = pipe(64);
        tx.write_all(&encode_block(&[1.0, 2.0])).await.unwrap();
        drop(tx);

        match rx.recv_block(3).await {
            Err(TransferError::Short { expected, received }) => {
                assert_eq!(expected, 12);
                assert_eq!(received, 8);
            }
            other => panic!("expected short transfer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_trailing_bytes() {
        let (mut tx, rx) = pipe(64);
        tx.write_all(&encode_block(&[1.0, 2.0, 3.0])).await.unwrap();
        drop(tx);

        assert!(matches!(
            rx.recv_block(2).await,
            Err(TransferError::Trailing { expected: 8 })
        ));
    }

    #[tokio::test]
    async fn test_read_exact_across_partial_reads() {
        let (mut tx, mut rx) = tokio::io::duplex(3);
        let writer = tokio::spawn(async move { tx.write_all(&[1, 2, 3, 4, 5, 6, 7]).await });

        let mut buf = [0u8; 7];
        read_exact_or_eof(&mut rx, &mut buf).await.unwrap();
        writer.await.unwrap().unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7]);
    }
}
