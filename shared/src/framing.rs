//! Exact-size reads and writes over any async byte stream

use crate::error::NetError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads exactly `N` bytes, looping over short reads. EOF mid-frame is a transport error.
pub async fn read_frame<R, const N: usize>(reader: &mut R) -> Result<[u8; N], NetError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Reads exactly `len` bytes into a fresh buffer.
pub async fn read_exact_vec<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_partial_reads_are_joined() {
        let mut stream = Builder::new()
            .read(&[0b010_00_000])
            .read(&[0b01_00001_0, 0])
            .read(&[0])
            .build();

        let frame: [u8; 4] = read_frame(&mut stream).await.unwrap();
        assert_eq!(frame, [0b010_00_000, 0b01_00001_0, 0, 0]);
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_disconnect() {
        let mut stream: &[u8] = &[0xE0, 0];
        let err = read_frame::<_, 4>(&mut stream).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_snapshot_read_across_chunks() {
        let mut stream = Builder::new()
            .read(&[1, 2, 3])
            .read(&[4, 5])
            .read(&[6, 7, 8])
            .build();
        let bytes = read_exact_vec(&mut stream, 8).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_write_frame() {
        let mut stream = Builder::new().write(&[0xE0, 0, 0, 0]).build();
        write_frame(&mut stream, &[0xE0, 0, 0, 0]).await.unwrap();
    }
}
