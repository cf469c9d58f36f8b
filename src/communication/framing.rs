//! Wire framing: splitting incoming bytes on a device terminator and
//! assembling the bytes written back.

use async_stream::stream;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 1024;

/// Bytes written for one handled line: the response and terminator when
/// there is a response, followed by the device ack.
pub fn frame_response(response: Option<&str>, terminator: &[u8], ack: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(response.map_or(0, str::len) + terminator.len() + ack.len());
    if let Some(response) = response {
        out.extend_from_slice(response.as_bytes());
        out.extend_from_slice(terminator);
    }
    out.extend_from_slice(ack);
    out
}

/// Largest unterminated frame buffered before the stream gives up.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Splits `reader` into terminator-delimited lines.
///
/// The terminator itself is stripped. A partial frame still buffered at EOF
/// is discarded. Once more than [`MAX_FRAME_LEN`] bytes arrive without a
/// terminator the stream yields an `InvalidData` error and ends.
pub fn read_frames<R>(mut reader: R, terminator: &'static [u8]) -> impl Stream<Item = std::io::Result<String>> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream! {
        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        // bytes of `buf` already known not to start a terminator
        let mut scanned = 0usize;
        loop {
            while let Some(pos) = find_terminator(&buf, terminator, scanned) {
                let frame: Vec<u8> = buf.drain(..pos + terminator.len()).take(pos).collect();
                scanned = 0;
                yield Ok(String::from_utf8_lossy(&frame).trim().to_string());
            }
            scanned = buf.len().saturating_sub(terminator.len().saturating_sub(1));
            if buf.len() > MAX_FRAME_LEN {
                tracing::warn!(bytes = buf.len(), "frame exceeds limit without terminator");
                yield Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("frame exceeds {MAX_FRAME_LEN} bytes without a terminator"),
                ));
                break;
            }
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    if !buf.is_empty() {
                        tracing::trace!(bytes = buf.len(), "discarding unterminated frame at EOF");
                    }
                    break;
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

/// Offset of the first terminator in `buf` starting at or after `from`.
fn find_terminator(buf: &[u8], terminator: &[u8], from: usize) -> Option<usize> {
    if terminator.is_empty() || buf.len() < from + terminator.len() {
        return None;
    }
    buf[from..]
        .windows(terminator.len())
        .position(|window| window == terminator)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_frame_with_response() {
        assert_eq!(frame_response(Some("T:0 C:0"), b"\r\n\r\n", b"ok\r\nok\r\n"), b"T:0 C:0\r\n\r\nok\r\nok\r\n");
    }

    #[test]
    fn test_frame_without_response() {
        assert_eq!(frame_response(None, b"\r\n\r\n", b"ok\r\nok\r\n"), b"ok\r\nok\r\n");
        assert!(frame_response(None, b"\n", b"").is_empty());
    }

    #[test]
    fn test_find_terminator() {
        assert_eq!(find_terminator(b"M105\r\n\r\n", b"\r\n\r\n", 0), Some(4));
        assert_eq!(find_terminator(b"M105\r\n", b"\r\n\r\n", 0), None);
        assert_eq!(find_terminator(b"", b"\n", 0), None);
    }

    #[test]
    fn test_find_terminator_resumes_from_offset() {
        assert_eq!(find_terminator(b"M1\nM2\n", b"\n", 3), Some(5));
        assert_eq!(find_terminator(b"M1\nM2", b"\n", 3), None);
        assert_eq!(find_terminator(b"M1\n", b"\n", 4), None);
    }

    #[tokio::test]
    async fn test_read_frames_splits_on_terminator() {
        let reader = tokio_test::io::Builder::new()
            .read(b"M105\r\n\r")
            .read(b"\nM104 S40\r\n\r\nM1")
            .build();
        let frames: Vec<String> = read_frames(reader, b"\r\n\r\n")
            .map(|frame| frame.unwrap())
            .collect()
            .await;
        assert_eq!(frames, vec!["M105".to_string(), "M104 S40".to_string()]);
    }

    #[tokio::test]
    async fn test_read_frames_single_byte_terminator() {
        let reader = tokio_test::io::Builder::new().read(b"M105\nM123\n").build();
        let frames: Vec<String> = read_frames(reader, b"\n").map(|frame| frame.unwrap()).collect().await;
        assert_eq!(frames, vec!["M105".to_string(), "M123".to_string()]);
    }

    #[tokio::test]
    async fn test_terminator_straddling_read_chunks() {
        let mut input = vec![b'G'; READ_CHUNK - 2];
        input.extend_from_slice(b"\r\n\r\nM105\r\n\r\n");
        let reader = tokio_test::io::Builder::new().read(&input).build();
        let frames: Vec<String> = read_frames(reader, b"\r\n\r\n").map(|frame| frame.unwrap()).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), READ_CHUNK - 2);
        assert_eq!(frames[1], "M105");
    }

    #[tokio::test]
    async fn test_frame_at_limit_is_accepted() {
        let mut input = vec![b'A'; MAX_FRAME_LEN];
        input.push(b'\n');
        let reader = tokio_test::io::Builder::new().read(&input).build();
        let frames: Vec<String> = read_frames(reader, b"\n").map(|frame| frame.unwrap()).collect().await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), MAX_FRAME_LEN);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let reader = tokio_test::io::Builder::new().read(&vec![b'A'; MAX_FRAME_LEN + 1]).build();
        let frames: Vec<std::io::Result<String>> = read_frames(reader, b"\n").collect().await;
        assert_eq!(frames.len(), 1);
        let err = frames.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
