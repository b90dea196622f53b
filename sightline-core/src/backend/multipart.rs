//! Multipart JPEG framing.
//!
//! Each part is a run of header lines, one of which carries
//! `Content-Length`, followed by one separator line and exactly that many
//! payload bytes. Boundary lines and other headers are skipped while
//! searching for the length.

use bytes::{Buf, Bytes, BytesMut};

use super::BackendError;

/// Header lines read without finding a content length before giving up.
pub const MAX_HEADER_LINES: usize = 100;

/// Longest header line accepted before the stream is treated as garbage.
pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Headers,
    Separator(usize),
    Payload(usize),
}

/// Incremental decoder for a multipart JPEG byte stream.
///
/// Bytes are appended with [`extend`](Self::extend) as they arrive and whole
/// frames are pulled out with [`next_frame`](Self::next_frame).
#[derive(Debug)]
pub struct MultipartDecoder {
    buffer: BytesMut,
    state: DecodeState,
    header_lines: usize,
    max_frame_bytes: usize,
}

impl MultipartDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: DecodeState::Headers,
            header_lines: 0,
            max_frame_bytes,
        }
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the next complete frame, or `None` if more bytes are needed.
    ///
    /// # Errors
    /// - `BackendError::MissingContentLength` - Too many header lines without a length
    /// - `BackendError::InvalidContentLength` - Length value is not a number
    /// - `BackendError::FrameTooLarge` - Length exceeds the configured maximum
    /// - `BackendError::HeaderTooLong` - A header line never terminates
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, BackendError> {
        loop {
            match self.state {
                DecodeState::Headers => {
                    let Some(line) = self.take_line()? else {
                        return Ok(None);
                    };
                    self.header_lines += 1;
                    if line.to_ascii_lowercase().contains("content-length") {
                        let length = parse_content_length(&line)?;
                        if length > self.max_frame_bytes {
                            return Err(BackendError::FrameTooLarge { size: length });
                        }
                        self.state = DecodeState::Separator(length);
                    } else if self.header_lines >= MAX_HEADER_LINES {
                        return Err(BackendError::MissingContentLength);
                    }
                }
                DecodeState::Separator(length) => {
                    if self.take_line()?.is_none() {
                        return Ok(None);
                    }
                    self.state = DecodeState::Payload(length);
                }
                DecodeState::Payload(length) => {
                    if self.buffer.len() < length {
                        return Ok(None);
                    }
                    let frame = self.buffer.split_to(length).freeze();
                    self.state = DecodeState::Headers;
                    self.header_lines = 0;
                    return Ok(Some(frame));
                }
            }
        }
    }

    /// Checks the decoder state once the byte stream has ended.
    ///
    /// Ending between parts is a clean end of stream. Ending after a length
    /// header was seen means the last frame was cut short.
    ///
    /// # Errors
    /// - `BackendError::EndOfStream` - Stream ended inside a frame
    pub fn finish(&self) -> Result<(), BackendError> {
        match self.state {
            DecodeState::Headers => Ok(()),
            DecodeState::Separator(_) | DecodeState::Payload(_) => Err(BackendError::EndOfStream),
        }
    }

    /// Takes one line (without its terminator) from the buffer.
    fn take_line(&mut self) -> Result<Option<String>, BackendError> {
        let Some(newline) = self.buffer.iter().position(|&byte| byte == b'\n') else {
            if self.buffer.len() > MAX_HEADER_LINE_BYTES {
                return Err(BackendError::HeaderTooLong);
            }
            return Ok(None);
        };
        if newline > MAX_HEADER_LINE_BYTES {
            return Err(BackendError::HeaderTooLong);
        }

        let line = self.buffer.split_to(newline);
        self.buffer.advance(1);
        let line = String::from_utf8_lossy(&line);
        Ok(Some(line.trim_end_matches('\r').to_string()))
    }
}

fn parse_content_length(line: &str) -> Result<usize, BackendError> {
    let value = line
        .split_once(':')
        .map(|(_, value)| value.trim())
        .unwrap_or_default();
    value
        .parse()
        .map_err(|_| BackendError::InvalidContentLength {
            value: value.to_string(),
        })
}

/// Encodes one part the way multipart JPEG servers emit it.
pub fn encode_part(boundary: &str, payload: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    )
    .into_bytes();
    part.extend_from_slice(payload);
    part.extend_from_slice(b"\r\n");
    part
}
