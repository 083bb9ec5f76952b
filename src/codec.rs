use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};
use crate::Error;

static CRLF: &[u8; 2] = b"\r\n";

/// One command read off a connection: the case-folded command name and its arguments. When the
/// request carried a bulk payload it is the last argument.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub name: String,
    pub args: Vec<Bytes>,
}

impl Request {
    pub fn new(name: impl Into<String>, args: Vec<Bytes>) -> Request {
        Request {
            name: name.into().to_lowercase(),
            args,
        }
    }
}

#[derive(Clone, Debug, ThisError, PartialEq)]
pub enum RequestError {
    #[error("length in message is not an integer [{0}]")]
    InvalidLength(String),
}

/// Decodes the line-oriented request format and encodes replies.
///
/// A request is `<COMMAND> <arg1> ... <argN>\r\n`. When bytes follow the command line, the last
/// token is the exact length of a payload that replaces it as the final argument; whatever
/// follows the payload in the buffer is discarded. A payload only counts when at least part of
/// it is buffered together with its command line.
pub struct RequestCodec {
    max_request_size: usize,
}

impl RequestCodec {
    pub fn new(max_request_size: usize) -> RequestCodec {
        RequestCodec { max_request_size }
    }
}

impl Decoder for RequestCodec {
    type Item = Result<Request, RequestError>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() > self.max_request_size {
            return Err(format!(
                "request size {} exceeds limit of {} bytes",
                src.len(),
                self.max_request_size
            )
            .into());
        }

        let line_end = match src.windows(2).position(|window| window == CRLF) {
            Some(position) => position,
            None => return Ok(None),
        };

        let mut parts: Vec<Bytes> = src[..line_end]
            .split(|b| *b == b' ')
            .map(Bytes::copy_from_slice)
            .collect();
        let remaining = src.len() - line_end - CRLF.len();

        if remaining > 0 {
            let length_token = parts.last().cloned().unwrap_or_default();
            let length = match std::str::from_utf8(&length_token)
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
            {
                Some(length) => length,
                None => {
                    src.clear();
                    let token = String::from_utf8_lossy(&length_token).to_string();
                    return Ok(Some(Err(RequestError::InvalidLength(token))));
                }
            };

            if remaining < length {
                src.reserve(length - remaining);
                return Ok(None);
            }

            let start = line_end + CRLF.len();
            let payload = Bytes::copy_from_slice(&src[start..start + length]);
            if let Some(last) = parts.last_mut() {
                *last = payload;
            }
        }

        // Anything past the command line and its payload belongs to the same read and is dropped.
        src.clear();

        // A doubled space after the command name yields an empty first argument.
        if parts.len() > 1 && parts[1].is_empty() {
            parts.remove(1);
        }

        let name = String::from_utf8_lossy(&parts[0]).to_lowercase();
        let args = parts.split_off(1);

        Ok(Some(Ok(Request { name, args })))
    }
}

impl Encoder<Frame> for RequestCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&frame.serialize());
        Ok(())
    }
}

/// The peer side of [`RequestCodec`]: encodes raw requests and decodes replies.
pub struct ReplyCodec;

impl Decoder for ReplyCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => return Ok(None), // Not enough data to parse a frame.
            Err(err) => return Err(err.into()),
        };

        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Bytes> for ReplyCodec {
    type Error = Error;

    fn encode(&mut self, request: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&request);
        Ok(())
    }
}

/// Renders a request line, appending `payload` as a length-prefixed bulk when present.
pub fn encode_request(name: &str, args: &[&str], payload: Option<&[u8]>) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(name.as_bytes());
    for arg in args {
        buf.put_u8(b' ');
        buf.put_slice(arg.as_bytes());
    }

    match payload {
        Some(payload) => {
            buf.put_u8(b' ');
            buf.put_slice(payload.len().to_string().as_bytes());
            buf.put_slice(CRLF);
            buf.put_slice(payload);
            buf.put_slice(CRLF);
        }
        None => buf.put_slice(CRLF),
    }

    buf.freeze()
}
