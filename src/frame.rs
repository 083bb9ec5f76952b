use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Prefix every error reply carries on the wire, right after the `-` marker.
static ERR_PREFIX: &str = "ERR ";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    /// Invalid message encoding.
    #[error("{0}")]
    Other(crate::Error),
}

/// A typed reply sent back to a client.
///
/// Error frames hold only the message; the `ERR` marker is added on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    pub fn ok() -> Frame {
        Frame::Simple("OK".to_string())
    }

    pub fn error(msg: impl Into<String>) -> Frame {
        Frame::Error(msg.into())
    }

    /// Builds an array of bulk entries.
    pub fn bulk_array<I>(items: I) -> Frame
    where
        I: IntoIterator<Item = Bytes>,
    {
        Frame::Array(items.into_iter().map(Frame::Bulk).collect())
    }

    /// Parses one reply frame. Used by outbound links reading a peer's replies.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte identifies the reply type, the rest is its content.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let bytes = get_frame_bytes(src)?.to_vec();
                let string = String::from_utf8(bytes)?;
                Ok(Frame::Simple(string))
            }
            DataType::SimpleError => {
                let bytes = get_frame_bytes(src)?.to_vec();
                let string = String::from_utf8(bytes)?;
                let msg = string
                    .strip_prefix(ERR_PREFIX)
                    .map(str::to_string)
                    .unwrap_or(string);
                Ok(Frame::Error(msg))
            }
            DataType::Integer => {
                let integer = parse_decimal(get_frame_bytes(src)?)?;
                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = parse_decimal(get_frame_bytes(src)?)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }

                let length = usize::try_from(length)
                    .map_err(|_| Error::from(format!("invalid bulk length {}", length)))?;
                if src.remaining() < length + CRLF.len() {
                    return Err(Error::Incomplete);
                }

                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + length]);
                src.advance(length + CRLF.len());

                Ok(Frame::Bulk(data))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let length = parse_decimal(get_frame_bytes(src)?)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }

                let mut frames = Vec::with_capacity(length.max(0) as usize);
                for _ in 0..length {
                    let frame = Self::parse(src)?;
                    frames.push(frame);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Frame::Simple(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(u8::from(DataType::SimpleString));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Error(s) => {
                let mut bytes = Vec::with_capacity(1 + ERR_PREFIX.len() + s.len() + CRLF.len());
                bytes.push(u8::from(DataType::SimpleError));
                bytes.extend_from_slice(ERR_PREFIX.as_bytes());
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Integer(i) => {
                let digits = i.to_string();
                let mut bytes = Vec::with_capacity(1 + digits.len() + CRLF.len());
                bytes.push(u8::from(DataType::Integer));
                bytes.extend_from_slice(digits.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Bulk(bytes) => {
                let length_str = bytes.len().to_string();
                let mut result = Vec::with_capacity(
                    1 + length_str.len() + CRLF.len() + bytes.len() + CRLF.len(),
                );
                result.push(u8::from(DataType::BulkString));
                result.extend_from_slice(length_str.as_bytes());
                result.extend_from_slice(CRLF);
                result.extend_from_slice(bytes);
                result.extend_from_slice(CRLF);
                result
            }
            // Nil is the null bulk string, `$-1`.
            Frame::Null => {
                let mut bytes = Vec::with_capacity(5);
                bytes.push(u8::from(DataType::BulkString));
                bytes.extend_from_slice(b"-1");
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Array(arr) => {
                let length_str = arr.len().to_string();
                let mut bytes = Vec::with_capacity(1 + length_str.len() + CRLF.len());
                bytes.push(u8::from(DataType::Array));
                bytes.extend_from_slice(length_str.as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in arr {
                    bytes.extend(frame.serialize());
                }
                bytes
            }
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}{}", ERR_PREFIX, s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

fn get_frame_bytes<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    let frame_end_position = src.get_ref()[start..end]
        .windows(2)
        .position(|window| window == CRLF)
        .ok_or(Error::Incomplete)
        .map(|index| start + index)?;

    src.set_position((frame_end_position + CRLF.len()) as u64);

    Ok(&src.get_ref()[start..frame_end_position])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn parse_decimal(bytes: &[u8]) -> Result<i64, Error> {
    let string = String::from_utf8(bytes.to_vec())?;
    string
        .parse::<i64>()
        .map_err(|e| -> crate::Error { Box::new(e) })
        .map_err(Error::Other)
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        "protocol error; invalid frame format".into()
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        Error::Other(src.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_replies() {
        assert_eq!(Frame::ok().serialize(), b"+OK\r\n");
        assert_eq!(Frame::error("no such key").serialize(), b"-ERR no such key\r\n");
        assert_eq!(Frame::Integer(-3).serialize(), b":-3\r\n");
        assert_eq!(Frame::Bulk(Bytes::from("hello")).serialize(), b"$5\r\nhello\r\n");
        assert_eq!(Frame::Null.serialize(), b"$-1\r\n");
        assert_eq!(Frame::Array(vec![]).serialize(), b"*0\r\n");
        assert_eq!(
            Frame::bulk_array(vec![Bytes::from("a"), Bytes::from("bc")]).serialize(),
            b"*2\r\n$1\r\na\r\n$2\r\nbc\r\n"
        );
    }

    #[test]
    fn parse_simple_string_frame() {
        let data = b"+OK\r\n";
        let mut cursor = Cursor::new(&data[..]);

        let frame = Frame::parse(&mut cursor);

        assert!(matches!(frame, Ok(Frame::Simple(ref s)) if s == "OK"));
    }

    #[test]
    fn parse_error_frame_strips_marker() {
        let data = b"-ERR version mismatch\r\n";
        let mut cursor = Cursor::new(&data[..]);

        let frame = Frame::parse(&mut cursor);

        assert!(matches!(
            frame,
            Ok(Frame::Error(ref s)) if s == "version mismatch"
        ));
    }

    #[test]
    fn parse_integer_frame_negative() {
        let data = b":-1000\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(Frame::parse(&mut cursor), Ok(Frame::Integer(-1000))));
    }

    #[test]
    fn parse_bulk_string_with_embedded_crlf() {
        let data = b"$7\r\nab\r\ncde\r\n";
        let mut cursor = Cursor::new(&data[..]);

        let frame = Frame::parse(&mut cursor);

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(ref b)) if b == &Bytes::from("ab\r\ncde")
        ));
        assert_eq!(cursor.position() as usize, data.len());
    }

    #[test]
    fn parse_bulk_string_frame_null() {
        let data = b"$-1\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(Frame::parse(&mut cursor), Ok(Frame::Null)));
    }

    #[test]
    fn parse_incomplete_bulk() {
        let data = b"$10\r\nabc";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(Frame::parse(&mut cursor), Err(Error::Incomplete)));
    }

    #[test]
    fn parse_array_frame_null_in_the_middle() {
        let data = b"*3\r\n$5\r\nhello\r\n$-1\r\n$5\r\nworld\r\n";
        let mut cursor = Cursor::new(&data[..]);

        let frame = Frame::parse(&mut cursor).unwrap();

        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from("hello")),
                Frame::Null,
                Frame::Bulk(Bytes::from("world")),
            ])
        );
    }

    #[test]
    fn invalid_data_type() {
        let data = b"%1\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(
            Frame::parse(&mut cursor),
            Err(Error::InvalidDataType(b'%'))
        ));
    }
}
