//! Reply Framing
//!
//! Requests arrive as plain text lines. Replies borrow RESP framing so a
//! client can tell a value from a status or an error:
//!
//! - `+OK\r\n` - success with no value (SET, QPUSH)
//! - `$<length>\r\n<value>\r\n` - a value (GET, QPOP)
//! - `-ERR <message>\r\n` - an error

use bytes::{BufMut, Bytes, BytesMut};

/// The CRLF terminator used in replies
pub const CRLF: &[u8] = b"\r\n";

/// Reply type prefixes
pub mod prefix {
    pub const STATUS: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const VALUE: u8 = b'$';
}

/// A reply sent back to a line-protocol client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command succeeded without producing a value.
    /// Format: `+OK\r\n`
    Ok,

    /// Command produced a value.
    /// Format: `$<length>\r\n<data>\r\n`
    Value(String),

    /// Command failed.
    /// Format: `-ERR <message>\r\n`
    Error(String),
}

impl Reply {
    /// Creates an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// Serializes the reply to its wire format.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf);
        buf.freeze()
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Ok => {
                buf.put_u8(prefix::STATUS);
                buf.put_slice(b"OK");
                buf.put_slice(CRLF);
            }
            Reply::Value(value) => {
                buf.put_u8(prefix::VALUE);
                buf.put_slice(value.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(value.as_bytes());
                buf.put_slice(CRLF);
            }
            Reply::Error(message) => {
                buf.put_u8(prefix::ERROR);
                buf.put_slice(b"ERR ");
                // Messages are single-line
                buf.put_slice(message.replace(['\r', '\n'], " ").as_bytes());
                buf.put_slice(CRLF);
            }
        }
    }
}

impl From<Option<String>> for Reply {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => Reply::Value(v),
            None => Reply::Ok,
        }
    }
}
