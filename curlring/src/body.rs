use std::fmt;
use std::io::Read;

use bytes::Bytes;

/// Request body.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Body from bytes.
    Bytes(Bytes),
    /// Streamed body. The length is sent as `Content-Length` when known,
    /// otherwise the upload is chunked.
    Reader {
        reader: Box<dyn Read>,
        len: Option<u64>,
    },
}

impl Body {
    /// Stream the body from a reader.
    pub fn reader(reader: impl Read + 'static, len: Option<u64>) -> Self {
        Body::Reader {
            reader: Box::new(reader),
            len,
        }
    }

    /// Returns true if the body is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(b) => b.is_empty(),
            Body::Reader { len, .. } => *len == Some(0),
        }
    }

    /// Body length, when known up front.
    pub fn len(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(b) => Some(b.len() as u64),
            Body::Reader { len, .. } => *len,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Body::Reader { len, .. } => f.debug_struct("Reader").field("len", len).finish(),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        if v.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(Bytes::from(v))
        }
    }
}

impl From<&[u8]> for Body {
    fn from(s: &[u8]) -> Self {
        if s.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(Bytes::copy_from_slice(s))
        }
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        if b.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(b)
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::from(s.as_bytes())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::from(s.into_bytes())
    }
}
