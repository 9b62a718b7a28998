//! Failure taxonomy shared by every pipeline stage.
//!
//! Each stage has its own `thiserror` enum carrying the details. They all
//! map onto [`ErrorKind`] so callers can branch on the class of failure
//! without matching every variant.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The codec rejected the pixel buffer.
    EncodingFailure,
    /// Reading or writing the persisted file failed.
    FileIoFailure,
    /// The HTTP exchange failed: connect, transfer, timeout or error status.
    ConnectionFailure,
    /// Caller-supplied data was unusable: bad buffer, URL or form fields.
    MalformedInput,
    /// The operation was cancelled through its [`CancelToken`](crate::cancel::CancelToken).
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EncodingFailure => "encoding failure",
            Self::FileIoFailure => "file I/O failure",
            Self::ConnectionFailure => "connection failure",
            Self::MalformedInput => "malformed input",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
