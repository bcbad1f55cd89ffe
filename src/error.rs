use crate::boxes::{BoxType, FourCC};
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("truncated input at offset {offset}: {wanted} bytes declared, fewer available")]
    Truncated { offset: u64, wanted: u64 },
    #[error("malformed size for '{typ}' at offset {offset}: {reason}")]
    MalformedSize {
        typ: FourCC,
        offset: u64,
        reason: &'static str,
    },
    #[error("unknown box type '{typ}' at offset {offset}")]
    UnknownBoxType { typ: FourCC, offset: u64 },
    #[error("box nesting deeper than {max} levels")]
    DepthExceeded { max: usize },
    #[error("'{child}' is not a legal child of '{parent}' (offset {offset})")]
    UnexpectedChild {
        parent: BoxType,
        child: BoxType,
        offset: u64,
    },
    #[error("decoding '{typ}' payload: {source}")]
    Decode {
        typ: BoxType,
        #[source]
        source: io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(thiserror::Error, Debug)]
pub enum TagError {
    #[error("truncated tag: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("payload of {0} bytes does not fit a 24-bit size field")]
    PayloadTooLarge(usize),
    #[error("timestamp {0} does not fit a 24-bit field")]
    TimestampOverflow(u32),
    #[error("bad stream signature {0:02x?}")]
    BadSignature([u8; 3]),
    #[error("previous-tag-size trailer is {found}, expected {expected}")]
    TrailerMismatch { expected: u32, found: u32 },
    #[error("io: {0}")]
    Io(#[from] io::Error),
}
