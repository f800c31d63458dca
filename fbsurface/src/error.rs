//! Decode failures and their result codes

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumIter};

/// The stage at which a decode failed.
///
/// Discriminants are the negative result codes handed to C-style callers,
/// ordered by the stage that detects them.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Display, EnumIter,
)]
#[repr(i32)]
pub enum ErrorKind {
    #[strum(to_string = "file could not be opened")]
    NotFound = -1,
    #[strum(to_string = "file is shorter than the PNG signature")]
    Truncated = -2,
    #[strum(to_string = "PNG signature mismatch")]
    BadSignature = -3,
    #[strum(to_string = "decoder context could not be initialized")]
    DecoderInitFailed = -4,
    #[strum(to_string = "decoder fault")]
    DecodeFault = -6,
    #[strum(to_string = "unsupported bit depth or color model")]
    UnsupportedFormat = -7,
    #[strum(to_string = "surface allocation failed")]
    OutOfMemory = -8,
}

impl ErrorKind {
    pub fn code(self) -> i32 {
        self.into()
    }
}

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug)]
pub struct DecodeError {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Source>,
}

impl DecodeError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn with_source(mut self, source: impl Into<Source>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The negative result code for this failure.
    pub fn code(&self) -> i32 {
        self.kind.code()
    }
}

impl From<ErrorKind> for DecodeError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} ({})", self.kind, self.kind.code())?;
        if let Some(message) = &self.message {
            f.write_str(": ")?;
            f.write_str(message)?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
