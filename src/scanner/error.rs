use thiserror::Error;

/// What went wrong while scanning the AST stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    /// A single JSON scalar did not fit the scan window.
    #[error("value too long for the scan window")]
    ValueTooLong,

    #[error("expected a node object")]
    ExpectedNode,

    #[error("expected an object")]
    ExpectedObject,

    #[error("expected a boolean")]
    ExpectedBool,

    #[error("expected a string or number")]
    ExpectedStringOrNumber,

    #[error("expected an array")]
    ExpectedArray,

    /// Object keys must be plain ASCII without escape sequences.
    #[error("unsupported escape sequence in object key")]
    UnsupportedObjectKeyEscapes,

    /// A file or line value overran the inherited-location buffer.
    #[error("string too long for the location buffer")]
    StringTooLong,

    #[error("malformed JSON")]
    Syntax,
}

/// Scanner failure, carrying the 1-based input position for parse errors.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{kind} at line {line}, column {col}")]
    Parse {
        kind: ScanErrorKind,
        line: u32,
        col: u32,
    },

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub(crate) fn parse(kind: ScanErrorKind, line: u32, col: u32) -> Self {
        ScanError::Parse { kind, line, col }
    }

    /// The error kind, if this is a parse error.
    pub fn kind(&self) -> Option<ScanErrorKind> {
        match self {
            ScanError::Parse { kind, .. } => Some(*kind),
            ScanError::Io(_) => None,
        }
    }
}
