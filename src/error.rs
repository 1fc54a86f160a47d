use std::io;

use thiserror::Error;

/// A malformed quote construct in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// A quote byte appeared inside a field that did not start with a quote.
    #[error("bare \" in non-quoted-field")]
    BareQuote,
    /// A quote inside a quoted field was followed by a byte that is neither a
    /// quote, the separator, nor the end of the line, or the line ended while
    /// a quoted field was still open.
    #[error("extraneous \" in field")]
    Quote,
}

/// The first error observed while scanning or parsing rows. The error is
/// sticky: once set it is reported by `err()` until the owner is reset.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// The line index is 0-based, the column is the byte index within the
    /// line where the error was detected.
    #[error("line {line}, column {column}: {err}")]
    Parse {
        line: i64,
        column: usize,
        err: QuoteError,
    },
    #[error("{message}")]
    Io {
        kind: io::ErrorKind,
        message: String,
    },
}

impl ScanError {
    pub(crate) fn from_io(err: &io::Error) -> ScanError {
        ScanError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
