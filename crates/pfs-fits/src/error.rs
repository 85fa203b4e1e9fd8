use thiserror::Error;

/// All errors that can occur while encoding or decoding a FITS container.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed FITS header block.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),

    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// Keyword name that cannot appear on a header card.
    #[error("invalid keyword name: {0:?}")]
    InvalidKeyword(String),

    /// A header value could not be parsed or cannot be represented on a card.
    #[error("invalid value for keyword {keyword}: {reason}")]
    InvalidValue { keyword: String, reason: String },

    /// A required keyword was not found in the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(String),

    /// Structure that this codec does not handle (e.g. an unknown TFORM code).
    #[error("unsupported FITS construct: {0}")]
    UnsupportedFormat(String),

    /// No HDU carries the requested EXTNAME.
    #[error("no extension named {0:?}")]
    MissingExtension(String),

    /// The binary table has no column with the requested TTYPE.
    #[error("extension {extname:?} has no column {column:?}")]
    MissingColumn { extname: String, column: String },

    /// The column exists but holds a different element type.
    #[error("column {column:?} holds {found}, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A variable-length array descriptor points outside the heap.
    #[error("variable-length descriptor for column {column:?} row {row} points outside the heap")]
    HeapOverflow { column: String, row: usize },

    /// gzip stream could not be inflated.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_value(keyword: &str, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            keyword: keyword.to_string(),
            reason: reason.into(),
        }
    }
}
