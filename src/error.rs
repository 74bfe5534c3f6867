//! Error types for reading and writing CSV streams.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// An error raised by a [`CsvReader`](crate::CsvReader), a [`CsvWriter`](crate::CsvWriter)
/// or the conversion pipeline.
///
/// Malformed numbers, dates or JSON handed to a built-in converter are not errors:
/// those converters degrade to [`Value::Null`](crate::Value::Null).
#[derive(Debug, Error)]
pub enum CsvError {
    /// A dialect or encoding setting was changed while a stream is open.
    #[error("{0} must be set before opening CSV")]
    AlreadyOpen(&'static str),

    /// A stream operation was called without an open stream.
    #[error("no stream opened")]
    NotOpen,

    /// A record operation was called before the column schema was known.
    #[error("columns must be read or set before using {0}")]
    ColumnsUnknown(&'static str),

    /// A record contained keys which are not part of the bound schema.
    #[error("unknown column(s): {}", .0.join(", "))]
    UnknownColumns(Vec<String>),

    /// A byte order mark was requested after data had been written.
    #[error("BOM must be written before any other data")]
    BomAfterData,

    /// The output encoding has no byte order mark.
    #[error("charset \"{0}\" does not have a BOM")]
    NoBom(String),

    /// The encoding label is not known.
    #[error("unsupported encoding \"{0}\"")]
    UnknownEncoding(String),

    /// The dialect cannot be used, e.g. the delimiter equals the enclosure.
    #[error("invalid dialect: {0}")]
    InvalidDialect(String),

    /// A cast specification names a converter that does not exist (strict mode only).
    #[error("unknown converter \"{0}\"")]
    UnknownConverter(String),

    /// The target path could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading from the source failed.
    #[error("error reading CSV: {0}")]
    Read(#[source] io::Error),

    /// Writing to the target failed.
    #[error("error writing CSV: {0}")]
    Write(#[source] io::Error),
}

impl CsvError {
    /// Returns `true` for caller misuse, `false` for I/O failures.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, CsvError::Read(_) | CsvError::Write(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CsvError>;
