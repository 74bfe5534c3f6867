//! # csvio_rs
//!
//! A CSV reader and writer with configurable dialects, character encodings and
//! a declarative value-casting pipeline.
//!
//! Rows are tokenized under a [`Dialect`] (delimiter, optional enclosure,
//! escape character, line break). Sources in UTF-16, UTF-32 or legacy
//! single-byte encodings are transcoded on the fly, and a leading byte order
//! mark is detected and consumed. Records map rows onto a column schema and can
//! run per-column converter chains such as `trim|number:,:.`.
//!
//! ## Example
//!
//! ```rust
//! use csvio_rs::{CsvReader, CsvWriter, Value};
//!
//! // Write a file with a header row
//! let mut writer = CsvWriter::new();
//! writer.open(Vec::new()).unwrap();
//! writer.bind_columns(["name", "tags", "active"], true).unwrap();
//! writer.write_record([("name", "Ada"), ("tags", "math|code"), ("active", "1")]).unwrap();
//! let bytes = writer.detach().unwrap();
//!
//! // Read it back with casts
//! let mut reader = CsvReader::new();
//! reader.open(bytes.as_slice()).unwrap();
//! reader.read_columns().unwrap();
//! reader.set_casts([("tags", "split"), ("active", "bool")]).unwrap();
//!
//! let record = reader.read_record().unwrap().unwrap();
//! assert_eq!(record["tags"], Value::from(vec!["math", "code"]));
//! assert_eq!(record["active"], Value::Bool(true));
//! ```

mod common;
pub mod convert;
mod decoder;
mod encoder;
pub mod encoding;
mod error;
mod reader;
mod schema;
mod value;
mod writer;

// Re-export public API
pub use common::{Dialect, StreamState};
pub use convert::{CastSpec, ConvertContext, ConverterRegistry, Converters, Pipeline};
pub use decoder::{tokenize, RowTokenizer};
pub use encoder::RowEncoder;
pub use encoding::{Bom, TextEncoding, Transcoder};
pub use error::{CsvError, Result};
pub use reader::{CsvReader, ReaderOptions, Records, Rows};
pub use schema::{Column, Key, Record};
pub use value::Value;
pub use writer::{CsvWriter, WriterOptions};
