//! CSV writer: stream lifecycle, schema projection and transcoding

use crate::common::{Dialect, StreamState};
use crate::encoder::RowEncoder;
use crate::encoding::{TextEncoding, Transcoder};
use crate::error::{CsvError, Result};
use crate::schema::{Column, Key, WriteSchema};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Options applied when a writer opens its target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    pub dialect: Dialect,
    /// Encoding of raw fields passed to [`CsvWriter::write_encoded_row`] (default: UTF-8)
    pub input_encoding: TextEncoding,
    /// Encoding of the bytes written to the target (default: UTF-8)
    pub output_encoding: TextEncoding,
}

#[derive(Debug)]
struct OpenTarget<W> {
    target: W,
    encoder: RowEncoder,
    transcoder: Transcoder,
    any_data_written: bool,
}

/// Writes rows or column-keyed records to a CSV target.
///
/// ```
/// use csvio_rs::CsvWriter;
///
/// let mut writer = CsvWriter::new();
/// writer.open(Vec::new()).unwrap();
/// writer.bind_columns([("id", "ID"), ("name", "Name")], true).unwrap();
/// writer.write_record([("name", "Smith, J.")]).unwrap();
///
/// let bytes = writer.detach().unwrap();
/// assert_eq!(bytes, b"ID,Name\n,\"Smith, J.\"\n");
/// ```
#[derive(Debug)]
pub struct CsvWriter<W> {
    options: WriterOptions,
    state: StreamState,
    target: Option<OpenTarget<W>>,
    schema: Option<WriteSchema>,
}

impl<W> Default for CsvWriter<W> {
    fn default() -> Self {
        Self::with_options(WriterOptions::default())
    }
}

impl<W> CsvWriter<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: WriterOptions) -> Self {
        Self {
            options,
            state: StreamState::Unbound,
            target: None,
            schema: None,
        }
    }

    fn settings(&mut self, setting: &'static str) -> Result<&mut WriterOptions> {
        if self.target.is_some() {
            return Err(CsvError::AlreadyOpen(setting));
        }
        Ok(&mut self.options)
    }

    pub fn set_delimiter(&mut self, delimiter: char) -> Result<&mut Self> {
        self.settings("delimiter")?.dialect.delimiter = delimiter;
        Ok(self)
    }

    /// `None` disables quoting.
    pub fn set_enclosure(&mut self, enclosure: Option<char>) -> Result<&mut Self> {
        self.settings("enclosure")?.dialect.enclosure = enclosure;
        Ok(self)
    }

    /// `None` replaces enclosure characters inside fields instead of escaping them.
    pub fn set_escape(&mut self, escape: Option<char>) -> Result<&mut Self> {
        self.settings("escape")?.dialect.escape = escape;
        Ok(self)
    }

    pub fn set_linebreak(&mut self, linebreak: impl Into<String>) -> Result<&mut Self> {
        self.settings("linebreak")?.dialect.linebreak = linebreak.into();
        Ok(self)
    }

    pub fn set_always_quote(&mut self, always_quote: bool) -> Result<&mut Self> {
        self.settings("always quote")?.dialect.always_quote = always_quote;
        Ok(self)
    }

    /// Replacement for characters that cannot be escaped. May change while open.
    pub fn set_illegal_char_replace(&mut self, replace: impl Into<String>) -> &mut Self {
        let replace = replace.into();
        if let Some(open) = self.target.as_mut() {
            open.encoder.set_illegal_char_replace(&replace);
        }
        self.options.dialect.illegal_char_replace = replace;
        self
    }

    pub fn set_dialect(&mut self, dialect: Dialect) -> Result<&mut Self> {
        self.settings("dialect")?.dialect = dialect;
        Ok(self)
    }

    pub fn set_input_encoding(&mut self, encoding: TextEncoding) -> Result<&mut Self> {
        self.settings("input encoding")?.input_encoding = encoding;
        Ok(self)
    }

    pub fn set_output_encoding(&mut self, encoding: TextEncoding) -> Result<&mut Self> {
        self.settings("output encoding")?.output_encoding = encoding;
        Ok(self)
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn dialect(&self) -> &Dialect {
        &self.options.dialect
    }

    pub fn input_encoding(&self) -> TextEncoding {
        self.options.input_encoding
    }

    pub fn output_encoding(&self) -> TextEncoding {
        self.options.output_encoding
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.target.is_some()
    }

    /// Bound columns, if any.
    pub fn columns(&self) -> Option<&[Column]> {
        self.schema.as_ref().map(WriteSchema::columns)
    }

    /// Opens `target`; a target still open is released without flushing.
    pub fn open(&mut self, target: W) -> Result<&mut Self> {
        self.options.dialect.validate()?;
        if self.target.take().is_some() {
            tracing::debug!("replacing open CSV target");
        }

        tracing::debug!(
            encoding = %self.options.output_encoding,
            "opened CSV target"
        );
        self.target = Some(OpenTarget {
            target,
            encoder: RowEncoder::new(&self.options.dialect),
            transcoder: Transcoder::new(self.options.input_encoding, self.options.output_encoding),
            any_data_written: false,
        });
        self.state = StreamState::Open;
        Ok(self)
    }

    fn open_target(&mut self) -> Result<&mut OpenTarget<W>> {
        self.target.as_mut().ok_or(CsvError::NotOpen)
    }
}

impl<W: Write> CsvWriter<W> {
    /// Flushes and releases the target, which is dropped.
    pub fn close(&mut self) -> Result<&mut Self> {
        if let Some(mut open) = self.target.take() {
            self.state = StreamState::Closed;
            open.target.flush().map_err(CsvError::Write)?;
            tracing::debug!("closed CSV target");
        }
        Ok(self)
    }

    /// Flushes and hands the target back to the caller without closing it.
    pub fn detach(&mut self) -> Result<W> {
        let mut open = self.target.take().ok_or(CsvError::NotOpen)?;
        self.state = StreamState::Detached;
        open.target.flush().map_err(CsvError::Write)?;
        tracing::debug!("detached CSV target");
        Ok(open.target)
    }

    /// Emits the byte order mark of the output encoding.
    ///
    /// Only valid before anything else was written.
    pub fn write_byte_order_mark(&mut self) -> Result<&mut Self> {
        let encoding = self.options.output_encoding;
        let open = self.open_target()?;
        if open.any_data_written {
            return Err(CsvError::BomAfterData);
        }
        let bom = encoding
            .bom()
            .ok_or_else(|| CsvError::NoBom(encoding.name().to_string()))?;
        open.target.write_all(bom.bytes()).map_err(CsvError::Write)?;
        open.any_data_written = true;
        Ok(self)
    }

    /// Writes one row. Null values become empty fields.
    pub fn write_row<I, V>(&mut self, fields: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = fields.into_iter().map(Into::into).collect();
        self.write_values(&values)
    }

    /// Writes one row of raw fields given in the input encoding. `None` fields are written empty.
    pub fn write_encoded_row(&mut self, fields: &[Option<&[u8]>]) -> Result<&mut Self> {
        let open = self.open_target()?;
        let decoded: Vec<Option<String>> = fields
            .iter()
            .map(|f| f.map(|bytes| open.transcoder.decode(bytes).into_owned()))
            .collect();
        let line = open.encoder.encode_row(decoded.iter().map(Option::as_deref));
        write_line(open, &line)?;
        Ok(self)
    }

    fn write_values(&mut self, values: &[Value]) -> Result<&mut Self> {
        let open = self.open_target()?;
        let texts: Vec<_> = values.iter().map(Value::to_field_text).collect();
        let line = open.encoder.encode_row(texts.iter().map(Option::as_deref));
        write_line(open, &line)?;
        Ok(self)
    }

    /// Binds the column schema and writes the header row if `emit_header` is set.
    pub fn bind_columns<I, C>(&mut self, columns: I, emit_header: bool) -> Result<&mut Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let schema = WriteSchema::new(columns.into_iter().map(Into::into).collect());
        if emit_header {
            let headers: Vec<Value> = schema
                .columns()
                .iter()
                .map(|c| Value::from(c.header.as_str()))
                .collect();
            self.write_values(&headers)?;
        }
        self.schema = Some(schema);
        Ok(self)
    }

    /// Writes values keyed by column, in schema order.
    ///
    /// Columns missing from `values` are written empty; keys outside the schema
    /// fail with [`CsvError::UnknownColumns`] and nothing is written.
    pub fn write_record<I, K, V>(&mut self, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let schema = self
            .schema
            .as_ref()
            .filter(|s| !s.columns().is_empty())
            .ok_or(CsvError::ColumnsUnknown("write_record"))?;
        let row = schema.project(values)?;
        self.write_values(&row)
    }
}

fn write_line<W: Write>(open: &mut OpenTarget<W>, line: &str) -> Result<()> {
    let bytes = open.transcoder.encode(line);
    open.target.write_all(&bytes).map_err(CsvError::Write)?;
    open.any_data_written = true;
    tracing::trace!(bytes = bytes.len(), "wrote row");
    Ok(())
}

impl CsvWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and opens it.
    pub fn open_path(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.open(BufWriter::new(file))
    }
}
