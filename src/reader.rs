//! CSV reader: stream lifecycle, record mapping and casting

use crate::common::{Dialect, StreamState};
use crate::convert::{CastSpec, Converters, Pipeline};
use crate::decoder::RowTokenizer;
use crate::encoding::{encode_text, resolve_bom, Bom, DecodingReader, TextEncoding};
use crate::error::{CsvError, Result};
use crate::schema::{ReadSchema, Record};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Chain, Cursor, Read};
use std::path::Path;

/// Options applied when a reader opens its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub dialect: Dialect,
    /// Encoding of the source bytes (default: UTF-8)
    pub input_encoding: TextEncoding,
    /// Encoding of the fields returned by [`CsvReader::read_encoded_line`] (default: UTF-8)
    pub output_encoding: TextEncoding,
    /// Probe the source for a byte order mark (default: true)
    pub bom_detection: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            input_encoding: TextEncoding::Utf8,
            output_encoding: TextEncoding::Utf8,
            bom_detection: true,
        }
    }
}

type Source<R> = BufReader<DecodingReader<Chain<Cursor<Vec<u8>>, R>>>;

struct OpenSource<R> {
    input: Source<R>,
    tokenizer: RowTokenizer,
}

/// Reads rows or column-keyed records from a CSV source.
///
/// Dialect and encoding settings are frozen while a source is open.
///
/// ```
/// use csvio_rs::{CsvReader, Value};
///
/// let mut reader = CsvReader::open_string("id,price\n1, 4.50 \n", true).unwrap();
/// reader.read_columns().unwrap();
/// reader.set_cast("price", "number").unwrap();
///
/// let record = reader.read_record().unwrap().unwrap();
/// assert_eq!(record["price"], Value::from("4.50"));
/// ```
pub struct CsvReader<R> {
    options: ReaderOptions,
    state: StreamState,
    source: Option<OpenSource<R>>,
    resolved_encoding: Option<TextEncoding>,
    bom: Option<Bom>,
    schema: Option<ReadSchema>,
    casts: IndexMap<String, CastSpec>,
    pipelines: IndexMap<String, Pipeline>,
    converters: Converters,
}

impl<R> fmt::Debug for CsvReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvReader")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("open", &self.source.is_some())
            .field("resolved_encoding", &self.resolved_encoding)
            .field("bom", &self.bom)
            .field("schema", &self.schema)
            .field("casts", &self.casts)
            .field("pipelines", &self.pipelines)
            .field("converters", &self.converters)
            .finish()
    }
}

impl<R> Default for CsvReader<R> {
    fn default() -> Self {
        Self::with_options(ReaderOptions::default())
    }
}

impl<R> CsvReader<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            options,
            state: StreamState::Unbound,
            source: None,
            resolved_encoding: None,
            bom: None,
            schema: None,
            casts: IndexMap::new(),
            pipelines: IndexMap::new(),
            converters: Converters::new(),
        }
    }

    fn settings(&mut self, setting: &'static str) -> Result<&mut ReaderOptions> {
        if self.source.is_some() {
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

    pub fn set_escape(&mut self, escape: Option<char>) -> Result<&mut Self> {
        self.settings("escape")?.dialect.escape = escape;
        Ok(self)
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

    pub fn set_bom_detection(&mut self, detect: bool) -> Result<&mut Self> {
        self.settings("BOM detection")?.bom_detection = detect;
        Ok(self)
    }

    pub fn options(&self) -> &ReaderOptions {
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

    /// Encoding the open source is decoded with, refined by its BOM.
    pub fn resolved_encoding(&self) -> Option<TextEncoding> {
        self.resolved_encoding
    }

    /// The BOM consumed when the source was opened.
    pub fn bom(&self) -> Option<Bom> {
        self.bom
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Number of physical lines consumed from the open source.
    pub fn line_num(&self) -> usize {
        self.source.as_ref().map_or(0, |s| s.tokenizer.line_num())
    }

    /// Sets the column schema used by [`read_record`](Self::read_record).
    pub fn set_columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = Some(ReadSchema::new(columns.into_iter().map(Into::into).collect()));
        self
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.schema.as_ref().map(ReadSchema::keys)
    }

    /// `true` if every key is part of the schema.
    pub fn columns_exist<S: AsRef<str>>(&self, keys: &[S]) -> Result<bool> {
        let schema = self
            .schema
            .as_ref()
            .ok_or(CsvError::ColumnsUnknown("columns_exist"))?;
        Ok(schema.contains_all(keys))
    }

    pub fn column_exists(&self, key: &str) -> Result<bool> {
        self.columns_exist(&[key])
    }

    /// Replaces all cast specifications.
    pub fn set_casts<I, K, C>(&mut self, casts: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<CastSpec>,
    {
        let casts: IndexMap<String, CastSpec> = casts
            .into_iter()
            .map(|(k, c)| (k.into(), c.into()))
            .collect();
        self.pipelines = compile_casts(&self.converters, &casts)?;
        self.casts = casts;
        Ok(self)
    }

    /// Sets the cast specification of one column.
    pub fn set_cast(&mut self, column: impl Into<String>, cast: impl Into<CastSpec>) -> Result<&mut Self> {
        let column = column.into();
        let cast = cast.into();
        let pipeline = self.converters.compile(&cast)?;
        self.pipelines.insert(column.clone(), pipeline);
        self.casts.insert(column, cast);
        Ok(self)
    }

    pub fn casts(&self) -> &IndexMap<String, CastSpec> {
        &self.casts
    }

    /// Registers a converter usable in cast specifications; it shadows a built-in of the same name.
    pub fn add_converter<F>(&mut self, name: impl Into<String>, f: F) -> Result<&mut Self>
    where
        F: Fn(Value, &[String]) -> Value + Send + Sync + 'static,
    {
        let mut converters = self.converters.clone();
        converters.add_converter(name, f);
        self.replace_converters(converters)
    }

    /// With strict converters an unknown converter name fails instead of passing values through.
    pub fn set_strict_converters(&mut self, strict: bool) -> Result<&mut Self> {
        let mut converters = self.converters.clone();
        converters.set_strict(strict);
        self.replace_converters(converters)
    }

    pub fn set_default_decimal_separator(&mut self, separator: impl Into<String>) -> &mut Self {
        self.converters.set_default_decimal_separator(separator);
        self
    }

    pub fn default_decimal_separator(&self) -> &str {
        self.converters.default_decimal_separator()
    }

    /// Swaps the converters only if every cast still compiles with them.
    fn replace_converters(&mut self, converters: Converters) -> Result<&mut Self> {
        self.pipelines = compile_casts(&converters, &self.casts)?;
        self.converters = converters;
        Ok(self)
    }

    /// Releases the source. Reading sources need no flushing, so this cannot fail.
    pub fn close(&mut self) -> &mut Self {
        if self.source.take().is_some() {
            tracing::debug!("closed CSV source");
            self.state = StreamState::Closed;
        }
        self
    }

    /// Releases the source and hands it back to the caller.
    ///
    /// Bytes already buffered by the reader are not returned to the source.
    pub fn detach(&mut self) -> Option<R> {
        let open = self.source.take()?;
        tracing::debug!(line = open.tokenizer.line_num(), "detached CSV source");
        self.state = StreamState::Detached;
        let (_, source) = open.input.into_inner().into_inner().into_inner();
        Some(source)
    }
}

impl<R: Read> CsvReader<R> {
    /// Opens `source` with the configured dialect and encodings.
    ///
    /// A source that is still open is released first.
    pub fn open(&mut self, source: R) -> Result<&mut Self> {
        self.options.dialect.validate()?;
        if self.source.take().is_some() {
            tracing::debug!("replacing open CSV source");
            self.state = StreamState::Closed;
        }

        let resolution = resolve_bom(
            source,
            self.options.input_encoding,
            self.options.bom_detection,
        )
        .map_err(CsvError::Read)?;

        tracing::debug!(
            encoding = %resolution.encoding,
            bom = ?resolution.bom,
            "opened CSV source"
        );

        self.resolved_encoding = Some(resolution.encoding);
        self.bom = resolution.bom;
        self.source = Some(OpenSource {
            input: BufReader::new(DecodingReader::new(resolution.source, resolution.encoding)),
            tokenizer: RowTokenizer::new(&self.options.dialect),
        });
        self.state = StreamState::Open;
        Ok(self)
    }

    /// Opens `source`, overriding BOM detection for this source only.
    pub fn open_with_bom_detection(&mut self, source: R, bom_detection: bool) -> Result<&mut Self> {
        let configured = self.options.bom_detection;
        self.options.bom_detection = bom_detection;
        let opened = self.open(source).map(|_| ());
        self.options.bom_detection = configured;
        opened.map(|_| self)
    }

    /// Reads the next row of fields; `Ok(None)` at end of input.
    pub fn read_line(&mut self) -> Result<Option<Vec<String>>> {
        let open = self.source.as_mut().ok_or(CsvError::NotOpen)?;
        open.tokenizer
            .next_row(&mut open.input)
            .map_err(CsvError::Read)
    }

    /// Reads the next row with every field encoded in the output encoding.
    pub fn read_encoded_line(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        let encoding = self.options.output_encoding;
        Ok(self.read_line()?.map(|fields| {
            fields
                .iter()
                .map(|f| encode_text(f, encoding).into_owned())
                .collect()
        }))
    }

    /// Reads the next row and uses it as the column schema.
    ///
    /// An empty source leaves an empty schema.
    pub fn read_columns(&mut self) -> Result<&mut Self> {
        let columns = self.read_line()?.unwrap_or_default();
        Ok(self.set_columns(columns))
    }

    /// Reads the next row as a record keyed by the column schema, with casts applied.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        if self.schema.is_none() {
            return Err(CsvError::ColumnsUnknown("read_record"));
        }
        let Some(fields) = self.read_line()? else {
            return Ok(None);
        };
        let Some(schema) = self.schema.as_ref() else {
            return Err(CsvError::ColumnsUnknown("read_record"));
        };

        let mut record = schema.map_row(fields);
        for (column, pipeline) in &self.pipelines {
            if let Some(value) = record.get_mut(column) {
                let raw = std::mem::take(value);
                *value = self.converters.apply(pipeline, raw);
            }
        }
        Ok(Some(record))
    }

    /// Lazy sequence of the remaining rows.
    pub fn rows(&mut self) -> Rows<'_, R> {
        Rows { reader: self }
    }

    /// Lazy sequence of the remaining records.
    pub fn records(&mut self) -> Records<'_, R> {
        Records { reader: self }
    }
}

impl CsvReader<File> {
    pub fn open_path(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.open(file)
    }
}

impl CsvReader<Cursor<Vec<u8>>> {
    /// Reader over in-memory text using the default options.
    pub fn open_string(text: impl Into<String>, bom_detection: bool) -> Result<Self> {
        let mut reader = Self::new();
        reader.open_with_bom_detection(Cursor::new(text.into().into_bytes()), bom_detection)?;
        Ok(reader)
    }
}

fn compile_casts(
    converters: &Converters,
    casts: &IndexMap<String, CastSpec>,
) -> Result<IndexMap<String, Pipeline>> {
    casts
        .iter()
        .map(|(k, c)| Ok((k.clone(), converters.compile(c)?)))
        .collect()
}

/// Iterator returned by [`CsvReader::rows`].
pub struct Rows<'a, R> {
    reader: &'a mut CsvReader<R>,
}

impl<R: Read> Iterator for Rows<'_, R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_line().transpose()
    }
}

/// Iterator returned by [`CsvReader::records`].
pub struct Records<'a, R> {
    reader: &'a mut CsvReader<R>,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}
