//! Character encodings, byte order marks and transcoding.
//!
//! Rust text is always UTF-8, so UTF-8 is the internal working encoding of the
//! crate. Everything else is converted at the byte boundary: the read path wraps
//! the source in a [`DecodingReader`], the write path owns a [`Transcoder`].

use crate::error::{CsvError, Result};
use encoding_rs::{CoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::io::{self, Chain, Cursor, Read};

/// A character encoding usable for CSV input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// UTF-16 of unknown endianness; big-endian unless a BOM says otherwise.
    Utf16,
    Utf16Be,
    Utf16Le,
    /// UTF-32 of unknown endianness; big-endian unless a BOM says otherwise.
    Utf32,
    Utf32Be,
    Utf32Le,
    /// Any other encoding known to `encoding_rs` (single-byte and legacy multi-byte).
    Legacy(&'static Encoding),
}

impl TextEncoding {
    /// Resolves an encoding label such as `UTF-8`, `utf-16le` or `ISO-8859-1`.
    pub fn for_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_uppercase();
        let encoding = match normalized.as_str() {
            "UTF-8" | "UTF8" => Self::Utf8,
            "UTF-16" | "UTF16" => Self::Utf16,
            "UTF-16BE" => Self::Utf16Be,
            "UTF-16LE" => Self::Utf16Le,
            "UTF-32" | "UTF32" => Self::Utf32,
            "UTF-32BE" => Self::Utf32Be,
            "UTF-32LE" => Self::Utf32Le,
            _ => match Encoding::for_label(normalized.as_bytes()) {
                Some(enc) if enc == UTF_8 => Self::Utf8,
                Some(enc) if enc == UTF_16BE => Self::Utf16Be,
                Some(enc) if enc == UTF_16LE => Self::Utf16Le,
                Some(enc) => Self::Legacy(enc),
                None => return Err(CsvError::UnknownEncoding(label.to_string())),
            },
        };
        Ok(encoding)
    }

    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16 => "UTF-16",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf32 => "UTF-32",
            Self::Utf32Be => "UTF-32BE",
            Self::Utf32Le => "UTF-32LE",
            Self::Legacy(enc) => enc.name(),
        }
    }

    /// The byte order mark written for this encoding, if it has one.
    ///
    /// Endianness-ambiguous `UTF-16`/`UTF-32` have none: the writer would not
    /// know which byte order to announce.
    pub fn bom(&self) -> Option<Bom> {
        match self {
            Self::Utf8 => Some(Bom::Utf8),
            Self::Utf16Be => Some(Bom::Utf16Be),
            Self::Utf16Le => Some(Bom::Utf16Le),
            Self::Utf32Be => Some(Bom::Utf32Be),
            Self::Utf32Le => Some(Bom::Utf32Le),
            _ => None,
        }
    }

    /// BOMs worth probing for when reading with this declared encoding.
    fn bom_candidates(&self) -> &'static [Bom] {
        match self {
            Self::Utf8 => &[Bom::Utf8],
            Self::Utf16 | Self::Utf16Be | Self::Utf16Le => &[Bom::Utf16Be, Bom::Utf16Le],
            Self::Utf32 | Self::Utf32Be | Self::Utf32Le => &[Bom::Utf32Be, Bom::Utf32Le],
            Self::Legacy(_) => &[],
        }
    }

    /// Replaces an endianness-ambiguous encoding by the variant a BOM announces.
    fn refine(self, bom: Bom) -> Self {
        match (self, bom) {
            (Self::Utf16, Bom::Utf16Be) => Self::Utf16Be,
            (Self::Utf16, Bom::Utf16Le) => Self::Utf16Le,
            (Self::Utf32, Bom::Utf32Be) => Self::Utf32Be,
            (Self::Utf32, Bom::Utf32Le) => Self::Utf32Le,
            (enc, _) => enc,
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::Utf8
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TextEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for TextEncoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        TextEncoding::for_label(&label).map_err(serde::de::Error::custom)
    }
}

/// A byte order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bom {
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
}

impl Bom {
    /// The literal BOM bytes.
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            Bom::Utf8 => b"\xEF\xBB\xBF",
            Bom::Utf16Be => b"\xFE\xFF",
            Bom::Utf16Le => b"\xFF\xFE",
            Bom::Utf32Be => b"\x00\x00\xFE\xFF",
            Bom::Utf32Le => b"\xFF\xFE\x00\x00",
        }
    }
}

/// Outcome of probing a source for a byte order mark.
pub struct BomResolution<R> {
    /// Encoding to decode the remaining bytes with.
    pub encoding: TextEncoding,
    /// The BOM that was found and consumed.
    pub bom: Option<Bom>,
    /// The source, positioned after the BOM (or at its start when none was found).
    pub source: Chain<Cursor<Vec<u8>>, R>,
}

/// Probes the start of `source` for a BOM belonging to the `declared` encoding family.
///
/// On a match the BOM is consumed and `UTF-16`/`UTF-32` are refined to the
/// announced byte order. Otherwise the probed bytes are pushed back in front of
/// the source, so nothing is lost and no seeking is required. With `detect`
/// disabled no byte is inspected.
pub fn resolve_bom<R: Read>(
    mut source: R,
    declared: TextEncoding,
    detect: bool,
) -> io::Result<BomResolution<R>> {
    let candidates = declared.bom_candidates();
    if !detect || candidates.is_empty() {
        return Ok(BomResolution {
            encoding: declared,
            bom: None,
            source: Cursor::new(Vec::new()).chain(source),
        });
    }

    let probe_len = candidates[0].bytes().len();
    let mut probe = Vec::with_capacity(probe_len);
    (&mut source)
        .take(probe_len as u64)
        .read_to_end(&mut probe)?;

    if let Some(bom) = candidates.iter().copied().find(|b| b.bytes() == probe.as_slice()) {
        return Ok(BomResolution {
            encoding: declared.refine(bom),
            bom: Some(bom),
            source: Cursor::new(Vec::new()).chain(source),
        });
    }

    Ok(BomResolution {
        encoding: declared,
        bom: None,
        source: Cursor::new(probe).chain(source),
    })
}

enum StreamDecoder {
    Rs(encoding_rs::Decoder),
    Utf32 { big_endian: bool, pending: Vec<u8> },
}

impl StreamDecoder {
    fn new(encoding: TextEncoding) -> Self {
        match encoding {
            TextEncoding::Utf8 => Self::Rs(UTF_8.new_decoder_without_bom_handling()),
            TextEncoding::Utf16 | TextEncoding::Utf16Be => {
                Self::Rs(UTF_16BE.new_decoder_without_bom_handling())
            }
            TextEncoding::Utf16Le => Self::Rs(UTF_16LE.new_decoder_without_bom_handling()),
            TextEncoding::Utf32 | TextEncoding::Utf32Be => Self::Utf32 {
                big_endian: true,
                pending: Vec::new(),
            },
            TextEncoding::Utf32Le => Self::Utf32 {
                big_endian: false,
                pending: Vec::new(),
            },
            TextEncoding::Legacy(enc) => Self::Rs(enc.new_decoder_without_bom_handling()),
        }
    }

    fn decode(&mut self, mut input: &[u8], out: &mut String, last: bool) {
        match self {
            Self::Rs(decoder) => loop {
                let needed = decoder
                    .max_utf8_buffer_length(input.len())
                    .unwrap_or(input.len().saturating_mul(3).saturating_add(16));
                out.reserve(needed);
                let (result, read, _) = decoder.decode_to_string(input, out, last);
                input = &input[read..];
                if result == CoderResult::InputEmpty {
                    break;
                }
            },
            Self::Utf32 {
                big_endian,
                pending,
            } => {
                pending.extend_from_slice(input);
                let whole = pending.len() - pending.len() % 4;
                decode_utf32_into(&pending[..whole], *big_endian, out);
                pending.drain(..whole);
                if last && !pending.is_empty() {
                    pending.clear();
                    out.push(char::REPLACEMENT_CHARACTER);
                }
            }
        }
    }
}

fn decode_utf32_into(bytes: &[u8], big_endian: bool, out: &mut String) {
    out.reserve(bytes.len() / 4);
    for unit in bytes.chunks_exact(4) {
        let quad = [unit[0], unit[1], unit[2], unit[3]];
        let code = if big_endian {
            u32::from_be_bytes(quad)
        } else {
            u32::from_le_bytes(quad)
        };
        out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
}

const RAW_CHUNK: usize = 8 * 1024;

/// A [`Read`] adapter producing UTF-8 from a source in any [`TextEncoding`].
///
/// Malformed input is replaced by U+FFFD instead of failing the read.
pub struct DecodingReader<R> {
    source: R,
    decoder: StreamDecoder,
    raw: Vec<u8>,
    decoded: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(source: R, encoding: TextEncoding) -> Self {
        Self {
            source,
            decoder: StreamDecoder::new(encoding),
            raw: vec![0; RAW_CHUNK],
            decoded: Vec::new(),
            pos: 0,
            finished: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let n = loop {
            match self.source.read(&mut self.raw) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        let last = n == 0;
        let mut text = String::new();
        self.decoder.decode(&self.raw[..n], &mut text, last);
        self.finished = last;
        self.decoded = text.into_bytes();
        self.pos = 0;
        Ok(())
    }
}

impl<R> DecodingReader<R> {
    /// Unwraps the source. Bytes already pulled from it but not yet read are lost.
    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.decoded.len() {
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }
        let n = buf.len().min(self.decoded.len() - self.pos);
        buf[..n].copy_from_slice(&self.decoded[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Encodes UTF-8 text into `encoding`.
///
/// Characters a legacy encoding cannot represent become numeric character
/// references, as `encoding_rs` produces them.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Cow<'_, [u8]> {
    match encoding {
        TextEncoding::Utf8 => Cow::Borrowed(text.as_bytes()),
        TextEncoding::Utf16 | TextEncoding::Utf16Be => {
            Cow::Owned(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
        }
        TextEncoding::Utf16Le => {
            Cow::Owned(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
        }
        TextEncoding::Utf32 | TextEncoding::Utf32Be => {
            Cow::Owned(text.chars().flat_map(|c| u32::from(c).to_be_bytes()).collect())
        }
        TextEncoding::Utf32Le => {
            Cow::Owned(text.chars().flat_map(|c| u32::from(c).to_le_bytes()).collect())
        }
        TextEncoding::Legacy(enc) => {
            let (bytes, _, unmappable) = enc.encode(text);
            if unmappable {
                tracing::warn!(
                    encoding = enc.name(),
                    "text contains characters the output encoding cannot represent"
                );
            }
            bytes
        }
    }
}

/// Decodes bytes in `encoding` into UTF-8 text. A leading BOM is kept as data.
pub fn decode_bytes(bytes: &[u8], encoding: TextEncoding) -> Cow<'_, str> {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes),
        TextEncoding::Utf16 | TextEncoding::Utf16Be => {
            UTF_16BE.decode_without_bom_handling(bytes).0
        }
        TextEncoding::Utf16Le => UTF_16LE.decode_without_bom_handling(bytes).0,
        TextEncoding::Utf32 | TextEncoding::Utf32Be | TextEncoding::Utf32Le => {
            let mut out = String::new();
            let whole = bytes.len() - bytes.len() % 4;
            let big_endian = encoding != TextEncoding::Utf32Le;
            decode_utf32_into(&bytes[..whole], big_endian, &mut out);
            if whole < bytes.len() {
                out.push(char::REPLACEMENT_CHARACTER);
            }
            Cow::Owned(out)
        }
        TextEncoding::Legacy(enc) => enc.decode_without_bom_handling(bytes).0,
    }
}

/// Converts text between a caller-side and a stream-side encoding.
///
/// Each writer owns one; nothing is registered globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    from: TextEncoding,
    to: TextEncoding,
}

impl Transcoder {
    pub fn new(from: TextEncoding, to: TextEncoding) -> Self {
        Self { from, to }
    }

    pub fn from_encoding(&self) -> TextEncoding {
        self.from
    }

    pub fn to_encoding(&self) -> TextEncoding {
        self.to
    }

    /// Interprets caller bytes in the source encoding.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        decode_bytes(bytes, self.from)
    }

    /// Produces bytes in the target encoding.
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        encode_text(text, self.to)
    }
}
