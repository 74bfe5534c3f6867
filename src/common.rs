//! Dialect configuration shared between reader and writer

use crate::error::{CsvError, Result};
use serde::{Deserialize, Serialize};

/// Delimiter, quoting and line break rules of one CSV stream.
///
/// A dialect is frozen once a stream is opened; the reader and writer refuse
/// changes until the stream is closed or detached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    /// Field separator (default: `,`)
    pub delimiter: char,
    /// Quoting character, `None` disables quoting entirely (default: `"`)
    pub enclosure: Option<char>,
    /// Character neutralizing an enclosure inside a quoted field (default: `"`)
    pub escape: Option<char>,
    /// Line terminator appended by the writer (default: `\n`)
    pub linebreak: String,
    /// Quote every field, not only those containing special characters
    pub always_quote: bool,
    /// Replacement for characters which cannot be escaped
    pub illegal_char_replace: String,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: ',',
            enclosure: Some('"'),
            escape: Some('"'),
            linebreak: "\n".to_string(),
            always_quote: false,
            illegal_char_replace: String::new(),
        }
    }
}

impl Dialect {
    /// Dialect without any quoting mechanism.
    pub fn unquoted(delimiter: char) -> Self {
        Self {
            delimiter,
            enclosure: None,
            escape: None,
            ..Self::default()
        }
    }

    /// Returns the escape character if it differs from the enclosure.
    pub(crate) fn distinct_escape(&self) -> Option<char> {
        match (self.enclosure, self.escape) {
            (Some(enc), Some(esc)) if enc != esc => Some(esc),
            _ => None,
        }
    }

    /// Checks that the dialect can tokenize unambiguously.
    pub(crate) fn validate(&self) -> Result<()> {
        if matches!(self.delimiter, '\r' | '\n') {
            return Err(CsvError::InvalidDialect(
                "delimiter must not be a line break".to_string(),
            ));
        }
        if self.enclosure == Some(self.delimiter) {
            return Err(CsvError::InvalidDialect(
                "delimiter and enclosure must differ".to_string(),
            ));
        }
        if self.enclosure.is_some() && self.escape == Some(self.delimiter) {
            return Err(CsvError::InvalidDialect(
                "delimiter and escape must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a reader or writer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Never opened.
    Unbound,
    Open,
    /// Closed by `close`; a new `open` is allowed.
    Closed,
    /// Released by `detach`; a new `open` is allowed.
    Detached,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dialect() {
        let d = Dialect::default();
        assert_eq!(d.delimiter, ',');
        assert_eq!(d.enclosure, Some('"'));
        assert_eq!(d.escape, Some('"'));
        assert_eq!(d.linebreak, "\n");
        assert!(d.distinct_escape().is_none());
    }

    #[test]
    fn test_distinct_escape() {
        let d = Dialect {
            escape: Some('\\'),
            ..Dialect::default()
        };
        assert_eq!(d.distinct_escape(), Some('\\'));
        assert!(Dialect::unquoted(';').distinct_escape().is_none());
    }

    #[test]
    fn test_validate_rejects_ambiguous() {
        let d = Dialect {
            enclosure: Some(','),
            ..Dialect::default()
        };
        assert!(matches!(d.validate(), Err(CsvError::InvalidDialect(_))));
        assert!(Dialect::unquoted('\n').validate().is_err());
        assert!(Dialect::default().validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let d: Dialect = serde_json::from_str(r#"{"delimiter": ";", "enclosure": null}"#).unwrap();
        assert_eq!(d.delimiter, ';');
        assert_eq!(d.enclosure, None);
        assert_eq!(d.escape, Some('"'));
    }
}
