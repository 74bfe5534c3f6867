//! Row encoder: field arrays to delimited text

use crate::common::Dialect;

/// Turns rows of field strings into delimited, escaped lines.
///
/// The character tables are derived from the dialect once, when the writer
/// opens its target; the dialect cannot change afterwards.
#[derive(Debug, Clone)]
pub struct RowEncoder {
    delimiter: char,
    enclosure: Option<char>,
    escape: Option<char>,
    always_quote: bool,
    linebreak: String,
    illegal_char_replace: String,
    /// Characters forcing a field into quotes (or being replaced when unquoted).
    special: Vec<char>,
    /// Characters which must be escaped inside quotes.
    escapable: Vec<char>,
}

impl RowEncoder {
    pub fn new(dialect: &Dialect) -> Self {
        let (special, escapable) = match dialect.enclosure {
            Some(enclosure) => {
                let mut special = vec![enclosure];
                special.extend(dialect.escape);
                special.extend([dialect.delimiter, ' ', '\r', '\n']);
                special.dedup();

                let mut escapable = vec![enclosure];
                escapable.extend(dialect.distinct_escape());
                (special, escapable)
            }
            None => (vec![dialect.delimiter, '\r', '\n'], Vec::new()),
        };

        Self {
            delimiter: dialect.delimiter,
            enclosure: dialect.enclosure,
            escape: dialect.escape,
            always_quote: dialect.always_quote,
            linebreak: dialect.linebreak.clone(),
            illegal_char_replace: dialect.illegal_char_replace.clone(),
            special,
            escapable,
        }
    }

    pub fn set_illegal_char_replace(&mut self, replace: &str) {
        self.illegal_char_replace = replace.to_string();
    }

    /// Encodes one row including the trailing line break. `None` fields are written empty.
    pub fn encode_row<'a, I>(&self, fields: I) -> String
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut line = String::new();
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            if let Some(value) = field {
                self.encode_field(value, &mut line);
            }
        }
        line.push_str(&self.linebreak);
        line
    }

    /// Appends one field, quoted and escaped as the dialect requires.
    pub fn encode_field(&self, value: &str, out: &mut String) {
        let Some(enclosure) = self.enclosure else {
            // No quoting mechanism: offending characters cannot be preserved
            for c in value.chars() {
                if self.special.contains(&c) {
                    out.push_str(&self.illegal_char_replace);
                } else {
                    out.push(c);
                }
            }
            return;
        };

        if !self.needs_quoting(value) {
            out.push_str(value);
            return;
        }

        out.reserve(value.len() + 2);
        out.push(enclosure);
        for c in value.chars() {
            if self.escapable.contains(&c) {
                match self.escape {
                    Some(escape) => {
                        out.push(escape);
                        out.push(c);
                    }
                    None => out.push_str(&self.illegal_char_replace),
                }
            } else {
                out.push(c);
            }
        }
        out.push(enclosure);
    }

    fn needs_quoting(&self, value: &str) -> bool {
        self.always_quote || value.contains(self.special.as_slice())
    }
}
