//! Row tokenizer: delimited text to field arrays

use crate::common::Dialect;
use std::io::{self, BufRead};
use std::mem;

/// Splits decoded text into rows of raw field strings.
///
/// The tokenizer consumes one physical line at a time and pulls further lines
/// only while an enclosure is open, so line breaks inside quoted fields survive.
#[derive(Debug, Clone)]
pub struct RowTokenizer {
    delimiter: char,
    enclosure: Option<char>,
    /// Escape character, only when it differs from the enclosure.
    escape: Option<char>,
    line: String,
    line_num: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    AfterQuote,
}

impl RowTokenizer {
    pub fn new(dialect: &Dialect) -> Self {
        Self {
            delimiter: dialect.delimiter,
            enclosure: dialect.enclosure,
            escape: dialect.distinct_escape(),
            line: String::new(),
            line_num: 0,
        }
    }

    /// Number of physical lines consumed so far.
    pub fn line_num(&self) -> usize {
        self.line_num
    }

    /// Reads the next row. Blank lines are skipped; `Ok(None)` signals end of input.
    pub fn next_row<B: BufRead>(&mut self, input: &mut B) -> io::Result<Option<Vec<String>>> {
        loop {
            if !self.read_physical_line(input)? {
                return Ok(None);
            }
            if strip_terminator(&self.line).is_empty() {
                continue;
            }

            let fields = match self.enclosure {
                None => self.split_plain(),
                Some(enclosure) => self.parse_enclosed(input, enclosure)?,
            };
            tracing::trace!(line = self.line_num, fields = fields.len(), "tokenized row");
            return Ok(Some(fields));
        }
    }

    fn read_physical_line<B: BufRead>(&mut self, input: &mut B) -> io::Result<bool> {
        self.line.clear();
        let n = input.read_line(&mut self.line)?;
        if n > 0 {
            self.line_num += 1;
        }
        Ok(n > 0)
    }

    /// Without an enclosure the line is split verbatim.
    fn split_plain(&self) -> Vec<String> {
        strip_terminator(&self.line)
            .split(self.delimiter)
            .map(str::to_string)
            .collect()
    }

    fn parse_enclosed<B: BufRead>(
        &mut self,
        input: &mut B,
        enclosure: char,
    ) -> io::Result<Vec<String>> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut state = State::FieldStart;

        loop {
            let chars: Vec<char> = self.line.chars().collect();
            let mut i = 0;

            while i < chars.len() {
                let c = chars[i];
                let next = chars.get(i + 1).copied();

                if state == State::Quoted {
                    if let Some(unescaped) = self.unescape(c, next, enclosure) {
                        field.push(unescaped);
                        i += 2;
                    } else if c == enclosure && next == Some(enclosure) {
                        field.push(enclosure);
                        i += 2;
                    } else if c == enclosure {
                        state = State::AfterQuote;
                        i += 1;
                    } else {
                        field.push(c);
                        i += 1;
                    }
                    continue;
                }

                if c == '\n' || (c == '\r' && matches!(next, None | Some('\n'))) {
                    fields.push(field);
                    return Ok(fields);
                }

                if c == self.delimiter {
                    fields.push(mem::take(&mut field));
                    state = State::FieldStart;
                    i += 1;
                    continue;
                }

                if state == State::FieldStart && c == enclosure {
                    state = State::Quoted;
                    i += 1;
                    continue;
                }

                // Text after a closing enclosure is kept literally
                if state == State::FieldStart {
                    state = State::Unquoted;
                }
                if let Some(unescaped) = self.unescape(c, next, enclosure) {
                    field.push(unescaped);
                    i += 2;
                } else {
                    field.push(c);
                    i += 1;
                }
            }

            if state != State::Quoted {
                fields.push(field);
                return Ok(fields);
            }

            // Enclosure still open: the field continues on the next line
            if !self.read_physical_line(input)? {
                tracing::warn!(
                    line = self.line_num,
                    "unterminated enclosure at end of input"
                );
                fields.push(field);
                return Ok(fields);
            }
        }
    }

    /// `<escape><enclosure>` and `<escape><escape>` collapse to their second character.
    fn unescape(&self, c: char, next: Option<char>, enclosure: char) -> Option<char> {
        let escape = self.escape?;
        match next {
            Some(n) if c == escape && (n == enclosure || n == escape) => Some(n),
            _ => None,
        }
    }
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Tokenizes every row of an in-memory text.
pub fn tokenize(text: &str, dialect: &Dialect) -> Vec<Vec<String>> {
    let mut tokenizer = RowTokenizer::new(dialect);
    let mut input = text.as_bytes();
    let mut rows = Vec::new();
    // Reading from a byte slice cannot fail
    while let Ok(Some(row)) = tokenizer.next_row(&mut input) {
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(text: &str) -> Vec<Vec<String>> {
        tokenize(text, &Dialect::default())
    }

    #[test]
    fn test_simple_row() {
        assert_eq!(rows("a,b,c\n"), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn test_quoted_fields() {
        let text = "\"v1\"\"\",\"v,2\",v3,\"v 4\",\"v\"\"5\"\n";
        assert_eq!(rows(text), vec![vec!["v1\"", "v,2", "v3", "v 4", "v\"5"]]);
    }

    #[test]
    fn test_multiline_quoted_field() {
        let text = "w1,\"v\"\"\"\"\n5\"\nnext\n";
        assert_eq!(
            rows(text),
            vec![vec!["w1".to_string(), "v\"\"\n5".to_string()], vec!["next".to_string()]]
        );
    }

    #[test]
    fn test_blank_lines_skipped() {
        assert_eq!(rows("a,b\n\n\r\nc,d\n\n"), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_quoted_empty_line_is_a_row() {
        assert_eq!(rows("\"\"\n"), vec![vec![""]]);
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        assert_eq!(rows("a,\"b\"\r\nc,d"), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_distinct_escape() {
        let dialect = Dialect {
            escape: Some('\\'),
            ..Dialect::default()
        };
        let text = "\"v1\\\"\",\"v,2\",v3,\"v 4\",v\\\"5,\"v\"6\"\n";
        assert_eq!(
            tokenize(text, &dialect),
            vec![vec!["v1\"", "v,2", "v3", "v 4", "v\"5", "v6\""]]
        );
    }

    #[test]
    fn test_escaped_escape() {
        let dialect = Dialect {
            escape: Some('\\'),
            ..Dialect::default()
        };
        assert_eq!(tokenize("\"a\\\\b\",c\\d\n", &dialect), vec![vec!["a\\b", "c\\d"]]);
    }

    #[test]
    fn test_unquoted_dialect() {
        let dialect = Dialect::unquoted(',');
        let text = "v1\"\",'v,2',v3,\"v 4\n a,b, c, d, e";
        assert_eq!(
            tokenize(text, &dialect),
            vec![
                vec!["v1\"\"", "'v", "2'", "v3", "\"v 4"],
                vec![" a", "b", " c", " d", " e"],
            ]
        );
    }

    #[test]
    fn test_unterminated_enclosure() {
        assert_eq!(rows("a,\"open\nstill"), vec![vec!["a", "open\nstill"]]);
    }

    #[test]
    fn test_line_numbers() {
        let mut tokenizer = RowTokenizer::new(&Dialect::default());
        let mut input = "\"a\nb\"\n\nc\n".as_bytes();
        tokenizer.next_row(&mut input).unwrap();
        assert_eq!(tokenizer.line_num(), 2);
        tokenizer.next_row(&mut input).unwrap();
        assert_eq!(tokenizer.line_num(), 4);
        assert!(tokenizer.next_row(&mut input).unwrap().is_none());
    }
}
