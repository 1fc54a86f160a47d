use std::io;
use std::path::Path;

use crate::error::{QuoteError, ScanError};
use crate::scanner::Scanner;

/// Decode a composed separator argument. The two-character sequence `\t` maps
/// to a single tab byte; any other value contributes its first byte. An empty
/// value falls back to a comma.
pub fn unescape_separator(separator: &str) -> u8 {
    if separator == "\\t" {
        return b'\t';
    }
    separator.as_bytes().first().copied().unwrap_or(b',')
}

/// Strip one trailing newline sequence (`\n`, `\r`, `\r\n` or `\n\r`) from a
/// line.
pub fn trim_newline(mut line: &[u8]) -> &[u8] {
    if line.ends_with(b"\n") {
        line = &line[..line.len() - 1];
    }
    if line.ends_with(b"\r") {
        line = &line[..line.len() - 1];
    }
    if line.ends_with(b"\n") {
        line = &line[..line.len() - 1];
    }
    line
}

// A parsed field is either a span into the current line buffer or, when
// quote unescaping forced a copy, an owned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldSpan {
    Span(usize, usize),
    Owned(Vec<u8>),
}

/// Reads rows from a delimited file, one row per line.
///
/// The expected input conforms to RFC 4180 except that newlines inside quoted
/// fields are not supported. Inside a quoted field a quote byte must be
/// doubled; all other bytes, including the separator, pass through verbatim.
/// With `lazy_quotes` enabled a quote may appear in an unquoted field and a
/// non-doubled quote may appear in a quoted field.
///
/// Lines without any quote byte are split on the separator without copying a
/// single field byte.
pub struct Parser {
    scanner: Scanner,
    separator: u8,
    quote: u8,
    lazy_quotes: bool,
    err: Option<ScanError>,
    spans: Vec<FieldSpan>,
}

impl Parser {
    pub fn new(mut scanner: Scanner, separator: u8) -> Parser {
        scanner.keep_newline_sequence(true);
        Parser {
            scanner,
            separator,
            quote: b'"',
            lazy_quotes: false,
            err: None,
            spans: Vec::new(),
        }
    }

    pub fn with_quote_char(&mut self, quote: u8) {
        self.quote = quote;
    }

    pub fn with_lazy_quotes(&mut self, lazy_quotes: bool) {
        self.lazy_quotes = lazy_quotes;
    }

    /// The first error encountered while scanning or parsing. Parse errors do
    /// not stop [`Parser::scan_row`]; the error stays set until
    /// [`Parser::reset`].
    pub fn err(&self) -> Option<&ScanError> {
        self.err.as_ref()
    }

    /// Advance the parser to the next row. A single row corresponds to a
    /// single line of the input.
    pub fn scan_row(&mut self) -> bool {
        let mut more = self.scanner.scan_line();
        if let Some(e) = self.scanner.err() {
            let io_error = ScanError::from_io(e);
            self.err.get_or_insert(io_error);
            more = !self.scanner.is_line_empty();
        }

        if more {
            self.parse_fields();
        }
        more
    }

    /// Number of fields in the current row.
    pub fn field_count(&self) -> usize {
        self.spans.len()
    }

    /// The field at `index` in the current row, without its enclosing quotes
    /// and with doubled quotes decoded. The returned slice is invalidated by
    /// the next call to [`Parser::scan_row`].
    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.spans.get(index).map(|span| match span {
            FieldSpan::Span(start, end) => &self.scanner.bytes()[*start..*end],
            FieldSpan::Owned(bytes) => bytes.as_slice(),
        })
    }

    /// All fields of the current row.
    pub fn row(&self) -> Vec<&[u8]> {
        (0..self.spans.len())
            .map(|index| self.field(index).unwrap())
            .collect()
    }

    /// Reset the parser and its underlying scanner, releasing row state.
    pub fn reset(&mut self) -> Result<(), io::Error> {
        self.scanner.reset()?;
        self.err = None;
        self.spans.clear();
        Ok(())
    }

    pub fn line(&self) -> i64 {
        self.scanner.line()
    }

    pub fn offset(&self) -> u64 {
        self.scanner.offset()
    }

    pub fn length(&self) -> u32 {
        self.scanner.length()
    }

    pub fn newline_sequence(&self) -> &[u8] {
        self.scanner.newline_sequence()
    }

    pub fn path(&self) -> &Path {
        self.scanner.path()
    }

    fn parse_fields(&mut self) {
        let row = trim_newline(self.scanner.bytes());
        let (spans, parse_error) =
            parse_row(row, self.separator, self.quote, self.lazy_quotes);
        self.spans = spans;
        if let Some((column, err)) = parse_error {
            let line = self.scanner.line();
            self.err.get_or_insert(ScanError::Parse { line, column, err });
        }
    }
}

// Parse one trimmed row into field spans. On a malformed quote construct the
// spans parsed so far are returned together with the error column.
fn parse_row(
    row: &[u8],
    separator: u8,
    quote: u8,
    lazy_quotes: bool,
) -> (Vec<FieldSpan>, Option<(usize, QuoteError)>) {
    let mut spans = Vec::new();

    if !row.contains(&quote) {
        // unquoted line (fast mode)
        let mut start = 0;
        for (i, b) in row.iter().enumerate() {
            if *b == separator {
                spans.push(FieldSpan::Span(start, i));
                start = i + 1;
            }
        }
        spans.push(FieldSpan::Span(start, row.len()));
        return (spans, None);
    }

    // quoted line (normal mode)
    let mut cursor = RowCursor::new(row);
    loop {
        match parse_field(&mut cursor, separator, quote, lazy_quotes) {
            Ok(Some(span)) => spans.push(span),
            Ok(None) => return (spans, None),
            Err(err) => return (spans, Some(err)),
        }
    }
}

fn parse_field(
    cursor: &mut RowCursor<'_>,
    separator: u8,
    quote: u8,
    lazy_quotes: bool,
) -> Result<Option<FieldSpan>, (usize, QuoteError)> {
    let b = match cursor.read_byte() {
        None => {
            if cursor.is_last_byte(separator) && !cursor.eof {
                cursor.eof = true;
                // the row ends with a separator, emit a final empty field
                return Ok(Some(FieldSpan::Span(cursor.row.len(), cursor.row.len())));
            }
            return Ok(None);
        }
        Some(b) => b,
    };

    if b == separator {
        return Ok(Some(FieldSpan::Span(cursor.index - 1, cursor.index - 1)));
    }
    if b == quote {
        quoted_field(cursor, separator, quote, lazy_quotes)
    } else {
        unquoted_field(cursor, separator, quote, lazy_quotes)
    }
}

fn quoted_field(
    cursor: &mut RowCursor<'_>,
    separator: u8,
    quote: u8,
    lazy_quotes: bool,
) -> Result<Option<FieldSpan>, (usize, QuoteError)> {
    // Fast mode, taken when the quoted field has no inner quote, e.g.
    // `...,"col 1",...'. The closing quote is then immediately followed by a
    // separator and the content is a single span between the quotes.
    if let (Some(quote_index), Some(separator_index)) =
        (cursor.index_of(quote), cursor.index_of(separator))
    {
        if quote_index + 1 == separator_index {
            let start = cursor.index;
            let end = cursor.index + quote_index;
            cursor.index += separator_index + 1;
            return Ok(Some(FieldSpan::Span(start, end)));
        }
    }

    // Normal mode, taken when the quoted field is more complex, e.g.
    // `...,"col ""is"" 1",...'.
    let mut field = Vec::new();
    loop {
        let b = match cursor.read_byte() {
            None => {
                // end of row reached inside an open quoted field
                if !lazy_quotes {
                    return Err((cursor.index, QuoteError::Quote));
                }
                return Ok(Some(FieldSpan::Owned(field)));
            }
            Some(b) => b,
        };

        if b == quote {
            match cursor.read_byte() {
                Some(next) if next == separator => return Ok(Some(FieldSpan::Owned(field))),
                None => return Ok(Some(FieldSpan::Owned(field))),
                Some(next) if next == quote => field.push(quote),
                Some(next) => {
                    if !lazy_quotes {
                        return Err((cursor.index - 1, QuoteError::Quote));
                    }
                    // accept the stray quote
                    field.push(quote);
                    field.push(next);
                }
            }
        } else {
            field.push(b);
        }
    }
}

fn unquoted_field(
    cursor: &mut RowCursor<'_>,
    separator: u8,
    quote: u8,
    lazy_quotes: bool,
) -> Result<Option<FieldSpan>, (usize, QuoteError)> {
    let separator_index = cursor.index_of(separator);
    let quote_index = cursor.index_of(quote);

    // Fast mode, taken when no quote occurs before the end of the field,
    // e.g. `..,col1,..'.
    let fast = match (separator_index, quote_index) {
        (_, None) => true,
        (Some(si), Some(qi)) => si < qi,
        (None, Some(_)) => false,
    };
    if fast {
        let start = cursor.index - 1;
        let end = match separator_index {
            None => {
                let end = cursor.row.len();
                cursor.index = end;
                end
            }
            Some(si) => {
                let end = cursor.index + si;
                cursor.index += si + 1;
                end
            }
        };
        return Ok(Some(FieldSpan::Span(start, end)));
    }

    // A quote byte is present in the current unquoted field, e.g. `col"5'.
    let mut field = Vec::new();
    let mut b = cursor.row[cursor.index - 1];
    loop {
        field.push(b);
        b = match cursor.read_byte() {
            None => return Ok(Some(FieldSpan::Owned(field))),
            Some(next) => next,
        };
        if b == separator {
            return Ok(Some(FieldSpan::Owned(field)));
        }
        if !lazy_quotes && b == quote {
            return Err((cursor.index, QuoteError::BareQuote));
        }
    }
}

struct RowCursor<'a> {
    row: &'a [u8],
    index: usize,
    eof: bool,
}

impl<'a> RowCursor<'a> {
    fn new(row: &'a [u8]) -> RowCursor<'a> {
        RowCursor {
            row,
            index: 0,
            eof: false,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let b = self.row.get(self.index).copied();
        if b.is_some() {
            self.index += 1;
        }
        b
    }

    // index of the next occurrence of b, relative to the cursor
    fn index_of(&self, b: u8) -> Option<usize> {
        self.row[self.index..].iter().position(|x| *x == b)
    }

    fn is_last_byte(&self, b: u8) -> bool {
        self.row.last() == Some(&b)
    }
}
