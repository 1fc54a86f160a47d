use std::path::PathBuf;

use crate::parser::unescape_separator;
use crate::record::{default_key_order, KeyOrder};
use crate::swapper::Swapper;

/// Configuration of an [`Indexer`](crate::indexer::Indexer).
///
/// # Examples
/// ```
/// use tsv_sort::options::IndexerOptions;
///
/// let mut options = IndexerOptions::new();
/// options.with_separator(",");
/// options.with_header();
/// options.with_fields(vec!["price".to_string(), "symbol".to_string()]);
/// ```
pub struct IndexerOptions {
    pub(crate) separator: u8,
    pub(crate) quote: u8,
    pub(crate) has_header: bool,
    pub(crate) fields: Vec<String>,
    pub(crate) drop_empty_keys: bool,
    pub(crate) skip_malformed: bool,
    pub(crate) lazy_quotes: bool,
    pub(crate) line_threshold: usize,
    pub(crate) key_order: KeyOrder,
    pub(crate) memory_limit: Option<(u64, PathBuf)>,
    pub(crate) swapper: Option<Swapper>,
}

impl IndexerOptions {
    /// Default options: comma separator, double-quote quoting, no header, no
    /// spilling, one extra read handle per 2,500,000 records.
    pub fn new() -> IndexerOptions {
        IndexerOptions {
            separator: b',',
            quote: b'"',
            has_header: false,
            fields: Vec::new(),
            drop_empty_keys: false,
            skip_malformed: false,
            lazy_quotes: false,
            line_threshold: 2_500_000,
            key_order: default_key_order,
            memory_limit: None,
            swapper: None,
        }
    }

    /// Set the field separator. The composed sequence `\t` decodes to a
    /// single tab byte.
    pub fn with_separator(&mut self, separator: &str) {
        self.separator = unescape_separator(separator);
    }

    /// Set the quote byte. The default is `"`.
    pub fn with_quote_char(&mut self, quote: u8) {
        self.quote = quote;
    }

    /// The first line holds the field names. It is preserved at the top of
    /// the output.
    pub fn with_header(&mut self) {
        self.has_header = true;
    }

    /// Ordered list of field names composing the sort key. Without a header
    /// the names follow the pattern `varN` where `var1` is the first column.
    pub fn with_fields(&mut self, fields: Vec<String>) {
        self.fields = fields;
    }

    /// Append one field name to the sort key.
    pub fn add_field(&mut self, field: &str) {
        self.fields.push(field.to_string());
    }

    /// Discard records whose key holds only empty field values.
    pub fn with_drop_empty_keys(&mut self) {
        self.drop_empty_keys = true;
    }

    /// Discard rows whose field count disagrees with the first observed row.
    pub fn with_skip_malformed(&mut self) {
        self.skip_malformed = true;
    }

    /// Accept bare quotes in unquoted fields and stray quotes in quoted
    /// fields instead of failing.
    pub fn with_lazy_quotes(&mut self) {
        self.lazy_quotes = true;
    }

    /// One extra read handle is opened per `line_threshold` records for the
    /// output phase. The default is 2,500,000.
    pub fn with_line_threshold(&mut self, line_threshold: usize) {
        self.line_threshold = line_threshold;
    }

    /// Enable disk spilling: when resident memory approaches `bytes` the
    /// index is dumped under `basepath`.
    pub fn with_memory_limit<P: Into<PathBuf>>(&mut self, bytes: u64, basepath: P) {
        self.memory_limit = Some((bytes, basepath.into()));
    }

    /// Use the given swapper instead of building one from the memory limit.
    pub fn with_swapper(&mut self, swapper: Swapper) {
        self.swapper = Some(swapper);
    }

    /// Replace the key comparison function. The default compares keys as raw
    /// unsigned byte sequences.
    pub fn with_key_order(&mut self, key_order: KeyOrder) {
        self.key_order = key_order;
    }
}

impl Default for IndexerOptions {
    fn default() -> Self {
        IndexerOptions::new()
    }
}
