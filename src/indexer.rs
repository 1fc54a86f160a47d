use std::collections::HashMap;
use std::io::{BufWriter, Write};

use anyhow::{anyhow, bail, Context};
use regex::Regex;

use crate::options::IndexerOptions;
use crate::parser::Parser;
use crate::record::IndexedRecord;
use crate::scanner::Scanner;
use crate::seeker_pool::SeekerPool;
use crate::swapper::Swapper;

const VAR_FIELD_PATTERN: &str = r"var(\d+)";

/// Factory producing fresh [`Scanner`] values over the same input. The
/// indexer draws one scanner for parsing and more for the read handles of the
/// output phase.
pub type ScannerFactory = Box<dyn Fn() -> Result<Scanner, anyhow::Error>>;

/// Sorts a delimited file by a composite column key without loading the file
/// content into memory.
///
/// [`Indexer::analyze`] streams the input once and builds an index of
/// `(key, offset, length)` records, spilling sorted runs to scratch storage
/// when the configured memory limit is approached. [`Indexer::sort`] orders
/// the index and [`Indexer::transfer`] writes the original lines to the
/// output in key order, reading them back through a pool of pre-positioned
/// file handles.
///
/// # Examples
/// ```
/// use std::fs::File;
/// use std::path::PathBuf;
///
/// use tsv_sort::indexer::Indexer;
/// use tsv_sort::options::IndexerOptions;
/// use tsv_sort::scanner::Scanner;
///
/// fn sort_by_symbol(input: PathBuf, output: PathBuf) -> Result<(), anyhow::Error> {
///     let mut options = IndexerOptions::new();
///     options.with_separator(",");
///     options.with_header();
///     options.with_fields(vec!["symbol".to_string()]);
///
///     let mut indexer = Indexer::new(move || Ok(Scanner::open(&input)?), options)?;
///     indexer.analyze()?;
///     indexer.sort();
///     indexer.transfer(File::create(&output)?)?;
///     Ok(())
/// }
/// ```
pub struct Indexer {
    options: IndexerOptions,
    parser: Parser,
    swapper: Swapper,
    factory: ScannerFactory,
    fields_index: HashMap<String, usize>,
    records: Vec<IndexedRecord>,
    expected_fields: Option<usize>,
    blank_key: Vec<u8>,
    seekers: SeekerPool,
}

impl Indexer {
    pub fn new<F>(factory: F, options: IndexerOptions) -> Result<Indexer, anyhow::Error>
    where
        F: Fn() -> Result<Scanner, anyhow::Error> + 'static,
    {
        let mut options = options;
        let scanner = factory().with_context(|| "open input")?;
        let mut parser = Parser::new(scanner, options.separator);
        parser.with_quote_char(options.quote);
        parser.with_lazy_quotes(options.lazy_quotes);

        let mut swapper = match options.swapper.take() {
            Some(swapper) => swapper,
            None => match options.memory_limit.take() {
                Some((limit, basepath)) => Swapper::new(limit, basepath)?,
                None => Swapper::null(),
            },
        };
        swapper.with_key_order(options.key_order);

        let blank_key = vec![0u8; options.fields.len()];
        Ok(Indexer {
            options,
            parser,
            swapper,
            factory: Box::new(factory),
            fields_index: HashMap::new(),
            records: Vec::new(),
            expected_fields: None,
            blank_key,
            seekers: SeekerPool::new(),
        })
    }

    /// The in-memory part of the index, in the order it currently holds.
    pub fn records(&self) -> &[IndexedRecord] {
        &self.records
    }

    pub fn swapper(&self) -> &Swapper {
        &self.swapper
    }

    /// Parse the input and build the index. Returns the first scan, parse or
    /// spill error encountered; partial scratch blobs are left behind for the
    /// caller to erase.
    pub fn analyze(&mut self) -> Result<(), anyhow::Error> {
        if !self.options.has_header {
            let pattern = Regex::new(VAR_FIELD_PATTERN).unwrap();
            for field in &self.options.fields {
                let index = pattern
                    .captures(field)
                    .and_then(|captures| captures[1].parse::<usize>().ok())
                    .unwrap_or(0);
                if index == 0 {
                    bail!("Field {} do not match with pattern /var\\d+/", field);
                }
            }
        }

        log::info!("Analyzing {}", self.parser.path().display());
        while self.parser.scan_row() {
            if let Some(err) = self.parser.err() {
                return Err(anyhow::Error::new(err.clone()));
            }
            self.append_record()?;
            self.maybe_spill(false)?;
        }
        if let Some(err) = self.parser.err() {
            return Err(anyhow::Error::new(err.clone()));
        }
        let lines = self.parser.line();
        self.maybe_spill(true)?;
        self.parser.reset()?;
        self.create_seekers()?;
        log::info!(
            "Analyzed {} lines, {} records in memory, {} runs on disk",
            lines,
            self.records.len(),
            self.swapper.run_count()
        );
        Ok(())
    }

    /// Order the in-memory index by key. When runs have been spilled the
    /// index is already ordered run by run and the merge realises the total
    /// order, so there is nothing to do.
    pub fn sort(&mut self) {
        if !self.swapper.has_spilled() {
            let key_order = self.options.key_order;
            self.records.sort_by(|a, b| key_order(&a.key, &b.key));
        }
    }

    /// Write all indexed records to `output` in key order, copying each line
    /// from the input file and terminating it with the canonical newline
    /// sequence of the file. On success all scratch blobs are erased.
    pub fn transfer<W: Write>(&mut self, output: W) -> Result<(), anyhow::Error> {
        let mut writer = BufWriter::new(output);
        let newline = self.parser.newline_sequence().to_vec();
        let terminator = newline.last().copied().unwrap_or(b'\n');

        if !self.swapper.has_spilled() {
            let records = std::mem::take(&mut self.records);
            self.swapper.keep_without_spill(records)?;
        }

        let mut transferred: usize = 0;
        for record in self.swapper.merge_iterator() {
            let record = record?;
            let mut token = self
                .seekers
                .read_at(record.offset, record.length)
                .with_context(|| {
                    format!(
                        "read record at offset {} length {}",
                        record.offset, record.length
                    )
                })?;
            if token.last() != Some(&terminator) {
                // the line had no terminator, append the canonical one
                token.extend_from_slice(&newline);
            }
            writer.write_all(&token)?;
            transferred += 1;
        }
        writer.flush()?;

        self.seekers.clear();
        self.swapper.erase_all()?;
        log::info!("Transferred {} records", transferred);
        Ok(())
    }

    fn append_record(&mut self) -> Result<(), anyhow::Error> {
        let field_count = self.parser.field_count();
        if self.options.skip_malformed {
            if let Some(expected) = self.expected_fields {
                if field_count != expected {
                    return Ok(());
                }
            }
        }

        let line = self.parser.line();
        let offset = self.parser.offset();
        let length = self.parser.length();

        if line == 0 && self.options.has_header {
            self.map_header_fields()?;
            self.expected_fields = Some(field_count);
            // an empty key sorts the header before every data record
            self.records.push(IndexedRecord::new(Vec::new(), offset, length));
            return Ok(());
        }
        if line == 0 {
            let pattern = Regex::new(VAR_FIELD_PATTERN).unwrap();
            for field in &self.options.fields {
                let index = pattern
                    .captures(field)
                    .and_then(|captures| captures[1].parse::<usize>().ok())
                    .ok_or_else(|| {
                        anyhow!("Field {} do not match with pattern /var\\d+/", field)
                    })?;
                self.fields_index.insert(field.clone(), index - 1);
            }
            self.expected_fields = Some(field_count);
        }

        let key = self.build_key()?;
        if self.options.drop_empty_keys && key == self.blank_key {
            return Ok(());
        }
        self.records.push(IndexedRecord::new(key, offset, length));
        Ok(())
    }

    // Resolve each configured field name to its column in the header row.
    fn map_header_fields(&mut self) -> Result<(), anyhow::Error> {
        for column in 0..self.parser.field_count() {
            let cell = self.parser.field(column).unwrap_or(b"");
            for field in &self.options.fields {
                if field.as_bytes() == cell {
                    self.fields_index.insert(field.clone(), column);
                    break;
                }
            }
        }
        if self.fields_index.len() != self.options.fields.len() {
            bail!("Invalid separator or sort fields");
        }
        Ok(())
    }

    // The field values are copied out of the parser's buffers, which the next
    // row overwrites.
    fn build_key(&self) -> Result<Vec<u8>, anyhow::Error> {
        let mut key = Vec::new();
        for field in &self.options.fields {
            let column = *self
                .fields_index
                .get(field)
                .ok_or_else(|| anyhow!("Invalid separator or sort fields"))?;
            let value = self.parser.field(column).ok_or_else(|| {
                anyhow!(
                    "line {}: field {} expects column {} but the row has {} fields",
                    self.parser.line(),
                    field,
                    column + 1,
                    self.parser.field_count()
                )
            })?;
            key.extend_from_slice(value);
            key.push(0);
        }
        Ok(key)
    }

    fn maybe_spill(&mut self, force: bool) -> Result<(), anyhow::Error> {
        if force && !self.swapper.has_spilled() {
            // nothing was ever spilled: the whole index stays in memory and
            // is handed to the swapper by transfer
            return Ok(());
        }

        if force || self.swapper.should_spill(&self.records) {
            self.swapper.spill(&mut self.records)?;
            if force {
                self.records = Vec::new();
            } else {
                self.records.clear();
            }
        }
        Ok(())
    }

    // One read handle at the top of the file plus one per line_threshold
    // records, spaced evenly across the index in file order.
    fn create_seekers(&mut self) -> Result<(), anyhow::Error> {
        let scanner = (self.factory)()?;
        self.seekers.push(scanner, 0);

        let count = self.records.len();
        if count < self.options.line_threshold {
            return Ok(());
        }

        let thresholds = count / self.options.line_threshold;
        let stride = count / (thresholds + 1);
        let mut index = 0;
        for _ in 0..thresholds {
            index += stride;
            let scanner = (self.factory)()?;
            let offset = self.records[index].offset;
            self.seekers.push(scanner, offset);
        }
        log::debug!("Created {} read handles", self.seekers.len());
        Ok(())
    }
}
