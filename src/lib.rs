//! This crate sorts very large CSV/TSV files by a composite column key
//! without loading the file content into memory.
//!
//! A delimited data file is streamed once to build a compact index of
//! `(key, offset, length)` records, where the key concatenates the configured
//! column values. When a memory limit is configured and reached, the index is
//! sorted and spilled to scratch storage as compressed chunks; the spilled
//! runs are then merged back with a multi-way tournament. Finally each line
//! is copied from the original file to the output in key order, through a
//! pool of read handles pre-positioned across the file to keep random access
//! cheap. The motivation for writing this crate was the need to sort
//! multi-gigabyte datasets by a composite key on machines whose memory is a
//! small fraction of the dataset size.
//!
//! Input rows follow RFC 4180 (except newlines in quoted fields); the four
//! newline sequences `\n`, `\r`, `\r\n` and `\n\r` are recognised, possibly
//! mixed within one file.
//!
//! # Examples
//! ```
//! use std::fs::File;
//! use std::path::PathBuf;
//!
//! use tsv_sort::indexer::Indexer;
//! use tsv_sort::options::IndexerOptions;
//! use tsv_sort::scanner::Scanner;
//!
//! // sort a CSV with a header by two of its columns, spilling to disk when
//! // resident memory approaches 4 GiB
//! fn sort_dataset(
//!     input: PathBuf,
//!     output: PathBuf,
//!     scratch: PathBuf,
//! ) -> Result<(), anyhow::Error> {
//!     let mut options = IndexerOptions::new();
//!     options.with_separator(",");
//!     options.with_header();
//!     options.with_fields(vec!["region".to_string(), "city".to_string()]);
//!     options.with_memory_limit(4 << 30, scratch);
//!
//!     let mut indexer = Indexer::new(move || Ok(Scanner::open(&input)?), options)?;
//!     indexer.analyze()?;
//!     indexer.sort();
//!     indexer.transfer(File::create(&output)?)?;
//!     Ok(())
//! }
//! ```

pub(crate) mod seeker_pool;

pub mod blob_store;
pub mod error;
pub mod indexer;
pub mod memory_probe;
pub mod merge_iterator;
pub mod options;
pub mod parser;
pub mod record;
pub mod scanner;
pub mod swapper;
