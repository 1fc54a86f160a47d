use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use data_encoding::HEXLOWER;

use tsv_sort::indexer::Indexer;
use tsv_sort::options::IndexerOptions;
use tsv_sort::scanner::Scanner;

#[allow(dead_code)]
pub fn temp_file_name(dir: &Path) -> PathBuf {
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    dir.join(name)
}

#[allow(dead_code)]
pub fn write_input(dir: &Path, content: &str) -> PathBuf {
    let path = temp_file_name(dir);
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    path
}

#[allow(dead_code)]
pub fn read_output(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// Build the comparable of the given columns: every value is followed by a
// NUL separator.
#[allow(dead_code)]
pub fn comparable(columns: &[&str]) -> Vec<u8> {
    let mut key = Vec::new();
    for column in columns {
        key.extend_from_slice(column.as_bytes());
        key.push(0);
    }
    key
}

#[allow(dead_code)]
pub fn indexer_over<F>(input: &Path, configure: F) -> Indexer
where
    F: FnOnce(&mut IndexerOptions),
{
    let mut options = IndexerOptions::new();
    options.with_separator(",");
    configure(&mut options);
    let input = input.to_path_buf();
    Indexer::new(move || Ok(Scanner::open(&input)?), options).unwrap()
}
