use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub(crate) const LF: u8 = b'\n';
pub(crate) const CR: u8 = b'\r';

/// Buffered line reader for very large files, including files with very long
/// lines.
///
/// The scanner reports the absolute byte offset and the byte length of every
/// line it emits, so that the line can later be re-read with
/// [`Scanner::read_at`]. The four newline sequences `\n`, `\r`, `\r\n` and
/// `\n\r` are recognised, possibly mixed within one file.
///
/// # Examples
/// ```
/// use tsv_sort::scanner::Scanner;
///
/// fn print_lines(path: &std::path::Path) -> Result<(), anyhow::Error> {
///     let mut scanner = Scanner::open(path)?;
///     while scanner.scan_line() {
///         println!("{}", scanner.text());
///     }
///     Ok(())
/// }
/// ```
pub struct Scanner {
    path: PathBuf,
    file: File,
    reader: BufReader<File>,
    keep_newlines: bool,
    token: Vec<u8>,
    newline: Option<Vec<u8>>,
    err: Option<io::Error>,
    line: i64,
    offset: u64,
    length: u32,
}

impl Scanner {
    /// Open the file at `path` for line scanning. A second independent handle
    /// on the same file backs positioned reads.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Scanner, io::Error> {
        let path = path.as_ref().to_path_buf();
        let reader = File::open(&path)?;
        let file = File::open(&path)?;
        Ok(Scanner {
            path,
            file,
            reader: BufReader::new(reader),
            keep_newlines: false,
            token: Vec::new(),
            newline: None,
            err: None,
            line: -1,
            offset: 0,
            length: 0,
        })
    }

    /// Keep the newline sequence in the bytes returned by [`Scanner::bytes`].
    /// The reported [`Scanner::length`] counts the newline sequence either way.
    pub fn keep_newline_sequence(&mut self, keep: bool) {
        self.keep_newlines = keep;
    }

    /// The most recent line produced by [`Scanner::scan_line`]. The buffer is
    /// overwritten by the next call.
    pub fn bytes(&self) -> &[u8] {
        &self.token
    }

    /// The most recent line as text.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.token)
    }

    /// The first non-EOF error encountered by the scanner.
    pub fn err(&self) -> Option<&io::Error> {
        self.err.as_ref()
    }

    /// 0-based index of the current line.
    pub fn line(&self) -> i64 {
        self.line
    }

    /// Absolute byte offset of the first byte of the current line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Byte count consumed by the current line including its newline
    /// sequence. The offset of the next line equals `offset() + length()`.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// The first newline sequence observed in the file, or `\n` when no line
    /// has been terminated yet.
    pub fn newline_sequence(&self) -> &[u8] {
        match &self.newline {
            Some(sequence) => sequence.as_slice(),
            None => b"\n",
        }
    }

    /// True when the current line holds no bytes.
    pub fn is_line_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// The path of the scanned file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advance the scanner to the next line, which is then available through
    /// [`Scanner::bytes`]. Returns false when the scan stops, either by
    /// reaching the end of the input or on an error. I/O errors other than
    /// end-of-file are sticky and reported by [`Scanner::err`].
    pub fn scan_line(&mut self) -> bool {
        self.offset += self.length as u64;
        self.length = 0;
        self.line += 1;
        self.token.clear();

        let mut raw: u32 = 0;
        loop {
            let b = match self.read_byte() {
                Ok(Some(b)) => b,
                Ok(None) => {
                    self.length = raw;
                    return !self.token.is_empty();
                }
                Err(e) => {
                    self.set_err(e);
                    self.length = raw;
                    return !self.token.is_empty();
                }
            };
            raw += 1;

            match b {
                LF => {
                    self.finish_newline_sequence(LF, CR, &mut raw);
                    self.length = raw;
                    return true;
                }
                CR => {
                    self.finish_newline_sequence(CR, LF, &mut raw);
                    self.length = raw;
                    return true;
                }
                _ => self.token.push(b),
            }
        }
    }

    /// Run `f` over every line of the file, starting from the top.
    pub fn for_each_line<F>(&mut self, mut f: F) -> Result<(), io::Error>
    where
        F: FnMut(&[u8]),
    {
        self.reset()?;
        while self.scan_line() {
            f(&self.token);
        }
        Ok(())
    }

    /// Read exactly `length` bytes starting at byte `offset`, through the
    /// positioned-read handle. Fails on a short read.
    pub fn read_at(&self, offset: u64, length: u32) -> Result<Vec<u8>, io::Error> {
        let mut token = vec![0u8; length as usize];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut token)?;
        Ok(token)
    }

    /// Seek to the top of the file and clear all scanning state, including
    /// the sticky error.
    pub fn reset(&mut self) -> Result<(), io::Error> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.token.clear();
        self.err = None;
        self.line = -1;
        self.offset = 0;
        self.length = 0;
        Ok(())
    }

    // Consume the second byte of a two-byte newline sequence when present.
    fn finish_newline_sequence(&mut self, current: u8, other: u8, raw: &mut u32) {
        if self.keep_newlines {
            self.token.push(current);
        }
        let mut sequence = vec![current];

        match self.peek_byte() {
            Ok(Some(b)) if b == other => {
                if self.keep_newlines {
                    self.token.push(other);
                }
                sequence.push(other);
                *raw += 1;
                if let Err(e) = self.read_byte() {
                    self.set_err(e);
                }
            }
            Ok(_) => {}
            Err(e) => self.set_err(e),
        }

        if self.newline.is_none() {
            self.newline = Some(sequence);
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, io::Error> {
        let buf = self.reader.fill_buf()?;
        match buf.first().copied() {
            Some(b) => {
                self.reader.consume(1);
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, io::Error> {
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    // Records the first error encountered.
    fn set_err(&mut self, err: io::Error) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }
}
