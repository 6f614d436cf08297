//! Consolidated delimited tables
//!
//! Opens a `.csv`/`.tsv`/`.txt` export, settles on a delimiter and hands out
//! the header plus a stream of text rows. Tokenizing is left to the `csv`
//! crate; rows with a deviating field count are let through so that the
//! record adapter can count and skip them.

use crate::error::ParseError;
use crate::records::Header;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Extensions accepted for consolidated tables.
pub const TABLE_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// Number of leading bytes inspected when sniffing the delimiter.
pub const SNIFF_WINDOW: usize = 10240;

const CANDIDATES: &[u8] = b",\t;|";

/// A delimited table with its header already read.
pub struct DelimitedTable<R> {
    header: Header,
    reader: csv::Reader<R>,
}

impl DelimitedTable<File> {
    /// Open a consolidated table, using `delimiter` if given.
    pub fn open(path: &Path, delimiter: Option<char>) -> Result<Self, ParseError> {
        if !path.is_file() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }
        let ext = extension(path);
        if !TABLE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ParseError::UnsupportedExtension {
                path: path.to_path_buf(),
                expected: ".csv, .tsv, .txt".to_string(),
            });
        }

        let mut window = Vec::with_capacity(SNIFF_WINDOW);
        File::open(path)?
            .take(SNIFF_WINDOW as u64)
            .read_to_end(&mut window)?;
        let sniffed = sniff_delimiter(&window);

        let chosen = match delimiter {
            Some(c) => {
                let d = ascii_delimiter(c)?;
                if let Some(s) = sniffed.filter(|&s| s != d) {
                    warn!(
                        detected = %(s as char).escape_default(),
                        using = %c.escape_default(),
                        "detected delimiter differs from the configured one"
                    );
                }
                d
            }
            None => match (default_delimiter(&ext), sniffed) {
                (Some(d), Some(s)) if s != d => {
                    warn!(
                        detected = %(s as char).escape_default(),
                        using = %(d as char).escape_default(),
                        "detected delimiter differs from the extension default"
                    );
                    d
                }
                (Some(d), _) => d,
                (None, Some(s)) => {
                    info!(delimiter = %(s as char).escape_default(), "auto-detected delimiter");
                    s
                }
                (None, None) => return Err(ParseError::DelimiterUndetected(path.to_path_buf())),
            },
        };

        Self::from_reader(File::open(path)?, chosen)
    }
}

impl<R: Read> DelimitedTable<R> {
    /// Read a table from any byte source with a known delimiter.
    pub fn from_reader(source: R, delimiter: u8) -> Result<Self, ParseError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut first = csv::StringRecord::new();
        if !reader.read_record(&mut first)? {
            return Ok(Self {
                header: Header::new(Vec::<String>::new()),
                reader,
            });
        }
        let header = Header::new(first.iter());
        Ok(Self { header, reader })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Split into the header and the stream of data rows.
    pub fn into_parts(
        self,
    ) -> (
        Header,
        impl Iterator<Item = Result<Vec<String>, ParseError>>,
    ) {
        let rows = self.reader.into_records().map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(ParseError::from)
        });
        (self.header, rows)
    }
}

/// Lowercased extension of `path`, without the dot.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn default_delimiter(ext: &str) -> Option<u8> {
    match ext {
        "csv" => Some(b','),
        "tsv" => Some(b'\t'),
        _ => None,
    }
}

fn ascii_delimiter(c: char) -> Result<u8, ParseError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ParseError::InvalidDelimiter(c))
    }
}

/// Guess the delimiter of a table from its leading bytes.
///
/// Picks the candidate that occurs the same non-zero number of times on the
/// most lines, counting only occurrences outside double quotes. A trailing
/// line cut off by the window is ignored.
pub fn sniff_delimiter(sample: &[u8]) -> Option<u8> {
    let text = String::from_utf8_lossy(sample);
    let mut lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() > 1 && !text.ends_with('\n') {
        lines.pop();
    }
    let first = lines.first()?;

    let mut best: Option<(u8, usize, usize)> = None;
    for &candidate in CANDIDATES {
        let expected = count_unquoted(first, candidate);
        if expected == 0 {
            continue;
        }
        let consistent = lines
            .iter()
            .filter(|line| count_unquoted(line, candidate) == expected)
            .count();
        let better = match best {
            None => true,
            Some((_, c, e)) => (consistent, expected) > (c, e),
        };
        if better {
            best = Some((candidate, consistent, expected));
        }
    }
    best.map(|(d, _, _)| d)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for &b in line.as_bytes() {
        if b == b'"' {
            quoted = !quoted;
        } else if b == delimiter && !quoted {
            count += 1;
        }
    }
    count
}
