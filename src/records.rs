//! Record stream adapter
//!
//! Resolves named columns to positions once per source and filters out rows
//! whose field count does not match the header. Works the same way for rows
//! of text (delimited tables) and rows of typed cells (spreadsheets).

use crate::error::ParseError;
use tracing::debug;

/// Ordered column names of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a required column.
    pub fn column(&self, name: &str) -> Result<usize, ParseError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ParseError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Resolve every name in `names`, failing on the first absent one.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<ColumnIndex, ParseError> {
        let columns = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.column(name).map(|pos| (name.to_string(), pos))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ColumnIndex { columns })
    }

    /// Whether a row has exactly one field per header column.
    pub fn accepts<T>(&self, row: &[T]) -> bool {
        row.len() == self.names.len()
    }
}

/// A set of resolved columns, kept in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    columns: Vec<(String, usize)>,
}

impl ColumnIndex {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, pos)| pos)
    }

    /// Value of column `name` in `row`.
    pub fn field<'r, T>(&self, row: &'r [T], name: &str) -> Option<&'r T> {
        self.position(name).and_then(|pos| row.get(pos))
    }

    /// `(name, value)` for every resolved column, in request order.
    pub fn fields<'s, 'r, T>(&'s self, row: &'r [T]) -> impl Iterator<Item = (&'s str, &'r T)> {
        self.columns
            .iter()
            .filter_map(move |(name, pos)| row.get(*pos).map(|v| (name.as_str(), v)))
    }
}

/// Iterator over the rows of a source that match the header length.
///
/// Mismatched rows are skipped and counted; errors from the underlying
/// reader pass through unchanged.
pub struct Records<'h, I> {
    header: &'h Header,
    rows: I,
    line: usize,
    skipped: usize,
}

impl<'h, I> Records<'h, I> {
    pub fn new(header: &'h Header, rows: I) -> Self {
        Self {
            header,
            rows,
            line: 1,
            skipped: 0,
        }
    }

    /// Number of rows skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<'h, I, T> Iterator for Records<'h, I>
where
    I: Iterator<Item = Result<Vec<T>, ParseError>>,
{
    type Item = Result<Vec<T>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            self.line += 1;
            if self.header.accepts(&row) {
                return Some(Ok(row));
            }
            self.skipped += 1;
            debug!(
                line = self.line,
                expected = self.header.len(),
                found = row.len(),
                "skipping row with mismatched field count"
            );
        }
    }
}
