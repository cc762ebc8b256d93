//! Reader and writer for the pool's delimited-record format
//!
//! Every data row is three double-quoted fields followed by a bare status
//! token. Embedded quotes are escaped by doubling them, so rows without
//! quotes stay byte-identical to files written by earlier tooling.

use super::record::{Credential, CredentialRecord, Status};

/// Header row of every pool file
pub const HEADER: &str = "name,email,password,status";

/// A non-blank data line of a pool file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Record(CredentialRecord),
    /// Line that failed to parse, kept verbatim so rewrites never lose it
    Malformed { line: usize, raw: String },
}

/// Parsed pool file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// First non-blank line, when it names the columns
    pub header: Option<String>,
    pub rows: Vec<Row>,
}

impl Document {
    pub fn records(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.rows.iter().filter_map(|row| match row {
            Row::Record(record) => Some(record),
            Row::Malformed { .. } => None,
        })
    }

    pub fn malformed(&self) -> impl Iterator<Item = (usize, &str)> {
        self.rows.iter().filter_map(|row| match row {
            Row::Malformed { line, raw } => Some((*line, raw.as_str())),
            Row::Record(_) => None,
        })
    }

    /// Index into `rows` of the earliest unused record
    pub fn first_unused(&self) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| matches!(row, Row::Record(record) if record.status.is_unused()))
    }

    /// Mark the earliest unused record as used and return its credential
    pub fn take_first_unused(&mut self) -> Option<Credential> {
        let index = self.first_unused()?;
        match &mut self.rows[index] {
            Row::Record(record) => {
                record.status = Status::Used;
                Some(record.credential())
            }
            Row::Malformed { .. } => None,
        }
    }

    pub fn header_matches(&self) -> bool {
        self.header.as_deref().map(str::trim) == Some(HEADER)
    }
}

/// Split file content into header and rows. Blank lines are ignored;
/// line numbers are 1-based positions in the original content.
///
/// A first line that does not look like a header is kept as a row, so a
/// headerless file loses nothing when it is rewritten.
pub fn parse_document(content: &str) -> Document {
    let mut document = Document::default();
    let mut seen_first = false;

    for (index, line) in content.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }

        if !seen_first {
            seen_first = true;
            if is_header_like(line) {
                document.header = Some(line.to_string());
                continue;
            }
        }

        let row = match parse_record(line) {
            Some(record) => Row::Record(record),
            None => Row::Malformed {
                line: index + 1,
                raw: line.to_string(),
            },
        };
        document.rows.push(row);
    }

    document
}

/// Column names in any case or spacing, e.g. `Name, Email, Password, Status`
fn is_header_like(line: &str) -> bool {
    line.split(',')
        .map(|column| column.trim().to_ascii_lowercase())
        .eq(HEADER.split(','))
}

/// Serialize a whole document with the canonical header
pub fn render_document(rows: &[Row]) -> String {
    let mut content = String::with_capacity(HEADER.len() + 1 + rows.len() * 64);
    content.push_str(HEADER);
    content.push('\n');

    for row in rows {
        match row {
            Row::Record(record) => content.push_str(&format_record(record)),
            Row::Malformed { raw, .. } => {
                content.push_str(raw);
                content.push('\n');
            }
        }
    }

    content
}

/// Serialize one record as a newline-terminated row
pub fn format_record(record: &CredentialRecord) -> String {
    format!(
        "{},{},{},{}\n",
        quote(&record.name),
        quote(&record.email),
        quote(&record.password),
        record.status.as_token()
    )
}

/// Parse one data line, without its line terminator
pub fn parse_record(line: &str) -> Option<CredentialRecord> {
    let rest = line.trim_start();
    let (name, rest) = take_quoted(rest)?;
    let rest = rest.strip_prefix(',')?;
    let (email, rest) = take_quoted(rest)?;
    let rest = rest.strip_prefix(',')?;
    let (password, rest) = take_quoted(rest)?;
    let status_token = rest.strip_prefix(',')?;
    let status = Status::from_token(status_token)?;

    Some(CredentialRecord {
        name,
        email,
        password,
        status,
    })
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Read a quoted field from the start of `input`, returning the unescaped
/// value and the remainder after the closing quote.
fn take_quoted(input: &str) -> Option<(String, &str)> {
    let body = input.strip_prefix('"')?;
    let mut value = String::new();
    let mut chars = body.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c != '"' {
            value.push(c);
            continue;
        }
        if let Some((_, '"')) = chars.peek() {
            chars.next();
            value.push('"');
            continue;
        }
        return Some((value, &body[offset + 1..]));
    }

    None
}
