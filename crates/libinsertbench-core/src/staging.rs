//! Staging files for the bulk-load modes
//!
//! Rows are appended sequentially through a buffered writer. CSV follows the
//! usual quoting rules (fields with separators, quotes or whitespace are
//! quoted and inner quotes doubled). XML uses the `<resultset>` dialect that
//! `LOAD XML` reads:
//!
//! ```text
//! <resultset statement="..."><row><field name="id">0</field>...</row></resultset>
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::config::TABLE_NAME;
use crate::error::Result;
use crate::row::{RowGenerator, SyntheticRow, COLUMNS};
use crate::sink::BulkFormat;

/// Sequential writer for one staging format
pub trait StagingWriter {
    fn write_row(&mut self, row: &SyntheticRow) -> io::Result<()>;

    /// Write any trailer and flush
    fn finish(self) -> io::Result<()>;
}

pub struct CsvWriter<W: Write> {
    out: W,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StagingWriter for CsvWriter<W> {
    fn write_row(&mut self, row: &SyntheticRow) -> io::Result<()> {
        let fields: Vec<String> = row.fields().iter().map(|f| csv_field(f)).collect();
        writeln!(self.out, "{}", fields.join(","))
    }

    fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn csv_field(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| matches!(c, ',' | '"' | '\n' | '\r' | '\t' | ' ' | '\\'));
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub struct XmlWriter<W: Write> {
    out: W,
}

impl<W: Write> XmlWriter<W> {
    /// Write the document prologue and open `<resultset>`
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "<?xml version=\"1.0\"?>")?;
        writeln!(
            out,
            "<resultset statement=\"SELECT * FROM {}\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
            TABLE_NAME
        )?;
        Ok(Self { out })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StagingWriter for XmlWriter<W> {
    fn write_row(&mut self, row: &SyntheticRow) -> io::Result<()> {
        write!(self.out, "<row>")?;
        for (name, value) in COLUMNS.iter().zip(row.fields().iter()) {
            write!(self.out, "<field name=\"{}\">{}</field>", name, xml_escape(value))?;
        }
        writeln!(self.out, "</row>")
    }

    fn finish(mut self) -> io::Result<()> {
        writeln!(self.out, "</resultset>")?;
        self.out.flush()
    }
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Generate `total_rows` rows into a fresh staging file at `path`.
///
/// Rows use `row_count = 0`, so ids run from 0 to `total_rows - 1`.
pub fn write_staging_file<G: RowGenerator + ?Sized>(
    path: &Path,
    format: BulkFormat,
    total_rows: u64,
    generator: &mut G,
) -> Result<u64> {
    let file = BufWriter::new(File::create(path)?);
    debug!(path = %path.display(), format = format.as_str(), total_rows, "writing staging file");

    match format {
        BulkFormat::Csv => write_rows(CsvWriter::new(file), total_rows, generator)?,
        BulkFormat::Xml => write_rows(XmlWriter::new(file)?, total_rows, generator)?,
    }
    Ok(total_rows)
}

fn write_rows<S: StagingWriter, G: RowGenerator + ?Sized>(
    mut writer: S,
    total_rows: u64,
    generator: &mut G,
) -> io::Result<()> {
    // CSV and XML share the insert digest rule with row_count 0, so the CSV
    // stringCol is md5("0" + row_num) rather than md5(row_num)
    for row_num in 0..total_rows {
        writer.write_row(&generator.row(0, row_num))?;
    }
    writer.finish()
}
