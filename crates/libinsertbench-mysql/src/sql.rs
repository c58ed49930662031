//! SQL text helpers: literal quoting, client-side parameter interpolation and
//! bulk-load statements

use std::path::Path;

use libinsertbench_core::sink::BulkFormat;
use libinsertbench_core::{BenchError, Result, SyntheticRow};

/// Single-quoted MySQL string literal
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\'' => quoted.push_str("\\'"),
            '\\' => quoted.push_str("\\\\"),
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\u{1a}' => quoted.push_str("\\Z"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// Replace every `?` in `sql` with the next row value, the way client-side
/// prepared statement emulation does
pub fn interpolate(sql: &str, rows: &[SyntheticRow]) -> Result<String> {
    let mut values = rows.iter().flat_map(|row| {
        [
            row.id.to_string(),
            row.int_col.to_string(),
            quote_literal(&row.string_col),
            quote_literal(&row.text_col),
        ]
    });

    let mut text = String::with_capacity(sql.len() + rows.len() * 3300);
    for c in sql.chars() {
        if c == '?' {
            let value = values.next().ok_or_else(|| {
                BenchError::Statement(format!(
                    "statement expects more values than {} rows provide",
                    rows.len()
                ))
            })?;
            text.push_str(&value);
        } else {
            text.push(c);
        }
    }
    if values.next().is_some() {
        return Err(BenchError::Statement(format!(
            "statement has fewer placeholders than {} rows provide",
            rows.len()
        )));
    }
    Ok(text)
}

/// `LOAD DATA` / `LOAD XML` statement for a server-readable staging file
pub fn bulk_load_sql(path: &Path, format: BulkFormat, table: &str) -> String {
    let file = quote_literal(&path.to_string_lossy());
    match format {
        BulkFormat::Csv => format!(
            "LOAD DATA INFILE {} INTO TABLE {} \
             FIELDS TERMINATED BY ',' OPTIONALLY ENCLOSED BY '\"' \
             LINES TERMINATED BY '\\n' (id,intCol,stringCol,textCol)",
            file, table
        ),
        BulkFormat::Xml => format!(
            "LOAD XML INFILE {} INTO TABLE {} ROWS IDENTIFIED BY '<row>'",
            file, table
        ),
    }
}

/// `SELECT` of the named rows of `performance_schema.global_variables`
pub fn server_settings_sql(count: usize) -> String {
    format!(
        "SELECT VARIABLE_NAME, VARIABLE_VALUE FROM performance_schema.global_variables \
         WHERE VARIABLE_NAME IN ({})",
        vec!["?"; count].join(", ")
    )
}
