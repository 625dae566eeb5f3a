//! Minimal CSV codec for the small tabular artifacts.
//!
//! RFC-4180 subset: comma separator, double-quote quoting, quotes escaped by
//! doubling, LF line endings on write (CRLF tolerated on read). Enough for
//! the per-district result tables; no type inference, everything is strings
//! at this layer.

use crate::{IoError, IoResult};

/// Quote a field if it contains a separator, quote, or newline.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        let mut out = String::with_capacity(field.len() + 2);
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
        out
    } else {
        field.to_string()
    }
}

/// Render header + rows as CSV bytes.
pub fn to_csv(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&header.iter().copied().map(escape).collect::<Vec<_>>().join(","));
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| escape(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Parse one CSV line into fields.
fn parse_line(line: &str, file: &str) -> IoResult<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => {
                    fields.push(std::mem::take(&mut field));
                }
                '\r' => {}
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err(IoError::Tabular {
            file: file.to_string(),
            msg: format!("unterminated quote in line: {line}"),
        });
    }
    fields.push(field);
    Ok(fields)
}

/// Parse CSV content into (header, rows). Rows must match the header width.
pub fn from_csv(content: &str, file: &str) -> IoResult<(Vec<String>, Vec<Vec<String>>)> {
    let mut lines = content.lines().filter(|l| !l.is_empty());
    let header = match lines.next() {
        Some(l) => parse_line(l, file)?,
        None => {
            return Err(IoError::Tabular {
                file: file.to_string(),
                msg: "empty file".to_string(),
            })
        }
    };
    let mut rows = Vec::new();
    for line in lines {
        let row = parse_line(line, file)?;
        if row.len() != header.len() {
            return Err(IoError::Tabular {
                file: file.to_string(),
                msg: format!(
                    "row has {} fields, header has {}: {line}",
                    row.len(),
                    header.len()
                ),
            });
        }
        rows.push(row);
    }
    Ok((header, rows))
}
