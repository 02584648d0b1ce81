//! Quote-aware tokenizer for comma-separated import files.

use super::ImportError;

/// One tokenized row and the line it started on (1-based).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRow {
    pub line: usize,
    pub fields: Vec<String>,
}

impl RawRow {
    /// Field at `idx`, or an empty string when the row is short.
    pub fn get(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }

    fn is_blank(&self) -> bool {
        self.fields.iter().all(|f| f.is_empty())
    }

    fn is_comment(&self) -> bool {
        self.fields.first().is_some_and(|f| f.starts_with('#'))
    }
}

/// Decode raw file bytes as UTF-8, dropping a leading byte-order mark.
pub fn decode(bytes: &[u8]) -> Result<String, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ImportError::Unreadable(e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

/// Split text into rows of fields.
///
/// Whitespace outside quotes is trimmed; quoted content is kept verbatim.
/// Blank rows and `#` comment rows are dropped. Malformed quoting never
/// fails: an unterminated quote simply runs to the end of the input.
pub fn tokenize(text: &str) -> Vec<RawRow> {
    let mut rows = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    // Byte length of `field` that came from (or precedes) quoted content.
    let mut kept = 0;
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_start = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => {
                    if c == '\n' {
                        line += 1;
                    }
                    field.push(c);
                }
            }
            kept = field.len();
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                kept = field.len();
            }
            ',' => fields.push(finish_field(&mut field, &mut kept)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(finish_field(&mut field, &mut kept));
                push_row(&mut rows, row_start, std::mem::take(&mut fields));
                line += 1;
                row_start = line;
            }
            // Leading whitespace before any content is dropped.
            c if c.is_whitespace() && field.is_empty() => {}
            _ => field.push(c),
        }
    }

    // Final row without a trailing newline.
    if !field.is_empty() || !fields.is_empty() {
        fields.push(finish_field(&mut field, &mut kept));
        push_row(&mut rows, row_start, fields);
    }

    rows
}

/// Take the current field, trimming only trailing unquoted whitespace.
fn finish_field(field: &mut String, kept: &mut usize) -> String {
    let mut value = std::mem::take(field);
    let tail = value[*kept..].trim_end().len();
    value.truncate(*kept + tail);
    *kept = 0;
    value
}

fn push_row(rows: &mut Vec<RawRow>, line: usize, fields: Vec<String>) {
    let row = RawRow { line, fields };
    if row.is_blank() || row.is_comment() {
        return;
    }
    rows.push(row);
}

/// Quote a value for the import format when it needs it.
pub fn quote(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) || value.trim() != value {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
