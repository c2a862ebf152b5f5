/// Split raw CSV text into rows of trimmed fields.
///
/// A `"` toggles quoting wherever it appears; `""` inside quotes is a literal
/// quote. Commas and line breaks (`\n`, `\r\n`) only separate outside quotes.
/// Rows may have different widths. Blank lines, including lines made only of
/// whitespace, are dropped.
pub fn tokenize(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => row.push(take_field(&mut field)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' | '\r' if !in_quotes => {
                row.push(take_field(&mut field));
                push_row(&mut rows, std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    // unterminated last line
    if !field.is_empty() || !row.is_empty() {
        row.push(take_field(&mut field));
        push_row(&mut rows, row);
    }

    rows
}

fn take_field(field: &mut String) -> String {
    let value = field.trim().to_string();
    field.clear();
    value
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if row.len() == 1 && row[0].is_empty() {
        return;
    }
    rows.push(row);
}

/// Separate the header row from the data rows. A file without at least one
/// data row yields `None`.
pub fn split_header(mut rows: Vec<Vec<String>>) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    if rows.len() < 2 {
        return None;
    }
    let header = rows.remove(0);
    Some((header, rows))
}
