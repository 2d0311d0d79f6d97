//! Plain-text table rendering
//!
//! Shared by the oracle prompt (merged table as CSV context) and the
//! recent-queries export.

/// Quote a cell when it carries a delimiter, quote or line break
pub fn csv_cell(cell: &str) -> String {
    if cell.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Render a header plus rows as CSV with `\n` line endings
pub fn render_csv<H, R, C>(header: &[H], rows: R) -> String
where
    H: AsRef<str>,
    R: IntoIterator,
    R::Item: IntoIterator<Item = C>,
    C: AsRef<str>,
{
    let mut out = String::new();
    push_line(&mut out, header.iter().map(|h| h.as_ref()));

    for row in rows {
        let cells: Vec<C> = row.into_iter().collect();
        push_line(&mut out, cells.iter().map(|c| c.as_ref()));
    }

    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells.map(csv_cell).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}
