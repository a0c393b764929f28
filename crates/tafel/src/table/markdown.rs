/// Minimum width of a Markdown column (the `---` separator).
const MIN_COLUMN_WIDTH: usize = 3;

/// Render a cell grid as a Markdown pipe table.
///
/// The first row is used as the header. Pipes inside cells are escaped and line breaks
/// are flattened to spaces so that every table row stays on one line. Rows shorter than
/// the widest row are padded with empty cells.
pub fn table_to_markdown(cells: &[Vec<String>]) -> String {
    let column_count = cells.iter().map(Vec::len).max().unwrap_or(0);
    if column_count == 0 {
        return String::new();
    }

    let escaped: Vec<Vec<String>> = cells
        .iter()
        .map(|row| {
            (0..column_count)
                .map(|c| row.get(c).map(|cell| escape_cell(cell)).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths = vec![MIN_COLUMN_WIDTH; column_count];
    for row in &escaped {
        for (c, cell) in row.iter().enumerate() {
            widths[c] = widths[c].max(cell.chars().count());
        }
    }

    let mut markdown = String::new();
    for (r, row) in escaped.iter().enumerate() {
        push_row(&mut markdown, row, &widths);
        if r == 0 {
            let separator: Vec<String> = widths.iter().map(|&width| "-".repeat(width)).collect();
            push_row(&mut markdown, &separator, &widths);
        }
    }

    markdown
}

fn push_row(out: &mut String, row: &[String], widths: &[usize]) {
    out.push('|');
    for (cell, &width) in row.iter().zip(widths) {
        let padding = width.saturating_sub(cell.chars().count());
        out.push(' ');
        out.push_str(cell);
        out.push_str(&" ".repeat(padding));
        out.push_str(" |");
    }
    out.push('\n');
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
