// Console table rendering of the store tree

use crate::document::{Tree, KEY_FIELD};
use serde_json::Value;

/// Cells wider than this are cut and end in an ellipsis.
const MAX_CELL_WIDTH: usize = 32;

/// Render every document as one row of a box-drawn table.
///
/// Columns are `_id` followed by every other field in the order it is first
/// seen. Strings are shown without quotes, other values as compact JSON, and
/// fields a document lacks are left blank.
pub fn render_table(tree: &Tree) -> String {
    if tree.is_empty() {
        return "(no documents)\n".to_string();
    }

    let mut columns: Vec<&str> = vec![KEY_FIELD];
    for doc in tree.values() {
        for field in doc.keys() {
            if !columns.contains(&field.as_str()) {
                columns.push(field);
            }
        }
    }

    let rows: Vec<Vec<String>> = tree
        .iter()
        .map(|(key, doc)| {
            columns
                .iter()
                .map(|col| match doc.get(*col) {
                    Some(value) => cell(value),
                    None if *col == KEY_FIELD => truncate(key),
                    None => String::new(),
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&border(&widths, '┌', '┬', '┐'));
    let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    out.push_str(&line(&header, &widths));
    out.push_str(&border(&widths, '├', '┼', '┤'));
    for row in &rows {
        out.push_str(&line(row, &widths));
    }
    out.push_str(&border(&widths, '└', '┴', '┘'));
    out.push_str(&format!("{} document(s)\n", tree.len()));
    out
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => truncate(s),
        other => truncate(&other.to_string()),
    }
}

fn truncate(text: &str) -> String {
    let flat = text.replace(['\n', '\r', '\t'], " ");
    if flat.chars().count() <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut cut: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
    cut.push('…');
    cut
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut out = String::new();
    out.push(left);
    for (i, w) in widths.iter().enumerate() {
        if i > 0 {
            out.push(mid);
        }
        out.push_str(&"─".repeat(w + 2));
    }
    out.push(right);
    out.push('\n');
    out
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let mut out = String::from("│");
    for (text, w) in cells.iter().zip(widths) {
        let pad = w - text.chars().count();
        out.push(' ');
        out.push_str(text);
        out.push_str(&" ".repeat(pad + 1));
        out.push('│');
    }
    out.push('\n');
    out
}
