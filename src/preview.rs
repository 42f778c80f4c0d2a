use std::{borrow::Cow, fmt::Write as _};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{
    cli::PreviewArgs,
    io_utils,
    tree::{Column, RowRecord, SheetTree, TreeDocument},
};

const INDENT: &str = "  ";

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let format = io_utils::resolve_tree_format(Some(&args.input), args.input_format);
    let document = io_utils::read_tree_document(&args.input, format)
        .with_context(|| format!("Loading tree document {:?}", args.input))?;
    print!("{}", render_document(&document, args.max_depth));
    info!(
        "Displayed {} sheet(s) from {:?}",
        document.sheets.len(),
        args.input
    );
    Ok(())
}

pub fn render_document(document: &TreeDocument, max_depth: Option<usize>) -> String {
    document
        .sheets
        .iter()
        .map(|sheet| render_sheet(sheet, max_depth))
        .join("\n")
}

pub fn render_sheet(sheet: &SheetTree, max_depth: Option<usize>) -> String {
    let mut lines = Vec::new();
    for row in &sheet.rows {
        collect_lines(row, 0, max_depth, &mut lines);
    }

    let mut output = String::new();
    let _ = writeln!(output, "# {} (sheet {})", sheet.name, sheet.index);
    let headers = ["record", "#", "columns"].map(String::from);
    let _ = write!(output, "{}", render_table(&headers, &lines));
    output
}

fn collect_lines(
    row: &RowRecord,
    depth: usize,
    max_depth: Option<usize>,
    lines: &mut Vec<Vec<String>>,
) {
    lines.push(vec![
        format!("{}{}", INDENT.repeat(depth), row.name),
        row.index.to_string(),
        row.columns.iter().map(describe_column).join("  "),
    ]);
    if max_depth.is_some_and(|max| depth >= max) {
        return;
    }
    for group in &row.children {
        for child in &group.rows {
            collect_lines(child, depth + 1, max_depth, lines);
        }
    }
}

fn describe_column(column: &Column) -> String {
    match (column.col.is_empty(), column.tag.is_empty()) {
        (false, false) => format!("{}[{}]={}", column.col, column.tag, column.value),
        (true, false) => format!("[{}]={}", column.tag, column.value),
        _ => format!("{}={}", column.col, column.value),
    }
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .join("  ");
    line.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
