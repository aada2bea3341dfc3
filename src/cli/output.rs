use colored::Colorize;
use std::fmt;

/// Message categories used by the CLI output helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Error,
    Section,
}

/// Turns ANSI styling on or off for the rest of the process.
pub fn set_color_enabled(enabled: bool) {
    if enabled {
        colored::control::unset_override();
    } else {
        colored::control::set_override(false);
    }
}

fn apply_style(kind: MessageKind, message: impl fmt::Display) -> String {
    let text = message.to_string();
    match kind {
        MessageKind::Info => text,
        MessageKind::Success => format!("[ok] {text}").bright_green().to_string(),
        MessageKind::Warning => format!("[!] {text}").bright_yellow().to_string(),
        MessageKind::Error => format!("[x] {text}").bright_red().to_string(),
        MessageKind::Section => format!("=== {} ===", text.trim()).bold().to_string(),
    }
}

pub fn print(kind: MessageKind, message: impl fmt::Display) {
    let formatted = apply_style(kind, message);
    match kind {
        MessageKind::Section => println!("\n{}", formatted),
        _ => println!("{}", formatted),
    }
}

pub fn info(message: impl fmt::Display) {
    print(MessageKind::Info, message);
}

pub fn success(message: impl fmt::Display) {
    print(MessageKind::Success, message);
}

pub fn warning(message: impl fmt::Display) {
    print(MessageKind::Warning, message);
}

pub fn error(message: impl fmt::Display) {
    print(MessageKind::Error, message);
}

pub fn hint(message: impl fmt::Display) {
    println!("{}", message.to_string().dimmed());
}

pub fn section(title: impl fmt::Display) {
    print(MessageKind::Section, title);
}

/// Prints rows under a header, each column padded to its widest cell.
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let header_cells: Vec<String> = headers.iter().map(|header| header.to_string()).collect();
    println!("{}", format_row(&header_cells, &widths).bold());
    for row in rows {
        println!("{}", format_row(row, &widths));
    }
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_column_width() {
        let widths = [6, 4];
        let row = vec!["Acme".to_string(), "5.00".to_string()];
        assert_eq!(format_row(&row, &widths), "Acme    5.00");
    }

    #[test]
    fn plain_styling_when_color_disabled() {
        set_color_enabled(false);
        assert_eq!(apply_style(MessageKind::Warning, "careful"), "[!] careful");
        assert_eq!(apply_style(MessageKind::Section, " Clients "), "=== Clients ===");
    }
}
