use std::cmp::max;

use colored::Colorize;

use crate::database::entities::{ChatMessage, ChatRole, VideoStatus};

/// Table row wrapper for console display helpers.
#[derive(Debug)]
pub struct TableRow(pub Vec<String>);

impl TableRow {
    pub fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

/// Renders a small ASCII table with column headers.
pub fn render_table(headers: &[&str], rows: &[TableRow]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for row in rows {
        for (idx, value) in row.0.iter().enumerate().take(widths.len()) {
            widths[idx] = max(widths[idx], value.chars().count());
        }
    }

    let divider: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");

    let render_row = |values: &[String]| {
        let mut parts = Vec::new();
        for (idx, width) in widths.iter().enumerate() {
            let value = values.get(idx).map(String::as_str).unwrap_or_default();
            parts.push(format!(" {:width$} ", value, width = width));
        }
        parts.join("|")
    };

    let mut out = Vec::new();
    out.push(divider.clone());
    out.push(render_row(
        &headers.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
    ));
    out.push(divider.clone());
    for row in rows {
        out.push(render_row(&row.0));
    }
    out.push(divider);
    out.join("\n")
}

pub fn print_table(headers: &[&str], rows: &[TableRow]) {
    println!("{}", render_table(headers, rows));
}

pub fn status_label(status: &str) -> String {
    match status.parse::<VideoStatus>() {
        Ok(VideoStatus::Completed) => status.green().to_string(),
        Ok(VideoStatus::Failed) => status.red().to_string(),
        Ok(_) => status.yellow().to_string(),
        Err(_) => status.to_string(),
    }
}

/// Prints `[####------]  60% message`.
pub fn print_progress(percent: u8, message: &str) {
    let filled = usize::from(percent.min(100)) / 10;
    println!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        "-".repeat(10 - filled),
        percent,
        message
    );
}

pub fn print_chat_message(message: &ChatMessage) {
    match message.role {
        ChatRole::User => println!("{} {}", "you>".cyan(), message.message),
        ChatRole::Assistant => println!("{} {}", "assistant>".green(), message.message),
    }
}

pub fn format_bytes(size: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
