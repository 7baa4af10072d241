//! Log formatting and output with ANSI colors
//!
//! Handles colorized console output with tag and level formatting and
//! broken pipe handling for piped commands.

use chrono::Local;
use colored::*;
use std::io::{stdout, Write};

use super::tags::LogTag;

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, log_type: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        format_tag(&tag),
        format_log_type(log_type),
        message
    );
    print_stdout_safe(&line);
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Cache => padded.bright_blue().bold(),
        LogTag::Jobs => padded.bright_green().bold(),
        LogTag::Worker => padded.bright_cyan().bold(),
        LogTag::Aggregator => padded.bright_magenta().bold(),
        LogTag::Upstream => padded.bright_white().bold(),
        LogTag::Webserver => padded.bright_cyan().bold(),
    }
}

/// Format a log type/level with appropriate color
fn format_log_type(log_type: &str) -> ColoredString {
    match log_type {
        "ERROR" => log_type.bright_red().bold(),
        "WARNING" => log_type.bright_yellow(),
        "SUCCESS" => log_type.bright_green(),
        "DEBUG" => log_type.dimmed(),
        _ => log_type.normal(),
    }
}

/// Print to stdout, ignoring write failures (e.g. broken pipe under `| head`)
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    let _ = writeln!(out, "{}", line);
}
