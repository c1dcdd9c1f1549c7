// src/utils/log.rs

//! Console output for the CLI with server-style formatting.
//!
//! Library code logs through the `log` facade; these helpers are for
//! human-facing reports (headers, steps, summaries).

use chrono::Local;

/// Format a line with timestamp and tag
fn format_line(tag: &str, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] [{}] {}", timestamp, tag, message)
}

/// Log a success message
pub fn success(message: &str) {
    println!("{}", format_line("INFO", &format!("✓ {}", message)));
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    println!(
        "{}",
        format_line("INFO", &format!("[STEP {}/{}] {}", step_num, total, message))
    );
}

/// Log a progress update, overwriting the previous one
pub fn progress(done: usize, total: usize) {
    use std::io::Write;

    print!(
        "\r[{}] [PROG] {}/{} pages",
        Local::now().format("%H:%M:%S"),
        done,
        total
    );
    let _ = std::io::stdout().flush();
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    println!("{}", border);
    println!("  {}", title);
    println!("{}", border);
}

/// Log a separator line
pub fn separator() {
    println!("{}", "─".repeat(60));
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    println!("    {}", message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("{}", format_line("SUMMARY", title));
    for (key, value) in items {
        println!("    {}: {}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_shape() {
        let line = format_line("INFO", "hello");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] [INFO] hello"));
    }
}
