//! Colored CLI display utilities for server launch output.
//!
//! Log-style diagnostics go through `tracing`; these helpers cover the
//! operator-facing launch narrative on stdout.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Print the launch banner.
pub fn print_launch(product: &str, executable: &str) {
    println!(
        "{} {} {} ({})",
        timestamp().dimmed(),
        "[START]".blue().bold(),
        product.bold(),
        executable.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print one line of server output.
pub fn print_server_line(line: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[SERVER]".cyan().bold(),
        line
    );
    let _ = io::stdout().flush();
}

/// Print the readiness confirmation with the reported address.
pub fn print_ready(host: &str, port: u16) {
    println!(
        "{} {} Server listening on {}",
        timestamp().dimmed(),
        "[READY]".green().bold(),
        format!("{host}:{port}").cyan()
    );
    let _ = io::stdout().flush();
}

/// Print the shutdown notice.
pub fn print_stopping() {
    println!(
        "{} {} Stopping server",
        timestamp().dimmed(),
        "[STOP]".yellow().bold()
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}
