//! Terminal color policy for the CLI.
//!
//! `NO_COLOR` (any value) disables colors, `CLICOLOR_FORCE` (non-zero) forces
//! them, `CLICOLOR=0` disables them. Otherwise colors follow whether stdout is
//! a terminal.

use colored::{ColoredString, Colorize, control};

/// Apply the color policy for this process. Call once, early in `main`.
pub fn init_colors() {
    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stdout());
    control::set_override(colors_enabled(|key| std::env::var(key).ok(), is_tty));
}

fn colors_enabled(var: impl Fn(&str) -> Option<String>, is_tty: bool) -> bool {
    // NO_COLOR takes precedence over everything (https://no-color.org/)
    if var("NO_COLOR").is_some() {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| v != "0") {
        return true;
    }
    if var("CLICOLOR").is_some_and(|v| v == "0") {
        return false;
    }
    is_tty
}

pub fn success_mark() -> ColoredString {
    "✓".green().bold()
}

pub fn failure_mark() -> ColoredString {
    "✗".red().bold()
}
