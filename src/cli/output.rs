//! Colored terminal output.
//!
//! Status lines go to stdout, failures and diagnostics to stderr. Colors are
//! dropped when the stream is not a terminal or `NO_COLOR` is set.

use console::style;
use std::sync::{Arc, Mutex};

/// Output manager for colored terminal output
#[derive(Debug, Clone)]
pub struct OutputManager {
    /// Lines collected instead of printed
    captured: Option<Arc<Mutex<Vec<String>>>>,
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new() -> Self {
        if std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty()) {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        Self { captured: None }
    }

    /// Output manager that keeps every line, uncolored, in memory.
    ///
    /// Clones share the same buffer.
    pub fn capturing() -> Self {
        Self {
            captured: Some(Arc::default()),
        }
    }

    /// Lines collected so far by a [`capturing`](Self::capturing) manager,
    /// stdout and stderr interleaved in call order.
    pub fn captured(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .and_then(|lines| lines.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    fn capture(&self, message: &str) -> bool {
        let Some(lines) = &self.captured else {
            return false;
        };
        if let Ok(mut lines) = lines.lock() {
            lines.extend(message.lines().map(str::to_string));
        }
        true
    }

    /// Print success message in green
    pub fn success(&self, message: &str) {
        if !self.capture(message) {
            println!("{}", style(message).green());
        }
    }

    /// Print plain line to stdout
    pub fn println(&self, message: &str) {
        if !self.capture(message) {
            println!("{}", message);
        }
    }

    /// Print error message in red to stderr
    pub fn error(&self, message: &str) {
        if !self.capture(message) {
            eprintln!("{}", style(message).red().for_stderr());
        }
    }

    /// Print warning message in yellow to stderr
    pub fn warn(&self, message: &str) {
        if !self.capture(message) {
            eprintln!("{}", style(message).yellow().for_stderr());
        }
    }

    /// Print plain line to stderr
    pub fn eprintln(&self, message: &str) {
        if !self.capture(message) {
            eprintln!("{}", message);
        }
    }
}
