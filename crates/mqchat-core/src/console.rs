//! Console output façade
//!
//! The relay loops print through [`ConsoleOutput`] so several loops can share
//! one terminal and tests can capture what a user would have seen.

use std::io::{self, Write};
use std::sync::Mutex;

/// Line-oriented output shared by the relay loops
pub trait ConsoleOutput: Send + Sync {
    /// Print one chat line
    fn show(&self, line: &str);

    /// Print a status notice (peer left, session ended, ...)
    fn notice(&self, line: &str) {
        self.show(line);
    }
}

/// Writes to the process stdout, one locked write per line
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl ConsoleOutput for StdoutConsole {
    fn show(&self, line: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

/// Records every line, for tests
#[derive(Debug, Default)]
pub struct CapturedConsole {
    lines: Mutex<Vec<String>>,
}

impl CapturedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl ConsoleOutput for CapturedConsole {
    fn show(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
