//! Console reporting for build and watch output.
//!
//! Every line carries the command prefix (cyan when stdout is a tty) so
//! output stays recognizable when the orchestrator runs inside a larger
//! task runner.

use std::time::SystemTime;

const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Prefixed stdout/stderr reporter shared by all stages and the watcher.
#[derive(Debug, Clone)]
pub struct Reporter {
    prefix: String,
    color: bool,
}

impl Reporter {
    /// Create a reporter with the given command prefix.
    ///
    /// Color is enabled only when stdout is a terminal.
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_string(), color: atty::is(atty::Stream::Stdout) }
    }

    /// Create a reporter with color forced off (used in tests).
    pub fn plain(prefix: &str) -> Self {
        Self { prefix: prefix.to_string(), color: false }
    }

    fn prefix(&self) -> String {
        if self.color {
            format!("{}{}{}", CYAN, self.prefix, RESET)
        } else {
            self.prefix.clone()
        }
    }

    /// Print an informational line to stdout.
    pub fn info(&self, message: &str) {
        println!("{} {}", self.prefix(), message);
    }

    /// Print a timestamped watcher line to stdout.
    pub fn watcher(&self, message: &str) {
        println!("{}[watcher][{}] {}", self.prefix(), timestamp(), message);
    }

    /// Print an error line to stderr.
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", self.prefix(), message);
    }
}

/// Get current wall-clock time for logging, as `HH:MM:SS`.
pub fn timestamp() -> String {
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
        assert_eq!(ts.as_bytes()[5], b':');
    }

    #[test]
    fn test_plain_reporter_prefix() {
        let reporter = Reporter::plain("[esmbuild]");
        assert_eq!(reporter.prefix(), "[esmbuild]");
    }
}
