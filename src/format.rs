//! Optional formatting pass over generated files.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info, warn};

/// An external source formatter.
pub trait Formatter {
    fn name(&self) -> &str;

    /// Format `files` in place. Failures are logged, never returned.
    fn format(&self, files: &[PathBuf]);
}

/// Runs `black` on the given files.
pub struct BlackFormatter {
    program: String,
}

impl Default for BlackFormatter {
    fn default() -> Self {
        Self {
            program: "black".to_string(),
        }
    }
}

impl BlackFormatter {
    /// Use a specific executable instead of `black` from `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Formatter for BlackFormatter {
    fn name(&self) -> &str {
        "black"
    }

    fn format(&self, files: &[PathBuf]) {
        if files.is_empty() {
            return;
        }
        debug!(program = %self.program, files = files.len(), "running formatter");
        match Command::new(&self.program).arg("--quiet").args(files).output() {
            Ok(output) if output.status.success() => {
                info!(files = files.len(), "formatted generated code with {}", self.name());
            }
            Ok(output) => warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "{} failed, leaving files unformatted",
                self.name()
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(program = %self.program, "formatter not installed, skipping --pretty");
            }
            Err(e) => warn!(program = %self.program, "could not run formatter: {e}"),
        }
    }
}
