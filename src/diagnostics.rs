//! Diagnostics sink.
//!
//! One `Diagnostics` per compile run collects errors and warnings and
//! answers `had_error()`, exactly like the single global `ErrorLogger` in
//! the original source (`examples/original_source/src/ErrorLogger/ErrorLogger.cpp`),
//! but threaded explicitly instead of kept as a global — consistent with
//! this rewrite's "no process-wide singletons" design note.
//!
//! Rendering goes through the `log` crate so `--no-colorize-output` and
//! `RUST_LOG` both act on one stream; `main.rs` wires `env_logger` to the
//! terminal.

#[derive(Clone, Debug, PartialEq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: u32,
}

#[derive(Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    fn push(&mut self, severity: Severity, message: impl Into<String>, line: u32) {
        let message = message.into();
        match severity {
            Severity::Error => log::error!("line {} | {}", line, message),
            Severity::Warning => log::warn!("line {} | {}", line, message),
        }
        self.records.push(Diagnostic { severity, message, line });
    }

    pub fn parse_error(&mut self, message: impl Into<String>, line: u32) {
        self.had_error = true;
        self.push(Severity::Error, message, line);
    }

    pub fn type_error(&mut self, message: impl Into<String>, line: u32) {
        self.had_error = true;
        self.push(Severity::Error, message, line);
    }

    pub fn warning(&mut self, message: impl Into<String>, line: u32) {
        self.push(Severity::Warning, message, line);
    }

    pub fn runtime_error(&mut self, message: impl Into<String>, line: u32) {
        self.had_runtime_error = true;
        self.push(Severity::Error, message, line);
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_set_had_error_warnings_do_not() {
        let mut d = Diagnostics::new();
        d.warning("implicit int->float conversion", 3);
        assert!(!d.had_error());
        d.type_error("mismatched types", 5);
        assert!(d.had_error());
        assert_eq!(d.records().len(), 2);
    }
}
