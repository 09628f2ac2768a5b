//! Command-line surface, parsed with `clap`'s derive API.
//!
//! Flag names follow `examples/original_source/src/main.cpp`'s `argparse`
//! table; formatter-only flags (`--use-tabs` etc.) are accepted and stored
//! even though this rewrite has no full source formatter, since `--dump-ast`
//! reads them to pick its indentation style.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::vm::{TraceFlags, TraceSet};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TraceCategory {
    Stack,
    Frame,
    Module,
    Insn,
    ModuleInit,
}

impl From<TraceCategory> for TraceFlags {
    fn from(c: TraceCategory) -> TraceFlags {
        match c {
            TraceCategory::Stack => TraceFlags::Stack,
            TraceCategory::Frame => TraceFlags::Frame,
            TraceCategory::Module => TraceFlags::Module,
            TraceCategory::Insn => TraceFlags::Insn,
            TraceCategory::ModuleInit => TraceFlags::ModuleInit,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "nyx", about = "Nyx language compiler and virtual machine")]
pub struct CliConfig {
    /// Entry module to compile and run.
    #[arg(long)]
    pub main: PathBuf,

    /// Parse and type-check only; do not execute.
    #[arg(long)]
    pub check: bool,

    /// Print the resolved AST of each module.
    #[arg(long)]
    pub dump_ast: bool,

    /// Print the bytecode listing of each module and function.
    #[arg(long)]
    pub disassemble_code: bool,

    /// VM tracing categories, repeatable or comma-separated.
    #[arg(long = "trace-exec", value_delimiter = ',')]
    pub trace_exec: Vec<TraceCategory>,

    /// Disable ANSI colors in diagnostics output.
    #[arg(long)]
    pub no_colorize_output: bool,

    /// `--dump-ast` indentation: use tabs instead of spaces.
    #[arg(long)]
    pub use_tabs: bool,

    /// `--dump-ast` indentation width, in spaces (ignored with `--use-tabs`).
    #[arg(long, default_value_t = 4)]
    pub tab_size: usize,

    /// `--dump-ast`: print single-statement blocks on one line.
    #[arg(long)]
    pub collapse_single_line_block: bool,

    /// `--dump-ast`: place opening braces on their own line.
    #[arg(long)]
    pub brace_next_line: bool,
}

impl CliConfig {
    pub fn trace_set(&self) -> TraceSet {
        self.trace_exec.iter().copied().map(TraceFlags::from).fold(TraceSet::empty(), |acc, f| acc | f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_main_and_repeated_trace_flags() {
        let cli = CliConfig::parse_from([
            "nyx",
            "--main",
            "program.nyx",
            "--trace-exec",
            "stack,insn",
        ]);
        assert_eq!(cli.main, PathBuf::from("program.nyx"));
        assert!(cli.trace_set().contains(TraceFlags::Stack));
        assert!(cli.trace_set().contains(TraceFlags::Insn));
        assert!(!cli.trace_set().contains(TraceFlags::Frame));
    }

    #[test]
    fn defaults_are_conservative() {
        let cli = CliConfig::parse_from(["nyx", "--main", "program.nyx"]);
        assert!(!cli.check);
        assert!(!cli.dump_ast);
        assert_eq!(cli.tab_size, 4);
    }
}
