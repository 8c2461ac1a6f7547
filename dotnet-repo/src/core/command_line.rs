//! Display formatting for process command lines.
//!
//! The engine never hands this string to a shell: arguments are passed to the
//! OS as a vector. The formatted line exists for log messages and for
//! `NonZeroExit` failures, so callers can see what was run.

use std::path::Path;

/// Wrap every argument in double quotes and join with single spaces.
///
/// Embedded quotes and backslashes are kept as-is, not escaped. The output is
/// therefore not guaranteed to round-trip through a shell parser.
pub fn quote_arguments<S: AsRef<str>>(arguments: &[S]) -> String {
    arguments
        .iter()
        .map(|arg| format!("\"{}\"", arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Short program name used in messages: the file stem of the executable.
pub fn program_name(executable: &Path) -> String {
    executable
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| executable.display().to_string())
}

/// `<program> "<arg1>" "<arg2>" ...`, or just `<program>` with no arguments.
pub fn format_command_line<S: AsRef<str>>(executable: &Path, arguments: &[S]) -> String {
    let program = program_name(executable);
    if arguments.is_empty() {
        return program;
    }
    format!("{program} {}", quote_arguments(arguments))
}
