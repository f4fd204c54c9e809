//! Parsing of esbuild's stderr diagnostics.

use crate::error::BuildError;

const ERROR_TAG: &str = "[ERROR]";
const WARNING_TAG: &str = "[WARNING]";

/// Text of the first `[ERROR]` line, without its marker.
pub fn first_error(stderr: &str) -> Option<String> {
    stderr.lines().find_map(|line| {
        line.split_once(ERROR_TAG)
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|message| !message.is_empty())
    })
}

pub fn has_errors(stderr: &str) -> bool {
    stderr.contains(ERROR_TAG)
}

pub fn has_warnings(stderr: &str) -> bool {
    stderr.contains(WARNING_TAG)
}

/// Single string describing a failed esbuild run, for load errors.
pub fn summarize(stderr: &str, status: Option<i32>) -> String {
    match stderr.trim() {
        "" => format!("esbuild exited with status {:?}", status),
        trimmed => trimmed.to_string(),
    }
}

/// Converts a failed run's stderr into a [`BuildError::Failed`].
///
/// The message is the first reported error; the details are whatever
/// esbuild printed after it (source locations, notes, the error count).
pub fn build_failure(stderr: &str, status: Option<i32>) -> BuildError {
    let lines: Vec<&str> = stderr.lines().collect();
    let error_line = lines.iter().position(|line| line.contains(ERROR_TAG));

    match (error_line, first_error(stderr)) {
        (Some(index), Some(message)) => BuildError::Failed {
            message,
            details: lines[index + 1..].join("\n").trim().to_string(),
        },
        _ => {
            let mut rest = lines.iter().map(|line| line.trim()).filter(|line| !line.is_empty());
            match rest.next() {
                Some(message) => BuildError::Failed {
                    message: message.to_string(),
                    details: rest.collect::<Vec<_>>().join("\n"),
                },
                None => BuildError::Failed {
                    message: format!("esbuild exited with status {:?}", status),
                    details: String::new(),
                },
            }
        }
    }
}
