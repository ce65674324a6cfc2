// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host output cleanup before it reaches outcomes or the audit log.

/// The redaction placeholder.
pub const REDACTED: &str = "[REDACTED]";

/// Replace every occurrence of each non-empty secret, longest first.
pub fn redact(input: &str, secrets: &[&str]) -> String {
    let mut sorted: Vec<&str> = secrets.iter().copied().filter(|s| !s.is_empty()).collect();
    sorted.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut result = input.to_string();
    for secret in sorted {
        result = result.replace(secret, REDACTED);
    }
    result
}

/// The last `max_lines` non-blank lines of `output`, redacted.
///
/// PTY output uses `\r\n`; carriage returns are stripped.
pub fn output_tail(output: &str, secret: &str, max_lines: usize) -> Vec<String> {
    let redacted = redact(output, &[secret]);
    let lines: Vec<&str> = redacted
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();
    let skip = lines.len().saturating_sub(max_lines);
    lines[skip..].iter().map(|l| l.to_string()).collect()
}
