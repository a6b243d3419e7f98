//! In-file command grammar.
//!
//! Users talk to Pythia by ending a file with a marker line:
//!
//! ```text
//! def add(a, b):
//!     return a + b
//! UPDATE: add type hints
//! ```
//!
//! Only the last non-blank line is inspected. A marker anywhere else in the
//! body is plain text.

/// Trailing line that restores the newest snapshot.
pub const ROLLBACK_MARKER: &str = "ROLLBACK";

/// Prefix of a trailing line that requests a rewrite.
pub const UPDATE_MARKER: &str = "UPDATE:";

/// Text written into a file while a generation is in flight.
pub const WORKING_PLACEHOLDER: &str = "🔮 The Oracle is searching its memories...";

/// Signature looked for at the head of a file to recognise the placeholder.
const PLACEHOLDER_SIGNATURE: &str = "The Oracle is";

/// How many leading characters are scanned for the placeholder signature.
const PLACEHOLDER_SCAN_CHARS: usize = 100;

/// A command recognised on the last non-blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Rollback,
    Update { instruction: String },
}

/// The last line of `content` that is not empty after trimming.
pub fn last_non_blank_line(content: &str) -> Option<&str> {
    content.lines().map(str::trim).rfind(|line| !line.is_empty())
}

/// Parse the trailing command, if any.
///
/// `UPDATE:` with nothing after it is not a command.
pub fn parse_trailing_marker(content: &str) -> Option<Marker> {
    let line = last_non_blank_line(content)?;

    if line == ROLLBACK_MARKER {
        return Some(Marker::Rollback);
    }

    let instruction = line.strip_prefix(UPDATE_MARKER)?.trim();
    if instruction.is_empty() {
        return None;
    }

    Some(Marker::Update {
        instruction: instruction.to_string(),
    })
}

/// Whether a single line is a command marker (bare `UPDATE:` included).
pub fn is_marker_line(line: &str) -> bool {
    let line = line.trim();
    line == ROLLBACK_MARKER || line.starts_with(UPDATE_MARKER)
}

/// Remove trailing blank and marker lines.
///
/// Used on restored snapshots so a rollback never re-triggers a command.
/// Everything up to the end of the last kept line is returned byte for
/// byte, line endings included.
pub fn strip_trailing_markers(content: &str) -> String {
    let mut end = 0;
    let mut offset = 0;
    for segment in content.split_inclusive('\n') {
        offset += segment.len();
        if !segment.trim().is_empty() && !is_marker_line(segment) {
            end = offset;
        }
    }
    content[..end].to_string()
}

/// Whether `content` starts with the agent's in-progress placeholder.
pub fn is_working_placeholder(content: &str) -> bool {
    let head: String = content.chars().take(PLACEHOLDER_SCAN_CHARS).collect();
    head.contains(PLACEHOLDER_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_non_blank_line_skips_trailing_whitespace() {
        assert_eq!(last_non_blank_line("a\nb\n\n   \n"), Some("b"));
        assert_eq!(last_non_blank_line("\n\n"), None);
        assert_eq!(last_non_blank_line(""), None);
    }

    #[test]
    fn test_rollback_marker() {
        assert_eq!(
            parse_trailing_marker("x = 1\nROLLBACK\n"),
            Some(Marker::Rollback)
        );
    }

    #[test]
    fn test_rollback_must_be_exact() {
        assert_eq!(parse_trailing_marker("x = 1\nROLLBACK now"), None);
        assert_eq!(parse_trailing_marker("x = 1\nrollback"), None);
    }

    #[test]
    fn test_update_marker_carries_instruction() {
        assert_eq!(
            parse_trailing_marker("x = 1\n  UPDATE:   add y  \n"),
            Some(Marker::Update {
                instruction: "add y".to_string()
            })
        );
    }

    #[test]
    fn test_empty_update_is_inert() {
        assert_eq!(parse_trailing_marker("x = 1\nUPDATE:"), None);
    }

    #[test]
    fn test_only_last_line_counts() {
        assert_eq!(parse_trailing_marker("ROLLBACK\nx = 1"), None);
        assert_eq!(
            parse_trailing_marker("UPDATE: rename\nx = 1\nROLLBACK"),
            Some(Marker::Rollback)
        );
    }

    #[test]
    fn test_strip_trailing_markers() {
        assert_eq!(strip_trailing_markers("x=1"), "x=1");
        assert_eq!(strip_trailing_markers("x=1\nROLLBACK"), "x=1\n");
        assert_eq!(
            strip_trailing_markers("x=2\nUPDATE: add y\n\nROLLBACK\n\n"),
            "x=2\n"
        );
        assert_eq!(strip_trailing_markers("ROLLBACK\n"), "");
    }

    #[test]
    fn test_strip_keeps_crlf_line_endings() {
        assert_eq!(
            strip_trailing_markers("line1\r\nline2\r\n"),
            "line1\r\nline2\r\n"
        );
        assert_eq!(
            strip_trailing_markers("line1\r\nline2\r\nUPDATE: add y\r\nROLLBACK\r\n"),
            "line1\r\nline2\r\n"
        );
    }

    #[test]
    fn test_strip_keeps_inner_markers() {
        assert_eq!(
            strip_trailing_markers("UPDATE: old note\nx=1\n"),
            "UPDATE: old note\nx=1\n"
        );
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_working_placeholder(WORKING_PLACEHOLDER));
        assert!(!is_working_placeholder("print('hello')"));

        let late = format!("{}The Oracle is", "x".repeat(200));
        assert!(!is_working_placeholder(&late));
    }
}
