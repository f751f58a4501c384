//! Machine-readable header of a spec audit report (`audit.md`).

use regex::Regex;
use std::sync::OnceLock;

/// Verdict carried by the first line of `audit.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Pass,
    Fail,
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^status:\s+(pass|fail)\b").expect("audit header regex is valid"))
}

/// Parse the `status:` header from report content.
///
/// Only the first line counts; anything else (including a header further
/// down) is an unknown status and must abort the run.
pub fn parse_status(content: &str) -> Option<AuditStatus> {
    let first_line = content.lines().next()?;
    header_regex()
        .captures(first_line)
        .map(|caps| match &caps[1] {
            "pass" => AuditStatus::Pass,
            _ => AuditStatus::Fail,
        })
}

/// The raw first line, for error reporting when the header is unrecognized.
pub fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or("").trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pass_and_fail() {
        assert_eq!(
            parse_status("status: pass\n\nAll good."),
            Some(AuditStatus::Pass)
        );
        assert_eq!(parse_status("status: fail\n"), Some(AuditStatus::Fail));
    }

    #[test]
    fn header_must_be_on_the_first_line() {
        assert_eq!(parse_status("# Audit\nstatus: pass\n"), None);
    }

    #[test]
    fn rejects_unknown_statuses() {
        assert_eq!(parse_status("status: maybe\n"), None);
        assert_eq!(parse_status("status:pass\n"), None);
        assert_eq!(parse_status(""), None);
    }

    #[test]
    fn status_word_must_end_at_a_boundary() {
        assert_eq!(parse_status("status: passing\n"), None);
        assert_eq!(
            parse_status("status: pass (see below)\n"),
            Some(AuditStatus::Pass)
        );
    }
}
