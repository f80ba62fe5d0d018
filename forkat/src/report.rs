//! One-line branch reports, one per process.
//!
//! Standard output carries these lines only; diagnostics go to the log.

use std::io;

use anyhow::Context as _;

const FAILURE_LINE: &str = "fork: failure";
const CHILD_TAG: &str = "fork: child";
const PARENT_TAG: &str = "fork: parent";

/// A process's account of which side of a duplication it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchReport {
    /// Duplication failed; the reporting process is still the sole process.
    Failure,
    /// Emitted by the newly created process.
    Child { pid: i32 },
    /// Emitted by the original process, once per child.
    Parent { pid: i32, child: i32 },
}

impl BranchReport {
    pub fn write_line(&self, mut out: impl io::Write) -> io::Result<()> {
        match self {
            Self::Failure => writeln!(out, "{FAILURE_LINE}"),
            Self::Child { pid } => writeln!(out, "{CHILD_TAG} pid={pid}"),
            Self::Parent { pid, child } => writeln!(out, "{PARENT_TAG} pid={pid} child={child}"),
        }
    }

    pub fn from_line(line: &str) -> anyhow::Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line == FAILURE_LINE {
            return Ok(Self::Failure);
        }

        if let Some(fields) = line.strip_prefix(CHILD_TAG) {
            let pid = parse_field(fields, "pid")?;
            return Ok(Self::Child { pid });
        }

        if let Some(fields) = line.strip_prefix(PARENT_TAG) {
            let pid = parse_field(fields, "pid")?;
            let child = parse_field(fields, "child")?;
            return Ok(Self::Parent { pid, child });
        }

        anyhow::bail!("unknown report line: `{line}`");
    }
}

fn parse_field(fields: &str, key: &str) -> anyhow::Result<i32> {
    let value = fields
        .split_whitespace()
        .find_map(|field| field.strip_prefix(key)?.strip_prefix('='))
        .with_context(|| format!("`{key}` field is missing"))?;

    value.parse().with_context(|| format!("bad `{key}` value: `{value}`"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code can panic on errors")]

    use super::*;

    #[test]
    fn parent_line_carries_both_pids() {
        let mut line = Vec::new();
        BranchReport::Parent { pid: 1000, child: 1234 }.write_line(&mut line).unwrap();
        let line = String::from_utf8(line).unwrap();

        assert!(line.contains("1000"));
        assert!(line.contains("1234"));

        let parsed = BranchReport::from_line(&line).unwrap();
        assert_eq!(parsed, BranchReport::Parent { pid: 1000, child: 1234 });
    }

    #[test]
    fn child_line_carries_the_child_pid_only() {
        let mut line = Vec::new();
        BranchReport::Child { pid: 1234 }.write_line(&mut line).unwrap();
        let line = String::from_utf8(line).unwrap();

        assert!(line.contains("1234"));
        assert!(!line.contains("1000"));
        assert_eq!(BranchReport::from_line(&line).unwrap(), BranchReport::Child { pid: 1234 });
    }

    #[test]
    fn failure_line_is_fixed() {
        let mut line = Vec::new();
        BranchReport::Failure.write_line(&mut line).unwrap();

        assert_eq!(line, b"fork: failure\n");
        assert_eq!(BranchReport::from_line("fork: failure").unwrap(), BranchReport::Failure);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(BranchReport::from_line("fork: sibling pid=3").is_err());
        assert!(BranchReport::from_line("").is_err());
    }

    #[test]
    fn missing_field_is_rejected() {
        assert!(BranchReport::from_line("fork: parent pid=1000").is_err());
        assert!(BranchReport::from_line("fork: child").is_err());
    }

    #[test]
    fn non_numeric_pid_is_rejected() {
        assert!(BranchReport::from_line("fork: child pid=abc").is_err());
    }
}
