#![allow(unused_crate_dependencies)]
#![allow(clippy::unwrap_used)]

use forkat::report::BranchReport;
use proptest::prelude::*;

proptest! {
    // The parser sees whatever shows up on the wire; it must reject, not panic.
    #[test]
    fn from_line_never_panics(line in ".*") {
        let _ = BranchReport::from_line(&line);
    }

    #[test]
    fn well_formed_parent_lines_parse(pid in 1..i32::MAX, child in 1..i32::MAX) {
        let line = format!("fork: parent pid={pid} child={child}");
        prop_assert_eq!(
            BranchReport::from_line(&line).unwrap(),
            BranchReport::Parent { pid, child }
        );
    }

    #[test]
    fn truncated_parent_lines_are_rejected(pid in 1..i32::MAX) {
        let line = format!("fork: parent pid={pid}");
        prop_assert!(BranchReport::from_line(&line).is_err());
    }
}
