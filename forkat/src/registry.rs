//! Parent-side book-keeping of spawned children.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use fork_point::ExitStatus;

/// Book-keeping entry for one spawned child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRecord {
    /// Position of the child in the spawn sequence.
    pub ordinal: usize,
    /// Exit status, once the child has been reaped.
    pub status: Option<ExitStatus>,
}

impl ChildRecord {
    pub fn new(ordinal: usize) -> Self {
        Self { ordinal, status: None }
    }
}

/// Children spawned by the current process, ordered by PID.
#[derive(Debug, Default)]
pub struct SpawnRegistry {
    children: BTreeMap<i32, ChildRecord>,
}

impl SpawnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` unless `pid` is already present; returns whether the
    /// new record was stored.
    pub fn insert(&mut self, pid: i32, record: ChildRecord) -> bool {
        match self.children.entry(pid) {
            Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Stores `record`, replacing any existing entry for `pid`.
    pub fn set(&mut self, pid: i32, record: ChildRecord) {
        self.children.insert(pid, record);
    }

    pub fn get(&self, pid: i32) -> Option<&ChildRecord> {
        self.children.get(&pid)
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.children.contains_key(&pid)
    }

    /// Attaches an exit status to an already registered child; returns
    /// whether such a child was found.
    pub fn record_exit(&mut self, pid: i32, status: ExitStatus) -> bool {
        match self.children.get_mut(&pid) {
            Some(record) => {
                record.status = Some(status);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &ChildRecord)> {
        self.children.iter().map(|(pid, record)| (*pid, record))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code can panic on errors")]

    use super::*;

    #[test]
    fn insert_keeps_the_existing_record() {
        let mut registry = SpawnRegistry::new();

        assert!(registry.insert(30, ChildRecord::new(0)));
        assert!(!registry.insert(30, ChildRecord::new(7)));
        assert_eq!(registry.get(30).unwrap().ordinal, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn set_overwrites() {
        let mut registry = SpawnRegistry::new();

        registry.set(10, ChildRecord::new(0));
        registry.set(10, ChildRecord::new(2));
        assert_eq!(registry.get(10).unwrap().ordinal, 2);
    }

    #[test]
    fn lookup_of_an_unknown_pid() {
        let mut registry = SpawnRegistry::new();
        registry.set(10, ChildRecord::new(0));

        assert!(!registry.contains(40));
        assert!(registry.get(40).is_none());
    }

    #[test]
    fn record_exit_requires_registration() {
        let mut registry = SpawnRegistry::new();

        assert!(!registry.record_exit(99, ExitStatus::Exited(0)));

        registry.set(99, ChildRecord::new(0));
        assert!(registry.record_exit(99, ExitStatus::Exited(0)));
        assert_eq!(registry.get(99).unwrap().status, Some(ExitStatus::Exited(0)));
    }

    #[test]
    fn iteration_is_pid_ordered() {
        let mut registry = SpawnRegistry::new();

        registry.set(30, ChildRecord::new(1));
        registry.set(10, ChildRecord::new(0));

        let pids: Vec<i32> = registry.iter().map(|(pid, _)| pid).collect();
        assert_eq!(pids, [10, 30]);
    }
}
