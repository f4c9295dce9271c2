//! Advisory warnings about an ancestry chain.

use std::fmt;

use serde::{Serialize, Serializer};

use super::{Ancestry, Truncation};
use crate::types::{ProcessSnapshot, ProcessState};

/// One advisory. Each kind fires at most once per chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// One or more processes in the chain are zombies.
    Zombie { pids: Vec<u32> },
    /// The walk stopped before reaching the root.
    PartialChain(Truncation),
    /// The chain is complete but its root is not the system root.
    Orphaned { root_pid: u32, root_command: String },
    /// The resolved process runs an executable that was deleted or replaced.
    DeletedBinary { pid: u32 },
}

impl Warning {
    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::Zombie { .. } => "zombie",
            Warning::PartialChain(_) => "partial-chain",
            Warning::Orphaned { .. } => "orphaned",
            Warning::DeletedBinary { .. } => "deleted-binary",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Zombie { pids } => {
                let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
                write!(f, "zombie process in chain (pid {})", pids.join(", "))
            }
            Warning::PartialChain(t) => {
                write!(f, "could not read ancestor (pid {}): {}", t.pid, t.reason)
            }
            Warning::Orphaned {
                root_pid,
                root_command,
            } => write!(
                f,
                "process tree is orphaned: root is {} (pid {}), not pid 1",
                root_command, root_pid
            ),
            Warning::DeletedBinary { pid } => {
                write!(f, "executable of pid {} was deleted or replaced on disk", pid)
            }
        }
    }
}

impl Serialize for Warning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Warning", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// `pid 1`, or the kernel-thread root on Linux.
fn is_system_root(process: &ProcessSnapshot) -> bool {
    process.pid == 1 || (process.pid == 2 && process.command == "kthreadd")
}

/// Independent checks over the chain. Pure: depends only on `ancestry`.
pub fn warnings(ancestry: &Ancestry) -> Vec<Warning> {
    let mut warnings = Vec::new();

    let zombies: Vec<u32> = ancestry
        .chain()
        .iter()
        .filter(|p| p.state == ProcessState::Zombie)
        .map(|p| p.pid)
        .collect();
    if !zombies.is_empty() {
        warnings.push(Warning::Zombie { pids: zombies });
    }

    match ancestry.truncated() {
        Some(truncation) => warnings.push(Warning::PartialChain(truncation)),
        None => {
            let root = ancestry.root();
            if !is_system_root(root) {
                warnings.push(Warning::Orphaned {
                    root_pid: root.pid,
                    root_command: root.command.clone(),
                });
            }
        }
    }

    if ancestry.process().exe_deleted() {
        warnings.push(Warning::DeletedBinary {
            pid: ancestry.process().pid,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry::TruncationReason;
    use std::path::PathBuf;

    fn snapshot(pid: u32, ppid: u32, command: &str, state: ProcessState) -> ProcessSnapshot {
        ProcessSnapshot::new(pid, ppid, command, state)
    }

    fn healthy() -> Vec<ProcessSnapshot> {
        vec![
            snapshot(601, 600, "bash", ProcessState::Sleeping),
            snapshot(600, 500, "sshd", ProcessState::Sleeping),
            snapshot(500, 1, "sshd", ProcessState::Sleeping),
            snapshot(1, 0, "init", ProcessState::Sleeping),
        ]
    }

    #[test]
    fn test_healthy_chain_has_no_warnings() {
        assert!(warnings(&Ancestry::from_chain(healthy(), None).unwrap()).is_empty());
    }

    #[test]
    fn test_single_zombie() {
        let mut chain = healthy();
        chain[1].state = ProcessState::Zombie;
        let found = warnings(&Ancestry::from_chain(chain, None).unwrap());
        assert_eq!(found, vec![Warning::Zombie { pids: vec![600] }]);
        assert!(found[0].to_string().starts_with("zombie process in chain"));
    }

    #[test]
    fn test_multiple_zombies_one_warning() {
        let mut chain = healthy();
        chain[0].state = ProcessState::Zombie;
        chain[2].state = ProcessState::Zombie;
        let found = warnings(&Ancestry::from_chain(chain, None).unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], Warning::Zombie { pids: vec![601, 500] });
    }

    #[test]
    fn test_partial_chain() {
        let chain = healthy()[..2].to_vec();
        let truncation = Truncation {
            pid: 500,
            reason: TruncationReason::PermissionDenied,
        };
        let found = warnings(&Ancestry::from_chain(chain, Some(truncation)).unwrap());
        assert_eq!(found, vec![Warning::PartialChain(truncation)]);
        assert_eq!(
            found[0].to_string(),
            "could not read ancestor (pid 500): permission denied"
        );
    }

    #[test]
    fn test_orphaned_subtree() {
        let chain = vec![
            snapshot(900, 800, "worker", ProcessState::Sleeping),
            snapshot(800, 0, "subreaper", ProcessState::Sleeping),
        ];
        let found = warnings(&Ancestry::from_chain(chain, None).unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), "orphaned");
    }

    #[test]
    fn test_kernel_thread_is_not_orphaned() {
        let chain = vec![
            snapshot(150, 2, "kworker/0:1", ProcessState::Sleeping),
            snapshot(2, 0, "kthreadd", ProcessState::Sleeping),
        ];
        assert!(warnings(&Ancestry::from_chain(chain, None).unwrap()).is_empty());
    }

    #[test]
    fn test_warnings_fire_together() {
        let mut chain = vec![
            snapshot(900, 800, "app", ProcessState::Zombie),
            snapshot(800, 700, "wrapper", ProcessState::Sleeping),
        ];
        chain[0].exe = Some(PathBuf::from("/srv/app (deleted)"));
        let truncation = Truncation {
            pid: 700,
            reason: TruncationReason::Exited,
        };
        let kinds: Vec<&str> = warnings(&Ancestry::from_chain(chain, Some(truncation)).unwrap())
            .iter()
            .map(Warning::kind)
            .collect();
        assert_eq!(kinds, vec!["zombie", "partial-chain", "deleted-binary"]);
    }

    #[test]
    fn test_warning_serialization() {
        let json = serde_json::to_value(Warning::DeletedBinary { pid: 7 }).unwrap();
        assert_eq!(json["kind"], "deleted-binary");
        assert_eq!(json["message"], "executable of pid 7 was deleted or replaced on disk");
    }
}
