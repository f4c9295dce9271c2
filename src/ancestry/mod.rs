//! Process ancestry and source detection ("why is this running?").
//!
//! Answers the causality question: given one resolved process, walk its
//! parent chain up to the root and identify which runtime, supervisor or
//! shell is responsible for it.

mod git;
mod health;
mod source;

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use log::debug;
use serde::Serialize;

use crate::error::{ReadError, ResolveError};
use crate::platform::SystemReader;
use crate::types::{ProcessSnapshot, Target};

pub use git::GitContext;
pub use health::{warnings, Warning};
pub use source::{classify, Category, Classifier, Source};

/// Depth guard for the parent walk. Real trees are rarely deeper than 20.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// The parent chain of one process, ordered from the process itself (index
/// 0) up to the root or the last ancestor that could be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ancestry {
    chain: Vec<ProcessSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncated: Option<Truncation>,
}

/// Where and why the walk stopped before reaching the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Truncation {
    /// The parent PID that could not be followed.
    pub pid: u32,
    pub reason: TruncationReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    Exited,
    PermissionDenied,
    Unreadable,
    Cycle,
    DepthLimit,
}

impl From<&ReadError> for TruncationReason {
    fn from(err: &ReadError) -> Self {
        match err {
            ReadError::Gone => TruncationReason::Exited,
            ReadError::PermissionDenied => TruncationReason::PermissionDenied,
            ReadError::Malformed(_) | ReadError::Io(_) => TruncationReason::Unreadable,
        }
    }
}

impl fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TruncationReason::Exited => write!(f, "process exited"),
            TruncationReason::PermissionDenied => write!(f, "permission denied"),
            TruncationReason::Unreadable => write!(f, "unreadable"),
            TruncationReason::Cycle => write!(f, "parent chain loops"),
            TruncationReason::DepthLimit => write!(f, "depth limit reached"),
        }
    }
}

impl Ancestry {
    /// Build from an already-ordered chain, resolved process first.
    /// Returns `None` for an empty chain.
    pub fn from_chain(chain: Vec<ProcessSnapshot>, truncated: Option<Truncation>) -> Option<Self> {
        if chain.is_empty() {
            return None;
        }
        Some(Self { chain, truncated })
    }

    pub fn chain(&self) -> &[ProcessSnapshot] {
        &self.chain
    }

    /// The resolved process.
    pub fn process(&self) -> &ProcessSnapshot {
        &self.chain[0]
    }

    /// The oldest ancestor that was read.
    pub fn root(&self) -> &ProcessSnapshot {
        &self.chain[self.chain.len() - 1]
    }

    pub fn truncated(&self) -> Option<Truncation> {
        self.truncated
    }
}

/// Walk the PPID chain from `pid` toward the root.
///
/// Only the first read can fail the walk. Every later failure ends the
/// chain early and is recorded in [`Ancestry::truncated`].
pub fn build_ancestry<S: SystemReader>(
    system: &S,
    pid: u32,
    max_depth: usize,
) -> Result<Ancestry, ResolveError> {
    let first = system.process(pid).map_err(|err| {
        debug!("initial read of pid {} failed: {}", pid, err);
        ResolveError::NotFound(Target::pid(pid.to_string()))
    })?;

    let max_depth = max_depth.max(1);
    let mut chain = vec![first];
    let mut visited = HashSet::from([pid]);
    let mut truncated = None;

    loop {
        let current = &chain[chain.len() - 1];
        let (current_pid, parent) = (current.pid, current.ppid);

        // ppid 0: pid 1 or a kernel-thread root. ppid == pid: self-parented.
        if parent == 0 || parent == current_pid {
            break;
        }
        if chain.len() >= max_depth {
            truncated = Some(Truncation {
                pid: parent,
                reason: TruncationReason::DepthLimit,
            });
            break;
        }
        if !visited.insert(parent) {
            truncated = Some(Truncation {
                pid: parent,
                reason: TruncationReason::Cycle,
            });
            break;
        }

        match system.process(parent) {
            Ok(snapshot) => chain.push(snapshot),
            Err(err) => {
                debug!("ancestry of {} stops at parent {}: {}", pid, parent, err);
                truncated = Some(Truncation {
                    pid: parent,
                    reason: TruncationReason::from(&err),
                });
                break;
            }
        }
    }

    Ok(Ancestry { chain, truncated })
}

/// Facts about the resolved process that are not part of the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systemd_unit: Option<String>,
}

/// Gather [`ProcessContext`] for `pid`. Every lookup is best-effort.
pub fn collect_context<S: SystemReader>(system: &S, pid: u32) -> ProcessContext {
    let working_dir = system.working_dir(pid);
    let git = working_dir.as_deref().and_then(git::detect_git_context);
    let systemd_unit = system.cgroup(pid).as_deref().and_then(parse_systemd_unit);

    ProcessContext {
        working_dir,
        git,
        systemd_unit,
    }
}

/// Extract the systemd unit from cgroup content.
///
/// Looks for patterns like `0::/system.slice/nginx.service` and returns
/// `nginx.service`.
fn parse_systemd_unit(cgroup: &str) -> Option<String> {
    cgroup
        .lines()
        .filter_map(|line| line.rsplit(':').next())
        .flat_map(|path| path.rsplit('/'))
        .find(|segment| segment.ends_with(".service"))
        .map(str::to_string)
}
