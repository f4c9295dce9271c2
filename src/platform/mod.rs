//! Read-only access to the OS process, socket and file-descriptor tables.
//!
//! Everything above this module talks to [`SystemReader`] and never to
//! `/proc` or `ps` directly. Implementations must not cache: each call
//! reflects the live system at the moment of the call.

use std::path::PathBuf;

use crate::error::ReadError;
use crate::types::{ProcessSnapshot, Protocol, SocketEntry};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(not(target_os = "linux"))]
pub mod fallback;

pub mod memory;

pub use memory::MemorySystem;

pub trait SystemReader {
    /// All live process identifiers.
    fn pids(&self) -> Result<Vec<u32>, ReadError>;

    /// One process's attributes.
    fn process(&self, pid: u32) -> Result<ProcessSnapshot, ReadError>;

    /// Every process that could be read, ascending by PID. Processes that
    /// exit or deny access mid-listing are left out.
    fn processes(&self) -> Result<Vec<ProcessSnapshot>, ReadError> {
        Ok(self
            .pids()?
            .into_iter()
            .filter_map(|pid| self.process(pid).ok())
            .collect())
    }

    /// The socket table for one protocol, IPv4 and IPv6 combined.
    fn sockets(&self, protocol: Protocol) -> Result<Vec<SocketEntry>, ReadError>;

    /// Socket inodes held open by `pid`.
    fn socket_inodes(&self, pid: u32) -> Result<Vec<u64>, ReadError>;

    /// Current working directory, when the platform exposes it.
    fn working_dir(&self, _pid: u32) -> Option<PathBuf> {
        None
    }

    /// Raw control-group membership, when the platform has cgroups.
    fn cgroup(&self, _pid: u32) -> Option<String> {
        None
    }
}

#[cfg(target_os = "linux")]
pub type LiveSystem = linux::ProcSystem;

#[cfg(not(target_os = "linux"))]
pub type LiveSystem = fallback::PsSystem;

/// The reader for the machine we are running on.
pub fn live() -> LiveSystem {
    LiveSystem::default()
}
