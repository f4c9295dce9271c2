//! In-memory process table.
//!
//! Holds a fixed set of processes, sockets and fd tables so the resolver and
//! the ancestry walk can be driven without a live kernel. Entries can be
//! marked unreadable to reproduce permission gaps and processes exiting
//! between enumeration and read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};

use super::SystemReader;
use crate::error::ReadError;
use crate::types::{ProcessSnapshot, ProcessState, Protocol, SocketEntry, SocketState};

#[derive(Debug, Default, Clone)]
pub struct MemorySystem {
    processes: BTreeMap<u32, ProcessSnapshot>,
    sockets: Vec<SocketEntry>,
    fds: HashMap<u32, Vec<u64>>,
    /// Listed by `pids()` but no longer readable.
    exited: HashSet<u32>,
    /// Snapshot readable, fd table not.
    private_fds: HashSet<u32>,
    /// Snapshot read fails with permission denied.
    private_processes: HashSet<u32>,
    /// Socket tables that fail with permission denied.
    private_sockets: HashSet<Protocol>,
}

impl MemorySystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, snapshot: ProcessSnapshot) -> Self {
        self.processes.insert(snapshot.pid, snapshot);
        self
    }

    /// Shorthand for a sleeping process.
    pub fn spawn(self, pid: u32, ppid: u32, command: &str) -> Self {
        self.with_process(ProcessSnapshot::new(pid, ppid, command, ProcessState::Sleeping))
    }

    pub fn with_socket(mut self, socket: SocketEntry) -> Self {
        self.sockets.push(socket);
        self
    }

    /// Shorthand for a TCP listener on all IPv4 addresses.
    pub fn listener(self, port: u16, inode: u64) -> Self {
        self.with_socket(SocketEntry {
            protocol: Protocol::Tcp,
            local_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            local_port: port,
            state: SocketState::Listen,
            inode,
        })
    }

    pub fn with_fd(mut self, pid: u32, inode: u64) -> Self {
        self.fds.entry(pid).or_default().push(inode);
        self
    }

    /// Keep `pid` enumerable but make every read report it gone.
    pub fn exited(mut self, pid: u32) -> Self {
        self.exited.insert(pid);
        self
    }

    pub fn private_fds(mut self, pid: u32) -> Self {
        self.private_fds.insert(pid);
        self
    }

    pub fn private_process(mut self, pid: u32) -> Self {
        self.private_processes.insert(pid);
        self
    }

    pub fn private_sockets(mut self, protocol: Protocol) -> Self {
        self.private_sockets.insert(protocol);
        self
    }
}

impl SystemReader for MemorySystem {
    fn pids(&self) -> Result<Vec<u32>, ReadError> {
        Ok(self.processes.keys().copied().collect())
    }

    fn process(&self, pid: u32) -> Result<ProcessSnapshot, ReadError> {
        if self.exited.contains(&pid) {
            return Err(ReadError::Gone);
        }
        if self.private_processes.contains(&pid) {
            return Err(ReadError::PermissionDenied);
        }
        self.processes.get(&pid).cloned().ok_or(ReadError::Gone)
    }

    fn sockets(&self, protocol: Protocol) -> Result<Vec<SocketEntry>, ReadError> {
        if self.private_sockets.contains(&protocol) {
            return Err(ReadError::PermissionDenied);
        }
        Ok(self
            .sockets
            .iter()
            .filter(|s| s.protocol == protocol)
            .cloned()
            .collect())
    }

    fn socket_inodes(&self, pid: u32) -> Result<Vec<u64>, ReadError> {
        if self.exited.contains(&pid) || !self.processes.contains_key(&pid) {
            return Err(ReadError::Gone);
        }
        if self.private_fds.contains(&pid) {
            return Err(ReadError::PermissionDenied);
        }
        Ok(self.fds.get(&pid).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pids_ascending() {
        let system = MemorySystem::new().spawn(30, 1, "c").spawn(1, 0, "init").spawn(7, 1, "b");
        assert_eq!(system.pids().unwrap(), vec![1, 7, 30]);
    }

    #[test]
    fn test_exited_process_is_listed_but_gone() {
        let system = MemorySystem::new().spawn(7, 1, "b").exited(7);
        assert_eq!(system.pids().unwrap(), vec![7]);
        assert!(matches!(system.process(7), Err(ReadError::Gone)));
        assert!(matches!(system.socket_inodes(7), Err(ReadError::Gone)));
    }

    #[test]
    fn test_processes_skips_unreadable() {
        let system = MemorySystem::new()
            .spawn(1, 0, "init")
            .spawn(7, 1, "b")
            .spawn(9, 1, "c")
            .exited(7)
            .private_process(9);
        let pids: Vec<u32> = system.processes().unwrap().iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1]);
    }

    #[test]
    fn test_private_fds() {
        let system = MemorySystem::new().spawn(7, 1, "b").with_fd(7, 99).private_fds(7);
        assert!(system.process(7).is_ok());
        assert!(matches!(system.socket_inodes(7), Err(ReadError::PermissionDenied)));
    }

    #[test]
    fn test_sockets_filtered_by_protocol() {
        let system = MemorySystem::new().listener(80, 1).listener(443, 2);
        assert_eq!(system.sockets(Protocol::Tcp).unwrap().len(), 2);
        assert!(system.sockets(Protocol::Udp).unwrap().is_empty());
    }

    #[test]
    fn test_private_socket_table() {
        let system = MemorySystem::new().listener(80, 1).private_sockets(Protocol::Tcp);
        assert!(matches!(system.sockets(Protocol::Tcp), Err(ReadError::PermissionDenied)));
        assert!(system.sockets(Protocol::Udp).is_ok());
    }
}
