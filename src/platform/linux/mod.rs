//! `/proc`-backed system reader.

pub mod proc_fd;
pub mod proc_parser;

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{debug, warn};

use super::SystemReader;
use crate::error::ReadError;
use crate::types::{ProcessSnapshot, Protocol, SocketEntry};
use proc_parser::{parse_cmdline, parse_proc_net_file, parse_stat, parse_status_uid};

/// Reads the process table from a procfs mount, `/proc` by default.
#[derive(Debug, Clone)]
pub struct ProcSystem {
    root: PathBuf,
}

impl Default for ProcSystem {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pid_path(&self, pid: u32, entry: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(entry)
    }

    fn read_net_table(&self, file: &str, protocol: Protocol) -> Result<Vec<SocketEntry>, ReadError> {
        let path = self.root.join("net").join(file);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(parse_proc_net_file(&content, protocol)),
            // No IPv6 stack, or the table is hidden from us.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} not present, skipping", path.display());
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl SystemReader for ProcSystem {
    fn pids(&self) -> Result<Vec<u32>, ReadError> {
        let mut pids: Vec<u32> = fs::read_dir(&self.root)?
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn process(&self, pid: u32) -> Result<ProcessSnapshot, ReadError> {
        let stat = fs::read_to_string(self.pid_path(pid, "stat"))?;
        let fields = parse_stat(&stat).map_err(|err| ReadError::Malformed(format!("{err:#}")))?;
        if fields.pid != pid {
            return Err(ReadError::Malformed(format!(
                "stat for pid {} reports pid {}",
                pid, fields.pid
            )));
        }

        // The remaining attributes are best-effort: zombies have no exe,
        // and other users' exe links are unreadable.
        let cmdline = fs::read(self.pid_path(pid, "cmdline"))
            .ok()
            .and_then(|raw| parse_cmdline(&raw));
        let exe = fs::read_link(self.pid_path(pid, "exe")).ok();
        let uid = fs::read_to_string(self.pid_path(pid, "status"))
            .ok()
            .and_then(|status| parse_status_uid(&status));

        Ok(ProcessSnapshot {
            pid,
            ppid: fields.ppid,
            command: fields.command,
            state: fields.state,
            cmdline,
            exe,
            uid,
        })
    }

    fn sockets(&self, protocol: Protocol) -> Result<Vec<SocketEntry>, ReadError> {
        let (v4, v6) = match protocol {
            Protocol::Tcp => ("tcp", "tcp6"),
            Protocol::Udp => ("udp", "udp6"),
        };

        // Either family alone is a usable answer; fail only if both are unreadable.
        let mut entries = Vec::new();
        let mut failure = None;
        let mut read_any = false;
        for file in [v4, v6] {
            match self.read_net_table(file, protocol) {
                Ok(more) => {
                    read_any = true;
                    entries.extend(more);
                }
                Err(err) => {
                    warn!("could not read /proc/net/{}: {}", file, err);
                    failure.get_or_insert(err);
                }
            }
        }
        match failure {
            Some(err) if !read_any => Err(err),
            _ => Ok(entries),
        }
    }

    fn socket_inodes(&self, pid: u32) -> Result<Vec<u64>, ReadError> {
        proc_fd::read_socket_inodes(&self.pid_path(pid, "fd"))
    }

    fn working_dir(&self, pid: u32) -> Option<PathBuf> {
        fs::read_link(self.pid_path(pid, "cwd")).ok()
    }

    fn cgroup(&self, pid: u32) -> Option<String> {
        fs::read_to_string(self.pid_path(pid, "cgroup")).ok()
    }
}
