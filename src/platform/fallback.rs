//! System reader for non-Linux Unixes, built on `ps` and `listeners`.
//!
//! There are no socket inodes here: `listeners` already knows each socket's
//! owner, so every listener is handed a synthetic handle and
//! [`SystemReader::socket_inodes`] answers from the last socket read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::process::Command;

use log::debug;

use super::SystemReader;
use crate::error::ReadError;
use crate::types::{ProcessSnapshot, ProcessState, Protocol, SocketEntry, SocketState};

#[derive(Debug, Default)]
pub struct PsSystem {
    /// pid -> synthetic handles of the sockets it owns, with the next free handle.
    handles: RefCell<(u64, HashMap<u32, Vec<u64>>)>,
}

const PS_FIELDS: &str = "pid=,ppid=,state=,uid=,comm=";

impl PsSystem {
    fn run_ps(args: &[&str]) -> Result<String, ReadError> {
        let output = Command::new("ps").args(args).output()?;
        if !output.status.success() {
            return Err(ReadError::Gone);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SystemReader for PsSystem {
    fn pids(&self) -> Result<Vec<u32>, ReadError> {
        let stdout = Self::run_ps(&["-A", "-o", "pid="])?;
        let mut pids: Vec<u32> = stdout
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn process(&self, pid: u32) -> Result<ProcessSnapshot, ReadError> {
        let stdout = Self::run_ps(&["-o", PS_FIELDS, "-p", &pid.to_string()])?;
        let line = stdout.lines().next().ok_or(ReadError::Gone)?;
        let mut snapshot = parse_ps_line(line)
            .ok_or_else(|| ReadError::Malformed(format!("unexpected ps output: {line}")))?;

        if let Ok(args) = Self::run_ps(&["-o", "args=", "-p", &pid.to_string()]) {
            let args = args.trim();
            if !args.is_empty() {
                snapshot.cmdline = Some(args.to_string());
            }
        }
        Ok(snapshot)
    }

    /// One `ps -A` listing instead of a `ps` run per PID. Snapshots carry
    /// no command line; callers re-read the few they keep.
    fn processes(&self) -> Result<Vec<ProcessSnapshot>, ReadError> {
        let stdout = Self::run_ps(&["-A", "-o", PS_FIELDS])?;
        Ok(parse_ps_listing(&stdout))
    }

    fn sockets(&self, protocol: Protocol) -> Result<Vec<SocketEntry>, ReadError> {
        let listeners = listeners::get_all()
            .map_err(|e| ReadError::Malformed(format!("Failed to get listening ports: {}", e)))?;

        let mut guard = self.handles.borrow_mut();
        let (next_handle, owners) = &mut *guard;

        let mut entries = Vec::new();
        for listener in listeners {
            let listener_protocol = match listener.protocol {
                listeners::Protocol::TCP => Protocol::Tcp,
                listeners::Protocol::UDP => Protocol::Udp,
            };
            if listener_protocol != protocol {
                continue;
            }

            *next_handle += 1;
            owners.entry(listener.process.pid).or_default().push(*next_handle);
            entries.push(SocketEntry {
                protocol,
                local_addr: listener.socket.ip(),
                local_port: listener.socket.port(),
                state: match protocol {
                    Protocol::Tcp => SocketState::Listen,
                    Protocol::Udp => SocketState::Close,
                },
                inode: *next_handle,
            });
        }

        debug!("listeners reported {} {} sockets", entries.len(), protocol);
        Ok(entries)
    }

    fn socket_inodes(&self, pid: u32) -> Result<Vec<u64>, ReadError> {
        Ok(self
            .handles
            .borrow()
            .1
            .get(&pid)
            .cloned()
            .unwrap_or_default())
    }
}

/// Parse a multi-process listing, ascending by PID. Unparseable lines are skipped.
fn parse_ps_listing(stdout: &str) -> Vec<ProcessSnapshot> {
    let mut processes: Vec<ProcessSnapshot> = stdout
        .lines()
        .filter_map(|line| {
            let parsed = parse_ps_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                debug!("skipping ps line: {}", line);
            }
            parsed
        })
        .collect();
    processes.sort_unstable_by_key(|p| p.pid);
    processes
}

/// Parse one `ps -o pid=,ppid=,state=,uid=,comm=` line.
///
/// Columns are separated by variable whitespace and comm may itself contain
/// spaces, so everything after the fourth column is the command.
fn parse_ps_line(line: &str) -> Option<ProcessSnapshot> {
    let mut tokens = line.split_whitespace();
    let pid = tokens.next()?.parse().ok()?;
    let ppid = tokens.next()?.parse().ok()?;
    let state = tokens.next()?.chars().next()?;
    let uid = tokens.next()?.parse().ok();
    let comm = tokens.collect::<Vec<&str>>().join(" ");
    if comm.is_empty() {
        return None;
    }

    // macOS reports the full executable path as comm.
    let command = comm.rsplit('/').next().unwrap_or(&comm).to_string();

    let mut snapshot = ProcessSnapshot::new(pid, ppid, command, ProcessState::from_code(state));
    snapshot.uid = uid;
    if comm.starts_with('/') {
        snapshot.exe = Some(comm.into());
    }
    Some(snapshot)
}
