//! Core data types shared by the resolver, the ancestry walk and rendering.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::Serialize;

use crate::ancestry::{Ancestry, ProcessContext, Source, Warning};

/// What the user asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Pid,
    Port,
    Name,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Pid => write!(f, "pid"),
            TargetKind::Port => write!(f, "port"),
            TargetKind::Name => write!(f, "name"),
        }
    }
}

/// A query exactly as the user typed it. Validation happens in the resolver
/// so that malformed values surface as `InvalidQuery`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub value: String,
}

impl Target {
    pub fn pid(value: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Pid,
            value: value.into(),
        }
    }

    pub fn port(value: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Port,
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Name,
            value: value.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::Name => write!(f, "name '{}'", self.value),
            kind => write!(f, "{} {}", kind, self.value),
        }
    }
}

/// Lifecycle state of a process as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Running,
    Sleeping,
    Zombie,
    Stopped,
    Other,
}

impl ProcessState {
    /// Map the single-letter state used by `/proc/<pid>/stat` and `ps`.
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => ProcessState::Running,
            'S' | 'D' | 'I' | 'U' => ProcessState::Sleeping,
            'Z' => ProcessState::Zombie,
            'T' | 't' => ProcessState::Stopped,
            _ => ProcessState::Other,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::Sleeping => write!(f, "sleeping"),
            ProcessState::Zombie => write!(f, "zombie"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Other => write!(f, "other"),
        }
    }
}

/// One read of one process. Never cached: a later read may disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub ppid: u32,
    pub command: String,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exe: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
}

impl ProcessSnapshot {
    /// Minimal snapshot; the optional attributes start empty.
    pub fn new(pid: u32, ppid: u32, command: impl Into<String>, state: ProcessState) -> Self {
        Self {
            pid,
            ppid,
            command: command.into(),
            state,
            cmdline: None,
            exe: None,
            uid: None,
        }
    }

    /// Full command line if known, otherwise the short command name.
    pub fn display_cmdline(&self) -> &str {
        match self.cmdline.as_deref() {
            Some(cmdline) if !cmdline.is_empty() => cmdline,
            _ => &self.command,
        }
    }

    /// True when the kernel reports the executable as removed or replaced.
    pub fn exe_deleted(&self) -> bool {
        self.exe
            .as_ref()
            .is_some_and(|exe| exe.to_string_lossy().ends_with(" (deleted)"))
    }
}

impl fmt::Display for ProcessSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.command, self.pid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Kernel socket state, numbered as in `include/net/tcp_states.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown(u8),
}

impl SocketState {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SocketState::Established,
            2 => SocketState::SynSent,
            3 => SocketState::SynRecv,
            4 => SocketState::FinWait1,
            5 => SocketState::FinWait2,
            6 => SocketState::TimeWait,
            7 => SocketState::Close,
            8 => SocketState::CloseWait,
            9 => SocketState::LastAck,
            10 => SocketState::Listen,
            11 => SocketState::Closing,
            n => SocketState::Unknown(n),
        }
    }
}

/// One row of a kernel socket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub protocol: Protocol,
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub state: SocketState,
    pub inode: u64,
}

impl SocketEntry {
    /// Whether the socket is currently bound, listening or connected.
    ///
    /// TIME_WAIT and closed TCP rows linger in the table after the owner is
    /// gone and carry inode 0. Unconnected UDP sockets report `Close` (07).
    pub fn is_active(&self) -> bool {
        if self.inode == 0 {
            return false;
        }
        match self.protocol {
            Protocol::Tcp => matches!(
                self.state,
                SocketState::Listen
                    | SocketState::Established
                    | SocketState::SynSent
                    | SocketState::SynRecv
                    | SocketState::FinWait1
                    | SocketState::FinWait2
                    | SocketState::CloseWait
                    | SocketState::LastAck
                    | SocketState::Closing
            ),
            Protocol::Udp => matches!(self.state, SocketState::Close | SocketState::Established),
        }
    }
}

/// Everything known about one explained process. Built once, then only read.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub target: Target,
    pub resolved_target: String,
    pub process: ProcessSnapshot,
    pub ancestry: Ancestry,
    pub source: Source,
    pub warnings: Vec<Warning>,
    pub context: ProcessContext,
}
