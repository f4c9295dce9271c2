//! Parsers for the text tables under `/proc`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use anyhow::{bail, Context, Result};

use crate::types::{ProcessState, Protocol, SocketEntry, SocketState};

pub fn parse_hex_addr(hex: &str) -> Result<Ipv4Addr> {
    let num = u32::from_str_radix(hex, 16).context("Invalid address hex")?;
    Ok(Ipv4Addr::from(num.to_le_bytes()))
}

pub fn parse_hex_port(hex: &str) -> Result<u16> {
    u16::from_str_radix(hex, 16).context("Invalid port hex")
}

pub fn parse_hex_addr_v6(hex: &str) -> Result<Ipv6Addr> {
    if hex.len() != 32 {
        bail!("IPv6 address must be 32 hex chars, got {}", hex.len());
    }

    // Four host-order 32-bit words, each printed as hex.
    let mut octets = [0u8; 16];
    for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
        let word_hex = &hex[i * 8..(i + 1) * 8];
        let word = u32::from_str_radix(word_hex, 16).context("Invalid IPv6 hex")?;
        chunk.copy_from_slice(&word.to_le_bytes());
    }

    Ok(Ipv6Addr::from(octets))
}

pub fn parse_hex_addr_any(hex: &str) -> Result<IpAddr> {
    match hex.len() {
        8 => Ok(IpAddr::V4(parse_hex_addr(hex)?)),
        32 => Ok(IpAddr::V6(parse_hex_addr_v6(hex)?)),
        n => bail!("Invalid address length: {} (expected 8 or 32)", n),
    }
}

/// Parse one data row of `/proc/net/{tcp,tcp6,udp,udp6}`.
pub fn parse_socket_line(line: &str, protocol: Protocol) -> Result<SocketEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() < 10 {
        bail!("Invalid socket line: not enough fields");
    }

    let local = parts[1];
    let state_hex = parts[3];
    let inode_str = parts[9];

    let (local_addr_hex, local_port_hex) = local
        .split_once(':')
        .context("Invalid local address format")?;
    let state = u8::from_str_radix(state_hex, 16).context("Invalid state hex")?;

    Ok(SocketEntry {
        protocol,
        local_addr: parse_hex_addr_any(local_addr_hex)?,
        local_port: parse_hex_port(local_port_hex)?,
        state: SocketState::from_code(state),
        inode: inode_str.parse().context("Invalid inode")?,
    })
}

/// Parse a whole socket table, skipping the header and any malformed rows.
pub fn parse_proc_net_file(content: &str, protocol: Protocol) -> Vec<SocketEntry> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_socket_line(line, protocol).ok())
        .collect()
}

/// Fields of `/proc/<pid>/stat` the ancestry walk needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFields {
    pub pid: u32,
    pub command: String,
    pub state: ProcessState,
    pub ppid: u32,
}

/// Parse `/proc/<pid>/stat`.
///
/// Format: `pid (comm) state ppid ...`. comm can contain spaces and
/// parentheses, so the name ends at the LAST `)`.
pub fn parse_stat(content: &str) -> Result<StatFields> {
    let comm_start = content.find('(').context("Missing '(' in stat")?;
    let comm_end = content.rfind(')').context("Missing ')' in stat")?;
    if comm_end < comm_start {
        bail!("Unbalanced command name in stat");
    }

    let pid = content[..comm_start]
        .trim()
        .parse()
        .context("Invalid pid in stat")?;
    let command = content[comm_start + 1..comm_end].to_string();

    let rest = content.get(comm_end + 1..).context("Truncated stat")?;
    let mut fields = rest.split_whitespace();
    let state = fields
        .next()
        .and_then(|s| s.chars().next())
        .context("Missing state in stat")?;
    let ppid = fields
        .next()
        .context("Missing ppid in stat")?
        .parse()
        .context("Invalid ppid in stat")?;

    Ok(StatFields {
        pid,
        command,
        state: ProcessState::from_code(state),
        ppid,
    })
}

/// Real uid from the `Uid:` line of `/proc/<pid>/status`.
pub fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// `/proc/<pid>/cmdline` is NUL-separated argv; kernel threads have none.
pub fn parse_cmdline(raw: &[u8]) -> Option<String> {
    let args: Vec<String> = raw
        .split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();

    if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    }
}
