use std::fs;
use std::path::Path;

use crate::error::ReadError;

/// Socket inodes held open by the process whose fd directory is `fd_dir`.
///
/// Fails only when the directory itself can't be listed, which is the
/// signal callers use to tell "not ours to see" from "holds nothing".
/// Individual fds closing mid-scan are skipped.
pub fn read_socket_inodes(fd_dir: &Path) -> Result<Vec<u64>, ReadError> {
    let entries = fs::read_dir(fd_dir)?;

    let mut inodes = Vec::new();
    for entry in entries.flatten() {
        if let Ok(link_target) = fs::read_link(entry.path()) {
            if let Some(inode) = parse_socket_link(&link_target) {
                inodes.push(inode);
            }
        }
    }

    Ok(inodes)
}

/// `socket:[12345]` -> `12345`.
pub fn parse_socket_link(path: &Path) -> Option<u64> {
    path.to_str()?
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}
