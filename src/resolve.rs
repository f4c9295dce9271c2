//! Turning a [`Target`] into candidate process identifiers.

use std::collections::{BTreeSet, HashSet};

use log::{debug, warn};

use crate::error::{ReadError, ResolveError};
use crate::platform::SystemReader;
use crate::types::{Protocol, Target, TargetKind};

/// Resolves queries against one system reader.
pub struct Resolver<'a, S: SystemReader> {
    system: &'a S,
    exclude: Option<u32>,
}

impl<'a, S: SystemReader> Resolver<'a, S> {
    pub fn new(system: &'a S) -> Self {
        Self {
            system,
            exclude: None,
        }
    }

    /// Never report `pid` from a name search (used to hide ourselves).
    pub fn excluding(mut self, pid: u32) -> Self {
        self.exclude = Some(pid);
        self
    }

    /// Candidate PIDs for `target`, ascending and without duplicates.
    pub fn resolve(&self, target: &Target) -> Result<Vec<u32>, ResolveError> {
        match target.kind {
            TargetKind::Pid => self.resolve_pid(target),
            TargetKind::Port => self.resolve_port(target),
            TargetKind::Name => self.resolve_name(target),
        }
    }

    fn resolve_pid(&self, target: &Target) -> Result<Vec<u32>, ResolveError> {
        let pid = parse_pid(&target.value)?;
        match self.system.process(pid) {
            Ok(_) => Ok(vec![pid]),
            Err(err) => {
                debug!("pid {} unreadable: {}", pid, err);
                Err(ResolveError::NotFound(target.clone()))
            }
        }
    }

    fn resolve_name(&self, target: &Target) -> Result<Vec<u32>, ResolveError> {
        if target.value.is_empty() {
            return Err(ResolveError::InvalidQuery {
                kind: "name",
                value: String::new(),
                reason: "must not be empty",
            });
        }

        let processes = self.system.processes().map_err(ResolveError::System)?;
        let matches: Vec<u32> = processes
            .into_iter()
            .filter(|p| Some(p.pid) != self.exclude)
            .filter(|p| p.command.contains(target.value.as_str()))
            .map(|p| p.pid)
            .collect::<BTreeSet<u32>>()
            .into_iter()
            .collect();

        if matches.is_empty() {
            return Err(ResolveError::NotFound(target.clone()));
        }
        Ok(matches)
    }

    fn resolve_port(&self, target: &Target) -> Result<Vec<u32>, ResolveError> {
        let port = parse_port(&target.value)?;

        let inodes = self.active_socket_inodes(port)?;
        if inodes.is_empty() {
            return Err(ResolveError::NotFound(target.clone()));
        }
        debug!("port {}: {} active socket(s), scanning fd tables", port, inodes.len());

        let owners = self.find_owners(&inodes)?;
        if owners.is_empty() {
            return Err(ResolveError::OwnerNotDetected { port });
        }
        Ok(owners.into_iter().collect())
    }

    /// Inodes of active sockets bound to `port`. One unreadable table is
    /// tolerated; if none can be read the failure is returned.
    fn active_socket_inodes(&self, port: u16) -> Result<HashSet<u64>, ResolveError> {
        let mut inodes = HashSet::new();
        let mut failure = None;
        let mut read_any = false;

        for protocol in [Protocol::Tcp, Protocol::Udp] {
            let sockets = match self.system.sockets(protocol) {
                Ok(sockets) => sockets,
                Err(err) => {
                    warn!("could not read {} socket table: {}", protocol, err);
                    failure.get_or_insert(err);
                    continue;
                }
            };
            read_any = true;

            for socket in sockets
                .iter()
                .filter(|s| s.local_port == port && s.is_active())
            {
                debug!(
                    "port {}: {} {}:{} {:?} inode {}",
                    port,
                    socket.protocol,
                    socket.local_addr,
                    socket.local_port,
                    socket.state,
                    socket.inode
                );
                inodes.insert(socket.inode);
            }
        }

        match failure {
            Some(err) if !read_any => Err(ResolveError::System(err)),
            _ => Ok(inodes),
        }
    }

    /// Every process holding one of `inodes`. Unreadable fd tables are
    /// skipped; they are the reason an owner can go undetected.
    fn find_owners(&self, inodes: &HashSet<u64>) -> Result<BTreeSet<u32>, ResolveError> {
        let pids = self.system.pids().map_err(ResolveError::System)?;

        let mut owners = BTreeSet::new();
        let mut denied = 0usize;
        for pid in pids {
            match self.system.socket_inodes(pid) {
                Ok(held) => {
                    if held.iter().any(|inode| inodes.contains(inode)) {
                        owners.insert(pid);
                    }
                }
                Err(ReadError::PermissionDenied) => denied += 1,
                Err(err) => debug!("skipping fd table of pid {}: {}", pid, err),
            }
        }

        if denied > 0 {
            debug!("{} fd table(s) were not readable", denied);
        }
        Ok(owners)
    }
}

fn parse_pid(value: &str) -> Result<u32, ResolveError> {
    match value.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(ResolveError::InvalidQuery {
            kind: "pid",
            value: value.to_string(),
            reason: "must be a positive integer",
        }),
    }
}

fn parse_port(value: &str) -> Result<u16, ResolveError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ResolveError::InvalidQuery {
            kind: "port",
            value: value.to_string(),
            reason: "must be an integer between 0 and 65535",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemorySystem;
    use crate::types::{SocketEntry, SocketState};
    use std::net::{IpAddr, Ipv6Addr};

    fn tree() -> MemorySystem {
        MemorySystem::new()
            .spawn(1, 0, "init")
            .spawn(500, 1, "sshd")
            .spawn(600, 500, "sshd")
            .spawn(601, 600, "bash")
            .spawn(700, 1, "nginx")
            .spawn(701, 700, "nginx")
    }

    #[test]
    fn test_pid_found() {
        let system = tree();
        assert_eq!(Resolver::new(&system).resolve(&Target::pid("601")).unwrap(), vec![601]);
    }

    #[test]
    fn test_pid_not_found() {
        let system = tree();
        let err = Resolver::new(&system).resolve(&Target::pid("9999")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_pid_invalid() {
        let system = tree();
        for bad in ["0", "-1", "abc", "", "1.5"] {
            let err = Resolver::new(&system).resolve(&Target::pid(bad)).unwrap_err();
            assert!(matches!(err, ResolveError::InvalidQuery { kind: "pid", .. }), "{bad}");
        }
    }

    #[test]
    fn test_name_ascending_substring_matches() {
        let system = tree();
        let pids = Resolver::new(&system).resolve(&Target::name("ssh")).unwrap();
        assert_eq!(pids, vec![500, 600]);
    }

    #[test]
    fn test_name_is_case_sensitive() {
        let system = tree();
        let err = Resolver::new(&system).resolve(&Target::name("NGINX")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_name_skips_exited_and_excluded() {
        let system = tree().exited(701);
        let pids = Resolver::new(&system)
            .excluding(700)
            .resolve(&Target::name("nginx"));
        assert!(matches!(pids, Err(ResolveError::NotFound(_))));
    }

    #[test]
    fn test_name_empty_is_invalid() {
        let system = tree();
        let err = Resolver::new(&system).resolve(&Target::name("")).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidQuery { kind: "name", .. }));
    }

    #[test]
    fn test_port_single_owner() {
        let system = tree().listener(80, 4242).with_fd(700, 4242);
        let pids = Resolver::new(&system).resolve(&Target::port("80")).unwrap();
        assert_eq!(pids, vec![700]);
    }

    #[test]
    fn test_port_shared_by_forked_workers() {
        let system = tree()
            .listener(80, 4242)
            .with_fd(701, 4242)
            .with_fd(700, 4242);
        let pids = Resolver::new(&system).resolve(&Target::port("80")).unwrap();
        assert_eq!(pids, vec![700, 701]);
    }

    #[test]
    fn test_port_reuseport_distinct_sockets() {
        let system = tree()
            .listener(80, 1)
            .with_socket(SocketEntry {
                protocol: Protocol::Tcp,
                local_addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                local_port: 80,
                state: SocketState::Listen,
                inode: 2,
            })
            .with_fd(701, 2)
            .with_fd(700, 1);
        let pids = Resolver::new(&system).resolve(&Target::port("80")).unwrap();
        assert_eq!(pids, vec![700, 701]);
    }

    #[test]
    fn test_port_udp() {
        let system = tree()
            .with_socket(SocketEntry {
                protocol: Protocol::Udp,
                local_addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                local_port: 53,
                state: SocketState::Close,
                inode: 77,
            })
            .with_fd(601, 77);
        let pids = Resolver::new(&system).resolve(&Target::port("53")).unwrap();
        assert_eq!(pids, vec![601]);
    }

    #[test]
    fn test_port_no_socket_is_not_found() {
        let system = tree().listener(80, 4242).with_fd(700, 4242);
        let err = Resolver::new(&system).resolve(&Target::port("8080")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_port_time_wait_is_not_an_owner() {
        let system = tree().with_socket(SocketEntry {
            protocol: Protocol::Tcp,
            local_addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            local_port: 8080,
            state: SocketState::TimeWait,
            inode: 0,
        });
        let err = Resolver::new(&system).resolve(&Target::port("8080")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_port_owner_hidden_by_permissions() {
        let system = tree().listener(80, 4242).with_fd(700, 4242).private_fds(700);
        let err = Resolver::new(&system).resolve(&Target::port("80")).unwrap_err();
        assert!(matches!(err, ResolveError::OwnerNotDetected { port: 80 }));
    }

    #[test]
    fn test_port_permission_gap_does_not_abort_scan() {
        let system = tree()
            .listener(80, 4242)
            .with_fd(700, 4242)
            .with_fd(701, 4242)
            .private_fds(700);
        let pids = Resolver::new(&system).resolve(&Target::port("80")).unwrap();
        assert_eq!(pids, vec![701]);
    }

    #[test]
    fn test_port_unreadable_socket_tables_are_not_not_found() {
        let system = tree()
            .listener(80, 42)
            .with_fd(700, 42)
            .private_sockets(Protocol::Tcp)
            .private_sockets(Protocol::Udp);
        let err = Resolver::new(&system).resolve(&Target::port("80")).unwrap_err();
        assert!(matches!(err, ResolveError::System(ReadError::PermissionDenied)));
        assert!(err.needs_privileges());
    }

    #[test]
    fn test_port_one_readable_table_is_enough() {
        let system = tree()
            .listener(80, 42)
            .with_fd(700, 42)
            .private_sockets(Protocol::Udp);
        let pids = Resolver::new(&system).resolve(&Target::port("80")).unwrap();
        assert_eq!(pids, vec![700]);

        let err = Resolver::new(&system).resolve(&Target::port("8080")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_port_invalid() {
        let system = tree();
        for bad in ["65536", "-1", "http", ""] {
            let err = Resolver::new(&system).resolve(&Target::port(bad)).unwrap_err();
            assert!(matches!(err, ResolveError::InvalidQuery { kind: "port", .. }), "{bad}");
        }
    }
}
