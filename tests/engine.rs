use witr::ancestry::{Source, TruncationReason, Warning};
use witr::error::ResolveError;
use witr::platform::{MemorySystem, SystemReader};
use witr::types::{ProcessSnapshot, ProcessState, Report, Target};
use witr::{explain, ExplainOptions, Outcome};

fn sshd_session() -> MemorySystem {
    MemorySystem::new()
        .spawn(1, 0, "init")
        .spawn(500, 1, "sshd")
        .spawn(600, 500, "sshd")
        .spawn(601, 600, "bash")
}

fn run(system: &MemorySystem, target: Target) -> Result<Report, ResolveError> {
    match explain(system, &target, &ExplainOptions::default())? {
        Outcome::Explained(report) => Ok(*report),
        Outcome::Ambiguous(candidates) => panic!("unexpected candidates: {candidates:?}"),
    }
}

fn chain_pids(report: &Report) -> Vec<u32> {
    report.ancestry.chain().iter().map(|p| p.pid).collect()
}

#[test]
fn test_shell_session_by_name() {
    let report = run(&sshd_session(), Target::name("bash")).unwrap();

    assert_eq!(report.process.pid, 601);
    assert_eq!(chain_pids(&report), vec![601, 600, 500, 1]);
    assert_eq!(
        report.source,
        Source::ShellLaunched {
            shell: "bash".to_string()
        }
    );
    assert!(report.warnings.is_empty());
}

#[test]
fn test_port_without_socket_is_not_found() {
    let err = run(&sshd_session(), Target::port("8080")).unwrap_err();
    assert!(matches!(err, ResolveError::NotFound(ref t) if *t == Target::port("8080")));
}

#[test]
fn test_hidden_owner_is_distinct_from_not_found() {
    let system = sshd_session()
        .spawn(700, 1, "postgres")
        .listener(5432, 9100)
        .with_fd(700, 9100)
        .private_fds(700);

    let err = run(&system, Target::port("5432")).unwrap_err();
    assert!(matches!(err, ResolveError::OwnerNotDetected { port: 5432 }));
    assert!(err.needs_privileges());
}

#[test]
fn test_single_zombie_warning() {
    let system = sshd_session()
        .with_process(ProcessSnapshot::new(650, 601, "python3", ProcessState::Zombie));

    let report = run(&system, Target::pid("650")).unwrap();

    assert_eq!(report.warnings, vec![Warning::Zombie { pids: vec![650] }]);
    assert_eq!(
        report.source,
        Source::Runtime {
            name: "python".to_string()
        }
    );
}

#[test]
fn test_parent_gone_mid_walk() {
    let system = sshd_session().exited(500);

    let report = run(&system, Target::pid("601")).unwrap();

    assert_eq!(chain_pids(&report), vec![601, 600]);
    let truncation = report.ancestry.truncated().unwrap();
    assert_eq!(truncation.pid, 500);
    assert_eq!(truncation.reason, TruncationReason::Exited);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind(), "partial-chain");
}

#[test]
fn test_orphaned_tree() {
    let system = MemorySystem::new()
        .spawn(4000, 0, "unshare")
        .spawn(4001, 4000, "worker");

    let report = run(&system, Target::name("worker")).unwrap();

    assert_eq!(report.source, Source::Unknown);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind(), "orphaned");
}

#[test]
fn test_shared_listener_lists_candidates() {
    let system = sshd_session()
        .spawn(800, 1, "gunicorn")
        .spawn(801, 800, "gunicorn")
        .spawn(802, 800, "gunicorn")
        .listener(8000, 7000)
        .with_fd(802, 7000)
        .with_fd(801, 7000);

    match explain(&system, &Target::port("8000"), &ExplainOptions::default()).unwrap() {
        Outcome::Ambiguous(candidates) => {
            let pids: Vec<u32> = candidates.iter().map(|p| p.pid).collect();
            assert_eq!(pids, vec![801, 802]);
        }
        Outcome::Explained(report) => panic!("picked {}", report.process),
    }
}

#[test]
fn test_invalid_queries() {
    let system = sshd_session();
    for target in [
        Target::pid("abc"),
        Target::pid("0"),
        Target::port("70000"),
        Target::name(""),
    ] {
        let err = run(&system, target.clone()).unwrap_err();
        assert!(
            matches!(err, ResolveError::InvalidQuery { .. }),
            "{target} gave {err}"
        );
    }
}

#[test]
fn test_repeat_runs_agree() {
    let system = sshd_session();
    let first = run(&system, Target::pid("601")).unwrap();
    let second = run(&system, Target::pid("601")).unwrap();

    assert_eq!(first.ancestry, second.ancestry);
    assert_eq!(first.source, second.source);
    assert_eq!(first.warnings, second.warnings);
}

#[test]
fn test_memory_system_reads_like_a_live_one() {
    let system = sshd_session();

    let bash = system.process(601).unwrap();
    assert_eq!(bash.ppid, 600);
    assert_eq!(bash.command, "bash");
    assert_eq!(system.processes().unwrap().len(), 4);
}
