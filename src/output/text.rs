//! Human-readable views of a [`Report`].

use colored::Colorize;
use nix::unistd::{Uid, User};

use crate::ancestry::{Ancestry, Source};
use crate::error::{ReadError, ResolveError};
use crate::types::{ProcessSnapshot, Report};

/// `init (pid 1) → sshd (pid 500) → bash (pid 601)`, root first, target bold.
pub fn chain_line(ancestry: &Ancestry) -> String {
    let target = ancestry.process().pid;
    let parts: Vec<String> = ancestry
        .chain()
        .iter()
        .rev()
        .map(|p| {
            if p.pid == target {
                format!("{} (pid {})", p.command.bold(), p.pid)
            } else {
                format!("{} (pid {})", p.command, p.pid)
            }
        })
        .collect();
    parts.join(" → ")
}

fn source_line(source: &Source) -> String {
    match source.detail() {
        Some(detail) => format!("{} ({})", source.to_string().green(), detail),
        None => source.to_string().green().to_string(),
    }
}

fn user_line(process: &ProcessSnapshot) -> Option<String> {
    let uid = process.uid?;
    let name = User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name);
    Some(match name {
        Some(name) => format!("{} ({})", name, uid),
        None => uid.to_string(),
    })
}

pub fn render_standard(report: &Report) -> String {
    let mut out = Vec::new();
    let process = &report.process;

    out.push(format!("{:<12} {}", "Target:".dimmed(), report.resolved_target.bold()));
    out.push(format!(
        "{:<12} {} (pid {})",
        "Process:".dimmed(),
        process.command.bold(),
        process.pid.to_string().yellow()
    ));
    if let Some(user) = user_line(process) {
        out.push(format!("{:<12} {}", "User:".dimmed(), user));
    }
    out.push(format!("{:<12} {}", "Command:".dimmed(), process.display_cmdline()));
    if let Some(exe) = &process.exe {
        out.push(format!("{:<12} {}", "Executable:".dimmed(), exe.display()));
    }
    out.push(format!("{:<12} {}", "State:".dimmed(), process.state));

    out.push(String::new());
    out.push(format!("{}", "Why It Exists:".cyan().bold()));
    out.push(format!("  {}", chain_line(&report.ancestry)));
    out.push(String::new());

    out.push(format!("{:<12} {}", "Source:".dimmed(), source_line(&report.source)));
    if let Some(unit) = &report.context.systemd_unit {
        out.push(format!("{:<12} {}", "Unit:".dimmed(), unit));
    }
    if let Some(cwd) = &report.context.working_dir {
        out.push(format!("{:<12} {}", "Working Dir:".dimmed(), cwd.display()));
    }
    if let Some(git) = &report.context.git {
        let branch = git
            .branch
            .as_deref()
            .map(|b| format!(" ({})", b.green()))
            .unwrap_or_default();
        out.push(format!("{:<12} {}{}", "Git Repo:".dimmed(), git.repo_name, branch));
    }

    if !report.warnings.is_empty() {
        out.push(String::new());
        out.push(render_warnings(report));
    }

    out.join("\n")
}

/// One line: the chain, the label and a warning count.
pub fn render_short(report: &Report) -> String {
    let mut line = format!(
        "{}  [{}]",
        chain_line(&report.ancestry),
        report.source.to_string().green()
    );
    if !report.warnings.is_empty() {
        let count = report.warnings.len();
        let noun = if count == 1 { "warning" } else { "warnings" };
        line.push_str(&format!("  {}", format!("({} {})", count, noun).red()));
    }
    line
}

pub fn render_warnings(report: &Report) -> String {
    if report.warnings.is_empty() {
        return "No warnings.".to_string();
    }
    let mut out = vec![format!("{}", "Warnings:".red().bold())];
    for warning in &report.warnings {
        out.push(format!("  • {}", warning));
    }
    out.join("\n")
}

/// Error block with guidance. `invocation` is the command line to repeat
/// under sudo; `is_root` suppresses that advice when it can't help.
pub fn render_error(err: &ResolveError, invocation: &str, is_root: bool) -> String {
    let mut out = vec![
        format!("{}", "Error:".red().bold()),
        format!("  {}", err),
        String::new(),
    ];

    match err {
        ResolveError::OwnerNotDetected { .. } if is_root => {
            out.push(
                "A socket was found for the port, but no process holding it is visible."
                    .to_string(),
            );
            out.push(
                "It may belong to another network namespace (e.g. a container).".to_string(),
            );
        }
        ResolveError::OwnerNotDetected { .. } => {
            out.push(
                "A socket was found for the port, but the owning process could not be detected."
                    .to_string(),
            );
            out.push(
                "This may be due to insufficient permissions. Try running with sudo:".to_string(),
            );
            out.push(format!("  sudo {}", invocation));
        }
        ResolveError::System(ReadError::PermissionDenied) if !is_root => {
            out.push("The system tables needed for this query are not readable.".to_string());
            out.push("Try running with sudo:".to_string());
            out.push(format!("  sudo {}", invocation));
        }
        ResolveError::InvalidQuery { .. } => {
            out.push("Check the value and try again.".to_string());
        }
        ResolveError::NotFound(_) | ResolveError::System(_) => {
            out.push(
                "No matching process or service found. Please check your query or try a different name/port/PID."
                    .to_string(),
            );
        }
    }

    out.push("For usage and options, run: witr --help".to_string());
    out.join("\n")
}
