use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use clap_complete::Shell;

use crate::types::Target;

#[derive(Parser)]
#[command(name = "witr")]
#[command(version, about = "Why is this running? Explain where a process came from")]
#[command(group(ArgGroup::new("target").args(["name", "pid", "port"])))]
pub struct Cli {
    /// Process name (case-sensitive substring) to explain
    pub name: Option<String>,

    /// Explain a specific PID
    #[arg(long, value_name = "N")]
    pub pid: Option<String>,

    /// Explain what is using a TCP/UDP port
    #[arg(long, value_name = "N")]
    pub port: Option<String>,

    /// One-line summary
    #[arg(long)]
    pub short: bool,

    /// Show the full process ancestry tree
    #[arg(long)]
    pub tree: bool,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,

    /// Show only warnings
    #[arg(long)]
    pub warnings: bool,

    /// Disable colorized output
    #[arg(long)]
    pub no_color: bool,

    /// Log diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Read configuration from this file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

/// How a finished report is shown. Earlier variants win when several
/// flags are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Json,
    Warnings,
    Tree,
    Short,
    Standard,
}

impl Cli {
    pub fn target(&self) -> Option<Target> {
        if let Some(pid) = &self.pid {
            Some(Target::pid(pid.as_str()))
        } else if let Some(port) = &self.port {
            Some(Target::port(port.as_str()))
        } else {
            self.name.as_deref().map(Target::name)
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.warnings {
            OutputMode::Warnings
        } else if self.tree {
            OutputMode::Tree
        } else if self.short {
            OutputMode::Short
        } else {
            OutputMode::Standard
        }
    }
}
