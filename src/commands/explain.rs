//! `witr <target>`: resolve a query, walk its ancestry and explain it.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::CommandFactory;
use log::debug;

use crate::ancestry::{self, Classifier, DEFAULT_MAX_DEPTH};
use crate::cli::{Cli, OutputMode};
use crate::config::Config;
use crate::error::ResolveError;
use crate::output;
use crate::platform::{self, SystemReader};
use crate::resolve::Resolver;
use crate::types::{ProcessSnapshot, Report, Target};

/// Knobs for one explanation run.
#[derive(Debug, Clone)]
pub struct ExplainOptions {
    pub max_depth: usize,
    pub classifier: Classifier,
    /// Never match this PID by name; the CLI passes its own.
    pub exclude_pid: Option<u32>,
}

impl Default for ExplainOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            classifier: Classifier::builtin(),
            exclude_pid: None,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Exactly one process matched.
    Explained(Box<Report>),
    /// Several processes matched, ascending by PID. Nothing was picked.
    Ambiguous(Vec<ProcessSnapshot>),
}

/// Run the whole pipeline for `target` against `system`.
pub fn explain<S: SystemReader>(
    system: &S,
    target: &Target,
    options: &ExplainOptions,
) -> Result<Outcome, ResolveError> {
    let mut resolver = Resolver::new(system);
    if let Some(pid) = options.exclude_pid {
        resolver = resolver.excluding(pid);
    }
    let pids = resolver.resolve(target)?;

    // Candidates may exit between resolution and the walk.
    let mut candidates: Vec<ProcessSnapshot> = pids
        .iter()
        .filter_map(|&pid| match system.process(pid) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                debug!("candidate {} dropped: {}", pid, err);
                None
            }
        })
        .collect();

    match candidates.len() {
        0 => Err(ResolveError::NotFound(target.clone())),
        1 => {
            let pid = candidates.remove(0).pid;
            let report = build_report(system, target, pid, options)?;
            Ok(Outcome::Explained(Box::new(report)))
        }
        _ => Ok(Outcome::Ambiguous(candidates)),
    }
}

fn build_report<S: SystemReader>(
    system: &S,
    target: &Target,
    pid: u32,
    options: &ExplainOptions,
) -> Result<Report, ResolveError> {
    let ancestry = ancestry::build_ancestry(system, pid, options.max_depth)
        .map_err(|_| ResolveError::NotFound(target.clone()))?;
    let source = options.classifier.classify(&ancestry);
    let warnings = ancestry::warnings(&ancestry);
    let context = ancestry::collect_context(system, pid);
    let process = ancestry.process().clone();

    Ok(Report {
        target: target.clone(),
        resolved_target: process.command.clone(),
        process,
        ancestry,
        source,
        warnings,
        context,
    })
}

/// Render `report` in the chosen mode.
pub fn render(report: &Report, mode: OutputMode) -> Result<String> {
    Ok(match mode {
        OutputMode::Json => output::json::render_report(report)?,
        OutputMode::Warnings => output::text::render_warnings(report),
        OutputMode::Tree => output::tree::render_tree(&report.ancestry),
        OutputMode::Short => output::text::render_short(report),
        OutputMode::Standard => output::text::render_standard(report),
    })
}

pub fn execute(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let Some(target) = cli.target() else {
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::FAILURE);
    };

    if cli.no_color || !config.color {
        colored::control::set_override(false);
    }

    let options = ExplainOptions {
        max_depth: config.max_depth,
        classifier: Classifier::from_config(&config.classifier)
            .context("Invalid classifier pattern in config")?,
        exclude_pid: Some(std::process::id()),
    };

    let system = platform::live();
    match explain(&system, &target, &options) {
        Ok(Outcome::Explained(report)) => {
            println!("{}", render(&report, cli.output_mode())?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(Outcome::Ambiguous(candidates)) => {
            println!("{}", output::candidates::render_candidates(&candidates));
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            let invocation = std::env::args().collect::<Vec<_>>().join(" ");
            let is_root = nix::unistd::geteuid().is_root();
            eprintln!("{}", output::text::render_error(&err, &invocation, is_root));
            Ok(ExitCode::FAILURE)
        }
    }
}
