//! Ordered source classification.
//!
//! The chain is walked from the resolved process (index 0) toward the root.
//! At each process the rules are tried in category order:
//!   Runtime    (anywhere)   → the runtime's name
//!   Container  (anywhere)   → container
//!   Supervisor (anywhere)   → service-managed
//!   Shell      (index 0, 1) → shell-launched
//! The first hit wins, so a nearby runtime beats a distant supervisor.
//! Nothing matching → unknown.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::Ancestry;
use crate::config::ClassifierConfig;

/// What is ultimately responsible for a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Source {
    Runtime { name: String },
    Container { runtime: String },
    ServiceManaged { supervisor: String },
    ShellLaunched { shell: String },
    Unknown,
}

impl Source {
    /// The process name behind the label, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Source::Runtime { .. } | Source::Unknown => None,
            Source::Container { runtime } => Some(runtime),
            Source::ServiceManaged { supervisor } => Some(supervisor),
            Source::ShellLaunched { shell } => Some(shell),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Runtime { name } => write!(f, "{}", name),
            Source::Container { .. } => write!(f, "container"),
            Source::ServiceManaged { .. } => write!(f, "service-managed"),
            Source::ShellLaunched { .. } => write!(f, "shell-launched"),
            Source::Unknown => write!(f, "unknown"),
        }
    }
}

/// Rule categories, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Runtime,
    Container,
    Supervisor,
    Shell,
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    category: Category,
    /// Fixed label; `None` means "use the matched command".
    label: Option<String>,
}

impl Rule {
    fn source(&self, command: &str) -> Source {
        let name = self.label.clone().unwrap_or_else(|| command.to_string());
        match self.category {
            Category::Runtime => Source::Runtime { name },
            Category::Container => Source::Container { runtime: name },
            Category::Supervisor => Source::ServiceManaged { supervisor: name },
            Category::Shell => Source::ShellLaunched { shell: name },
        }
    }

    /// Shells only count when they launched the process directly.
    fn applies_at(&self, index: usize) -> bool {
        self.category != Category::Shell || index <= 1
    }
}

const RUNTIMES: &[(&str, &str)] = &[
    (r"^python[0-9.]*$", "python"),
    (r"^(node|nodejs)$", "node"),
    (r"^(java|javaw)$", "java"),
    (r"^ruby[0-9.]*$", "ruby"),
    (r"^perl[0-9.]*$", "perl"),
    (r"^php(-fpm)?[0-9.]*$", "php"),
    (r"^(deno|bun)$", "javascript"),
    (r"^dotnet$", "dotnet"),
    (r"^beam\.smp$", "erlang"),
    (r"^lua(jit)?[0-9.]*$", "lua"),
];

const CONTAINERS: &[(&str, &str)] = &[
    (r"^containerd-shim", "containerd"),
    (r"^(dockerd|docker-proxy|docker)$", "docker"),
    (r"^(conmon|podman)$", "podman"),
    (r"^(runc|crun)$", "runc"),
];

const SUPERVISORS: &[&str] = &[
    r"^systemd$",
    r"^init$",
    r"^launchd$",
    r"^openrc(-run)?$",
    r"^supervisord?$",
    r"^runsv(dir)?$",
    r"^s6-(supervise|svscan)$",
    r"(?i)^pm2\b",
    r"^(cron|crond|anacron)$",
];

const SHELLS: &[&str] = &[r"^-?(sh|bash|zsh|fish|dash|ksh|mksh|tcsh|csh|ash|nu|pwsh|elvish)$"];

/// Data-driven rule table; see the module docs for evaluation order.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

static BUILTIN: LazyLock<Classifier> = LazyLock::new(|| {
    Classifier::empty()
        .with_rules(Category::Runtime, RUNTIMES.iter().map(|(p, l)| (*p, Some(*l))))
        .and_then(|c| c.with_rules(Category::Container, CONTAINERS.iter().map(|(p, l)| (*p, Some(*l)))))
        .and_then(|c| c.with_rules(Category::Supervisor, SUPERVISORS.iter().map(|p| (*p, None))))
        .and_then(|c| c.with_rules(Category::Shell, SHELLS.iter().map(|p| (*p, None))))
        .unwrap_or_else(|err| panic!("built-in classifier pattern is invalid: {err}"))
});

impl Classifier {
    fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rule table.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Built-in rules followed by user rules from configuration.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, regex::Error> {
        Self::builtin()
            .with_rules(
                Category::Runtime,
                config
                    .runtimes
                    .iter()
                    .map(|r| (r.pattern.as_str(), Some(r.label.as_str()))),
            )?
            .with_rules(Category::Container, config.containers.iter().map(|p| (p.as_str(), None)))?
            .with_rules(Category::Supervisor, config.supervisors.iter().map(|p| (p.as_str(), None)))?
            .with_rules(Category::Shell, config.shells.iter().map(|p| (p.as_str(), None)))
    }

    fn with_rules<'p>(
        mut self,
        category: Category,
        rules: impl IntoIterator<Item = (&'p str, Option<&'p str>)>,
    ) -> Result<Self, regex::Error> {
        for (pattern, label) in rules {
            self.rules.push(Rule {
                pattern: Regex::new(pattern)?,
                category,
                label: label.map(str::to_string),
            });
        }
        // Stable: user rules stay behind built-ins of the same category.
        self.rules.sort_by_key(|rule| rule.category);
        Ok(self)
    }

    /// Label the chain. Pure: depends only on `ancestry`.
    pub fn classify(&self, ancestry: &Ancestry) -> Source {
        for (index, process) in ancestry.chain().iter().enumerate() {
            let hit = self
                .rules
                .iter()
                .find(|rule| rule.applies_at(index) && rule.pattern.is_match(&process.command));
            if let Some(rule) = hit {
                return rule.source(&process.command);
            }
        }
        Source::Unknown
    }
}

/// Classify with the built-in rules.
pub fn classify(ancestry: &Ancestry) -> Source {
    BUILTIN.classify(ancestry)
}
