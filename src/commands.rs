//! Operator commands shared by the interactive shell and the HTTP API.
//!
//! Commands form a closed set. Parsing turns free text into a [`Command`];
//! [`COMMANDS`] is the single table that names, describes and dispatches them.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::integrator::Integrator;
use crate::models::{ExtractionSummary, ScanResult, Stats};
use crate::progress::format_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Scan,
    Files,
    Words,
    Emails,
    Phones,
    Exit,
}

/// Typed handler for a command. `Exit` has none: leaving is up to the surface.
pub type Handler = fn(&Integrator) -> Result<CommandOutput>;

pub struct CommandSpec {
    pub command: Command,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub handler: Option<Handler>,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: Command::Help,
        name: "help",
        aliases: &["?"],
        description: "List available commands",
        handler: Some(help),
    },
    CommandSpec {
        command: Command::Status,
        name: "status",
        aliases: &["stats"],
        description: "Show integration statistics",
        handler: Some(status),
    },
    CommandSpec {
        command: Command::Scan,
        name: "scan",
        aliases: &[],
        description: "Scan the watched folder now",
        handler: Some(scan),
    },
    CommandSpec {
        command: Command::Files,
        name: "files",
        aliases: &["ls"],
        description: "List integrated files",
        handler: Some(files),
    },
    CommandSpec {
        command: Command::Words,
        name: "words",
        aliases: &[],
        description: "Words sampled from integrated text",
        handler: Some(words),
    },
    CommandSpec {
        command: Command::Emails,
        name: "emails",
        aliases: &[],
        description: "Email addresses found in integrated text",
        handler: Some(emails),
    },
    CommandSpec {
        command: Command::Phones,
        name: "phones",
        aliases: &[],
        description: "Phone-like numbers found in integrated text",
        handler: Some(phones),
    },
    CommandSpec {
        command: Command::Exit,
        name: "exit",
        aliases: &["quit"],
        description: "Stop the watcher and leave",
        handler: None,
    },
];

impl Command {
    pub fn spec(self) -> &'static CommandSpec {
        COMMANDS
            .iter()
            .find(|s| s.command == self)
            .unwrap_or(&COMMANDS[0])
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Runs the command. `Ok(None)` for commands with no handler.
    pub fn execute(self, integrator: &Integrator) -> Result<Option<CommandOutput>> {
        self.spec()
            .handler
            .map(|handler| handler(integrator))
            .transpose()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "empty command; type 'help' for available commands")
        } else {
            write!(
                f,
                "unknown command: '{}'; type 'help' for available commands",
                self.0
            )
        }
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().to_lowercase();
        COMMANDS
            .iter()
            .find(|spec| spec.name == word || spec.aliases.contains(&word.as_str()))
            .map(|spec| spec.command)
            .ok_or(UnknownCommand(word))
    }
}

/// Result of a command, serialisable for HTTP and displayable for the shell.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    Help { commands: Vec<HelpLine> },
    Status { stats: Stats },
    Scan { result: ScanResult },
    Files { files: Vec<FileLine> },
    Values { label: String, values: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct HelpLine {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileLine {
    pub path: String,
    pub kind: String,
    pub size_bytes: u64,
    pub detail: String,
}

fn help(_: &Integrator) -> Result<CommandOutput> {
    Ok(CommandOutput::Help {
        commands: COMMANDS
            .iter()
            .map(|s| HelpLine {
                name: s.name.to_string(),
                description: s.description.to_string(),
            })
            .collect(),
    })
}

fn status(integrator: &Integrator) -> Result<CommandOutput> {
    Ok(CommandOutput::Status {
        stats: integrator.stats(),
    })
}

fn scan(integrator: &Integrator) -> Result<CommandOutput> {
    Ok(CommandOutput::Scan {
        result: integrator.scan_once()?,
    })
}

fn files(integrator: &Integrator) -> Result<CommandOutput> {
    let files = integrator
        .entries()
        .into_iter()
        .map(|(path, entry)| FileLine {
            path,
            kind: entry.summary.kind().to_string(),
            size_bytes: entry.size_bytes,
            detail: describe(&entry.summary),
        })
        .collect();
    Ok(CommandOutput::Files { files })
}

fn words(integrator: &Integrator) -> Result<CommandOutput> {
    Ok(CommandOutput::Values {
        label: "words".to_string(),
        values: integrator.words(),
    })
}

fn emails(integrator: &Integrator) -> Result<CommandOutput> {
    Ok(CommandOutput::Values {
        label: "email addresses".to_string(),
        values: integrator.emails(),
    })
}

fn phones(integrator: &Integrator) -> Result<CommandOutput> {
    Ok(CommandOutput::Values {
        label: "phone numbers".to_string(),
        values: integrator.phones(),
    })
}

/// One-line description of a summary for listings.
pub fn describe(summary: &ExtractionSummary) -> String {
    match summary {
        ExtractionSummary::Text {
            length,
            words_count,
            emails,
            phones,
            urls,
            ..
        } => format!(
            "{} chars, {} words, {} emails, {} phones, {} urls",
            length,
            words_count,
            emails.len(),
            phones.len(),
            urls.len()
        ),
        ExtractionSummary::Archive {
            extracted_files,
            extract_path,
        } => format!(
            "{} files -> {}",
            extracted_files,
            extract_path.display()
        ),
        ExtractionSummary::Binary { extension, .. } if extension.is_empty() => {
            "no extension".to_string()
        }
        ExtractionSummary::Binary { extension, .. } => format!(".{}", extension),
        ExtractionSummary::Failed { error, .. } => format!("error: {}", error),
    }
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Help { commands } => {
                writeln!(f, "Available commands:")?;
                for line in commands {
                    writeln!(f, "  {:<10} {}", line.name, line.description)?;
                }
                Ok(())
            }
            CommandOutput::Status { stats } => {
                writeln!(f, "  Watching:          {}", stats.watching_folder)?;
                writeln!(
                    f,
                    "  Total integrated:  {}",
                    format_number(stats.total_integrated)
                )?;
                writeln!(f, "  Processed hashes:  {}", stats.processed_files)?;
                writeln!(f, "  Knowledge entries: {}", stats.knowledge_size)?;
                match stats.last_scan_at {
                    Some(ts) => writeln!(f, "  Last scan:         {}", ts.to_rfc3339()),
                    None => writeln!(f, "  Last scan:         never"),
                }
            }
            CommandOutput::Scan { result } => {
                if result.new_count() == 0 {
                    writeln!(f, "No new files ({} live).", result.live_files)
                } else {
                    writeln!(f, "Integrated {} new file(s):", result.new_count())?;
                    for name in &result.integrated {
                        writeln!(f, "  + {}", name)?;
                    }
                    for name in &result.failed {
                        writeln!(f, "  ! {} (extraction failed)", name)?;
                    }
                    writeln!(f, "Total integrated: {}", result.total_integrated)
                }
            }
            CommandOutput::Files { files } => {
                if files.is_empty() {
                    return writeln!(f, "No files integrated yet.");
                }
                for line in files {
                    writeln!(f, "  {:<8} {:<40} {}", line.kind, line.path, line.detail)?;
                }
                Ok(())
            }
            CommandOutput::Values { label, values } => {
                writeln!(f, "Found {} {}", values.len(), label)?;
                for value in values {
                    writeln!(f, "  {}", value)?;
                }
                Ok(())
            }
        }
    }
}
