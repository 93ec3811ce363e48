//! Narrative output of the demonstration run.

use crate::harness::HarnessReport;
use crate::store::BuildInfo;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    Banner {
        build: &'a BuildInfo,
        datastore: &'a str,
    },
    Section {
        title: &'a str,
    },
    Note {
        message: &'a str,
    },
    Entity {
        label: &'a str,
        entity: serde_json::Value,
    },
    ExpectedError {
        label: &'a str,
        error: String,
    },
    Harness {
        report: &'a HarnessReport,
    },
}

/// Where progress goes. Implementations must be safe to share across tasks.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &Event<'_>) -> io::Result<()>;
}

/// Human-readable text.
pub struct ConsoleReporter<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn report(&self, event: &Event<'_>) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match event {
            Event::Banner { build, datastore } => {
                writeln!(out, "occdb {}", build)?;
                writeln!(out, "  datastore: {}", datastore)?;
            }
            Event::Section { title } => {
                let rule = "=".repeat(title.len() + 10);
                writeln!(out, "\n{}\n-----{}-----\n{}", rule, title, rule)?;
            }
            Event::Note { message } => writeln!(out, "  {}", message)?,
            Event::Entity { label, entity } => {
                let pretty = serde_json::to_string_pretty(entity).map_err(io::Error::other)?;
                writeln!(out, "  {}:\n", label)?;
                for line in pretty.lines() {
                    writeln!(out, "    {}", line)?;
                }
                writeln!(out)?;
            }
            Event::ExpectedError { label, error } => {
                writeln!(out, "  {} failed as expected:\n    \"{}\"", label, error)?;
            }
            Event::Harness { report } => {
                for actor in &report.actors {
                    writeln!(
                        out,
                        "  >Actor {} (rate {:?}, offset {:?}): {} writes, {} conflicts",
                        actor.index, actor.rate, actor.offset, actor.writes, actor.conflicts
                    )?;
                }
                writeln!(
                    out,
                    "  version {} -> {} ({} writes, {} conflicts, no lost updates)",
                    report.initial_version,
                    report.final_version,
                    report.total_writes(),
                    report.total_conflicts()
                )?;
            }
        }
        out.flush()
    }
}

/// One JSON object per line.
pub struct JsonReporter<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
}

impl JsonReporter {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn report(&self, event: &Event<'_>) -> io::Result<()> {
        let line = serde_json::to_string(event).map_err(io::Error::other)?;
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{}", line)?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_section_and_note() {
        let reporter = ConsoleReporter::new(Vec::new());
        reporter.report(&Event::Section { title: "Demo" }).unwrap();
        reporter.report(&Event::Note { message: "hello" }).unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.contains("-----Demo-----"));
        assert!(text.contains("  hello\n"));
    }

    #[test]
    fn test_json_lines() {
        let reporter = JsonReporter::new(Vec::new());
        reporter
            .report(&Event::Entity {
                label: "employee",
                entity: serde_json::json!({ "id": "e1", "version": 1 }),
            })
            .unwrap();
        reporter
            .report(&Event::ExpectedError {
                label: "write",
                error: "conflict".to_string(),
            })
            .unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "entity");
        assert_eq!(lines[0]["entity"]["id"], "e1");
        assert_eq!(lines[1]["event"], "expected_error");
    }
}
