//! Named values reported back to the calling workflow.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Ordered name/value pairs produced by a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outputs {
    entries: Vec<(String, String)>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value in place.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where outputs are written: the file named by `GITHUB_OUTPUT`, or stdout
/// in the legacy `::set-output` form when no file is configured.
#[derive(Clone, Debug, Default)]
pub struct OutputSink {
    destination: Option<PathBuf>,
}

impl OutputSink {
    pub fn new(destination: Option<PathBuf>) -> Self {
        Self { destination }
    }

    /// Appends every output to the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination file cannot be opened or written
    pub fn emit(&self, outputs: &Outputs) -> Result<()> {
        let Some(path) = &self.destination else {
            for (name, value) in outputs.iter() {
                println!("{}", legacy_line(name, value));
            }
            return Ok(());
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output file {}", path.display()))?;

        for (name, value) in outputs.iter() {
            file.write_all(format_output(name, value).as_bytes())?;
        }

        Ok(())
    }
}

/// Formats one output for the `GITHUB_OUTPUT` file. Multi-line values use
/// the heredoc form with a random delimiter.
pub fn format_output(name: &str, value: &str) -> String {
    if value.contains('\n') {
        let delimiter = uuid::Uuid::new_v4().simple().to_string();
        format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
    } else {
        format!("{name}={value}\n")
    }
}

fn legacy_line(name: &str, value: &str) -> String {
    format!("::set-output name={name}::{value}")
}
