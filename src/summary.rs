use crate::error::Error;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

pub const NO_SUMMARY: &str = "No summary available yet.";

/// Append-only text file collecting the day's run outcomes until `notify` forwards them.
#[derive(Clone, Debug)]
pub struct SummaryLog {
    path: PathBuf,
}

impl SummaryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SummaryLog { path: path.into() }
    }

    pub fn append(&self, line: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;

        Ok(())
    }

    /// Reads the accumulated summary. A missing or empty file yields [`NO_SUMMARY`].
    pub fn read(&self) -> Result<String, Error> {
        match fs::read_to_string(&self.path) {
            Ok(content) if !content.trim().is_empty() => Ok(content),
            Ok(_) => Ok(NO_SUMMARY.to_string()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(NO_SUMMARY.to_string()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn truncate(&self) -> Result<(), Error> {
        match fs::write(&self.path, "") {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => Ok(other?),
        }
    }
}

/// Markup hyperlink, `<url|label>`.
pub fn link(url: &str, label: &str) -> String {
    format!("<{}|{}>", url, label)
}

pub fn failure_line(job: &str, err: &Error) -> String {
    format!("Error in {}: {}", job, err)
}
