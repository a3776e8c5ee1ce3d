#![forbid(unsafe_code)]

//! Flat playlist listing through yt-dlp.
//!
//! `yt-dlp -j --flat-playlist <url>` prints one JSON object per entry without
//! resolving the individual videos. Each object is turned into a
//! [`PlaylistEntry`] carrying the filename the downloaded media is expected to
//! have on disk.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// One entry of a flat playlist listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
    pub id: Option<String>,
    /// `{title}-{url}.{format}`
    pub filename: String,
}

impl PlaylistEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>, format: &str) -> Self {
        let title = title.into();
        let url = url.into();
        let filename = derive_filename(&title, &url, format);
        Self {
            title,
            url,
            id: None,
            filename,
        }
    }
}

pub fn derive_filename(title: &str, url: &str, format: &str) -> String {
    format!("{title}-{url}.{format}")
}

/// The subset of a flat-playlist JSON line we rely on.
#[derive(Debug, Deserialize)]
struct FlatEntry {
    title: String,
    url: String,
    #[serde(default)]
    id: Option<String>,
}

/// Titles and URLs end up as manifest lines, so control characters (line
/// breaks above all) are rejected.
pub fn parse_entry_line(line: &str, format: &str) -> Result<PlaylistEntry> {
    let raw: FlatEntry = serde_json::from_str(line)?;
    for (field, value) in [("title", &raw.title), ("url", &raw.url)] {
        if value.chars().any(char::is_control) {
            bail!("{field} {value:?} contains control characters");
        }
    }
    let mut entry = PlaylistEntry::new(raw.title, raw.url, format);
    entry.id = raw.id;
    Ok(entry)
}

/// Handle on the playlist extraction tool.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs the flat listing and returns its entries as a one-pass iterator.
    ///
    /// The tool runs to completion before this returns; its output is parsed
    /// lazily, one line per call to `next`. Calling `list` again re-runs the
    /// tool.
    pub fn list(&self, url: &str, format: &str) -> Result<PlaylistEntries> {
        debug!(program = %self.program.display(), url, "listing playlist");
        let output = Command::new(&self.program)
            .arg("-j")
            .arg("--flat-playlist")
            .arg(url)
            .output()
            .with_context(|| {
                format!(
                    "running {} for playlist {}",
                    self.program.display(),
                    url
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "failed to list playlist {} (status: {}): {}",
                url,
                output.status,
                stderr.trim()
            );
        }

        let content = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<String> = content.lines().map(str::to_owned).collect();
        debug!(lines = lines.len(), "playlist listing received");

        Ok(PlaylistEntries {
            lines: lines.into_iter(),
            line_number: 0,
            format: format.to_string(),
        })
    }
}

/// Entries of one listing run, parsed on demand.
#[derive(Debug)]
pub struct PlaylistEntries {
    lines: std::vec::IntoIter<String>,
    line_number: usize,
    format: String,
}

impl Iterator for PlaylistEntries {
    type Item = Result<PlaylistEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let line_number = self.line_number;
            return Some(
                parse_entry_line(trimmed, &self.format)
                    .with_context(|| format!("parsing playlist entry on line {line_number}")),
            );
        }
    }
}
