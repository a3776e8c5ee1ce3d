#![forbid(unsafe_code)]

//! Manifest assembly: listed entries joined with probed durations, rendered
//! as an extended M3U document and written to disk.
//!
//! The rendered grammar is
//!
//! ```text
//! #EXTM3U
//! #EXTINF:<duration>,<name>
//! <name>
//! ```
//!
//! with one `#EXTINF`/name pair per record and every line ending in `\n`.
//! Names never contain line breaks: the lister refuses entries whose title or
//! URL carries control characters.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::playlist::{PlaylistEntry, YtDlp};
use crate::probe::{DurationProbe, Ffprobe, ManifestDuration};

pub const MANIFEST_HEADER: &str = "#EXTM3U";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub name: String,
    pub duration: ManifestDuration,
}

/// A single manifest generation run.
#[derive(Debug, Clone)]
pub struct ManifestRequest {
    pub url: String,
    pub format: String,
    pub output: PathBuf,
}

impl ManifestRequest {
    pub fn from_settings(url: impl Into<String>, settings: &Settings) -> Self {
        Self {
            url: url.into(),
            format: settings.format.clone(),
            output: settings.output.clone(),
        }
    }
}

/// Lists the playlist with yt-dlp, probes every entry with ffprobe and writes
/// the manifest. Returns the manifest text.
///
/// `entries` replaces the yt-dlp listing when provided.
pub fn generate_playlist(
    request: &ManifestRequest,
    settings: &Settings,
    entries: Option<Vec<PlaylistEntry>>,
) -> Result<String> {
    let entries = match entries {
        Some(entries) => entries,
        None => YtDlp::new(&settings.ytdlp)
            .list(&request.url, &request.format)?
            .collect::<Result<Vec<_>>>()?,
    };
    let probe = Ffprobe::new(&settings.ffprobe);
    assemble(entries, &probe, &request.output)
}

/// Probes, renders and writes an already materialized listing.
pub fn assemble<P>(entries: Vec<PlaylistEntry>, probe: &P, output: &Path) -> Result<String>
where
    P: DurationProbe + ?Sized,
{
    info!(entries = entries.len(), "building manifest");
    let records = build_records(&entries, probe);
    for record in &records {
        debug!(name = %record.name, duration = %record.duration, "manifest record");
    }

    let manifest = render_manifest(&records);
    debug!("manifest text:\n{manifest}");

    write_manifest(output, &manifest)?;
    let failed = records
        .iter()
        .filter(|record| record.duration.is_sentinel())
        .count();
    info!(
        output = %output.display(),
        records = records.len(),
        unprobed = failed,
        "manifest written"
    );
    Ok(manifest)
}

/// One record per entry, in listing order.
pub fn build_records<P>(entries: &[PlaylistEntry], probe: &P) -> Vec<ManifestRecord>
where
    P: DurationProbe + ?Sized,
{
    entries
        .iter()
        .map(|entry| ManifestRecord {
            name: entry.filename.clone(),
            duration: duration_or_sentinel(probe, Path::new(&entry.filename)),
        })
        .collect()
}

/// A failed probe costs one entry its duration, never the whole manifest.
pub fn duration_or_sentinel<P>(probe: &P, path: &Path) -> ManifestDuration
where
    P: DurationProbe + ?Sized,
{
    match probe.probe_seconds(path) {
        Ok(seconds) => ManifestDuration::from_seconds(seconds),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not probe duration");
            ManifestDuration::sentinel()
        }
    }
}

pub fn render_manifest(records: &[ManifestRecord]) -> String {
    let mut content = String::from(MANIFEST_HEADER);
    content.push('\n');
    for record in records {
        content.push_str(&format!("#EXTINF:{},{}\n", record.duration, record.name));
        content.push_str(&record.name);
        content.push('\n');
    }
    content
}

/// Replaces `path` with `contents` in one step: the text goes to a temporary
/// sibling first and is renamed over the target. An existing manifest keeps
/// its permissions; a new one is created world-readable.
pub fn write_manifest(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temporary file in {}", parent.display()))?;
    if let Some(permissions) = manifest_permissions(path)? {
        tmp.as_file()
            .set_permissions(permissions)
            .with_context(|| format!("setting permissions for {}", path.display()))?;
    }
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("writing manifest for {}", path.display()))?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Mode the written manifest should end up with. Temporary files start out
/// owner-only, which must not leak onto the manifest.
fn manifest_permissions(path: &Path) -> Result<Option<fs::Permissions>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(default_permissions()),
        Err(err) => Err(err).with_context(|| format!("reading metadata of {}", path.display())),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
