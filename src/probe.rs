#![forbid(unsafe_code)]

//! Duration probing through ffprobe.
//!
//! Probing reports failures as a typed [`ProbeError`]; deciding what a failed
//! probe means for the manifest is left to the caller.

use serde::Deserialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::debug;

/// Duration as written into the manifest: `{minutes}.{ceil(seconds)}`.
///
/// This is not a clock format. 125.4 seconds renders as `2.6` and 59 seconds
/// as `0.59`; neither part is zero padded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDuration(String);

impl ManifestDuration {
    pub fn from_seconds(seconds: f64) -> Self {
        let minutes = (seconds / 60.0).floor() as u64;
        let remainder = (seconds % 60.0).ceil() as u64;
        Self(format!("{minutes}.{remainder}"))
    }

    /// Stand-in used when a file could not be probed.
    pub fn sentinel() -> Self {
        Self("0".to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManifestDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("malformed probe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("probe output has no format.duration")]
    MissingDuration,
    #[error("invalid duration value {0:?}")]
    InvalidDuration(String),
}

/// Anything able to tell how long a media file plays, in seconds.
pub trait DurationProbe {
    fn probe_seconds(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// Handle on the ffprobe binary.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    program: PathBuf,
}

impl Ffprobe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DurationProbe for Ffprobe {
    fn probe_seconds(&self, path: &Path) -> Result<f64, ProbeError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .map_err(|source| ProbeError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Exit {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let seconds = parse_probe_output(&output.stdout)?;
        debug!(path = %path.display(), seconds, "probed duration");
        Ok(seconds)
    }
}

/// `ffprobe -print_format json -show_format` payload, reduced to what we read.
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<FormatSection>,
}

#[derive(Debug, Deserialize)]
struct FormatSection {
    #[serde(default)]
    duration: Option<DurationValue>,
}

/// ffprobe prints the duration as a string; accept a bare number too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Text(String),
    Number(f64),
}

pub fn parse_probe_output(stdout: &[u8]) -> Result<f64, ProbeError> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)?;
    let value = parsed
        .format
        .and_then(|format| format.duration)
        .ok_or(ProbeError::MissingDuration)?;
    let seconds = match value {
        DurationValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| ProbeError::InvalidDuration(text.clone()))?,
        DurationValue::Number(number) => number,
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ProbeError::InvalidDuration(seconds.to_string()));
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use crate::test_support::{install_ffprobe_stub, install_script};
    use tempfile::tempdir;

    #[test]
    fn duration_formatting_matches_manifest_encoding() {
        assert_eq!(ManifestDuration::from_seconds(125.4).as_str(), "2.6");
        assert_eq!(ManifestDuration::from_seconds(59.0).as_str(), "0.59");
        assert_eq!(ManifestDuration::from_seconds(0.0).as_str(), "0.0");
        assert_eq!(ManifestDuration::from_seconds(10.0).as_str(), "0.10");
        assert_eq!(ManifestDuration::from_seconds(70.5).as_str(), "1.11");
        assert_eq!(ManifestDuration::from_seconds(120.0).as_str(), "2.0");
    }

    #[test]
    fn fractional_seconds_round_up_without_carrying() {
        assert_eq!(ManifestDuration::from_seconds(59.2).as_str(), "0.60");
        assert_eq!(ManifestDuration::from_seconds(3601.01).as_str(), "60.2");
    }

    #[test]
    fn sentinel_is_plain_zero() {
        let sentinel = ManifestDuration::sentinel();
        assert_eq!(sentinel.to_string(), "0");
        assert!(sentinel.is_sentinel());
        assert!(!ManifestDuration::from_seconds(0.0).is_sentinel());
    }

    #[test]
    fn parse_probe_output_reads_string_and_number() {
        let text = br#"{"format": {"filename": "a.mp4", "duration": "125.400000"}}"#;
        assert_eq!(parse_probe_output(text).unwrap(), 125.4);
        let number = br#"{"format": {"duration": 59}}"#;
        assert_eq!(parse_probe_output(number).unwrap(), 59.0);
    }

    #[test]
    fn parse_probe_output_classifies_failures() {
        assert!(matches!(
            parse_probe_output(b"{}"),
            Err(ProbeError::MissingDuration)
        ));
        assert!(matches!(
            parse_probe_output(br#"{"format": {"size": "12"}}"#),
            Err(ProbeError::MissingDuration)
        ));
        assert!(matches!(
            parse_probe_output(br#"{"format": {"duration": "N/A"}}"#),
            Err(ProbeError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_probe_output(br#"{"format": {"duration": -3.0}}"#),
            Err(ProbeError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(ProbeError::Parse(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn ffprobe_reads_format_duration() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let probe = Ffprobe::new(install_ffprobe_stub(dir.path())?);
        assert_eq!(probe.probe_seconds(Path::new("B-2.mp4"))?, 70.5);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn ffprobe_passes_quiet_json_format_flags() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let stub = install_script(
            dir.path(),
            "ffprobe",
            r#"printf '%s\n' "$@" > "$(dirname "$0")/ffprobe-args.txt"
echo '{"format": {"duration": "1.0"}}'"#,
        )?;
        Ffprobe::new(stub).probe_seconds(Path::new("clip.mp4"))?;
        let args = std::fs::read_to_string(dir.path().join("ffprobe-args.txt"))?;
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            ["-v", "quiet", "-print_format", "json", "-show_format", "clip.mp4"]
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn ffprobe_non_zero_exit_is_typed() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let probe = Ffprobe::new(install_ffprobe_stub(dir.path())?);
        let err = probe.probe_seconds(Path::new("missing.mp4")).unwrap_err();
        assert!(matches!(err, ProbeError::Exit { .. }));
        assert!(matches!(
            probe.probe_seconds(Path::new("broken.mp4")),
            Err(ProbeError::MissingDuration)
        ));
        Ok(())
    }

    #[test]
    fn missing_ffprobe_is_a_spawn_error() {
        let dir = tempdir().unwrap();
        let probe = Ffprobe::new(dir.path().join("no-ffprobe"));
        assert!(matches!(
            probe.probe_seconds(Path::new("a.mp4")),
            Err(ProbeError::Spawn { .. })
        ));
    }
}
