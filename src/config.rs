#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_YTDLP: &str = "yt-dlp";
pub const DEFAULT_FFPROBE: &str = "ffprobe";
pub const DEFAULT_FORMAT: &str = "mp4";
pub const DEFAULT_OUTPUT: &str = "playlist.m3u8";

const YTDLP_KEY: &str = "GENPLAYLIST_YTDLP";
const FFPROBE_KEY: &str = "GENPLAYLIST_FFPROBE";
const FORMAT_KEY: &str = "GENPLAYLIST_FORMAT";
const OUTPUT_KEY: &str = "GENPLAYLIST_OUTPUT";

/// Everything a run needs besides the playlist URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ytdlp: PathBuf,
    pub ffprobe: PathBuf,
    pub format: String,
    pub output: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ytdlp: PathBuf::from(DEFAULT_YTDLP),
            ffprobe: PathBuf::from(DEFAULT_FFPROBE),
            format: DEFAULT_FORMAT.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub ytdlp: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub format: Option<String>,
    pub output: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings(&file_vars, env_var_string, overrides))
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Settings {
    let defaults = Settings::default();
    let ytdlp = overrides
        .ytdlp
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| lookup_value(YTDLP_KEY, file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or(defaults.ytdlp);
    let ffprobe = overrides
        .ffprobe
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| lookup_value(FFPROBE_KEY, file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or(defaults.ffprobe);
    let format = overrides
        .format
        .map(|value| normalize_format(&value))
        .filter(|value| !value.is_empty())
        .or_else(|| {
            lookup_value(FORMAT_KEY, file_vars, &env_lookup)
                .map(|value| normalize_format(&value))
                .filter(|value| !value.is_empty())
        })
        .unwrap_or(defaults.format);
    let output = overrides
        .output
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| lookup_value(OUTPUT_KEY, file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or(defaults.output);
    Settings {
        ytdlp,
        ffprobe,
        format,
        output,
    }
}

/// Accepts both `mp4` and `.mp4` so the derived filename never carries a
/// doubled dot.
fn normalize_format(value: &str) -> String {
    value.trim().trim_start_matches('.').to_string()
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads `KEY=value` lines from a `.env` style file. Lines that are not
/// assignments are skipped and reported at debug level.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let assignment = line
            .split_once('=')
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, _)| !key.is_empty());
        let Some((key, value)) = assignment else {
            debug!(path = %path.display(), line = index + 1, "skipping malformed settings line");
            continue;
        };
        vars.insert(key.to_string(), unquote(value).to_string());
    }
    debug!(path = %path.display(), keys = vars.len(), "loaded settings file");
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}
