#![forbid(unsafe_code)]

//! Command-line entry point: list a playlist, probe the downloaded files and
//! write an extended M3U manifest next to them.

use anyhow::{Result, bail};
use clap::Parser;
use genplaylist::config::{Settings, SettingsOverrides, resolve_settings};
use genplaylist::logging::{Verbosity, init_logging};
use genplaylist::manifest::{ManifestRequest, generate_playlist};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, Stdio};
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[command(
    name = "genplaylist",
    version,
    about = "Generate an m3u8 manifest for a downloaded video playlist"
)]
struct Cli {
    /// Playlist URL handed to yt-dlp.
    #[arg(required_unless_present = "test")]
    url: Option<String>,

    /// Extension of the downloaded media files.
    #[arg(short, long, value_name = "EXT")]
    format: Option<String>,

    /// Where to write the manifest.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    ytdlp: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    ffprobe: Option<PathBuf>,

    /// Read settings from this file instead of `./.env`.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Also print the manifest on stdout.
    #[arg(long)]
    print: bool,

    /// Debug output. Wins over `--quiet`.
    #[arg(short, long)]
    verbose: bool,

    /// Errors only.
    #[arg(short, long)]
    quiet: bool,

    /// Check that yt-dlp and ffprobe can be run, then exit.
    #[arg(short, long)]
    test: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            ytdlp: self.ytdlp.clone(),
            ffprobe: self.ffprobe.clone(),
            format: self.format.clone(),
            output: self.output.clone(),
            env_path: self.env_file.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(Verbosity::from_flags(cli.verbose, cli.quiet)) {
        eprintln!("Warning: {err:#}");
    }
    debug!(?cli, "parsed arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = resolve_settings(cli.overrides())?;
    debug!(?settings, "resolved settings");

    if cli.test {
        return self_check(&settings);
    }

    let Some(url) = cli.url.as_deref() else {
        bail!("a playlist URL is required");
    };
    let request = ManifestRequest::from_settings(url, &settings);
    let manifest = generate_playlist(&request, &settings, None)?;
    if cli.print {
        print!("{manifest}");
    }
    Ok(())
}

fn self_check(settings: &Settings) -> Result<()> {
    let checks = [
        ensure_program_available(&settings.ytdlp, "--version"),
        ensure_program_available(&settings.ffprobe, "-version"),
    ];
    let mut failures = 0;
    for check in checks {
        match check {
            Ok(program) => info!("{program} is available"),
            Err(err) => {
                error!("{err:#}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{failures} required tool(s) unavailable");
    }
    Ok(())
}

/// Runs `<program> <version_flag>` to fail loudly when yt-dlp or ffprobe is
/// missing.
fn ensure_program_available(program: &Path, version_flag: &str) -> Result<String> {
    let name = program.display().to_string();
    let status = Command::new(program)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(name),
        Ok(status) => bail!("{name} is installed but returned a failure status ({status})"),
        Err(err) => bail!("{name} is not installed or not in PATH: {err}"),
    }
}
