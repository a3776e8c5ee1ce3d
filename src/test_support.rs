#![forbid(unsafe_code)]

//! Stub executables standing in for yt-dlp and ffprobe in tests.

use anyhow::Result;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Writes `body` as an executable bash script named `name` inside `dir`.
pub fn install_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let script_path = dir.join(name);
    let script = format!("#!/usr/bin/env bash\nset -eu\n{body}\n");
    fs::write(&script_path, script)?;
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(&script_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms)?;
    }
    Ok(script_path)
}

/// ffprobe stub answering per file name: `A-1.mp4` lasts 10s, `B-2.mp4`
/// 70.5s, `broken.mp4` yields JSON without a duration and everything else
/// fails like a missing file does.
pub fn install_ffprobe_stub(dir: &Path) -> Result<PathBuf> {
    install_script(
        dir,
        "ffprobe",
        r#"
if [[ "${1:-}" == "-version" ]]; then
  echo "ffprobe version stub"
  exit 0
fi
path="${@: -1}"
case "$(basename "$path")" in
  A-1.mp4)
    echo '{"format": {"filename": "A-1.mp4", "duration": "10.000000"}}'
    ;;
  B-2.mp4)
    echo '{"format": {"filename": "B-2.mp4", "duration": "70.500000"}}'
    ;;
  broken.mp4)
    echo '{"format": {"filename": "broken.mp4"}}'
    ;;
  *)
    echo "$path: No such file or directory" >&2
    exit 1
    ;;
esac
"#,
    )
}

/// yt-dlp stub emitting two flat playlist entries.
pub fn install_ytdlp_stub(dir: &Path) -> Result<PathBuf> {
    install_script(
        dir,
        "yt-dlp",
        r#"
if [[ "${1:-}" == "--version" ]]; then
  echo "2025.01.01"
  exit 0
fi
printf '%s\n' "$@" > "$(dirname "$0")/ytdlp-args.txt"
echo '{"_type": "url", "id": "1", "title": "A", "url": "1"}'
echo '{"_type": "url", "id": "2", "title": "B", "url": "2"}'
"#,
    )
}
