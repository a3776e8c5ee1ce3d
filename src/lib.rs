#![forbid(unsafe_code)]

//! Builds an extended M3U manifest for a video playlist.
//!
//! The pipeline lists the playlist with yt-dlp, probes every expected local
//! file with ffprobe and writes one `#EXTINF` record per entry.

pub mod config;
pub mod logging;
pub mod manifest;
pub mod playlist;
pub mod probe;

#[cfg(test)]
mod test_support;
