#![forbid(unsafe_code)]

//! Log subscriber setup shared by the binary and tests.

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;

/// How chatty the command line should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    pub fn level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::ERROR,
            Verbosity::Normal => LevelFilter::INFO,
            Verbosity::Verbose => LevelFilter::DEBUG,
        }
    }
}

/// `RUST_LOG` wins when set; otherwise the flag-derived level applies.
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbosity.level().into())
        .from_env_lossy()
}

/// Builds a subscriber writing to `writer`. The binary passes stderr; tests
/// pass an in-memory buffer and install it with
/// `tracing::subscriber::with_default`.
pub fn subscriber<W>(
    verbosity: Verbosity,
    writer: W,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_target(false)
        .with_writer(writer)
        .finish()
}

/// Installs the process-wide subscriber. Fails if one is already installed.
pub fn init_logging(verbosity: Verbosity) -> Result<()> {
    subscriber(verbosity, std::io::stderr)
        .try_init()
        .context("installing the log subscriber")
}
