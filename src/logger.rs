use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Log to stderr so that reports on stdout stay machine readable.
pub fn init_logger(level: LevelFilter) -> Result<()> {
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialize logger")
}
