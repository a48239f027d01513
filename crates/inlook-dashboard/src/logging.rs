use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

fn env_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env("INLOOK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("info")))
}

pub fn init_stderr(configured: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn init_file(path: &Path, configured: Option<&str>) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::msg(format!("failed to open log file {}: {e}", path.display())))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}
