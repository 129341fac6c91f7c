use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub fn run_log_name(stamp: &str) -> String {
    format!("log-{stamp}.log")
}

/// Installs the stderr subscriber and, when `logs_dir` is given, a plain-text
/// copy in `log-<timestamp>.log`. Returns the log file path.
pub fn init(logs_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, log_path) = match logs_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let stamp = Local::now().format("%Y%m%dT%H%M%S").to_string();
            let path = dir.join(run_log_name(&stamp));
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    // A subscriber may already be installed (tests call into commands directly).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::run_log_name;

    #[test]
    fn log_name_matches_preserved_pattern() {
        let name = run_log_name("20250101T101010");
        assert!(name.starts_with("log-") && name.ends_with(".log"));
    }
}
