use anyhow::Result;

use crate::commands::CommandReport;
use crate::intake::config::{active_env_overrides, load_config, resolve_config_path};
use crate::intake::extract::list_archives;
use crate::intake::lock::RunLock;
use crate::intake::paths::resolve_paths;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("intake-status");

    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("intake_home={}", paths.intake_home.display()));
    report.detail(format!("inbox_dir={}", paths.inbox_dir.display()));
    report.detail(format!("extraction_dir={}", paths.extraction_dir.display()));
    report.detail(format!("consolidated_dir={}", paths.consolidated_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("destination_dir={}", paths.destination_dir.display()));

    let config_path = resolve_config_path(paths.config_file());
    report.detail(format!(
        "config={}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (defaults)" }
    ));
    match load_config(paths.config_file()) {
        Ok(cfg) => {
            report.detail(format!(
                "index marker=`{}` delimiter=`{}` placeholder=`{}`",
                cfg.index.marker, cfg.index.delimiter, cfg.index.placeholder
            ));
            report.detail(format!(
                "manifest prefix=`{}` cleanup={}",
                cfg.manifest.prefix, cfg.cleanup.enabled
            ));
        }
        Err(err) => report.issue(format!("invalid config: {err:#}")),
    }

    let overrides = active_env_overrides();
    if !overrides.is_empty() {
        report.detail(format!("env overrides: {}", overrides.join(", ")));
    }

    if !paths.inbox_dir.exists() {
        report.issue(format!("missing inbox dir ({})", paths.inbox_dir.display()));
    } else {
        report.detail(format!("pending archives={}", list_archives(&paths.inbox_dir)?.len()));
    }
    if RunLock::is_held(&paths.lock_file())? {
        report.detail(format!("run in progress (lock {})", paths.lock_file().display()));
    }

    Ok(report)
}
