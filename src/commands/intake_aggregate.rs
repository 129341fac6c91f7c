use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::intake::config::load_config;
use crate::intake::paths::resolve_paths;
use crate::intake::pipeline::aggregate_files;

#[derive(Debug, Clone)]
pub struct IntakeAggregateOptions {
    pub files: Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
}

pub fn run(opts: &IntakeAggregateOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(paths.config_file())?;
    let mut report = CommandReport::new("intake-aggregate");

    let out_dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| paths.consolidated_dir.clone());

    match aggregate_files(&opts.files, &out_dir, &cfg, Local::now())? {
        Some(manifest) => report.detail(format!(
            "manifest={} rows={} sources={}",
            manifest.path.display(),
            manifest.rows,
            opts.files.len()
        )),
        None => report.issue("no index rows to aggregate; manifest not written"),
    }

    Ok(report)
}
