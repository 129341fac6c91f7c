use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::IntakeError;
use crate::intake::identity::NOT_ADMITTED;

include!(concat!(env!("OUT_DIR"), "/intake_env_allowlist.rs"));

/// Column names and matching rules for the per-archive index sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Substring that marks a header line as the index sheet's header.
    pub marker: String,
    pub delimiter: String,
    pub file_name_column: String,
    pub id_column: String,
    pub preferred_column: String,
    pub last_column: String,
    /// Identity used when a row's id column is empty.
    pub placeholder: String,
    /// Member extensions opened while looking for the index sheet.
    pub extensions: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            marker: "File name".to_string(),
            delimiter: ",".to_string(),
            file_name_column: "File name".to_string(),
            id_column: "IC ID Number".to_string(),
            preferred_column: "Preferred".to_string(),
            last_column: "Last".to_string(),
            placeholder: NOT_ADMITTED.to_string(),
            extensions: vec!["csv".to_string()],
        }
    }
}

impl IndexConfig {
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    pub fn is_tabular_member(&self, member: &str) -> bool {
        let Some(ext) = Path::new(member).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub prefix: String,
    pub provenance_column: Option<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            prefix: "photos_uploaded".to_string(),
            provenance_column: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntakeConfig {
    pub index: IndexConfig,
    pub manifest: ManifestConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialIntakeConfig {
    index: Option<IndexConfig>,
    manifest: Option<ManifestConfig>,
    cleanup: Option<CleanupConfig>,
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

// Delimiters are kept untrimmed so a tab can be configured.
fn env_or_raw(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.is_empty() => v,
        _ => fallback.to_string(),
    }
}

fn env_or_optional(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if v.trim().is_empty() => None,
        Ok(v) => Some(v.trim().to_string()),
        Err(_) => fallback,
    }
}

pub fn validate(cfg: &IntakeConfig) -> Result<()> {
    let invalid = |msg: &str| anyhow!(IntakeError::InvalidConfig(msg.to_string()));

    if cfg.index.delimiter.len() != 1 || !cfg.index.delimiter.is_ascii() {
        return Err(invalid("index delimiter must be exactly one ASCII character"));
    }
    if cfg.index.marker.is_empty() {
        return Err(invalid("index marker cannot be empty"));
    }
    if cfg.index.placeholder.trim().is_empty() {
        return Err(invalid("index placeholder cannot be empty"));
    }
    for (name, column) in [
        ("file_name_column", &cfg.index.file_name_column),
        ("id_column", &cfg.index.id_column),
        ("preferred_column", &cfg.index.preferred_column),
        ("last_column", &cfg.index.last_column),
    ] {
        if column.trim().is_empty() {
            return Err(invalid(&format!("index {name} cannot be empty")));
        }
    }
    if cfg.index.extensions.is_empty() {
        return Err(invalid("index extensions cannot be empty"));
    }
    if cfg.manifest.prefix.trim().is_empty() {
        return Err(invalid("manifest prefix cannot be empty"));
    }
    if cfg
        .manifest
        .provenance_column
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        return Err(invalid("manifest provenance_column cannot be blank"));
    }
    Ok(())
}

pub fn resolve_config_path(default_path: PathBuf) -> PathBuf {
    if let Ok(custom) = env::var("INTAKE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    default_path
}

fn merge_toml(base: &mut IntakeConfig, raw: &str, origin: &Path) -> Result<()> {
    let parsed: PartialIntakeConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse intake config {}: {err}", origin.display()))?;
    if let Some(index) = parsed.index {
        base.index = index;
    }
    if let Some(manifest) = parsed.manifest {
        base.manifest = manifest;
    }
    if let Some(cleanup) = parsed.cleanup {
        base.cleanup = cleanup;
    }
    Ok(())
}

fn merge_file_config(base: &mut IntakeConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(path)?;
    merge_toml(base, &raw, path)
}

fn apply_env_overrides(cfg: &mut IntakeConfig) {
    cfg.index.marker = env_or_string("INTAKE_INDEX_MARKER", &cfg.index.marker);
    cfg.index.delimiter = env_or_raw("INTAKE_DELIMITER", &cfg.index.delimiter);
    cfg.index.placeholder = env_or_string("INTAKE_PLACEHOLDER", &cfg.index.placeholder);
    cfg.manifest.prefix = env_or_string("INTAKE_MANIFEST_PREFIX", &cfg.manifest.prefix);
    cfg.manifest.provenance_column = env_or_optional(
        "INTAKE_PROVENANCE_COLUMN",
        cfg.manifest.provenance_column.take(),
    );
    cfg.cleanup.enabled = env_or_bool("INTAKE_CLEANUP_ENABLED", cfg.cleanup.enabled);
}

/// Defaults, then `intake.toml` (or `INTAKE_CONFIG_PATH`), then env overrides.
pub fn load_config(default_path: PathBuf) -> Result<IntakeConfig> {
    let mut cfg = IntakeConfig::default();
    let path = resolve_config_path(default_path);
    merge_file_config(&mut cfg, &path)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

/// `INTAKE_*` keys referenced by this binary that are set in the environment.
pub fn active_env_overrides() -> Vec<String> {
    GENERATED_INTAKE_ENV_ALLOWLIST
        .iter()
        .filter(|key| env::var_os(key).is_some())
        .map(|key| key.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = IntakeConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.index.delimiter_byte(), b',');
    }

    #[test]
    fn partial_toml_only_replaces_named_sections() {
        let mut cfg = IntakeConfig::default();
        let raw = "[manifest]\nprefix = \"roster\"\nprovenance_column = \"Source\"\n";
        merge_toml(&mut cfg, raw, Path::new("intake.toml")).expect("merge");

        assert_eq!(cfg.manifest.prefix, "roster");
        assert_eq!(cfg.manifest.provenance_column.as_deref(), Some("Source"));
        assert_eq!(cfg.index.marker, "File name");
        assert!(cfg.cleanup.enabled);
    }

    #[test]
    fn section_fields_fall_back_to_defaults() {
        let mut cfg = IntakeConfig::default();
        merge_toml(&mut cfg, "[index]\ndelimiter = \";\"\n", Path::new("x.toml")).expect("merge");
        assert_eq!(cfg.index.delimiter_byte(), b';');
        assert_eq!(cfg.index.id_column, "IC ID Number");
    }

    #[test]
    fn rejects_multi_character_delimiter() {
        let mut cfg = IntakeConfig::default();
        cfg.index.delimiter = ";;".to_string();
        let err = validate(&cfg).expect_err("should fail");
        assert!(err.to_string().contains("delimiter"));
    }

    #[test]
    fn rejects_empty_column_name() {
        let mut cfg = IntakeConfig::default();
        cfg.index.last_column = " ".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn tabular_member_matches_extension_case_insensitively() {
        let cfg = IndexConfig::default();
        assert!(cfg.is_tabular_member("batch/Index.CSV"));
        assert!(!cfg.is_tabular_member("photo.jpg"));
        assert!(!cfg.is_tabular_member("README"));
    }
}
