use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct IntakePaths {
    pub intake_home: PathBuf,
    pub inbox_dir: PathBuf,
    pub extraction_dir: PathBuf,
    pub consolidated_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub destination_dir: PathBuf,
}

impl IntakePaths {
    pub fn lock_file(&self) -> PathBuf {
        self.intake_home.join("intake.lock")
    }

    pub fn config_file(&self) -> PathBuf {
        self.intake_home.join("intake.toml")
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn intake_home() -> Result<PathBuf> {
    let home = required_home_dir()?;
    Ok(env_or_default_path("INTAKE_HOME", home.join("intake")))
}

pub fn resolve_paths() -> Result<IntakePaths> {
    let intake_home = intake_home()?;

    let inbox_dir = env_or_default_path("INTAKE_INBOX_DIR", intake_home.join("inbox"));
    let extraction_dir = env_or_default_path("INTAKE_EXTRACTION_DIR", intake_home.join("extract"));
    let consolidated_dir = env_or_default_path(
        "INTAKE_CONSOLIDATED_DIR",
        intake_home.join("consolidated"),
    );
    let logs_dir = env_or_default_path("INTAKE_LOGS_DIR", intake_home.join("logs"));
    let destination_dir =
        env_or_default_path("INTAKE_DESTINATION_DIR", intake_home.join("outbox"));

    Ok(IntakePaths {
        intake_home,
        inbox_dir,
        extraction_dir,
        consolidated_dir,
        logs_dir,
        destination_dir,
    })
}
