use std::path::Path;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://asistencia.db?mode=rwc";

/// Result of looking for one env file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFileStatus {
    Loaded(String),
    Missing(String),
}

fn is_production() -> bool {
    dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production"
}

pub fn env_files() -> Vec<&'static str> {
    if is_production() {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    }
}

/// Loads the env files in order, later files overriding earlier ones.
/// Runs before tracing is up, so the caller logs the returned statuses.
pub fn load_environment() -> Result<Vec<EnvFileStatus>, dotenvy::Error> {
    env_files().into_iter().map(load_env_file).collect()
}

fn load_env_file(path: &str) -> Result<EnvFileStatus, dotenvy::Error> {
    if !Path::new(path).exists() {
        return Ok(EnvFileStatus::Missing(path.to_string()));
    }

    dotenvy::from_filename_override(path)?;
    Ok(EnvFileStatus::Loaded(path.to_string()))
}

pub fn database_url() -> String {
    dotenvy::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}
