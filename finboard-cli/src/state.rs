use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `~/.finboard`, or `$FINBOARD_HOME` when set.
pub fn finboard_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FINBOARD_HOME").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".finboard"))
}

pub fn ensure_finboard_home() -> Result<PathBuf> {
    let dir = finboard_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn auth_path() -> Result<PathBuf> {
    Ok(ensure_finboard_home()?.join("auth.json"))
}
