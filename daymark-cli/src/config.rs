//! config.toml: absent `[remote]` means the file-backed local store.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_daymark_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub remote: Option<RemoteSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    pub base_url: String,
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_daymark_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(toml::from_str(&s).context("parse config.toml")?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
