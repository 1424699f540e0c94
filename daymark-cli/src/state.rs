//! `~/.daymark` home directory and the profile file persisted across runs.

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use daymark_core::Context;

pub fn daymark_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".daymark"))
}

pub fn ensure_daymark_home() -> Result<PathBuf> {
    let dir = daymark_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// The context new invocations default to; `--context` overrides.
    pub current_context: Context,
    /// Eastern-time date of the last weekly reset, per context.
    #[serde(default)]
    pub last_weekly_reset: HashMap<Context, NaiveDate>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            current_context: Context::Work,
            last_weekly_reset: HashMap::new(),
        }
    }
}

pub fn profile_path() -> Result<PathBuf> {
    Ok(ensure_daymark_home()?.join("profile.json"))
}

pub fn store_path() -> Result<PathBuf> {
    Ok(ensure_daymark_home()?.join("store.json"))
}

pub fn session_path() -> Result<PathBuf> {
    Ok(ensure_daymark_home()?.join("session.json"))
}

pub fn legacy_path() -> Result<PathBuf> {
    Ok(ensure_daymark_home()?.join("legacy.json"))
}

pub fn read_profile() -> Result<Profile> {
    let p = profile_path()?;
    if !p.exists() {
        return Ok(Profile::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(serde_json::from_str(&s)?)
}

pub fn write_profile(profile: &Profile) -> Result<()> {
    let p = profile_path()?;
    let json = serde_json::to_string_pretty(profile)?;
    fs::write(&p, json).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}
