// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-flash :: config  —  project configuration (nrf5.toml)
//
//      board           = "nrf52_dk"
//      boards_dir      = "boards"
//      packages_dir    = "/home/me/.platformio/packages"
//      framework_dir   = "/path/to/framework-arduinonordicnrf5"
//      build_dir       = ".build"
//      upload_protocol = "jlink"
//      build_flags     = ["-DNRF52_S132"]
//
//  Every key is optional; a missing file is the same as an empty one.
//  Relative paths are taken relative to the config file's directory.
// ─────────────────────────────────────────────────────────────────────────────

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use nrf5_wiring::error::{ConfigError, Result};

pub const DEFAULT_CONFIG: &str = "nrf5.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub board:           Option<String>,
    pub boards_dir:      Option<PathBuf>,
    pub packages_dir:    Option<PathBuf>,
    pub framework_dir:   Option<PathBuf>,
    pub build_dir:       Option<PathBuf>,
    pub upload_protocol: Option<String>,
    #[serde(default)]
    pub build_flags:     Vec<String>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let mut cfg = Self::from_toml_str(&raw, path)?;
        if let Some(base) = path.parent() {
            cfg.rebase(base);
        }
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ConfigError::InvalidConfig {
            path:   origin.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn boards_dir(&self) -> PathBuf {
        self.boards_dir.clone().unwrap_or_else(|| PathBuf::from("boards"))
    }

    pub fn build_dir(&self) -> PathBuf {
        self.build_dir.clone().unwrap_or_else(|| PathBuf::from(".build"))
    }

    fn rebase(&mut self, base: &Path) {
        for p in [
            &mut self.boards_dir,
            &mut self.packages_dir,
            &mut self.framework_dir,
            &mut self.build_dir,
        ]
        .into_iter()
        .flatten()
        {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
}
