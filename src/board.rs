// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-wiring :: board  —  typed board manifests
//
//  One JSON manifest per board, stored as <boards_dir>/<id>.json:
//
//      {
//        "name": "Nordic nRF52-DK",
//        "vendor": "Nordic",
//        "build": {
//          "core": "nRF5",
//          "cpu": "cortex-m4",
//          "mcu": "nrf52832",
//          "variant": "nRF52DK",
//          "ldscript": "nrf52_xxaa.ld",
//          "extra_flags": "-DARDUINO_NRF52_DK"
//        },
//        "debug": {
//          "tools": {
//            "jlink": { "server": { "arguments": ["-f", "interface/jlink.cfg"] } }
//          }
//        },
//        "upload": { "protocol": "jlink", "protocols": ["jlink", "cmsis-dap"] }
//      }
//
//  Only `build.core` is required. Every other key is optional and surfaces
//  as `None` / empty rather than a placeholder string.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// A board's declared hardware and toolchain attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Short ID, taken from the manifest file stem.
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    pub build: BuildSection,
    #[serde(default)]
    pub debug: DebugSection,
    #[serde(default)]
    pub upload: UploadSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Directory name under `<framework>/cores/`.
    pub core: String,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub mcu: Option<String>,
    /// Directory name under `<framework>/variants/`.
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub ldscript: Option<String>,
    /// Raw compiler flags, e.g. `"-DNRF52_S132 -DARDUINO_NRF52_DK"`.
    #[serde(default)]
    pub extra_flags: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugSection {
    #[serde(default)]
    pub tools: BTreeMap<String, DebugTool>,
}

/// One entry of `debug.tools`, keyed by protocol name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugTool {
    #[serde(default)]
    pub server: Option<DebugServer>,
    #[serde(default)]
    pub onboard: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugServer {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSection {
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
}

impl fmt::Display for BoardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

impl BoardConfig {
    /// Parse a manifest from JSON text. `origin` is only used in error messages.
    pub fn from_json_str(json: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidBoard {
            path:   origin.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Load `<path>`; the board ID is the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let mut board = Self::from_json_str(&raw, &path.display().to_string())?;
        board.id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(board)
    }

    /// Find `<boards_dir>/<id>.json` (ID match is case-insensitive).
    pub fn find(boards_dir: &Path, id: &str) -> Result<Self> {
        let exact = boards_dir.join(format!("{id}.json"));
        if exact.is_file() {
            return Self::load(&exact);
        }
        manifest_paths(boards_dir)?
            .into_iter()
            .find(|p| {
                p.file_stem()
                    .map(|s| s.to_string_lossy().eq_ignore_ascii_case(id))
                    .unwrap_or(false)
            })
            .map(|p| Self::load(&p))
            .unwrap_or_else(|| Err(ConfigError::BoardNotFound(id.to_owned())))
    }

    /// Every manifest under `boards_dir`, sorted by ID.
    pub fn catalog(boards_dir: &Path) -> Result<Vec<Self>> {
        manifest_paths(boards_dir)?.iter().map(|p| Self::load(p)).collect()
    }

    pub fn core(&self) -> &str {
        &self.build.core
    }

    pub fn cpu(&self) -> Option<&str> {
        self.build.cpu.as_deref()
    }

    pub fn mcu(&self) -> Option<&str> {
        self.build.mcu.as_deref()
    }

    pub fn variant(&self) -> Option<&str> {
        self.build.variant.as_deref()
    }

    pub fn ldscript(&self) -> Option<&str> {
        self.build.ldscript.as_deref()
    }

    pub fn debug_tool(&self, protocol: &str) -> Option<&DebugTool> {
        self.debug.tools.get(protocol)
    }

    /// Protocol used when the project does not pick one: `upload.protocol`,
    /// else the debug tool flagged `default`, else the first `onboard` one.
    pub fn default_protocol(&self) -> Option<&str> {
        if let Some(p) = self.upload.protocol.as_deref() {
            return Some(p);
        }
        let tools = &self.debug.tools;
        tools.iter().find(|(_, t)| t.default)
            .or_else(|| tools.iter().find(|(_, t)| t.onboard))
            .map(|(name, _)| name.as_str())
    }
}

fn manifest_paths(boards_dir: &Path) -> Result<Vec<PathBuf>> {
    if !boards_dir.is_dir() {
        return Err(ConfigError::Other(format!(
            "Boards directory not found: {}", boards_dir.display()
        )));
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(boards_dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();
    Ok(paths)
}
