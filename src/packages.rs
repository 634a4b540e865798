// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-wiring :: packages  —  platform package discovery
//
//  Packages (framework, OpenOCD, ARM toolchain) live side by side in one
//  package root. The root is taken from, in order:
//
//  1. an explicit directory  (--packages-dir / packages_dir in nrf5.toml)
//  2. NRF5_PACKAGES_DIR env var
//  3. ~/.platformio/packages
//
//  Layout:
//    <root>/framework-arduinonordicnrf5/package.json
//    <root>/tool-openocd/bin/openocd
//    <root>/toolchain-gccarmnoneeabi/bin/arm-none-eabi-gcc
// ─────────────────────────────────────────────────────────────────────────────

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::board::DebugServer;

pub const FRAMEWORK_PACKAGE: &str = "framework-arduinonordicnrf5";
pub const OPENOCD_PACKAGE:   &str = "tool-openocd";
pub const TOOLCHAIN_PACKAGE: &str = "toolchain-gccarmnoneeabi";

/// Debug server binary inside its package when the manifest names none.
pub const OPENOCD_EXECUTABLE: &str = "bin/openocd";

/// Looks up installed platform packages by name.
pub trait PackageResolver {
    fn package_dir(&self, name: &str) -> Option<PathBuf>;
    fn package_version(&self, name: &str) -> Option<String>;

    /// `<package>/<executable>` for a board's debug server, defaulting to
    /// `tool-openocd` and `bin/openocd`. Empty when the file is missing so
    /// callers fall back to PATH.
    fn openocd_bin(&self, server: Option<&DebugServer>) -> PathBuf {
        let package = server.and_then(|s| s.package.as_deref()).unwrap_or(OPENOCD_PACKAGE);
        let executable = server.and_then(|s| s.executable.as_deref()).unwrap_or(OPENOCD_EXECUTABLE);
        self.package_dir(package)
            .map(|d| d.join(executable))
            .filter(|p| p.is_file())
            .unwrap_or_default()
    }
}

/// Packages installed under a single root directory.
#[derive(Debug, Clone)]
pub struct PackageStore {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    version: Option<String>,
}

impl PackageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Pick the package root: explicit dir, then NRF5_PACKAGES_DIR, then
    /// the per-user default.
    pub fn discover(explicit: Option<&Path>) -> Self {
        if let Some(dir) = explicit {
            return Self::new(dir);
        }
        if let Ok(root) = std::env::var("NRF5_PACKAGES_DIR") {
            return Self::new(root);
        }
        let home = dirs_home().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".platformio").join("packages"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<toolchain>/bin`, or an empty path when the toolchain package is
    /// missing so callers fall back to PATH.
    pub fn toolchain_bin(&self) -> PathBuf {
        self.package_dir(TOOLCHAIN_PACKAGE)
            .map(|d| d.join("bin"))
            .filter(|b| b.is_dir())
            .unwrap_or_default()
    }
}

impl PackageResolver for PackageStore {
    fn package_dir(&self, name: &str) -> Option<PathBuf> {
        let dir = self.root.join(name);
        if dir.is_dir() { Some(dir) } else { None }
    }

    fn package_version(&self, name: &str) -> Option<String> {
        let raw = fs::read_to_string(self.package_dir(name)?.join("package.json")).ok()?;
        serde_json::from_str::<PackageManifest>(&raw).ok()?.version
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}
