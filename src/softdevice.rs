// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-wiring :: softdevice  —  Nordic protocol stack selection
//
//  A board opts into a softdevice through one of the NRF5x_Sxxx defines.
//  The SDK ships each softdevice as:
//
//    <core>/SDK/components/softdevice/<ver>/headers/
//    <core>/SDK/components/softdevice/<ver>/hex/<ver>_nrf5x_<x.y.z>_softdevice.hex
//    <core>/SDK/components/softdevice/<ver>/toolchain/armgcc/armgcc_<ver>_<family>
// ─────────────────────────────────────────────────────────────────────────────

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Softdevice {
    S132,
    S130,
    S110,
}

/// Selection defines in priority order.
const SELECTORS: [(&str, Softdevice); 3] = [
    ("NRF52_S132", Softdevice::S132),
    ("NRF51_S130", Softdevice::S130),
    ("NRF51_S110", Softdevice::S110),
];

impl Softdevice {
    /// First selector present in `defines` wins.
    pub fn detect<S: AsRef<str>>(defines: &[S]) -> Option<Self> {
        SELECTORS
            .iter()
            .find(|(sel, _)| defines.iter().any(|d| d.as_ref() == *sel))
            .map(|(_, sd)| *sd)
    }

    /// Lower-case ID used in SDK paths and file names.
    pub fn id(self) -> &'static str {
        match self {
            Softdevice::S132 => "s132",
            Softdevice::S130 => "s130",
            Softdevice::S110 => "s110",
        }
    }

    /// Upper-case define announcing the softdevice to the core sources.
    pub fn define(self) -> String {
        self.id().to_uppercase()
    }

    /// `<components>/softdevice/<id>`
    pub fn root(self, components: &Path) -> PathBuf {
        components.join("softdevice").join(self.id())
    }

    /// `.hex` images in `hex_dir` whose name starts with this softdevice's
    /// ID (case-insensitive), sorted by file name. A missing directory
    /// yields no images.
    pub fn find_hex(self, hex_dir: &Path) -> Vec<PathBuf> {
        sorted_file_names(hex_dir)
            .into_iter()
            .filter(|f| f.ends_with(".hex") && f.to_lowercase().starts_with(self.id()))
            .map(|f| hex_dir.join(f))
            .collect()
    }

    /// Linker script in `ldscript_dir` ending with `mcu_family` and naming
    /// this softdevice. When several match, the last in name order is used.
    pub fn find_ldscript(self, ldscript_dir: &Path, mcu_family: &str) -> Option<PathBuf> {
        sorted_file_names(ldscript_dir)
            .into_iter()
            .filter(|f| f.ends_with(mcu_family) && f.to_lowercase().contains(self.id()))
            .last()
            .map(|f| ldscript_dir.join(f))
    }
}

impl fmt::Display for Softdevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// The MCU family suffix of a board linker script: the second
/// `_`-separated token, e.g. `xxaa.ld` for `nrf52_xxaa.ld`.
pub fn mcu_family(ldscript: &str) -> Option<&str> {
    ldscript.split('_').nth(1)
}

fn sorted_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => return Vec::new(),
    };
    names.sort();
    names
}
