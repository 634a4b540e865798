// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-flash :: compile :: cache
//
//  Per-library manifest of source fingerprints, stored next to the object
//  files at <library build_dir>/obj/.nrf5-cache.json. An object is reused
//  only when its source hash and the compiler-flags signature both match.
//  Headers are not tracked: a header edit needs a changed flag set or a
//  clean build dir.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const MANIFEST_FILE: &str = ".nrf5-cache.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Source path → hex SHA-256 of its content.
    pub entries: HashMap<String, String>,
    /// Signature of the flags the objects were built with.
    pub flags_hash: String,
}

impl CacheManifest {
    /// Load from disk; anything unreadable is an empty manifest.
    pub fn load(dir: &Path) -> Self {
        std::fs::read_to_string(dir.join(MANIFEST_FILE))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(dir.join(MANIFEST_FILE), json)
    }

    pub fn is_fresh(&self, src: &Path, obj: &Path, flags_hash: &str) -> bool {
        if self.flags_hash != flags_hash || !obj.exists() {
            return false;
        }
        match self.entries.get(&*src.to_string_lossy()) {
            Some(cached) => hash_file(src).as_deref() == Some(cached.as_str()),
            None => false,
        }
    }

    pub fn record(&mut self, src: &Path, flags_hash: &str) {
        if let Some(hash) = hash_file(src) {
            self.entries.insert(src.to_string_lossy().to_string(), hash);
        }
        self.flags_hash = flags_hash.to_owned();
    }
}

pub fn hash_file(path: &Path) -> Option<String> {
    let data = std::fs::read(path).ok()?;
    Some(hex::encode(Sha256::digest(&data)))
}

pub fn hash_str(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

/// Object path for `src` inside `obj_dir`. A short hash of the full source
/// path keeps same-named files from different directories apart.
pub fn obj_path(obj_dir: &Path, src: &Path) -> PathBuf {
    let fname = src.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".into());
    let short = &hash_str(&src.to_string_lossy())[..8];
    obj_dir.join(format!("{short}_{fname}.o"))
}
