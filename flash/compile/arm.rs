// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-flash :: compile :: arm
//
//  Compiles one framework library with arm-none-eabi-gcc.
//
//  Pipeline:
//    1. Collect .c / .cpp / .S sources under the library dir
//    2. Compile them in PARALLEL        (rayon, incremental cache)
//    3. arm-none-eabi-ar → lib<Name>.a
// ─────────────────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use rayon::prelude::*;
use walkdir::WalkDir;

use nrf5_wiring::error::{ConfigError, Result};
use nrf5_wiring::{BuildEnv, LibraryBuild};

use super::cache::{hash_str, obj_path, CacheManifest};
use super::CompiledLibrary;

/// Resolved compiler binaries.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub cc:  String,
    pub cxx: String,
    pub ar:  String,
}

impl Toolchain {
    pub fn resolve(bin_dir: &Path) -> Self {
        Self {
            cc:  resolve_tool(bin_dir, "arm-none-eabi-gcc"),
            cxx: resolve_tool(bin_dir, "arm-none-eabi-g++"),
            ar:  resolve_tool(bin_dir, "arm-none-eabi-ar"),
        }
    }
}

/// Compiler arguments shared by every source, plus the per-language tails.
#[derive(Debug, Clone)]
pub struct Flags {
    pub common: Vec<String>,
    pub c:      Vec<String>,
    pub cxx:    Vec<String>,
}

impl Flags {
    pub fn from_env(env: &BuildEnv, cpu: Option<&str>) -> Self {
        let mut common = Vec::new();
        if let Some(cpu) = cpu {
            common.push(format!("-mcpu={cpu}"));
        }
        common.extend([
            "-mthumb", "-Os", "-ffunction-sections", "-fdata-sections",
        ].map(String::from));
        common.extend(env.ccflags.iter().cloned());
        common.extend(env.define_args());
        common.extend(env.include_args());

        let mut cxx = env.cxxflags.clone();
        cxx.extend(["-fno-rtti", "-fno-exceptions"].map(String::from));

        Self { common, c: env.cflags.clone(), cxx }
    }

    fn signature(&self) -> String {
        hash_str(&format!("{:?}{:?}{:?}", self.common, self.c, self.cxx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lang {
    C,
    Cxx,
    Asm,
}

impl Lang {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "c"           => Some(Lang::C),
            "cpp" | "cc"  => Some(Lang::Cxx),
            "S"           => Some(Lang::Asm),
            _             => None,
        }
    }
}

pub fn build_library(
    tc: &Toolchain,
    flags: &Flags,
    lib: &LibraryBuild,
    verbose: bool,
) -> Result<CompiledLibrary> {
    let sources = collect_sources(&lib.src_dir);
    if sources.is_empty() {
        return Err(ConfigError::Other(format!(
            "No .c/.cpp/.S sources found in {}", lib.src_dir.display()
        )));
    }

    let obj_dir = lib.build_dir.join("obj");
    std::fs::create_dir_all(&obj_dir)?;

    let sig = flags.signature();
    let mut manifest = CacheManifest::load(&obj_dir);
    let errors: Mutex<Vec<String>> = Mutex::new(Vec::new());

    let compiled: Vec<(PathBuf, bool)> = sources.par_iter().map(|src| {
        let obj = obj_path(&obj_dir, src);
        if manifest.is_fresh(src, &obj, &sig) {
            if verbose {
                eprintln!("  [cache] {}", src.display());
            }
            return (obj, true);
        }

        if verbose {
            eprintln!("  [compile] {}", src.display());
        }
        if let Err(msg) = compile_one(tc, flags, src, &obj) {
            errors.lock().unwrap_or_else(|p| p.into_inner()).push(msg);
        }
        (obj, false)
    }).collect();

    for src in &sources {
        if obj_path(&obj_dir, src).exists() {
            manifest.record(src, &sig);
        }
    }
    if let Err(e) = manifest.save(&obj_dir) {
        if verbose {
            eprintln!("  [cache] manifest not saved in {}: {e}", obj_dir.display());
        }
    }

    let errs = errors.into_inner().unwrap_or_else(|p| p.into_inner());
    if !errs.is_empty() {
        return Err(ConfigError::CompileFailed { output: errs.join("\n\n") });
    }

    let archive = lib.archive_path();
    let _ = std::fs::remove_file(&archive);

    let mut ar = Command::new(&tc.ar);
    ar.arg("rcs").arg(&archive);
    for (obj, _) in &compiled {
        ar.arg(obj);
    }
    let out = ar.output().map_err(|e| spawn_error(&tc.ar, e))?;
    if !out.status.success() {
        return Err(ConfigError::CompileFailed {
            output: String::from_utf8_lossy(&out.stderr).to_string(),
        });
    }

    Ok(CompiledLibrary {
        name:    lib.name.clone(),
        archive,
        objects: compiled.len(),
        reused:  compiled.iter().filter(|(_, reused)| *reused).count(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn compile_one(tc: &Toolchain, flags: &Flags, src: &Path, obj: &Path) -> std::result::Result<(), String> {
    let Some(lang) = Lang::of(src) else {
        return Ok(());
    };

    let mut cmd = match lang {
        Lang::Cxx => Command::new(&tc.cxx),
        Lang::C | Lang::Asm => Command::new(&tc.cc),
    };
    cmd.args(&flags.common);
    match lang {
        Lang::C   => { cmd.args(&flags.c); }
        Lang::Cxx => { cmd.args(&flags.cxx); }
        Lang::Asm => { cmd.args(["-x", "assembler-with-cpp"]); }
    }
    cmd.arg("-c").arg(src).arg("-o").arg(obj);

    match cmd.output() {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(format!(
            "In {}:\n{}", src.display(), String::from_utf8_lossy(&out.stderr)
        )),
        Err(e) => {
            let program = cmd.get_program().to_string_lossy().to_string();
            Err(format!("In {}:\n{}", src.display(), spawn_error(&program, e)))
        }
    }
}

/// Every compilable source below `dir`, sorted for stable archives.
pub fn collect_sources(dir: &Path) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter(|e| Lang::of(e.path()).is_some())
        .map(|e| e.path().to_owned())
        .collect();
    sources.sort();
    sources
}

fn resolve_tool(bin_dir: &Path, name: &str) -> String {
    if bin_dir.as_os_str().is_empty() {
        return name.to_owned();
    }
    let p = bin_dir.join(name);
    if p.exists() { p.to_string_lossy().to_string() } else { name.to_owned() }
}

fn spawn_error(program: &str, e: std::io::Error) -> ConfigError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ConfigError::ToolchainNotFound(program.to_owned())
    } else {
        ConfigError::Io(e)
    }
}
