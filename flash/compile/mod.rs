// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-flash :: compile  —  framework library builds
//
//  Executes every `LibraryBuild` request a resolved `BuildEnv` carries
//  (board variant first, then the framework core), producing one static
//  archive per request.
// ─────────────────────────────────────────────────────────────────────────────

pub mod arm;
pub mod cache;

use std::path::PathBuf;

use nrf5_wiring::error::Result;
use nrf5_wiring::{BoardConfig, BuildEnv};

/// Inputs to a library build run.
#[derive(Debug)]
pub struct CompileRequest<'a> {
    pub env:   &'a BuildEnv,
    pub board: &'a BoardConfig,
    /// Directory with arm-none-eabi-* binaries; empty means use PATH.
    pub toolchain_bin: PathBuf,
    /// Print each compiler invocation.
    pub verbose: bool,
}

/// One built archive.
#[derive(Debug)]
pub struct CompiledLibrary {
    pub name:     String,
    pub archive:  PathBuf,
    pub objects:  usize,
    pub reused:   usize,
}

/// Build every requested library, in request order.
pub fn compile(req: &CompileRequest<'_>) -> Result<Vec<CompiledLibrary>> {
    let toolchain = arm::Toolchain::resolve(&req.toolchain_bin);
    let flags = arm::Flags::from_env(req.env, req.board.cpu());

    req.env
        .library_builds()
        .map(|lib| arm::build_library(&toolchain, &flags, lib, req.verbose))
        .collect()
}
