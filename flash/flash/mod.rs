// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-flash :: flash  —  upload orchestrator
// ─────────────────────────────────────────────────────────────────────────────

pub mod openocd;

use std::path::{Path, PathBuf};

use nrf5_wiring::error::{ConfigError, Result};
use nrf5_wiring::BuildEnv;

#[derive(Debug)]
pub struct FlashRequest {
    /// Firmware image handed to the uploader as `$SOURCE`.
    pub firmware: PathBuf,
    /// Packaged OpenOCD binary; empty means look it up on PATH.
    pub uploader_bin: PathBuf,
    /// Print the command before running it, and the programmer output.
    pub verbose:  bool,
    /// Only print the command.
    pub dry_run:  bool,
}

/// Upload `req.firmware` with the upload command resolved into `env`.
pub fn flash(req: &FlashRequest, env: &BuildEnv) -> Result<()> {
    let protocol = env.subst("$UPLOAD_PROTOCOL");
    if !env.upload.is_configured() {
        return Err(ConfigError::NoUploadMethod(protocol));
    }
    if !req.dry_run {
        check_firmware(&req.firmware)?;
    }
    openocd::run(&env.upload, &req.uploader_bin, &req.firmware, &protocol, req.verbose, req.dry_run)
}

fn check_firmware(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::Other(format!("Firmware not found: {}", path.display())))
    }
}
