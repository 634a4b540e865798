// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-wiring :: error
// ─────────────────────────────────────────────────────────────────────────────

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Framework directory not found: {0}\n  Hint: install framework-arduinonordicnrf5 or set framework_dir in nrf5.toml")]
    FrameworkNotFound(String),

    #[error("Package '{0}' not found in any package root\n  Hint: pass --packages-dir or set NRF5_PACKAGES_DIR")]
    PackageNotFound(String),

    #[error("Unknown board '{0}' — run `nrf5-flash boards` for the full list")]
    BoardNotFound(String),

    #[error("Invalid board manifest {path}:\n  {reason}")]
    InvalidBoard { path: String, reason: String },

    #[error("Invalid project config {path}:\n  {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("Toolchain not found: {0}\n  Hint: install toolchain-gccarmnoneeabi or put arm-none-eabi-gcc on PATH")]
    ToolchainNotFound(String),

    #[error("Compilation failed:\n{output}")]
    CompileFailed { output: String },

    #[error("No upload method configured for protocol '{0}'\n  Hint: pick one of the board's debug.tools with --protocol")]
    NoUploadMethod(String),

    #[error("Upload via {protocol} failed:\n{output}")]
    UploadFailed { protocol: String, output: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
