// ─────────────────────────────────────────────────────────────────────────────
//  nrf5_wiring  —  public library API
// ─────────────────────────────────────────────────────────────────────────────

pub mod board;
pub mod env;
pub mod error;
pub mod packages;
pub mod resolver;
pub mod softdevice;
pub mod upload;

pub use board::BoardConfig;
pub use env::{BuildEnv, Define, LibraryBuild, LinkLib};
pub use error::{ConfigError, Result};
pub use packages::{PackageResolver, PackageStore};
pub use resolver::BoardFlagResolver;
pub use softdevice::Softdevice;
pub use upload::UploadSpec;

// ── One-shot ──────────────────────────────────────────────────────────────────

/// Everything needed to configure one board build.
///
/// ```no_run
/// use nrf5_wiring::{configure, BoardConfig, PackageStore, Target};
/// use std::path::Path;
///
/// let board = BoardConfig::find(Path::new("boards"), "nrf52_dk").unwrap();
/// let packages = PackageStore::discover(None);
/// let env = configure(&Target {
///     board:           &board,
///     framework_dir:   None,
///     build_dir:       Path::new(".build"),
///     upload_protocol: None,
///     build_flags:     &[],
/// }, &packages).unwrap();
///
/// for w in env.warnings() {
///     eprintln!("warning: {w}");
/// }
/// ```
pub struct Target<'a> {
    pub board:           &'a BoardConfig,
    /// Overrides the framework package location.
    pub framework_dir:   Option<&'a std::path::Path>,
    pub build_dir:       &'a std::path::Path,
    /// Overrides the board's default `upload.protocol`.
    pub upload_protocol: Option<&'a str>,
    pub build_flags:     &'a [String],
}

/// Seed a `BuildEnv` for `target` and run the resolver over it.
pub fn configure<P: PackageResolver>(target: &Target<'_>, packages: &P) -> Result<BuildEnv> {
    let env = BuildEnv::for_board(
        target.board,
        target.build_dir,
        target.upload_protocol,
        target.build_flags,
    );

    let resolver = match target.framework_dir {
        Some(dir) => BoardFlagResolver::new(
            dir,
            packages.package_version(crate::packages::FRAMEWORK_PACKAGE),
            target.board,
            packages,
        ),
        None => BoardFlagResolver::from_packages(target.board, packages)?,
    };
    resolver.resolve(env)
}
