// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-wiring :: resolver  —  board → build environment
//
//  Steps, in order:
//    1. framework directory must exist            (fatal otherwise)
//    2. baseline C / C++ flags and defines
//    3. core + SDK include paths, toolchain lib path, library sources
//    4. fixed linker flags
//    5. FPU flags for cortex-m4
//    6. MCU family define
//    7. softdevice detection
//    8. softdevice headers, .hex images, linker script
//    9. default low-frequency clock source
//   10. OpenOCD upload command
//   11. framework core (+ variant) library builds
//
//  Steps 8 and 10 degrade with a warning instead of failing.
// ─────────────────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};

use crate::board::BoardConfig;
use crate::env::{BuildEnv, Define, LibraryBuild, LinkLib};
use crate::error::{ConfigError, Result};
use crate::packages::{PackageResolver, FRAMEWORK_PACKAGE, OPENOCD_PACKAGE};
use crate::softdevice::{mcu_family, Softdevice};
use crate::upload::{UploadSpec, UPLOADER, UPLOAD_COMMAND};

pub const CORE_LIBRARY:    &str = "FrameworkArduino";
pub const VARIANT_LIBRARY: &str = "FrameworkArduinoVariant";

/// For compatibility with sketches written for AVR @ 16 MHz (see SPI lib).
const F_CPU: &str = "16000000L";

const LINK_FLAGS: [&str; 6] = [
    "--specs=nano.specs",
    "--specs=nosys.specs",
    "-Wl,--check-sections",
    "-Wl,--unresolved-symbols=report-all",
    "-Wl,--warn-common",
    "-Wl,--warn-section-align",
];

const FPU_FLAGS: [&str; 2] = ["-mfloat-abi=softfp", "-mfpu=fpv4-sp-d16"];

/// Clock source defines that suppress the `USE_LFXO` default.
/// NOTE: `USE_LFRC` and `USE_LFSYNT` are fused into one token here, so
/// either of them alone does not suppress the default. Kept as shipped;
/// see `clock_tokens_are_fused` in the tests.
const CLOCK_SOURCES: [&str; 2] = ["USE_LFXO", concat!("USE_LFRC", "USE_LFSYNT")];

pub const WARN_NO_SOFTDEVICE_HEX: &str = "Cannot find an appropriate softdevice binary!";
pub const WARN_NO_LDSCRIPT: &str =
    "Cannot find an appropriate linker script for the required softdevice!";
pub const WARN_NO_UPLOAD_METHOD: &str = "Cannot find an appropriate upload method!";

/// Configures a `BuildEnv` for one board of the Arduino nRF5 framework.
pub struct BoardFlagResolver<'a, P: PackageResolver> {
    framework_dir:     PathBuf,
    framework_version: Option<String>,
    board:    &'a BoardConfig,
    packages: &'a P,
}

impl<'a, P: PackageResolver> BoardFlagResolver<'a, P> {
    pub fn new(
        framework_dir: impl Into<PathBuf>,
        framework_version: Option<String>,
        board: &'a BoardConfig,
        packages: &'a P,
    ) -> Self {
        Self {
            framework_dir: framework_dir.into(),
            framework_version,
            board,
            packages,
        }
    }

    /// Take the framework location and version from the package resolver.
    pub fn from_packages(board: &'a BoardConfig, packages: &'a P) -> Result<Self> {
        let dir = packages
            .package_dir(FRAMEWORK_PACKAGE)
            .ok_or_else(|| ConfigError::PackageNotFound(FRAMEWORK_PACKAGE.into()))?;
        let version = packages.package_version(FRAMEWORK_PACKAGE);
        Ok(Self::new(dir, version, board, packages))
    }

    pub fn framework_dir(&self) -> &Path {
        &self.framework_dir
    }

    /// Run every step against `env` and hand it back.
    pub fn resolve(&self, mut env: BuildEnv) -> Result<BuildEnv> {
        if !self.framework_dir.is_dir() {
            return Err(ConfigError::FrameworkNotFound(
                self.framework_dir.display().to_string(),
            ));
        }
        env.framework_version = self.framework_version.clone();

        self.apply_baseline(&mut env);
        self.apply_paths(&mut env);
        env.append_linkflags(LINK_FLAGS);
        self.apply_fpu(&mut env);
        env.append_defines([Define::flag(mcu_define(self.board.mcu()))]);

        let defines = env.flat_defines();
        if let Some(sd) = Softdevice::detect(&defines) {
            self.apply_softdevice(&mut env, sd);
        }
        apply_clock_source(&mut env, &defines);

        self.apply_upload(&mut env);
        self.apply_libraries(&mut env);
        Ok(env)
    }

    // ── Paths ────────────────────────────────────────────────────────────────

    fn core_dir(&self) -> PathBuf {
        self.framework_dir.join("cores").join(self.board.core())
    }

    fn sdk_components(&self) -> PathBuf {
        self.core_dir().join("SDK").join("components")
    }

    // ── Steps ────────────────────────────────────────────────────────────────

    fn apply_baseline(&self, env: &mut BuildEnv) {
        env.append_cflags(["-std=gnu11"])
            .append_ccflags(["--param", "max-inline-insns-single=500"])
            .append_cxxflags(["-std=gnu++11", "-fno-threadsafe-statics"])
            .append_defines([
                Define::value("F_CPU", F_CPU),
                Define::flag("ARDUINO_ARCH_NRF5"),
                Define::flag("NRF5"),
            ]);
    }

    fn apply_paths(&self, env: &mut BuildEnv) {
        let components = self.sdk_components();
        env.append_libpath([components.join("toolchain").join("gcc")])
            .append_cpppath([
                self.core_dir(),
                components.join("drivers_nrf").join("delay"),
                components.join("device"),
                components.join("toolchain"),
                components.join("toolchain").join("CMSIS").join("Include"),
            ])
            .append_libsource_dirs([self.framework_dir.join("libraries")]);
    }

    fn apply_fpu(&self, env: &mut BuildEnv) {
        if self.board.cpu() == Some("cortex-m4") {
            env.append_ccflags(FPU_FLAGS);
        }
    }

    fn apply_softdevice(&self, env: &mut BuildEnv, sd: Softdevice) {
        let root = sd.root(&self.sdk_components());

        env.append_cpppath([root.join("headers")])
            .append_defines([Define::flag(sd.define())]);

        let images = sd.find_hex(&root.join("hex"));
        if images.is_empty() {
            env.warn(WARN_NO_SOFTDEVICE_HEX);
        }
        env.softdevice_hex.extend(images);

        let ldscript_dir = root.join("toolchain").join("armgcc");
        let found = self.board
            .ldscript()
            .and_then(mcu_family)
            .and_then(|family| sd.find_ldscript(&ldscript_dir, family));
        match found {
            Some(path) => env.ldscript_path = Some(path),
            None => env.warn(WARN_NO_LDSCRIPT),
        }
    }

    fn apply_upload(&self, env: &mut BuildEnv) {
        let protocol = env.subst("$UPLOAD_PROTOCOL");
        let flags = match self.board.debug_tool(&protocol) {
            Some(tool) => {
                let openocd = self.packages.package_dir(OPENOCD_PACKAGE);
                UploadSpec::openocd_flags(openocd.as_deref(), tool)
            }
            None => {
                env.warn(WARN_NO_UPLOAD_METHOD);
                Vec::new()
            }
        };

        env.libs = vec![LinkLib::Named("m".into())];
        env.upload = UploadSpec {
            uploader: UPLOADER.into(),
            flags,
            command:  UPLOAD_COMMAND.into(),
        };
    }

    fn apply_libraries(&self, env: &mut BuildEnv) {
        let mut libs = Vec::with_capacity(2);

        if let Some(variant) = self.board.variant() {
            let variant_dir = self.framework_dir.join("variants").join(variant);
            env.append_cpppath([variant_dir.clone()]);
            libs.push(LinkLib::Build(library_build(env, VARIANT_LIBRARY, variant_dir)));
        }
        libs.push(LinkLib::Build(library_build(env, CORE_LIBRARY, self.core_dir())));

        env.prepend_libs(libs);
    }
}

/// Upper-cased first five characters of the board MCU, e.g. `NRF52` for
/// `nrf52832`. Shorter or missing MCU names give what is there.
pub fn mcu_define(mcu: Option<&str>) -> String {
    mcu.unwrap_or_default().chars().take(5).collect::<String>().to_uppercase()
}

fn apply_clock_source(env: &mut BuildEnv, defines: &[String]) {
    if !defines.iter().any(|d| CLOCK_SOURCES.contains(&d.as_str())) {
        env.append_defines([Define::flag("USE_LFXO")]);
    }
}

fn library_build(env: &BuildEnv, name: &str, src_dir: PathBuf) -> LibraryBuild {
    LibraryBuild {
        name: name.to_owned(),
        src_dir,
        build_dir: PathBuf::from(env.subst(&format!("$BUILD_DIR/{name}"))),
    }
}
