// End-to-end resolution against a fake framework tree.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use nrf5_wiring::packages::{FRAMEWORK_PACKAGE, OPENOCD_PACKAGE};
use nrf5_wiring::resolver::{WARN_NO_LDSCRIPT, WARN_NO_SOFTDEVICE_HEX, WARN_NO_UPLOAD_METHOD};
use nrf5_wiring::{
    configure, BoardConfig, BuildEnv, ConfigError, Define, LinkLib, PackageResolver, Target,
};

struct Packages(HashMap<&'static str, PathBuf>);

impl PackageResolver for Packages {
    fn package_dir(&self, name: &str) -> Option<PathBuf> {
        self.0.get(name).cloned()
    }
    fn package_version(&self, name: &str) -> Option<String> {
        (name == FRAMEWORK_PACKAGE).then(|| "1.600.190830".to_owned())
    }
}

/// A scratch package root holding a framework tree and an OpenOCD dir.
struct Fixture {
    root: PathBuf,
}

impl Fixture {
    fn new(tag: &str) -> Self {
        let root = std::env::temp_dir()
            .join(format!("nrf5-it-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join(FRAMEWORK_PACKAGE).join("cores/nRF5")).unwrap();
        fs::create_dir_all(root.join(OPENOCD_PACKAGE)).unwrap();
        Self { root }
    }

    fn framework(&self) -> PathBuf {
        self.root.join(FRAMEWORK_PACKAGE)
    }

    fn openocd(&self) -> PathBuf {
        self.root.join(OPENOCD_PACKAGE)
    }

    fn softdevice(&self, sd: &str) -> PathBuf {
        self.framework().join("cores/nRF5/SDK/components/softdevice").join(sd)
    }

    fn touch(&self, dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for n in names {
            fs::write(dir.join(n), "").unwrap();
        }
    }

    fn packages(&self) -> Packages {
        Packages(HashMap::from([
            (FRAMEWORK_PACKAGE, self.framework()),
            (OPENOCD_PACKAGE, self.openocd()),
        ]))
    }

    fn resolve(&self, board_json: &str) -> BuildEnv {
        self.resolve_with(board_json, None, &[])
    }

    fn resolve_with(&self, board_json: &str, protocol: Option<&str>, flags: &[String]) -> BuildEnv {
        let board = BoardConfig::from_json_str(board_json, "board.json").unwrap();
        configure(&Target {
            board:           &board,
            framework_dir:   None,
            build_dir:       Path::new("/build"),
            upload_protocol: protocol,
            build_flags:     flags,
        }, &self.packages()).unwrap()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

const NRF52_DK: &str = r#"{
    "name": "Nordic nRF52-DK",
    "build": {
        "core": "nRF5",
        "cpu": "cortex-m4",
        "mcu": "nrf52832",
        "variant": "nRF52DK",
        "ldscript": "nrf52_xxaa.ld",
        "extra_flags": "-DNRF52_S132"
    },
    "debug": {
        "tools": {
            "jlink": { "server": { "package": "tool-openocd", "arguments": ["-f", "target.cfg"] } }
        }
    },
    "upload": { "protocol": "jlink" }
}"#;

#[test]
fn fpu_flags_only_for_cortex_m4() {
    let fx = Fixture::new("fpu");
    let m4 = fx.resolve(r#"{"build": {"core": "nRF5", "cpu": "cortex-m4"}}"#);
    assert!(m4.ccflags.ends_with(&["-mfloat-abi=softfp".to_string(), "-mfpu=fpv4-sp-d16".to_string()]));

    for board in [
        r#"{"build": {"core": "nRF5", "cpu": "cortex-m0"}}"#,
        r#"{"build": {"core": "nRF5", "cpu": "cortex-m4f"}}"#,
        r#"{"build": {"core": "nRF5"}}"#,
    ] {
        let env = fx.resolve(board);
        assert!(!env.ccflags.iter().any(|f| f.starts_with("-mfpu") || f.starts_with("-mfloat-abi")));
    }
}

#[test]
fn mcu_family_define() {
    let fx = Fixture::new("mcu");
    let env = fx.resolve(r#"{"build": {"core": "nRF5", "mcu": "NRF52832"}}"#);
    assert!(env.cppdefines.contains(&Define::flag("NRF52")));

    let env = fx.resolve(r#"{"build": {"core": "nRF5"}}"#);
    assert!(env.cppdefines.contains(&Define::flag("")));
}

#[test]
fn softdevice_headers_define_hex_and_ldscript() {
    let fx = Fixture::new("sd");
    let sd = fx.softdevice("s132");
    fx.touch(&sd.join("hex"), &["s132_nrf52_6.0.0_softdevice.hex", "other.txt"]);
    fx.touch(&sd.join("toolchain/armgcc"), &["armgcc_s132_nrf52832_xxaa.ld", "armgcc_s132_nrf52832_xxab.ld"]);

    let env = fx.resolve(NRF52_DK);

    assert!(env.cpppath.iter().any(|p| p.ends_with("softdevice/s132/headers")));
    assert!(env.cppdefines.contains(&Define::flag("S132")));
    assert_eq!(env.softdevice_hex, vec![sd.join("hex/s132_nrf52_6.0.0_softdevice.hex")]);
    assert_eq!(env.ldscript_path, Some(sd.join("toolchain/armgcc/armgcc_s132_nrf52832_xxaa.ld")));
    assert!(env.warnings().is_empty(), "{:?}", env.warnings());
}

#[test]
fn softdevice_scans_degrade_with_warnings() {
    let fx = Fixture::new("sd-missing");
    fx.touch(&fx.softdevice("s132").join("hex"), &["readme.txt"]);

    let env = fx.resolve(NRF52_DK);

    assert!(env.softdevice_hex.is_empty());
    assert_eq!(env.ldscript_path, Some(PathBuf::from("nrf52_xxaa.ld")));
    assert_eq!(env.warnings(), &[
        WARN_NO_SOFTDEVICE_HEX.to_string(),
        WARN_NO_LDSCRIPT.to_string(),
    ]);
}

#[test]
fn no_softdevice_define_means_no_softdevice_setup() {
    let fx = Fixture::new("no-sd");
    let env = fx.resolve(r#"{"build": {"core": "nRF5", "mcu": "nrf52832", "ldscript": "nrf52_xxaa.ld"}}"#);

    assert!(!env.cpppath.iter().any(|p| p.to_string_lossy().contains("softdevice")));
    assert!(!env.has_define("S132"));
    assert_eq!(env.ldscript_path, Some(PathBuf::from("nrf52_xxaa.ld")));
}

#[test]
fn clock_source_default() {
    let fx = Fixture::new("clock");
    let board = r#"{"build": {"core": "nRF5"}}"#;

    let env = fx.resolve(board);
    assert_eq!(env.cppdefines.iter().filter(|d| d.name() == "USE_LFXO").count(), 1);

    let env = fx.resolve_with(board, None, &["-DUSE_LFXO".to_string()]);
    assert_eq!(env.cppdefines.iter().filter(|d| d.name() == "USE_LFXO").count(), 1);
}

#[test]
fn clock_source_fused_token_is_preserved() {
    // USE_LFRC / USE_LFSYNT are only recognised as the single fused token
    // USE_LFRCUSE_LFSYNT, so a board asking for the RC oscillator still
    // gets USE_LFXO added. Pinned here until the intended behaviour is
    // decided.
    let fx = Fixture::new("clock-fused");
    let board = r#"{"build": {"core": "nRF5"}}"#;

    for requested in ["-DUSE_LFRC", "-DUSE_LFSYNT"] {
        let env = fx.resolve_with(board, None, &[requested.to_string()]);
        assert!(env.has_define("USE_LFXO"), "{requested}");
    }
    let env = fx.resolve_with(board, None, &["-DUSE_LFRCUSE_LFSYNT".to_string()]);
    assert!(!env.has_define("USE_LFXO"));
}

#[test]
fn upload_args_for_mapped_protocol() {
    let fx = Fixture::new("upload");
    let env = fx.resolve(NRF52_DK);

    assert_eq!(env.upload.uploader, "openocd");
    assert_eq!(env.upload.command, "\"$UPLOADER\" $UPLOADERFLAGS");
    assert_eq!(env.upload.flags, vec![
        "-s".to_string(),
        fx.openocd().display().to_string(),
        "-f".to_string(),
        "target.cfg".to_string(),
        "-c".to_string(),
        "program {$SOURCE} verify reset; shutdown;".to_string(),
    ]);
}

#[test]
fn upload_args_empty_for_unmapped_protocol() {
    let fx = Fixture::new("upload-missing");
    let env = fx.resolve_with(NRF52_DK, Some("blackmagic"), &[]);

    assert!(env.upload.flags.is_empty());
    assert!(env.warnings().contains(&WARN_NO_UPLOAD_METHOD.to_string()));
    assert_eq!(env.upload.uploader, "openocd");
}

#[test]
fn library_requests_variant_then_core() {
    let fx = Fixture::new("libs");

    let env = fx.resolve(NRF52_DK);
    let names: Vec<&str> = env.libs.iter().map(LinkLib::name).collect();
    assert_eq!(names, vec!["FrameworkArduinoVariant", "FrameworkArduino", "m"]);
    assert_eq!(env.library_builds().count(), 2);
    assert!(env.cpppath.contains(&fx.framework().join("variants/nRF52DK")));

    let env = fx.resolve(r#"{"build": {"core": "nRF5"}}"#);
    let builds: Vec<_> = env.library_builds().collect();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].name, "FrameworkArduino");
    assert_eq!(builds[0].src_dir, fx.framework().join("cores/nRF5"));
}

#[test]
fn framework_version_is_recorded() {
    let fx = Fixture::new("version");
    let env = fx.resolve(NRF52_DK);
    assert_eq!(env.framework_version.as_deref(), Some("1.600.190830"));
}

#[test]
fn missing_framework_aborts() {
    let board = BoardConfig::from_json_str(NRF52_DK, "board.json").unwrap();
    let target = Target {
        board:           &board,
        framework_dir:   Some(Path::new("/no/such/framework")),
        build_dir:       Path::new("/build"),
        upload_protocol: None,
        build_flags:     &[],
    };
    let err = configure(&target, &Packages(HashMap::new())).unwrap_err();
    assert!(matches!(err, ConfigError::FrameworkNotFound(_)));
}
