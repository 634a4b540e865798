// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-flash :: flash :: openocd  —  SWD programmer
// ─────────────────────────────────────────────────────────────────────────────

use std::path::Path;
use std::process::Command;

use colored::Colorize;

use nrf5_wiring::error::{ConfigError, Result};
use nrf5_wiring::UploadSpec;

/// Run the resolved upload command against `firmware`. `uploader_bin` is
/// the packaged OpenOCD binary; empty means `spec.uploader` from PATH.
pub fn run(
    spec: &UploadSpec,
    uploader_bin: &Path,
    firmware: &Path,
    protocol: &str,
    verbose: bool,
    dry_run: bool,
) -> Result<()> {
    if verbose || dry_run {
        println!("  {} {}", "$".dimmed(), spec.command_line(firmware));
    }
    if dry_run {
        return Ok(());
    }

    let argv = spec.argv(firmware);
    let Some((name, args)) = argv.split_first() else {
        return Err(ConfigError::NoUploadMethod(protocol.to_owned()));
    };
    let program = if uploader_bin.as_os_str().is_empty() {
        name.clone()
    } else {
        uploader_bin.display().to_string()
    };

    let out = Command::new(&program).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::ToolchainNotFound(format!(
                "{program} — install tool-openocd or put it on PATH"
            ))
        } else {
            ConfigError::Io(e)
        }
    })?;

    // OpenOCD logs to stderr even on success.
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    if verbose {
        for line in stderr.lines() {
            eprintln!("  {}", line.dimmed());
        }
    }

    if !out.status.success() {
        let stdout = String::from_utf8_lossy(&out.stdout).to_string();
        return Err(ConfigError::UploadFailed {
            protocol: protocol.to_owned(),
            output:   format!("{}\n{}", stderr, stdout).trim().to_owned(),
        });
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use nrf5_wiring::packages::{PackageResolver, PackageStore, OPENOCD_PACKAGE};
    use nrf5_wiring::upload::{UPLOADER, UPLOAD_COMMAND};

    /// A package root with `tool-openocd/bin/openocd` running `body`.
    fn fake_openocd(tag: &str, body: &str) -> PathBuf {
        let root = std::env::temp_dir()
            .join(format!("nrf5-openocd-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        let bin = root.join(OPENOCD_PACKAGE).join("bin");
        fs::create_dir_all(&bin).unwrap();
        let exe = bin.join("openocd");
        fs::write(&exe, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        root
    }

    fn spec(root: &Path) -> UploadSpec {
        UploadSpec {
            uploader: UPLOADER.into(),
            flags:    vec!["-s".into(), root.join(OPENOCD_PACKAGE).display().to_string()],
            command:  UPLOAD_COMMAND.into(),
        }
    }

    #[test]
    fn runs_packaged_binary() {
        let root = fake_openocd("ok", "exit 0");
        let store = PackageStore::new(&root);
        let bin = store.openocd_bin(None);
        assert!(bin.ends_with("tool-openocd/bin/openocd"));

        run(&spec(&root), &bin, Path::new("fw.hex"), "jlink", false, false).unwrap();

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn failing_programmer_reports_output() {
        let root = fake_openocd("fail", "echo 'Error: no device found' >&2; exit 1");
        let bin = PackageStore::new(&root).openocd_bin(None);

        let err = run(&spec(&root), &bin, Path::new("fw.hex"), "jlink", false, false).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UploadFailed { ref protocol, ref output }
                if protocol == "jlink" && output.contains("no device found")
        ));

        fs::remove_dir_all(&root).unwrap();
    }
}
