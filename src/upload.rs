// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-wiring :: upload  —  OpenOCD upload command
// ─────────────────────────────────────────────────────────────────────────────

use std::path::Path;

use serde::Serialize;

use crate::board::DebugTool;
use crate::env::subst_with;

pub const UPLOADER: &str = "openocd";

/// Command template; `$UPLOADERFLAGS` expands to the space-joined flags.
pub const UPLOAD_COMMAND: &str = "\"$UPLOADER\" $UPLOADERFLAGS";

/// OpenOCD commands that flash `$SOURCE`, verify it, reset the target
/// and exit.
pub const PROGRAM_COMMAND: &str = "program {$SOURCE} verify reset; shutdown;";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSpec {
    pub uploader: String,
    pub flags:    Vec<String>,
    pub command:  String,
}

impl UploadSpec {
    /// Flags for driving `tool` through OpenOCD: scripts dir, the tool's
    /// server arguments, then the program sequence.
    pub fn openocd_flags(openocd_dir: Option<&Path>, tool: &DebugTool) -> Vec<String> {
        let mut flags = vec![
            "-s".to_owned(),
            openocd_dir.map(|d| d.display().to_string()).unwrap_or_default(),
        ];
        if let Some(server) = &tool.server {
            flags.extend(server.arguments.iter().cloned());
        }
        flags.push("-c".to_owned());
        flags.push(PROGRAM_COMMAND.to_owned());
        flags
    }

    /// An upload without flags cannot program anything.
    pub fn is_configured(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Program and arguments with `$SOURCE` bound to `source`.
    pub fn argv(&self, source: &Path) -> Vec<String> {
        let source = source.display().to_string();
        let lookup = |name: &str| (name == "SOURCE").then(|| source.clone());

        let mut argv = Vec::with_capacity(self.flags.len() + 1);
        argv.push(self.uploader.clone());
        argv.extend(self.flags.iter().map(|f| subst_with(f, lookup)));
        argv
    }

    /// The command template rendered as one shell-style line.
    pub fn command_line(&self, source: &Path) -> String {
        let source = source.display().to_string();
        let flags = self.flags
            .iter()
            .map(|f| quote(&subst_with(f, |n| (n == "SOURCE").then(|| source.clone()))))
            .collect::<Vec<_>>()
            .join(" ");

        subst_with(&self.command, |name| match name {
            "UPLOADER"      => Some(self.uploader.clone()),
            "UPLOADERFLAGS" => Some(flags.clone()),
            "SOURCE"        => Some(source.clone()),
            _               => None,
        })
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_owned()
    }
}
