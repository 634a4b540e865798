// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-wiring :: env  —  the build environment being configured
//
//  `BuildEnv` is an explicit builder threaded through every resolver step.
//  It collects flags, defines, search paths, link libraries, the upload
//  command and any non-fatal warnings. Nothing here touches the filesystem.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::board::BoardConfig;
use crate::upload::UploadSpec;

/// One preprocessor define: `NAME` or `NAME=VALUE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Define {
    Flag(String),
    Value(String, String),
}

impl Define {
    pub fn flag(name: impl Into<String>) -> Self {
        Define::Flag(name.into())
    }

    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define::Value(name.into(), value.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Define::Flag(n) | Define::Value(n, _) => n,
        }
    }

    /// Parse the text after `-D`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((name, value)) => Define::value(name, value),
            None => Define::flag(raw),
        }
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Define::Flag(n) => write!(f, "{n}"),
            Define::Value(n, v) => write!(f, "{n}={v}"),
        }
    }
}

/// A request to compile every source under `src_dir` into `lib<name>.a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryBuild {
    pub name:      String,
    pub src_dir:   PathBuf,
    pub build_dir: PathBuf,
}

impl LibraryBuild {
    pub fn archive_path(&self) -> PathBuf {
        self.build_dir.join(format!("lib{}.a", self.name))
    }
}

/// An entry of the link library list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LinkLib {
    Build(LibraryBuild),
    Named(String),
}

impl LinkLib {
    pub fn name(&self) -> &str {
        match self {
            LinkLib::Build(b) => &b.name,
            LinkLib::Named(n) => n,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildEnv {
    /// C-only compiler flags.
    pub cflags:         Vec<String>,
    /// Flags shared by C and C++ compilation.
    pub ccflags:        Vec<String>,
    /// C++-only compiler flags.
    pub cxxflags:       Vec<String>,
    pub cppdefines:     Vec<Define>,
    pub cpppath:        Vec<PathBuf>,
    pub libpath:        Vec<PathBuf>,
    pub linkflags:      Vec<String>,
    pub libsource_dirs: Vec<PathBuf>,
    pub ldscript_path:  Option<PathBuf>,
    pub softdevice_hex: Vec<PathBuf>,
    pub libs:           Vec<LinkLib>,
    pub upload:         UploadSpec,
    pub framework_version: Option<String>,
    vars:     BTreeMap<String, String>,
    warnings: Vec<String>,
}

impl BuildEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an environment the way the hosting build tool does before the
    /// framework script runs: linker script from the manifest, board and
    /// project flags parsed, `BUILD_DIR` and `UPLOAD_PROTOCOL` set.
    pub fn for_board(
        board: &BoardConfig,
        build_dir: &Path,
        upload_protocol: Option<&str>,
        build_flags: &[String],
    ) -> Self {
        let mut env = Self::new();
        env.ldscript_path = board.ldscript().map(PathBuf::from);
        if let Some(extra) = &board.build.extra_flags {
            env.parse_flags(extra);
        }
        for flags in build_flags {
            env.parse_flags(flags);
        }
        env.set_var("BUILD_DIR", build_dir.display().to_string());
        let protocol = upload_protocol.or_else(|| board.default_protocol()).unwrap_or_default();
        env.set_var("UPLOAD_PROTOCOL", protocol);
        env
    }

    /// Split raw compiler flags: `-D` → defines, `-I` → include paths,
    /// everything else → common compiler flags. `-D NAME` and `-I dir`
    /// may be written as two words; double quotes group a word.
    pub fn parse_flags(&mut self, raw: &str) {
        let mut words = split_words(raw).into_iter();
        while let Some(word) = words.next() {
            if let Some(def) = word.strip_prefix("-D") {
                let def = if def.is_empty() { words.next().unwrap_or_default() } else { def.to_owned() };
                if !def.is_empty() {
                    self.cppdefines.push(Define::parse(&def));
                }
            } else if let Some(inc) = word.strip_prefix("-I") {
                let inc = if inc.is_empty() { words.next().unwrap_or_default() } else { inc.to_owned() };
                if !inc.is_empty() {
                    self.cpppath.push(PathBuf::from(inc));
                }
            } else {
                self.ccflags.push(word);
            }
        }
    }

    // ── Appenders ────────────────────────────────────────────────────────────

    pub fn append_cflags<I, S>(&mut self, flags: I) -> &mut Self
    where I: IntoIterator<Item = S>, S: Into<String> {
        self.cflags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn append_ccflags<I, S>(&mut self, flags: I) -> &mut Self
    where I: IntoIterator<Item = S>, S: Into<String> {
        self.ccflags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn append_cxxflags<I, S>(&mut self, flags: I) -> &mut Self
    where I: IntoIterator<Item = S>, S: Into<String> {
        self.cxxflags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn append_linkflags<I, S>(&mut self, flags: I) -> &mut Self
    where I: IntoIterator<Item = S>, S: Into<String> {
        self.linkflags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn append_defines(&mut self, defines: impl IntoIterator<Item = Define>) -> &mut Self {
        self.cppdefines.extend(defines);
        self
    }

    pub fn append_cpppath(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> &mut Self {
        self.cpppath.extend(paths);
        self
    }

    pub fn append_libpath(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> &mut Self {
        self.libpath.extend(paths);
        self
    }

    pub fn append_libsource_dirs(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> &mut Self {
        self.libsource_dirs.extend(paths);
        self
    }

    /// Insert `libs` ahead of the existing link libraries, keeping their order.
    pub fn prepend_libs(&mut self, libs: Vec<LinkLib>) -> &mut Self {
        let tail = std::mem::take(&mut self.libs);
        self.libs = libs;
        self.libs.extend(tail);
        self
    }

    // ── Defines ──────────────────────────────────────────────────────────────

    /// Defines flattened to single tokens: `NAME=VALUE` contributes both
    /// `NAME` and `VALUE`.
    pub fn flat_defines(&self) -> Vec<String> {
        let mut flat = Vec::with_capacity(self.cppdefines.len());
        for d in &self.cppdefines {
            match d {
                Define::Flag(n) => flat.push(n.clone()),
                Define::Value(n, v) => {
                    flat.push(n.clone());
                    flat.push(v.clone());
                }
            }
        }
        flat
    }

    pub fn has_define(&self, name: &str) -> bool {
        self.cppdefines.iter().any(|d| d.name() == name)
    }

    // ── Variables ────────────────────────────────────────────────────────────

    pub fn set_var(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_owned(), value.into());
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Expand `$NAME` and `${NAME}` from the environment's variables.
    /// Unknown variables expand to nothing; `$$` is a literal `$`.
    pub fn subst(&self, template: &str) -> String {
        subst_with(template, |name| self.var(name).map(str::to_owned))
    }

    // ── Warnings ─────────────────────────────────────────────────────────────

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    // ── Rendering ────────────────────────────────────────────────────────────

    pub fn library_builds(&self) -> impl Iterator<Item = &LibraryBuild> {
        self.libs.iter().filter_map(|l| match l {
            LinkLib::Build(b) => Some(b),
            LinkLib::Named(_) => None,
        })
    }

    /// `-D` arguments. Empty define tokens stay in the define set but are
    /// never rendered.
    pub fn define_args(&self) -> Vec<String> {
        self.cppdefines
            .iter()
            .filter(|d| !d.name().is_empty())
            .map(|d| format!("-D{d}"))
            .collect()
    }

    pub fn include_args(&self) -> Vec<String> {
        self.cpppath.iter().map(|p| format!("-I{}", p.display())).collect()
    }

    /// `-L` search paths followed by `-l` for every link library.
    pub fn lib_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.libpath
            .iter()
            .map(|p| format!("-L{}", p.display()))
            .collect();
        for lib in &self.libs {
            if let LinkLib::Build(b) = lib {
                args.push(format!("-L{}", b.build_dir.display()));
            }
        }
        args.extend(self.libs.iter().map(|l| format!("-l{}", l.name())));
        args
    }
}

/// Whitespace-separated words; `"..."` keeps spaces inside a word and
/// `\"` is a literal quote.
fn split_words(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.clone().next() == Some('"') => {
                word.push('"');
                chars.next();
                in_word = true;
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                word.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(word);
    }
    words
}

/// `$NAME` / `${NAME}` expansion with a caller-supplied lookup.
pub fn subst_with(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if closed {
                    out.push_str(&lookup(&name).unwrap_or_default());
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(n) if n == '_' || n.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n == '_' || n.is_ascii_alphanumeric() {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&lookup(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn board(json: &str) -> BoardConfig {
        BoardConfig::from_json_str(json, "test.json").unwrap()
    }

    #[test]
    fn flatten_splits_name_value_pairs() {
        let mut env = BuildEnv::new();
        env.append_defines([Define::value("F_CPU", "16000000L"), Define::flag("NRF5")]);
        assert_eq!(env.flat_defines(), vec!["F_CPU", "16000000L", "NRF5"]);
        assert!(env.has_define("F_CPU"));
        assert!(!env.has_define("16000000L"));
    }

    #[test]
    fn parse_flags_sorts_tokens() {
        let mut env = BuildEnv::new();
        env.parse_flags("-DNRF52_S132 -DCFG_DEBUG=2 -Iinclude -Os");
        assert_eq!(env.cppdefines, vec![
            Define::flag("NRF52_S132"),
            Define::value("CFG_DEBUG", "2"),
        ]);
        assert_eq!(env.cpppath, vec![PathBuf::from("include")]);
        assert_eq!(env.ccflags, vec!["-Os"]);
    }

    #[test]
    fn parse_flags_accepts_split_and_quoted_words() {
        let mut env = BuildEnv::new();
        env.parse_flags(r#"-D NRF52_S132 -DNAME="Nordic DK" -I "sdk dir" -DQ=\"x\" -D"#);
        assert_eq!(env.cppdefines, vec![
            Define::flag("NRF52_S132"),
            Define::value("NAME", "Nordic DK"),
            Define::value("Q", "\"x\""),
        ]);
        assert_eq!(env.cpppath, vec![PathBuf::from("sdk dir")]);
        assert!(env.ccflags.is_empty());
    }

    #[test]
    fn seeded_from_board_and_project() {
        let b = board(r#"{
            "build": { "core": "nRF5", "ldscript": "nrf52_xxaa.ld", "extra_flags": "-DNRF52_S132" },
            "upload": { "protocol": "jlink" }
        }"#);

        let env = BuildEnv::for_board(&b, Path::new(".build"), None, &["-DUSE_LFRC".to_string()]);
        assert_eq!(env.ldscript_path, Some(PathBuf::from("nrf52_xxaa.ld")));
        assert_eq!(env.flat_defines(), vec!["NRF52_S132", "USE_LFRC"]);
        assert_eq!(env.subst("$UPLOAD_PROTOCOL"), "jlink");
        assert_eq!(env.subst("${BUILD_DIR}/FrameworkArduino"), ".build/FrameworkArduino");

        let env = BuildEnv::for_board(&b, Path::new(".build"), Some("stlink"), &[]);
        assert_eq!(env.subst("$UPLOAD_PROTOCOL"), "stlink");
    }

    #[test]
    fn subst_handles_braces_unknowns_and_escapes() {
        let mut env = BuildEnv::new();
        env.set_var("SOURCE", "fw.hex");
        assert_eq!(env.subst("program {$SOURCE} verify"), "program {fw.hex} verify");
        assert_eq!(env.subst("$MISSING-x"), "-x");
        assert_eq!(env.subst("cost $$5"), "cost $5");
        assert_eq!(env.subst("${SOURCE"), "${SOURCE");
        assert_eq!(env.subst("trailing $"), "trailing $");
    }

    #[test]
    fn prepend_keeps_order_and_renders_link_args() {
        let mut env = BuildEnv::new();
        env.libs = vec![LinkLib::Named("m".into())];
        env.libpath.push(PathBuf::from("/sdk/gcc"));
        let variant = LibraryBuild {
            name: "FrameworkArduinoVariant".into(),
            src_dir: PathBuf::from("/fw/variants/x"),
            build_dir: PathBuf::from("/b/FrameworkArduinoVariant"),
        };
        let core = LibraryBuild {
            name: "FrameworkArduino".into(),
            src_dir: PathBuf::from("/fw/cores/nRF5"),
            build_dir: PathBuf::from("/b/FrameworkArduino"),
        };
        env.prepend_libs(vec![LinkLib::Build(variant), LinkLib::Build(core)]);

        let names: Vec<&str> = env.libs.iter().map(LinkLib::name).collect();
        assert_eq!(names, vec!["FrameworkArduinoVariant", "FrameworkArduino", "m"]);
        assert_eq!(env.lib_args(), vec![
            "-L/sdk/gcc",
            "-L/b/FrameworkArduinoVariant",
            "-L/b/FrameworkArduino",
            "-lFrameworkArduinoVariant",
            "-lFrameworkArduino",
            "-lm",
        ]);
    }

    #[test]
    fn empty_define_is_kept_but_not_rendered() {
        let mut env = BuildEnv::new();
        env.append_defines([Define::flag(""), Define::value("F_CPU", "16000000L")]);
        assert_eq!(env.cppdefines.len(), 2);
        assert_eq!(env.define_args(), vec!["-DF_CPU=16000000L"]);
    }
}
