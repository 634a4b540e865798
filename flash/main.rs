// ─────────────────────────────────────────────────────────────────────────────
//  nrf5-flash  —  Arduino nRF5 build configuration & upload
//
//  Resolves a board manifest into compiler / linker flags for the Arduino
//  nRF5 framework, builds the framework libraries with arm-none-eabi-gcc
//  and uploads firmware through OpenOCD.
//
//  USAGE
//  ─────
//    nrf5-flash resolve  --board nrf52_dk  [--json]
//    nrf5-flash build    --board nrf52_dk
//    nrf5-flash upload   --board nrf52_dk  --firmware .build/firmware.hex
//    nrf5-flash boards
//    nrf5-flash packages
// ─────────────────────────────────────────────────────────────────────────────

mod compile;
mod config;
mod flash;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use nrf5_wiring::error::ConfigError;
use nrf5_wiring::packages::{FRAMEWORK_PACKAGE, OPENOCD_PACKAGE, TOOLCHAIN_PACKAGE};
use nrf5_wiring::{configure, BoardConfig, BuildEnv, PackageResolver, PackageStore, Target};

use compile::{compile, CompileRequest};
use config::{ProjectConfig, DEFAULT_CONFIG};
use flash::{flash, FlashRequest};

// ─────────────────────────────────────────────────────────────────────────────
//  CLI definition (clap derive)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "nrf5-flash",
    version = env!("CARGO_PKG_VERSION"),
    about   = "Arduino nRF5 build configuration, library builds and OpenOCD upload",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Project config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Platform package root  (default: NRF5_PACKAGES_DIR or ~/.platformio/packages)
    #[arg(long, global = true)]
    packages_dir: Option<PathBuf>,

    /// Suppress status output
    #[arg(long, global = true)]
    quiet: bool,

    /// Print every compiler / uploader command
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the resolved build environment for a board
    Resolve {
        #[command(flatten)]
        target: TargetArgs,

        /// Emit JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Build the framework core (and board variant) libraries
    Build(TargetArgs),
    /// Upload firmware with the board's OpenOCD configuration
    Upload(UploadArgs),
    /// List board manifests
    Boards,
    /// Print resolved package locations
    Packages,
}

#[derive(Args)]
struct TargetArgs {
    /// Board ID  (manifest <boards_dir>/<id>.json)
    #[arg(long, short = 'b')]
    board: Option<String>,

    /// Upload protocol  (default: the board's upload.protocol)
    #[arg(long)]
    protocol: Option<String>,

    /// Build output directory
    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Extra build flags, e.g. -DNRF52_S132  (repeatable)
    #[arg(long = "flag", allow_hyphen_values = true)]
    flags: Vec<String>,
}

#[derive(Args)]
struct UploadArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Firmware image (.hex / .elf / .bin)
    #[arg(long, short = 'f')]
    firmware: PathBuf,

    /// Print the upload command without running it
    #[arg(long)]
    dry_run: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
//  Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        render_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = ProjectConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let packages = PackageStore::discover(
        cli.packages_dir.as_deref().or(cfg.packages_dir.as_deref()),
    );
    let ctx = Ctx { cfg, packages, verbose: cli.verbose, quiet: cli.quiet };

    match cli.command {
        Cmd::Resolve { target, json } => cmd_resolve(&ctx, &target, json),
        Cmd::Build(target)            => cmd_build(&ctx, &target),
        Cmd::Upload(args)             => cmd_upload(&ctx, &args),
        Cmd::Boards                   => cmd_boards(&ctx),
        Cmd::Packages                 => { cmd_packages(&ctx); Ok(()) }
    }
}

struct Ctx {
    cfg:      ProjectConfig,
    packages: PackageStore,
    verbose:  bool,
    quiet:    bool,
}

impl Ctx {
    fn board(&self, args: &TargetArgs) -> anyhow::Result<BoardConfig> {
        let id = args.board.as_deref()
            .or(self.cfg.board.as_deref())
            .context("no board selected — pass --board or set `board` in nrf5.toml")?;
        Ok(BoardConfig::find(&self.cfg.boards_dir(), id)?)
    }

    /// Load the board and resolve its build environment.
    fn resolve(&self, args: &TargetArgs) -> anyhow::Result<(BoardConfig, BuildEnv)> {
        let board = self.board(args)?;
        let build_dir = args.build_dir.clone().unwrap_or_else(|| self.cfg.build_dir());
        let mut flags = self.cfg.build_flags.clone();
        flags.extend(args.flags.iter().cloned());

        if !self.quiet {
            println!(
                "{} {} {}",
                "Resolving".cyan().bold(),
                format!("[board: {}]", board.id).dimmed(),
                format!("[{}]", board.name.as_deref().unwrap_or("—")).dimmed(),
            );
        }

        let env = configure(&Target {
            board:           &board,
            framework_dir:   self.cfg.framework_dir.as_deref(),
            build_dir:       &build_dir,
            upload_protocol: args.protocol.as_deref().or(self.cfg.upload_protocol.as_deref()),
            build_flags:     &flags,
        }, &self.packages)?;

        if !self.quiet {
            for w in env.warnings() {
                eprintln!("{} {}", "warning:".yellow().bold(), w);
            }
        }
        Ok((board, env))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_resolve(ctx: &Ctx, args: &TargetArgs, json: bool) -> anyhow::Result<()> {
    let (_, env) = ctx.resolve(args)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&env)?);
        return Ok(());
    }

    println!("{}", "─".repeat(60).dimmed());
    section("cflags", &env.cflags);
    section("ccflags", &env.ccflags);
    section("cxxflags", &env.cxxflags);
    section("defines", &env.cppdefines.iter().map(|d| d.to_string()).collect::<Vec<_>>());
    section("cpppath", &display_paths(&env.cpppath));
    section("libpath", &display_paths(&env.libpath));
    section("linkflags", &env.linkflags);
    section("libs", &env.libs.iter().map(|l| l.name().to_owned()).collect::<Vec<_>>());
    section("softdevice", &display_paths(&env.softdevice_hex));
    println!(
        "  {:<11}{}",
        "ldscript:".dimmed(),
        env.ldscript_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "—".into()),
    );
    println!("  {:<11}{}", "upload:".dimmed(), env.upload.command_line(Path::new("$SOURCE")));
    if let Some(v) = &env.framework_version {
        println!("  {:<11}{}", "framework:".dimmed(), v);
    }
    Ok(())
}

fn cmd_build(ctx: &Ctx, args: &TargetArgs) -> anyhow::Result<()> {
    let (board, env) = ctx.resolve(args)?;

    if !ctx.quiet {
        println!("{} {}", "Building".cyan().bold(),
            format!("[{} libraries]", env.library_builds().count()).dimmed());
        println!("{}", "─".repeat(60).dimmed());
    }

    let t0 = Instant::now();
    let req = CompileRequest {
        env:           &env,
        board:         &board,
        toolchain_bin: ctx.packages.toolchain_bin(),
        verbose:       ctx.verbose,
    };
    let built = compile(&req)?;

    if !ctx.quiet {
        for lib in &built {
            println!("  {} {} {}", "✓".green().bold(), lib.name.bold(),
                format!("({} objects, {} cached)", lib.objects, lib.reused).dimmed());
            println!("    {}", lib.archive.display().to_string().dimmed());
        }
        println!("{} built in {:.2}s", "✓".green().bold(), t0.elapsed().as_secs_f64());
        println!("  {} {}", "link:".dimmed(), env.lib_args().join(" "));
    }
    Ok(())
}

fn cmd_upload(ctx: &Ctx, args: &UploadArgs) -> anyhow::Result<()> {
    let (board, env) = ctx.resolve(&args.target)?;
    let protocol = env.subst("$UPLOAD_PROTOCOL");
    let server = board.debug_tool(&protocol).and_then(|t| t.server.as_ref());

    if !ctx.quiet {
        println!("{} {} {}", "Uploading".cyan().bold(),
            format!("[protocol: {}]", protocol).dimmed(),
            format!("[{}]", args.firmware.display()).dimmed());
        println!("{}", "─".repeat(60).dimmed());
    }

    let req = FlashRequest {
        firmware:     args.firmware.clone(),
        uploader_bin: ctx.packages.openocd_bin(server),
        verbose:      ctx.verbose,
        dry_run:      args.dry_run,
    };
    flash(&req, &env)?;

    if !ctx.quiet && !args.dry_run {
        println!("{} firmware uploaded via {}", "✓".green().bold(), protocol.bold());
    }
    Ok(())
}

fn cmd_boards(ctx: &Ctx) -> anyhow::Result<()> {
    let boards = BoardConfig::catalog(&ctx.cfg.boards_dir())?;

    println!("{:<20} {:<32} {:<11} {:<10} {}", "ID", "NAME", "CPU", "MCU", "UPLOAD");
    println!("{}", "─".repeat(90).dimmed());

    for b in &boards {
        println!("{:<20} {:<32} {:<11} {:<10} {}",
            b.id.bold(),
            b.name.as_deref().unwrap_or("—"),
            b.cpu().unwrap_or("—"),
            b.mcu().unwrap_or("—"),
            b.debug.tools.keys().cloned().collect::<Vec<_>>().join(",").dimmed());
    }
    Ok(())
}

fn cmd_packages(ctx: &Ctx) {
    println!("{} {}", "root:".dimmed(), ctx.packages.root().display());
    for name in [FRAMEWORK_PACKAGE, OPENOCD_PACKAGE, TOOLCHAIN_PACKAGE] {
        match ctx.packages.package_dir(name) {
            Some(dir) => println!("  {} {:<30} {} {}",
                "✓".green(), name,
                ctx.packages.package_version(name).unwrap_or_else(|| "?".into()).dimmed(),
                dir.display()),
            None => println!("  {} {:<30} {}", "✗".red(), name, "not installed".dimmed()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn section(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("  {}", format!("{label}:").dimmed());
    for item in items {
        println!("    {item}");
    }
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

fn render_error(e: &anyhow::Error) {
    match e.downcast_ref::<ConfigError>() {
        Some(ConfigError::CompileFailed { output }) => {
            eprintln!("\n{} {}", "CompileError".red().bold(), "library build failed");
            eprintln!("{}", "─".repeat(60).dimmed());
            for line in output.lines() {
                if line.contains("error:") {
                    eprintln!("  {}", line.red());
                } else if line.contains("warning:") {
                    eprintln!("  {}", line.yellow());
                } else if !line.trim().is_empty() {
                    eprintln!("  {}", line.dimmed());
                }
            }
            eprintln!("{}", "─".repeat(60).dimmed());
        }
        Some(ConfigError::UploadFailed { protocol, output }) => {
            eprintln!("\n{} {}", "UploadError".red().bold(), format!("upload via {} failed", protocol));
            eprintln!("{}", "─".repeat(60).dimmed());
            for line in output.lines() {
                if line.to_lowercase().contains("error") {
                    eprintln!("  {}", line.red());
                } else if !line.trim().is_empty() {
                    eprintln!("  {}", line.dimmed());
                }
            }
            eprintln!();
            eprintln!("  {}", "Hints:".bold());
            eprintln!("  • Check the probe is connected and the target is powered");
            eprintln!("  • Try another protocol: nrf5-flash upload --protocol cmsis-dap …");
            eprintln!("{}", "─".repeat(60).dimmed());
        }
        _ => eprintln!("{} {:#}", "✗".red().bold(), e),
    }
}
