// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotsmith::{
    actuator::{Actuator, DryRunActuator, FsActuator, LoggingActuator},
    config::Config,
    path::{default_config_path, default_source_dir, home_dir},
    state::{AddOptions, ArchiveHeader, RootState},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    fs::{self, File},
    io::{self, ErrorKind, Write},
    os::unix::fs::PermissionsExt,
    path::{absolute, PathBuf},
    process::exit,
};
use tracing::{debug, error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dotsmith [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let session = Session::load(self.options)?;
        match self.command {
            Command::Apply => run_apply(session),
            Command::Diff => run_diff(session),
            Command::Add(opts) => run_add(session, opts),
            Command::Archive(opts) => run_archive(session, opts),
            Command::List => run_list(session),
        }
    }
}

#[derive(Args, Clone, Debug)]
struct GlobalOptions {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Path to source directory.
    #[arg(short = 'S', long, global = true, value_name = "path")]
    pub source: Option<PathBuf>,

    /// Path to target directory.
    #[arg(short = 'D', long, global = true, value_name = "path")]
    pub target: Option<PathBuf>,

    /// Permission bits to clear, in octal.
    #[arg(long, global = true, value_name = "mask", value_parser = parse_umask)]
    pub umask: Option<u32>,

    /// Only show what would be done.
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Show every change made.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Update target directory to match source directory.
    #[command(override_usage = "dotsmith apply [options]")]
    Apply,

    /// Show changes that apply would make.
    #[command(override_usage = "dotsmith diff [options]")]
    Diff,

    /// Add targets to source directory.
    #[command(override_usage = "dotsmith add [options] <target>...")]
    Add(AddCliOptions),

    /// Write target state as a tar archive.
    #[command(override_usage = "dotsmith archive [options]")]
    Archive(ArchiveOptions),

    /// List every target with the source entry that manages it.
    #[command(override_usage = "dotsmith list [options]")]
    List,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddCliOptions {
    /// Targets to add.
    #[arg(required = true, value_name = "target")]
    pub targets: Vec<PathBuf>,

    /// Add files that have no contents.
    #[arg(short, long)]
    pub empty: bool,

    /// Add files as templates.
    #[arg(short = 'T', long)]
    pub template: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ArchiveOptions {
    /// Write archive to file instead of standard output.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,
}

/// Settings resolved from command line, configuration file, and defaults.
struct Session {
    config: Config,
    source_dir: PathBuf,
    target_dir: PathBuf,
    umask: u32,
    dry_run: bool,
    verbose: bool,
}

impl Session {
    fn load(opts: GlobalOptions) -> Result<Self> {
        let config = load_config(opts.config)?;
        let source_dir = match opts.source.or_else(|| config.source_dir.clone()) {
            Some(path) => path,
            None => default_source_dir()?,
        };
        let target_dir = match opts.target.or_else(|| config.target_dir.clone()) {
            Some(path) => path,
            None => home_dir()?,
        };

        Ok(Self {
            source_dir: absolute(source_dir)?,
            target_dir: absolute(target_dir)?,
            umask: opts.umask.unwrap_or(config.umask),
            dry_run: opts.dry_run || config.dry_run,
            verbose: opts.verbose || config.verbose,
            config,
        })
    }

    fn root_state(&self) -> RootState {
        RootState::new(
            &self.target_dir,
            self.umask,
            &self.source_dir,
            self.config.data.clone(),
        )
    }

    fn populated_root_state(&self) -> Result<RootState> {
        self.check_source_permissions()?;
        let mut root = self.root_state();
        root.populate()?;

        Ok(root)
    }

    fn actuator(&self) -> Box<dyn Actuator> {
        match (self.dry_run, self.verbose) {
            (true, true) => Box::new(LoggingActuator::new(DryRunActuator::new())),
            (true, false) => Box::new(DryRunActuator::new()),
            (false, true) => Box::new(LoggingActuator::new(FsActuator::new())),
            (false, false) => Box::new(FsActuator::new()),
        }
    }

    fn check_source_permissions(&self) -> Result<()> {
        match fs::metadata(&self.source_dir) {
            Ok(metadata) => {
                let mode = metadata.permissions().mode() & 0o777;
                if mode != 0o700 {
                    warn!(
                        "{:?} has permissions {mode:03o}, should be 700",
                        self.source_dir.display()
                    );
                }

                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to inspect {:?}", self.source_dir)),
        }
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time()
        .with_writer(io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(path) => (path, true),
        None => (default_config_path()?, false),
    };

    match fs::read_to_string(&path) {
        Ok(data) => data
            .parse::<Config>()
            .with_context(|| format!("invalid configuration file {:?}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound && !explicit => {
            debug!("no configuration file at {:?}", path.display());
            Ok(Config::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {:?}", path.display())),
    }
}

fn parse_umask(value: &str) -> Result<u32, String> {
    let mode = u32::from_str_radix(value.trim_start_matches("0o"), 8)
        .map_err(|err| format!("invalid octal umask: {err}"))?;
    if mode > 0o777 {
        return Err(format!("umask {mode:o} exceeds 777"));
    }

    Ok(mode)
}

fn run_apply(session: Session) -> Result<()> {
    let root = session.populated_root_state()?;
    root.apply(&mut session.actuator())?;

    Ok(())
}

fn run_diff(session: Session) -> Result<()> {
    let root = session.populated_root_state()?;
    root.apply(&mut LoggingActuator::new(DryRunActuator::new()))?;

    Ok(())
}

fn run_add(session: Session, opts: AddCliOptions) -> Result<()> {
    let mut actuator = session.actuator();
    if !session.source_dir.exists() {
        actuator.mkdir(&session.source_dir, 0o700)?;
    }

    let mut root = session.populated_root_state()?;
    let options = AddOptions {
        empty: opts.empty,
        template: opts.template,
    };
    for target in opts.targets {
        root.add(absolute(target)?, options, &mut actuator)?;
    }

    Ok(())
}

fn run_archive(session: Session, opts: ArchiveOptions) -> Result<()> {
    let root = session.populated_root_state()?;
    let header = match fs::metadata(&session.source_dir) {
        Ok(metadata) => ArchiveHeader::from_metadata(&metadata),
        Err(_) => ArchiveHeader::default(),
    };
    let header = header.with_names(std::env::var("USER").unwrap_or_default(), "");

    let writer: Box<dyn Write> = match opts.output {
        Some(path) => Box::new(
            File::create(&path).with_context(|| format!("failed to create {:?}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut builder = tar::Builder::new(writer);
    root.archive(&mut builder, &header)?;
    builder.into_inner()?.flush()?;

    Ok(())
}

fn run_list(session: Session) -> Result<()> {
    let root = session.populated_root_state()?;
    let mut stdout = io::stdout().lock();
    for (name, state) in root.all_states() {
        writeln!(stdout, "{}\t{}", name.display(), state.source_name().display())?;
    }

    Ok(())
}
