// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use parcel::archive::{MANIFEST_FILE, Manifest};
use parcel::checksum::payload_digest;
use parcel::fetch::{Fetcher, HttpClient, HttpConfig};
use parcel::install::{ChecksumStatus, install_package};
use parcel::layout::{Layout, default_home};
use parcel::mirrors::{MirrorList, default_config_candidates, resolve_mirrors};
use parcel::registry::{JsonRegistry, Registry};
use parcel::remove::{RemoveStatus, remove_package};
use parcel::verify::{ChecksumVerdict, verify_package};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "parcel")]
#[command(author, version, about = "Minimal local package installer with mirror fallback and rollback", long_about = None)]
#[command(after_help = "Parcel takes no locks: run one instance at a time per home directory.")]
struct Cli {
    /// Parcel home directory (default: $PARCEL_HOME or ~/.parcel)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Installation root (default: <home>/packages)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Mirror list file, replacing the project and user configuration
    #[arg(long, global = true, value_name = "FILE")]
    mirrors: Option<PathBuf>,

    /// Never use the network; HTTP mirrors fail as unsupported
    #[arg(long, global = true)]
    offline: bool,

    /// Timeout for a single mirror request, in seconds
    #[arg(long, global = true, value_name = "SECS", default_value_t = 15)]
    timeout: u64,

    /// Ignore proxy settings from the environment
    #[arg(long, global = true)]
    no_proxy: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package by identifier (name-version)
    Install {
        /// Package identifier, e.g. hello-1.0
        package_id: String,
    },
    /// Remove an installed package
    Remove {
        /// Package name to remove
        name: String,
    },
    /// Show the install record of a package
    Query {
        /// Package name
        name: String,
    },
    /// List installed packages
    List,
    /// Check a cached archive against its declared checksum
    Verify {
        /// Package identifier, e.g. hello-1.0
        package_id: String,
    },
    /// Compute the payload digest of an unpacked package directory
    Digest {
        /// Directory containing manifest.json
        package_dir: PathBuf,
    },
    /// Show the resolved mirror list
    Mirrors,
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<parcel::Error>()
        .map(parcel::Error::exit_code)
        .unwrap_or(1)
}

fn run(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Install { package_id } => {
            let layout = build_layout(&cli)?;
            layout.ensure_dirs()?;
            let fetcher = build_fetcher(&cli, &layout)?;
            let mut registry = JsonRegistry::open(layout.registry_path())?;

            let report = install_package(&fetcher, &mut registry, &layout, package_id)?;

            match &report.replaced_version {
                Some(old) => println!(
                    "Installed {} {} (replacing {})",
                    report.name, report.version, old
                ),
                None => println!("Installed {} {}", report.name, report.version),
            }
            println!("  files: {}", report.files.len());
            println!(
                "  checksum: {}",
                match report.checksum {
                    ChecksumStatus::Verified => "verified",
                    ChecksumStatus::NotDeclared => "not declared",
                }
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Remove { name } => {
            let layout = build_layout(&cli)?;
            layout.ensure_dirs()?;
            let mut registry = JsonRegistry::open(layout.registry_path())?;

            let report = remove_package(&mut registry, layout.install_root(), name)?;

            match report.status {
                RemoveStatus::NotInstalled => println!("{} is not installed", name),
                RemoveStatus::Removed => {
                    println!(
                        "Removed {} {} ({} file(s))",
                        name,
                        report.version.as_deref().unwrap_or("?"),
                        report.removed_files.len()
                    );
                    if !report.warnings.is_empty() {
                        println!("  {} warning(s), see log", report.warnings.len());
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Query { name } => {
            let layout = build_layout(&cli)?;
            let registry = JsonRegistry::open(layout.registry_path())?;

            match registry.get(name)? {
                Some(record) => {
                    println!("{} {}", name, record.version);
                    println!("  archive: {}", record.archive_path);
                    if let Some(installed_at) = &record.installed_at {
                        println!("  installed: {}", installed_at);
                    }
                    println!("  files:");
                    for file in &record.files {
                        println!("    {}", file);
                    }
                }
                None => println!("{}: not installed", name),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            let layout = build_layout(&cli)?;
            let registry = JsonRegistry::open(layout.registry_path())?;

            let installed = registry.list()?;
            if installed.is_empty() {
                println!("(no packages installed)");
            }
            for (name, record) in installed {
                println!("{} {}", name, record.version);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { package_id } => {
            let layout = build_layout(&cli)?;
            layout.ensure_dirs()?;

            let report = verify_package(&layout, package_id)?;

            match &report.verdict {
                ChecksumVerdict::Match { declared, actual }
                | ChecksumVerdict::Mismatch { declared, actual } => {
                    println!("declared: {}", declared);
                    println!("actual:   {}", actual);
                    println!("match: {}", report.verdict.passed());
                }
                ChecksumVerdict::NotDeclared => println!("no sha256 declared"),
            }

            if report.verdict.passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Digest { package_dir } => {
            println!("{}", digest_package_dir(package_dir)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mirrors => {
            let list = mirror_list(&cli)?;
            match &list.source {
                Some(source) => println!("# from {}", source.display()),
                None => println!("# no mirror configuration found"),
            }
            for mirror in &list.mirrors {
                println!("{}", mirror);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "parcel", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_layout(cli: &Cli) -> Result<Layout> {
    let home = match &cli.home {
        Some(home) => home.clone(),
        None => default_home()?,
    };

    let mut layout = Layout::new(home);
    if let Some(root) = &cli.root {
        layout = layout.with_install_root(root);
    }
    debug!(
        "Home {}, installation root {}",
        layout.home().display(),
        layout.install_root().display()
    );
    Ok(layout)
}

fn mirror_list(cli: &Cli) -> Result<MirrorList> {
    let candidates = match &cli.mirrors {
        Some(file) => vec![file.clone()],
        None => {
            let cwd = std::env::current_dir().context("Failed to read working directory")?;
            default_config_candidates(&cwd)
        }
    };
    Ok(resolve_mirrors(&candidates)?)
}

fn build_fetcher(cli: &Cli, layout: &Layout) -> Result<Fetcher> {
    let list = mirror_list(cli)?;
    if let Some(source) = &list.source {
        info!("Using {} mirror(s) from {}", list.mirrors.len(), source.display());
    }

    let client = if cli.offline {
        None
    } else {
        Some(HttpClient::new(HttpConfig {
            timeout: Duration::from_secs(cli.timeout),
            no_proxy: cli.no_proxy,
        })?)
    };

    Ok(Fetcher::new(layout.store_dir(), list.mirrors, client))
}

/// Payload digest an author puts in the manifest's `sha256`
fn digest_package_dir(package_dir: &Path) -> Result<String> {
    let manifest_path = package_dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let manifest = Manifest::from_json_str(&raw)?.validate()?;
    Ok(payload_digest(
        package_dir,
        &manifest.name,
        &manifest.version,
        &manifest.sources(),
    )?)
}
