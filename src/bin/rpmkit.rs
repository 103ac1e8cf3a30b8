//! rpmkit CLI
//!
//! Build packages from TOML manifests and inspect existing packages

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpmkit::{list_entries, DependencyKind, RpmPackage};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rpmkit")]
#[command(about = "Build and inspect RPM packages")]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the package described by a TOML manifest
    Build {
        manifest: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print lead, signature and header tags
    Inspect {
        package: PathBuf,

        /// Emit the metadata header as JSON
        #[arg(long)]
        json: bool,
    },

    /// List packaged files
    List { package: PathBuf },

    /// Check digests, sizes and the payload against the header
    Verify { package: PathBuf },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path) -> Result<RpmPackage> {
    RpmPackage::open(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn inspect(package: &RpmPackage, json: bool) -> Result<()> {
    if json {
        let tags: serde_json::Map<String, serde_json::Value> = package
            .header()
            .records()
            .iter()
            .map(|r| -> Result<(String, serde_json::Value)> {
                Ok((r.tag.name().to_string(), serde_json::to_value(&r.value)?))
            })
            .collect::<Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    println!("== Lead\n{}\n", package.lead());
    println!("== Signature\n{}", package.signature());
    println!("== Header\n{}", package.header());
    for kind in [
        DependencyKind::Requires,
        DependencyKind::Provides,
        DependencyKind::Conflicts,
        DependencyKind::Obsoletes,
    ] {
        let deps = package.dependencies(kind)?;
        if !deps.is_empty() {
            println!("== {:?}", kind);
            for dep in deps {
                println!("  {}", dep);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { manifest, output } => {
            let path = rpmkit::build_from_manifest(&manifest, &output)
                .with_context(|| format!("Failed to build {}", manifest.display()))?;
            println!("{}", path.display());
        }
        Command::Inspect { package, json } => inspect(&open(&package)?, json)?,
        Command::List { package } => {
            for entry in list_entries(&open(&package)?)? {
                let link = if entry.is_symlink() {
                    format!(" -> {}", entry.link_target)
                } else {
                    String::new()
                };
                println!(
                    "{:06o} {:>8} {:>8} {:>10} {}{}",
                    entry.mode, entry.user, entry.group, entry.size, entry.path, link
                );
            }
        }
        Command::Verify { package } => {
            let rpm = open(&package)?;
            rpm.verify()
                .with_context(|| format!("{} failed verification", package.display()))?;
            info!("{} OK", rpm.nevr()?);
            println!("{}: OK", package.display());
        }
    }
    Ok(())
}
