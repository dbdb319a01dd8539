//! Command line interface
//!
//! Without file arguments both commands fall back to the descriptor files
//! and directories of the loaded configuration.

use crate::domain::value_objects::Descriptor;
use crate::infrastructure::config::{ConfigLoader, LocusConfig};
use crate::infrastructure::format;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::populator::{DescriptorFileFinder, DirectoryFinder};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Command line interface for locus
#[derive(Parser, Debug)]
#[command(name = "locus")]
#[command(about = "Locus - inspect and validate descriptor files")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as configured instead of staying quiet
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Parse descriptor files and report every malformed line
    Check {
        /// Descriptor files; defaults to the configured sources
        files: Vec<PathBuf>,
    },
    /// Print the descriptors held by descriptor files
    Show {
        /// Descriptor files; defaults to the configured sources
        files: Vec<PathBuf>,

        /// Print JSON instead of the text listing
        #[arg(long)]
        json: bool,
    },
}

/// Execute `cli`, writing results to `out`
///
/// `check` fails after reporting when any file is unreadable or malformed.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> anyhow::Result<()> {
    let config = if cli.verbose || cli.config.is_some() {
        Some(load_config(cli.config.as_deref())?)
    } else {
        None
    };
    if let Some(config) = config.as_ref().filter(|_| cli.verbose) {
        init_logging(&config.logging).context("Failed to initialize logging")?;
    }

    match &cli.command {
        Command::Check { files } => {
            let files = resolve_files(files, cli.config.as_deref(), config.as_ref())?;
            check(&files, out)
        }
        Command::Show { files, json } => {
            let files = resolve_files(files, cli.config.as_deref(), config.as_ref())?;
            show(&files, *json, out)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LocusConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::new().with_config_path(path),
        None => ConfigLoader::new(),
    };
    Ok(loader.load()?)
}

/// Explicit files, or every file the configuration points at
fn resolve_files(
    files: &[PathBuf],
    config_path: Option<&Path>,
    config: Option<&LocusConfig>,
) -> anyhow::Result<Vec<PathBuf>> {
    if !files.is_empty() {
        return Ok(files.to_vec());
    }
    let loaded;
    let config = match config {
        Some(config) => config,
        None => {
            loaded = load_config(config_path)?;
            &loaded
        }
    };
    let mut resolved = config.populator.files.clone();
    resolved.extend(DirectoryFinder::new(config.populator.directories.iter().cloned()).find()?);
    if resolved.is_empty() {
        bail!("no descriptor files given and none configured");
    }
    Ok(resolved)
}

/// Report each file as ok or list its errors
pub fn check<W: Write>(files: &[PathBuf], out: &mut W) -> anyhow::Result<()> {
    let mut failed = 0usize;
    for file in files {
        match format::read_file(file) {
            Ok(descriptors) => {
                writeln!(out, "{}: ok ({} descriptors)", file.display(), descriptors.len())?;
            }
            Err(errors) => {
                failed += 1;
                writeln!(out, "{}: {} error(s)", file.display(), errors.len())?;
                for error in errors.errors() {
                    writeln!(out, "  {error}")?;
                }
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} descriptor file(s) failed to parse", files.len());
    }
    Ok(())
}

/// Print every descriptor of `files`, in file order
pub fn show<W: Write>(files: &[PathBuf], json: bool, out: &mut W) -> anyhow::Result<()> {
    let mut descriptors = Vec::new();
    for file in files {
        descriptors.extend(format::read_file(file)?);
    }
    if json {
        serde_json::to_writer_pretty(&mut *out, &descriptors)
            .context("Failed to serialize descriptors")?;
        writeln!(out)?;
    } else {
        for descriptor in &descriptors {
            write_listing(descriptor, out)?;
        }
    }
    Ok(())
}

fn write_listing<W: Write>(descriptor: &Descriptor, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{descriptor}")?;
    let contracts: Vec<&str> = descriptor.contracts().iter().map(String::as_str).collect();
    writeln!(out, "  contracts: {}", contracts.join(", "))?;
    writeln!(out, "  scope: {}", descriptor.scope())?;
    if !descriptor.qualifiers().is_empty() {
        let qualifiers: Vec<&str> = descriptor.qualifiers().iter().map(String::as_str).collect();
        writeln!(out, "  qualifiers: {}", qualifiers.join(", "))?;
    }
    if descriptor.rank() != 0 {
        writeln!(out, "  rank: {}", descriptor.rank())?;
    }
    for (key, values) in descriptor.metadata() {
        writeln!(out, "  {key} = {}", values.join(", "))?;
    }
    Ok(())
}
