//! Locus - Entry Point
//!
//! Binary entry point for the `locus` descriptor file tool. Lives in the
//! facade crate next to the library so both share the `locus` name.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `locus check <files>` | Parse descriptor files, report every bad line |
//! | `locus show <files> [--json]` | Print the descriptors the files contain |

use clap::Parser;
use locus::cli::{Cli, run};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    run(&cli, &mut stdout)
}
