use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// classweave - load-time mixin rules for JVM class files
#[derive(Debug, Parser)]
#[command(name = "classweave", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options controlling how declarations are loaded and applied.
#[derive(Debug, Parser)]
pub struct EngineOptions {
    /// Directory holding `.mixin.xml` declarations and handler `.class` files.
    #[arg(short, long, value_name = "DIR")]
    pub mixins: PathBuf,

    /// Name mappings applied to rules marked with `remap`.
    #[arg(long, value_name = "FILE")]
    pub mappings: Option<PathBuf>,

    /// Fail bundles whose method names match several overloads.
    #[arg(long)]
    pub strict: bool,

    /// Compile declarations on a single thread.
    #[arg(long)]
    pub serial: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display a class file overview: version, names, flags, fields and methods.
    Info {
        /// Path to the class file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Load a declaration directory and list the registered bundles per target.
    Rules {
        #[command(flatten)]
        engine: EngineOptions,

        /// Show only bundles targeting this unit (dotted or internal name).
        #[arg(long, value_name = "NAME")]
        target: Option<String>,
    },

    /// Apply loaded rules to a class file or to every class file below a directory.
    Apply {
        #[command(flatten)]
        engine: EngineOptions,

        /// Input class file or directory.
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Output class file or directory (mirrors the input layout).
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Export audit records (original/transformed hashes and output bytes) to this directory.
        #[arg(long, value_name = "DIR")]
        audit: Option<PathBuf>,
    },
}
