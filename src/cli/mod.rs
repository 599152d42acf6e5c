// src/cli/mod.rs
//! CLI definitions for vfsport
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Transfer commands:
//! - `export` - Write a subtree of the repository to an archive
//! - `import` - Reconcile an archive into the repository
//! - `inspect` - Show what an archive contains
//!
//! Repository commands:
//! - `init` - Create a repository database
//! - `add` / `sibling` - Create files and sibling path instances
//! - `ls` - List a subtree
//! - `publish` - Mark a subtree as published and drop working locks
//!
//! Tools:
//! - `translate` - Apply the configured path translation rules
//! - `convert-digest` - Convert legacy hex password digests

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vfsport")]
#[command(author, version)]
#[command(about = "Import and export for hierarchical content repositories", long_about = None)]
pub struct Cli {
    /// Path to the repository database
    #[arg(short, long, global = true, default_value = vfsport::db::DEFAULT_DB_PATH)]
    pub db_path: String,

    /// Engine configuration file (default: vfsport.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    // =========================================================================
    // Transfer
    // =========================================================================
    /// Export resources to an archive
    Export {
        /// Site-relative paths to export (subtrees included)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Archive file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Site root the paths are relative to (default: from config)
        #[arg(long)]
        site_root: Option<String>,

        /// Include resources under /system
        #[arg(long)]
        include_system: bool,

        /// Only export files changed since their last publish
        #[arg(long)]
        changed_only: bool,

        /// Leave out user and date metadata
        #[arg(long)]
        reduced: bool,

        /// Include users and groups
        #[arg(long)]
        accounts: bool,

        /// Archive compression: gzip, xz, zstd, none (default: from config)
        #[arg(long)]
        compression: Option<String>,
    },

    /// Import an archive into the repository
    Import {
        /// Archive file to read
        archive: PathBuf,

        /// Site root to import below (default: from config)
        #[arg(long)]
        target_root: Option<String>,

        /// Replace live resources that collide with incoming entries
        #[arg(long)]
        overwrite: bool,

        /// Skip validation of structured content
        #[arg(long, conflicts_with = "strict")]
        no_validate: bool,

        /// Validate all structured content first and abort on any error
        #[arg(long)]
        strict: bool,
    },

    /// Show the manifest summary of an archive
    Inspect {
        /// Archive file to read
        archive: PathBuf,

        /// List every entry
        #[arg(short, long)]
        entries: bool,
    },

    // =========================================================================
    // Repository
    // =========================================================================
    /// Create a repository database
    Init,

    /// Add a local file to the repository
    Add {
        /// Local file to read
        file: PathBuf,

        /// Repository path to create
        path: String,

        /// Resource type (default: guessed from the extension)
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,

        /// User recorded as creator
        #[arg(long, default_value = "admin")]
        user: String,
    },

    /// Create a sibling sharing the content of an existing file
    Sibling {
        /// Existing repository path
        source: String,

        /// New repository path
        path: String,

        /// User recorded as creator
        #[arg(long, default_value = "admin")]
        user: String,
    },

    /// List a subtree of the repository
    Ls {
        /// Repository path
        #[arg(default_value = "/")]
        path: String,

        /// Show ids, state and locks
        #[arg(short, long)]
        long: bool,
    },

    /// Publish a subtree
    Publish {
        /// Repository path
        path: String,
    },

    // =========================================================================
    // Tools
    // =========================================================================
    /// Show how the configured rules translate paths
    Translate {
        /// Paths to translate
        #[arg(required = true)]
        paths: Vec<String>,

        /// Extra rules in sed form, tried before the configured ones
        #[arg(short, long = "rule")]
        rules: Vec<String>,
    },

    /// Convert legacy hex MD5 password digests to Base64
    ConvertDigest {
        /// Hex digests
        #[arg(required = true)]
        digests: Vec<String>,
    },
}
