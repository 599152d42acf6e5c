// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::{ExportArgs, ImportArgs};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let db_path = cli.db_path.as_str();
    match cli.command {
        Commands::Export {
            paths,
            output,
            site_root,
            include_system,
            changed_only,
            reduced,
            accounts,
            compression,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let args = ExportArgs {
                paths: &paths,
                output: &output,
                site_root: site_root.as_deref(),
                include_system,
                changed_only,
                reduced,
                accounts,
                compression: compression.as_deref(),
            };
            commands::cmd_export(db_path, &config, &args)
        }
        Commands::Import {
            archive,
            target_root,
            overwrite,
            no_validate,
            strict,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let args = ImportArgs {
                archive: &archive,
                target_root: target_root.as_deref(),
                overwrite,
                no_validate,
                strict,
            };
            commands::cmd_import(db_path, &config, &args, cli.json)
        }
        Commands::Inspect { archive, entries } => {
            commands::cmd_inspect(&archive, entries, cli.json)
        }
        Commands::Init => commands::cmd_init(db_path),
        Commands::Add {
            file,
            path,
            resource_type,
            user,
        } => commands::cmd_add(db_path, &file, &path, resource_type.as_deref(), &user),
        Commands::Sibling { source, path, user } => {
            commands::cmd_sibling(db_path, &source, &path, &user)
        }
        Commands::Ls { path, long } => commands::cmd_ls(db_path, &path, long),
        Commands::Publish { path } => commands::cmd_publish(db_path, &path),
        Commands::Translate { paths, rules } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_translate(&config, &paths, &rules)
        }
        Commands::ConvertDigest { digests } => commands::cmd_convert_digest(&digests),
    }
}
