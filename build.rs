// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: database path
fn db_path_arg() -> Arg {
    Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .default_value("vfsport.db")
        .help("Path to the repository database")
}

/// Common argument: engine configuration
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Engine configuration file (default: vfsport.toml if present)")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("vfsport")
        .version(env!("CARGO_PKG_VERSION"))
        .author("vfsport Contributors")
        .about("Import and export for hierarchical content repositories")
        .arg(db_path_arg())
        .arg(config_arg())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("More output (-v debug, -vv trace)"),
        )
        .arg(flag("json", "Print reports as JSON"))
        .subcommand(
            Command::new("export")
                .about("Export resources to an archive")
                .arg(Arg::new("paths").required(true).num_args(1..).help("Site-relative paths to export"))
                .arg(Arg::new("output").short('o').long("output").required(true).help("Archive file to write"))
                .arg(Arg::new("site-root").long("site-root").help("Site root the paths are relative to"))
                .arg(flag("include-system", "Include resources under /system"))
                .arg(flag("changed-only", "Only export files changed since their last publish"))
                .arg(flag("reduced", "Leave out user and date metadata"))
                .arg(flag("accounts", "Include users and groups"))
                .arg(
                    Arg::new("compression")
                        .long("compression")
                        .value_parser(["gzip", "xz", "zstd", "none"])
                        .help("Archive compression"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Import an archive into the repository")
                .arg(Arg::new("archive").required(true).help("Archive file to read"))
                .arg(Arg::new("target-root").long("target-root").help("Site root to import below"))
                .arg(flag("overwrite", "Replace live resources that collide with incoming entries"))
                .arg(flag("no-validate", "Skip validation of structured content"))
                .arg(flag("strict", "Validate all structured content first and abort on any error")),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show the manifest summary of an archive")
                .arg(Arg::new("archive").required(true))
                .arg(
                    Arg::new("entries")
                        .short('e')
                        .long("entries")
                        .action(ArgAction::SetTrue)
                        .help("List every entry"),
                ),
        )
        .subcommand(Command::new("init").about("Create a repository database"))
        .subcommand(
            Command::new("add")
                .about("Add a local file to the repository")
                .arg(Arg::new("file").required(true))
                .arg(Arg::new("path").required(true))
                .arg(Arg::new("type").short('t').long("type").help("Resource type"))
                .arg(Arg::new("user").long("user").default_value("admin")),
        )
        .subcommand(
            Command::new("sibling")
                .about("Create a sibling sharing the content of an existing file")
                .arg(Arg::new("source").required(true))
                .arg(Arg::new("path").required(true))
                .arg(Arg::new("user").long("user").default_value("admin")),
        )
        .subcommand(
            Command::new("ls")
                .about("List a subtree of the repository")
                .arg(Arg::new("path").default_value("/"))
                .arg(
                    Arg::new("long")
                        .short('l')
                        .long("long")
                        .action(ArgAction::SetTrue)
                        .help("Show ids, state and locks"),
                ),
        )
        .subcommand(
            Command::new("publish")
                .about("Publish a subtree")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("translate")
                .about("Show how the configured rules translate paths")
                .arg(Arg::new("paths").required(true).num_args(1..))
                .arg(
                    Arg::new("rule")
                        .short('r')
                        .long("rule")
                        .action(ArgAction::Append)
                        .help("Extra rule in sed form, tried before the configured ones"),
                ),
        )
        .subcommand(
            Command::new("convert-digest")
                .about("Convert legacy hex MD5 password digests to Base64")
                .arg(Arg::new("digests").required(true).num_args(1..)),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("vfsport.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
