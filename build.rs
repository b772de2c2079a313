// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn global_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("home")
            .long("home")
            .value_name("DIR")
            .global(true)
            .help("Parcel home directory (default: $PARCEL_HOME or ~/.parcel)"),
    )
    .arg(
        Arg::new("root")
            .long("root")
            .value_name("DIR")
            .global(true)
            .help("Installation root (default: <home>/packages)"),
    )
    .arg(
        Arg::new("mirrors")
            .long("mirrors")
            .value_name("FILE")
            .global(true)
            .help("Mirror list file, replacing the project and user configuration"),
    )
    .arg(
        Arg::new("offline")
            .long("offline")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Never use the network; HTTP mirrors fail as unsupported"),
    )
    .arg(
        Arg::new("timeout")
            .long("timeout")
            .value_name("SECS")
            .default_value("15")
            .global(true)
            .help("Timeout for a single mirror request, in seconds"),
    )
    .arg(
        Arg::new("no_proxy")
            .long("no-proxy")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Ignore proxy settings from the environment"),
    )
}

fn build_cli() -> Command {
    let cmd = Command::new("parcel")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Parcel Contributors")
        .about("Minimal local package installer with mirror fallback and rollback")
        .after_help("Parcel takes no locks: run one instance at a time per home directory.")
        .subcommand_required(true)
        .subcommand(
            Command::new("install")
                .about("Install a package by identifier (name-version)")
                .arg(
                    Arg::new("package_id")
                        .required(true)
                        .help("Package identifier, e.g. hello-1.0"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed package")
                .arg(Arg::new("name").required(true).help("Package name to remove")),
        )
        .subcommand(
            Command::new("query")
                .about("Show the install record of a package")
                .arg(Arg::new("name").required(true).help("Package name")),
        )
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(
            Command::new("verify")
                .about("Check a cached archive against its declared checksum")
                .arg(
                    Arg::new("package_id")
                        .required(true)
                        .help("Package identifier, e.g. hello-1.0"),
                ),
        )
        .subcommand(
            Command::new("digest")
                .about("Compute the payload digest of an unpacked package directory")
                .arg(
                    Arg::new("package_dir")
                        .required(true)
                        .help("Directory containing manifest.json"),
                ),
        )
        .subcommand(Command::new("mirrors").about("Show the resolved mirror list"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        );

    global_args(cmd)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("parcel.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
