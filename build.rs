// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn source_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("mods")
            .long("mods")
            .value_name("DIR")
            .action(ArgAction::Append)
            .help("Local mods directory (repeatable)"),
    )
    .arg(
        Arg::new("workshop")
            .long("workshop")
            .value_name("DIR")
            .action(ArgAction::Append)
            .help("Workshop content directory (repeatable)"),
    )
    .arg(
        Arg::new("data")
            .long("data")
            .value_name("DIR")
            .action(ArgAction::Append)
            .help("Game Data directory holding the base game and expansions (repeatable)"),
    )
}

fn list_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("list")
            .short('l')
            .long("list")
            .value_name("FILE")
            .required(true)
            .help("Activation list: a ModsConfig.xml or any importable modlist"),
    )
    .arg(
        Arg::new("policy")
            .long("policy")
            .value_name("FILE")
            .help("Ordering policy table (JSON)"),
    )
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print as JSON")
}

fn build_cli() -> Command {
    Command::new("modloom")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Modloom Contributors")
        .about("Mod load-order manager: scan, sort, check and write activation files")
        .subcommand_required(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging (RUST_LOG overrides)"),
        )
        .subcommand(
            source_args(
                Command::new("scan").about("List every mod found in the source directories"),
            )
            .arg(json_flag()),
        )
        .subcommand(list_args(source_args(
            Command::new("sort").about("Print the computed load order of an activation list"),
        )))
        .subcommand(
            list_args(source_args(Command::new("check").about(
                "Report duplicates, missing dependencies, incompatibilities and ordering problems",
            )))
            .arg(
                Arg::new("allow_cycles")
                    .long("allow-cycles")
                    .action(ArgAction::SetTrue)
                    .help("Do not report constraint loops"),
            )
            .arg(json_flag()),
        )
        .subcommand(
            list_args(source_args(
                Command::new("write")
                    .about("Sort an activation list and write it as the game's activation file"),
            ))
            .arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILE")
                    .required(true)
                    .help("Activation file to write (e.g. ModsConfig.xml)"),
            )
            .arg(
                Arg::new("game_version")
                    .long("game-version")
                    .value_name("VERSION")
                    .help("Game version to record (default: keep the existing file's)"),
            )
            .arg(
                Arg::new("no_sort")
                    .long("no-sort")
                    .action(ArgAction::SetTrue)
                    .help("Keep the list order instead of sorting"),
            )
            .arg(
                Arg::new("drop_missing")
                    .long("drop-missing")
                    .action(ArgAction::SetTrue)
                    .help("Leave out listed mods that are not installed"),
            ),
        )
        .subcommand(
            Command::new("import")
                .about("Show what a modlist file contains")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .help("Modlist file (ModsConfig.xml, XML, JSON or text)"),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("modloom.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
