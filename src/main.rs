// src/main.rs

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use modloom::activation::{self, ActivationFile, PersistedActivation};
use modloom::import::{self, ImportResult};
use modloom::resolver::{self, AnalyzerOptions, CyclePolicy};
use modloom::{ActivationList, ModRecord, ModRegistry, OrderingPolicy, ScanRoot};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "modloom")]
#[command(
    author,
    version,
    about = "Mod load-order manager: scan, sort, check and write activation files",
    long_about = None
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Where to look for mods
#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Local mods directory (repeatable)
    #[arg(long = "mods", value_name = "DIR")]
    mods: Vec<PathBuf>,

    /// Workshop content directory (repeatable)
    #[arg(long = "workshop", value_name = "DIR")]
    workshop: Vec<PathBuf>,

    /// Game Data directory holding the base game and expansions (repeatable)
    #[arg(long = "data", value_name = "DIR")]
    data: Vec<PathBuf>,
}

impl SourceArgs {
    /// Scan roots in priority order: built-in, local, then subscribed
    fn roots(&self) -> Vec<ScanRoot> {
        self.data
            .iter()
            .map(ScanRoot::builtin)
            .chain(self.mods.iter().map(ScanRoot::local))
            .chain(self.workshop.iter().map(ScanRoot::subscribed))
            .collect()
    }
}

/// Which mods are active and how fixed categories are placed
#[derive(Args, Debug)]
struct ListArgs {
    /// Activation list: a ModsConfig.xml or any importable modlist
    #[arg(short, long, value_name = "FILE")]
    list: PathBuf,

    /// Ordering policy table (JSON); defaults to the built-in table
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every mod found in the source directories
    Scan {
        #[command(flatten)]
        sources: SourceArgs,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the computed load order of an activation list
    Sort {
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Report duplicates, missing dependencies, incompatibilities and ordering problems
    Check {
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        list: ListArgs,
        /// Do not report constraint loops
        #[arg(long)]
        allow_cycles: bool,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sort an activation list and write it as the game's activation file
    Write {
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        list: ListArgs,
        /// Activation file to write (e.g. ModsConfig.xml)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Game version to record (default: keep the existing file's)
        #[arg(long, value_name = "VERSION")]
        game_version: Option<String>,
        /// Keep the list order instead of sorting
        #[arg(long)]
        no_sort: bool,
        /// Leave out listed mods that are not installed
        #[arg(long)]
        drop_missing: bool,
    },
    /// Show what a modlist file contains
    Import {
        /// Modlist file (ModsConfig.xml, XML, JSON or text)
        file: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn load_policy(path: Option<&Path>) -> Result<OrderingPolicy> {
    match path {
        Some(path) => OrderingPolicy::load(path)
            .with_context(|| format!("Failed to load ordering policy {}", path.display())),
        None => Ok(OrderingPolicy::default()),
    }
}

/// Map an imported modlist onto scanned mods
///
/// Workshop ids are resolved through the mods' catalog ids. Package ids the
/// registry does not know are returned alongside the list; unknown workshop
/// ids are only reported.
fn resolve_list(registry: &ModRegistry, imported: &ImportResult) -> (ActivationList, Vec<String>) {
    let (mut list, unresolved) = ActivationList::from_ids(registry, &imported.package_ids);
    for id in &unresolved {
        warn!("Mod {} is not installed", id);
    }

    for wid in &imported.workshop_ids {
        let found = registry
            .records()
            .iter()
            .find(|r| r.external_id.map(|e| e.to_string()).as_deref() == Some(wid.as_str()));
        match found {
            Some(record) if !list.contains(&record.canonical_id) => list.push(record.clone()),
            Some(_) => {}
            None => warn!("Workshop item {} is not installed", wid),
        }
    }
    (list, unresolved)
}

/// Scanned registry, resolved active list and the listed ids not installed
struct LoadedList {
    registry: ModRegistry,
    active: ActivationList,
    missing: Vec<String>,
}

fn load_list(sources: &SourceArgs, list: &ListArgs) -> Result<LoadedList> {
    let registry = ModRegistry::scan(&sources.roots());
    let imported = import::import_file(&list.list)
        .with_context(|| format!("Failed to read activation list {}", list.list.display()))?;
    let (active, missing) = resolve_list(&registry, &imported);
    info!(
        "{} of {} listed mods resolved",
        active.len(),
        imported.package_ids.len() + imported.workshop_ids.len()
    );
    Ok(LoadedList {
        registry,
        active,
        missing,
    })
}

/// The active list plus every other installed copy of an active id
///
/// The registry indexes one record per id, so extra copies only reach the
/// duplicate check through this.
fn with_installed_copies(registry: &ModRegistry, active: &ActivationList) -> ActivationList {
    let mut analyzed = active.clone();
    for copy in registry.duplicates() {
        if active.contains(&copy.canonical_id) {
            analyzed.push(copy.clone());
        }
    }
    analyzed
}

/// A sorted list laid out the way the written file places it
fn arranged(
    registry: &ModRegistry,
    sorted: &ActivationList,
    policy: &OrderingPolicy,
) -> ActivationList {
    let ids = activation::normalize_ids(&sorted.ids());
    let (order, _) = policy.arrange(&ids);
    ActivationList::from_ids(registry, &order).0
}

/// Sort (unless `no_sort`) and write the activation file
///
/// Listed ids that are not installed are kept after the resolved ones so
/// the base game and expansions survive a scan without `--data`, unless
/// `drop_missing` is set.
fn write_activation(
    loaded: LoadedList,
    policy: OrderingPolicy,
    output: &Path,
    game_version: Option<&str>,
    no_sort: bool,
    drop_missing: bool,
) -> Result<PersistedActivation> {
    let ordered = if no_sort {
        loaded.active
    } else {
        resolver::build_order(&loaded.active)
    };

    let mut ids = ordered.ids();
    if drop_missing {
        for id in &loaded.missing {
            warn!("Dropping {} from {}", id, output.display());
        }
    } else {
        ids.extend(loaded.missing);
    }

    ActivationFile::with_policy(output, policy)
        .save(&ids, game_version)
        .with_context(|| format!("Failed to write {}", output.display()))
}

fn print_record(index: usize, record: &ModRecord) {
    println!(
        "  {:>3}. {} ({}) [{}]",
        index + 1,
        record.display_name,
        record.canonical_id,
        record.origin
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Some(Commands::Scan { sources, json }) => {
            let registry = ModRegistry::scan(&sources.roots());

            if json {
                let records: Vec<&ModRecord> = registry
                    .records()
                    .iter()
                    .chain(registry.invalid())
                    .map(|r| r.as_ref())
                    .collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }

            if registry.is_empty() && registry.invalid().is_empty() {
                println!("No mods found.");
                return Ok(());
            }

            println!("Mods:");
            for (i, record) in registry.records().iter().enumerate() {
                print_record(i, record);
                println!("       {}", record.source_path.display());
            }
            if !registry.invalid().is_empty() {
                println!("\nUnreadable:");
                for record in registry.invalid() {
                    println!(
                        "  {} - {}",
                        record.source_path.display(),
                        record.error_detail.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            for record in registry.duplicates() {
                println!(
                    "\nDuplicate id {} at {}",
                    record.canonical_id,
                    record.source_path.display()
                );
            }
            println!("\nTotal: {} mod(s)", registry.len());
            Ok(())
        }
        Some(Commands::Sort { sources, list }) => {
            let policy = load_policy(list.policy.as_deref())?;
            let loaded = load_list(&sources, &list)?;
            let outcome = resolver::build_order_detailed(&loaded.active);

            let ordered = arranged(&loaded.registry, &outcome.order, &policy);

            println!("Load order:");
            for (i, record) in ordered.iter().enumerate() {
                print_record(i, record);
            }
            if outcome.has_cycle() {
                println!(
                    "\nConstraint loop, kept in list order: {}",
                    outcome.cyclic_ids.join(", ")
                );
            }
            Ok(())
        }
        Some(Commands::Check {
            sources,
            list,
            allow_cycles,
            json,
        }) => {
            let policy = load_policy(list.policy.as_deref())?;
            let loaded = load_list(&sources, &list)?;
            let active = with_installed_copies(&loaded.registry, &loaded.active);

            let mut options = AnalyzerOptions::from_policy(&policy);
            if allow_cycles {
                options = options.with_cycle_policy(CyclePolicy::Fallback);
            }
            let diagnostics = resolver::analyze_with(&active, &options);
            let errors = diagnostics.iter().filter(|d| d.is_error()).count();

            if json {
                println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            } else if diagnostics.is_empty() {
                println!("No problems found in {} mod(s).", active.len());
            } else {
                for diagnostic in &diagnostics {
                    println!("{}", diagnostic);
                }
                println!("\n{} problem(s), {} error(s)", diagnostics.len(), errors);
            }

            if errors > 0 {
                return Err(anyhow::anyhow!("{} error(s) found", errors));
            }
            Ok(())
        }
        Some(Commands::Write {
            sources,
            list,
            output,
            game_version,
            no_sort,
            drop_missing,
        }) => {
            let policy = load_policy(list.policy.as_deref())?;
            let loaded = load_list(&sources, &list)?;
            let written = write_activation(
                loaded,
                policy,
                &output,
                game_version.as_deref(),
                no_sort,
                drop_missing,
            )?;

            println!(
                "Wrote {} active mod(s) to {}",
                written.active_ids.len(),
                output.display()
            );
            println!("  Version: {}", written.version);
            println!("  Expansions: {}", written.known_category_ids.len());
            Ok(())
        }
        Some(Commands::Import { file, json }) => {
            let result = import::import_file(&file)
                .with_context(|| format!("Failed to import {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("Format: {}", result.format);
            println!("Package ids ({}):", result.package_ids.len());
            for id in &result.package_ids {
                match result.mod_names.get(id) {
                    Some(name) => println!("  {} ({})", id, name),
                    None => println!("  {}", id),
                }
            }
            if !result.workshop_ids.is_empty() {
                println!("Workshop ids ({}):", result.workshop_ids.len());
                for id in &result.workshop_ids {
                    println!("  {}", id);
                }
            }
            for warning in &result.warnings {
                println!("warning: {}", warning);
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "modloom", &mut io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("modloom v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'modloom --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modloom::ModOrigin;
    use std::fs;

    fn add_mod(root: &Path, folder: &str, package_id: &str) {
        let dir = root.join(folder);
        fs::create_dir_all(dir.join("About")).unwrap();
        fs::write(
            dir.join("About/About.xml"),
            format!("<ModMetaData><packageId>{}</packageId></ModMetaData>", package_id),
        )
        .unwrap();
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_roots_priority() {
        let sources = SourceArgs {
            mods: vec![PathBuf::from("/mods")],
            workshop: vec![PathBuf::from("/workshop")],
            data: vec![PathBuf::from("/game/Data")],
        };
        let roots = sources.roots();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[0].origin, ModOrigin::BuiltIn);
        assert_eq!(roots[1].origin, ModOrigin::Local);
        assert_eq!(roots[2].origin, ModOrigin::Subscribed);
    }

    #[test]
    fn test_parse_write_command() {
        let cli = Cli::try_parse_from([
            "modloom",
            "write",
            "--mods",
            "/a",
            "--mods",
            "/b",
            "--list",
            "list.txt",
            "--output",
            "ModsConfig.xml",
            "--no-sort",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Write {
                sources, no_sort, ..
            }) => {
                assert_eq!(sources.mods.len(), 2);
                assert!(no_sort);
            }
            _ => panic!("expected write command"),
        }
    }

    #[test]
    fn test_resolve_list_by_workshop_id() {
        let tmp = tempfile::tempdir().unwrap();
        add_mod(tmp.path(), "2009463077", "brrainz.harmony");
        add_mod(tmp.path(), "Core", "ludeon.rimworld");
        let registry = ModRegistry::scan(&[ScanRoot::subscribed(tmp.path())]);

        let mut imported = ImportResult::new(import::ImportFormat::PlainText);
        imported.push_package("ludeon.rimworld");
        imported.push_package("not.installed");
        imported.push_workshop("2009463077");
        imported.push_workshop("1111111");

        let (list, missing) = resolve_list(&registry, &imported);
        assert_eq!(list.ids(), vec!["ludeon.rimworld", "brrainz.harmony"]);
        assert_eq!(missing, vec!["not.installed"]);
    }

    fn list_args(path: &Path) -> ListArgs {
        ListArgs {
            list: path.to_path_buf(),
            policy: None,
        }
    }

    /// Harmony installed locally, Core and Royalty listed but not scanned
    fn partial_install(tmp: &Path) -> (SourceArgs, ListArgs, PathBuf) {
        let mods = tmp.join("Mods");
        add_mod(&mods, "Harmony", "brrainz.harmony");
        let output = tmp.join("ModsConfig.xml");
        fs::write(
            &output,
            "<ModsConfigData><version>1.5.1</version><activeMods>\
             <li>brrainz.harmony</li><li>ludeon.rimworld</li><li>ludeon.rimworld.royalty</li>\
             </activeMods><knownExpansions><li>ludeon.rimworld.royalty</li></knownExpansions>\
             </ModsConfigData>",
        )
        .unwrap();
        let sources = SourceArgs {
            mods: vec![mods],
            ..Default::default()
        };
        let list = list_args(&output);
        (sources, list, output)
    }

    #[test]
    fn test_write_keeps_uninstalled_listed_mods() {
        let tmp = tempfile::tempdir().unwrap();
        let (sources, list, output) = partial_install(tmp.path());

        let loaded = load_list(&sources, &list).unwrap();
        let written =
            write_activation(loaded, OrderingPolicy::default(), &output, None, false, false)
                .unwrap();

        assert_eq!(
            written.active_ids,
            vec!["brrainz.harmony", "ludeon.rimworld", "ludeon.rimworld.royalty"]
        );
        assert_eq!(written.known_category_ids, vec!["ludeon.rimworld.royalty"]);
        let on_disk = activation::read_activation_file(&output).unwrap();
        assert_eq!(on_disk, written);
        assert_eq!(on_disk.version, "1.5.1");
    }

    #[test]
    fn test_write_drop_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let (sources, list, output) = partial_install(tmp.path());

        let loaded = load_list(&sources, &list).unwrap();
        let written =
            write_activation(loaded, OrderingPolicy::default(), &output, None, false, true)
                .unwrap();

        assert_eq!(written.active_ids, vec!["brrainz.harmony"]);
        assert!(written.known_category_ids.is_empty());
    }

    #[test]
    fn test_check_sees_installed_copies() {
        let tmp = tempfile::tempdir().unwrap();
        let mods = tmp.path().join("Mods");
        let workshop = tmp.path().join("ws");
        add_mod(&mods, "Harmony", "brrainz.harmony");
        add_mod(&workshop, "2009463077", "brrainz.harmony");
        add_mod(&workshop, "2009463078", "other.mod");
        add_mod(&mods, "Other", "other.mod");
        let list_path = tmp.path().join("list.txt");
        fs::write(&list_path, "brrainz.harmony\n").unwrap();

        let sources = SourceArgs {
            mods: vec![mods],
            workshop: vec![workshop],
            ..Default::default()
        };
        let loaded = load_list(&sources, &list_args(&list_path)).unwrap();
        assert_eq!(loaded.active.len(), 1);

        let analyzed = with_installed_copies(&loaded.registry, &loaded.active);
        assert_eq!(analyzed.len(), 2, "Only copies of active ids are added");

        let diagnostics = resolver::analyze(&analyzed);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, modloom::DiagnosticKind::Duplicate);
        assert!(diagnostics[0].is_error());
    }

    #[test]
    fn test_sort_output_follows_policy() {
        let tmp = tempfile::tempdir().unwrap();
        add_mod(tmp.path(), "Core", "ludeon.rimworld");
        add_mod(tmp.path(), "Zed", "zed.mod");
        add_mod(tmp.path(), "Harmony", "brrainz.harmony");
        let registry = ModRegistry::scan(&[ScanRoot::local(tmp.path())]);
        let (list, _) =
            ActivationList::from_ids(&registry, &["zed.mod", "ludeon.rimworld", "brrainz.harmony"]);

        let sorted = resolver::build_order(&list);
        let default_order = arranged(&registry, &sorted, &OrderingPolicy::default());
        assert_eq!(
            default_order.ids(),
            vec!["brrainz.harmony", "ludeon.rimworld", "zed.mod"]
        );

        let policy = OrderingPolicy {
            tier_zero: vec!["zed.mod".to_string()],
            ..OrderingPolicy::default()
        };
        let custom_order = arranged(&registry, &sorted, &policy);
        assert_eq!(custom_order.ids()[0], "zed.mod");
        assert_eq!(custom_order.len(), 3);
    }

    #[test]
    fn test_load_policy_default() {
        let policy = load_policy(None).unwrap();
        assert_eq!(policy, OrderingPolicy::default());
        assert!(load_policy(Some(Path::new("/no/such/policy.json"))).is_err());
    }
}
