use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use provreq_graph::catalog::{flatten_document, read_document};
use provreq_graph::search::{promise_stats, promise_usage, search_techniques, SearchQuery};
use provreq_graph::{
    adjust_bundle, check_unreachable, nop_techniques, preprocess, read_bundle, read_catalog,
    remove_nops, simulate, stage_rows, Catalog, CatalogBuild, DependencyGraph, ExpansionMap,
    GraphError, StageRow, Vocabulary,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod flags;
mod format;
mod report;

use config::{ConfigFile, Settings, ToolSection};
use flags::ConfigAction;

#[derive(Parser)]
#[command(name = "provreq")]
#[command(about = "Technique catalogs and attack stage simulation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Config file (overrides PROVREQ_CONFIG and the default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a run through the techniques of a bundle
    Generate(GenerateArgs),

    /// Show a single technique
    #[command(name = "show-agent")]
    ShowAgent(ShowAgentArgs),

    /// Show how a promise is used
    #[command(name = "show-promise")]
    ShowPromise(ShowPromiseArgs),

    /// Show the techniques of a bundle grouped by class
    #[command(name = "show-bundle")]
    ShowBundle(ShowBundleArgs),

    /// Show little or unused promises
    #[command(name = "promise-usage")]
    PromiseUsage(PromiseUsageArgs),

    /// Search techniques by promises and name
    #[command(name = "promise-search")]
    PromiseSearch(PromiseSearchArgs),

    /// Check reachability and rewrite a technique document sorted
    #[command(name = "format-json")]
    FormatJson(FormatJsonArgs),

    /// Write the expanded technique catalog as JSON
    #[command(name = "export-catalog")]
    ExportCatalog(ExportCatalogArgs),

    /// Show or install the default config
    Config(ConfigArgs),
}

/// Data file locations shared by every catalog-reading command.
#[derive(Args, Debug, Clone, Default)]
struct DataArgs {
    /// Directory relative data files are resolved against
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Promise vocabulary (CSV, first field per line)
    #[arg(long)]
    promise_descriptions: Option<PathBuf>,

    /// System condition vocabulary (CSV, first field per line)
    #[arg(long)]
    conditions: Option<PathBuf>,

    /// Technique definitions (JSON)
    #[arg(long)]
    agent_promises: Option<PathBuf>,
}

impl DataArgs {
    fn section(&self) -> ToolSection {
        ToolSection {
            data_dir: self.data_dir.clone(),
            promise_descriptions: self.promise_descriptions.clone(),
            conditions: self.conditions.clone(),
            agent_promises: self.agent_promises.clone(),
            ..Default::default()
        }
    }
}

#[derive(Args)]
struct GenerateArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Bundle file to simulate
    #[arg(short = 'b', long)]
    agent_bundle: Option<PathBuf>,

    /// Entry conditions already in place
    #[arg(long, value_delimiter = ',')]
    seeds: Option<Vec<String>>,

    /// Conditions related to the system (e.g. poor_security_practices)
    #[arg(long, value_delimiter = ',')]
    system_conditions: Option<Vec<String>>,

    /// Techniques to add to the bundle
    #[arg(long, value_delimiter = ',')]
    include_agents: Vec<String>,

    /// Techniques to remove from the bundle
    #[arg(long, value_delimiter = ',')]
    exclude_agents: Vec<String>,

    /// Promise that marks a successful run
    #[arg(long)]
    end_condition: Option<String>,

    /// Show new promises at the end of each stage
    #[arg(long)]
    show_promises: bool,

    /// Show classes after each technique and per stage
    #[arg(long)]
    show_agent_classes: bool,

    /// Treat techniques with empty provides as NOP regardless of requires
    #[arg(long)]
    nop_empty_provides: bool,

    /// Include techniques inherited from extended agents
    #[arg(long)]
    include_extended_agents: bool,

    /// Output JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl GenerateArgs {
    fn section(&self) -> ToolSection {
        ToolSection {
            agent_bundle: self.agent_bundle.clone(),
            seeds: self.seeds.clone(),
            system_conditions: self.system_conditions.clone(),
            end_condition: self.end_condition.clone(),
            ..self.data.section()
        }
    }
}

#[derive(Args)]
struct ShowAgentArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Technique ID (a missing leading `T` is added)
    agent: String,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ShowPromiseArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Promise to show
    promise: String,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ShowBundleArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Bundle file to show
    #[arg(short = 'b', long)]
    agent_bundle: Option<PathBuf>,

    /// Include techniques inherited from extended agents
    #[arg(long)]
    include_extended_agents: bool,

    /// Only list technique IDs
    #[arg(long)]
    no_names: bool,

    /// Characters kept before shortening IDs and names (min 5)
    #[arg(long, default_value_t = 10)]
    text_length: usize,
}

#[derive(Args)]
struct PromiseUsageArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Show promises provided at most this many times
    #[arg(long, default_value_t = 0)]
    provide_limit: usize,

    /// Show promises required at most this many times
    #[arg(long, default_value_t = 0)]
    require_limit: usize,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PromiseSearchArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Techniques providing all of these
    #[arg(short = 'p', long, value_delimiter = ',')]
    provides: Vec<String>,

    /// Techniques not providing these
    #[arg(long, value_delimiter = ',')]
    not_provides: Vec<String>,

    /// Techniques requiring all of these
    #[arg(short = 'r', long, value_delimiter = ',')]
    requires: Vec<String>,

    /// Techniques not requiring these
    #[arg(long, value_delimiter = ',')]
    not_requires: Vec<String>,

    /// Name substrings (case-insensitive)
    #[arg(short = 'n', long, value_delimiter = ',')]
    name: Vec<String>,
}

#[derive(Args)]
struct FormatJsonArgs {
    /// Technique document to rewrite in place
    file: PathBuf,
}

#[derive(Args)]
struct ExportCatalogArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Write to this file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(value_enum)]
    action: ConfigAction,
}

/// Exit status for a failed run: 2 for undeclared promises, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let unknown_promises = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<GraphError>(),
            Some(GraphError::UnknownPromises(_))
        )
    });
    if unknown_promises {
        2
    } else {
        1
    }
}

pub fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers
    let json_output = match &cli.command {
        Commands::Generate(args) => args.json,
        Commands::ShowAgent(args) => args.json,
        Commands::ShowPromise(args) => args.json,
        Commands::PromiseUsage(args) => args.json,
        _ => false,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Generate(args) => run_generate(args, config)?,
        Commands::ShowAgent(args) => run_show_agent(args, config)?,
        Commands::ShowPromise(args) => run_show_promise(args, config)?,
        Commands::ShowBundle(args) => run_show_bundle(args, config)?,
        Commands::PromiseUsage(args) => run_promise_usage(args, config)?,
        Commands::PromiseSearch(args) => run_promise_search(args, config)?,
        Commands::FormatJson(args) => run_format_json(args)?,
        Commands::ExportCatalog(args) => run_export_catalog(args, config)?,
        Commands::Config(args) => run_config(args)?,
    }

    Ok(())
}

fn settings(config: Option<&Path>, tool: &str, overlay: &ToolSection) -> Result<Settings> {
    let section = ConfigFile::discover(config)?.section(tool).merged(overlay);
    Ok(Settings::from_section(section))
}

fn build_catalog(settings: &Settings) -> Result<CatalogBuild> {
    let files = settings.data_files()?;
    read_catalog(&files).with_context(|| {
        format!(
            "Failed to build technique catalog from {}",
            files.agent_promises.display()
        )
    })
}

/// Catalog that passed the structural check, for commands that simulate over it.
fn trusted_catalog(settings: &Settings) -> Result<(Catalog, ExpansionMap)> {
    let build = build_catalog(settings)?;
    build.into_trusted().with_context(|| {
        format!(
            "One or more agents in {} are missing a required field",
            settings.agent_promises.display()
        )
    })
}

/// Bundle resolved against the catalog, conditional variants included.
fn load_bundle(
    settings: &Settings,
    catalog: &Catalog,
    expansion_map: &ExpansionMap,
    include_extended: bool,
) -> Result<Vec<String>> {
    let path = settings.bundle_file()?;
    let bundle = read_bundle(&path, include_extended)
        .with_context(|| format!("Failed to read agent bundle {}", path.display()))?;
    Ok(preprocess(catalog, expansion_map, &bundle))
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    stages: &'a [StageRow],
    objectives: &'a BTreeSet<String>,
    provided: &'a BTreeSet<String>,
    backburner: &'a [String],
    removed_nops: &'a [String],
    end_condition: &'a str,
    reached: bool,
}

fn run_generate(args: GenerateArgs, config: Option<&Path>) -> Result<()> {
    let settings = settings(config, "generate", &args.section())?;
    let (catalog, expansion_map) = trusted_catalog(&settings)?;
    let bundle = load_bundle(
        &settings,
        &catalog,
        &expansion_map,
        args.include_extended_agents,
    )?;

    let nops = nop_techniques(&catalog, &settings.nop_promises, args.nop_empty_provides);
    let (bundle, removed) = remove_nops(&bundle, &nops);
    log::info!("Removed {} NOP agents: {:?}", removed.len(), removed);

    let include = preprocess(&catalog, &expansion_map, &args.include_agents);
    let adjustment = adjust_bundle(&bundle, &include, &args.exclude_agents);
    for id in &adjustment.not_present {
        log::warn!("{id} is not in the list of agents used");
    }

    let sim = simulate(
        &settings.seeds,
        &adjustment.bundle,
        &catalog,
        &settings.system_conditions,
    )
    .context("Simulation failed")?;
    for note in &sim.debug {
        log::debug!("{note}");
    }

    let rows = stage_rows(&sim, &catalog, args.show_promises, args.show_agent_classes)?;
    let reached = sim.reached(&settings.end_condition);

    if args.json {
        let output = GenerateOutput {
            stages: &rows,
            objectives: &sim.objectives,
            provided: &sim.provided,
            backburner: &sim.backburner,
            removed_nops: &removed,
            end_condition: &settings.end_condition,
            reached,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print!(
        "{}",
        report::render_stages(&rows, args.show_promises, args.show_agent_classes)
    );
    println!("[*] Technique does not provide any new promises");

    if !sim.objectives.is_empty() {
        println!(
            "The following objectives where reached: {:?}",
            sim.objectives
        );
    }

    if reached {
        println!(
            "SUCCESS: Attack chain exited with end condition '{}'",
            settings.end_condition
        );
    } else {
        println!(
            "FAIL: incomplete attack chain, could not achieve end condition: {}",
            settings.end_condition
        );
    }

    Ok(())
}

fn run_show_agent(args: ShowAgentArgs, config: Option<&Path>) -> Result<()> {
    let settings = settings(config, "show-agent", &args.data.section())?;
    let catalog = build_catalog(&settings)?.catalog;

    let id = if catalog.contains(&args.agent) || args.agent.starts_with('T') {
        args.agent
    } else {
        format!("T{}", args.agent)
    };
    let technique = catalog
        .get(&id)
        .ok_or_else(|| GraphError::UnknownTechnique(id.clone()))?;

    let graph = DependencyGraph::from_catalog(&catalog);
    let enabled_by = graph.enabled_by(&id)?;
    let enables = graph.enables(&id)?;

    if args.json {
        let output = serde_json::json!({
            "id": id,
            "technique": technique,
            "enabled_by": enabled_by,
            "enables": enables,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print!("{}", report::render_technique(&id, technique));
    print!("{}", report::render_dependencies(&enabled_by, &enables));
    Ok(())
}

fn run_show_promise(args: ShowPromiseArgs, config: Option<&Path>) -> Result<()> {
    let settings = settings(config, "show-promise", &args.data.section())?;
    let catalog = build_catalog(&settings)?.catalog;
    let stats = promise_stats(&catalog, &args.promise);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", report::render_promise_stats(&stats));
    }
    Ok(())
}

fn run_show_bundle(args: ShowBundleArgs, config: Option<&Path>) -> Result<()> {
    let overlay = ToolSection {
        agent_bundle: args.agent_bundle.clone(),
        ..args.data.section()
    };
    let settings = settings(config, "show-bundle", &overlay)?;
    let (catalog, expansion_map) = trusted_catalog(&settings)?;
    let bundle = load_bundle(
        &settings,
        &catalog,
        &expansion_map,
        args.include_extended_agents,
    )?;

    let text_length = args.text_length.max(5);
    let mut entries = Vec::with_capacity(bundle.len());
    for id in &bundle {
        let technique = catalog
            .get(id)
            .ok_or_else(|| GraphError::UnknownTechnique(id.clone()))?;
        entries.push((
            report::bundle_label(id, &technique.name, text_length, args.no_names),
            technique.agent_class.clone(),
        ));
    }

    print!("{}", report::render_bundle(&entries));
    Ok(())
}

fn run_promise_usage(args: PromiseUsageArgs, config: Option<&Path>) -> Result<()> {
    let settings = settings(config, "promise-usage", &args.data.section())?;
    let catalog = build_catalog(&settings)?.catalog;
    let path = settings.existing_file(&settings.promise_descriptions, "promise-descriptions")?;
    let vocabulary = Vocabulary::read(&path)?;

    let rows = promise_usage(&catalog, &vocabulary, args.provide_limit, args.require_limit);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", report::render_usage(&rows));
    }
    Ok(())
}

fn run_promise_search(args: PromiseSearchArgs, config: Option<&Path>) -> Result<()> {
    let query = SearchQuery {
        provides: args.provides,
        not_provides: args.not_provides,
        requires: args.requires,
        not_requires: args.not_requires,
        name: args.name,
    };
    if query.is_empty() {
        bail!(
            "Specify at least one of --provides, --not-provides, --requires, --not-requires or --name"
        );
    }

    let settings = settings(config, "promise-search", &args.data.section())?;
    let catalog = build_catalog(&settings)?.catalog;
    let found = search_techniques(&catalog, &query);
    print!("{}", report::render_search(&found));
    Ok(())
}

fn run_format_json(args: FormatJsonArgs) -> Result<()> {
    let path = &args.file;
    let document = read_document(path)?;
    let audit = check_unreachable(&flatten_document(&document));
    if !audit.is_ok() {
        log::warn!(
            "{} techniques can not be reached without seeding",
            audit.unreachable.len()
        );
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    format::normalize(&mut value);
    fs::write(path, format::to_pretty(&value)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("Formatted {}", path.display());
    Ok(())
}

fn run_export_catalog(args: ExportCatalogArgs, config: Option<&Path>) -> Result<()> {
    let settings = settings(config, "export-catalog", &args.data.section())?;
    let catalog = build_catalog(&settings)?.catalog;
    let text = format::to_pretty(&catalog)?;

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} techniques to {}", catalog.len(), path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn run_config(args: ConfigArgs) -> Result<()> {
    let path = match args.action {
        ConfigAction::Show => {
            print!("{}", config::DEFAULT_CONFIG);
            return Ok(());
        }
        ConfigAction::User => config::user_config_path()
            .context("Could not determine the user config directory")?,
        ConfigAction::System => config::system_config_path(),
    };

    config::save_config(&path)
        .with_context(|| format!("config {} failed", args.action.as_str()))?;
    println!("Config written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use provreq_graph::PromiseSuggestion;

    #[test]
    fn unknown_promises_exit_with_two() {
        let err = anyhow::Error::new(GraphError::UnknownPromises(vec![PromiseSuggestion {
            promise: "file_transfr".to_string(),
            candidates: vec!["file_transfer".to_string()],
        }]))
        .context("Failed to build technique catalog");
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::Error::new(GraphError::UnknownTechnique("T0".to_string()));
        assert_eq!(exit_code(&err), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn cli_parses_comma_separated_lists() {
        let cli = Cli::try_parse_from([
            "provreq",
            "generate",
            "--seeds",
            "a,b",
            "--exclude-agents",
            "T1,T2",
            "-b",
            "bundle.json",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let section = args.section();
        assert_eq!(section.seeds, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(section.agent_bundle, Some(PathBuf::from("bundle.json")));
        assert_eq!(args.exclude_agents, vec!["T1".to_string(), "T2".to_string()]);
        assert_eq!(section.system_conditions, None);
    }
}
