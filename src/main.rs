//! autoactivate CLI entry point.
//!
//! Provides `resolve`, `check`, and `explain` subcommands for printing the
//! activation order, validating a configuration, or inspecting how a single
//! module is treated.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use autoactivate::config::ResolverConfig;
use autoactivate::logging;
use autoactivate::resolve::Resolver;

/// autoactivate — decide which modules activate, and in what order.
#[derive(Parser)]
#[command(name = "autoactivate", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Environment property override, `key=value`. May be repeated.
    #[arg(long = "property", short = 'D', global = true, value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// Also write JSON logs to this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Resolve every configured site and print the activation order.
    Resolve {
        /// Print the full resolution as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and report counts without printing the order.
    Check,
    /// Show metadata and filter outcome for one module.
    Explain {
        /// Module id to inspect.
        id: String,
    },
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = ResolverConfig::load(cli.config.as_deref())?;
    let _logging_guard = match cli.log_dir.as_ref().or(config.logging.dir.as_ref()) {
        Some(dir) => Some(logging::init_with_file(dir, &config.logging.level)?),
        None => {
            logging::init_cli(&config.logging.level);
            None
        }
    };

    let resolver = config
        .build_resolver(&cli.properties)
        .context("failed to build resolver")?;
    debug!(selector = ?resolver.selector(), "resolver ready");

    match cli.command {
        Command::Resolve { json } => handle_resolve(&config, &resolver, json),
        Command::Check => handle_check(&config, &resolver),
        Command::Explain { id } => handle_explain(&resolver, &id),
    }
}

/// Print the activation order, one `site<TAB>id` line per module.
fn handle_resolve(config: &ResolverConfig, resolver: &Resolver, json: bool) -> anyhow::Result<()> {
    let resolution = resolver.resolve(&config.effective_sites())?;
    if json {
        let rendered =
            serde_json::to_string_pretty(&resolution).context("failed to render resolution")?;
        println!("{rendered}");
    } else {
        for import in &resolution.imports {
            println!("{}\t{}", import.site, import.id);
        }
    }
    Ok(())
}

/// Resolve and summarise without printing the order.
fn handle_check(config: &ResolverConfig, resolver: &Resolver) -> anyhow::Result<()> {
    let sites = config.effective_sites();
    let resolution = resolver.resolve(&sites)?;
    let rejected: usize = resolution.sites.iter().map(|s| s.rejected.len()).sum();
    let excluded = resolution.exclusions().len();
    println!(
        "ok: {} sites, {} modules activated, {} filtered, {} excluded",
        sites.len(),
        resolution.imports.len(),
        rejected,
        excluded
    );
    Ok(())
}

/// Print what the resolver knows about `id`.
fn handle_explain(resolver: &Resolver, id: &str) -> anyhow::Result<()> {
    let selector = resolver.selector();
    let metadata = selector
        .metadata()
        .load(selector.environment().as_ref())?;
    let candidate = selector
        .registry()
        .load_candidates()
        .iter()
        .any(|c| c == id);
    let meta = metadata.get(id);

    println!("module:      {id}");
    println!("candidate:   {candidate}");
    println!("resolvable:  {}", selector.registry().is_resolvable(id));
    println!("priority:    {}", meta.priority);
    println!("before:      {}", join(&meta.before));
    println!("after:       {}", join(&meta.after));
    println!("before-all:  {}", meta.before_all);
    println!("after-all:   {}", meta.after_all);
    if let Some(attributes) = metadata.attributes(id) {
        for (name, value) in attributes {
            println!("  {name} = {value}");
        }
    }
    let filtered = selector.should_exclude(id)?;
    println!("filtered:    {filtered}");
    Ok(())
}

fn join(ids: &std::collections::BTreeSet<String>) -> String {
    if ids.is_empty() {
        "-".to_owned()
    } else {
        ids.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
