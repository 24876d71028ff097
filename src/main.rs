//! flowframe CLI
//!
//! Loads a graph JSON, optional CSV dataset overrides and optional dynamic
//! zone equations, executes the graph, and prints (or writes) the execution
//! result payload.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;

use flowframe::Config;
use flowframe::frame::io;
use flowframe::graph::executor::{CsvOverrides, NodeExecutor};
use flowframe::graph::registry::default_registry;
use flowframe::graph::serialize::{execution_result_json, graph_from_json};

#[derive(Parser, Debug)]
#[command(name = "flowframe")]
#[command(about = "Execute node-graph data transformations", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "flowframe.toml")]
    config: PathBuf,

    /// Graph JSON file to execute (overrides the configured graph)
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Dataset override, repeatable: identifier=path.csv
    #[arg(short, long)]
    dataset: Vec<String>,

    /// Dynamic zone equations, repeatable: zone=EQUATION
    #[arg(short, long)]
    equation: Vec<String>,

    /// Write the execution result JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List all registered node definitions and exit
    #[arg(long)]
    list_nodes: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = if args.config.exists() {
        Config::from_file(&args.config).context("Failed to load configuration")?
    } else {
        Config::default()
    };

    env_logger::Builder::new()
        .parse_filters(&config.engine.log_level)
        .init();

    let registry = default_registry();
    if args.list_nodes {
        for category in registry.categories() {
            println!("{category}");
            for name in registry.names_in_category(&category) {
                println!("  {name}");
            }
        }
        return Ok(());
    }

    let graph_path = match args.graph.clone().or_else(|| config.engine.graph.clone()) {
        Some(path) => path,
        None => bail!("no graph file given (use --graph or set engine.graph in the config)"),
    };
    let graph_text = std::fs::read_to_string(&graph_path)
        .with_context(|| format!("Failed to read graph file {}", graph_path.display()))?;
    let graph_json: serde_json::Value =
        serde_json::from_str(&graph_text).context("Graph file is not valid JSON")?;
    let graph = graph_from_json(&graph_json).context("Failed to parse graph")?;

    let overrides = load_overrides(&args.dataset, &config)?;
    let zones = parse_zone_equations(&args.equation)?;

    let mut executor = NodeExecutor::new(registry);
    let start = Instant::now();
    let results = if zones.is_empty() {
        executor.execute(&graph, &overrides)?
    } else {
        executor.execute_with_zones(&graph, &overrides, &zones)?
    };
    let duration_ms = start.elapsed().as_millis() as i64;

    for error in executor.errors() {
        eprintln!("node error: {error}");
    }

    let execution_id = format!("exec-{}", std::process::id());
    let payload = execution_result_json(
        &config.engine.session_id,
        &execution_id,
        &results,
        duration_ms,
    );
    let rendered = serde_json::to_string_pretty(&payload)?;

    match &args.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }

    Ok(())
}

/// Parse `identifier=path.csv` pairs and load each file.
fn load_overrides(specs: &[String], config: &Config) -> Result<CsvOverrides> {
    let mut overrides = CsvOverrides::new();
    for spec in specs {
        let Some((identifier, path)) = spec.split_once('=') else {
            bail!("dataset override must look like identifier=path.csv, got '{spec}'");
        };
        let mut file = PathBuf::from(path);
        if file.is_relative() && !file.exists() {
            file = config.datasets.dir.join(&file);
        }
        let frame = io::read_csv(&file, config.delimiter_byte(), config.datasets.has_header)
            .with_context(|| format!("Failed to load dataset {}", file.display()))?;
        overrides.insert(identifier.to_owned(), Arc::new(frame));
    }
    Ok(overrides)
}

/// Parse `zone=EQUATION` pairs, accumulating equations per zone.
fn parse_zone_equations(specs: &[String]) -> Result<HashMap<String, Vec<String>>> {
    let mut zones: HashMap<String, Vec<String>> = HashMap::new();
    for spec in specs {
        let Some((zone, equation)) = spec.split_once('=') else {
            bail!("equation must look like zone=DEST = EXPR, got '{spec}'");
        };
        zones
            .entry(zone.trim().to_owned())
            .or_default()
            .push(equation.trim().to_owned());
    }
    Ok(zones)
}
