use clap::{Parser, Subcommand, ValueEnum};
use flowtrace::config;
use flowtrace::telemetry::{init_logging, TraceMetrics};
use flowtrace::traceroute::{TraceResults, TracerouteEngine};
use flowtrace::{Flow, Trace};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "flowtrace")]
#[command(about = "Virtual traceroute over a network forwarding snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace flows through the network
    Trace {
        /// Path to network.toml
        #[arg(short, long, default_value = "network.toml")]
        network: PathBuf,

        /// Path to flows.toml
        #[arg(short, long, default_value = "flows.toml")]
        flows: PathBuf,

        /// Skip incoming and outgoing filters
        #[arg(long)]
        ignore_acls: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Validate network.toml without tracing
    Validate {
        /// Path to network.toml
        #[arg(short, long, default_value = "network.toml")]
        network: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Trace {
            network,
            flows,
            ignore_acls,
            format,
        } => cmd_trace(&network, &flows, ignore_acls, format),
        Commands::Validate { network } => {
            init_logging(None);
            cmd_validate(&network)
        }
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_trace(
    network_path: &PathBuf,
    flows_path: &PathBuf,
    ignore_acls: bool,
    format: OutputFormat,
) -> Result<(), String> {
    let network = config::load_network(network_path)
        .map_err(|e| format!("Failed to load {}: {}", network_path.display(), e))?;

    // Logging settings live in the network file (RUST_LOG still wins)
    init_logging(network.log.as_ref());
    info!("Loaded {}", network_path.display());

    let state = config::build(&network).map_err(|e| format!("Invalid network: {}", e))?;
    let flows = config::load_flows(flows_path)
        .map_err(|e| format!("Failed to load {}: {}", flows_path.display(), e))?;
    info!("Tracing {} flows", flows.len());

    let mut settings = network.engine.clone();
    settings.ignore_acls |= ignore_acls;

    let metrics = Arc::new(TraceMetrics::new());
    let engine =
        TracerouteEngine::new(Arc::new(state), settings).with_metrics(Arc::clone(&metrics));
    let results = engine.trace_flows(&flows).map_err(|e| e.to_string())?;

    match format {
        OutputFormat::Text => print_text(&results),
        OutputFormat::Json => print_json(&results)?,
    }

    for (name, value) in metrics.export() {
        info!("{} = {}", name, value);
    }
    Ok(())
}

fn cmd_validate(network_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", network_path.display());

    let network = config::load_network(network_path)
        .map_err(|e| format!("Failed to parse network: {}", e))?;

    let validation = config::validate(&network);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Network is valid");
        Ok(())
    }
}

fn print_text(results: &TraceResults) {
    for (flow, traces) in results {
        println!("Flow: {}", flow);
        if traces.is_empty() {
            println!("  (not admitted: ingress interface does not answer ARP)");
        }
        for (i, trace) in traces.iter().enumerate() {
            print!("  Trace {}: {}", i + 1, trace);
        }
        println!();
    }
}

#[derive(Serialize)]
struct FlowTraces<'a> {
    flow: &'a Flow,
    traces: &'a BTreeSet<Trace>,
}

fn print_json(results: &TraceResults) -> Result<(), String> {
    let out: Vec<FlowTraces<'_>> = results
        .iter()
        .map(|(flow, traces)| FlowTraces { flow, traces })
        .collect();
    let json = serde_json::to_string_pretty(&out)
        .map_err(|e| format!("Failed to serialize traces: {}", e))?;
    println!("{}", json);
    Ok(())
}
