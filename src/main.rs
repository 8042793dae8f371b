//! regnet CLI: circRNA–miRNA–mRNA network construction and hub analysis.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regnet::input::{load_gene_column, load_id_set, load_reference_set};
use regnet::network::{hubs, write_hub_table, StringDbClient};
use regnet::pipeline::HUB_FILE;
use regnet::prediction::{read_match_dir, strong_matches, upstream_edges};
use regnet::{Config, Pipeline, RegulatoryGraph, StageReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "regnet", version, about = "Build circRNA–miRNA–mRNA regulatory networks")]
struct Cli {
    /// Config file (default: $REGNET_CONFIG, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override regnet.output_dir
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch CircInteractome site tables and write classifier-ready rows
    Sites {
        /// One circRNA ID per line
        #[arg(long)]
        circ: PathBuf,
    },
    /// Match tables + reference genes → network, hubs and report
    Network {
        /// Directory holding *_strong_medium_matches.csv files
        #[arg(long)]
        matches: PathBuf,
        /// Reference (DEG) list, one gene per line
        #[arg(long)]
        reference: PathBuf,
        /// Restrict upstream edges to these miRNAs
        #[arg(long)]
        mirna: Option<PathBuf>,
    },
    /// STRING protein–protein network over a gene CSV
    Ppi {
        /// CSV with a `Gene` column
        #[arg(long)]
        genes: PathBuf,
        /// Override sources.min_confidence (0-1000)
        #[arg(long)]
        min_confidence: Option<u32>,
    },
    /// Hub genes of a saved network JSON
    Hubs {
        #[arg(long)]
        graph: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &cli.output_dir {
        config.regnet.output_dir = dir.clone();
    }
    if let Command::Ppi {
        min_confidence: Some(score),
        ..
    } = &cli.command
    {
        config.sources.min_confidence = *score;
    }
    config.validate()?;
    Ok(config)
}

fn print_reports(reports: &[StageReport]) {
    for report in reports {
        let counts: Vec<String> = report
            .counts
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!("{:<10} {}", report.stage, counts.join(" "));
        for warning in &report.warnings {
            println!("{:<10}   ! {}", "", warning);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.regnet.log_level.as_str()),
    )
    .init();

    log::info!(
        "regnet run started {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let config = Arc::new(config);
    match &cli.command {
        Command::Sites { circ } => run_sites(config, circ).await,
        Command::Network {
            matches,
            reference,
            mirna,
        } => run_network(config, matches, reference, mirna.as_deref()).await,
        Command::Ppi { genes, .. } => run_ppi(config, genes).await,
        Command::Hubs { graph } => run_hubs(&config, graph),
    }
}

async fn run_sites(config: Arc<Config>, circ: &Path) -> Result<()> {
    let circs = load_id_set(circ, "circRNA")?;
    let pipeline = Pipeline::from_config(config)?;

    let run = pipeline.run_sites(&circs).await;
    print_reports(&run.reports);
    if run.sites.is_empty() {
        anyhow::bail!("No site tables retrieved for {} circRNAs", circs.len());
    }
    Ok(())
}

async fn run_network(
    config: Arc<Config>,
    matches: &Path,
    reference: &Path,
    mirna: Option<&Path>,
) -> Result<()> {
    let records = read_match_dir(matches)
        .with_context(|| format!("Failed to read match tables from {}", matches.display()))?;
    let mirnas = mirna.map(|p| load_id_set(p, "miRNA")).transpose()?;
    let upstream = upstream_edges(&strong_matches(&records, mirnas.as_ref()));
    let reference = load_reference_set(reference)?;
    log::info!(
        "{} match rows → {} circRNA→miRNA edges",
        records.len(),
        upstream.len()
    );

    let pipeline = Pipeline::from_config(config)?;
    let run = pipeline.run_network(&upstream, &reference).await;
    print_reports(&run.reports);

    match &run.graph {
        Some(graph) => println!(
            "\nNetwork: {} nodes, {} edges, {} hubs",
            graph.node_count(),
            graph.edge_count(),
            run.hubs.len()
        ),
        None => println!("\nNo network built"),
    }
    Ok(())
}

async fn run_ppi(config: Arc<Config>, genes: &Path) -> Result<()> {
    let genes = load_gene_column(genes)?;
    if genes.is_empty() {
        anyhow::bail!("No genes loaded");
    }
    let client = StringDbClient::new(&config)?;
    let pipeline = Pipeline::from_config(config)?;

    let run = pipeline.run_ppi(&client, &genes).await;
    print_reports(&run.reports);
    if run.graph.is_empty() {
        anyhow::bail!("No PPI network built");
    }
    for hub in &run.hubs {
        println!("{}\t{}", hub.gene, hub.degree);
    }
    Ok(())
}

fn run_hubs(config: &Config, graph: &Path) -> Result<()> {
    let graph = RegulatoryGraph::read_json(graph)
        .with_context(|| format!("Failed to load network {}", graph.display()))?;
    let hub_list = hubs(&graph);

    std::fs::create_dir_all(config.output_dir())?;
    let path = config.output_dir().join(HUB_FILE);
    write_hub_table(&path, &hub_list)?;
    log::info!("Hub genes: {}", path.display());

    for hub in &hub_list {
        println!("{}\t{}", hub.gene, hub.degree);
    }
    Ok(())
}
