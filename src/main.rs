use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use vertpart::algo::{
    AlgorithmConfig, AlgorithmKind, Hyrise, Layout, MetisPartitioner, O2p, O2pMode, TrojanLayout,
    VerticalPartitioner, create_algorithm,
};
use vertpart::cost::{CostModelKind, PartitioningProfiler, PartitionsProfiler};
use vertpart::layout::map_of_partitioning;
use vertpart::workload::Table;

#[derive(Parser)]
#[command(author, version, about = "Workload-driven vertical partitioning optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one algorithm on a workload file
    Run {
        /// Workload JSON file
        workload: PathBuf,

        #[arg(short, long, value_enum)]
        algorithm: AlgorithmArg,

        #[arg(short, long, value_enum, default_value_t = CostModelArg::Disk)]
        cost_model: CostModelArg,

        /// Split enumeration strategy used by o2p
        #[arg(long, value_enum, default_value_t = O2pModeArg::Dynamic)]
        o2p_mode: O2pModeArg,

        /// Number of replicas built by trojan
        #[arg(long, default_value_t = 1)]
        replication_factor: usize,

        /// Graph partitioner binary used by hyrise
        #[arg(long, default_value = "kmetis")]
        metis_binary: String,
    },

    /// Run every algorithm on a workload file and compare costs
    Compare {
        /// Workload JSON file
        workload: PathBuf,

        #[arg(short, long, value_enum, default_value_t = CostModelArg::Disk)]
        cost_model: CostModelArg,

        /// Include hyrise, which shells out to the METIS binary
        #[arg(long)]
        with_hyrise: bool,

        #[arg(long, default_value = "kmetis")]
        metis_binary: String,
    },

    /// Print a summary of a workload file
    Info {
        /// Workload JSON file
        workload: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Autopart,
    Hillclimb,
    Hyrise,
    Navathe,
    O2p,
    Optimal,
    Trojan,
    Dream,
}

impl From<AlgorithmArg> for AlgorithmKind {
    fn from(arg: AlgorithmArg) -> AlgorithmKind {
        match arg {
            AlgorithmArg::Autopart => AlgorithmKind::AutoPart,
            AlgorithmArg::Hillclimb => AlgorithmKind::HillClimb,
            AlgorithmArg::Hyrise => AlgorithmKind::Hyrise,
            AlgorithmArg::Navathe => AlgorithmKind::Navathe,
            AlgorithmArg::O2p => AlgorithmKind::O2p,
            AlgorithmArg::Optimal => AlgorithmKind::Optimal,
            AlgorithmArg::Trojan => AlgorithmKind::Trojan,
            AlgorithmArg::Dream => AlgorithmKind::Dream,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CostModelArg {
    Disk,
    DiskSelectivity,
    Mem,
}

impl From<CostModelArg> for CostModelKind {
    fn from(arg: CostModelArg) -> CostModelKind {
        match arg {
            CostModelArg::Disk => CostModelKind::Disk,
            CostModelArg::DiskSelectivity => CostModelKind::DiskSelectivity,
            CostModelArg::Mem => CostModelKind::Mem,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum O2pModeArg {
    Pruning,
    Greedy,
    Dynamic,
}

impl From<O2pModeArg> for O2pMode {
    fn from(arg: O2pModeArg) -> O2pMode {
        match arg {
            O2pModeArg::Pruning => O2pMode::Pruning,
            O2pModeArg::Greedy => O2pMode::Greedy,
            O2pModeArg::Dynamic => O2pMode::Dynamic,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            workload,
            algorithm,
            cost_model,
            o2p_mode,
            replication_factor,
            metis_binary,
        } => {
            let table = load_table(&workload)?;
            let config = AlgorithmConfig::new(table, cost_model.into());
            let mut algo = build_algorithm(
                algorithm,
                config,
                o2p_mode.into(),
                replication_factor,
                &metis_binary,
            )?;
            run_one(algo.as_mut())
        }
        Commands::Compare {
            workload,
            cost_model,
            with_hyrise,
            metis_binary,
        } => {
            let table = load_table(&workload)?;
            compare_all(&table, cost_model.into(), with_hyrise, &metis_binary)
        }
        Commands::Info { workload } => {
            let table = load_table(&workload)?;
            print_info(&table);
            Ok(())
        }
    }
}

fn load_table(path: &Path) -> Result<Table> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading workload file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing workload file {}", path.display()))
}

fn build_algorithm(
    algorithm: AlgorithmArg,
    config: AlgorithmConfig,
    o2p_mode: O2pMode,
    replication_factor: usize,
    metis_binary: &str,
) -> Result<Box<dyn VerticalPartitioner>> {
    Ok(match algorithm {
        AlgorithmArg::O2p => Box::new(O2p::with_mode(config, o2p_mode)),
        AlgorithmArg::Hyrise => Box::new(Hyrise::with_graph_partitioner(
            config,
            Box::new(MetisPartitioner::with_binary(metis_binary)),
        )),
        AlgorithmArg::Trojan => Box::new(
            TrojanLayout::new(config)?.with_replication_factor(replication_factor),
        ),
        other => create_algorithm(other.into(), config)?,
    })
}

fn run_one(algo: &mut dyn VerticalPartitioner) -> Result<()> {
    let layout = algo.partition()?;
    let config = algo.config();
    let table = &config.table;

    print_layout(&layout, table);

    match &layout {
        Layout::Partitioning(partitioning) => {
            let calculator = config.partitioning_calculator();
            let costs = calculator.partitioning_costs(partitioning);
            println!();
            println!(
                "cost: {:.2} (seek {:.2}, scan {:.2})",
                costs.total(),
                costs.seek,
                costs.scan
            );

            let profiler = PartitioningProfiler::new(&config.w);
            println!(
                "redundant bytes read per row: {}",
                profiler.redundant_bytes_read_per_row(
                    partitioning,
                    &(0..config.w.query_count).collect::<Vec<_>>(),
                )
            );
            println!(
                "redundant fraction of data read: {:.4}",
                profiler.fraction_of_redundant_bytes_read(partitioning)
            );
            println!(
                "attribute joins per row: {}",
                profiler.attribute_joins_per_row(
                    partitioning,
                    &(0..config.w.query_count).collect::<Vec<_>>(),
                )
            );
        }
        Layout::Partitions { partitions, plan } => {
            let calculator = config.partitions_calculator();
            println!();
            println!("cost: {:.2}", calculator.partitions_cost(partitions, plan));

            let profiler = PartitionsProfiler::new(&config.w);
            println!(
                "redundant bytes read per row: {}",
                profiler.redundant_bytes_read_per_row(partitions, plan)
            );
            println!(
                "redundant fraction of data read: {:.4}",
                profiler.fraction_of_redundant_bytes_read(partitions, plan)
            );
            println!(
                "attribute joins per row: {}",
                profiler.attribute_joins_per_row(plan)
            );
        }
    }

    let stats = algo.stats();
    println!();
    println!(
        "search: {} candidates, {} iterations, {:?}",
        stats.candidate_set_size, stats.iterations, stats.elapsed
    );

    Ok(())
}

fn print_layout(layout: &Layout, table: &Table) {
    let attribute_name = |a: usize| table.attributes[a].name.clone();

    match layout {
        Layout::Partitioning(partitioning) => {
            println!("layout of {}:", table.name);
            for (p, attributes) in map_of_partitioning(partitioning) {
                let names: Vec<String> = attributes.iter().map(|&a| attribute_name(a)).collect();
                println!("  partition {p}: {}", names.join(", "));
            }
        }
        Layout::Partitions { partitions, plan } => {
            println!("layout of {} (overlapping):", table.name);
            for (p, attributes) in partitions {
                let names: Vec<String> = attributes.iter().map(|&a| attribute_name(a)).collect();
                println!("  partition {p}: {}", names.join(", "));
            }
            println!("selection plan:");
            for (q, selected) in plan {
                let partitions: Vec<String> = selected.iter().map(|p| p.to_string()).collect();
                println!(
                    "  {}: partitions {}",
                    table.queries[*q].name,
                    partitions.join(", ")
                );
            }
        }
    }
}

fn compare_all(
    table: &Table,
    cost_model: CostModelKind,
    with_hyrise: bool,
    metis_binary: &str,
) -> Result<()> {
    let kinds = [
        AlgorithmArg::Autopart,
        AlgorithmArg::Hillclimb,
        AlgorithmArg::Hyrise,
        AlgorithmArg::Navathe,
        AlgorithmArg::O2p,
        AlgorithmArg::Optimal,
        AlgorithmArg::Trojan,
        AlgorithmArg::Dream,
    ];

    println!(
        "{:<12} {:>14} {:>12} {:>12}",
        "algorithm", "cost", "iterations", "elapsed"
    );
    for kind in kinds {
        if matches!(kind, AlgorithmArg::Hyrise) && !with_hyrise {
            continue;
        }

        let config = AlgorithmConfig::new(table.clone(), cost_model);
        let mut algo = build_algorithm(kind, config, O2pMode::default(), 1, metis_binary)?;
        let layout = algo
            .partition()
            .with_context(|| format!("running {kind:?}"))?;

        let config = algo.config();
        let cost = match &layout {
            Layout::Partitioning(partitioning) => config
                .partitioning_calculator()
                .partitioning_cost(partitioning),
            Layout::Partitions { partitions, plan } => config
                .partitions_calculator()
                .partitions_cost(partitions, plan),
        };

        let stats = algo.stats();
        println!(
            "{:<12} {:>14.2} {:>12} {:>12?}",
            format!("{kind:?}").to_lowercase(),
            cost,
            stats.iterations,
            stats.elapsed
        );
    }

    Ok(())
}

fn print_info(table: &Table) {
    let row_size: u32 = table.attribute_sizes().iter().sum();

    println!("table {}: {} rows, {} bytes per row", table.name, table.num_rows, row_size);
    println!("attributes:");
    for attribute in &table.attributes {
        println!("  {} ({} bytes)", attribute.name, attribute.size);
    }
    println!("queries:");
    for query in &table.queries {
        let projected: Vec<String> = query
            .projected
            .iter()
            .map(|&a| table.attributes[a].name.clone())
            .collect();
        println!(
            "  {} (weight {}): {}",
            query.name,
            query.weight,
            projected.join(", ")
        );
    }
}
