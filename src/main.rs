use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use structural_imbalance::algorithms::{solve, Solution, SolverConfig, Strategy};
use structural_imbalance::formulate::formulate;
use structural_imbalance::gen_graphs::gen_random_signed_graph;
use structural_imbalance::io::{
    annotated_network, annotated_node_link, node_link, read_matrix_market_as_signed_graph, read_node_link,
    write_json_to_file, write_partition_data_to_file, write_timeline_to_file,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the structural imbalance of a signed network
    Solve(SolveArgs),

    /// Write the structural imbalance of a network year by year as CSV
    Timeline(TimelineArgs),

    /// Generate a random signed network as node-link JSON
    Generate(GenerateArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// Guess from the file extension (.mtx is matrix market, anything else node-link JSON)
    Auto,
    Mtx,
    Json,
}

#[derive(Args, Debug)]
struct SolverArgs {
    /// JSON file with solver settings; the flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Solver to use
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Largest graph solved exactly by the auto strategy
    #[arg(long)]
    exact_threshold: Option<usize>,

    /// Number of local search restarts
    #[arg(short, long)]
    restarts: Option<usize>,

    /// Flip budget of each local search restart
    #[arg(long)]
    max_flips: Option<usize>,

    /// Seed for reproducible local search
    #[arg(short, long)]
    seed: Option<u64>,

    /// Time budget of the local search in milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,
}

impl SolverArgs {
    fn to_config(&self) -> Result<SolverConfig, Box<dyn Error>> {
        let mut config: SolverConfig = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => SolverConfig::default(),
        };
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(exact_threshold) = self.exact_threshold {
            config.exact_threshold = exact_threshold;
        }
        if let Some(restarts) = self.restarts {
            config.restarts = restarts;
        }
        if self.max_flips.is_some() {
            config.max_flips = self.max_flips;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.time_limit_ms.is_some() {
            config.time_limit_ms = self.time_limit_ms;
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// Path of the .mtx or node-link .json file
    input: PathBuf,

    /// Format of the input file
    #[arg(short, long, value_enum, default_value_t = InputFormat::Auto)]
    format: InputFormat,

    /// Keep only groups recorded on these maps (node-link input only)
    #[arg(long)]
    region: Vec<String>,

    /// Keep only events in or before this year (node-link input only)
    #[arg(long)]
    year: Option<i64>,

    /// File where the annotated node-link JSON is stored
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File where the side of every node is stored
    #[arg(short, long)]
    partition_file: Option<PathBuf>,

    #[command(flatten)]
    solver: SolverArgs,
}

#[derive(Args, Debug)]
struct TimelineArgs {
    /// Path of the node-link .json file
    input: PathBuf,

    /// File where the CSV is stored
    output: PathBuf,

    /// First year, defaults to the earliest event
    #[arg(long)]
    start: Option<i64>,

    /// Last year, defaults to the latest event
    #[arg(long)]
    end: Option<i64>,

    /// Keep only groups recorded on these maps
    #[arg(long)]
    region: Vec<String>,

    /// Also report the groups recorded on these maps, judged by the whole network's solution
    #[arg(long)]
    subarea: Vec<String>,

    #[command(flatten)]
    solver: SolverArgs,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Number of nodes
    nodes: usize,

    /// File where the node-link JSON is stored
    output: PathBuf,

    /// Probability that two nodes share an edge
    #[arg(short, long, default_value_t = 0.1)]
    edge_probability: f64,

    /// Probability that an edge is hostile
    #[arg(long, default_value_t = 0.5)]
    hostile_probability: f64,

    /// Seed of the generator
    #[arg(short, long)]
    seed: Option<u64>,
}

fn report<N>(solution: &Solution<N>, elapsed_time: std::time::Duration) {
    println!("Frustrated edges {}", solution.result.frustration_count);
    println!("Structural imbalance {}", solution.result.frustration_ratio());
    println!("Mode {} (optimal: {})", solution.report.mode, solution.is_optimal());
    println!("Distinct assignments {} over {} reads", solution.samples.len(), solution.number_of_reads());
    if solution.report.timed_out {
        println!("Time limit reached, returning the best partition found");
    }
    println!("Execution time {:?}", elapsed_time);
}

fn run_solve(args: SolveArgs) -> Result<(), Box<dyn Error>> {
    let config = args.solver.to_config()?;
    let is_matrix_market = match args.format {
        InputFormat::Mtx => true,
        InputFormat::Json => false,
        InputFormat::Auto => args.input.extension().is_some_and(|extension| extension == "mtx"),
    };

    if is_matrix_market {
        if !args.region.is_empty() || args.year.is_some() {
            return Err("--region and --year need node-link input".into());
        }
        let graph = read_matrix_market_as_signed_graph(&args.input)?;
        let start = Instant::now();
        let solution = solve(&graph, &formulate(&graph), &config)?;
        report(&solution, start.elapsed());
        if let Some(output) = &args.output {
            let value = annotated_node_link(&solution, |_| Default::default(), |_, _| Default::default())?;
            write_json_to_file(&value, output)?;
        }
        write_partition(&solution, args.partition_file.as_deref())?;
        return Ok(());
    }

    let mut network = read_node_link(&args.input)?.in_regions(args.region.as_slice())?;
    if let Some(year) = args.year {
        network = network.up_to_year(year);
    }
    info!(nodes = network.graph.node_count(), edges = network.graph.edge_count(), "loaded network");

    let start = Instant::now();
    let solution = solve(&network.graph, &formulate(&network.graph), &config)?;
    report(&solution, start.elapsed());
    if let Some(output) = &args.output {
        write_json_to_file(&annotated_network(&network, &solution)?, output)?;
    }
    write_partition(&solution, args.partition_file.as_deref())?;
    Ok(())
}

fn write_partition<N: std::fmt::Display>(solution: &Solution<N>, partition_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    if let Some(partition_file) = partition_file {
        write_partition_data_to_file(solution, partition_file)?;
    }
    Ok(())
}

fn run_timeline(args: TimelineArgs) -> Result<(), Box<dyn Error>> {
    let config = args.solver.to_config()?;
    let network = read_node_link(&args.input)?.in_regions(args.region.as_slice())?;
    let Some((first_year, last_year)) = network.year_span() else {
        return Err("no edge of the network carries an event_year".into());
    };
    let years = args.start.unwrap_or(first_year)..=args.end.unwrap_or(last_year);

    let rows = network.timeline(years, args.subarea.as_slice(), &config)?;
    let subarea_name = (!args.subarea.is_empty()).then(|| args.subarea.join("+"));
    write_timeline_to_file(&rows, subarea_name.as_deref(), &args.output)?;
    println!("Created CSV file: {}", args.output.display());
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<(), Box<dyn Error>> {
    let graph = gen_random_signed_graph(args.nodes, args.edge_probability, args.hostile_probability, args.seed)?;
    write_json_to_file(&node_link(&graph)?, &args.output)?;
    println!("Created node-link file: {}", args.output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Solve(args) => run_solve(args),
        Command::Timeline(args) => run_timeline(args),
        Command::Generate(args) => run_generate(args),
    }
}
