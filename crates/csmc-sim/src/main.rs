use std::error::Error;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use csmc_io::read_fasta_file;
use csmc_lik::Alignment;
use csmc_smc::{run, RunConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "csmc-sim", about = "Combinatorial SMC phylogenetic sampler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample trees for the sequences of a FASTA file.
    Run(RunArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// FASTA file holding equal-length nucleotide sequences.
    fasta: PathBuf,
    /// Population size (overrides the configuration).
    #[arg(long)]
    particles: Option<usize>,
    /// Master seed (overrides the configuration).
    #[arg(long)]
    seed: Option<u64>,
    /// YAML run configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for run artefacts (overrides the configuration).
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_smc(args),
    }
}

fn run_smc(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(particles) = args.particles {
        config.particles = particles;
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    if let Some(out) = args.out {
        config.output.run_directory = Some(out);
    }

    let records = read_fasta_file(&args.fasta)?;
    let alignment = Alignment::new(records)?;
    tracing::info!(
        fasta = %args.fasta.display(),
        tips = alignment.tip_count(),
        sites = alignment.site_count(),
        iterations = alignment.tip_count() - 1,
        particles = config.particles,
        "running smc"
    );

    let summary = run(&config, alignment)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for tree in &summary.trees {
        writeln!(out, "{} {}", tree.normalized_weight, tree.newick)?;
    }
    out.flush()?;

    if let Some(best) = summary.best() {
        tracing::info!(
            log_weight = best.log_weight,
            normalized_weight = best.normalized_weight,
            tree = %best.newick,
            "highest-weight tree"
        );
    }
    Ok(())
}
