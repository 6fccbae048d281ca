use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use clonetree::input;
use clonetree::phi::ProjectionSolver;
use clonetree::sampler::{self, SampleConfig};
use clonetree::tree;

#[derive(Debug, Parser)]
#[clap(name = "clonetree")]
#[clap(about = "Sample clone trees from mutation-cluster read counts via MCMC.", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run multi-chain MCMC tree sampling
    #[clap(arg_required_else_help = true)]
    Sample {
        /// input path for the JSON data document
        #[clap(short, long, value_parser, required = true)]
        input: PathBuf,

        /// output path for the merged posterior JSON
        #[clap(short, long, value_parser, required = true)]
        output: PathBuf,

        /// optional output path for a per-sample summary CSV
        #[clap(long, value_parser)]
        summary: Option<PathBuf>,

        /// number of independent chains
        #[clap(short, long, value_parser, default_value_t = 4)]
        nchains: usize,

        /// posterior samples kept per chain
        #[clap(short, long, value_parser, default_value_t = 1000)]
        trees_per_chain: usize,

        /// samples discarded from the start of each chain
        #[clap(short, long, value_parser, default_value_t = 200)]
        burnin_per_chain: usize,

        /// structural edits per proposal
        #[clap(long, value_parser, default_value_t = 1)]
        tree_perturbations: usize,

        /// worker count for concurrent chains; 0 runs chains sequentially
        #[clap(short, long, value_parser, default_value_t = 0)]
        parallel: usize,

        /// base random seed; per-chain seeds are derived from it
        #[clap(short, long, value_parser, default_value_t = 0)]
        seed: u64,
    },

    /// Score one fixed tree without sampling
    #[clap(arg_required_else_help = true)]
    Score {
        /// input path for the JSON data document
        #[clap(short, long, value_parser, required = true)]
        input: PathBuf,

        /// JSON file holding the tree's parent vector
        #[clap(short, long, value_parser, required = true)]
        tree: PathBuf,
    },
}

fn main() {
    let args = Cli::parse();
    if let Err(err) = run(args) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn run(args: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        Commands::Sample {
            input,
            output,
            summary,
            nchains,
            trees_per_chain,
            burnin_per_chain,
            tree_perturbations,
            parallel,
            seed,
        } => {
            let data = input::load_input(&input)?;
            let config = SampleConfig {
                base_seed: seed,
                nchains,
                trees_per_chain,
                burnin_per_chain,
                tree_perturbations,
                parallel,
            };

            println!("Sampling trees...");
            println!("  Clusters: {}", data.clusters.len());
            println!("  Mutations: {}", data.clusters.num_mutations());
            println!(
                "  Chains: {} ({} trees + {} burn-in each)",
                nchains, trees_per_chain, burnin_per_chain
            );
            println!("  Parallel workers: {}", parallel);

            let samples = sampler::sample_trees(&data, &ProjectionSolver, &config);
            if let Some(best) = sampler::best_sample(&samples) {
                println!("Best log-likelihood: {:.4}", best.llh);
                println!("Best tree parents: {:?}", &tree::parent_vector(&best.adj)[1..]);
            }

            input::write_results_json(&output, &samples)?;
            println!("Posterior samples saved to: {:?}", output);
            if let Some(summary_path) = summary {
                input::write_summary_csv(&summary_path, &samples)?;
                println!("Summary saved to: {:?}", summary_path);
            }
            Ok(())
        }
        Commands::Score { input, tree: tree_path } => {
            let data = input::load_input(&input)?;
            let adj = input::load_tree(&tree_path)?;
            let sample = sampler::score_tree(&data, &ProjectionSolver, &adj);
            println!("Log-likelihood: {:.4}", sample.llh);
            Ok(())
        }
    }
}
