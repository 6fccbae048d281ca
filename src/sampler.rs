/// Metropolis-Hastings chain driver and multi-chain orchestration.
use std::sync::Arc;

use indicatif::ProgressBar;
use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::likelihood;
use crate::mutrel::Clusters;
use crate::phi::PhiSolver;
use crate::supervars::{self, Supervar};
use crate::tree::{self, Adjacency};

/// Observed inputs shared by every chain: the empirical relation tensor,
/// per-cluster read counts and the cluster partition.
pub struct TreeInput {
    pub data_mutrel: Array3<f64>,
    pub supervars: Vec<Supervar>,
    pub clusters: Clusters,
}

impl TreeInput {
    pub fn new(data_mutrel: Array3<f64>, supervars: Vec<Supervar>, clusters: Clusters) -> Self {
        let m = clusters.num_mutations();
        assert_eq!(
            data_mutrel.shape(),
            &[m, m, crate::mutrel::NUM_RELATIONS],
            "observed relation tensor shape must match the cluster partition"
        );
        assert_eq!(
            supervars.len(),
            clusters.len() - 1,
            "one supervariant per non-root cluster"
        );
        supervars::assert_consistent(&supervars);
        TreeInput {
            data_mutrel,
            supervars,
            clusters,
        }
    }
}

/// One posterior sample: immutable once recorded.
#[derive(Clone, Debug)]
pub struct TreeSample {
    pub adj: Adjacency,
    pub phi: Array2<f64>,
    pub llh: f64,
}

/// Orchestrator settings.
#[derive(Clone, Copy, Debug)]
pub struct SampleConfig {
    pub base_seed: u64,
    pub nchains: usize,
    pub trees_per_chain: usize,
    pub burnin_per_chain: usize,
    /// Structural edits per proposal. Values above 1 take larger steps by
    /// screening all but the last edit with a relation-only Metropolis test.
    pub tree_perturbations: usize,
    /// Worker count for concurrent chains; 0 runs chains sequentially.
    pub parallel: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        SampleConfig {
            base_seed: 0,
            nchains: 1,
            trees_per_chain: 1000,
            burnin_per_chain: 0,
            tree_perturbations: 1,
            parallel: 0,
        }
    }
}

/// Symmetric-proposal Metropolis-Hastings rule: accept iff the likelihood
/// gain beats ln(U). Any candidate at least as good as the incumbent is
/// accepted regardless of the draw.
pub fn is_accepted(new_llh: f64, old_llh: f64, u: f64) -> bool {
    new_llh - old_llh >= u.ln()
}

/// Derive the seed for one chain from the base seed, kept within the 32-bit
/// unsigned range so runs are reproducible across platforms.
pub fn chain_seed(base_seed: u64, chain_index: usize) -> u64 {
    (base_seed % (1u64 << 32) + chain_index as u64 + 1) % (1u64 << 32)
}

/// Build a proposal from the current tree by applying the structural edit
/// `perturbations` times. Intermediate edits are accepted or rejected on the
/// relation fit alone; the final edit is kept unconditionally so the caller's
/// full-likelihood test decides the outcome. With `perturbations == 1` this
/// is a single unscreened edit.
fn propose_candidate(
    input: &TreeInput,
    solver: &dyn PhiSolver,
    adj: &Adjacency,
    perturbations: usize,
    rng: &mut StdRng,
) -> Adjacency {
    assert!(perturbations >= 1, "at least one edit per proposal");
    let mut curr = adj.clone();
    let mut curr_fit: Option<f64> = None;
    for step in 0..perturbations {
        let next = tree::permute_adj(&curr, rng);
        if step + 1 == perturbations {
            return next;
        }
        let cf = *curr_fit.get_or_insert_with(|| relation_only_llh(input, solver, &curr));
        let next_fit = relation_only_llh(input, solver, &next);
        if is_accepted(next_fit, cf, rng.gen()) {
            curr = next;
            curr_fit = Some(next_fit);
        }
    }
    curr
}

fn relation_only_llh(input: &TreeInput, solver: &dyn PhiSolver, adj: &Adjacency) -> f64 {
    let (_, llh) = likelihood::calc_llh(
        &input.data_mutrel,
        &input.supervars,
        &input.clusters,
        adj,
        solver,
        false,
    );
    llh
}

fn full_llh(input: &TreeInput, solver: &dyn PhiSolver, adj: &Adjacency) -> (Array2<f64>, f64) {
    likelihood::calc_llh(
        &input.data_mutrel,
        &input.supervars,
        &input.clusters,
        adj,
        solver,
        true,
    )
}

/// Run one chain for exactly `nsamples` recorded samples, sample 0 included.
///
/// The chain starts from the branching template, owns its seeded RNG, and
/// ticks `progress` once per recorded sample. Rejected steps repeat the
/// previous triple, so the output length is always `nsamples`.
pub fn run_chain(
    input: &TreeInput,
    solver: &dyn PhiSolver,
    nsamples: usize,
    tree_perturbations: usize,
    seed: u64,
    progress: Option<&ProgressBar>,
) -> Vec<TreeSample> {
    assert!(nsamples > 0, "a chain must record at least one sample");
    let mut rng = StdRng::seed_from_u64(seed);
    let k = input.clusters.len();

    let init_adj = tree::init_adj_branching(k);
    let (init_phi, init_llh) = full_llh(input, solver, &init_adj);
    let mut samples = Vec::with_capacity(nsamples);
    samples.push(TreeSample {
        adj: init_adj,
        phi: init_phi,
        llh: init_llh,
    });
    if let Some(pb) = progress {
        pb.inc(1);
    }

    for _ in 1..nsamples {
        let old = samples.last().unwrap();
        let new_adj = propose_candidate(input, solver, &old.adj, tree_perturbations, &mut rng);
        let (new_phi, new_llh) = full_llh(input, solver, &new_adj);

        if is_accepted(new_llh, old.llh, rng.gen()) {
            samples.push(TreeSample {
                adj: new_adj,
                phi: new_phi,
                llh: new_llh,
            });
        } else {
            let repeat = old.clone();
            samples.push(repeat);
        }
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    samples
}

/// Launch `nchains` independent chains, trim each chain's burn-in prefix and
/// concatenate the remainders in chain-index order.
///
/// Chains share nothing mutable beyond the progress bar, so with
/// `parallel > 0` they run on a fixed-size rayon pool; completion order does
/// not affect the merge order.
pub fn sample_trees(input: &TreeInput, solver: &dyn PhiSolver, config: &SampleConfig) -> Vec<TreeSample> {
    let nsamples = config.trees_per_chain + config.burnin_per_chain;
    assert!(config.nchains > 0, "at least one chain is required");
    assert!(nsamples > 0, "each chain must record at least one sample");

    let total = config.nchains * nsamples;
    let progress = Arc::new(ProgressBar::new(total as u64));

    let chains: Vec<Vec<TreeSample>> = if config.parallel > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel)
            .build()
            .expect("failed to build chain worker pool");
        pool.install(|| {
            (0..config.nchains)
                .into_par_iter()
                .map(|c| {
                    run_chain(
                        input,
                        solver,
                        nsamples,
                        config.tree_perturbations,
                        chain_seed(config.base_seed, c),
                        Some(&progress),
                    )
                })
                .collect()
        })
    } else {
        (0..config.nchains)
            .map(|c| {
                run_chain(
                    input,
                    solver,
                    nsamples,
                    config.tree_perturbations,
                    chain_seed(config.base_seed, c),
                    Some(&progress),
                )
            })
            .collect()
    };
    progress.finish();

    let mut merged = Vec::with_capacity(config.nchains * config.trees_per_chain);
    for chain in chains {
        merged.extend(chain.into_iter().skip(config.burnin_per_chain));
    }
    merged
}

/// Score one externally supplied tree without sampling.
pub fn score_tree(input: &TreeInput, solver: &dyn PhiSolver, adj: &Adjacency) -> TreeSample {
    tree::assert_valid(adj);
    assert_eq!(adj.nrows(), input.clusters.len(), "tree size must match cluster count");
    let (phi, llh) = full_llh(input, solver, adj);
    TreeSample {
        adj: adj.clone(),
        phi,
        llh,
    }
}

/// Highest-likelihood sample, if any. Earlier samples win ties.
pub fn best_sample(samples: &[TreeSample]) -> Option<&TreeSample> {
    let mut best: Option<&TreeSample> = None;
    for sample in samples {
        if best.map_or(true, |b| sample.llh > b.llh) {
            best = Some(sample);
        }
    }
    best
}
