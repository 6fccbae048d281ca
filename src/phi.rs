/// Cell-fraction solver seam.
///
/// The sampler only depends on the `PhiSolver` contract, so a native library
/// binding, a subprocess, or the built-in projection below can be swapped in
/// without touching the chain logic.
use ndarray::Array2;

use crate::supervars::Supervar;
use crate::tree::{self, Adjacency, ROOT};

/// Solver outputs more negative than this are a contract violation.
pub const NEG_PHI_TOLERANCE: f64 = 1e-8;

/// Maps a tree and per-cluster read statistics to one cell fraction per node
/// per sample. Row 0 (the root) must be all 1; every node's fraction must be
/// at least the sum of its children's in each sample.
pub trait PhiSolver: Sync {
    fn fit_phis(&self, adj: &Adjacency, supervars: &[Supervar]) -> Array2<f64>;
}

/// Deterministic feasible projection of the naive read-ratio estimates.
///
/// Fractions are allocated top-down in breadth-first order: each node
/// receives its raw estimate, capped by whatever capacity its parent has not
/// yet granted to earlier siblings. The result always satisfies the subtree
/// constraint, at the cost of favoring lower-indexed siblings when the raw
/// estimates are jointly infeasible.
pub struct ProjectionSolver;

impl PhiSolver for ProjectionSolver {
    fn fit_phis(&self, adj: &Adjacency, supervars: &[Supervar]) -> Array2<f64> {
        let k = adj.nrows();
        assert_eq!(supervars.len(), k - 1, "one supervariant per non-root node");
        let nsamples = supervars.first().map_or(0, Supervar::num_samples);

        let phi_hat: Vec<Vec<f64>> = supervars.iter().map(Supervar::phi_hat).collect();
        let mut phi = Array2::zeros((k, nsamples));
        for s in 0..nsamples {
            phi[[ROOT, s]] = 1.0;
        }

        let parents = tree::parent_vector(adj);
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); k];
        for j in 1..k {
            children[parents[j]].push(j);
        }

        let mut order = vec![ROOT];
        let mut i = 0;
        while i < order.len() {
            for &c in &children[order[i]] {
                order.push(c);
            }
            i += 1;
        }

        for s in 0..nsamples {
            for &node in &order {
                let mut granted: f64 = 0.0;
                for &c in &children[node] {
                    let avail = (phi[[node, s]] - granted).max(0.0);
                    phi[[c, s]] = phi_hat[c - 1][s].min(avail);
                    granted += phi[[c, s]];
                }
            }
        }

        phi
    }
}

/// Enforce the solver output contract: clamp tiny numerical negatives to
/// zero, panic on anything worse.
pub fn clamp_solver_output(phi: &mut Array2<f64>) {
    for v in phi.iter_mut() {
        assert!(
            *v >= -NEG_PHI_TOLERANCE,
            "phi solver returned {} which violates the non-negativity contract",
            v
        );
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}
