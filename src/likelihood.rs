/// Log-likelihood of a candidate tree against observed relation and
/// read-count data.
use ndarray::{Array2, Array3};
use statrs::distribution::{Beta, Continuous};

use crate::mutrel::{self, Clusters};
use crate::phi::{self, PhiSolver};
use crate::supervars::Supervar;
use crate::tree::{Adjacency, ROOT};

/// Floor on per-entry relation fit so disagreement penalties stay finite.
pub const MUTREL_FIT_EPSILON: f64 = 1e-20;

/// Floor on the summed Beta log-density. Impossible fraction assignments
/// must lose every Metropolis comparison without turning into infinities
/// that cannot be compared or subtracted.
pub const PHI_FIT_FLOOR: f64 = -1e30;

/// Beta shape parameters for every non-root cluster and sample:
/// alpha = 2V + 1, beta = max(1, R - V + 1). Both are strictly positive by
/// construction, even for zero-read clusters.
pub fn calc_beta_params(supervars: &[Supervar]) -> (Array2<f64>, Array2<f64>) {
    let nsamples = supervars.first().map_or(0, Supervar::num_samples);
    let mut alpha = Array2::zeros((supervars.len(), nsamples));
    let mut beta = Array2::zeros((supervars.len(), nsamples));
    for (i, sv) in supervars.iter().enumerate() {
        for s in 0..nsamples {
            let v = sv.var_reads[s];
            let r = sv.ref_reads[s];
            alpha[[i, s]] = 2.0 * v + 1.0;
            beta[[i, s]] = (r - v + 1.0).max(1.0);
        }
    }
    assert!(
        alpha.iter().all(|&a| a > 0.0) && beta.iter().all(|&b| b > 0.0),
        "Beta shape parameters must be strictly positive"
    );
    (alpha, beta)
}

/// Elementwise fit between the observed and tree-derived relation tensors,
/// as a summed log-score. Agreement costs nothing; disagreement is penalized
/// without bound, floored at ln(MUTREL_FIT_EPSILON) per entry.
pub fn mutrel_fit(data_mutrel: &Array3<f64>, tree_mutrel: &Array3<f64>) -> f64 {
    assert_eq!(data_mutrel.shape(), tree_mutrel.shape());
    data_mutrel
        .iter()
        .zip(tree_mutrel.iter())
        .map(|(&d, &t)| (1.0 - (d - t).abs()).max(MUTREL_FIT_EPSILON).ln())
        .sum()
}

/// Score one candidate tree: relation fit plus, when `fit_phis` is set, the
/// Beta log-density of the solver's cell fractions. Returns the fraction
/// matrix alongside the scalar log-likelihood.
///
/// With `fit_phis` false (used for relation-only screening of intermediate
/// perturbation sub-steps) the fraction term is zero and the returned phi is
/// the trivial root-only assignment.
pub fn calc_llh(
    data_mutrel: &Array3<f64>,
    supervars: &[Supervar],
    clusters: &Clusters,
    adj: &Adjacency,
    solver: &dyn PhiSolver,
    fit_phis: bool,
) -> (Array2<f64>, f64) {
    let tree_mutrel = mutrel::make_mutrel_tensor(adj, clusters);
    let relation_fit = mutrel_fit(data_mutrel, &tree_mutrel);

    let k = adj.nrows();
    let nsamples = supervars.first().map_or(0, Supervar::num_samples);
    let (phi, phi_fit) = if fit_phis && k > 1 {
        let mut phi = solver.fit_phis(adj, supervars);
        assert_eq!(phi.shape(), &[k, nsamples], "phi solver returned wrong shape");
        phi::clamp_solver_output(&mut phi);

        let (alpha, beta) = calc_beta_params(supervars);
        let mut sum = 0.0;
        for node in 1..k {
            for s in 0..nsamples {
                let dist = Beta::new(alpha[[node - 1, s]], beta[[node - 1, s]])
                    .expect("Beta shape parameters must be positive");
                sum += dist.ln_pdf(phi[[node, s]]);
            }
        }
        assert!(!sum.is_nan(), "phi fit must not be NaN; check solver output and shapes");
        (phi, sum.max(PHI_FIT_FLOOR))
    } else {
        let mut phi = Array2::zeros((k, nsamples));
        for s in 0..nsamples {
            phi[[ROOT, s]] = 1.0;
        }
        (phi, 0.0)
    };

    let llh = relation_fit + phi_fit;
    assert!(!llh.is_nan(), "log-likelihood must not be NaN");
    assert!(llh < f64::INFINITY, "log-likelihood must never be +infinity");
    (phi, llh)
}
