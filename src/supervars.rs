/// Aggregated per-cluster read counts ("supervariants").
use serde::{Deserialize, Serialize};

/// Read-count summary for one non-root cluster: one variant/reference pair
/// per tissue sample, plus the expected variant read fraction under
/// heterozygosity for that cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Supervar {
    pub name: String,
    pub var_reads: Vec<f64>,
    pub ref_reads: Vec<f64>,
    pub omega: f64,
}

impl Supervar {
    pub fn num_samples(&self) -> usize {
        self.var_reads.len()
    }

    /// Naive per-sample cell-fraction estimate V / (omega * (V + R)),
    /// clamped into [0, 1]. Zero-coverage samples estimate 0.
    pub fn phi_hat(&self) -> Vec<f64> {
        self.var_reads
            .iter()
            .zip(&self.ref_reads)
            .map(|(&v, &r)| {
                let total = v + r;
                if total == 0.0 {
                    0.0
                } else {
                    (v / (self.omega * total)).clamp(0.0, 1.0)
                }
            })
            .collect()
    }
}

/// Panic unless all supervariants agree on sample count and carry sane
/// counts. Downstream Beta parameters assume non-negative reads and a
/// positive omega.
pub fn assert_consistent(supervars: &[Supervar]) {
    let nsamples = supervars.first().map_or(0, Supervar::num_samples);
    for sv in supervars {
        assert_eq!(
            sv.var_reads.len(),
            nsamples,
            "supervariant {} has inconsistent sample count",
            sv.name
        );
        assert_eq!(
            sv.ref_reads.len(),
            nsamples,
            "supervariant {} has inconsistent sample count",
            sv.name
        );
        assert!(sv.omega > 0.0, "supervariant {} needs omega > 0", sv.name);
        for counts in [&sv.var_reads, &sv.ref_reads] {
            for &c in counts.iter() {
                assert!(c >= 0.0, "supervariant {} has negative read counts", sv.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(var: Vec<f64>, refr: Vec<f64>) -> Supervar {
        Supervar {
            name: "C1".to_string(),
            var_reads: var,
            ref_reads: refr,
            omega: 0.5,
        }
    }

    #[test]
    fn phi_hat_scales_by_omega() {
        let s = sv(vec![20.0], vec![60.0]);
        // 20 / (0.5 * 80) = 0.5
        assert!((s.phi_hat()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn phi_hat_handles_zero_coverage() {
        let s = sv(vec![0.0], vec![0.0]);
        assert_eq!(s.phi_hat()[0], 0.0);
    }

    #[test]
    fn phi_hat_is_clamped() {
        let s = sv(vec![90.0], vec![10.0]);
        assert_eq!(s.phi_hat()[0], 1.0);
    }

    #[test]
    #[should_panic(expected = "inconsistent sample count")]
    fn mismatched_sample_counts_are_rejected() {
        let a = sv(vec![1.0, 2.0], vec![3.0, 4.0]);
        let b = sv(vec![1.0], vec![3.0]);
        assert_consistent(&[a, b]);
    }
}
