/// Pairwise ancestry-relation tensors between mutations.
use ndarray::Array3;

use crate::tree::{self, Adjacency};

/// Mutually exclusive relation categories between a mutation pair (i, j).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// i and j share a cluster.
    Cocluster = 0,
    /// i's cluster is a strict ancestor of j's.
    AncDesc = 1,
    /// i's cluster is a strict descendant of j's.
    DescAnc = 2,
    /// i and j lie on different branches.
    DiffBranches = 3,
}

pub const NUM_RELATIONS: usize = 4;

/// Partition of M mutations into K clusters. Cluster 0 belongs to the root
/// (normal population) and is normally empty; the remaining clusters cover
/// the mutation indices 0..M exactly once.
#[derive(Clone, Debug)]
pub struct Clusters {
    pub members: Vec<Vec<usize>>,
}

impl Clusters {
    pub fn new(members: Vec<Vec<usize>>) -> Self {
        assert!(!members.is_empty(), "at least the root cluster is required");
        let m: usize = members.iter().map(|c| c.len()).sum();
        let mut seen = vec![false; m];
        for cluster in &members {
            for &midx in cluster {
                assert!(midx < m, "mutation index {} out of range for {} mutations", midx, m);
                assert!(!seen[midx], "mutation index {} assigned to two clusters", midx);
                seen[midx] = true;
            }
        }
        Clusters { members }
    }

    /// Number of cluster nodes K, root included.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total mutation count M across all clusters.
    pub fn num_mutations(&self) -> usize {
        self.members.iter().map(|c| c.len()).sum()
    }
}

/// Derive the M x M x 4 relation tensor implied by a tree over clusters.
///
/// Panics if any mutation pair ends up without exactly one relation marked;
/// that would mean the closure and the partition disagree, which invalidates
/// every downstream sample.
pub fn make_mutrel_tensor(adj: &Adjacency, clusters: &Clusters) -> Array3<f64> {
    assert_eq!(adj.nrows(), clusters.len(), "adjacency and cluster count must agree");
    let mut anc = tree::make_ancestral(adj);
    // Strict ancestry only: same-cluster mutations must not read as
    // self-ancestors.
    for i in 0..anc.nrows() {
        anc[[i, i]] = 0;
    }

    let m = clusters.num_mutations();
    let k = clusters.len();
    let mut mutrel = Array3::zeros((m, m, NUM_RELATIONS));

    for kidx in 0..k {
        let self_muts = &clusters.members[kidx];
        for &i in self_muts {
            for &j in self_muts {
                mutrel[[i, j, Relation::Cocluster as usize]] = 1.0;
            }
        }
        for cidx in 0..k {
            if anc[[kidx, cidx]] == 0 {
                continue;
            }
            for &i in self_muts {
                for &j in &clusters.members[cidx] {
                    mutrel[[i, j, Relation::AncDesc as usize]] = 1.0;
                    mutrel[[j, i, Relation::DescAnc as usize]] = 1.0;
                }
            }
        }
    }

    for i in 0..m {
        for j in 0..m {
            let marked: f64 = (0..NUM_RELATIONS - 1)
                .map(|r| mutrel[[i, j, r]])
                .sum();
            if marked == 0.0 {
                mutrel[[i, j, Relation::DiffBranches as usize]] = 1.0;
            }
            let total: f64 = (0..NUM_RELATIONS).map(|r| mutrel[[i, j, r]]).sum();
            assert!(
                total == 1.0,
                "mutation pair ({}, {}) has {} relations marked instead of 1",
                i,
                j,
                total
            );
        }
    }

    mutrel
}
