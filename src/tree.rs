/// Rooted-tree adjacency matrices and the structural MCMC move.
use ndarray::Array2;
use rand::Rng;

/// Node 0 always denotes the non-mutated normal population.
pub const ROOT: usize = 0;

/// K x K indicator matrix over cluster nodes. The diagonal is all 1 (a node
/// references itself); every non-root column carries exactly one additional 1
/// marking the node's parent, so the off-diagonal structure is an arborescence
/// rooted at node 0.
pub type Adjacency = Array2<u8>;

/// Panic unless `adj` satisfies the tree invariants: all-ones diagonal,
/// root column with a single entry, every other column with exactly two,
/// and every node reachable from the root without cycles.
pub fn assert_valid(adj: &Adjacency) {
    let k = adj.nrows();
    assert_eq!(k, adj.ncols(), "adjacency must be square");
    assert!(k >= 1, "adjacency must contain at least the root node");

    for i in 0..k {
        assert_eq!(adj[[i, i]], 1, "adjacency diagonal must be all 1");
    }
    for v in adj.iter() {
        assert!(*v == 0 || *v == 1, "adjacency entries must be 0 or 1");
    }

    let total: u32 = adj.iter().map(|&v| v as u32).sum();
    assert_eq!(
        total,
        (2 * k - 1) as u32,
        "adjacency must contain exactly K self-edges and K-1 parent edges"
    );

    let root_col: u32 = (0..k).map(|i| adj[[i, ROOT]] as u32).sum();
    assert_eq!(root_col, 1, "root column must contain only the self-edge");
    for j in 1..k {
        let col: u32 = (0..k).map(|i| adj[[i, j]] as u32).sum();
        assert_eq!(col, 2, "non-root column {} must have self-edge plus one parent", j);
    }

    // Walking up from every node must reach the root within K steps.
    let parents = parent_vector(adj);
    for mut node in 1..k {
        let mut steps = 0;
        while node != ROOT {
            node = parents[node];
            steps += 1;
            assert!(steps <= k, "adjacency contains a cycle");
        }
    }
}

/// Extract the parent of each node. The root maps to itself.
pub fn parent_vector(adj: &Adjacency) -> Vec<usize> {
    let k = adj.nrows();
    let mut parents = vec![ROOT; k];
    for j in 1..k {
        for i in 0..k {
            if i != j && adj[[i, j]] == 1 {
                parents[j] = i;
            }
        }
    }
    parents
}

/// Build an adjacency from the parents of nodes 1..K (the root has none).
pub fn adj_from_parents(parents: &[usize]) -> Adjacency {
    let k = parents.len() + 1;
    let mut adj = Array2::eye(k);
    for (child, &parent) in parents.iter().enumerate() {
        assert!(parent < k, "parent {} out of range for {} nodes", parent, k);
        adj[[parent, child + 1]] = 1;
    }
    adj
}

/// Ancestral closure: entry (i, j) is 1 iff i is an ancestor of j. The
/// diagonal is set, so callers wanting the strict relation zero it first.
pub fn make_ancestral(adj: &Adjacency) -> Array2<u8> {
    let k = adj.nrows();
    let parents = parent_vector(adj);
    let mut anc = Array2::zeros((k, k));
    for j in 0..k {
        anc[[j, j]] = 1;
        let mut node = j;
        let mut steps = 0;
        while node != ROOT {
            node = parents[node];
            anc[[node, j]] = 1;
            steps += 1;
            assert!(steps <= k, "adjacency contains a cycle");
        }
    }
    anc
}

/// Branching template: every non-root node is a direct child of the root.
/// This is the chain initialization of choice since it needs no corrective
/// moves relative to a linear or partially-random start.
pub fn init_adj_branching(k: usize) -> Adjacency {
    let mut adj = Array2::eye(k);
    for j in 1..k {
        adj[[ROOT, j]] = 1;
    }
    adj
}

/// Linear template: 0 -> 1 -> ... -> K-1.
pub fn init_adj_linear(k: usize) -> Adjacency {
    let mut adj = Array2::eye(k);
    for j in 1..k {
        adj[[j - 1, j]] = 1;
    }
    adj
}

/// Random template. Node j picks a parent uniformly among nodes < j, which
/// cannot create a cycle.
pub fn init_adj_random(k: usize, rng: &mut impl Rng) -> Adjacency {
    let mut adj = Array2::eye(k);
    for j in 1..k {
        let parent = rng.gen_range(0..j);
        adj[[parent, j]] = 1;
    }
    adj
}

/// Propose a new tree by one local structural edit: draw two distinct nodes
/// (A, B) uniformly and apply the deterministic edit of `permute_adj_pair`.
pub fn permute_adj(adj: &Adjacency, rng: &mut impl Rng) -> Adjacency {
    let k = adj.nrows();
    if k < 2 {
        // Only the root exists; no structural move is possible.
        return adj.clone();
    }
    let a = rng.gen_range(0..k);
    let mut b = rng.gen_range(0..k);
    while b == a {
        b = rng.gen_range(0..k);
    }
    permute_adj_pair(adj, a, b)
}

/// The deterministic edit for a chosen pair (A, B).
///
/// B = root is a defined no-op: the root must never become a non-root node,
/// and the unchanged adjacency is still a valid proposal. If B is an ancestor
/// of A the two nodes swap positions in the tree (rows and columns exchanged,
/// with a direct B->A edge restored as A->B), which cannot create a cycle.
/// Otherwise B is re-parented to become a direct child of A.
pub fn permute_adj_pair(adj: &Adjacency, a: usize, b: usize) -> Adjacency {
    assert_valid(adj);
    assert_ne!(a, b, "permutation requires two distinct nodes");
    let k = adj.nrows();

    if b == ROOT {
        return adj.clone();
    }

    let anc = make_ancestral(adj);
    let mut new = adj.clone();
    for i in 0..k {
        new[[i, i]] = 0;
    }

    if anc[[b, a]] == 1 {
        // B is an ancestor of A, so A cannot also be one of B.
        debug_assert_eq!(anc[[a, b]], 0);
        debug_assert_eq!(adj[[a, b]], 0);
        let had_direct = new[[b, a]] == 1;
        if had_direct {
            new[[b, a]] = 0;
        }
        for j in 0..k {
            let t = new[[a, j]];
            new[[a, j]] = new[[b, j]];
            new[[b, j]] = t;
        }
        for i in 0..k {
            let t = new[[i, a]];
            new[[i, a]] = new[[i, b]];
            new[[i, b]] = t;
        }
        if had_direct {
            new[[a, b]] = 1;
        }
    } else {
        // Move the subtree rooted at B under A.
        for i in 0..k {
            new[[i, b]] = 0;
        }
        new[[a, b]] = 1;
    }

    for i in 0..k {
        new[[i, i]] = 1;
    }
    new
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn branching_init_is_valid() {
        for k in 1..8 {
            let adj = init_adj_branching(k);
            assert_valid(&adj);
            let parents = parent_vector(&adj);
            for j in 1..k {
                assert_eq!(parents[j], ROOT);
            }
        }
    }

    #[test]
    fn linear_init_closure() {
        let adj = init_adj_linear(4);
        assert_valid(&adj);
        let anc = make_ancestral(&adj);
        assert_eq!(anc[[0, 3]], 1);
        assert_eq!(anc[[1, 3]], 1);
        assert_eq!(anc[[3, 1]], 0);
        assert_eq!(anc[[2, 2]], 1);
    }

    #[test]
    fn root_target_is_bit_identical_noop() {
        let adj = init_adj_linear(5);
        let out = permute_adj_pair(&adj, 3, ROOT);
        assert_eq!(adj, out);
    }

    #[test]
    fn reparent_moves_subtree() {
        // 0 -> 1 -> 2, 0 -> 3. Move 3 under 2.
        let adj = adj_from_parents(&[0, 1, 0]);
        let out = permute_adj_pair(&adj, 2, 3);
        assert_valid(&out);
        assert_eq!(parent_vector(&out), vec![0, 0, 1, 2]);
    }

    #[test]
    fn ancestor_swap_preserves_validity() {
        let adj = init_adj_linear(5);
        // 1 is an ancestor of 3: swap their positions.
        let out = permute_adj_pair(&adj, 3, 1);
        assert_valid(&out);
        let anc = make_ancestral(&out);
        assert_eq!(anc[[3, 1]], 1);
    }

    #[test]
    fn direct_parent_swap_restores_edge() {
        let adj = init_adj_linear(3);
        // 1 is the direct parent of 2.
        let out = permute_adj_pair(&adj, 2, 1);
        assert_valid(&out);
        // The direct edge survives with the roles exchanged.
        assert_eq!(out[[2, 1]], 1);
        assert_eq!(parent_vector(&out), vec![0, 2, 0]);
    }

    #[test]
    fn random_walk_of_moves_stays_valid() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut adj = init_adj_branching(6);
        for _ in 0..500 {
            adj = permute_adj(&adj, &mut rng);
            assert_valid(&adj);
        }
    }

    #[test]
    #[should_panic(expected = "K-1 parent edges")]
    fn orphan_node_is_rejected() {
        let mut adj: Adjacency = Array2::eye(3);
        adj[[0, 1]] = 1;
        // Node 2 has no parent.
        assert_valid(&adj);
    }
}
