// ============================================================
// Layer 3b - Ring Perception
// ============================================================
// Ring membership and small rings of a parsed molecule.
//
// A bond is in a ring exactly when it is not a bridge of the
// molecular graph, so one lowlink DFS answers membership. The
// DFS keeps its own stack; long chains never recurse.
//
// `smallest_rings` takes, for every ring bond, the shortest
// cycle through it. The result is the set of small rings the
// aromaticity and scaffold code work on (both rings of a fused
// pair, each ring of a spiro system).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::molecule::Molecule;

/// (neighbour, bond index) per atom
fn bond_adjacency(mol: &Molecule) -> Vec<Vec<(usize, usize)>> {
    let mut adj: Vec<Vec<(usize, usize)>> = vec![Vec::new(); mol.num_atoms()];
    for (bi, b) in mol.bonds.iter().enumerate() {
        adj[b.begin].push((b.end, bi));
        adj[b.end].push((b.begin, bi));
    }
    adj
}

/// `mask[i]` is true if bond `i` lies on at least one ring.
pub fn ring_bond_mask(mol: &Molecule) -> Vec<bool> {
    let n = mol.num_atoms();
    let adj = bond_adjacency(mol);

    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut is_bridge = vec![false; mol.num_bonds()];
    let mut timer = 0usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        disc[root] = timer;
        low[root] = timer;
        timer += 1;

        // (atom, bond we arrived by, next neighbour to visit)
        let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];
        while let Some(top) = stack.last_mut() {
            let (u, parent_bond) = (top.0, top.1);
            if let Some(&(v, bi)) = adj[u].get(top.2) {
                top.2 += 1;
                if bi == parent_bond {
                    continue;
                }
                if disc[v] == usize::MAX {
                    disc[v] = timer;
                    low[v] = timer;
                    timer += 1;
                    stack.push((v, bi, 0));
                } else {
                    low[u] = low[u].min(disc[v]);
                }
            } else {
                stack.pop();
                if let Some(&(p, _, _)) = stack.last() {
                    low[p] = low[p].min(low[u]);
                    if low[u] > disc[p] {
                        is_bridge[parent_bond] = true;
                    }
                }
            }
        }
    }

    is_bridge.into_iter().map(|b| !b).collect()
}

/// `mask[i]` is true if atom `i` belongs to a ring.
pub fn ring_atom_mask(mol: &Molecule) -> Vec<bool> {
    let bonds = ring_bond_mask(mol);
    let mut atoms = vec![false; mol.num_atoms()];
    for (b, in_ring) in mol.bonds.iter().zip(bonds) {
        if in_ring {
            atoms[b.begin] = true;
            atoms[b.end] = true;
        }
    }
    atoms
}

/// Small rings as atom cycles, each listed in walking order.
/// Every ring bond lies on at least one returned ring.
pub fn smallest_rings(mol: &Molecule) -> Vec<Vec<usize>> {
    let ring_bonds = ring_bond_mask(mol);
    let adj = bond_adjacency(mol);

    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut rings = Vec::new();

    for (bi, b) in mol.bonds.iter().enumerate() {
        if !ring_bonds[bi] {
            continue;
        }
        let Some(cycle) = shortest_path(&adj, &ring_bonds, b.begin, b.end, bi) else {
            continue;
        };
        let mut key = cycle.clone();
        key.sort_unstable();
        if seen.insert(key) {
            rings.push(cycle);
        }
    }
    rings
}

/// BFS from `from` to `to` over ring bonds, never using `skip`
fn shortest_path(
    adj:        &[Vec<(usize, usize)>],
    ring_bonds: &[bool],
    from:       usize,
    to:         usize,
    skip:       usize,
) -> Option<Vec<usize>> {
    let mut prev: HashMap<usize, usize> = HashMap::new();
    prev.insert(from, from);
    let mut queue = VecDeque::from([from]);

    while let Some(u) = queue.pop_front() {
        if u == to {
            let mut path = vec![to];
            let mut cur = to;
            while cur != from {
                cur = prev[&cur];
                path.push(cur);
            }
            return Some(path);
        }
        for &(v, bi) in &adj[u] {
            if bi == skip || !ring_bonds[bi] || prev.contains_key(&v) {
                continue;
            }
            prev.insert(v, u);
            queue.push_back(v);
        }
    }
    None
}

/// Index of the bond joining each pair of atoms
pub fn bond_lookup(mol: &Molecule) -> HashMap<(usize, usize), usize> {
    mol.bonds
        .iter()
        .enumerate()
        .map(|(bi, b)| ((b.begin.min(b.end), b.begin.max(b.end)), bi))
        .collect()
}

/// Bond indices around a ring given in walking order
pub fn ring_bond_indices(ring: &[usize], lookup: &HashMap<(usize, usize), usize>) -> Vec<usize> {
    (0..ring.len())
        .filter_map(|k| {
            let (a, b) = (ring[k], ring[(k + 1) % ring.len()]);
            lookup.get(&(a.min(b), a.max(b))).copied()
        })
        .collect()
}
