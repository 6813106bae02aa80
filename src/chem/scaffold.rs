// ============================================================
// Layer 3b - Bemis-Murcko Scaffolds
// ============================================================
// The scaffold of a molecule is its ring systems plus the
// linker atoms that connect them. Repeatedly stripping atoms
// with at most one remaining neighbour removes every side
// chain and leaves that framework; an acyclic molecule strips
// down to nothing. Atoms double-bonded to the framework (the
// O of a ring ketone or amide linker) are put back.
//
// Splitters only need to know which molecules share a
// scaffold, so the framework is reduced to an isomorphism-
// invariant key instead of a canonical SMILES:
//
//   per atom       colour refinement (Weisfeiler-Lehman) over
//                  element, aromaticity, optional chirality
//                  and bond order
//   per component  sorted atom colours + sorted ring sizes
//   whole key      sorted component keys joined by '.'
//
// Ring sizes separate frameworks colour refinement alone
// cannot, e.g. decalin and bicyclopentyl.
//
// Reference: Bemis & Murcko (1996), J. Med. Chem. 39, 2887

use crate::chem::{elements, rings};
use crate::chem::smiles::{parse_smiles, SmilesError};
use crate::domain::molecule::{BondType, ChiralTag, Molecule};

/// Scaffold key for a SMILES string. Acyclic molecules share the empty key.
pub fn scaffold_key(smiles: &str, include_chirality: bool) -> Result<String, SmilesError> {
    let mol = parse_smiles(smiles)?;
    Ok(murcko_key(&mol, include_chirality))
}

/// Atoms that belong to the Murcko framework
pub fn murcko_atoms(mol: &Molecule) -> Vec<bool> {
    let adj = mol.adjacency();
    let mut alive = vec![true; mol.num_atoms()];
    let mut degree: Vec<usize> = adj.iter().map(|n| n.len()).collect();

    let mut stack: Vec<usize> = (0..mol.num_atoms()).filter(|&i| degree[i] <= 1).collect();
    while let Some(u) = stack.pop() {
        if !alive[u] {
            continue;
        }
        alive[u] = false;
        for &v in &adj[u] {
            if alive[v] {
                degree[v] -= 1;
                if degree[v] <= 1 {
                    stack.push(v);
                }
            }
        }
    }

    // exocyclic double bonds to the framework stay
    let mut keep = alive.clone();
    for b in &mol.bonds {
        if b.bond_type != BondType::Double {
            continue;
        }
        match (alive[b.begin], alive[b.end]) {
            (true, false) => keep[b.end] = true,
            (false, true) => keep[b.begin] = true,
            _ => {}
        }
    }
    keep
}

pub fn murcko_key(mol: &Molecule, include_chirality: bool) -> String {
    let keep = murcko_atoms(mol);
    let atoms: Vec<usize> = (0..mol.num_atoms()).filter(|&i| keep[i]).collect();
    if atoms.is_empty() {
        return String::new();
    }

    let labels: Vec<String> = atoms
        .iter()
        .map(|&i| atom_label(mol, i, include_chirality))
        .collect();

    // Neighbour lists inside the framework: (local neighbour, bond type)
    let mut local = vec![usize::MAX; mol.num_atoms()];
    for (li, &gi) in atoms.iter().enumerate() {
        local[gi] = li;
    }
    let mut nbrs: Vec<Vec<(usize, i64)>> = vec![Vec::new(); atoms.len()];
    for b in &mol.bonds {
        if keep[b.begin] && keep[b.end] {
            let (u, v) = (local[b.begin], local[b.end]);
            nbrs[u].push((v, b.bond_type.index()));
            nbrs[v].push((u, b.bond_type.index()));
        }
    }

    let mut ranks = dense_ranks(&labels);
    let mut classes = count_classes(&ranks);
    let signatures = loop {
        let sigs: Vec<(usize, Vec<(i64, usize)>)> = (0..atoms.len())
            .map(|u| {
                let mut around: Vec<(i64, usize)> =
                    nbrs[u].iter().map(|&(v, bt)| (bt, ranks[v])).collect();
                around.sort_unstable();
                (ranks[u], around)
            })
            .collect();

        let next = dense_ranks(&sigs);
        let next_classes = count_classes(&next);
        ranks = next;
        if next_classes == classes {
            break sigs;
        }
        classes = next_classes;
    };

    let parts: Vec<String> = signatures
        .iter()
        .zip(&labels)
        .map(|((_, around), label)| {
            let around: Vec<String> = around.iter().map(|(bt, r)| format!("{bt}:{r}")).collect();
            format!("{label}[{}]", around.join(","))
        })
        .collect();

    let component = components(&nbrs);
    let num_components = component.iter().copied().max().map_or(0, |m| m + 1);

    let mut ring_sizes: Vec<Vec<usize>> = vec![Vec::new(); num_components];
    for ring in rings::smallest_rings(mol) {
        if let Some(&first) = ring.first() {
            ring_sizes[component[local[first]]].push(ring.len());
        }
    }

    let mut keys: Vec<String> = (0..num_components)
        .map(|c| {
            let mut atoms: Vec<&str> = (0..parts.len())
                .filter(|&u| component[u] == c)
                .map(|u| parts[u].as_str())
                .collect();
            atoms.sort_unstable();
            let sizes = &mut ring_sizes[c];
            sizes.sort_unstable();
            let sizes: Vec<String> = sizes.iter().map(|n| n.to_string()).collect();
            format!("{}|r{}", atoms.join(";"), sizes.join(","))
        })
        .collect();
    keys.sort_unstable();
    keys.join(".")
}

/// Connected component id of every framework atom
fn components(nbrs: &[Vec<(usize, i64)>]) -> Vec<usize> {
    let mut component = vec![usize::MAX; nbrs.len()];
    let mut next = 0usize;
    for start in 0..nbrs.len() {
        if component[start] != usize::MAX {
            continue;
        }
        component[start] = next;
        let mut stack = vec![start];
        while let Some(u) = stack.pop() {
            for &(v, _) in &nbrs[u] {
                if component[v] == usize::MAX {
                    component[v] = next;
                    stack.push(v);
                }
            }
        }
        next += 1;
    }
    component
}

fn atom_label(mol: &Molecule, i: usize, include_chirality: bool) -> String {
    let a = &mol.atoms[i];
    let mut s = elements::symbol(a.atomic_num).to_string();
    if a.aromatic {
        s = s.to_ascii_lowercase();
    }
    if include_chirality {
        match a.chirality {
            ChiralTag::Unspecified => {}
            ChiralTag::CounterClockwise => s.push('@'),
            ChiralTag::Clockwise => s.push_str("@@"),
            ChiralTag::Other => s.push('?'),
        }
    }
    s
}

/// Position of each item among the sorted distinct items
fn dense_ranks<T: Ord + Clone>(items: &[T]) -> Vec<usize> {
    let mut distinct = items.to_vec();
    distinct.sort();
    distinct.dedup();
    items
        .iter()
        .map(|it| distinct.binary_search(it).unwrap_or(0))
        .collect()
}

fn count_classes(ranks: &[usize]) -> usize {
    ranks.iter().copied().max().map_or(0, |m| m + 1)
}
