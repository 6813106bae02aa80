// ============================================================
// Layer 3b - Aromaticity Perception
// ============================================================
// Marks Kekulé-written aromatic rings as aromatic, so that
// `C1=CC=CC=C1` and `c1ccccc1` featurize identically.
//
// Hückel rule over the small rings, then over fused pairs:
//
//   1. every ring atom is a candidate with a pi-electron count
//   2. a ring (or the envelope of two rings sharing a bond)
//      with 4n+2 electrons is aromatic
//   3. its atoms get the aromatic flag, its ring bonds become
//      BondType::Aromatic
//
// Electron counts per atom:
//   double bond inside a ring                  1
//   C with an exocyclic double bond to N or O  0
//   N, P with three single bonds or an H       2
//   O, S, Se, Te with two single bonds         2
//   carbanion / carbocation                    2 / 0
//   boron with only single bonds               0
//   anything else (sp3 carbon, triple bond)    not a candidate
//
// Atoms already written aromatic keep their flag; perception
// never removes aromaticity.

use crate::chem::{elements, rings};
use crate::domain::molecule::{BondType, Molecule};

pub fn perceive_aromaticity(mol: &mut Molecule) {
    let rings = rings::smallest_rings(mol);
    if rings.is_empty() {
        return;
    }
    let ring_bond = rings::ring_bond_mask(mol);
    let lookup = rings::bond_lookup(mol);
    let electrons: Vec<Option<u32>> = (0..mol.num_atoms())
        .map(|i| pi_electrons(mol, i, &ring_bond))
        .collect();

    let ring_bonds: Vec<Vec<usize>> = rings
        .iter()
        .map(|r| rings::ring_bond_indices(r, &lookup))
        .collect();

    let mut aromatic_ring = vec![false; rings.len()];
    let mut aromatic_atoms = vec![false; mol.num_atoms()];
    let mut aromatic_bonds = vec![false; mol.num_bonds()];

    let mut mark = |atoms: &[usize], bonds: &[usize]| {
        for &a in atoms {
            aromatic_atoms[a] = true;
        }
        for &b in bonds {
            aromatic_bonds[b] = true;
        }
    };

    for (k, ring) in rings.iter().enumerate() {
        if huckel(ring, &electrons) {
            aromatic_ring[k] = true;
            mark(ring, &ring_bonds[k]);
        }
    }

    // fused pairs such as azulene: neither ring alone, but the envelope
    for i in 0..rings.len() {
        for j in (i + 1)..rings.len() {
            if aromatic_ring[i] && aromatic_ring[j] {
                continue;
            }
            if !ring_bonds[i].iter().any(|b| ring_bonds[j].contains(b)) {
                continue;
            }
            let mut envelope: Vec<usize> = rings[i].iter().chain(&rings[j]).copied().collect();
            envelope.sort_unstable();
            envelope.dedup();
            if huckel(&envelope, &electrons) {
                mark(&envelope, &ring_bonds[i]);
                mark(&envelope, &ring_bonds[j]);
            }
        }
    }

    for (atom, arom) in mol.atoms.iter_mut().zip(aromatic_atoms) {
        atom.aromatic |= arom;
    }
    for (bond, arom) in mol.bonds.iter_mut().zip(aromatic_bonds) {
        if arom {
            bond.bond_type = BondType::Aromatic;
        }
    }
}

fn huckel(atoms: &[usize], electrons: &[Option<u32>]) -> bool {
    let total: Option<u32> = atoms.iter().map(|&a| electrons[a]).sum();
    matches!(total, Some(t) if t >= 2 && (t - 2) % 4 == 0)
}

/// Pi electrons atom `i` gives to a ring it sits in, or `None`
/// when the atom cannot be part of an aromatic ring.
fn pi_electrons(mol: &Molecule, i: usize, ring_bond: &[bool]) -> Option<u32> {
    let atom = &mol.atoms[i];
    let z = atom.atomic_num;
    if !elements::is_aromatic_capable(z) {
        return None;
    }

    let mut degree = 0u32;
    let mut ring_double = 0u32;
    let mut exo_double_to_hetero = 0u32;
    let mut other_multiple = 0u32;
    let mut aromatic_bonds = 0u32;
    let mut bond_valence = 0u32;

    for (bi, b) in mol.bonds.iter().enumerate() {
        let Some(other) = b.other(i) else { continue };
        degree += 1;
        bond_valence += b.bond_type.valence();
        match b.bond_type {
            BondType::Single => {}
            BondType::Aromatic => aromatic_bonds += 1,
            BondType::Double if ring_bond[bi] => ring_double += 1,
            BondType::Double if matches!(mol.atoms[other].atomic_num, 7 | 8) => exo_double_to_hetero += 1,
            BondType::Double | BondType::Triple => other_multiple += 1,
        }
    }
    let hydrogens = if atom.bracket || atom.aromatic {
        atom.explicit_h.unwrap_or(0) as u32
    } else {
        // organic subset: implicit hydrogens fill the default valence
        elements::organic_max_valence(z).map_or(0, |max| max.saturating_sub(bond_valence))
    };
    let charge = atom.formal_charge;

    if other_multiple > 0 || ring_double + exo_double_to_hetero > 1 {
        return None;
    }
    if exo_double_to_hetero == 1 {
        return (z == 6).then_some(0);
    }
    if ring_double == 1 {
        return Some(1);
    }

    // only single (or already aromatic) bonds from here
    match z {
        6 => match charge {
            -1 => Some(2),
            1 => Some(0),
            _ if aromatic_bonds > 0 => Some(1),
            _ => None,
        },
        7 | 15 | 33 => {
            if charge == 0 && (hydrogens > 0 || degree == 3) {
                Some(2)
            } else if aromatic_bonds > 0 {
                Some(1)
            } else {
                None
            }
        }
        8 | 16 | 34 | 52 => match charge {
            0 if degree == 2 => Some(2),
            1 if aromatic_bonds > 0 => Some(1),
            _ => None,
        },
        5 => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::chem::graph::mol_to_graph_data;
    use crate::chem::smiles::parse_smiles;

    fn bond_types(smiles: &str) -> Vec<i64> {
        mol_to_graph_data(&parse_smiles(smiles).unwrap()).bond_type
    }

    fn all_aromatic(smiles: &str) -> bool {
        let mol = parse_smiles(smiles).unwrap();
        mol.atoms.iter().all(|a| a.aromatic)
    }

    #[test]
    fn test_kekule_and_aromatic_benzene_match() {
        assert_eq!(bond_types("C1=CC=CC=C1"), bond_types("c1ccccc1"));
        assert!(bond_types("C1=CC=CC=C1").iter().all(|&t| t == 3));
    }

    #[test]
    fn test_kekule_heterocycles() {
        assert_eq!(bond_types("C1=CC=NC=C1"), bond_types("c1ccncc1"));
        assert_eq!(bond_types("C1=CNC=C1"), bond_types("c1cc[nH]c1"));
        assert_eq!(bond_types("C1=COC=C1"), bond_types("c1ccoc1"));
        assert_eq!(bond_types("C1=CC=C2C=CC=CC2=C1"), bond_types("c1ccc2ccccc2c1"));
    }

    #[test]
    fn test_substituents_keep_their_bond_type() {
        // toluene: methyl bond single, ring aromatic
        let bt = bond_types("CC1=CC=CC=C1");
        assert_eq!(&bt[..2], &[0, 0]);
        assert!(bt[2..].iter().all(|&t| t == 3));
    }

    #[test]
    fn test_non_aromatic_rings_stay_kekule() {
        // cyclohexene, cyclooctatetraene, 1,4-benzoquinone
        assert!(!all_aromatic("C1=CCCCC1"));
        assert!(!all_aromatic("C1=CC=CC=CC=C1"));
        assert!(bond_types("O=C1C=CC(=O)C=C1").iter().all(|&t| t != 3));
    }

    #[test]
    fn test_pyridone_is_aromatic() {
        let mol = parse_smiles("O=C1C=CC=CN1").unwrap();
        assert!(!mol.atoms[0].aromatic);
        assert!(mol.atoms[1..].iter().all(|a| a.aromatic));
    }

    #[test]
    fn test_azulene_envelope() {
        assert!(all_aromatic("C1=CC2=CC=CC=CC2=C1"));
    }
}
