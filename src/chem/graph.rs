// ============================================================
// Layer 3b - Molecule → Graph Arrays
// ============================================================
// Feature vocabularies follow the pretrained GIN backbones:
//
//   feature          values                                     vocab
//   atom_type        atomic number 1..=118 → 0..=117, misc 118   120
//   chirality_tag    unspecified, CW, CCW, other                 4
//   bond_type        single, double, triple, aromatic            6
//   bond_direction   none, end-up-right, end-down-right          3
//
// The extra atom and bond slots are reserved for the mask
// token used in pretraining and for the self-loop edges the
// graph wrapper adds.
//
// Every bond is emitted twice, once per direction, with
// identical features. The i-th bond of the molecule becomes
// edges 2i and 2i+1.

use crate::chem::elements::MAX_ATOMIC_NUM;
use crate::domain::molecule::Molecule;

pub const ATOM_TYPE_VOCAB: usize = 120;
pub const MISC_ATOM_TYPE: i64 = 118;
pub const CHIRALITY_VOCAB: usize = 4;
pub const BOND_TYPE_VOCAB: usize = 6;
pub const SELF_LOOP_BOND_TYPE: i64 = 4;
pub const BOND_DIRECTION_VOCAB: usize = 3;

/// Categorical arrays for one molecule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphData {
    pub atom_type:      Vec<i64>,
    pub chirality_tag:  Vec<i64>,
    pub edges:          Vec<(usize, usize)>,
    pub bond_type:      Vec<i64>,
    pub bond_direction: Vec<i64>,
}

pub fn atom_type_index(atomic_num: u8) -> i64 {
    if (1..=MAX_ATOMIC_NUM).contains(&atomic_num) {
        atomic_num as i64 - 1
    } else {
        MISC_ATOM_TYPE
    }
}

pub fn mol_to_graph_data(mol: &Molecule) -> GraphData {
    let atom_type = mol.atoms.iter().map(|a| atom_type_index(a.atomic_num)).collect();
    let chirality_tag = mol.atoms.iter().map(|a| a.chirality.index()).collect();

    let num_edges = mol.num_bonds() * 2;
    let mut edges = Vec::with_capacity(num_edges);
    let mut bond_type = Vec::with_capacity(num_edges);
    let mut bond_direction = Vec::with_capacity(num_edges);

    for b in &mol.bonds {
        let bt = b.bond_type.index();
        let bd = b.direction.index();

        edges.push((b.begin, b.end));
        edges.push((b.end, b.begin));
        bond_type.extend([bt, bt]);
        bond_direction.extend([bd, bd]);
    }

    GraphData { atom_type, chirality_tag, edges, bond_type, bond_direction }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::smiles::parse_smiles;

    #[test]
    fn test_ethanol_arrays() {
        let g = mol_to_graph_data(&parse_smiles("CCO").unwrap());
        assert_eq!(g.atom_type, vec![5, 5, 7]);
        assert_eq!(g.chirality_tag, vec![0, 0, 0]);
        assert_eq!(g.edges, vec![(0, 1), (1, 0), (1, 2), (2, 1)]);
        assert_eq!(g.bond_type, vec![0, 0, 0, 0]);
        assert_eq!(g.bond_direction, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_edges_are_bidirectional() {
        let g = mol_to_graph_data(&parse_smiles("c1ccncc1").unwrap());
        assert_eq!(g.edges.len(), 12);
        for pair in g.edges.chunks(2) {
            assert_eq!(pair[0], (pair[1].1, pair[1].0));
        }
        assert!(g.bond_type.iter().all(|&t| t == 3));
    }

    #[test]
    fn test_wildcard_maps_to_misc() {
        assert_eq!(atom_type_index(0), MISC_ATOM_TYPE);
        assert_eq!(atom_type_index(1), 0);
        assert_eq!(atom_type_index(118), 117);
    }

    #[test]
    fn test_single_atom_has_no_edges() {
        let g = mol_to_graph_data(&parse_smiles("[Na+]").unwrap());
        assert_eq!(g.atom_type, vec![10]);
        assert!(g.edges.is_empty());
    }
}
