// ============================================================
// Layer 3 - Record Domain Types
// ============================================================
// RawRecord is what a dataset reader yields: a SMILES string
// and, for supervised data, one label per prediction task in
// the ternary encoding
//
//   -1 = negative,  0 = missing / unknown,  +1 = positive
//
// MoleculeGraphRecord is what the featurizer produces from it:
// flat categorical arrays describing atoms and directed edges.
// Invariants (checked by `check_shapes`):
//   len(atom_type)  == len(chirality_tag)              == num_nodes
//   len(edges)      == len(bond_type) == len(bond_direction)
//   every edge endpoint is in [0, num_nodes)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub smiles: String,

    /// Ternary task labels. `None` for unlabelled (inference) input.
    pub label: Option<Vec<f32>>,
}

impl RawRecord {
    pub fn labelled(smiles: impl Into<String>, label: Vec<f32>) -> Self {
        Self { smiles: smiles.into(), label: Some(label) }
    }

    pub fn unlabelled(smiles: impl Into<String>) -> Self {
        Self { smiles: smiles.into(), label: None }
    }
}

/// One featurized molecule, ready to be joined into a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeGraphRecord {
    pub atom_type:      Vec<i64>,
    pub chirality_tag:  Vec<i64>,
    pub edges:          Vec<(usize, usize)>,
    pub bond_type:      Vec<i64>,
    pub bond_direction: Vec<i64>,

    /// Flattened task labels, absent in inference mode
    pub label:  Option<Vec<f32>>,

    /// Kept for traceability in logs and prediction output
    pub smiles: String,
}

impl MoleculeGraphRecord {
    pub fn num_nodes(&self) -> usize {
        self.atom_type.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if all array-length and index invariants hold
    pub fn check_shapes(&self) -> bool {
        let n = self.num_nodes();
        self.chirality_tag.len() == n
            && self.bond_type.len() == self.edges.len()
            && self.bond_direction.len() == self.edges.len()
            && self.edges.iter().all(|&(u, v)| u < n && v < n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(edges: Vec<(usize, usize)>) -> MoleculeGraphRecord {
        let e = edges.len();
        MoleculeGraphRecord {
            atom_type:      vec![5, 7],
            chirality_tag:  vec![0, 0],
            edges,
            bond_type:      vec![0; e],
            bond_direction: vec![0; e],
            label:          None,
            smiles:         "CN".to_string(),
        }
    }

    #[test]
    fn test_check_shapes_accepts_valid_record() {
        assert!(record(vec![(0, 1), (1, 0)]).check_shapes());
    }

    #[test]
    fn test_check_shapes_rejects_out_of_range_edge() {
        assert!(!record(vec![(0, 2)]).check_shapes());
    }

    #[test]
    fn test_check_shapes_rejects_ragged_edge_features() {
        let mut r = record(vec![(0, 1)]);
        r.bond_direction.push(0);
        assert!(!r.check_shapes());
    }
}
