// ============================================================
// Layer 3 - Molecule Graphs and the Join Graph
// ============================================================
// A MolGraph is one molecule seen as a graph: a node count,
// a directed edge list, two categorical node-feature columns
// and two categorical edge-feature columns.
//
// A JoinGraph is the disjoint union of several MolGraphs:
//
//   graph 0: nodes 0..3   edges (0,1) (1,2)
//   graph 1: nodes 0..4   edges (0,1) (2,3)
//                 │
//                 ▼  offset graph 1 by 3 nodes
//   join:    nodes 0..7   edges (0,1) (1,2) (3,4) (5,6)
//            graph_index = [0,0,0,1,1,1,1]
//
// No edges connect different molecules, so a message passing
// layer over the join graph is identical to running it on each
// molecule on its own. `graph_index` maps every node back to
// its molecule for graph-level pooling.

use serde::{Deserialize, Serialize};

use crate::domain::record::MoleculeGraphRecord;

/// A single-molecule graph with column-vector features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MolGraph {
    pub num_nodes:      usize,
    pub edges:          Vec<(usize, usize)>,
    /// Node feature columns, shape [num_nodes, 1]
    pub atom_type:      Vec<i64>,
    pub chirality_tag:  Vec<i64>,
    /// Edge feature columns, shape [num_edges, 1]
    pub bond_type:      Vec<i64>,
    pub bond_direction: Vec<i64>,
}

impl MolGraph {
    /// Build the graph view of a featurized record.
    ///
    /// # Panics
    /// Panics if the record breaks its shape invariants. The
    /// featurizer never emits such records, so reaching this
    /// is a programming error rather than bad input.
    pub fn from_record(record: &MoleculeGraphRecord) -> Self {
        assert!(
            record.check_shapes(),
            "malformed graph record for '{}': {} atoms, {} chirality tags, {} edges, {} bond types, {} bond directions",
            record.smiles,
            record.atom_type.len(),
            record.chirality_tag.len(),
            record.edges.len(),
            record.bond_type.len(),
            record.bond_direction.len(),
        );

        Self {
            num_nodes:      record.num_nodes(),
            edges:          record.edges.clone(),
            atom_type:      record.atom_type.clone(),
            chirality_tag:  record.chirality_tag.clone(),
            bond_type:      record.bond_type.clone(),
            bond_direction: record.bond_direction.clone(),
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// Disjoint union of a batch of molecule graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinGraph {
    pub num_nodes:      usize,
    pub num_graphs:     usize,
    /// Edges in the union's index space
    pub edges:          Vec<(usize, usize)>,
    pub atom_type:      Vec<i64>,
    pub chirality_tag:  Vec<i64>,
    pub bond_type:      Vec<i64>,
    pub bond_direction: Vec<i64>,
    /// Molecule index of every node, length num_nodes
    pub graph_index:    Vec<usize>,
    /// Prefix sums of node counts, length num_graphs + 1
    pub node_offsets:   Vec<usize>,
}

impl JoinGraph {
    /// Join graphs in the given order.
    pub fn join(graphs: &[MolGraph]) -> Self {
        let total_nodes: usize = graphs.iter().map(|g| g.num_nodes).sum();
        let total_edges: usize = graphs.iter().map(|g| g.num_edges()).sum();

        let mut edges          = Vec::with_capacity(total_edges);
        let mut atom_type      = Vec::with_capacity(total_nodes);
        let mut chirality_tag  = Vec::with_capacity(total_nodes);
        let mut bond_type      = Vec::with_capacity(total_edges);
        let mut bond_direction = Vec::with_capacity(total_edges);
        let mut graph_index    = Vec::with_capacity(total_nodes);
        let mut node_offsets   = Vec::with_capacity(graphs.len() + 1);

        let mut node_offset = 0usize;

        for (gid, g) in graphs.iter().enumerate() {
            node_offsets.push(node_offset);

            edges.extend(g.edges.iter().map(|&(u, v)| (u + node_offset, v + node_offset)));
            atom_type.extend_from_slice(&g.atom_type);
            chirality_tag.extend_from_slice(&g.chirality_tag);
            bond_type.extend_from_slice(&g.bond_type);
            bond_direction.extend_from_slice(&g.bond_direction);
            graph_index.extend(std::iter::repeat(gid).take(g.num_nodes));

            node_offset += g.num_nodes;
        }
        node_offsets.push(node_offset);

        Self {
            num_nodes: total_nodes,
            num_graphs: graphs.len(),
            edges,
            atom_type,
            chirality_tag,
            bond_type,
            bond_direction,
            graph_index,
            node_offsets,
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Node range of molecule `gid` in the union's index space
    pub fn nodes_of(&self, gid: usize) -> std::ops::Range<usize> {
        self.node_offsets[gid]..self.node_offsets[gid + 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize, atom: i64) -> MolGraph {
        let mut edges = Vec::new();
        for i in 0..n.saturating_sub(1) {
            edges.push((i, i + 1));
            edges.push((i + 1, i));
        }
        let e = edges.len();
        MolGraph {
            num_nodes:      n,
            edges,
            atom_type:      vec![atom; n],
            chirality_tag:  vec![0; n],
            bond_type:      vec![0; e],
            bond_direction: vec![0; e],
        }
    }

    #[test]
    fn test_join_offsets_second_graph() {
        let a = chain(3, 5);
        let b = chain(4, 7);
        let j = JoinGraph::join(&[a.clone(), b.clone()]);

        assert_eq!(j.num_nodes, 7);
        assert_eq!(j.num_graphs, 2);
        assert_eq!(j.num_edges(), a.num_edges() + b.num_edges());

        // First molecule keeps its local indices
        let split = a.num_edges();
        assert_eq!(&j.edges[..split], a.edges.as_slice());

        // Every edge of the second molecule is shifted by 3
        for (joined, local) in j.edges[split..].iter().zip(&b.edges) {
            assert_eq!(joined.0, local.0 + 3);
            assert_eq!(joined.1, local.1 + 3);
        }
    }

    #[test]
    fn test_join_graph_index_and_features_in_order() {
        let j = JoinGraph::join(&[chain(3, 5), chain(4, 7)]);
        assert_eq!(j.graph_index, vec![0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(j.atom_type, vec![5, 5, 5, 7, 7, 7, 7]);
        assert_eq!(j.node_offsets, vec![0, 3, 7]);
        assert_eq!(j.nodes_of(1), 3..7);
    }

    #[test]
    fn test_join_handles_edgeless_molecules() {
        let j = JoinGraph::join(&[chain(1, 6), chain(2, 8), chain(1, 6)]);
        assert_eq!(j.num_nodes, 4);
        assert_eq!(j.edges, vec![(1, 2), (2, 1)]);
        assert_eq!(j.graph_index, vec![0, 1, 1, 2]);
        assert_eq!(j.node_offsets, vec![0, 1, 3, 4]);
    }

    #[test]
    #[should_panic]
    fn test_from_record_panics_on_bad_shapes() {
        let record = MoleculeGraphRecord {
            atom_type:      vec![5, 5],
            chirality_tag:  vec![0],
            edges:          vec![],
            bond_type:      vec![],
            bond_direction: vec![],
            label:          None,
            smiles:         "CC".to_string(),
        };
        let _ = MolGraph::from_record(&record);
    }
}
