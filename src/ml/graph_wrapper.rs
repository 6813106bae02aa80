// ============================================================
// Layer 5 - Graph Wrapper
// ============================================================
// Converts a JoinGraph (plain Vecs) into Burn tensors on a
// device. This is the GraphFeeder the batcher hands every
// collated batch to.
//
// Every node also gets a self-loop edge. Self-loops carry the
// reserved bond type SELF_LOOP_BOND_TYPE and direction 0, and
// come after the real edges:
//
//   src/dst:  [ e_0 .. e_{E-1} | 0 .. N-1 ]
//
// Shapes (N nodes, E real edges, G molecules):
//   atom_type, chirality_tag      [N, 1]  Int
//   src, dst                      [E+N]   Int
//   bond_type, bond_direction     [E+N, 1] Int
//   graph_index                   [N]     Int
//   graph_sizes                   [G, 1]  Float (node counts)

use burn::prelude::*;

use crate::chem::graph::SELF_LOOP_BOND_TYPE;
use crate::domain::graph::JoinGraph;
use crate::domain::traits::GraphFeeder;

/// Tensor form of a joined batch of molecule graphs
#[derive(Debug, Clone)]
pub struct GraphFeed<B: Backend> {
    pub num_nodes:      usize,
    pub num_graphs:     usize,
    pub atom_type:      Tensor<B, 2, Int>,
    pub chirality_tag:  Tensor<B, 2, Int>,
    pub src:            Tensor<B, 1, Int>,
    pub dst:            Tensor<B, 1, Int>,
    pub bond_type:      Tensor<B, 2, Int>,
    pub bond_direction: Tensor<B, 2, Int>,
    pub graph_index:    Tensor<B, 1, Int>,
    pub graph_sizes:    Tensor<B, 2>,
}

#[derive(Debug, Clone)]
pub struct GraphWrapper<B: Backend> {
    device: B::Device,
}

impl<B: Backend> GraphWrapper<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    fn ints(&self, values: &[i32]) -> Tensor<B, 1, Int> {
        Tensor::<B, 1, Int>::from_ints(values, &self.device)
    }
}

impl<B: Backend> GraphFeeder for GraphWrapper<B> {
    type Feed = GraphFeed<B>;

    fn to_feed(&self, graph: &JoinGraph) -> GraphFeed<B> {
        let n = graph.num_nodes;
        let total_edges = graph.num_edges() + n;

        let mut src = Vec::with_capacity(total_edges);
        let mut dst = Vec::with_capacity(total_edges);
        let mut bond_type = Vec::with_capacity(total_edges);
        let mut bond_direction = Vec::with_capacity(total_edges);

        for (k, &(u, v)) in graph.edges.iter().enumerate() {
            src.push(u as i32);
            dst.push(v as i32);
            bond_type.push(graph.bond_type[k] as i32);
            bond_direction.push(graph.bond_direction[k] as i32);
        }
        for i in 0..n {
            src.push(i as i32);
            dst.push(i as i32);
            bond_type.push(SELF_LOOP_BOND_TYPE as i32);
            bond_direction.push(0);
        }

        let atom_type: Vec<i32> = graph.atom_type.iter().map(|&x| x as i32).collect();
        let chirality_tag: Vec<i32> = graph.chirality_tag.iter().map(|&x| x as i32).collect();
        let graph_index: Vec<i32> = graph.graph_index.iter().map(|&g| g as i32).collect();
        let graph_sizes: Vec<f32> = (0..graph.num_graphs)
            .map(|gid| graph.nodes_of(gid).len() as f32)
            .collect();

        GraphFeed {
            num_nodes:      n,
            num_graphs:     graph.num_graphs,
            atom_type:      self.ints(&atom_type).reshape([n, 1]),
            chirality_tag:  self.ints(&chirality_tag).reshape([n, 1]),
            src:            self.ints(&src),
            dst:            self.ints(&dst),
            bond_type:      self.ints(&bond_type).reshape([total_edges, 1]),
            bond_direction: self.ints(&bond_direction).reshape([total_edges, 1]),
            graph_index:    self.ints(&graph_index),
            graph_sizes:    Tensor::<B, 1>::from_floats(graph_sizes.as_slice(), &self.device)
                .reshape([graph.num_graphs, 1]),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::featurizer::DownstreamFeaturizer;
    use crate::domain::record::RawRecord;
    use crate::domain::traits::Featurizer;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ints(t: Tensor<TestBackend, 1, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_feed_adds_self_loops() {
        let f = DownstreamFeaturizer::inference();
        let records: Vec<_> = ["CCO", "C"]
            .iter()
            .filter_map(|s| f.gen_features(&RawRecord::unlabelled(*s)))
            .collect();
        let batch = f.collate(&records);

        let wrapper = GraphWrapper::<TestBackend>::new(Default::default());
        let feed = wrapper.to_feed(&batch.graph);

        assert_eq!(feed.num_nodes, 4);
        assert_eq!(feed.num_graphs, 2);
        assert_eq!(feed.atom_type.dims(), [4, 1]);
        assert_eq!(feed.bond_type.dims(), [8, 1]);
        assert_eq!(ints(feed.src), vec![0, 1, 1, 2, 0, 1, 2, 3]);
        assert_eq!(ints(feed.dst), vec![1, 0, 2, 1, 0, 1, 2, 3]);
        assert_eq!(
            ints(feed.bond_type.reshape([8])),
            vec![0, 0, 0, 0, 4, 4, 4, 4]
        );
        assert_eq!(ints(feed.graph_index), vec![0, 0, 0, 1]);
        assert_eq!(
            feed.graph_sizes.into_data().to_vec::<f32>().unwrap(),
            vec![3.0, 1.0]
        );
    }
}
