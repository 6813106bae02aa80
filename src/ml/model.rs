// ============================================================
// Layer 5 - GIN Property Model
// ============================================================
// Graph Isomorphism Network encoder + linear task head.
//
//   atom_type, chirality ──embed──► h⁰            [N, D]
//
//   for each layer l:
//     m_e   = h[src_e] + E_bond[type_e] + E_dir[dir_e]   (edges incl. self-loops)
//     agg_v = Σ_{e : dst_e = v} m_e
//     h     = LayerNorm(MLP(agg))
//     h     = ReLU(h)          (all but the last layer)
//     h     = Dropout(h)
//
//   graph_repr = pool(h, graph_index)             [G, D]
//   logits     = Linear(graph_repr)               [G, T]
//
// The encoder is a separate Module so pretrained encoder
// weights can be loaded without a matching head.
//
// Reference: Xu et al. (2019) How Powerful are Graph Neural Networks?
//            Hu et al. (2020) Strategies for Pre-training GNNs

use burn::{
    module::Ignored,
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid},
};
use serde::{Deserialize, Serialize};

use crate::chem::graph::{ATOM_TYPE_VOCAB, BOND_DIRECTION_VOCAB, BOND_TYPE_VOCAB, CHIRALITY_VOCAB};
use crate::ml::graph_wrapper::GraphFeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphPooling {
    Mean,
    Sum,
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
#[derive(Config, Debug)]
pub struct GnnConfig {
    pub num_tasks: usize,
    #[config(default = 300)]
    pub embed_dim: usize,
    #[config(default = 5)]
    pub num_layers: usize,
    #[config(default = 0.5)]
    pub dropout_rate: f64,
    #[config(default = "GraphPooling::Mean")]
    pub pool: GraphPooling,
}

impl GnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DownstreamModel<B> {
        DownstreamModel {
            encoder: self.init_encoder(device),
            head:    LinearConfig::new(self.embed_dim, self.num_tasks).init(device),
            pool:    Ignored(self.pool),
        }
    }

    pub fn init_encoder<B: Backend>(&self, device: &B::Device) -> GinEncoder<B> {
        let d = self.embed_dim;
        GinEncoder {
            atom_embedding:      EmbeddingConfig::new(ATOM_TYPE_VOCAB, d).init(device),
            chirality_embedding: EmbeddingConfig::new(CHIRALITY_VOCAB, d).init(device),
            layers:              (0..self.num_layers).map(|_| self.build_layer(device)).collect(),
            dropout:             DropoutConfig::new(self.dropout_rate).init(),
        }
    }

    fn build_layer<B: Backend>(&self, device: &B::Device) -> GinLayer<B> {
        let d = self.embed_dim;
        GinLayer {
            bond_embedding:      EmbeddingConfig::new(BOND_TYPE_VOCAB, d).init(device),
            direction_embedding: EmbeddingConfig::new(BOND_DIRECTION_VOCAB, d).init(device),
            mlp_in:              LinearConfig::new(d, 2 * d).init(device),
            mlp_out:             LinearConfig::new(2 * d, d).init(device),
            norm:                LayerNormConfig::new(d).init(device),
        }
    }
}

/// [rows, 1] index column → [rows, D] embeddings
fn embed_column<B: Backend>(embedding: &Embedding<B>, column: Tensor<B, 2, Int>) -> Tensor<B, 2> {
    let [rows, _] = column.dims();
    let out = embedding.forward(column);
    let [_, _, d] = out.dims();
    out.reshape([rows, d])
}

// ─── GinLayer ─────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct GinLayer<B: Backend> {
    pub bond_embedding:      Embedding<B>,
    pub direction_embedding: Embedding<B>,
    pub mlp_in:              Linear<B>,
    pub mlp_out:             Linear<B>,
    pub norm:                LayerNorm<B>,
}

impl<B: Backend> GinLayer<B> {
    pub fn forward(&self, h: Tensor<B, 2>, graph: &GraphFeed<B>) -> Tensor<B, 2> {
        let [_, d] = h.dims();
        let edge_emb = embed_column(&self.bond_embedding, graph.bond_type.clone())
            + embed_column(&self.direction_embedding, graph.bond_direction.clone());

        let messages = h.clone().select(0, graph.src.clone()) + edge_emb;
        let aggregated = Tensor::<B, 2>::zeros([graph.num_nodes, d], &h.device())
            .select_assign(0, graph.dst.clone(), messages);

        let out = self.mlp_out.forward(relu(self.mlp_in.forward(aggregated)));
        self.norm.forward(out)
    }
}

// ─── GinEncoder ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct GinEncoder<B: Backend> {
    pub atom_embedding:      Embedding<B>,
    pub chirality_embedding: Embedding<B>,
    pub layers:              Vec<GinLayer<B>>,
    pub dropout:             Dropout,
}

impl<B: Backend> GinEncoder<B> {
    /// Node representations, shape [num_nodes, embed_dim]
    pub fn forward(&self, graph: &GraphFeed<B>) -> Tensor<B, 2> {
        let mut h = embed_column(&self.atom_embedding, graph.atom_type.clone())
            + embed_column(&self.chirality_embedding, graph.chirality_tag.clone());

        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(h, graph);
            if i < last {
                h = relu(h);
            }
            h = self.dropout.forward(h);
        }
        h
    }
}

/// Pool node rows into one row per graph
pub fn pool_graphs<B: Backend>(
    nodes:   Tensor<B, 2>,
    graph:   &GraphFeed<B>,
    pooling: GraphPooling,
) -> Tensor<B, 2> {
    let [_, d] = nodes.dims();
    let summed = Tensor::<B, 2>::zeros([graph.num_graphs, d], &nodes.device())
        .select_assign(0, graph.graph_index.clone(), nodes);
    match pooling {
        GraphPooling::Sum  => summed,
        GraphPooling::Mean => summed / graph.graph_sizes.clone().clamp_min(1.0),
    }
}

/// Binary cross-entropy on logits, averaged over valid entries only.
///
/// Uses the stable form `max(x, 0) - x*y + ln(1 + e^{-|x|})`.
/// Returns a `[1]` tensor; zero if nothing is valid.
pub fn masked_bce_with_logits<B: Backend>(
    logits: Tensor<B, 2>,
    labels: Tensor<B, 2>,
    valid:  Tensor<B, 2>,
) -> Tensor<B, 1> {
    let loss = logits.clone().clamp_min(0.0)
        - logits.clone() * labels
        + logits.abs().neg().exp().add_scalar(1.0).log();
    (loss * valid.clone()).sum() / valid.sum().clamp_min(1.0)
}

// ─── DownstreamModel ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DownstreamModel<B: Backend> {
    pub encoder: GinEncoder<B>,
    pub head:    Linear<B>,
    pub pool:    Ignored<GraphPooling>,
}

impl<B: Backend> DownstreamModel<B> {
    /// Task logits, shape [num_graphs, num_tasks]
    pub fn forward(&self, graph: &GraphFeed<B>) -> Tensor<B, 2> {
        let nodes = self.encoder.forward(graph);
        let graph_repr = pool_graphs(nodes, graph, self.pool.0);
        self.head.forward(graph_repr)
    }

    /// Task probabilities in [0, 1]
    pub fn predict(&self, graph: &GraphFeed<B>) -> Tensor<B, 2> {
        sigmoid(self.forward(graph))
    }

    pub fn forward_loss(
        &self,
        graph:  &GraphFeed<B>,
        labels: Tensor<B, 2>,
        valid:  Tensor<B, 2>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(graph);
        let loss = masked_bce_with_logits(logits.clone(), labels, valid);
        (loss, logits)
    }

    /// Replace the encoder, keeping the head
    pub fn with_encoder(self, encoder: GinEncoder<B>) -> Self {
        Self { encoder, ..self }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::featurizer::DownstreamFeaturizer;
    use crate::domain::record::RawRecord;
    use crate::domain::traits::{Featurizer, GraphFeeder};
    use crate::ml::graph_wrapper::GraphWrapper;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn feed(smiles: &[&str]) -> GraphFeed<TestBackend> {
        let f = DownstreamFeaturizer::inference();
        let records: Vec<_> = smiles
            .iter()
            .filter_map(|s| f.gen_features(&RawRecord::unlabelled(*s)))
            .collect();
        GraphWrapper::<TestBackend>::new(Default::default()).to_feed(&f.collate(&records).graph)
    }

    fn small_config(num_tasks: usize) -> GnnConfig {
        GnnConfig::new(num_tasks).with_embed_dim(16).with_num_layers(2).with_dropout_rate(0.0)
    }

    #[test]
    fn test_forward_output_shape() {
        let device = Default::default();
        let model: DownstreamModel<TestBackend> = small_config(3).init(&device);
        let logits = model.forward(&feed(&["CCO", "c1ccccc1", "C"]));
        assert_eq!(logits.dims(), [3, 3]);
    }

    #[test]
    fn test_predictions_are_probabilities() {
        let device = Default::default();
        let model: DownstreamModel<TestBackend> = small_config(2).init(&device);
        let probs = model.predict(&feed(&["CC(=O)O", "CCN"])).into_data().to_vec::<f32>().unwrap();
        assert_eq!(probs.len(), 4);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_mean_pooling_averages_rows() {
        let g = feed(&["CC", "C"]);
        let nodes = Tensor::<TestBackend, 1>::from_floats([1.0f32, 3.0, 5.0].as_slice(), &Default::default())
            .reshape([3, 1]);
        let mean = pool_graphs(nodes.clone(), &g, GraphPooling::Mean).into_data().to_vec::<f32>().unwrap();
        let sum = pool_graphs(nodes, &g, GraphPooling::Sum).into_data().to_vec::<f32>().unwrap();
        assert_eq!(mean, vec![2.0, 5.0]);
        assert_eq!(sum, vec![4.0, 5.0]);
    }

    #[test]
    fn test_masked_loss_ignores_invalid_entries() {
        let device = Default::default();
        let t = |v: [f32; 2]| Tensor::<TestBackend, 1>::from_floats(v.as_slice(), &device).reshape([1, 2]);

        // second entry is masked: a huge wrong logit must not change the loss
        let a = masked_bce_with_logits(t([0.0, 50.0]), t([1.0, 0.0]), t([1.0, 0.0]));
        let b = masked_bce_with_logits(t([0.0, -50.0]), t([1.0, 0.0]), t([1.0, 0.0]));
        let a: f32 = a.into_scalar();
        let b: f32 = b.into_scalar();
        assert!((a - std::f32::consts::LN_2).abs() < 1e-5);
        assert!((a - b).abs() < 1e-6);

        let none = masked_bce_with_logits(t([3.0, -2.0]), t([0.5, 0.5]), t([0.0, 0.0]));
        assert_eq!(none.into_scalar(), 0.0);
    }

    #[test]
    fn test_config_defaults() {
        let cfg = GnnConfig::new(12);
        assert_eq!(cfg.embed_dim, 300);
        assert_eq!(cfg.num_layers, 5);
        assert_eq!(cfg.pool, GraphPooling::Mean);
    }
}
