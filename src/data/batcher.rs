// ============================================================
// Layer 4 - Molecule Batcher
// ============================================================
// Implements Burn's Batcher trait for featurized molecules.
//
// The DataLoader calls .batch(items) with each mini-batch of
// MoleculeGraphRecords. Batching is the featurizer's collate
// (join graphs, remap labels) followed by the graph wrapper's
// to_feed (Vecs → tensors on the device):
//
//   Vec<MoleculeGraphRecord>
//       │  DownstreamFeaturizer::collate
//       ▼
//   CollatedBatch { JoinGraph, labels, smiles }
//       │  GraphWrapper::to_feed  +  label matrices → tensors
//       ▼
//   MoleculeBatch<B>
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::featurizer::{DownstreamFeaturizer, FeaturizerMode, Matrix};
use crate::domain::record::MoleculeGraphRecord;
use crate::domain::traits::{Featurizer, GraphFeeder};
use crate::ml::graph_wrapper::{GraphFeed, GraphWrapper};

// ─── MoleculeBatch ────────────────────────────────────────────────────────────
/// A batch of molecules ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct MoleculeBatch<B: Backend> {
    pub graph: GraphFeed<B>,

    /// Remapped labels in [0, 1] - shape: [batch_size, num_tasks].
    /// None in inference mode.
    pub finetune_label: Option<Tensor<B, 2>>,

    /// 1 where the label is present, 0 where missing - same shape
    pub valid: Option<Tensor<B, 2>>,

    /// Input SMILES, one per row
    pub smiles: Vec<String>,
}

// ─── MoleculeBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct MoleculeBatcher<B: Backend> {
    featurizer:    DownstreamFeaturizer,
    graph_wrapper: GraphWrapper<B>,
}

impl<B: Backend> MoleculeBatcher<B> {
    pub fn new(mode: FeaturizerMode, device: B::Device) -> Self {
        Self {
            featurizer:    DownstreamFeaturizer::new(mode),
            graph_wrapper: GraphWrapper::new(device),
        }
    }

    fn matrix(&self, m: Matrix) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(m.data.as_slice(), self.graph_wrapper.device())
            .reshape([m.rows, m.cols])
    }
}

impl<B: Backend> Batcher<MoleculeGraphRecord, MoleculeBatch<B>> for MoleculeBatcher<B> {
    fn batch(&self, items: Vec<MoleculeGraphRecord>) -> MoleculeBatch<B> {
        let collated = self.featurizer.collate(&items);
        let graph = self.graph_wrapper.to_feed(&collated.graph);

        let (finetune_label, valid) = match collated.labels {
            Some(labels) => (
                Some(self.matrix(labels.finetune_label)),
                Some(self.matrix(labels.valid)),
            ),
            None => (None, None),
        };

        MoleculeBatch { graph, finetune_label, valid, smiles: collated.smiles }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::RawRecord;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_label_tensors() {
        let f = DownstreamFeaturizer::supervised();
        let items: Vec<MoleculeGraphRecord> = [
            RawRecord::labelled("CCO", vec![1.0, -1.0]),
            RawRecord::labelled("c1ccccc1", vec![0.0, 1.0]),
        ]
        .iter()
        .filter_map(|r| f.gen_features(r))
        .collect();

        let batcher = MoleculeBatcher::<TestBackend>::new(FeaturizerMode::Supervised, Default::default());
        let batch = batcher.batch(items);

        let label = batch.finetune_label.unwrap();
        let valid = batch.valid.unwrap();
        assert_eq!(label.dims(), [2, 2]);
        assert_eq!(label.into_data().to_vec::<f32>().unwrap(), vec![1.0, 0.0, 0.5, 1.0]);
        assert_eq!(valid.into_data().to_vec::<f32>().unwrap(), vec![1.0, 1.0, 0.0, 1.0]);
        assert_eq!(batch.graph.num_nodes, 9);
        assert_eq!(batch.smiles, vec!["CCO", "c1ccccc1"]);
    }

    #[test]
    fn test_inference_batch_has_no_labels() {
        let f = DownstreamFeaturizer::inference();
        let items: Vec<_> = f.gen_features(&RawRecord::unlabelled("CCN")).into_iter().collect();
        let batcher = MoleculeBatcher::<TestBackend>::new(FeaturizerMode::Inference, Default::default());
        let batch = batcher.batch(items);
        assert!(batch.finetune_label.is_none());
        assert!(batch.valid.is_none());
    }
}
