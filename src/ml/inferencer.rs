// ============================================================
// Layer 5 - Inferencer
// ============================================================
// Loads epoch_best with its config and task names, and turns
// featurized molecules into per-task probabilities. Batches
// are built in input order, so predictions line up with the
// input records.

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::{
    batcher::MoleculeBatcher,
    dataset::MoleculeDataset,
    featurizer::FeaturizerMode,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{model::DownstreamModel, trainer::tensor_to_vec};

/// Probabilities for one molecule, in task-name order
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub smiles:        String,
    pub probabilities: Vec<f32>,
}

pub struct Inferencer<B: Backend> {
    model:      DownstreamModel<B>,
    task_names: Vec<String>,
    batcher:    MoleculeBatcher<B>,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: B::Device) -> Result<Self> {
        let model_cfg = ckpt.load_model_config()?.with_dropout_rate(0.0);
        let task_names = ckpt.load_task_names()?;
        if task_names.len() != model_cfg.num_tasks {
            bail!(
                "task_names.json lists {} tasks but the model has {}",
                task_names.len(),
                model_cfg.num_tasks
            );
        }

        let model = ckpt.load_best(model_cfg.init::<B>(&device), &device)?;
        tracing::info!("Model loaded from '{}'", ckpt.dir().display());
        Ok(Self {
            model,
            task_names,
            batcher: MoleculeBatcher::new(FeaturizerMode::Inference, device),
        })
    }

    pub fn task_names(&self) -> &[String] {
        &self.task_names
    }

    pub fn predict(&self, dataset: &MoleculeDataset, batch_size: usize) -> Result<Vec<Prediction>> {
        let num_tasks = self.task_names.len();
        let mut out = Vec::with_capacity(dataset.record_count());

        for chunk in dataset.records().chunks(batch_size.max(1)) {
            let batch = self.batcher.batch(chunk.to_vec());
            let probs = tensor_to_vec(self.model.predict(&batch.graph))?;
            for (smiles, row) in batch.smiles.into_iter().zip(probs.chunks(num_tasks)) {
                out.push(Prediction { smiles, probabilities: row.to_vec() });
            }
        }
        Ok(out)
    }
}

/// Load the best checkpoint on the selected backend and predict
pub fn run_prediction(
    ckpt:       &CheckpointManager,
    dataset:    &MoleculeDataset,
    batch_size: usize,
    use_gpu:    bool,
) -> Result<(Vec<String>, Vec<Prediction>)> {
    fn on<B: Backend>(
        ckpt:       &CheckpointManager,
        dataset:    &MoleculeDataset,
        batch_size: usize,
        device:     B::Device,
    ) -> Result<(Vec<String>, Vec<Prediction>)> {
        let inferencer = Inferencer::<B>::from_checkpoint(ckpt, device)?;
        let predictions = inferencer.predict(dataset, batch_size)?;
        Ok((inferencer.task_names().to_vec(), predictions))
    }

    if use_gpu {
        on::<Wgpu>(ckpt, dataset, batch_size, WgpuDevice::default())
    } else {
        on::<NdArray>(ckpt, dataset, batch_size, NdArrayDevice::default())
    }
}
