// ============================================================
// Layer 5 - Finetuning Loop
// ============================================================
// Per epoch:
//   1. train on the shuffled train split (masked BCE, Adam)
//   2. ROC-AUC on valid and test with model.valid()
//   3. log train/loss, val/auc, test/auc, test/auc_by_eval
//   4. save checkpoint epoch{N}
//
// test/auc_by_eval is the test AUC at the epoch with the best
// validation AUC so far, i.e. what model selection on the
// validation split would report.
//
// After the last epoch the best-validation checkpoint is
// reloaded and saved again as epoch_best.
//
// Backends:
//   - Training uses Autodiff<Wgpu> or Autodiff<NdArray>
//   - model.valid() returns the model on the inner backend,
//     so evaluation batchers use B::InnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::finetune_use_case::FinetuneConfig;
use crate::data::{
    batcher::{MoleculeBatch, MoleculeBatcher},
    dataset::MoleculeDataset,
    featurizer::FeaturizerMode,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{argmax, calc_rocauc_score, EpochMetrics, MetricsLogger},
};
use crate::ml::model::{DownstreamModel, GnnConfig};

/// Featurized train / valid / test splits
pub struct DatasetSplits {
    pub train: MoleculeDataset,
    pub valid: MoleculeDataset,
    pub test:  MoleculeDataset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinetuneOutcome {
    pub best_epoch:   usize,
    pub best_val_auc: f64,
    /// Test ROC-AUC of the best-validation epoch
    pub test_auc:     f64,
}

pub fn run_training(
    cfg:       &FinetuneConfig,
    model_cfg: &GnnConfig,
    splits:    DatasetSplits,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
) -> Result<FinetuneOutcome> {
    if cfg.use_gpu {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        finetune::<Autodiff<Wgpu>>(cfg, model_cfg, splits, ckpt, metrics, device)
    } else {
        let device = NdArrayDevice::default();
        tracing::info!("Using NdArray device: {:?}", device);
        finetune::<Autodiff<NdArray>>(cfg, model_cfg, splits, ckpt, metrics, device)
    }
}

pub fn finetune<B: AutodiffBackend>(
    cfg:       &FinetuneConfig,
    model_cfg: &GnnConfig,
    splits:    DatasetSplits,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    B::Device,
) -> Result<FinetuneOutcome> {
    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: DownstreamModel<B> = model_cfg.init(&device);
    if let Some(init_model) = &cfg.init_model {
        model = CheckpointManager::load_encoder(model, init_model, &device)?;
    }
    tracing::info!(
        "Model ready: {} GIN layers, embed_dim={}, {} tasks",
        model_cfg.num_layers, model_cfg.embed_dim, model_cfg.num_tasks
    );

    let mut optim = AdamConfig::new().init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    // burn splits the dataset across workers, so zero workers would divide by zero
    let num_workers = cfg.num_workers.max(1);
    let train_loader = DataLoaderBuilder::new(MoleculeBatcher::<B>::new(FeaturizerMode::Supervised, device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(num_workers)
        .build(splits.train);

    let eval_loader = |dataset: MoleculeDataset| {
        DataLoaderBuilder::new(MoleculeBatcher::<B::InnerBackend>::new(FeaturizerMode::Supervised, device.clone()))
            .batch_size(cfg.batch_size)
            .num_workers(num_workers)
            .build(dataset)
    };
    let valid_loader = eval_loader(splits.valid);
    let test_loader = eval_loader(splits.test);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut val_aucs: Vec<f64> = Vec::with_capacity(cfg.max_epoch);
    let mut test_aucs: Vec<f64> = Vec::with_capacity(cfg.max_epoch);

    for epoch in 0..cfg.max_epoch {
        let mut loss_sum = 0.0f64;
        let mut batches = 0usize;

        for batch in train_loader.iter() {
            let (Some(label), Some(valid)) = (batch.finetune_label, batch.valid) else {
                bail!("training batch has no labels");
            };
            let (loss, _) = model.forward_loss(&batch.graph, label, valid);

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }
        let train_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };

        let model_valid = model.valid();
        let val_auc = evaluate(&model_valid, &valid_loader, model_cfg.num_tasks)?;
        let test_auc = evaluate(&model_valid, &test_loader, model_cfg.num_tasks)?;
        val_aucs.push(val_auc);
        test_aucs.push(test_auc);

        let best = argmax(&val_aucs).unwrap_or(epoch);
        let test_auc_by_eval = test_aucs[best];

        println!(
            "epoch:{} train/loss:{:.6} val/auc:{:.6} test/auc:{:.6} test/auc_by_eval:{:.6}",
            epoch, train_loss, val_auc, test_auc, test_auc_by_eval,
        );
        metrics.log(&EpochMetrics { epoch, train_loss, val_auc, test_auc, test_auc_by_eval })?;

        ckpt.save_epoch(&model, epoch)?;
    }

    // ── Keep the best epoch ───────────────────────────────────────────────────
    let best_epoch = argmax(&val_aucs).ok_or_else(|| anyhow!("max_epoch is 0, nothing was trained"))?;
    let best_model = ckpt.load_epoch(model_cfg.init::<B>(&device), best_epoch, &device)?;
    ckpt.save_best(&best_model)?;

    let outcome = FinetuneOutcome {
        best_epoch,
        best_val_auc: val_aucs[best_epoch],
        test_auc:     test_aucs[best_epoch],
    };
    tracing::info!(
        "Best epoch {}: val/auc={:.4} test/auc={:.4}",
        outcome.best_epoch, outcome.best_val_auc, outcome.test_auc
    );
    Ok(outcome)
}

/// Flatten a float tensor to a Vec<f32>
pub fn tensor_to_vec<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

/// Mean multi-task ROC-AUC of a model over a labelled loader
pub fn evaluate<B: Backend>(
    model:     &DownstreamModel<B>,
    loader:    &Arc<dyn DataLoader<MoleculeBatch<B>>>,
    num_tasks: usize,
) -> Result<f64> {
    let mut labels = Vec::new();
    let mut preds = Vec::new();
    let mut valid = Vec::new();

    for batch in loader.iter() {
        let (Some(label), Some(mask)) = (batch.finetune_label, batch.valid) else {
            bail!("evaluation batch has no labels");
        };
        preds.extend(tensor_to_vec(model.predict(&batch.graph))?);
        labels.extend(tensor_to_vec(label)?);
        valid.extend(tensor_to_vec(mask)?);
    }

    calc_rocauc_score(&labels, &preds, &valid, num_tasks)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::featurizer::DownstreamFeaturizer;
    use crate::domain::record::RawRecord;

    type TestBackend = Autodiff<NdArray>;

    fn dataset(rows: &[(&str, f32)]) -> MoleculeDataset {
        let raw: Vec<RawRecord> = rows.iter().map(|(s, y)| RawRecord::labelled(*s, vec![*y])).collect();
        MoleculeDataset::featurize(&raw, &DownstreamFeaturizer::supervised())
    }

    fn toy_splits() -> DatasetSplits {
        // aromatic rings positive, chains negative
        DatasetSplits {
            train: dataset(&[
                ("c1ccccc1", 1.0), ("Cc1ccccc1", 1.0), ("c1ccncc1", 1.0), ("Oc1ccccc1", 1.0),
                ("CCO", -1.0), ("CCCC", -1.0), ("CCN", -1.0), ("CC(C)O", -1.0),
            ]),
            valid: dataset(&[("Nc1ccccc1", 1.0), ("CCCO", -1.0), ("c1ccoc1", 1.0), ("CCCN", -1.0)]),
            test:  dataset(&[("Clc1ccccc1", 1.0), ("CCCCC", -1.0), ("CCc1ccccc1", 1.0), ("OCCO", -1.0)]),
        }
    }

    fn test_config(model_dir: &std::path::Path, max_epoch: usize) -> FinetuneConfig {
        FinetuneConfig {
            batch_size: 4,
            num_workers: 1,
            max_epoch,
            model_dir: model_dir.to_path_buf(),
            ..FinetuneConfig::default()
        }
    }

    #[test]
    fn test_finetune_writes_checkpoints_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 2);
        let model_cfg = GnnConfig::new(1).with_embed_dim(16).with_num_layers(2).with_dropout_rate(0.0);
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();

        let outcome = finetune::<TestBackend>(&cfg, &model_cfg, toy_splits(), &ckpt, &metrics, Default::default())
            .unwrap();

        assert!(outcome.best_epoch < 2);
        assert!((0.0..=1.0).contains(&outcome.best_val_auc));
        assert!((0.0..=1.0).contains(&outcome.test_auc));
        assert!(dir.path().join("epoch0.mpk").exists());
        assert!(dir.path().join("epoch1.mpk").exists());
        assert!(dir.path().join("epoch_best.mpk").exists());

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_zero_workers_falls_back_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FinetuneConfig { num_workers: 0, ..test_config(dir.path(), 1) };
        let model_cfg = GnnConfig::new(1).with_embed_dim(8).with_num_layers(1).with_dropout_rate(0.0);
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();

        let outcome = finetune::<TestBackend>(&cfg, &model_cfg, toy_splits(), &ckpt, &metrics, Default::default())
            .unwrap();
        assert_eq!(outcome.best_epoch, 0);
    }

    #[test]
    fn test_zero_epochs_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 0);
        let model_cfg = GnnConfig::new(1).with_embed_dim(8).with_num_layers(1);
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();

        let result = finetune::<TestBackend>(&cfg, &model_cfg, toy_splits(), &ckpt, &metrics, Default::default());
        assert!(result.is_err());
    }
}
