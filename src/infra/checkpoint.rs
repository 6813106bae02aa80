// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder,
// plus the JSON artifacts needed to rebuild the model later.
//
// File layout of a model dir:
//   model_dir/
//     epoch0.mpk             ← weights after epoch 0
//     epoch1.mpk
//     ...
//     epoch_best.mpk         ← copy of the best-validation epoch
//     encoder_best.mpk       ← its encoder alone (for --init-model)
//     model_config.json      ← GnnConfig
//     task_names.json        ← task column order of the head
//     finetune_config.json   ← CLI arguments of the run
//     metrics.csv
//
// CompactRecorder adds the .mpk extension itself; paths
// here are given without it. It stores floats as f16, so a
// reloaded model (epoch_best included) carries f16-rounded
// weights.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::ml::model::{DownstreamModel, GinEncoder, GnnConfig};

pub const BEST_CHECKPOINT: &str = "epoch_best";
pub const BEST_ENCODER: &str = "encoder_best";

/// Manages checkpoints and run artifacts inside one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing directory without creating it
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            anyhow::bail!("Model dir '{}' does not exist. Have you run 'train' first?", dir.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn epoch_name(epoch: usize) -> String {
        format!("epoch{epoch}")
    }

    fn save_record<R, B>(&self, record: R, name: &str) -> Result<()>
    where
        B: Backend,
        R: burn::record::Record<B>,
    {
        let path = self.dir.join(name);
        CompactRecorder::new()
            .record(record, path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(())
    }

    pub fn save_model<B: Backend>(&self, model: &DownstreamModel<B>, name: &str) -> Result<()> {
        self.save_record::<_, B>(model.clone().into_record(), name)
    }

    pub fn load_model<B: Backend>(
        &self,
        model:  DownstreamModel<B>,
        name:   &str,
        device: &B::Device,
    ) -> Result<DownstreamModel<B>> {
        let path = self.dir.join(name);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        Ok(model.load_record(record))
    }

    pub fn save_epoch<B: Backend>(&self, model: &DownstreamModel<B>, epoch: usize) -> Result<()> {
        self.save_model(model, &Self::epoch_name(epoch))
    }

    pub fn load_epoch<B: Backend>(
        &self,
        model:  DownstreamModel<B>,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<DownstreamModel<B>> {
        self.load_model(model, &Self::epoch_name(epoch), device)
    }

    /// Save the best model and, separately, its encoder
    pub fn save_best<B: Backend>(&self, model: &DownstreamModel<B>) -> Result<()> {
        self.save_model(model, BEST_CHECKPOINT)?;
        self.save_record::<_, B>(model.encoder.clone().into_record(), BEST_ENCODER)
    }

    pub fn load_best<B: Backend>(
        &self,
        model:  DownstreamModel<B>,
        device: &B::Device,
    ) -> Result<DownstreamModel<B>> {
        self.load_model(model, BEST_CHECKPOINT, device)
            .context("Have you run 'train' first?")
    }

    /// Load encoder weights from a checkpoint file (path without
    /// extension). The head keeps its fresh initialisation.
    pub fn load_encoder<B: Backend>(
        model:  DownstreamModel<B>,
        path:   &Path,
        device: &B::Device,
    ) -> Result<DownstreamModel<B>> {
        let record = CompactRecorder::new()
            .load(path.to_path_buf(), device)
            .with_context(|| format!("Cannot load encoder from '{}'", path.display()))?;
        let encoder: GinEncoder<B> = model.encoder.clone().load_record(record);
        tracing::info!("Loaded pretrained encoder from '{}'", path.display());
        Ok(model.with_encoder(encoder))
    }

    // ─── JSON artifacts ───────────────────────────────────────────────────────
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid JSON in '{}'", path.display()))
    }

    pub fn save_model_config(&self, cfg: &GnnConfig) -> Result<()> {
        self.save_json("model_config.json", cfg)
    }

    pub fn load_model_config(&self) -> Result<GnnConfig> {
        self.load_json("model_config.json")
    }

    pub fn save_task_names(&self, tasks: &[String]) -> Result<()> {
        self.save_json("task_names.json", &tasks)
    }

    pub fn load_task_names(&self) -> Result<Vec<String>> {
        self.load_json("task_names.json")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config() -> GnnConfig {
        GnnConfig::new(2).with_embed_dim(8).with_num_layers(1)
    }

    fn head_weights(model: &DownstreamModel<TestBackend>) -> Vec<f32> {
        model.head.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    fn encoder_weights(model: &DownstreamModel<TestBackend>) -> Vec<f32> {
        model.encoder.atom_embedding.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    // records are stored as f16: ~3 significant digits survive
    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() <= 1e-3 * y.abs().max(1.0), "{x} vs {y}");
        }
    }

    #[test]
    fn test_epoch_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let model: DownstreamModel<TestBackend> = config().init(&device);
        ckpt.save_epoch(&model, 3).unwrap();
        assert!(dir.path().join("epoch3.mpk").exists());

        let fresh: DownstreamModel<TestBackend> = config().init(&device);
        let loaded = ckpt.load_epoch(fresh, 3, &device).unwrap();
        assert_close(&head_weights(&loaded), &head_weights(&model));
    }

    #[test]
    fn test_encoder_only_load_keeps_head() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let trained: DownstreamModel<TestBackend> = config().init(&device);
        ckpt.save_best(&trained).unwrap();

        // a different task count: only the encoder is shared
        let other = GnnConfig::new(5).with_embed_dim(8).with_num_layers(1);
        let fresh: DownstreamModel<TestBackend> = other.init(&device);
        let fresh_head = head_weights(&fresh);

        let loaded = CheckpointManager::load_encoder(fresh, &dir.path().join(BEST_ENCODER), &device).unwrap();
        assert_close(&encoder_weights(&loaded), &encoder_weights(&trained));
        assert_eq!(head_weights(&loaded), fresh_head);
    }

    #[test]
    fn test_json_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        ckpt.save_model_config(&config()).unwrap();
        ckpt.save_task_names(&["A".to_string(), "B".to_string()]).unwrap();

        let cfg = ckpt.load_model_config().unwrap();
        assert_eq!(cfg.num_tasks, 2);
        assert_eq!(cfg.embed_dim, 8);
        assert_eq!(ckpt.load_task_names().unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        let model: DownstreamModel<TestBackend> = config().init(&device);
        assert!(ckpt.load_best(model, &device).is_err());
        assert!(CheckpointManager::open(dir.path().join("nope")).is_err());
    }
}
