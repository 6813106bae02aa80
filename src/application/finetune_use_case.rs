// ============================================================
// Layer 2 - FinetuneUseCase
// ============================================================
// Orchestrates a finetuning run in order:
//
//   Step 1: Resolve task names             (Layer 4 - data)
//   Step 2: Build the model config         (Layer 5 - ml)
//   Step 3: Load raw csv records           (Layer 4 - data)
//   Step 4: Featurize in parallel          (Layer 4 - data)
//   Step 5: Split train/valid/test         (Layer 4 - data)
//   Step 6: Save run artifacts             (Layer 6 - infra)
//   Step 7: Run the finetuning loop        (Layer 5 - ml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::data::{
    dataset::MoleculeDataset,
    featurizer::DownstreamFeaturizer,
    loader::{get_task_names, load_raw_records, DatasetName},
    splitter::{split, SplitFractions, SplitType},
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    model::{GnnConfig, GraphPooling},
    trainer::{run_training, DatasetSplits, FinetuneOutcome},
};

// ─── Finetuning Configuration ────────────────────────────────────────────────
// Everything the CLI passes in. Saved next to the checkpoints
// as finetune_config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinetuneConfig {
    pub use_gpu:      bool,
    pub batch_size:   usize,
    pub num_workers:  usize,
    pub max_epoch:    usize,
    pub lr:           f64,
    pub dataset_name: DatasetName,
    pub data_path:    PathBuf,
    pub split_type:   SplitType,
    pub model_config: Option<PathBuf>,
    pub dropout_rate: Option<f64>,
    pub init_model:   Option<PathBuf>,
    pub model_dir:    PathBuf,
    pub seed:         u64,
}

impl Default for FinetuneConfig {
    fn default() -> Self {
        Self {
            use_gpu:      false,
            batch_size:   32,
            num_workers:  4,
            max_epoch:    100,
            lr:           0.001,
            dataset_name: DatasetName::Bbbp,
            data_path:    PathBuf::from("data/bbbp"),
            split_type:   SplitType::Scaffold,
            model_config: None,
            dropout_rate: None,
            init_model:   None,
            model_dir:    PathBuf::from("model_dir"),
            seed:         42,
        }
    }
}

/// Model hyperparameters as written in a `--model-config` file.
/// Every field is optional; `layer_num` and `graph_pool_type` are
/// accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfigFile {
    pub embed_dim:    Option<usize>,
    #[serde(alias = "layer_num")]
    pub num_layers:   Option<usize>,
    pub dropout_rate: Option<f64>,
    #[serde(alias = "graph_pool_type")]
    pub pool:         Option<GraphPooling>,
}

impl ModelConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid model config '{}'", path.display()))
    }

    /// Model config for `num_tasks` tasks; `dropout_override`
    /// wins over the file's dropout rate.
    pub fn into_gnn_config(self, num_tasks: usize, dropout_override: Option<f64>) -> GnnConfig {
        let mut cfg = GnnConfig::new(num_tasks);
        if let Some(d) = self.embed_dim {
            cfg = cfg.with_embed_dim(d);
        }
        if let Some(n) = self.num_layers {
            cfg = cfg.with_num_layers(n);
        }
        if let Some(p) = dropout_override.or(self.dropout_rate) {
            cfg = cfg.with_dropout_rate(p);
        }
        if let Some(pool) = self.pool {
            cfg = cfg.with_pool(pool);
        }
        cfg
    }
}

// ─── FinetuneUseCase ──────────────────────────────────────────────────────────
pub struct FinetuneUseCase {
    config: FinetuneConfig,
}

impl FinetuneUseCase {
    pub fn new(config: FinetuneConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<FinetuneOutcome> {
        let cfg = &self.config;

        // ── Step 1: Task names ────────────────────────────────────────────────
        let task_names = get_task_names(cfg.dataset_name, &cfg.data_path)?;
        tracing::info!("Dataset '{}' has {} tasks", cfg.dataset_name, task_names.len());

        // ── Step 2: Model config ──────────────────────────────────────────────
        let file = match &cfg.model_config {
            Some(path) => ModelConfigFile::load(path)?,
            None => ModelConfigFile::default(),
        };
        let model_cfg = file.into_gnn_config(task_names.len(), cfg.dropout_rate);

        // ── Step 3: Raw records ───────────────────────────────────────────────
        let raw = load_raw_records(cfg.dataset_name, &cfg.data_path, &task_names)?;

        // ── Step 4: Featurize ─────────────────────────────────────────────────
        let dataset = MoleculeDataset::featurize(&raw, &DownstreamFeaturizer::supervised());
        tracing::info!("Featurized {} molecules", dataset.record_count());

        // ── Step 5: Split ─────────────────────────────────────────────────────
        let idx = split(cfg.split_type, &dataset.smiles(), SplitFractions::default(), cfg.seed);
        let splits = DatasetSplits {
            train: dataset.subset(&idx.train),
            valid: dataset.subset(&idx.valid),
            test:  dataset.subset(&idx.test),
        };
        tracing::info!(
            "Train/Valid/Test num: {}/{}/{}",
            splits.train.record_count(),
            splits.valid.record_count(),
            splits.test.record_count()
        );

        // ── Step 6: Run artifacts ─────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.model_dir)?;
        ckpt.save_model_config(&model_cfg)?;
        ckpt.save_task_names(&task_names)?;
        ckpt.save_json("finetune_config.json", cfg)?;
        let metrics = MetricsLogger::new(&cfg.model_dir)?;

        // ── Step 7: Finetune (Layer 5) ────────────────────────────────────────
        run_training(cfg, &model_cfg, splits, &ckpt, &metrics)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_file_aliases() {
        let file: ModelConfigFile = serde_json::from_str(
            r#"{"embed_dim": 64, "layer_num": 3, "dropout_rate": 0.2, "graph_pool_type": "sum", "atom_names": []}"#,
        )
        .unwrap();
        let cfg = file.into_gnn_config(7, None);
        assert_eq!(cfg.num_tasks, 7);
        assert_eq!(cfg.embed_dim, 64);
        assert_eq!(cfg.num_layers, 3);
        assert_eq!(cfg.dropout_rate, 0.2);
        assert_eq!(cfg.pool, GraphPooling::Sum);
    }

    #[test]
    fn test_dropout_override_wins() {
        let file = ModelConfigFile { dropout_rate: Some(0.2), ..Default::default() };
        assert_eq!(file.into_gnn_config(1, Some(0.1)).dropout_rate, 0.1);
        assert_eq!(ModelConfigFile::default().into_gnn_config(1, None).dropout_rate, 0.5);
    }

    #[test]
    fn test_finetune_config_round_trips_through_json() {
        let cfg = FinetuneConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"split_type\":\"scaffold\""));
        let back: FinetuneConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch_size, 32);
        assert_eq!(back.dataset_name, DatasetName::Bbbp);
    }

    #[test]
    fn test_execute_end_to_end_on_tiny_csv() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("bbbp.csv");

        let positives = [
            "c1ccccc1", "Cc1ccccc1", "Oc1ccccc1", "Nc1ccccc1", "c1ccncc1",
            "CCc1ccccc1", "Clc1ccccc1", "c1ccoc1", "Cc1ccncc1", "Fc1ccccc1",
        ];
        let negatives = [
            "CCO", "CCN", "CCCC", "CC(C)O", "CCCO",
            "CCCN", "OCCO", "CCCCC", "CC(=O)O", "CCOC",
        ];
        // alternate classes so every index block holds both
        let mut body = String::from("num,name,p_np,smiles\n");
        for (i, (p, n)) in positives.iter().zip(&negatives).enumerate() {
            body.push_str(&format!("{},p{i},1,{p}\n", 2 * i));
            body.push_str(&format!("{},n{i},0,{n}\n", 2 * i + 1));
        }
        fs::write(&csv, body).unwrap();

        let cfg = FinetuneConfig {
            batch_size: 4,
            num_workers: 1,
            max_epoch: 1,
            data_path: csv,
            split_type: SplitType::Index,
            dropout_rate: Some(0.0),
            model_dir: dir.path().join("model"),
            ..FinetuneConfig::default()
        };
        let outcome = FinetuneUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(outcome.best_epoch, 0);

        let ckpt = CheckpointManager::open(&cfg.model_dir).unwrap();
        assert_eq!(ckpt.load_task_names().unwrap(), vec!["p_np"]);
        assert_eq!(ckpt.load_model_config().unwrap().num_tasks, 1);
        assert!(cfg.model_dir.join("epoch_best.mpk").exists());
        assert!(cfg.model_dir.join("finetune_config.json").exists());
    }
}
