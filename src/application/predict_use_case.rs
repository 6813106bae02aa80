// ============================================================
// Layer 2 - Predict Use Case
// ============================================================
// Runs a finetuned model over a csv of SMILES:
//
//   1. read the smiles column            (Layer 4 - data)
//   2. featurize in inference mode       (Layer 4 - data)
//   3. load epoch_best and predict       (Layer 5 - ml)
//   4. write smiles,<task...> csv        (here)
//
// Unparseable SMILES are skipped and counted.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::data::{
    dataset::MoleculeDataset,
    featurizer::DownstreamFeaturizer,
    loader::CsvRecordSource,
};
use crate::domain::traits::RecordSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{run_prediction, Prediction};

#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub model_dir:     PathBuf,
    pub input:         PathBuf,
    pub output:        PathBuf,
    pub smiles_column: String,
    pub batch_size:    usize,
    pub use_gpu:       bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictSummary {
    pub predicted: usize,
    pub skipped:   usize,
}

pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PredictSummary> {
        let cfg = &self.config;
        let ckpt = CheckpointManager::open(&cfg.model_dir)?;

        let raw = CsvRecordSource::unlabelled(&cfg.input, cfg.smiles_column.clone()).load_all()?;
        let dataset = MoleculeDataset::featurize(&raw, &DownstreamFeaturizer::inference());
        let skipped = raw.len() - dataset.record_count();

        let (task_names, predictions) = run_prediction(&ckpt, &dataset, cfg.batch_size, cfg.use_gpu)?;
        write_predictions(&cfg.output, &task_names, &predictions)?;

        tracing::info!(
            "Wrote {} predictions to '{}' ({} skipped)",
            predictions.len(),
            cfg.output.display(),
            skipped
        );
        Ok(PredictSummary { predicted: predictions.len(), skipped })
    }
}

/// Write `smiles,<task...>` rows
pub fn write_predictions(path: &Path, task_names: &[String], predictions: &[Prediction]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;

    let mut header = vec!["smiles".to_string()];
    header.extend(task_names.iter().cloned());
    writer.write_record(&header)?;

    for p in predictions {
        let mut row = vec![p.smiles.clone()];
        row.extend(p.probabilities.iter().map(|v| format!("{v:.6}")));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
