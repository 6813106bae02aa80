// ============================================================
// Layer 6 - Metrics
// ============================================================
// ROC-AUC over multi-task predictions, plus a CSV logger that
// records one row per finetuning epoch.
//
// Multi-task ROC-AUC:
//   for each task t:
//     keep rows where valid[r, t] == 1
//     skip t unless both classes are present
//     auc_t = rank-sum AUROC of preds[:, t] against labels[:, t]
//   score = mean of auc_t over evaluated tasks
//
// Labels here are the remapped ones: 1.0 positive, 0.0 negative.
//
// Output file: <model_dir>/metrics.csv
//
//   epoch,train_loss,val_auc,test_auc,test_auc_by_eval
//   0,0.512300,0.701200,0.688100,0.688100
//   1,0.431900,0.742800,0.705500,0.705500
//   ...

use anyhow::{bail, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// Ranks 1..=n ascending by score, ties get their average rank
fn ranks_average_ties(scores: &[f32]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0f64; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        // positions i..j share ranks i+1..=j
        let avg = (i + 1 + j) as f64 / 2.0;
        for &k in &order[i..j] {
            ranks[k] = avg;
        }
        i = j;
    }
    ranks
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
/// `NaN` unless both classes are present.
pub fn auroc(scores: &[f32], labels: &[f32]) -> f64 {
    if scores.len() != labels.len() {
        return f64::NAN;
    }

    let n_pos = labels.iter().filter(|&&y| y > 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }

    let ranks = ranks_average_ties(scores);
    let rank_sum_pos: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, y)| **y > 0.5)
        .map(|(r, _)| r)
        .sum();

    let (p, n) = (n_pos as f64, n_neg as f64);
    (rank_sum_pos - p * (p + 1.0) / 2.0) / (p * n)
}

/// Mean per-task ROC-AUC over `[rows x num_tasks]` row-major
/// matrices. Tasks lacking either class among their valid rows
/// are skipped; it is an error if every task is skipped.
pub fn calc_rocauc_score(labels: &[f32], preds: &[f32], valid: &[f32], num_tasks: usize) -> Result<f64> {
    assert_eq!(labels.len(), preds.len(), "labels and preds differ in size");
    assert_eq!(labels.len(), valid.len(), "labels and valid differ in size");
    assert!(num_tasks > 0 && labels.len() % num_tasks == 0, "matrix is not [rows x {num_tasks}]");

    let rows = labels.len() / num_tasks;
    let mut aucs = Vec::with_capacity(num_tasks);

    for t in 0..num_tasks {
        let mut task_labels = Vec::new();
        let mut task_preds = Vec::new();
        for r in 0..rows {
            let k = r * num_tasks + t;
            if valid[k] > 0.5 {
                task_labels.push(labels[k]);
                task_preds.push(preds[k]);
            }
        }
        let auc = auroc(&task_preds, &task_labels);
        if !auc.is_nan() {
            aucs.push(auc);
        }
    }

    let valid_ratio = if valid.is_empty() {
        0.0
    } else {
        valid.iter().map(|&v| v as f64).sum::<f64>() / valid.len() as f64
    };
    tracing::info!("Valid ratio: {:.4}", valid_ratio);
    tracing::info!("Task evaluated: {}/{}", aucs.len(), num_tasks);

    if aucs.is_empty() {
        bail!("No positively labeled data available. Cannot compute ROC-AUC.");
    }
    Ok(aucs.iter().sum::<f64>() / aucs.len() as f64)
}

/// Index of the first maximum, `None` for an empty slice
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some(b) if values[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}

/// One row of metrics for a single finetuning epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,

    /// Mean masked BCE over training batches
    pub train_loss: f64,

    pub val_auc:    f64,
    pub test_auc:   f64,

    /// Test AUC at the epoch with the best validation AUC so far
    pub test_auc_by_eval: f64,
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_auc,test_auc,test_auc_by_eval")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.val_auc,
            m.test_auc,
            m.test_auc_by_eval,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auroc_perfect_and_inverted() {
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(auroc(&[0.1, 0.2, 0.8, 0.9], &labels), 1.0);
        assert_eq!(auroc(&[0.9, 0.8, 0.2, 0.1], &labels), 0.0);
    }

    #[test]
    fn test_auroc_ties_count_half() {
        // every positive ties with every negative
        assert_eq!(auroc(&[0.5, 0.5, 0.5, 0.5], &[0.0, 1.0, 0.0, 1.0]), 0.5);
        // one positive above both negatives, one tied with a negative
        let auc = auroc(&[0.1, 0.4, 0.4, 0.9], &[0.0, 0.0, 1.0, 1.0]);
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_auroc_single_class_is_nan() {
        assert!(auroc(&[0.1, 0.9], &[1.0, 1.0]).is_nan());
        assert!(auroc(&[], &[]).is_nan());
    }

    #[test]
    fn test_rocauc_skips_masked_rows_and_one_class_tasks() {
        // 4 rows x 2 tasks, row-major
        let labels = [
            0.0, 1.0,
            1.0, 1.0,
            0.0, 0.5,
            1.0, 1.0,
        ];
        let preds = [
            0.2, 0.3,
            0.7, 0.6,
            0.9, 0.0,
            0.8, 0.9,
        ];
        let valid = [
            1.0, 1.0,
            1.0, 1.0,
            0.0, 0.0,
            1.0, 1.0,
        ];
        // task 0 over rows 0,1,3 is perfect; task 1 has only positives
        let score = calc_rocauc_score(&labels, &preds, &valid, 2).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_rocauc_errors_when_nothing_evaluable() {
        let labels = [1.0, 1.0];
        let preds = [0.3, 0.6];
        let valid = [1.0, 1.0];
        assert!(calc_rocauc_score(&labels, &preds, &valid, 1).is_err());
    }

    #[test]
    fn test_argmax_returns_first_maximum() {
        assert_eq!(argmax(&[0.5, 0.7, 0.7, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_logger_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        for epoch in 0..2 {
            logger
                .log(&EpochMetrics {
                    epoch,
                    train_loss: 0.5,
                    val_auc: 0.7,
                    test_auc: 0.6,
                    test_auc_by_eval: 0.6,
                })
                .unwrap();
        }

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "epoch,train_loss,val_auc,test_auc,test_auc_by_eval");
        assert_eq!(lines[2], "1,0.500000,0.700000,0.600000,0.600000");
    }
}
