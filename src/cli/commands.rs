// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `predict`, and
// their flags. Dataset and split names are parsed through
// their FromStr impls, so a typo fails at the command line.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{builder::TypedValueParser, Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    finetune_use_case::FinetuneConfig,
    predict_use_case::PredictConfig,
};
use crate::data::{loader::DatasetName, splitter::SplitType};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Finetune a GIN on a MoleculeNet classification dataset
    Train(TrainArgs),

    /// Predict task probabilities for a csv of SMILES
    Predict(PredictArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Run on the WGPU backend instead of the CPU
    #[arg(long)]
    pub use_gpu: bool,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Data loader worker threads (at least 1)
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
    pub num_workers: usize,

    #[arg(long, default_value_t = 100)]
    pub max_epoch: usize,

    #[arg(long, default_value_t = 0.001)]
    pub lr: f64,

    /// bace, bbbp, clintox, hiv, muv, sider, tox21 or toxcast
    #[arg(long)]
    pub dataset_name: DatasetName,

    /// The dataset csv, or a directory holding it (directly or in raw/)
    #[arg(long)]
    pub data_path: PathBuf,

    /// random, index, scaffold or random_scaffold
    #[arg(long, default_value = "scaffold")]
    pub split_type: SplitType,

    /// JSON file with model hyperparameters
    #[arg(long)]
    pub model_config: Option<PathBuf>,

    /// Overrides the dropout rate of the model config
    #[arg(long)]
    pub dropout_rate: Option<f64>,

    /// Pretrained encoder checkpoint (path without .mpk)
    #[arg(long)]
    pub init_model: Option<PathBuf>,

    /// Where checkpoints, configs and metrics.csv are written
    #[arg(long, default_value = "model_dir")]
    pub model_dir: PathBuf,

    /// Seed for shuffling and random splits
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<TrainArgs> for FinetuneConfig {
    fn from(a: TrainArgs) -> Self {
        FinetuneConfig {
            use_gpu:      a.use_gpu,
            batch_size:   a.batch_size,
            num_workers:  a.num_workers,
            max_epoch:    a.max_epoch,
            lr:           a.lr,
            dataset_name: a.dataset_name,
            data_path:    a.data_path,
            split_type:   a.split_type,
            model_config: a.model_config,
            dropout_rate: a.dropout_rate,
            init_model:   a.init_model,
            model_dir:    a.model_dir,
            seed:         a.seed,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory written by `train`
    #[arg(long, default_value = "model_dir")]
    pub model_dir: PathBuf,

    /// Input csv with a SMILES column
    #[arg(long)]
    pub input: PathBuf,

    /// Output csv: smiles plus one probability column per task
    #[arg(long, default_value = "predictions.csv")]
    pub output: PathBuf,

    #[arg(long, default_value = "smiles")]
    pub smiles_column: String,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long)]
    pub use_gpu: bool,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            model_dir:     a.model_dir,
            input:         a.input,
            output:        a.output,
            smiles_column: a.smiles_column,
            batch_size:    a.batch_size,
            use_gpu:       a.use_gpu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_defaults() {
        let cli = Cli::try_parse_from([
            "mol-finetune", "train", "--dataset-name", "tox21", "--data-path", "data/tox21",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: FinetuneConfig = args.into();
        assert_eq!(cfg.dataset_name, DatasetName::Tox21);
        assert_eq!(cfg.split_type, SplitType::Scaffold);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.max_epoch, 100);
        assert!(!cfg.use_gpu);
        assert!(cfg.init_model.is_none());
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let base = ["mol-finetune", "train", "--dataset-name", "bbbp", "--data-path", "x"];
        let zero = Cli::try_parse_from(base.iter().copied().chain(["--num-workers", "0"]));
        assert!(zero.is_err());

        let two = Cli::try_parse_from(base.iter().copied().chain(["--num-workers", "2"])).unwrap();
        let Commands::Train(args) = two.command else { panic!("expected train") };
        assert_eq!(args.num_workers, 2);
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        let parsed = Cli::try_parse_from([
            "mol-finetune", "train", "--dataset-name", "qm9", "--data-path", "x",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_predict_args() {
        let cli = Cli::try_parse_from([
            "mol-finetune", "predict", "--input", "in.csv", "--split-type", "index",
        ]);
        assert!(cli.is_err());

        let cli = Cli::try_parse_from(["mol-finetune", "predict", "--input", "in.csv"]).unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        let cfg: PredictConfig = args.into();
        assert_eq!(cfg.output, PathBuf::from("predictions.csv"));
        assert_eq!(cfg.smiles_column, "smiles");
    }
}
