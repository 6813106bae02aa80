// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and hands off to
// Layer 2 (application).
//
//   1. `train`   - finetune on a MoleculeNet dataset
//   2. `predict` - score a csv of SMILES with a finetuned model

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "mol-finetune",
    version = "0.1.0",
    about = "Finetune a GIN on MoleculeNet property prediction, then predict."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::finetune_use_case::FinetuneUseCase;

    tracing::info!("Finetuning on '{}' from {}", args.dataset_name, args.data_path.display());
    let outcome = FinetuneUseCase::new(args.into()).execute()?;

    println!(
        "Finetuning complete. Best epoch {} | val/auc={:.4} | test/auc={:.4}",
        outcome.best_epoch, outcome.best_val_auc, outcome.test_auc
    );
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let output = args.output.clone();
    let summary = PredictUseCase::new(args.into()).execute()?;

    println!(
        "Predicted {} molecules ({} skipped) → {}",
        summary.predicted,
        summary.skipped,
        output.display()
    );
    Ok(())
}
